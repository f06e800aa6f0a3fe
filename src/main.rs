use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match hms_lib::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("hms: {e}");
            ExitCode::FAILURE
        }
    }
}
