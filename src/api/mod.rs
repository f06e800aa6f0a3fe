//! REST API for the hospital backend.
//!
//! Routes are nested under `/api/`. Protected routes pass through
//! Auth → Audit → Handler; health, registration, signup, login and token
//! refresh are open.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{serve_until_ctrl_c, start_api_server, ApiServer};
pub use types::ApiContext;
