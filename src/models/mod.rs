pub mod appointment;
pub mod assignment_log;
pub mod enums;
pub mod filters;
pub mod identifiers;
pub mod medical_record;
pub mod nurse_task;
pub mod patient;
pub mod user;

pub use appointment::*;
pub use assignment_log::*;
pub use enums::*;
pub use filters::*;
pub use identifiers::*;
pub use medical_record::*;
pub use nurse_task::*;
pub use patient::*;
pub use user::*;
