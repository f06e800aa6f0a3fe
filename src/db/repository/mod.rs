//! Repository layer: entity-scoped database operations.
//!
//! Every function takes a borrowed `Connection` (or a `Transaction`, which
//! derefs to one) so multi-step writes compose inside one transaction.

mod appointment;
mod assignment_log;
mod auth_token;
mod medical_record;
mod nurse_task;
mod patient;
pub(crate) mod query;
mod sequence;
mod user;

pub use appointment::*;
pub use assignment_log::*;
pub use auth_token::*;
pub use medical_record::*;
pub use nurse_task::*;
pub use patient::*;
pub use query::{fmt_datetime, fmt_time, DATETIME_FORMAT, TIME_FORMAT};
pub use sequence::*;
pub use user::*;
