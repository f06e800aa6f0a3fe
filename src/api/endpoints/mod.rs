//! API endpoint handlers.
//!
//! One module per resource. Handlers open a connection, call into the
//! domain services and shape the response.

pub mod appointments;
pub mod auth;
pub mod health;
pub mod medical_records;
pub mod nurse_tasks;
pub mod patients;
