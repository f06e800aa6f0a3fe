//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Auth validator: bearer token lookup, injects `CurrentUser`
//! 2. Audit logger: runs after auth, so it can record the user id

pub mod audit;
pub mod auth;
