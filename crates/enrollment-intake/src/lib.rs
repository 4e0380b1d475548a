//! Enrollment intake pipeline.
//!
//! Clients register permitted age brackets and submit enrollments that are checked against
//! them. Accepted enrollments are stored as `PENDING` and a message is queued; a consumer
//! later advances each one to `PROCESSED`.

pub mod auth;
pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
