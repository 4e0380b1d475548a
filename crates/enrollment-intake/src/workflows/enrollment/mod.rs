//! Enrollment intake, age-bracket validation, and queue-driven status processing.
//!
//! Request path: [`EnrollmentIntakeService`] checks the age against [`AgeValidator`], stores
//! the enrollment as `PENDING`, then publishes an [`EnrollmentMessage`]. Processing path:
//! [`QueueConsumer`] pulls batches from a [`BatchSource`] and [`EnrollmentProcessor`] moves
//! each referenced enrollment to `PROCESSED`, reporting failures per message.

pub mod brackets;
pub mod domain;
pub mod eligibility;
pub mod intake;
pub mod memory;
pub mod processor;
pub mod queue;
pub mod repository;
pub mod router;

#[cfg(test)]
mod tests;

pub use brackets::{AgeBracketService, BracketAdminError};
pub use domain::{
    AgeBracket, AgeBracketId, Enrollment, EnrollmentId, EnrollmentMessage, EnrollmentRequest,
    EnrollmentStatus, FieldError, NewAgeBracket,
};
pub use eligibility::{is_eligible, AgeValidator, BracketCache, CachePolicy};
pub use intake::{EnrollmentAccepted, EnrollmentIntakeService, IntakeError};
pub use memory::{InMemoryAgeBracketStore, InMemoryEnrollmentRepository};
pub use processor::{
    BatchItemFailure, BatchReport, EnrollmentProcessor, MessageFailure, MessageOutcome,
    ProcessedItem, QueueConsumer,
};
pub use queue::{
    BatchSource, DeadLetter, DeliveredMessage, InMemoryQueue, MessageId, MessageQueue,
    QueueError, QueueEvent, QueueSettings, Receipt,
};
pub use repository::{
    AgeBracketStore, BracketStoreError, EnrollmentRepository, RepositoryError, StatusTransition,
};
pub use router::{enrollment_router, EnrollmentApi};
