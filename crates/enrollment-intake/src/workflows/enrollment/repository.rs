use serde::Serialize;

use super::domain::{
    AgeBracket, AgeBracketId, Enrollment, EnrollmentId, EnrollmentStatus, NewAgeBracket,
};

/// Keyed store owning the canonical set of age brackets.
pub trait AgeBracketStore: Send + Sync {
    fn create(&self, bracket: NewAgeBracket) -> Result<AgeBracket, BracketStoreError>;
    fn list(&self) -> Result<Vec<AgeBracket>, BracketStoreError>;
    fn delete(&self, id: &AgeBracketId) -> Result<(), BracketStoreError>;
}

/// Error enumeration for bracket store failures.
#[derive(Debug, thiserror::Error)]
pub enum BracketStoreError {
    #[error("age group not found")]
    NotFound,
    #[error("age group store unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction for enrollment records.
///
/// `mark_processed` is the only mutation after insert and must be atomic with respect to
/// the existence check: it either finds the record and sets `PROCESSED`, or fails with
/// [`RepositoryError::PreconditionFailed`] without writing anything.
pub trait EnrollmentRepository: Send + Sync {
    fn insert(&self, record: Enrollment) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &EnrollmentId) -> Result<Option<Enrollment>, RepositoryError>;
    fn mark_processed(&self, id: &EnrollmentId) -> Result<StatusTransition, RepositoryError>;
}

/// Outcome of a successful conditional status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTransition {
    Applied,
    AlreadyProcessed,
}

impl StatusTransition {
    /// Applies the single permitted transition to a stored status.
    pub fn apply(status: &mut EnrollmentStatus) -> Self {
        match status {
            EnrollmentStatus::Pending => {
                *status = EnrollmentStatus::Processed;
                Self::Applied
            }
            EnrollmentStatus::Processed => Self::AlreadyProcessed,
        }
    }
}

/// Error enumeration for enrollment repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("conditional update failed: enrollment {0} does not exist")]
    PreconditionFailed(EnrollmentId),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
