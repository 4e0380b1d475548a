use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use super::domain::{
    Enrollment, EnrollmentId, EnrollmentMessage, EnrollmentRequest, EnrollmentStatus, FieldError,
};
use super::eligibility::AgeValidator;
use super::queue::{MessageQueue, QueueError};
use super::repository::{
    AgeBracketStore, BracketStoreError, EnrollmentRepository, RepositoryError,
};

/// Service composing the age validator, enrollment store, and queue publisher.
pub struct EnrollmentIntakeService<B, R, Q> {
    validator: Arc<AgeValidator<B>>,
    repository: Arc<R>,
    queue: Arc<Q>,
}

/// Response returned once an enrollment is stored and queued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrollmentAccepted {
    pub enrollment_id: EnrollmentId,
    pub status: EnrollmentStatus,
}

impl<B, R, Q> EnrollmentIntakeService<B, R, Q>
where
    B: AgeBracketStore + 'static,
    R: EnrollmentRepository + 'static,
    Q: MessageQueue + 'static,
{
    pub fn new(validator: Arc<AgeValidator<B>>, repository: Arc<R>, queue: Arc<Q>) -> Self {
        Self {
            validator,
            repository,
            queue,
        }
    }

    /// Parse a raw JSON body and submit it.
    pub fn submit(&self, body: &[u8]) -> Result<EnrollmentAccepted, IntakeError> {
        let request = EnrollmentRequest::parse(body)?;
        self.request(request)
    }

    /// Validate, persist as `PENDING`, then publish.
    ///
    /// The record is written before the message is published so the processor can always
    /// find it. A publish failure leaves the record `PENDING` with nothing queued for it.
    pub fn request(&self, request: EnrollmentRequest) -> Result<EnrollmentAccepted, IntakeError> {
        if !self.validator.check(request.age)? {
            return Err(IntakeError::InvalidAge { age: request.age });
        }

        let enrollment_id = EnrollmentId::generate();
        self.repository
            .insert(request.into_enrollment(enrollment_id.clone()))?;

        let message = EnrollmentMessage {
            enrollment_id: enrollment_id.clone(),
        };
        match self.queue.publish(message.to_body()) {
            Ok(message_id) => {
                info!(%enrollment_id, %message_id, "enrollment accepted and queued");
            }
            Err(source) => {
                error!(%enrollment_id, error = %source, "enrollment stored but not queued");
                return Err(IntakeError::Queue {
                    enrollment_id,
                    source,
                });
            }
        }

        Ok(EnrollmentAccepted {
            enrollment_id,
            status: EnrollmentStatus::Pending,
        })
    }

    /// Fetch an enrollment for status polling.
    pub fn status(&self, enrollment_id: &EnrollmentId) -> Result<Enrollment, IntakeError> {
        self.repository
            .fetch(enrollment_id)?
            .ok_or_else(|| IntakeError::NotFound(enrollment_id.clone()))
    }
}

/// Error raised by the intake service.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("Bad Request: {0}")]
    BadRequest(#[from] FieldError),
    #[error("User age does not fit into any available age group.")]
    InvalidAge { age: u32 },
    #[error("enrollment {0} not found")]
    NotFound(EnrollmentId),
    #[error(transparent)]
    Brackets(#[from] BracketStoreError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("enrollment {enrollment_id} stored but not queued: {source}")]
    Queue {
        enrollment_id: EnrollmentId,
        source: QueueError,
    },
}

impl IntakeError {
    /// Client input problems, as opposed to backing-service failures.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::BadRequest(_) | Self::InvalidAge { .. })
    }
}
