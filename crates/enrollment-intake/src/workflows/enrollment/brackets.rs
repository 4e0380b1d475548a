use std::sync::Arc;

use tracing::info;

use super::domain::{AgeBracket, AgeBracketId, FieldError, NewAgeBracket};
use super::eligibility::AgeValidator;
use super::repository::{AgeBracketStore, BracketStoreError};

/// Create/list/delete facade over the bracket store.
///
/// Mutations invalidate the validator snapshot held by this instance only.
pub struct AgeBracketService<S> {
    store: Arc<S>,
    validator: Arc<AgeValidator<S>>,
}

impl<S> AgeBracketService<S>
where
    S: AgeBracketStore + 'static,
{
    pub fn new(store: Arc<S>, validator: Arc<AgeValidator<S>>) -> Self {
        Self { store, validator }
    }

    /// Create a bracket from a raw JSON request body.
    pub fn create(&self, body: &[u8]) -> Result<AgeBracket, BracketAdminError> {
        let bracket = NewAgeBracket::parse(body)?;
        self.create_bracket(bracket)
    }

    pub fn create_bracket(&self, bracket: NewAgeBracket) -> Result<AgeBracket, BracketAdminError> {
        let created = self.store.create(bracket)?;
        self.validator.invalidate();
        info!(
            age_group_id = %created.id,
            min_age = created.min_age,
            max_age = created.max_age,
            "age group created"
        );
        Ok(created)
    }

    pub fn list(&self) -> Result<Vec<AgeBracket>, BracketAdminError> {
        Ok(self.store.list()?)
    }

    pub fn delete(&self, id: &AgeBracketId) -> Result<(), BracketAdminError> {
        match self.store.delete(id) {
            Ok(()) => {
                self.validator.invalidate();
                info!(age_group_id = %id, "age group deleted");
                Ok(())
            }
            Err(BracketStoreError::NotFound) => Err(BracketAdminError::NotFound(id.clone())),
            Err(other) => Err(other.into()),
        }
    }
}

/// Error raised by the bracket admin service.
#[derive(Debug, thiserror::Error)]
pub enum BracketAdminError {
    #[error("Bad Request: {0}")]
    BadRequest(#[from] FieldError),
    #[error("age group {0} not found")]
    NotFound(AgeBracketId),
    #[error(transparent)]
    Store(#[from] BracketStoreError),
}
