//! In-process store adapters used by the local server, the demo command, and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{AgeBracket, AgeBracketId, Enrollment, EnrollmentId, NewAgeBracket};
use super::repository::{
    AgeBracketStore, BracketStoreError, EnrollmentRepository, RepositoryError, StatusTransition,
};

#[derive(Default, Clone)]
pub struct InMemoryAgeBracketStore {
    records: Arc<Mutex<BTreeMap<AgeBracketId, AgeBracket>>>,
}

impl InMemoryAgeBracketStore {
    fn guard(
        &self,
    ) -> Result<MutexGuard<'_, BTreeMap<AgeBracketId, AgeBracket>>, BracketStoreError> {
        self.records
            .lock()
            .map_err(|_| BracketStoreError::Unavailable("age group store poisoned".to_string()))
    }
}

impl AgeBracketStore for InMemoryAgeBracketStore {
    fn create(&self, bracket: NewAgeBracket) -> Result<AgeBracket, BracketStoreError> {
        let record = bracket.with_id(AgeBracketId::generate());
        self.guard()?.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn list(&self) -> Result<Vec<AgeBracket>, BracketStoreError> {
        Ok(self.guard()?.values().cloned().collect())
    }

    fn delete(&self, id: &AgeBracketId) -> Result<(), BracketStoreError> {
        match self.guard()?.remove(id) {
            Some(_) => Ok(()),
            None => Err(BracketStoreError::NotFound),
        }
    }
}

#[derive(Default, Clone)]
pub struct InMemoryEnrollmentRepository {
    records: Arc<Mutex<HashMap<EnrollmentId, Enrollment>>>,
}

impl InMemoryEnrollmentRepository {
    fn guard(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<EnrollmentId, Enrollment>>, RepositoryError> {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("enrollment store poisoned".to_string()))
    }

    pub fn len(&self) -> usize {
        self.guard().map(|records| records.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EnrollmentRepository for InMemoryEnrollmentRepository {
    fn insert(&self, record: Enrollment) -> Result<(), RepositoryError> {
        let mut guard = self.guard()?;
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record);
        Ok(())
    }

    fn fetch(&self, id: &EnrollmentId) -> Result<Option<Enrollment>, RepositoryError> {
        Ok(self.guard()?.get(id).cloned())
    }

    fn mark_processed(&self, id: &EnrollmentId) -> Result<StatusTransition, RepositoryError> {
        let mut guard = self.guard()?;
        match guard.get_mut(id) {
            Some(record) => Ok(StatusTransition::apply(&mut record.status)),
            None => Err(RepositoryError::PreconditionFailed(id.clone())),
        }
    }
}
