use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::response::Response;
use serde_json::Value;

use crate::workflows::enrollment::domain::{
    AgeBracket, AgeBracketId, Enrollment, EnrollmentId, EnrollmentRequest, EnrollmentStatus,
    NewAgeBracket,
};
use crate::workflows::enrollment::eligibility::{AgeValidator, CachePolicy};
use crate::workflows::enrollment::memory::{InMemoryAgeBracketStore, InMemoryEnrollmentRepository};
use crate::workflows::enrollment::queue::{
    InMemoryQueue, MessageId, MessageQueue, QueueError, QueueSettings,
};
use crate::workflows::enrollment::repository::{
    AgeBracketStore, BracketStoreError, EnrollmentRepository, RepositoryError, StatusTransition,
};
use crate::workflows::enrollment::{
    enrollment_router, AgeBracketService, EnrollmentApi, EnrollmentIntakeService,
    EnrollmentProcessor,
};

pub(super) fn jane() -> EnrollmentRequest {
    EnrollmentRequest {
        name: "Jane".to_string(),
        age: 25,
        cpf: "111".to_string(),
    }
}

pub(super) fn request_with_age(age: u32) -> EnrollmentRequest {
    EnrollmentRequest { age, ..jane() }
}

pub(super) fn pending(id: &str) -> Enrollment {
    Enrollment {
        id: EnrollmentId(id.to_string()),
        name: "To Be Processed".to_string(),
        age: 33,
        cpf: "222".to_string(),
        status: EnrollmentStatus::Pending,
    }
}

pub(super) fn bracket(min_age: u32, max_age: u32) -> NewAgeBracket {
    NewAgeBracket::new(min_age, max_age).expect("valid bracket")
}

pub(super) fn immediate_redelivery() -> QueueSettings {
    QueueSettings {
        visibility_timeout: Duration::ZERO,
        max_receives: 3,
    }
}

/// Bracket store that counts how often the full set is read.
#[derive(Default)]
pub(super) struct CountingBracketStore {
    pub(super) inner: InMemoryAgeBracketStore,
    lists: AtomicUsize,
}

impl CountingBracketStore {
    pub(super) fn list_calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }
}

impl AgeBracketStore for CountingBracketStore {
    fn create(&self, bracket: NewAgeBracket) -> Result<AgeBracket, BracketStoreError> {
        self.inner.create(bracket)
    }

    fn list(&self) -> Result<Vec<AgeBracket>, BracketStoreError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.inner.list()
    }

    fn delete(&self, id: &AgeBracketId) -> Result<(), BracketStoreError> {
        self.inner.delete(id)
    }
}

type ListHook = Box<dyn FnOnce() + Send>;

/// Bracket store that runs a hook once, after the first `list` has read its records but
/// before it returns them.
#[derive(Default)]
pub(super) struct InterleavingBracketStore {
    inner: InMemoryAgeBracketStore,
    hook: Mutex<Option<ListHook>>,
}

impl InterleavingBracketStore {
    pub(super) fn during_first_list(&self, hook: impl FnOnce() + Send + 'static) {
        *self.hook.lock().expect("hook mutex poisoned") = Some(Box::new(hook));
    }
}

impl AgeBracketStore for InterleavingBracketStore {
    fn create(&self, bracket: NewAgeBracket) -> Result<AgeBracket, BracketStoreError> {
        self.inner.create(bracket)
    }

    fn list(&self) -> Result<Vec<AgeBracket>, BracketStoreError> {
        let records = self.inner.list();
        let hook = self.hook.lock().expect("hook mutex poisoned").take();
        if let Some(hook) = hook {
            hook();
        }
        records
    }

    fn delete(&self, id: &AgeBracketId) -> Result<(), BracketStoreError> {
        self.inner.delete(id)
    }
}

pub(super) struct UnavailableBracketStore;

impl AgeBracketStore for UnavailableBracketStore {
    fn create(&self, _bracket: NewAgeBracket) -> Result<AgeBracket, BracketStoreError> {
        Err(BracketStoreError::Unavailable("table offline".to_string()))
    }

    fn list(&self) -> Result<Vec<AgeBracket>, BracketStoreError> {
        Err(BracketStoreError::Unavailable("table offline".to_string()))
    }

    fn delete(&self, _id: &AgeBracketId) -> Result<(), BracketStoreError> {
        Err(BracketStoreError::Unavailable("table offline".to_string()))
    }
}

pub(super) struct UnavailableRepository;

impl EnrollmentRepository for UnavailableRepository {
    fn insert(&self, _record: Enrollment) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &EnrollmentId) -> Result<Option<Enrollment>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn mark_processed(&self, _id: &EnrollmentId) -> Result<StatusTransition, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) struct FailingQueue;

impl MessageQueue for FailingQueue {
    fn publish(&self, _body: String) -> Result<MessageId, QueueError> {
        Err(QueueError::Unavailable("broker offline".to_string()))
    }
}

/// Queue double recording, for every publish, whether the enrollment was already stored.
pub(super) struct OrderCheckingQueue {
    pub(super) repository: Arc<InMemoryEnrollmentRepository>,
    pub(super) stored_before_publish: Mutex<Vec<bool>>,
}

impl MessageQueue for OrderCheckingQueue {
    fn publish(&self, body: String) -> Result<MessageId, QueueError> {
        let payload: Value = serde_json::from_str(&body).expect("published body is JSON");
        let id = payload["enrollment_id"]
            .as_str()
            .expect("enrollment_id present")
            .to_string();
        let stored = self
            .repository
            .fetch(&EnrollmentId(id))
            .expect("fetch succeeds")
            .is_some();
        self.stored_before_publish
            .lock()
            .expect("order mutex poisoned")
            .push(stored);
        Ok(MessageId("order-check".to_string()))
    }
}

pub(super) type MemoryIntake =
    EnrollmentIntakeService<InMemoryAgeBracketStore, InMemoryEnrollmentRepository, InMemoryQueue>;

pub(super) struct Harness {
    pub(super) store: Arc<InMemoryAgeBracketStore>,
    pub(super) repository: Arc<InMemoryEnrollmentRepository>,
    pub(super) queue: Arc<InMemoryQueue>,
    pub(super) validator: Arc<AgeValidator<InMemoryAgeBracketStore>>,
    pub(super) brackets: Arc<AgeBracketService<InMemoryAgeBracketStore>>,
    pub(super) intake: Arc<MemoryIntake>,
}

impl Harness {
    pub(super) fn processor(&self) -> EnrollmentProcessor<InMemoryEnrollmentRepository> {
        EnrollmentProcessor::new(self.repository.clone(), Duration::ZERO)
    }

    pub(super) fn router(&self) -> axum::Router {
        enrollment_router(EnrollmentApi {
            brackets: self.brackets.clone(),
            intake: self.intake.clone(),
        })
    }

    pub(super) fn status_of(&self, id: &EnrollmentId) -> EnrollmentStatus {
        self.repository
            .fetch(id)
            .expect("fetch succeeds")
            .expect("record present")
            .status
    }
}

pub(super) fn build_harness(policy: CachePolicy) -> Harness {
    let store = Arc::new(InMemoryAgeBracketStore::default());
    let repository = Arc::new(InMemoryEnrollmentRepository::default());
    let queue = Arc::new(InMemoryQueue::new(immediate_redelivery()));
    let validator = Arc::new(AgeValidator::new(store.clone(), policy));
    let brackets = Arc::new(AgeBracketService::new(store.clone(), validator.clone()));
    let intake = Arc::new(EnrollmentIntakeService::new(
        validator.clone(),
        repository.clone(),
        queue.clone(),
    ));

    Harness {
        store,
        repository,
        queue,
        validator,
        brackets,
        intake,
    }
}

/// Harness with the single `{20, 30}` bracket registered.
pub(super) fn harness_with_twenties() -> Harness {
    let harness = build_harness(CachePolicy::Disabled);
    harness
        .brackets
        .create_bracket(bracket(20, 30))
        .expect("bracket created");
    harness
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
