use enrollment_intake::config::{BracketConfig, ProcessingConfig};
use enrollment_intake::workflows::enrollment::{
    AgeBracketService, AgeValidator, EnrollmentApi, EnrollmentIntakeService, EnrollmentProcessor,
    InMemoryAgeBracketStore, InMemoryEnrollmentRepository, InMemoryQueue, QueueConsumer,
    QueueSettings,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type MemoryApi =
    EnrollmentApi<InMemoryAgeBracketStore, InMemoryEnrollmentRepository, InMemoryQueue>;
pub(crate) type MemoryConsumer = QueueConsumer<InMemoryQueue, InMemoryEnrollmentRepository>;

/// In-process wiring of the intake pipeline: one bracket store, one enrollment table and
/// one queue shared by the HTTP handlers and the background consumer.
pub(crate) struct EnrollmentStack {
    pub(crate) api: MemoryApi,
    pub(crate) consumer: Arc<MemoryConsumer>,
    pub(crate) queue: Arc<InMemoryQueue>,
}

impl EnrollmentStack {
    pub(crate) fn in_memory(brackets: &BracketConfig, processing: &ProcessingConfig) -> Self {
        let store = Arc::new(InMemoryAgeBracketStore::default());
        let repository = Arc::new(InMemoryEnrollmentRepository::default());
        let queue = Arc::new(InMemoryQueue::new(QueueSettings::from(processing)));
        let validator = Arc::new(AgeValidator::new(store.clone(), brackets.cache_policy));

        let api = EnrollmentApi {
            brackets: Arc::new(AgeBracketService::new(store, validator.clone())),
            intake: Arc::new(EnrollmentIntakeService::new(
                validator,
                repository.clone(),
                queue.clone(),
            )),
        };

        let processor = Arc::new(EnrollmentProcessor::new(repository, processing.delay));
        let consumer = Arc::new(QueueConsumer::new(
            queue.clone(),
            processor,
            processing.batch_size,
            processing.poll_interval,
        ));

        Self {
            api,
            consumer,
            queue,
        }
    }
}
