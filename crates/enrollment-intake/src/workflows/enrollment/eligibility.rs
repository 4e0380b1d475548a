use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::debug;

use super::domain::AgeBracket;
use super::repository::{AgeBracketStore, BracketStoreError};

/// True iff some bracket satisfies `min_age <= age <= max_age`.
pub fn is_eligible(age: u32, brackets: &[AgeBracket]) -> bool {
    brackets.iter().any(|bracket| bracket.contains(age))
}

/// How long a bracket snapshot may be reused before the store is read again.
///
/// Any policy other than `Disabled` opens an inconsistency window: brackets created or
/// deleted after the snapshot was taken are not seen by this instance until the snapshot
/// expires or [`AgeValidator::invalidate`] is called. Other instances keep their own
/// snapshots and are never notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Read the full bracket set from the store on every check.
    #[default]
    Disabled,
    /// Load once on first use and keep it until explicitly invalidated.
    Lazy,
    /// Reload once the snapshot is older than the given duration.
    Ttl(Duration),
}

#[derive(Debug, Clone)]
struct Snapshot {
    brackets: Arc<[AgeBracket]>,
    loaded_at: Instant,
}

/// In-process bracket snapshot governed by a [`CachePolicy`].
///
/// Every invalidation bumps a generation counter. A reload only installs its snapshot when
/// no invalidation happened between reading the generation and finishing the store read.
#[derive(Debug, Default)]
pub struct BracketCache {
    policy: CachePolicy,
    generation: AtomicU64,
    snapshot: RwLock<Option<Snapshot>>,
}

impl BracketCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            generation: AtomicU64::new(0),
            snapshot: RwLock::new(None),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    fn fresh(&self) -> Option<Arc<[AgeBracket]>> {
        let guard = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        let snapshot = guard.as_ref()?;
        match self.policy {
            CachePolicy::Disabled => None,
            CachePolicy::Lazy => Some(snapshot.brackets.clone()),
            CachePolicy::Ttl(ttl) if snapshot.loaded_at.elapsed() < ttl => {
                Some(snapshot.brackets.clone())
            }
            CachePolicy::Ttl(_) => None,
        }
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Installs `brackets` unless the cache was invalidated after `generation` was read.
    fn store(&self, brackets: Arc<[AgeBracket]>, generation: u64) -> bool {
        if self.policy == CachePolicy::Disabled {
            return false;
        }
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        if self.generation() != generation {
            return false;
        }
        *guard = Some(Snapshot {
            brackets,
            loaded_at: Instant::now(),
        });
        true
    }

    pub fn invalidate(&self) {
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        self.generation.fetch_add(1, Ordering::AcqRel);
        *guard = None;
    }
}

/// Decides age eligibility against the current (or cached) bracket set.
pub struct AgeValidator<S> {
    store: Arc<S>,
    cache: BracketCache,
}

impl<S> AgeValidator<S>
where
    S: AgeBracketStore + 'static,
{
    pub fn new(store: Arc<S>, policy: CachePolicy) -> Self {
        Self {
            store,
            cache: BracketCache::new(policy),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.cache.policy()
    }

    /// Bracket set used for validation, honoring the cache policy.
    pub fn brackets(&self) -> Result<Arc<[AgeBracket]>, BracketStoreError> {
        if let Some(brackets) = self.cache.fresh() {
            return Ok(brackets);
        }

        let generation = self.cache.generation();
        let brackets: Arc<[AgeBracket]> = self.store.list()?.into();
        let cached = self.cache.store(brackets.clone(), generation);
        debug!(
            count = brackets.len(),
            policy = ?self.cache.policy(),
            cached,
            "loaded age groups from store"
        );
        Ok(brackets)
    }

    pub fn check(&self, age: u32) -> Result<bool, BracketStoreError> {
        let brackets = self.brackets()?;
        Ok(is_eligible(age, &brackets))
    }

    /// Drops the local snapshot so the next check reads the store.
    pub fn invalidate(&self) {
        self.cache.invalidate();
    }
}
