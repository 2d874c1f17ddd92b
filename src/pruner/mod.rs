//! Bulk deletion of zombie candidates.
//!
//! Each candidate is deleted independently: one failure never aborts or
//! rolls back the others. Deletes run concurrently up to a fixed bound and
//! results are written into a slot per input position, so the returned
//! sequence always matches the candidate order regardless of completion
//! order.

mod types;

use std::future::Future;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::classifier::ZombieCandidate;
use crate::provider::{ProviderError, VolumeProvider};
use crate::retry::RetryPolicy;
use crate::volume::{VolumeDescriptor, VolumeState};

pub use types::{PruneItemError, PruneResult};

/// Default number of deletes in flight at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Tunables for a prune run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PruneSettings {
    /// Maximum deletes in flight; values below 1 are treated as 1.
    pub max_concurrency: usize,
    /// Bound on each provider call made for a candidate.
    pub delete_timeout: Duration,
    /// Retry policy for transient failures.
    pub retry: RetryPolicy,
    /// Re-read each volume before deleting it and skip it when it is no
    /// longer reclaimable.
    pub verify_before_delete: bool,
}

impl Default for PruneSettings {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            delete_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            verify_before_delete: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Deletion {
    Deleted,
    AlreadyGone,
}

/// Deletes candidates through a provider with per-item error isolation.
#[derive(Debug)]
pub struct Pruner<'a, P: ?Sized> {
    provider: &'a P,
    settings: PruneSettings,
}

impl<'a, P: VolumeProvider + ?Sized> Pruner<'a, P> {
    /// Creates a pruner borrowing the provider.
    #[must_use]
    pub const fn new(provider: &'a P, settings: PruneSettings) -> Self {
        Self { provider, settings }
    }

    /// Deletes every candidate and returns one result per candidate, in
    /// candidate order. Never fails as a whole.
    pub async fn prune(&self, candidates: &[ZombieCandidate]) -> Vec<PruneResult> {
        let mut slots: Vec<Option<PruneResult>> = std::iter::repeat_with(|| None)
            .take(candidates.len())
            .collect();

        let mut completions = stream::iter(candidates.iter().enumerate())
            .map(|(index, candidate)| async move { (index, self.prune_one(candidate).await) })
            .buffer_unordered(self.settings.max_concurrency.max(1));

        while let Some((index, result)) = completions.next().await {
            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(result);
            }
        }

        slots.into_iter().flatten().collect()
    }

    async fn prune_one(&self, candidate: &ZombieCandidate) -> PruneResult {
        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            match self.attempt(candidate).await {
                Ok(Deletion::Deleted) => {
                    info!(
                        volume_id = candidate.id(),
                        monthly_cost = %candidate.price_per_month(),
                        attempts,
                        "deleted zombie volume"
                    );
                    return PruneResult::deleted(candidate.id(), attempts);
                }
                Ok(Deletion::AlreadyGone) => {
                    info!(volume_id = candidate.id(), attempts, "volume already deleted");
                    return PruneResult::already_deleted(candidate.id(), attempts);
                }
                Err(PruneItemError::AlreadyDeleted) => {
                    info!(volume_id = candidate.id(), attempts, "volume already deleted");
                    return PruneResult::already_deleted(candidate.id(), attempts);
                }
                Err(err) if err.is_retryable() && self.settings.retry.allows_retry(attempts) => {
                    let delay = self.settings.retry.backoff_for(attempts);
                    warn!(
                        volume_id = candidate.id(),
                        attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "retrying volume delete"
                    );
                    sleep(delay).await;
                }
                Err(err) => {
                    warn!(volume_id = candidate.id(), attempts, error = %err, "volume delete failed");
                    return PruneResult::failed(candidate.id(), err, attempts);
                }
            }
        }
    }

    async fn attempt(&self, candidate: &ZombieCandidate) -> Result<Deletion, PruneItemError> {
        let volume = candidate.volume();

        if self.settings.verify_before_delete {
            let Some(current) = self.bounded(self.provider.fetch_volume(volume)).await? else {
                return Ok(Deletion::AlreadyGone);
            };
            if let Some(deletion) = recheck(&current)? {
                return Ok(deletion);
            }
        }

        match self.bounded(self.provider.delete_volume(volume)).await {
            Ok(()) => Ok(Deletion::Deleted),
            Err(PruneItemError::AlreadyDeleted) => Ok(Deletion::AlreadyGone),
            Err(err) => Err(err),
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, PruneItemError> {
        match timeout(self.settings.delete_timeout, call).await {
            Ok(result) => result.map_err(PruneItemError::from),
            Err(_) => Err(PruneItemError::Transient {
                message: format!(
                    "provider call timed out after {}ms",
                    self.settings.delete_timeout.as_millis()
                ),
            }),
        }
    }
}

/// Decides what a fresh read of a candidate means for its deletion.
///
/// A volume the provider is already deleting counts as gone. `Ok(None)`
/// means the volume is still reclaimable and the delete should go ahead.
fn recheck(current: &VolumeDescriptor) -> Result<Option<Deletion>, PruneItemError> {
    match current.state {
        VolumeState::Deleting => Ok(Some(Deletion::AlreadyGone)),
        _ if current.state == VolumeState::InUse || current.is_attached() => {
            Err(PruneItemError::InUse {
                message: format!(
                    "volume is now {} with {} attachment(s)",
                    current.state,
                    current.attachments.len()
                ),
            })
        }
        VolumeState::Available => Ok(None),
        VolumeState::InUse | VolumeState::Creating | VolumeState::Error | VolumeState::Unknown => {
            Err(PruneItemError::Rejected {
                message: format!("volume is now {}; leaving it in place", current.state),
            })
        }
    }
}
