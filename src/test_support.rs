//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

use crate::provider::{
    PageCursor, ProviderError, ProviderErrorKind, ProviderFuture, VolumePage, VolumeProvider,
};
use crate::volume::{VolumeDescriptor, VolumeState};

/// Builds an unattached, available volume in `fr-par-1`.
#[must_use]
pub fn available_volume(id: &str, size_gib: u64) -> VolumeDescriptor {
    VolumeDescriptor::new(id, size_gib, VolumeState::Available, "fr-par-1")
}

/// Builds a volume attached to `server_id`.
#[must_use]
pub fn attached_volume(id: &str, size_gib: u64, server_id: &str) -> VolumeDescriptor {
    VolumeDescriptor::new(id, size_gib, VolumeState::InUse, "fr-par-1").attached_to(server_id)
}

#[derive(Debug, Default)]
struct FakeState {
    volumes: Vec<VolumeDescriptor>,
    list_failures: VecDeque<ProviderError>,
    delete_failures: HashMap<String, VecDeque<ProviderError>>,
    raced_attachments: HashSet<String>,
    stalled_deletes: HashSet<String>,
    list_calls: usize,
    fetch_calls: Vec<String>,
    delete_calls: Vec<String>,
    in_flight: usize,
    max_in_flight: usize,
}

/// In-memory provider that behaves like a small cloud inventory.
///
/// Listings page through the current volume set; successful deletes remove
/// volumes from it. Failures can be scripted per call, and a volume can be
/// made to "race" into use so that re-reads see it attached while listings
/// still report it as available.
#[derive(Clone, Debug)]
pub struct FakeProvider {
    state: Arc<Mutex<FakeState>>,
    page_size: usize,
    delete_delay: Option<Duration>,
}

impl FakeProvider {
    /// Creates a provider holding `volumes`, served in pages of `page_size`.
    #[must_use]
    pub fn new(volumes: Vec<VolumeDescriptor>, page_size: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                volumes,
                ..FakeState::default()
            })),
            page_size: page_size.max(1),
            delete_delay: None,
        }
    }

    /// Makes every delete (and re-read) take `delay` before answering.
    #[must_use]
    pub fn with_delete_delay(mut self, delay: Duration) -> Self {
        self.delete_delay = Some(delay);
        self
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a failure for the next listing call.
    pub fn fail_next_list(&self, kind: ProviderErrorKind, message: &str) {
        self.lock()
            .list_failures
            .push_back(ProviderError::new(kind, message));
    }

    /// Queues a failure for the next delete of `volume_id`.
    pub fn fail_delete(&self, volume_id: &str, kind: ProviderErrorKind, message: &str) {
        self.lock()
            .delete_failures
            .entry(volume_id.to_owned())
            .or_default()
            .push_back(ProviderError::new(kind, message));
    }

    /// Removes a volume out-of-band while listings keep reporting it, as an
    /// eventually consistent inventory would.
    pub fn vanish(&self, volume_id: &str) {
        self.fail_delete(volume_id, ProviderErrorKind::NotFound, "volume not found");
    }

    /// Marks a volume as attached for re-reads and deletes while listings
    /// still report it as available.
    pub fn race_attach(&self, volume_id: &str) {
        let mut state = self.lock();
        state.raced_attachments.insert(volume_id.to_owned());
        state
            .delete_failures
            .entry(volume_id.to_owned())
            .or_default()
            .push_back(ProviderError::new(
                ProviderErrorKind::InUse,
                "volume is attached to a server",
            ));
    }

    /// Makes the next delete of `volume_id` mark the volume as deleting and
    /// then never answer, like a delete the provider accepted but whose
    /// reply was lost. Re-reads keep returning the volume in that state.
    pub fn stall_after_accepting_delete(&self, volume_id: &str) {
        self.lock().stalled_deletes.insert(volume_id.to_owned());
    }

    /// Returns identifiers of volumes still present.
    #[must_use]
    pub fn remaining_ids(&self) -> Vec<String> {
        self.lock()
            .volumes
            .iter()
            .map(|volume| volume.id.clone())
            .collect()
    }

    /// Returns how many listing pages were requested.
    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }

    /// Returns the volume ids re-read before deletion, in call order.
    #[must_use]
    pub fn fetch_calls(&self) -> Vec<String> {
        self.lock().fetch_calls.clone()
    }

    /// Returns the volume ids passed to delete, in call order.
    #[must_use]
    pub fn delete_calls(&self) -> Vec<String> {
        self.lock().delete_calls.clone()
    }

    /// Returns the largest number of deletes observed in flight at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.lock().max_in_flight
    }

    fn page(&self, cursor: Option<&PageCursor>) -> Result<VolumePage, ProviderError> {
        let mut state = self.lock();
        state.list_calls = state.list_calls.saturating_add(1);
        if let Some(err) = state.list_failures.pop_front() {
            return Err(err);
        }
        let offset = match cursor {
            Some(token) => token.as_str().parse::<usize>().map_err(|err| {
                ProviderError::new(ProviderErrorKind::Rejected, format!("bad cursor: {err}"))
            })?,
            None => 0,
        };
        let volumes: Vec<VolumeDescriptor> = state
            .volumes
            .iter()
            .skip(offset)
            .take(self.page_size)
            .cloned()
            .collect();
        let end = offset.saturating_add(self.page_size);
        let next = (end < state.volumes.len()).then(|| PageCursor::new(end.to_string()));
        Ok(VolumePage { volumes, next })
    }

    fn begin_call(&self) {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_add(1);
        state.max_in_flight = state.max_in_flight.max(state.in_flight);
    }

    fn end_call(&self) {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
    }

    async fn pause(&self) {
        if let Some(delay) = self.delete_delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn current(&self, volume_id: &str) -> Option<VolumeDescriptor> {
        let mut state = self.lock();
        state.fetch_calls.push(volume_id.to_owned());
        let raced = state.raced_attachments.contains(volume_id);
        let vanished = state
            .delete_failures
            .get(volume_id)
            .and_then(VecDeque::front)
            .is_some_and(|err| err.kind == ProviderErrorKind::NotFound);
        if vanished {
            return None;
        }
        state
            .volumes
            .iter()
            .find(|volume| volume.id == volume_id)
            .cloned()
            .map(|mut volume| {
                if raced {
                    volume.state = VolumeState::InUse;
                    volume.attachments.push(String::from("srv-raced"));
                }
                volume
            })
    }

    fn accept_and_stall(&self, volume_id: &str) -> bool {
        let mut state = self.lock();
        if !state.stalled_deletes.remove(volume_id) {
            return false;
        }
        state.delete_calls.push(volume_id.to_owned());
        for volume in &mut state.volumes {
            if volume.id == volume_id {
                volume.state = VolumeState::Deleting;
            }
        }
        true
    }

    fn remove(&self, volume_id: &str) -> Result<(), ProviderError> {
        let mut state = self.lock();
        state.delete_calls.push(volume_id.to_owned());
        if let Some(err) = state
            .delete_failures
            .get_mut(volume_id)
            .and_then(VecDeque::pop_front)
        {
            if err.kind == ProviderErrorKind::NotFound {
                state.volumes.retain(|volume| volume.id != volume_id);
            }
            return Err(err);
        }
        let before = state.volumes.len();
        state.volumes.retain(|volume| volume.id != volume_id);
        if state.volumes.len() == before {
            return Err(ProviderError::new(
                ProviderErrorKind::NotFound,
                format!("volume {volume_id} not found"),
            ));
        }
        Ok(())
    }
}

impl VolumeProvider for FakeProvider {
    fn list_page<'a>(&'a self, cursor: Option<&'a PageCursor>) -> ProviderFuture<'a, VolumePage> {
        Box::pin(async move { self.page(cursor) })
    }

    fn fetch_volume<'a>(
        &'a self,
        volume: &'a VolumeDescriptor,
    ) -> ProviderFuture<'a, Option<VolumeDescriptor>> {
        Box::pin(async move {
            self.pause().await;
            Ok(self.current(&volume.id))
        })
    }

    fn delete_volume<'a>(&'a self, volume: &'a VolumeDescriptor) -> ProviderFuture<'a, ()> {
        Box::pin(async move {
            if self.accept_and_stall(&volume.id) {
                std::future::pending::<()>().await;
            }
            self.begin_call();
            self.pause().await;
            let outcome = self.remove(&volume.id);
            self.end_call();
            outcome
        })
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: AsyncMutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
