//! Shared fixtures and helpers for prune BDD scenarios.

use std::future::Future;
use std::time::Duration;

use autoprune::test_support::FakeProvider;
use autoprune::{
    Classifier, CostModel, DeleteResponse, HandlerSettings, PruneSettings, RatePerGib, RateTable,
    RequestHandler, RetryPolicy, ScanResponse, VolumeDescriptor,
};
use rstest::fixture;

/// Concurrency bound used by every scenario.
pub const MAX_CONCURRENCY: usize = 4;

/// Provider behaviour scripted before the provider is built.
#[derive(Clone, Debug)]
pub enum Fault {
    RefuseDelete(String),
    RaceAttach(String),
    Vanish(String),
}

#[derive(Clone, Debug, Default)]
pub struct PruneContext {
    pub volumes: Vec<VolumeDescriptor>,
    pub page_size: usize,
    pub delete_delay: Option<Duration>,
    pub faults: Vec<Fault>,
    pub provider: Option<FakeProvider>,
    pub scans: Vec<ScanResponse>,
    pub prunes: Vec<DeleteResponse>,
}

impl PruneContext {
    /// Returns the provider, building it from the scripted inventory on
    /// first use so later runs observe earlier deletions.
    pub fn provider(&mut self) -> FakeProvider {
        if let Some(provider) = &self.provider {
            return provider.clone();
        }
        let mut provider = FakeProvider::new(self.volumes.clone(), self.page_size);
        if let Some(delay) = self.delete_delay {
            provider = provider.with_delete_delay(delay);
        }
        for fault in &self.faults {
            match fault {
                Fault::RefuseDelete(id) => provider.fail_delete(
                    id,
                    autoprune::ProviderErrorKind::Rejected,
                    "volume is protected",
                ),
                Fault::RaceAttach(id) => provider.race_attach(id),
                Fault::Vanish(id) => provider.vanish(id),
            }
        }
        self.provider = Some(provider.clone());
        provider
    }

    pub fn handler(&mut self) -> RequestHandler<FakeProvider> {
        let settings = HandlerSettings {
            list_retry: RetryPolicy::new(2, Duration::from_millis(1)),
            prune: PruneSettings {
                max_concurrency: MAX_CONCURRENCY,
                retry: RetryPolicy::new(2, Duration::from_millis(1)),
                ..PruneSettings::default()
            },
            ..HandlerSettings::default()
        };
        let table = RateTable::with_default(RatePerGib::from_micros(100_000));
        RequestHandler::new(
            self.provider(),
            Classifier::new(CostModel::new(table)),
            settings,
        )
    }
}

#[fixture]
pub fn prune_context() -> PruneContext {
    PruneContext {
        page_size: 10,
        ..PruneContext::default()
    }
}

/// Drives a handler future to completion on a fresh runtime.
pub fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap_or_else(|err| panic!("test runtime should build: {err}"))
        .block_on(future)
}

pub fn as_usize(value: u32) -> usize {
    usize::try_from(value).unwrap_or_else(|err| panic!("count fits in usize: {err}"))
}
