//! Core library for the autoprune volume reclaimer.
//!
//! The crate lists block-storage volumes through a provider abstraction,
//! classifies unattached ones as zombies, prices them with a rate table, and
//! deletes them on request with bounded concurrency and per-item error
//! isolation. A Scaleway Block Storage provider powers the binary; an
//! in-memory fake in [`test_support`] powers the tests.

pub mod classifier;
pub mod config;
pub mod cost;
pub mod handler;
pub mod inventory;
pub mod provider;
pub mod pruner;
pub mod retry;
pub mod scaleway;
pub mod test_support;
pub mod volume;

pub use classifier::{Classifier, ZombieCandidate, ZombieView, is_reclaimable};
pub use config::{AutopruneConfig, ConfigError};
pub use cost::{
    CostError, CostModel, MonthlyCost, PriceQuote, PriceSource, RatePerGib, RateTable,
};
pub use handler::{
    Action, DeleteEntry, DeleteResponse, HandlerError, HandlerSettings, HttpReply,
    RequestHandler, Response, ScanResponse, parse_action,
};
pub use inventory::{InventoryClient, InventoryError, InventorySettings};
pub use provider::{
    PageCursor, ProviderError, ProviderErrorKind, ProviderFuture, VolumePage, VolumeProvider,
};
pub use pruner::{PruneItemError, PruneResult, PruneSettings, Pruner};
pub use retry::RetryPolicy;
pub use scaleway::ScalewayBlockProvider;
pub use volume::{VolumeDescriptor, VolumeState};
