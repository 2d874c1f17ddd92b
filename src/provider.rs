//! Provider abstraction for listing and deleting block-storage volumes.
//!
//! The provider is the single injected dependency that talks to the cloud.
//! Everything above it (inventory paging, classification, pruning) is
//! provider-neutral, so an in-memory fake can stand in during tests.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::volume::VolumeDescriptor;

/// Opaque continuation token returned by a paged listing.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PageCursor(String);

impl PageCursor {
    /// Wraps a provider-specific token.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of a volume listing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VolumePage {
    /// Volumes on this page, in provider order.
    pub volumes: Vec<VolumeDescriptor>,
    /// Cursor for the next page, or `None` when the listing is exhausted.
    pub next: Option<PageCursor>,
}

/// Classification of a provider failure.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ProviderErrorKind {
    /// The resource does not exist (or no longer exists).
    NotFound,
    /// The resource is attached or otherwise locked by another resource.
    InUse,
    /// Credentials were rejected or lack permission.
    Unauthorized,
    /// The provider throttled the request.
    RateLimited,
    /// Network failure or provider-side error.
    Unavailable,
    /// The call did not complete in time.
    Timeout,
    /// The provider answered with something that could not be understood.
    Malformed,
    /// The provider refused the request for another reason.
    Rejected,
}

impl ProviderErrorKind {
    /// Returns `true` when repeating the call may succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::RateLimited | Self::Unavailable | Self::Timeout)
    }

    const fn label(self) -> &'static str {
        match self {
            Self::NotFound => "not found",
            Self::InUse => "in use",
            Self::Unauthorized => "unauthorized",
            Self::RateLimited => "rate limited",
            Self::Unavailable => "unavailable",
            Self::Timeout => "timeout",
            Self::Malformed => "malformed response",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Failure reported by a [`VolumeProvider`] call.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    /// What kind of failure occurred.
    pub kind: ProviderErrorKind,
    /// Provider or transport message.
    pub message: String,
}

impl ProviderError {
    /// Creates an error of the given kind.
    #[must_use]
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Returns `true` when repeating the call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Future returned by provider operations.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Minimal interface a cloud provider must offer for zombie reclamation.
pub trait VolumeProvider: Send + Sync {
    /// Fetches one page of the volume inventory. `None` requests the first
    /// page.
    fn list_page<'a>(&'a self, cursor: Option<&'a PageCursor>) -> ProviderFuture<'a, VolumePage>;

    /// Re-reads a single volume. Returns `Ok(None)` when it no longer exists.
    fn fetch_volume<'a>(
        &'a self,
        volume: &'a VolumeDescriptor,
    ) -> ProviderFuture<'a, Option<VolumeDescriptor>>;

    /// Deletes a volume. Irreversible.
    fn delete_volume<'a>(&'a self, volume: &'a VolumeDescriptor) -> ProviderFuture<'a, ()>;
}
