//! Complete, paged volume inventory.
//!
//! The inventory client walks every page of the provider listing and
//! returns a flattened list. A listing is only trusted when it is complete,
//! so any page failure (including a timeout) fails the whole call.

use std::collections::HashSet;
use std::time::Duration;

use thiserror::Error;
use tokio::time::timeout;
use tracing::debug;

use crate::provider::{PageCursor, ProviderError, ProviderErrorKind, VolumeProvider};
use crate::volume::VolumeDescriptor;

/// Default bound on pages walked in one listing.
pub const DEFAULT_MAX_PAGES: u32 = 10_000;

/// Errors raised while enumerating the inventory.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum InventoryError {
    /// Credentials were rejected or lack list permission.
    #[error("inventory listing denied: {message}")]
    Denied {
        /// Provider message.
        message: String,
    },
    /// The provider throttled the listing.
    #[error("inventory listing rate limited: {message}")]
    RateLimited {
        /// Provider message.
        message: String,
    },
    /// Network or provider-side failure.
    #[error("inventory listing unavailable: {message}")]
    Unavailable {
        /// Provider or transport message.
        message: String,
    },
    /// A page did not arrive within the list timeout.
    #[error("inventory page {page} timed out after {seconds}s")]
    Timeout {
        /// 1-based page number that timed out.
        page: u32,
        /// Timeout that elapsed, in seconds.
        seconds: u64,
    },
    /// The provider returned something that could not be understood.
    #[error("inventory response malformed: {message}")]
    Malformed {
        /// Parser or provider message.
        message: String,
    },
    /// Pagination kept going past the page bound or repeated a cursor.
    #[error("inventory pagination did not terminate after {pages} pages")]
    Unterminated {
        /// Pages fetched before giving up.
        pages: u32,
    },
}

impl InventoryError {
    /// Returns `true` when re-running the listing may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Unavailable { .. } | Self::Timeout { .. }
        )
    }
}

impl From<ProviderError> for InventoryError {
    fn from(value: ProviderError) -> Self {
        let message = value.message;
        match value.kind {
            ProviderErrorKind::Unauthorized => Self::Denied { message },
            ProviderErrorKind::RateLimited => Self::RateLimited { message },
            ProviderErrorKind::Unavailable | ProviderErrorKind::Timeout => {
                Self::Unavailable { message }
            }
            ProviderErrorKind::Malformed
            | ProviderErrorKind::NotFound
            | ProviderErrorKind::InUse
            | ProviderErrorKind::Rejected => Self::Malformed { message },
        }
    }
}

/// Tunables for inventory listing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InventorySettings {
    /// Bound on each page request.
    pub page_timeout: Duration,
    /// Maximum number of pages walked before the listing is abandoned.
    pub max_pages: u32,
}

impl Default for InventorySettings {
    fn default() -> Self {
        Self {
            page_timeout: Duration::from_secs(30),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// Pages through a provider listing until exhaustion.
#[derive(Debug)]
pub struct InventoryClient<'a, P: ?Sized> {
    provider: &'a P,
    settings: InventorySettings,
}

impl<'a, P: VolumeProvider + ?Sized> InventoryClient<'a, P> {
    /// Creates a client borrowing the provider.
    #[must_use]
    pub const fn new(provider: &'a P, settings: InventorySettings) -> Self {
        Self { provider, settings }
    }

    /// Lists every volume across all pages.
    ///
    /// Volumes appear in provider order. A volume that shows up on more than
    /// one page (offset pagination racing a concurrent creation) is kept
    /// once, at its first position.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError`] when any page fails, times out, or the
    /// pagination does not terminate.
    pub async fn list(&self) -> Result<Vec<VolumeDescriptor>, InventoryError> {
        let mut volumes = Vec::new();
        let mut seen_ids = HashSet::new();
        let mut seen_cursors = HashSet::new();
        let mut cursor: Option<PageCursor> = None;
        let mut page: u32 = 0;

        loop {
            if page >= self.settings.max_pages {
                return Err(InventoryError::Unterminated { pages: page });
            }
            page = page.saturating_add(1);

            let fetched = timeout(
                self.settings.page_timeout,
                self.provider.list_page(cursor.as_ref()),
            )
            .await
            .map_err(|_| InventoryError::Timeout {
                page,
                seconds: self.settings.page_timeout.as_secs(),
            })??;

            let received = fetched.volumes.len();
            for volume in fetched.volumes {
                if seen_ids.insert(volume.id.clone()) {
                    volumes.push(volume);
                } else {
                    debug!(volume_id = %volume.id, page, "skipping volume repeated across pages");
                }
            }
            debug!(page, received, total = volumes.len(), "fetched inventory page");

            let Some(next) = fetched.next else {
                return Ok(volumes);
            };
            if !seen_cursors.insert(next.clone()) {
                return Err(InventoryError::Unterminated { pages: page });
            }
            cursor = Some(next);
        }
    }
}
