//! Per-candidate deletion outcomes.

use thiserror::Error;

use crate::provider::{ProviderError, ProviderErrorKind};

/// Why a single candidate could not be deleted.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PruneItemError {
    /// The volume is already gone. Normalised to success by the pruner.
    #[error("volume already deleted")]
    AlreadyDeleted,
    /// The volume became attached after the scan. Never retried.
    #[error("volume is in use: {message}")]
    InUse {
        /// Provider or verification message.
        message: String,
    },
    /// Credentials lack permission to delete the volume.
    #[error("permission denied: {message}")]
    PermissionDenied {
        /// Provider message.
        message: String,
    },
    /// Network failure, throttling, or timeout.
    #[error("transient failure: {message}")]
    Transient {
        /// Provider or transport message.
        message: String,
    },
    /// The provider refused the delete for another reason.
    #[error("delete rejected: {message}")]
    Rejected {
        /// Provider message.
        message: String,
    },
}

impl PruneItemError {
    /// Returns `true` when a bounded retry is allowed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

impl From<ProviderError> for PruneItemError {
    fn from(value: ProviderError) -> Self {
        let message = value.message;
        match value.kind {
            ProviderErrorKind::NotFound => Self::AlreadyDeleted,
            ProviderErrorKind::InUse => Self::InUse { message },
            ProviderErrorKind::Unauthorized => Self::PermissionDenied { message },
            ProviderErrorKind::RateLimited
            | ProviderErrorKind::Unavailable
            | ProviderErrorKind::Timeout => Self::Transient { message },
            ProviderErrorKind::Malformed | ProviderErrorKind::Rejected => {
                Self::Rejected { message }
            }
        }
    }
}

/// Outcome of one delete attempt.
///
/// `error` is present exactly when the deletion did not succeed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PruneResult {
    id: String,
    error: Option<PruneItemError>,
    already_deleted: bool,
    attempts: u32,
}

impl PruneResult {
    /// Records a successful deletion.
    #[must_use]
    pub fn deleted(id: impl Into<String>, attempts: u32) -> Self {
        Self {
            id: id.into(),
            error: None,
            already_deleted: false,
            attempts,
        }
    }

    /// Records a volume that was already gone; counts as success.
    #[must_use]
    pub fn already_deleted(id: impl Into<String>, attempts: u32) -> Self {
        Self {
            id: id.into(),
            error: None,
            already_deleted: true,
            attempts,
        }
    }

    /// Records a failed deletion. [`PruneItemError::AlreadyDeleted`] is
    /// normalised to success.
    #[must_use]
    pub fn failed(id: impl Into<String>, error: PruneItemError, attempts: u32) -> Self {
        if error == PruneItemError::AlreadyDeleted {
            return Self::already_deleted(id, attempts);
        }
        Self {
            id: id.into(),
            error: Some(error),
            already_deleted: false,
            attempts,
        }
    }

    /// Returns the volume identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns `true` when the volume is gone.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    /// Returns `true` when the volume was already gone before this delete.
    #[must_use]
    pub const fn was_already_deleted(&self) -> bool {
        self.already_deleted
    }

    /// Returns the failure, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&PruneItemError> {
        self.error.as_ref()
    }

    /// Returns a human-readable failure message, if any.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    /// Returns how many delete attempts were made.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }
}
