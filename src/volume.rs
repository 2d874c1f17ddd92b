//! Provider-neutral description of block-storage volumes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle state of a volume, normalised across providers.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VolumeState {
    /// Not attached to anything.
    Available,
    /// Attached to at least one compute resource.
    InUse,
    /// Still being provisioned.
    Creating,
    /// Deletion accepted by the provider, in progress or finished.
    Deleting,
    /// Provider reports a failure state.
    Error,
    /// Any state the provider reports that is not recognised.
    Unknown,
}

impl VolumeState {
    /// Returns the kebab-case label used in responses and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::InUse => "in-use",
            Self::Creating => "creating",
            Self::Deleting => "deleting",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for VolumeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One block-storage volume as reported by the provider inventory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VolumeDescriptor {
    /// Stable provider identifier, unique within the account and region.
    pub id: String,
    /// Optional human-friendly name, for display only.
    pub name: Option<String>,
    /// Capacity in whole GiB.
    pub size_gib: u64,
    /// Normalised lifecycle state.
    pub state: VolumeState,
    /// Provider storage tier; `None` means the provider default tier.
    pub volume_type: Option<String>,
    /// Region or zone the volume lives in.
    pub region: String,
    /// Creation time, for display and audit only.
    pub created_at: Option<DateTime<Utc>>,
    /// Identifiers of resources the volume is attached to.
    pub attachments: Vec<String>,
}

impl VolumeDescriptor {
    /// Creates a descriptor with no type, name, timestamp, or attachments.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        size_gib: u64,
        state: VolumeState,
        region: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into().trim().to_owned(),
            name: None,
            size_gib,
            state,
            volume_type: None,
            region: region.into().trim().to_owned(),
            created_at: None,
            attachments: Vec::new(),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn name(mut self, value: impl Into<String>) -> Self {
        self.name = Some(value.into());
        self
    }

    /// Sets the storage tier.
    #[must_use]
    pub fn volume_type(mut self, value: impl Into<String>) -> Self {
        self.volume_type = Some(value.into());
        self
    }

    /// Sets the creation timestamp.
    #[must_use]
    pub fn created_at(mut self, value: DateTime<Utc>) -> Self {
        self.created_at = Some(value);
        self
    }

    /// Records an attachment to the given resource.
    #[must_use]
    pub fn attached_to(mut self, resource_id: impl Into<String>) -> Self {
        self.attachments.push(resource_id.into());
        self
    }

    /// Returns `true` when any attachment is recorded.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        !self.attachments.is_empty()
    }
}
