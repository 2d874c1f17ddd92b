//! Wire structures for the Scaleway Block Storage API and their
//! normalisation into [`VolumeDescriptor`]s.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::provider::PageCursor;
use crate::volume::{VolumeDescriptor, VolumeState};

const BYTES_PER_GIB: u64 = 1 << 30;
const DETACHED: &str = "detached";

#[derive(Debug, Deserialize)]
pub(super) struct ListVolumesResponse {
    #[serde(default)]
    pub(super) volumes: Vec<ScalewayVolume>,
    #[serde(default)]
    pub(super) total_count: u64,
}

#[derive(Debug, Deserialize)]
pub(super) struct ScalewayVolume {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type", default)]
    volume_type: Option<String>,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    status: String,
    #[serde(default)]
    zone: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    references: Vec<VolumeReference>,
}

#[derive(Debug, Deserialize)]
struct VolumeReference {
    #[serde(default)]
    product_resource_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    status: String,
}

impl VolumeReference {
    fn holds_volume(&self) -> bool {
        self.status != DETACHED
    }

    fn resource_id(&self) -> String {
        self.product_resource_id
            .clone()
            .or_else(|| self.id.clone())
            .unwrap_or_else(|| String::from("unknown-resource"))
    }
}

impl ScalewayVolume {
    /// Normalises the provider record. `fallback_zone` is used when the
    /// record omits its zone.
    pub(super) fn into_descriptor(self, fallback_zone: &str) -> VolumeDescriptor {
        let zone = self
            .zone
            .filter(|zone| !zone.trim().is_empty())
            .unwrap_or_else(|| fallback_zone.to_owned());
        let mut descriptor = VolumeDescriptor::new(
            self.id,
            size_gib(self.size),
            parse_state(&self.status),
            zone,
        );
        if let Some(name) = self.name.filter(|name| !name.is_empty()) {
            descriptor = descriptor.name(name);
        }
        if let Some(volume_type) = self.volume_type.filter(|kind| !kind.is_empty()) {
            descriptor = descriptor.volume_type(volume_type);
        }
        if let Some(created_at) = self.created_at {
            descriptor = descriptor.created_at(created_at);
        }
        descriptor.attachments = self
            .references
            .iter()
            .filter(|reference| reference.holds_volume())
            .map(VolumeReference::resource_id)
            .collect();
        descriptor
    }
}

/// Maps a provider status onto [`VolumeState`].
pub(super) fn parse_state(status: &str) -> VolumeState {
    match status {
        "available" => VolumeState::Available,
        "in_use" => VolumeState::InUse,
        "creating" => VolumeState::Creating,
        "deleting" | "deleted" => VolumeState::Deleting,
        "error" => VolumeState::Error,
        _ => VolumeState::Unknown,
    }
}

/// Converts a byte count to whole GiB, rounding up.
pub(super) const fn size_gib(bytes: u64) -> u64 {
    bytes.div_ceil(BYTES_PER_GIB)
}

/// Computes the cursor for the page after `page`, if any.
pub(super) fn next_cursor(
    page: u32,
    page_size: u32,
    returned: usize,
    total_count: u64,
) -> Option<PageCursor> {
    if returned == 0 {
        return None;
    }
    let seen = u64::from(page).saturating_mul(u64::from(page_size));
    if seen >= total_count {
        return None;
    }
    Some(PageCursor::new(page.saturating_add(1).to_string()))
}
