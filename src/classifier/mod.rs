//! Zombie classification.
//!
//! A volume is a reclaim candidate when the provider reports it as
//! `available` and it carries no attachments. Attachment metadata wins over
//! the reported state: a volume that claims to be available while still
//! listing attachments is never a candidate. Age is deliberately ignored.

use serde::Serialize;
use tracing::warn;

use crate::cost::{CostModel, MonthlyCost, PriceSource};
use crate::volume::{VolumeDescriptor, VolumeState};

/// A volume judged eligible for pruning, priced at classification time.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ZombieCandidate {
    volume: VolumeDescriptor,
    price_per_month: MonthlyCost,
    price_source: PriceSource,
}

impl ZombieCandidate {
    /// Returns the underlying descriptor.
    #[must_use]
    pub const fn volume(&self) -> &VolumeDescriptor {
        &self.volume
    }

    /// Returns the provider identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.volume.id
    }

    /// Returns the monthly cost snapshot taken at classification time.
    #[must_use]
    pub const fn price_per_month(&self) -> MonthlyCost {
        self.price_per_month
    }

    /// Returns where the price came from.
    #[must_use]
    pub const fn price_source(&self) -> PriceSource {
        self.price_source
    }

    /// Returns `true` when no rate was available for this volume.
    #[must_use]
    pub const fn is_unpriced(&self) -> bool {
        matches!(self.price_source, PriceSource::Unpriced)
    }
}

/// Serialisable snapshot of a candidate for the response envelope.
#[derive(Clone, Debug, Serialize)]
pub struct ZombieView<'a> {
    /// Provider identifier.
    #[serde(rename = "VolumeId")]
    pub volume_id: &'a str,
    /// Display name, when the provider has one.
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    /// Capacity in GiB.
    #[serde(rename = "Size")]
    pub size: u64,
    /// Normalised state.
    #[serde(rename = "State")]
    pub state: VolumeState,
    /// Storage tier, when known.
    #[serde(rename = "VolumeType", skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<&'a str>,
    /// Region or zone.
    #[serde(rename = "Region")]
    pub region: &'a str,
    /// Creation time as RFC 3339, when known.
    #[serde(rename = "CreatedAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Estimated monthly cost.
    #[serde(rename = "PricePerMonth")]
    pub price_per_month: MonthlyCost,
    /// `true` when no rate applied and the price is reported as zero.
    #[serde(rename = "Unpriced")]
    pub unpriced: bool,
}

impl<'a> From<&'a ZombieCandidate> for ZombieView<'a> {
    fn from(candidate: &'a ZombieCandidate) -> Self {
        let volume = candidate.volume();
        Self {
            volume_id: &volume.id,
            name: volume.name.as_deref(),
            size: volume.size_gib,
            state: volume.state,
            volume_type: volume.volume_type.as_deref(),
            region: &volume.region,
            created_at: volume.created_at.map(|at| at.to_rfc3339()),
            price_per_month: candidate.price_per_month,
            unpriced: candidate.is_unpriced(),
        }
    }
}

/// Returns `true` when the descriptor is eligible for reclamation.
#[must_use]
pub fn is_reclaimable(volume: &VolumeDescriptor) -> bool {
    volume.state == VolumeState::Available && !volume.is_attached()
}

/// Filters inventory down to priced zombie candidates.
#[derive(Clone, Debug)]
pub struct Classifier {
    cost_model: CostModel,
}

impl Classifier {
    /// Creates a classifier pricing candidates with `cost_model`.
    #[must_use]
    pub const fn new(cost_model: CostModel) -> Self {
        Self { cost_model }
    }

    /// Returns the cost model used for pricing.
    #[must_use]
    pub const fn cost_model(&self) -> &CostModel {
        &self.cost_model
    }

    /// Classifies one descriptor, returning a candidate when it is eligible.
    #[must_use]
    pub fn classify(&self, volume: &VolumeDescriptor) -> Option<ZombieCandidate> {
        if volume.state == VolumeState::Available && volume.is_attached() {
            warn!(
                volume_id = %volume.id,
                attachments = volume.attachments.len(),
                "volume reported available but still lists attachments; skipping"
            );
            return None;
        }
        if !is_reclaimable(volume) {
            return None;
        }

        let quote = self.cost_model.quote(
            volume.size_gib,
            volume.volume_type.as_deref(),
            &volume.region,
        );
        if quote.source == PriceSource::Unpriced {
            warn!(
                volume_id = %volume.id,
                volume_type = volume.volume_type.as_deref().unwrap_or("default"),
                "no rate for volume type; reporting zero cost"
            );
        }

        Some(ZombieCandidate {
            volume: volume.clone(),
            price_per_month: quote.monthly,
            price_source: quote.source,
        })
    }

    /// Classifies a full listing, preserving its order.
    #[must_use]
    pub fn classify_all(&self, volumes: &[VolumeDescriptor]) -> Vec<ZombieCandidate> {
        volumes
            .iter()
            .filter_map(|volume| self.classify(volume))
            .collect()
    }
}
