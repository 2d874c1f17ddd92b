//! Response envelopes returned by the request handler.

use serde::{Serialize, Serializer};

use crate::classifier::{ZombieCandidate, ZombieView};
use crate::cost::MonthlyCost;
use crate::pruner::PruneResult;

/// Result of a `scan` invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScanResponse {
    zombies: Vec<ZombieCandidate>,
    estimated_monthly_savings: MonthlyCost,
    message: String,
}

impl ScanResponse {
    /// Summarises the candidates found by a scan, in listing order.
    #[must_use]
    pub fn new(zombies: Vec<ZombieCandidate>) -> Self {
        let estimated_monthly_savings = zombies.iter().map(ZombieCandidate::price_per_month).sum();
        let message = format!(
            "Scan complete. Found {} zombie volume(s); {estimated_monthly_savings}/month available to reclaim.",
            zombies.len()
        );
        Self {
            zombies,
            estimated_monthly_savings,
            message,
        }
    }

    /// Candidates in listing order.
    #[must_use]
    pub fn zombies(&self) -> &[ZombieCandidate] {
        &self.zombies
    }

    /// Number of candidates found.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.zombies.len()
    }

    /// Sum of the candidates' monthly prices.
    #[must_use]
    pub const fn estimated_monthly_savings(&self) -> MonthlyCost {
        self.estimated_monthly_savings
    }

    /// Human-readable summary.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Serialize)]
struct ScanEnvelope<'a> {
    zombies: Vec<ZombieView<'a>>,
    message: &'a str,
    total: usize,
    #[serde(rename = "estimatedMonthlySavings")]
    estimated_monthly_savings: MonthlyCost,
}

impl Serialize for ScanResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ScanEnvelope {
            zombies: self.zombies.iter().map(ZombieView::from).collect(),
            message: &self.message,
            total: self.total_count(),
            estimated_monthly_savings: self.estimated_monthly_savings,
        }
        .serialize(serializer)
    }
}

/// One candidate together with its deletion outcome.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeleteEntry {
    /// Candidate as classified immediately before pruning.
    pub candidate: ZombieCandidate,
    /// Deletion outcome.
    pub result: PruneResult,
}

/// Result of a `delete` invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeleteResponse {
    entries: Vec<DeleteEntry>,
    succeeded: usize,
    realized_monthly_savings: MonthlyCost,
    message: String,
}

impl DeleteResponse {
    /// Pairs candidates with their results, which must be in the same order.
    #[must_use]
    pub fn new(candidates: Vec<ZombieCandidate>, results: Vec<PruneResult>) -> Self {
        let entries: Vec<DeleteEntry> = candidates
            .into_iter()
            .zip(results)
            .map(|(candidate, result)| DeleteEntry { candidate, result })
            .collect();
        let succeeded = entries
            .iter()
            .filter(|entry| entry.result.succeeded())
            .count();
        let realized_monthly_savings: MonthlyCost = entries
            .iter()
            .filter(|entry| entry.result.succeeded())
            .map(|entry| entry.candidate.price_per_month())
            .sum();
        let attempted = entries.len();
        let failed = attempted.saturating_sub(succeeded);
        let message = format!(
            "Prune complete. Deleted {succeeded} of {attempted} volume(s), {failed} failed; {realized_monthly_savings}/month reclaimed."
        );
        Self {
            entries,
            succeeded,
            realized_monthly_savings,
            message,
        }
    }

    /// Entries in candidate order.
    #[must_use]
    pub fn entries(&self) -> &[DeleteEntry] {
        &self.entries
    }

    /// Number of deletions attempted.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.entries.len()
    }

    /// Number of volumes that are now gone.
    #[must_use]
    pub const fn succeeded(&self) -> usize {
        self.succeeded
    }

    /// Number of volumes that could not be deleted.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.attempted().saturating_sub(self.succeeded)
    }

    /// Sum of monthly prices over the succeeded entries only.
    #[must_use]
    pub const fn realized_monthly_savings(&self) -> MonthlyCost {
        self.realized_monthly_savings
    }

    /// Human-readable summary.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Serialize)]
struct DeleteEntryView<'a> {
    #[serde(flatten)]
    zombie: ZombieView<'a>,
    #[serde(rename = "Deleted")]
    deleted: bool,
    #[serde(rename = "AlreadyDeleted")]
    already_deleted: bool,
    #[serde(rename = "Error", skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<'a> From<&'a DeleteEntry> for DeleteEntryView<'a> {
    fn from(entry: &'a DeleteEntry) -> Self {
        Self {
            zombie: ZombieView::from(&entry.candidate),
            deleted: entry.result.succeeded(),
            already_deleted: entry.result.was_already_deleted(),
            error: entry.result.error_message(),
        }
    }
}

#[derive(Serialize)]
struct DeleteEnvelope<'a> {
    zombies: Vec<DeleteEntryView<'a>>,
    message: &'a str,
    attempted: usize,
    succeeded: usize,
    failed: usize,
    #[serde(rename = "realizedMonthlySavings")]
    realized_monthly_savings: MonthlyCost,
}

impl Serialize for DeleteResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        DeleteEnvelope {
            zombies: self.entries.iter().map(DeleteEntryView::from).collect(),
            message: &self.message,
            attempted: self.attempted(),
            succeeded: self.succeeded,
            failed: self.failed(),
            realized_monthly_savings: self.realized_monthly_savings,
        }
        .serialize(serializer)
    }
}

/// Outcome of a handled action.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    /// Read-only scan result.
    Scan(ScanResponse),
    /// Prune result.
    Delete(DeleteResponse),
}

impl Response {
    /// Human-readable summary of either response.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Scan(scan) => scan.message(),
            Self::Delete(delete) => delete.message(),
        }
    }
}

/// Status, headers, and JSON body for the action endpoint.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HttpReply {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Vec<(&'static str, &'static str)>,
    /// JSON body.
    pub body: String,
}

impl HttpReply {
    const HEADERS: [(&'static str, &'static str); 2] = [
        ("Content-Type", "application/json"),
        ("Access-Control-Allow-Origin", "*"),
    ];

    /// Builds a reply carrying `body` with the standard JSON headers.
    #[must_use]
    pub fn json(status: u16, body: String) -> Self {
        Self {
            status,
            headers: Self::HEADERS.to_vec(),
            body,
        }
    }

    /// Builds an error reply with body `{"error": message}`.
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, serde_json::json!({ "error": message }).to_string())
    }
}
