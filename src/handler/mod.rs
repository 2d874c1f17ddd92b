//! Action dispatch for `scan` and `delete`.
//!
//! The handler owns the provider and wires the inventory client, classifier,
//! and pruner together. Both actions always work from a fresh listing; a
//! `delete` never reuses candidates from an earlier scan.

mod response;

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::classifier::Classifier;
use crate::config::{AutopruneConfig, ConfigError};
use crate::inventory::{InventoryClient, InventoryError, InventorySettings};
use crate::provider::VolumeProvider;
use crate::pruner::{PruneSettings, Pruner};
use crate::retry::RetryPolicy;
use crate::scaleway::ScalewayBlockProvider;
use crate::volume::VolumeDescriptor;

pub use response::{DeleteEntry, DeleteResponse, HttpReply, Response, ScanResponse};

/// Requested operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    /// List and classify without side effects.
    Scan,
    /// List, classify, and delete every candidate.
    Delete,
}

impl Action {
    /// Returns the wire name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scan => "scan",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = HandlerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "scan" => Ok(Self::Scan),
            "delete" => Ok(Self::Delete),
            other => Err(HandlerError::InvalidAction {
                action: other.to_owned(),
            }),
        }
    }
}

#[derive(Deserialize)]
struct ActionRequest {
    #[serde(default)]
    action: Option<String>,
}

/// Parses an endpoint body into an [`Action`].
///
/// An empty body, a missing `action`, or an empty `action` selects
/// [`Action::Scan`].
///
/// # Errors
///
/// Returns [`HandlerError::MalformedRequest`] when the body is not a JSON
/// object with an optional string `action`, and
/// [`HandlerError::InvalidAction`] for any other action name.
pub fn parse_action(body: &str) -> Result<Action, HandlerError> {
    if body.trim().is_empty() {
        return Ok(Action::Scan);
    }
    let request: ActionRequest =
        serde_json::from_str(body).map_err(|err| HandlerError::MalformedRequest {
            message: err.to_string(),
        })?;
    match request.action.as_deref() {
        None | Some("") => Ok(Action::Scan),
        Some(name) => name.parse(),
    }
}

/// Errors that abort a whole invocation.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The requested action is not `scan` or `delete`.
    #[error("invalid action `{action}`: expected `scan` or `delete`")]
    InvalidAction {
        /// Action name as received.
        action: String,
    },
    /// The request body could not be parsed.
    #[error("malformed request: {message}")]
    MalformedRequest {
        /// Parser error message.
        message: String,
    },
    /// The inventory could not be listed completely.
    #[error("failed to list volumes: {0}")]
    Inventory(#[from] InventoryError),
}

impl HandlerError {
    /// HTTP status code used when reporting this error to the caller.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidAction { .. } | Self::MalformedRequest { .. } => 400,
            Self::Inventory(err) if err.is_retryable() => 503,
            Self::Inventory(_) => 500,
        }
    }
}

/// Tunables for a handler.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HandlerSettings {
    /// Listing tunables.
    pub inventory: InventorySettings,
    /// Retry policy for retryable listing failures.
    pub list_retry: RetryPolicy,
    /// Prune tunables.
    pub prune: PruneSettings,
}

/// Serves `scan` and `delete` against one provider.
#[derive(Debug)]
pub struct RequestHandler<P> {
    provider: P,
    classifier: Classifier,
    settings: HandlerSettings,
}

impl RequestHandler<ScalewayBlockProvider> {
    /// Builds a handler backed by the Scaleway Block Storage API.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails, the rate table cannot be
    /// built, or the HTTP client cannot be created.
    pub fn from_config(config: &AutopruneConfig) -> Result<Self, ConfigError> {
        let provider = ScalewayBlockProvider::new(config)?;
        let model = config.cost_model()?;
        debug!(
            zone = provider.zone(),
            rate_entries = model.table().len(),
            default_rate = ?model.table().default_rate(),
            "configured volume handler"
        );
        let classifier = Classifier::new(model);
        let settings = HandlerSettings {
            inventory: config.inventory_settings(),
            list_retry: config.list_retry(),
            prune: config.prune_settings(),
        };
        Ok(Self::new(provider, classifier, settings))
    }
}

impl<P: VolumeProvider> RequestHandler<P> {
    /// Creates a handler owning `provider`.
    #[must_use]
    pub const fn new(provider: P, classifier: Classifier, settings: HandlerSettings) -> Self {
        Self {
            provider,
            classifier,
            settings,
        }
    }

    /// Runs `action` inside an invocation span.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Inventory`] when the listing fails after
    /// retries.
    pub async fn handle(&self, action: Action) -> Result<Response, HandlerError> {
        let span = info_span!(
            "invocation",
            invocation_id = %Uuid::new_v4(),
            action = action.as_str()
        );
        async {
            match action {
                Action::Scan => self.scan().await.map(Response::Scan),
                Action::Delete => self.delete().await.map(Response::Delete),
            }
        }
        .instrument(span)
        .await
    }

    /// Lists and classifies the inventory without side effects.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Inventory`] when the listing fails.
    pub async fn scan(&self) -> Result<ScanResponse, HandlerError> {
        let volumes = self.list_volumes().await?;
        let response = ScanResponse::new(self.classifier.classify_all(&volumes));
        info!(
            listed = volumes.len(),
            zombies = response.total_count(),
            estimated_monthly_savings = %response.estimated_monthly_savings(),
            "scan complete"
        );
        Ok(response)
    }

    /// Re-lists, re-classifies, and deletes every candidate.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Inventory`] when the listing fails. Individual
    /// delete failures are reported in the response instead.
    pub async fn delete(&self) -> Result<DeleteResponse, HandlerError> {
        let volumes = self.list_volumes().await?;
        let candidates = self.classifier.classify_all(&volumes);
        let results = Pruner::new(&self.provider, self.settings.prune)
            .prune(&candidates)
            .await;
        let response = DeleteResponse::new(candidates, results);
        info!(
            attempted = response.attempted(),
            succeeded = response.succeeded(),
            failed = response.failed(),
            realized_monthly_savings = %response.realized_monthly_savings(),
            "prune complete"
        );
        Ok(response)
    }

    /// Handles a raw endpoint body and renders the reply.
    pub async fn handle_json(&self, body: &str) -> HttpReply {
        let outcome = match parse_action(body) {
            Ok(action) => self.handle(action).await,
            Err(err) => Err(err),
        };
        match outcome {
            Ok(response) => match serde_json::to_string(&response) {
                Ok(json) => HttpReply::json(200, json),
                Err(err) => HttpReply::error(500, &format!("failed to encode response: {err}")),
            },
            Err(err) => {
                warn!(status = err.status_code(), error = %err, "request failed");
                HttpReply::error(err.status_code(), &err.to_string())
            }
        }
    }

    async fn list_volumes(&self) -> Result<Vec<VolumeDescriptor>, InventoryError> {
        let client = InventoryClient::new(&self.provider, self.settings.inventory);
        let policy = self.settings.list_retry;
        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            match client.list().await {
                Ok(volumes) => return Ok(volumes),
                Err(err) if err.is_retryable() && policy.allows_retry(attempts) => {
                    let delay = policy.backoff_for(attempts);
                    warn!(
                        attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "retrying volume listing"
                    );
                    sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
