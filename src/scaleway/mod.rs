//! Scaleway Block Storage implementation of [`VolumeProvider`].
//!
//! Talks to the Block Storage API directly over `reqwest`. Listing uses the
//! API's page-number pagination; the page number travels in the opaque
//! [`PageCursor`].

mod error;
mod types;

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use tracing::debug;

use crate::config::{AutopruneConfig, ConfigError};
use crate::provider::{
    PageCursor, ProviderError, ProviderErrorKind, ProviderFuture, VolumePage, VolumeProvider,
};
use crate::volume::VolumeDescriptor;
use types::{ListVolumesResponse, ScalewayVolume};

const AUTH_HEADER: &str = "X-Auth-Token";

/// Volume provider backed by the Scaleway Block Storage API.
#[derive(Clone)]
pub struct ScalewayBlockProvider {
    client: Client,
    api_url: String,
    secret_key: String,
    zone: String,
    project_id: Option<String>,
    page_size: u32,
}

impl std::fmt::Debug for ScalewayBlockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalewayBlockProvider")
            .field("api_url", &self.api_url)
            .field("zone", &self.zone)
            .field("project_id", &self.project_id)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl ScalewayBlockProvider {
    /// Constructs a provider from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration fails validation or the
    /// HTTP client cannot be built.
    pub fn new(config: &AutopruneConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        // Callers bound each call more tightly; this only stops a stuck
        // connection from outliving the invocation.
        let backstop = Duration::from_secs(
            config
                .delete_timeout_seconds
                .max(config.list_timeout_seconds)
                .saturating_add(5),
        );
        let client = Client::builder()
            .timeout(backstop)
            .build()
            .map_err(|err| ConfigError::HttpClient(err.to_string()))?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_owned(),
            secret_key: config.secret_key.clone(),
            zone: config.region.clone(),
            project_id: config.project_id.clone(),
            page_size: config.page_size,
        })
    }

    /// Returns the zone this provider lists and deletes in.
    #[must_use]
    pub fn zone(&self) -> &str {
        &self.zone
    }

    fn volumes_url(&self, zone: &str) -> String {
        format!("{}/zones/{zone}/volumes", self.api_url)
    }

    fn volume_url(&self, volume: &VolumeDescriptor) -> String {
        let zone = if volume.region.is_empty() {
            self.zone.as_str()
        } else {
            volume.region.as_str()
        };
        format!("{}/{}", self.volumes_url(zone), volume.id)
    }

    /// Sends a request and returns the body. Non-success statuses are
    /// classified into provider errors.
    async fn send(&self, request: RequestBuilder) -> Result<Vec<u8>, ProviderError> {
        let response = request
            .header(AUTH_HEADER, &self.secret_key)
            .send()
            .await
            .map_err(|err| error::from_transport(&err))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| error::from_transport(&err))?;
        if status.is_success() {
            return Ok(body.to_vec());
        }
        Err(error::from_status(status, &body))
    }

    fn page_number(cursor: Option<&PageCursor>) -> Result<u32, ProviderError> {
        cursor.map_or(Ok(1), |token| {
            token.as_str().parse::<u32>().map_err(|err| {
                ProviderError::new(
                    ProviderErrorKind::Malformed,
                    format!("invalid page cursor `{token}`: {err}"),
                )
            })
        })
    }

    async fn list(&self, cursor: Option<&PageCursor>) -> Result<VolumePage, ProviderError> {
        let page = Self::page_number(cursor)?;
        let mut query = vec![
            ("page", page.to_string()),
            ("page_size", self.page_size.to_string()),
        ];
        if let Some(project_id) = &self.project_id {
            query.push(("project_id", project_id.clone()));
        }

        let request = self.client.get(self.volumes_url(&self.zone)).query(&query);
        let body = self.send(request).await?;
        let parsed: ListVolumesResponse =
            serde_json::from_slice(&body).map_err(|err| error::malformed(&err))?;

        let returned = parsed.volumes.len();
        let next = types::next_cursor(page, self.page_size, returned, parsed.total_count);
        debug!(
            zone = %self.zone,
            page,
            returned,
            total_count = parsed.total_count,
            "fetched volume page"
        );
        let volumes = parsed
            .volumes
            .into_iter()
            .map(|volume| volume.into_descriptor(&self.zone))
            .collect();
        Ok(VolumePage { volumes, next })
    }

    async fn fetch(
        &self,
        volume: &VolumeDescriptor,
    ) -> Result<Option<VolumeDescriptor>, ProviderError> {
        let request = self.client.get(self.volume_url(volume));
        match self.send(request).await {
            Ok(body) => {
                let parsed: ScalewayVolume =
                    serde_json::from_slice(&body).map_err(|err| error::malformed(&err))?;
                Ok(Some(parsed.into_descriptor(&volume.region)))
            }
            Err(err) if err.kind == ProviderErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn delete(&self, volume: &VolumeDescriptor) -> Result<(), ProviderError> {
        let request = self.client.delete(self.volume_url(volume));
        self.send(request).await.map(|_| ())
    }
}

impl VolumeProvider for ScalewayBlockProvider {
    fn list_page<'a>(&'a self, cursor: Option<&'a PageCursor>) -> ProviderFuture<'a, VolumePage> {
        Box::pin(async move { self.list(cursor).await })
    }

    fn fetch_volume<'a>(
        &'a self,
        volume: &'a VolumeDescriptor,
    ) -> ProviderFuture<'a, Option<VolumeDescriptor>> {
        Box::pin(async move { self.fetch(volume).await })
    }

    fn delete_volume<'a>(&'a self, volume: &'a VolumeDescriptor) -> ProviderFuture<'a, ()> {
        Box::pin(async move { self.delete(volume).await })
    }
}

#[cfg(test)]
mod tests;
