//! REST client for the local sub-store sidecar

use std::fmt;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::SyncError;
use crate::substore::models::{ApiResponse, ProfileResource, SubResource, MIHOMO_NAME, SUB_NAME};

/// Fixed timeout for sidecar requests
const SIDECAR_TIMEOUT: Duration = Duration::from_secs(10);

/// Attempts made by an existence check before giving up
const CHECK_ATTEMPTS: u32 = 2;

/// Pause between existence check attempts
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// The two resources managed on the sidecar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Sub,
    Profile,
}

impl Resource {
    pub fn name(&self) -> &'static str {
        match self {
            Resource::Sub => SUB_NAME,
            Resource::Profile => MIHOMO_NAME,
        }
    }

    fn check_path(&self) -> String {
        match self {
            Resource::Sub => format!("/api/sub/{}", SUB_NAME),
            Resource::Profile => format!("/api/wholeFile/{}", MIHOMO_NAME),
        }
    }

    fn create_path(&self) -> &'static str {
        match self {
            Resource::Sub => "/api/subs",
            Resource::Profile => "/api/files",
        }
    }

    fn update_path(&self) -> String {
        match self {
            Resource::Sub => format!("/api/sub/{}", SUB_NAME),
            Resource::Profile => format!("/api/file/{}", MIHOMO_NAME),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Outcome of an existence check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Exists,
    Missing,
}

/// Client for the sub-store REST API
#[derive(Clone)]
pub struct SubStoreClient {
    base_url: String,
    client: Client,
    retry_delay: Duration,
}

impl SubStoreClient {
    /// Create a client for the sidecar at `base_url` (e.g. `http://127.0.0.1:8299`)
    pub fn new(base_url: impl Into<String>) -> crate::Result<Self> {
        let client = Client::builder()
            .timeout(SIDECAR_TIMEOUT)
            .no_proxy()
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check whether `resource` exists.
    ///
    /// A 404 is a definitive "missing". Transport errors, other non-200
    /// statuses, bodies that are not a JSON envelope and envelopes whose
    /// status is not "success" are retried once after a pause.
    pub async fn check(&self, resource: Resource) -> Result<Presence, SyncError> {
        let url = self.url(&resource.check_path());
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.check_once(&url, resource).await {
                Ok(presence) => return Ok(presence),
                Err(e) if attempt >= CHECK_ATTEMPTS => {
                    return Err(SyncError::CheckExhausted {
                        resource: resource.name(),
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    debug!("Checking {} failed (attempt {}): {}", resource, attempt, e);
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    async fn check_once(&self, url: &str, resource: Resource) -> Result<Presence, SyncError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(Presence::Missing);
        }

        let body = response.bytes().await?;
        if status != StatusCode::OK {
            return Err(SyncError::UnexpectedStatus {
                resource: resource.name(),
                status: status.as_u16(),
            });
        }

        let envelope: ApiResponse =
            serde_json::from_slice(&body).map_err(|e| SyncError::InvalidPayload {
                resource: resource.name(),
                reason: e.to_string(),
            })?;
        if !envelope.is_success() {
            return Err(SyncError::InvalidPayload {
                resource: resource.name(),
                reason: format!("status is {:?}", envelope.status),
            });
        }

        Ok(Presence::Exists)
    }

    pub async fn create_sub(&self, sub: &SubResource) -> Result<(), SyncError> {
        self.send(Resource::Sub, reqwest::Method::POST, sub).await
    }

    pub async fn update_sub(&self, sub: &SubResource) -> Result<(), SyncError> {
        self.send(Resource::Sub, reqwest::Method::PATCH, sub).await
    }

    pub async fn create_profile(&self, profile: &ProfileResource) -> Result<(), SyncError> {
        self.send(Resource::Profile, reqwest::Method::POST, profile)
            .await
    }

    pub async fn update_profile(&self, profile: &ProfileResource) -> Result<(), SyncError> {
        self.send(Resource::Profile, reqwest::Method::PATCH, profile)
            .await
    }

    /// POST creates (expects 201), PATCH updates (expects 200). Never retried.
    async fn send<T: Serialize>(
        &self,
        resource: Resource,
        method: reqwest::Method,
        body: &T,
    ) -> Result<(), SyncError> {
        let (url, expected) = if method == reqwest::Method::POST {
            (self.url(resource.create_path()), StatusCode::CREATED)
        } else {
            (self.url(&resource.update_path()), StatusCode::OK)
        };

        info!(resource = resource.name(), method = method.as_str(), url = url.as_str(), "Sending to sub-store");

        let response = self
            .client
            .request(method, &url)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status != expected {
            return Err(SyncError::UnexpectedStatus {
                resource: resource.name(),
                status: status.as_u16(),
            });
        }

        debug!(resource = resource.name(), status = status.as_u16(), "Sub-store accepted request");
        Ok(())
    }
}
