//! Idempotent reconciliation of the managed sub-store resources

use chrono::Local;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument};

use crate::config::Config;
use crate::error::SyncError;
use crate::substore::client::{Presence, Resource, SubStoreClient};
use crate::substore::models::{ProfileResource, SubResource};
use crate::substore::url::rewrite;

/// What a sync cycle did to one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceAction {
    Created,
    Updated,
    Unchanged,
}

/// Outcome of a successful sync cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub sub: ResourceAction,
    pub profile: ResourceAction,
}

/// Keeps the `sub` and `mihomo` resources on the sidecar in line with local data.
///
/// The last overwrite URL written to the profile is remembered so an
/// unchanged URL costs no remote write. The memo is lost on restart, which
/// only means the next cycle writes the profile once more.
pub struct SubStoreSync {
    client: SubStoreClient,
    overwrite_url: String,
    github_proxy: String,
    last_applied: Mutex<String>,
}

impl SubStoreSync {
    pub fn new(client: SubStoreClient, overwrite_url: String, github_proxy: String) -> Self {
        Self {
            client,
            overwrite_url,
            github_proxy,
            last_applied: Mutex::new(String::new()),
        }
    }

    /// Build a sync for the sidecar described by `config`
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let client = SubStoreClient::new(config.sub_store_base_url())?;
        Ok(Self::new(
            client,
            config.mihomo_overwrite_url.clone(),
            config.github_proxy.clone(),
        ))
    }

    /// Replace the configured overwrite URL, e.g. after a config reload
    pub fn set_overwrite_url(&mut self, url: String) {
        self.overwrite_url = url;
    }

    /// Overwrite URL currently believed to be live on the profile
    pub async fn last_applied(&self) -> String {
        self.last_applied.lock().await.clone()
    }

    /// Run one cycle and log the outcome instead of returning it
    pub async fn update(&self, content: &str) {
        match self.sync(content).await {
            Ok(report) => info!(
                sub = ?report.sub,
                profile = ?report.profile,
                "Sub-store sync complete"
            ),
            Err(e) => error!("Sub-store sync aborted: {}", e),
        }
    }

    /// Run one reconciliation cycle.
    ///
    /// The sub stage always runs first; any hard failure ends the cycle
    /// before later writes. Cycles are serialized on the memo lock.
    #[instrument(skip(self, content), fields(base_url = %self.client.base_url(), bytes = content.len()))]
    pub async fn sync(&self, content: &str) -> Result<SyncReport, SyncError> {
        let mut last_applied = self.last_applied.lock().await;

        let sub = self.sync_sub(content).await?;
        let profile = self.sync_profile(&mut last_applied).await?;

        Ok(SyncReport { sub, profile })
    }

    /// A missing sub is created even without an overwrite URL; an existing
    /// one is only updated once the overwrite URL is known to be set.
    async fn sync_sub(&self, content: &str) -> Result<ResourceAction, SyncError> {
        let sub = SubResource::managed(content);
        match self.client.check(Resource::Sub).await? {
            Presence::Missing => {
                debug!("Sub resource missing, creating it");
                self.client.create_sub(&sub).await?;
                self.require_overwrite_url()?;
                Ok(ResourceAction::Created)
            }
            Presence::Exists => {
                self.require_overwrite_url()?;
                self.client.update_sub(&sub).await?;
                Ok(ResourceAction::Updated)
            }
        }
    }

    fn require_overwrite_url(&self) -> Result<(), SyncError> {
        if self.overwrite_url.is_empty() {
            return Err(SyncError::MissingOverwriteUrl);
        }
        Ok(())
    }

    async fn sync_profile(&self, last_applied: &mut String) -> Result<ResourceAction, SyncError> {
        let presence = self.client.check(Resource::Profile).await?;
        let profile = || {
            let url = rewrite(&self.overwrite_url, &Local::now(), &self.github_proxy);
            ProfileResource::managed(&url)
        };

        match presence {
            Presence::Missing => {
                debug!("Mihomo profile missing, creating it");
                self.client.create_profile(&profile()).await?;
            }
            Presence::Exists if *last_applied == self.overwrite_url => {
                return Ok(ResourceAction::Unchanged);
            }
            Presence::Exists => {
                self.client.update_profile(&profile()).await?;
                debug!("Mihomo overwrite URL updated");
            }
        }

        let action = match presence {
            Presence::Missing => ResourceAction::Created,
            Presence::Exists => ResourceAction::Updated,
        };
        *last_applied = self.overwrite_url.clone();
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use axum::{
        extract::State,
        http::StatusCode,
        response::IntoResponse,
        routing::{get, patch, post},
        Json, Router,
    };
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    const OVERWRITE: &str = "https://example.com/mihomo.js";

    /// In-memory sidecar recording every write it receives
    #[derive(Default)]
    struct Sidecar {
        sub: Option<SubResource>,
        profile: Option<ProfileResource>,
        calls: Vec<String>,
        fail_sub_check: bool,
        create_status: Option<u16>,
        profile_update_status: Option<u16>,
    }

    type Shared = Arc<std::sync::Mutex<Sidecar>>;

    fn status(code: Option<u16>, default: StatusCode) -> StatusCode {
        code.and_then(|c| StatusCode::from_u16(c).ok())
            .unwrap_or(default)
    }

    async fn get_sub(State(state): State<Shared>) -> impl IntoResponse {
        let mut s = state.lock().unwrap();
        s.calls.push("GET sub".into());
        if s.fail_sub_check {
            return (StatusCode::BAD_GATEWAY, Json(json!({"status": "failed"})));
        }
        match &s.sub {
            Some(sub) => (StatusCode::OK, Json(json!({"status": "success", "data": sub}))),
            None => (StatusCode::NOT_FOUND, Json(json!({"status": "failed"}))),
        }
    }

    async fn create_sub(State(state): State<Shared>, Json(body): Json<SubResource>) -> StatusCode {
        let mut s = state.lock().unwrap();
        s.calls.push("POST sub".into());
        let code = status(s.create_status, StatusCode::CREATED);
        if code == StatusCode::CREATED {
            s.sub = Some(body);
        }
        code
    }

    async fn update_sub(State(state): State<Shared>, Json(body): Json<SubResource>) -> StatusCode {
        let mut s = state.lock().unwrap();
        s.calls.push("PATCH sub".into());
        s.sub = Some(body);
        StatusCode::OK
    }

    async fn get_profile(State(state): State<Shared>) -> impl IntoResponse {
        let mut s = state.lock().unwrap();
        s.calls.push("GET mihomo".into());
        match &s.profile {
            Some(p) => (StatusCode::OK, Json(json!({"status": "success", "data": p}))),
            None => (StatusCode::NOT_FOUND, Json(json!({"status": "failed"}))),
        }
    }

    async fn create_profile(
        State(state): State<Shared>,
        Json(body): Json<ProfileResource>,
    ) -> StatusCode {
        let mut s = state.lock().unwrap();
        s.calls.push("POST mihomo".into());
        let code = status(s.create_status, StatusCode::CREATED);
        if code == StatusCode::CREATED {
            s.profile = Some(body);
        }
        code
    }

    async fn update_profile(
        State(state): State<Shared>,
        Json(body): Json<ProfileResource>,
    ) -> StatusCode {
        let mut s = state.lock().unwrap();
        s.calls.push("PATCH mihomo".into());
        let code = status(s.profile_update_status, StatusCode::OK);
        if code == StatusCode::OK {
            s.profile = Some(body);
        }
        code
    }

    async fn start(sidecar: Sidecar, overwrite: &str) -> (SubStoreSync, Shared) {
        let state: Shared = Arc::new(std::sync::Mutex::new(sidecar));
        let router = Router::new()
            .route("/api/sub/sub", get(get_sub).patch(update_sub))
            .route("/api/subs", post(create_sub))
            .route("/api/wholeFile/mihomo", get(get_profile))
            .route("/api/files", post(create_profile))
            .route("/api/file/mihomo", patch(update_profile))
            .with_state(state.clone());
        let addr = serve(router).await;
        let client = SubStoreClient::new(format!("http://{}", addr))
            .unwrap()
            .with_retry_delay(Duration::from_millis(10));
        let sync = SubStoreSync::new(client, overwrite.to_string(), String::new());
        (sync, state)
    }

    fn calls(state: &Shared) -> Vec<String> {
        state.lock().unwrap().calls.clone()
    }

    fn existing() -> Sidecar {
        Sidecar {
            sub: Some(SubResource::managed("old")),
            profile: Some(ProfileResource::managed(OVERWRITE)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_creates_missing_resources_in_order() {
        let (sync, state) = start(Sidecar::default(), OVERWRITE).await;

        let report = sync.sync("node list").await.unwrap();
        assert_eq!(report.sub, ResourceAction::Created);
        assert_eq!(report.profile, ResourceAction::Created);
        assert_eq!(
            calls(&state),
            ["GET sub", "POST sub", "GET mihomo", "POST mihomo"]
        );
        assert_eq!(sync.last_applied().await, OVERWRITE);

        let s = state.lock().unwrap();
        assert_eq!(s.sub.as_ref().unwrap().content, "node list");
        assert_eq!(
            s.profile.as_ref().unwrap().process[0].args.content,
            OVERWRITE
        );
    }

    #[tokio::test]
    async fn test_failed_create_aborts_cycle() {
        let sidecar = Sidecar {
            create_status: Some(500),
            ..Default::default()
        };
        let (sync, state) = start(sidecar, OVERWRITE).await;

        let err = sync.sync("node list").await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::UnexpectedStatus {
                resource: "sub",
                status: 500
            }
        ));
        assert_eq!(calls(&state), ["GET sub", "POST sub"]);
        assert_eq!(sync.last_applied().await, "");
    }

    #[tokio::test]
    async fn test_sub_check_failure_skips_profile_stage() {
        let sidecar = Sidecar {
            fail_sub_check: true,
            ..existing()
        };
        let (sync, state) = start(sidecar, OVERWRITE).await;

        let err = sync.sync("node list").await.unwrap_err();
        assert!(matches!(err, SyncError::CheckExhausted { resource: "sub", .. }));
        assert_eq!(calls(&state), ["GET sub", "GET sub"]);
    }

    #[tokio::test]
    async fn test_existing_sub_always_updated() {
        let (sync, state) = start(existing(), OVERWRITE).await;

        let first = sync.sync("first").await.unwrap();
        let second = sync.sync("second").await.unwrap();

        assert_eq!(first.sub, ResourceAction::Updated);
        assert_eq!(second.sub, ResourceAction::Updated);
        assert_eq!(state.lock().unwrap().sub.as_ref().unwrap().content, "second");
    }

    #[tokio::test]
    async fn test_profile_patched_once_then_skipped() {
        let (sync, state) = start(existing(), OVERWRITE).await;

        let first = sync.sync("list").await.unwrap();
        assert_eq!(first.profile, ResourceAction::Updated);
        assert_eq!(sync.last_applied().await, OVERWRITE);

        let second = sync.sync("list").await.unwrap();
        assert_eq!(second.profile, ResourceAction::Unchanged);

        let patches = calls(&state)
            .iter()
            .filter(|c| *c == "PATCH mihomo")
            .count();
        assert_eq!(patches, 1);
    }

    #[tokio::test]
    async fn test_changed_overwrite_url_is_patched() {
        let (mut sync, state) = start(existing(), OVERWRITE).await;
        sync.sync("list").await.unwrap();

        let changed = "https://example.com/other.js";
        sync.set_overwrite_url(changed.to_string());
        let report = sync.sync("list").await.unwrap();

        assert_eq!(report.profile, ResourceAction::Updated);
        assert_eq!(sync.last_applied().await, changed);
        assert_eq!(
            state.lock().unwrap().profile.as_ref().unwrap().process[0]
                .args
                .content,
            changed
        );
    }

    #[tokio::test]
    async fn test_failed_profile_update_keeps_memo() {
        let sidecar = Sidecar {
            profile_update_status: Some(500),
            ..existing()
        };
        let (sync, state) = start(sidecar, OVERWRITE).await;

        let err = sync.sync("list").await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::UnexpectedStatus {
                resource: "mihomo",
                status: 500
            }
        ));
        assert_eq!(sync.last_applied().await, "");

        state.lock().unwrap().profile_update_status = None;
        let report = sync.sync("list").await.unwrap();
        assert_eq!(report.profile, ResourceAction::Updated);
        assert_eq!(sync.last_applied().await, OVERWRITE);
    }

    #[tokio::test]
    async fn test_missing_overwrite_url_is_config_error() {
        let (sync, state) = start(existing(), "").await;

        let err = sync.sync("fresh list").await.unwrap_err();
        assert!(matches!(err, SyncError::MissingOverwriteUrl));
        assert_eq!(calls(&state), ["GET sub"]);
        assert_eq!(state.lock().unwrap().sub.as_ref().unwrap().content, "old");
    }

    #[tokio::test]
    async fn test_missing_overwrite_url_still_creates_sub() {
        let (sync, state) = start(Sidecar::default(), "").await;

        let err = sync.sync("node list").await.unwrap_err();
        assert!(matches!(err, SyncError::MissingOverwriteUrl));
        assert_eq!(calls(&state), ["GET sub", "POST sub"]);
        assert!(state.lock().unwrap().profile.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_cycles_patch_profile_once() {
        let (sync, state) = start(existing(), OVERWRITE).await;

        let (first, second) = tokio::join!(sync.sync("a"), sync.sync("b"));
        let mut actions = vec![first.unwrap().profile, second.unwrap().profile];
        actions.sort_by_key(|a| *a == ResourceAction::Unchanged);
        assert_eq!(actions, [ResourceAction::Updated, ResourceAction::Unchanged]);

        let patches = calls(&state)
            .iter()
            .filter(|c| *c == "PATCH mihomo")
            .count();
        assert_eq!(patches, 1);
        assert_eq!(sync.last_applied().await, OVERWRITE);
    }

    #[tokio::test]
    async fn test_failed_profile_create_keeps_memo() {
        let sidecar = Sidecar {
            sub: Some(SubResource::managed("old")),
            create_status: Some(500),
            ..Default::default()
        };
        let (sync, state) = start(sidecar, OVERWRITE).await;

        let err = sync.sync("list").await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::UnexpectedStatus {
                resource: "mihomo",
                status: 500
            }
        ));
        assert_eq!(sync.last_applied().await, "");

        state.lock().unwrap().create_status = None;
        let report = sync.sync("list").await.unwrap();
        assert_eq!(report.profile, ResourceAction::Created);
        assert_eq!(sync.last_applied().await, OVERWRITE);

        let creates = calls(&state)
            .iter()
            .filter(|c| *c == "POST mihomo")
            .count();
        assert_eq!(creates, 2);
    }

    #[tokio::test]
    async fn test_profile_content_is_rewritten() {
        let sidecar = Sidecar::default();
        let state: Shared = Arc::new(std::sync::Mutex::new(sidecar));
        let router = Router::new()
            .route("/api/sub/sub", get(get_sub).patch(update_sub))
            .route("/api/subs", post(create_sub))
            .route("/api/wholeFile/mihomo", get(get_profile))
            .route("/api/files", post(create_profile))
            .with_state(state.clone());
        let addr = serve(router).await;
        let client = SubStoreClient::new(format!("http://{}", addr)).unwrap();
        let raw = "https://raw.githubusercontent.com/u/r/main/mihomo.js";
        let sync = SubStoreSync::new(client, raw.to_string(), "https://gh.example/".to_string());

        sync.sync("list").await.unwrap();

        let s = state.lock().unwrap();
        assert_eq!(
            s.profile.as_ref().unwrap().process[0].args.content,
            format!("https://gh.example/{}", raw)
        );
        drop(s);
        assert_eq!(sync.last_applied().await, raw);
    }
}
