//! Session client for the StreamVault backend.
//!
//! Every application call goes through `SessionClient::send`, which signs the
//! request with the current bearer token and recovers from an expired
//! credential by refreshing it once and replaying the request. Concurrent
//! authorization failures share a single refresh.

use std::sync::Arc;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::singleflight::SingleFlight;
use super::{ApiError, ApiRequest, ApiResponse, FileUpload, HttpTransport};
use crate::auth::store::notice_text;
use crate::auth::{CredentialStore, Session};
use crate::models::{AvatarUrlRequest, User};
use crate::notify::{Notice, Notifier};

const AVATAR_UPLOAD_PATH: &str = "/uploads/avatar";
const AVATAR_URL_PATH: &str = "/uploads/avatar-url";

/// Where the refresh cycle currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
    /// Set while a failed refresh is being settled, then back to `Idle`.
    Failed,
}

type RefreshOutcome = std::result::Result<(), Arc<ApiError>>;

/// Clone is cheap - all state is shared behind `Arc`s.
#[derive(Clone)]
pub struct SessionClient {
    store: Arc<CredentialStore>,
    refresh: Arc<SingleFlight<RefreshOutcome>>,
    state: Arc<watch::Sender<RefreshState>>,
}

impl SessionClient {
    pub fn new(store: Arc<CredentialStore>) -> Self {
        let (state, _) = watch::channel(RefreshState::Idle);
        Self {
            store,
            refresh: Arc::new(SingleFlight::new()),
            state: Arc::new(state),
        }
    }

    /// Build a client talking HTTP to `base_url`.
    pub fn connect(base_url: &str, session: Session, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(base_url)?);
        let store = CredentialStore::new(transport, session, notifier);
        Ok(Self::new(Arc::new(store)))
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn refresh_state(&self) -> RefreshState {
        *self.state.borrow()
    }

    pub fn subscribe_refresh_state(&self) -> watch::Receiver<RefreshState> {
        self.state.subscribe()
    }

    /// Send a request, recovering from one expired credential per unit of
    /// the request's retry budget.
    ///
    /// Non-2xx responses other than a recoverable 401 come back as the
    /// matching `ApiError`. If the refresh fails, the refresh error is
    /// returned rather than the original 401.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut budget = request.retry_budget;

        loop {
            let token = self.store.token().await;
            let signed = request.signed(token.as_deref());
            let response = self.store.transport().send(&signed).await?;

            if !response.is_unauthorized() {
                return response.error_for_status();
            }

            if !budget.try_consume() {
                debug!(method = %request.method, path = %request.path, "Unauthorized with no retries left");
                return Err(ApiError::from_status(response.status, &response.body));
            }

            debug!(method = %request.method, path = %request.path, "Unauthorized, waiting on token refresh");
            self.refresh().await?;
            debug!(method = %request.method, path = %request.path, "Replaying request");
        }
    }

    /// Join the in-flight refresh, or start one.
    async fn refresh(&self) -> Result<(), ApiError> {
        let store = Arc::clone(&self.store);
        let state = Arc::clone(&self.state);

        self.refresh
            .run(move || async move {
                state.send_replace(RefreshState::Refreshing);
                let outcome = store.refresh_token().await.map_err(Arc::new);
                match outcome {
                    Ok(()) => info!("Credential refreshed, replaying waiting requests"),
                    Err(ref e) => {
                        warn!(error = %e, "Credential refresh failed, rejecting waiting requests");
                        state.send_replace(RefreshState::Failed);
                    }
                }
                state.send_replace(RefreshState::Idle);
                outcome
            })
            .await
            .map_err(ApiError::RefreshFailed)
    }

    // ===== Typed helpers =====

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(ApiRequest::get(path)).await?.json()
    }

    pub async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(ApiRequest::post(path).json(body)?).await?.json()
    }

    pub async fn put_json<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(ApiRequest::put(path).json(body)?).await?.json()
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(ApiRequest::delete(path)).await.map(|_| ())
    }

    // ===== Profile =====

    /// Fetch a user's public profile
    pub async fn fetch_user(&self, id: i64) -> Result<User, ApiError> {
        let result = self.get_json(&format!("/users/{}", id)).await;
        if let Err(ref e) = result {
            warn!(id, error = %e, "Fetching user failed");
            self.store
                .notifier()
                .notify(Notice::error(notice_text(e, "Failed to fetch user")));
        }
        result
    }

    /// Upload a new avatar image for the signed-in user.
    pub async fn update_profile(&self, upload: FileUpload) -> Result<serde_json::Value, ApiError> {
        let request = ApiRequest::post(AVATAR_UPLOAD_PATH).upload(upload);
        self.update_profile_with(Ok(request), None, "Profile updated successfully", "Failed to update profile")
            .await
    }

    /// Point the signed-in user's avatar at `avatar_url`.
    pub async fn update_avatar_url(&self, avatar_url: &str) -> Result<serde_json::Value, ApiError> {
        let request = ApiRequest::post(AVATAR_URL_PATH).json(&AvatarUrlRequest { avatar_url });
        self.update_profile_with(
            request,
            Some(avatar_url),
            "Avatar updated successfully",
            "Failed to update avatar",
        )
        .await
    }

    /// Shared flow for profile changes: the in-progress flag is held for the
    /// whole call and the outcome is always reported.
    async fn update_profile_with(
        &self,
        request: Result<ApiRequest, ApiError>,
        avatar_url: Option<&str>,
        success: &str,
        fallback: &str,
    ) -> Result<serde_json::Value, ApiError> {
        self.store.set_profile_update_in_progress(true).await;

        let result = match request {
            Ok(request) => self.send(request).await,
            Err(e) => Err(e),
        };

        let outcome = match result {
            Ok(response) => {
                let body = response_value(&response);
                if let Some(avatar_url) = avatar_url {
                    self.store.apply_avatar_url(avatar_url).await;
                }
                self.store.notifier().notify(Notice::success(success));
                Ok(body)
            }
            Err(e) => {
                warn!(error = %e, "Profile update failed");
                self.store.notifier().notify(Notice::error(notice_text(&e, fallback)));
                Err(e)
            }
        };

        self.store.set_profile_update_in_progress(false).await;
        outcome
    }
}

/// Body of a successful response as JSON. Some endpoints answer with plain
/// text, which comes back as a JSON string.
fn response_value(response: &ApiResponse) -> serde_json::Value {
    let body = response.body.trim();
    if body.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| serde_json::Value::String(body.to_string()))
}
