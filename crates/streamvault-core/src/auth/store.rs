//! The credential store: sole owner of the session.
//!
//! Every mutation of who is signed in goes through here. Calls to the auth
//! endpoints are made directly on the transport and do not go through the
//! session client's 401 recovery.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::Session;
use super::session::SessionSnapshot;
use crate::api::{ApiError, ApiRequest, ApiResponse, Transport};
use crate::models::{RefreshResponse, SignInRequest, SignInResponse, SignUpRequest, User};
use crate::notify::{Notice, Notifier};

pub const SIGNUP_PATH: &str = "/auth/signup";
pub const SIGNIN_PATH: &str = "/auth/signin";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const ME_PATH: &str = "/auth/me";
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Cookie the backend delivers the credential in.
pub const TOKEN_COOKIE: &str = "jwt";

pub struct CredentialStore {
    transport: Arc<dyn Transport>,
    session: RwLock<Session>,
    notifier: Arc<dyn Notifier>,
}

impl CredentialStore {
    pub fn new(transport: Arc<dyn Transport>, session: Session, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            transport,
            session: RwLock::new(session),
            notifier,
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    // ===== Reads =====

    pub async fn token(&self) -> Option<String> {
        self.session.read().await.token().map(str::to_string)
    }

    pub async fn current_user(&self) -> Option<User> {
        self.session.read().await.user().cloned()
    }

    pub async fn auth_check_in_progress(&self) -> bool {
        self.session.read().await.auth_check_in_progress
    }

    pub async fn profile_update_in_progress(&self) -> bool {
        self.session.read().await.profile_update_in_progress
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.session.read().await.snapshot()
    }

    /// True only when a user is signed in and holds the admin role.
    pub async fn is_admin(&self) -> bool {
        self.session.read().await.user().is_some_and(User::is_admin)
    }

    // ===== Auth operations =====

    /// Register a new account. Never touches the session.
    pub async fn sign_up(&self, username: &str, email: &str, password: &str) -> Result<(), ApiError> {
        let request = ApiRequest::post(SIGNUP_PATH).json(&SignUpRequest {
            username,
            email,
            password,
        })?;

        match self.call(&request).await {
            Ok(_) => {
                info!(username, "Account registered");
                self.notifier.notify(Notice::success("Signup successful. Please login."));
                Ok(())
            }
            Err(e) => {
                warn!(username, error = %e, "Signup failed");
                self.notifier
                    .notify(Notice::error(notice_text(&e, "An error occurred during signup")));
                Err(e)
            }
        }
    }

    /// Sign in. On failure the session is left exactly as it was.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, ApiError> {
        let request = ApiRequest::post(SIGNIN_PATH).json(&SignInRequest { username, password })?;

        let signed_in = match self.call(&request).await {
            Ok(response) => response.json::<SignInResponse>(),
            Err(e) => Err(e),
        };

        match signed_in {
            Ok(SignInResponse { token, user }) => {
                let token = token.or_else(|| self.transport.cookie(TOKEN_COOKIE));
                debug!(has_token = token.is_some(), "Sign-in response received");

                let mut session = self.session.write().await;
                session.sign_in(user.clone(), token);
                if let Err(e) = session.save() {
                    warn!(error = %e, "Failed to save session");
                }
                info!(username = %user.username, "Signed in");
                Ok(user)
            }
            Err(e) => {
                warn!(username, error = %e, "Login failed");
                self.notifier.notify(Notice::error(notice_text(&e, "Login failed")));
                Err(e)
            }
        }
    }

    /// Sign out. Local state is cleared whether or not the backend agrees;
    /// a backend failure is still reported.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let token = self.token().await;
        let request = ApiRequest::post(LOGOUT_PATH)
            .json(&serde_json::json!({}))?
            .signed(token.as_deref());

        let result = self.call(&request).await;
        self.clear_local().await;

        match result {
            Ok(_) => {
                info!("Signed out");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Sign-out request failed, local session cleared anyway");
                self.notifier.notify(Notice::error(notice_text(&e, "Error during logout")));
                Err(e)
            }
        }
    }

    /// Restore the user from a still-valid server-side credential.
    /// Failures mean "not signed in" and are never reported to the user.
    pub async fn check_auth(&self) -> Option<User> {
        let token = {
            let mut session = self.session.write().await;
            session.auth_check_in_progress = true;
            session.token().map(str::to_string)
        };

        let request = ApiRequest::get(ME_PATH).signed(token.as_deref());
        let identified = match self.call(&request).await {
            Ok(response) => response.json::<User>(),
            Err(e) => Err(e),
        };

        let mut session = self.session.write().await;
        session.auth_check_in_progress = false;
        match identified {
            Ok(user) => {
                debug!(username = %user.username, "Session restored");
                session.set_user(Some(user.clone()));
                if let Err(e) = session.save() {
                    warn!(error = %e, "Failed to save session");
                }
                Some(user)
            }
            Err(e) => {
                debug!(error = %e, "No active session");
                session.set_user(None);
                if let Err(e) = session.save() {
                    warn!(error = %e, "Failed to save session");
                }
                None
            }
        }
    }

    /// Exchange the current credential for a new one. On failure the session
    /// is torn down and the cause is returned.
    pub async fn refresh_token(&self) -> Result<(), ApiError> {
        let old_token = self.token().await;
        let request = ApiRequest::post(REFRESH_PATH).signed(old_token.as_deref());

        let refreshed = match self.call(&request).await {
            Ok(response) => self.parse_refresh(&response),
            Err(e) => Err(e),
        };

        match refreshed {
            Ok((token, user)) => {
                let mut session = self.session.write().await;
                session.set_token(Some(token));
                if user.is_some() {
                    session.set_user(user);
                }
                if let Err(e) = session.save() {
                    warn!(error = %e, "Failed to save session");
                }
                info!("Session token refreshed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, ending session");
                self.end_session_quietly(old_token.as_deref()).await;
                Err(e)
            }
        }
    }

    // ===== Profile =====

    pub(crate) async fn set_profile_update_in_progress(&self, in_progress: bool) {
        self.session.write().await.profile_update_in_progress = in_progress;
    }

    pub(crate) async fn apply_avatar_url(&self, avatar_url: &str) {
        let mut session = self.session.write().await;
        if let Some(mut user) = session.user().cloned() {
            user.avatar_url = Some(avatar_url.to_string());
            session.set_user(Some(user));
            if let Err(e) = session.save() {
                warn!(error = %e, "Failed to save session");
            }
        }
    }

    // ===== Internals =====

    async fn call(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.transport.send(request).await?.error_for_status()
    }

    fn parse_refresh(&self, response: &ApiResponse) -> Result<(String, Option<User>), ApiError> {
        let body: RefreshResponse = if response.body.trim().is_empty() {
            RefreshResponse::default()
        } else {
            response.json()?
        };
        let token = body
            .token
            .or_else(|| self.transport.cookie(TOKEN_COOKIE))
            .ok_or_else(|| ApiError::InvalidResponse("Refresh response carried no credential".to_string()))?;
        Ok((token, body.user))
    }

    async fn clear_local(&self) {
        if let Err(e) = self.session.write().await.clear() {
            warn!(error = %e, "Failed to remove saved session");
        }
    }

    /// Logout-equivalent teardown after a failed refresh: best-effort
    /// sign-out, then clear. Nothing is shown to the user here.
    async fn end_session_quietly(&self, token: Option<&str>) {
        let request = ApiRequest::post(LOGOUT_PATH).signed(token);
        if let Err(e) = self.call(&request).await {
            debug!(error = %e, "Sign-out after failed refresh did not succeed");
        }
        self.clear_local().await;
    }
}

/// Text for an error notice: the backend's own message when it sent one,
/// otherwise `fallback`.
pub(crate) fn notice_text(error: &ApiError, fallback: &str) -> String {
    match error {
        ApiError::Unauthorized(message)
        | ApiError::AccessDenied(message)
        | ApiError::NotFound(message)
        | ApiError::ServerError(message)
        | ApiError::Rejected { message, .. }
            if !message.trim().is_empty() =>
        {
            message.clone()
        }
        _ => fallback.to_string(),
    }
}
