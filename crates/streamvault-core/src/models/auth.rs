//! Request and response bodies for the auth endpoints.

use serde::{Deserialize, Serialize};

use super::User;

#[derive(Debug, Clone, Serialize)]
pub struct SignUpRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignInRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarUrlRequest<'a> {
    pub avatar_url: &'a str,
}

/// Sign-in returns the user record itself, optionally with the token inline.
#[derive(Debug, Clone, Deserialize)]
pub struct SignInResponse {
    #[serde(default, alias = "accessToken")]
    pub token: Option<String>,
    #[serde(flatten)]
    pub user: User,
}

/// Refresh may return a bare token, a token plus the user, or nothing in the
/// body (cookie-only delivery).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefreshResponse {
    #[serde(default, alias = "accessToken")]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}
