//! Data models exchanged with the StreamVault backend.
//!
//! - `User`: the identity record for the signed-in user
//! - Auth payloads: sign-up, sign-in, refresh and avatar bodies

pub mod auth;
pub mod user;

pub use auth::{AvatarUrlRequest, RefreshResponse, SignInRequest, SignInResponse, SignUpRequest};
pub use user::{User, ADMIN_ROLE};
