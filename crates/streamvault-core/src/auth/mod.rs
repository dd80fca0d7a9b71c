//! Authentication module for managing the user session and credentials.
//!
//! This module provides:
//! - `Session`: who is signed in and with what bearer token
//! - `CredentialStore`: the only writer of the session (sign-up, login,
//!   logout, auth check, token refresh)
//! - `Keychain`: remembered passwords via the OS keychain
//!
//! Sessions can be persisted to disk so a restart resumes them.

pub mod keychain;
pub mod session;
pub mod store;

pub use keychain::Keychain;
pub use session::{Session, SessionData, SessionSnapshot};
pub use store::{
    CredentialStore, LOGOUT_PATH, ME_PATH, REFRESH_PATH, SIGNIN_PATH, SIGNUP_PATH, TOKEN_COOKIE,
};
