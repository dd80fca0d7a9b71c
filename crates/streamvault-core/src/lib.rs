//! StreamVault core - session client, credential store and configuration
//! for the StreamVault video backend.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod notify;

pub use api::{ApiError, ApiRequest, ApiResponse, FileUpload, RefreshState, SessionClient};
pub use auth::{CredentialStore, Keychain, Session};
pub use config::Config;
pub use models::User;
pub use notify::{ChannelNotifier, LogNotifier, Notice, NoticeLevel, Notifier};
