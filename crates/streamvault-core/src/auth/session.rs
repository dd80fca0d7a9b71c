use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::User;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// The part of a session that survives a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub user: Option<User>,
    pub token: Option<String>,
    pub signed_in_at: DateTime<Utc>,
}

/// Read-only copy of the session handed out to callers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub current_user: Option<User>,
    pub bearer_token: Option<String>,
    pub signed_in_at: Option<DateTime<Utc>>,
    pub auth_check_in_progress: bool,
    pub profile_update_in_progress: bool,
}

/// Who is signed in and with what credential.
///
/// Without a cache directory the session lives in memory only.
#[derive(Debug, Default)]
pub struct Session {
    cache_dir: Option<PathBuf>,
    current_user: Option<User>,
    bearer_token: Option<String>,
    signed_in_at: Option<DateTime<Utc>>,
    pub auth_check_in_progress: bool,
    pub profile_update_in_progress: bool,
}

impl Session {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir: Some(cache_dir),
            ..Self::default()
        }
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load session from disk. Returns whether anything was restored.
    pub fn load(&mut self) -> Result<bool> {
        let Some(path) = self.session_path() else {
            return Ok(false);
        };
        if !path.exists() {
            return Ok(false);
        }

        let contents = std::fs::read_to_string(&path)
            .context("Failed to read session file")?;
        let data: SessionData = serde_json::from_str(&contents)
            .context("Failed to parse session file")?;

        self.current_user = data.user;
        self.bearer_token = data.token;
        self.signed_in_at = Some(data.signed_in_at);
        Ok(self.current_user.is_some() || self.bearer_token.is_some())
    }

    /// Save session to disk. An empty session removes the file.
    pub fn save(&self) -> Result<()> {
        let Some(path) = self.session_path() else {
            return Ok(());
        };
        if self.current_user.is_none() && self.bearer_token.is_none() {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = SessionData {
            user: self.current_user.clone(),
            token: self.bearer_token.clone(),
            signed_in_at: self.signed_in_at.unwrap_or_else(Utc::now),
        };
        let contents = serde_json::to_string_pretty(&data)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Drop the user and credential, in memory and on disk
    pub fn clear(&mut self) -> Result<()> {
        self.current_user = None;
        self.bearer_token = None;
        self.signed_in_at = None;
        if let Some(path) = self.session_path() {
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    /// Record a fresh sign-in
    pub fn sign_in(&mut self, user: User, token: Option<String>) {
        self.current_user = Some(user);
        self.bearer_token = token;
        self.signed_in_at = Some(Utc::now());
    }

    pub fn set_user(&mut self, user: Option<User>) {
        self.current_user = user;
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.bearer_token = token;
    }

    /// Get the bearer token if one is held
    pub fn token(&self) -> Option<&str> {
        self.bearer_token.as_deref()
    }

    pub fn user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_user.is_some()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            current_user: self.current_user.clone(),
            bearer_token: self.bearer_token.clone(),
            signed_in_at: self.signed_in_at,
            auth_check_in_progress: self.auth_check_in_progress,
            profile_update_in_progress: self.profile_update_in_progress,
        }
    }

    fn session_path(&self) -> Option<PathBuf> {
        self.cache_dir.as_ref().map(|dir| dir.join(SESSION_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_empty() {
        let session = Session::in_memory();
        assert!(!session.is_authenticated());
        assert_eq!(session.token(), None);
        assert_eq!(session.snapshot(), SessionSnapshot::default());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path().to_path_buf());
        session.sign_in(User::new("erin"), Some("tok-1".to_string()));
        session.auth_check_in_progress = true;
        session.save().unwrap();

        let mut restored = Session::new(dir.path().to_path_buf());
        assert!(restored.load().unwrap());
        assert_eq!(restored.user().map(|u| u.username.as_str()), Some("erin"));
        assert_eq!(restored.token(), Some("tok-1"));
        assert!(!restored.auth_check_in_progress);
    }

    #[test]
    fn test_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path().to_path_buf());
        session.sign_in(User::new("erin"), None);
        session.save().unwrap();
        assert!(dir.path().join(SESSION_FILE).exists());

        session.clear().unwrap();
        assert!(!session.is_authenticated());
        assert!(!dir.path().join(SESSION_FILE).exists());

        let mut restored = Session::new(dir.path().to_path_buf());
        assert!(!restored.load().unwrap());
    }

    #[test]
    fn test_saving_empty_session_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(dir.path().to_path_buf());
        session.sign_in(User::new("erin"), None);
        session.save().unwrap();

        session.set_user(None);
        session.save().unwrap();
        assert!(!dir.path().join(SESSION_FILE).exists());
    }

    #[test]
    fn test_in_memory_session_never_touches_disk() {
        let mut session = Session::in_memory();
        session.sign_in(User::new("frank"), Some("t".to_string()));
        session.save().unwrap();
        assert!(!session.load().unwrap());
        session.clear().unwrap();
        assert_eq!(session.token(), None);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SESSION_FILE), "{not json").unwrap();
        let mut session = Session::new(dir.path().to_path_buf());
        assert!(session.load().is_err());
    }
}
