//! Session artifacts and their persistence
//!
//! A successful login produces exactly one [`SessionArtifact`]. The caller
//! owns it; a [`SessionStore`] writes it somewhere later runs can reuse.

mod file;

pub use file::{FileSessionStore, SessionMetadata};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::credentials::Platform;
use crate::error::Result;
use crate::page::Cookie;

/// Everything later components need from a finished login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionArtifact {
    pub account: String,
    pub platform: Platform,
    pub cookies: Vec<Cookie>,
    /// Anti-forgery token for privileged requests, if the home page had one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_token: Option<String>,
    pub captured_at: DateTime<Utc>,
}

impl SessionArtifact {
    pub fn new(account: impl Into<String>, platform: Platform, cookies: Vec<Cookie>) -> Self {
        Self {
            account: account.into(),
            platform,
            cookies,
            request_token: None,
            captured_at: Utc::now(),
        }
    }

    pub fn with_request_token(mut self, token: Option<String>) -> Self {
        self.request_token = token;
        self
    }

    pub fn has_request_token(&self) -> bool {
        self.request_token.is_some()
    }
}

/// Summary of one stored session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub account: String,
    pub platform: Platform,
    pub cookie_count: usize,
}

/// Where finished sessions are persisted
pub trait SessionStore: Send + Sync {
    /// Persist the cookie set of a finished login.
    fn save(&self, artifact: &SessionArtifact) -> Result<()>;

    /// Cookies previously saved for an account and platform.
    fn load_cookies(&self, account: &str, platform: Platform) -> Result<Option<Vec<Cookie>>>;

    /// Every stored session.
    fn list(&self) -> Result<Vec<StoredSession>>;

    /// Remove stored sessions for one account, or all of them. Returns how many were removed.
    fn clear(&self, account: Option<&str>) -> Result<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_token_is_optional_in_json() {
        let artifact = SessionArtifact::new("a@b.c", Platform::Desktop, vec![]);
        let json = serde_json::to_value(&artifact).unwrap();
        assert!(json.get("request_token").is_none());
        assert!(!artifact.has_request_token());

        let artifact = artifact.with_request_token(Some("tok".into()));
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["request_token"], "tok");
        assert_eq!(json["platform"], "desktop");
    }
}
