//! Account credentials and log-safe identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Credentials for one login attempt
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totp_secret: Option<String>,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            totp_secret: None,
        }
    }

    pub fn with_totp_secret(mut self, secret: impl Into<String>) -> Self {
        self.totp_secret = Some(secret.into()).filter(|s: &String| !s.trim().is_empty());
        self
    }

    /// Whether a TOTP seed is pre-provisioned
    pub fn has_totp(&self) -> bool {
        self.totp_secret.as_deref().is_some_and(|s| !s.trim().is_empty())
    }

    /// Account identifier safe for logs
    pub fn masked(&self) -> String {
        mask_account(&self.email)
    }

    /// Copy with secrets replaced, for display
    pub fn redacted(&self) -> Self {
        Self {
            email: self.masked(),
            password: "<redacted>".to_string(),
            totp_secret: self.totp_secret.as_ref().map(|_| "<redacted>".to_string()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.masked())
            .field("password", &"<redacted>")
            .field("totp_secret", &self.totp_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Mask an account identifier, keeping the first two characters and the domain.
pub fn mask_account(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let keep: String = local.chars().take(2).collect();
            format!("{}***@{}", keep, domain)
        }
        None => {
            let keep: String = email.chars().take(2).collect();
            format!("{}***", keep)
        }
    }
}

/// Which browser profile a session belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Desktop,
    Mobile,
}

impl Platform {
    pub fn is_mobile(&self) -> bool {
        matches!(self, Platform::Mobile)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Desktop => "desktop",
            Platform::Mobile => "mobile",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_account() {
        assert_eq!(mask_account("john.doe@example.com"), "jo***@example.com");
        assert_eq!(mask_account("a@b.c"), "a***@b.c");
        assert_eq!(mask_account("plainname"), "pl***");
    }

    #[test]
    fn test_debug_never_shows_secrets() {
        let creds = Credentials::new("john.doe@example.com", "hunter2").with_totp_secret("JBSWY3DPEHPK3PXP");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("JBSWY3DPEHPK3PXP"));
        assert!(!debug.contains("john.doe"));
        assert!(debug.contains("jo***@example.com"));
    }

    #[test]
    fn test_blank_totp_secret_is_none() {
        let creds = Credentials::new("a@b.c", "pw").with_totp_secret("   ");
        assert!(!creds.has_totp());
        assert_eq!(creds.totp_secret, None);
    }

    #[test]
    fn test_redacted() {
        let creds = Credentials::new("john@example.com", "pw").with_totp_secret("SEED");
        let red = creds.redacted();
        assert_eq!(red.password, "<redacted>");
        assert_eq!(red.totp_secret.as_deref(), Some("<redacted>"));
        assert_eq!(red.email, "jo***@example.com");
    }

    #[test]
    fn test_platform_serde() {
        assert_eq!(serde_json::to_string(&Platform::Mobile).unwrap(), "\"mobile\"");
        assert_eq!(Platform::Desktop.to_string(), "desktop");
    }
}
