//! Canonical login states and page origin classification
//!
//! The provider can show several markers at once; everything downstream of
//! the resolver sees exactly one [`LoginState`] per iteration.

mod guard;
mod resolver;

pub use guard::{GuardVerdict, LoopTracker};
pub use resolver::{StateResolver, reduce};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::HostConfig;
use crate::page::host_of;

/// The single resolved login-flow state for one iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoginState {
    EmailInput,
    PasswordInput,
    SignInAnotherWay,
    PasskeyError,
    PasskeyVideo,
    KmsiPrompt,
    Authenticated,
    AccountLocked,
    ErrorAlert,
    TotpChallenge,
    PasswordlessApproval,
    GetACode,
    ProviderErrorPage,
    Unknown,
}

impl LoginState {
    /// Canonical upper-case name used in logs and errors
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginState::EmailInput => "EMAIL_INPUT",
            LoginState::PasswordInput => "PASSWORD_INPUT",
            LoginState::SignInAnotherWay => "SIGN_IN_ANOTHER_WAY",
            LoginState::PasskeyError => "PASSKEY_ERROR",
            LoginState::PasskeyVideo => "PASSKEY_VIDEO",
            LoginState::KmsiPrompt => "KMSI_PROMPT",
            LoginState::Authenticated => "AUTHENTICATED",
            LoginState::AccountLocked => "ACCOUNT_LOCKED",
            LoginState::ErrorAlert => "ERROR_ALERT",
            LoginState::TotpChallenge => "TOTP_CHALLENGE",
            LoginState::PasswordlessApproval => "PASSWORDLESS_APPROVAL",
            LoginState::GetACode => "GET_A_CODE",
            LoginState::ProviderErrorPage => "PROVIDER_ERROR_PAGE",
            LoginState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for LoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the page currently is, as far as resolution cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The primary identity provider sign-in host
    IdentityProvider,
    /// A host that only serves signed-in users
    Authenticated,
    /// The browser's own network error page
    ErrorPage,
    /// Anything else
    Other,
}

impl Origin {
    /// Classify a page URL against the configured hosts.
    pub fn classify(url: &str, hosts: &HostConfig) -> Self {
        let Some(host) = host_of(url) else {
            return Origin::Other;
        };

        if host == hosts.error_page {
            Origin::ErrorPage
        } else if hosts.authenticated.iter().any(|h| *h == host) {
            Origin::Authenticated
        } else if host == hosts.identity_provider {
            Origin::IdentityProvider
        } else {
            Origin::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(LoginState::TotpChallenge.to_string(), "TOTP_CHALLENGE");
        assert_eq!(LoginState::GetACode.to_string(), "GET_A_CODE");
    }

    #[test]
    fn test_state_serde_matches_display() {
        let json = serde_json::to_string(&LoginState::KmsiPrompt).unwrap();
        assert_eq!(json, "\"KMSI_PROMPT\"");
        let json = serde_json::to_string(&LoginState::PasswordlessApproval).unwrap();
        assert_eq!(json, "\"PASSWORDLESS_APPROVAL\"");
    }

    #[test]
    fn test_origin_classify() {
        let hosts = HostConfig::default();
        assert_eq!(
            Origin::classify("https://login.live.com/oauth20_authorize.srf", &hosts),
            Origin::IdentityProvider
        );
        assert_eq!(Origin::classify("https://rewards.bing.com/", &hosts), Origin::Authenticated);
        assert_eq!(
            Origin::classify("https://account.microsoft.com/?lang=en", &hosts),
            Origin::Authenticated
        );
        assert_eq!(Origin::classify("chrome-error://chromewebdata/", &hosts), Origin::ErrorPage);
        assert_eq!(Origin::classify("https://www.bing.com/", &hosts), Origin::Other);
        assert_eq!(Origin::classify("not a url", &hosts), Origin::Other);
    }
}
