//! Error types for authflow
//!
//! Centralized error handling using thiserror. Every terminal condition of a
//! login attempt has its own variant so callers can tell them apart.

use thiserror::Error;

use crate::state::LoginState;

/// All error types that can occur during a login attempt
#[derive(Debug, Error)]
pub enum AuthError {
    /// Provider flagged the account as locked
    #[error("Account is locked: remove it from the configuration and rerun")]
    AccountLocked,

    /// Alert banner shown on the identity provider origin
    #[error("Provider rejected sign-in: {0}")]
    ProviderAlert(String),

    /// Neither a visible nor a hidden TOTP input could be located
    #[error("TOTP input field not found")]
    TotpInputMissing,

    /// Manual TOTP entry failed on every attempt
    #[error("Manual TOTP entry failed after {attempts} attempts")]
    TotpExhausted { attempts: u32 },

    /// Passwordless approval never reached the callback path
    #[error("Passwordless approval timed out after {seconds}s")]
    PasswordlessTimeout { seconds: u32 },

    /// Driver loop ran out of iterations before authenticating
    #[error("Login timeout: exceeded {max} iterations")]
    IterationsExceeded { max: u32 },

    /// Remote side closed the page mid-flow
    #[error("Page was closed unexpectedly")]
    PageClosed,

    /// A handler refused to continue
    #[error("Login aborted at state: {state}")]
    Aborted { state: LoginState },

    /// Token extraction never reached the target service home page
    #[error("Target service home not reached after {attempts} attempts; session unusable")]
    HomeNotReached { attempts: u32 },

    /// TOTP seed could not be decoded
    #[error("Invalid TOTP seed: {0}")]
    InvalidSeed(String),

    /// Browser page driver error
    #[error("Page error: {0}")]
    Page(String),

    /// Session storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl AuthError {
    /// Whether this error ends the login attempt for the current account.
    ///
    /// Login-flow errors never affect other accounts; only configuration and
    /// local IO failures are reported as not account-scoped.
    pub fn is_fatal_for_account(&self) -> bool {
        !matches!(self, AuthError::Config(_) | AuthError::Io(_) | AuthError::Yaml(_))
    }
}

/// Result type alias for authflow operations
pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_locked_error() {
        let err = AuthError::AccountLocked;
        assert!(err.to_string().contains("locked"));
    }

    #[test]
    fn test_provider_alert_error() {
        let err = AuthError::ProviderAlert("That password is incorrect".to_string());
        assert_eq!(err.to_string(), "Provider rejected sign-in: That password is incorrect");
    }

    #[test]
    fn test_iterations_exceeded_error() {
        let err = AuthError::IterationsExceeded { max: 25 };
        assert_eq!(err.to_string(), "Login timeout: exceeded 25 iterations");
    }

    #[test]
    fn test_aborted_names_state() {
        let err = AuthError::Aborted {
            state: LoginState::PasswordInput,
        };
        assert_eq!(err.to_string(), "Login aborted at state: PASSWORD_INPUT");
    }

    #[test]
    fn test_totp_exhausted_error() {
        let err = AuthError::TotpExhausted { attempts: 5 };
        assert_eq!(err.to_string(), "Manual TOTP entry failed after 5 attempts");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AuthError = io_err.into();
        assert!(matches!(err, AuthError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: AuthError = json_err.into();
        assert!(matches!(err, AuthError::Json(_)));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(AuthError::PageClosed.is_fatal_for_account());
        assert!(AuthError::PasswordlessTimeout { seconds: 60 }.is_fatal_for_account());
        assert!(!AuthError::Config("bad".into()).is_fatal_for_account());
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(AuthError::PageClosed)
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }
}
