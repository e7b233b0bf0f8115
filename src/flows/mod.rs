//! Sub-flows with their own bounded retry loops
//!
//! Each flow owns one step of the provider's login that can take more than
//! a single UI action:
//! - CredentialEntry fills the identifier and password forms
//! - TotpFlow answers a one-time-code challenge from a seed or the operator
//! - PasswordlessFlow waits for an authenticator push approval

mod credentials;
mod passwordless;
mod totp;

pub use credentials::CredentialEntry;
pub use passwordless::PasswordlessFlow;
pub use totp::TotpFlow;
