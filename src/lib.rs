//! authflow - an authentication state machine for ambiguous identity-provider login flows
//!
//! The provider may route an account through password entry, passwordless
//! approval, TOTP challenges, consent prompts and error pages in any order.
//! [`login::Login`] repeatedly resolves the page to one canonical
//! [`state::LoginState`], dispatches a handler for it, recovers from stuck
//! loops, and finalizes the session once authenticated.

pub mod clock;
pub mod config;
pub mod credentials;
pub mod error;
pub mod flows;
pub mod login;
pub mod operator;
pub mod page;
pub mod probe;
pub mod selectors;
pub mod session;
pub mod state;
pub mod totp;

pub use error::{AuthError, Result};
pub use login::{Login, LoginOutcome};
