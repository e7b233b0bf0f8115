//! State resolution - reduce concurrent page signals to one canonical state.
//!
//! Order of checks for a live page:
//!
//! ```text
//! settle (best-effort)
//!   │
//!   ├─ origin is the browser error page ─────────► PROVIDER_ERROR_PAGE
//!   ├─ account-lock marker visible ──────────────► ACCOUNT_LOCKED
//!   ├─ origin only serves signed-in users ───────► AUTHENTICATED
//!   │
//!   └─ run every probe concurrently ─► reduce()
//! ```

use std::time::Duration;

use log::{debug, warn};

use super::{LoginState, Origin};
use crate::config::{HostConfig, LoginConfig};
use crate::credentials::Platform;
use crate::page::{Page, settle};
use crate::probe::{PROBES, Probe, ProbeOutcome, Signal, SignalReport, probe_all, probe_one};
use crate::selectors;

/// Priority of ordinary signals once lock and alert handling are done
const PRIORITY: &[(Signal, LoginState)] = &[
    (Signal::PasskeyVideo, LoginState::PasskeyVideo),
    (Signal::PasskeyError, LoginState::PasskeyError),
    (Signal::KmsiPrompt, LoginState::KmsiPrompt),
    (Signal::PasswordInput, LoginState::PasswordInput),
    (Signal::EmailInput, LoginState::EmailInput),
    (Signal::SignInAnotherWay, LoginState::SignInAnotherWay),
    (Signal::PasswordlessApproval, LoginState::PasswordlessApproval),
    (Signal::TotpChallenge, LoginState::TotpChallenge),
];

/// Reduce one cycle's signals to a single state.
///
/// Total over every combination of present signals:
/// - account lock beats everything
/// - an alert next to a TOTP input is a stale banner from a rejected code
/// - an alert off the identity provider origin is noise
/// - "get a code" is synthesized from banner + button without password/TOTP,
///   and only wins when nothing else matched
pub fn reduce(report: &SignalReport, origin: Origin) -> LoginState {
    if report.has(Signal::AccountLocked) {
        return LoginState::AccountLocked;
    }

    let totp = report.has(Signal::TotpChallenge);
    let alert = report.has(Signal::ErrorAlert) && !totp && origin == Origin::IdentityProvider;
    if alert {
        return LoginState::ErrorAlert;
    }

    if let Some((_, state)) = PRIORITY.iter().find(|(signal, _)| report.has(*signal)) {
        return *state;
    }

    let get_a_code = report.has(Signal::IdentityBanner)
        && report.has(Signal::PrimaryButton)
        && !report.has(Signal::PasswordInput)
        && !totp;
    if get_a_code {
        return LoginState::GetACode;
    }

    LoginState::Unknown
}

/// Resolves the canonical state of a live page
#[derive(Debug, Clone)]
pub struct StateResolver {
    hosts: HostConfig,
    probe_timeout: Duration,
    settle_timeout: Duration,
    platform: Platform,
}

impl StateResolver {
    pub fn new(hosts: HostConfig, login: &LoginConfig) -> Self {
        Self {
            hosts,
            probe_timeout: login.probe_timeout(),
            settle_timeout: login.settle_timeout(),
            platform: Platform::Desktop,
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Inspect the page and return its canonical state.
    pub async fn detect(&self, page: &dyn Page) -> LoginState {
        settle(page, self.settle_timeout).await;

        let url = page.url();
        debug!("[{}][DETECT] current URL: {}", self.platform, url);
        let origin = Origin::classify(&url, &self.hosts);

        if origin == Origin::ErrorPage {
            warn!("[{}][DETECT] browser error page detected", self.platform);
            return LoginState::ProviderErrorPage;
        }

        let lock_probe = Probe::new(Signal::AccountLocked, selectors::ACCOUNT_LOCKED);
        let lock = probe_one(page, &lock_probe, self.probe_timeout).await;
        if lock == ProbeOutcome::Present {
            return LoginState::AccountLocked;
        }

        if origin == Origin::Authenticated {
            return LoginState::Authenticated;
        }

        let mut report = probe_all(page, PROBES, self.probe_timeout).await;
        report.record(Signal::AccountLocked, lock);

        if report.has(Signal::ErrorAlert) && origin != Origin::IdentityProvider {
            debug!("[{}][DETECT] ignoring alert banner outside the identity provider", self.platform);
        }

        let state = reduce(&report, origin);
        debug!("[{}][DETECT] signals {:?} -> {}", self.platform, report.present(), state);
        state
    }
}
