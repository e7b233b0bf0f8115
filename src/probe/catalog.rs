//! The fixed probe catalog and the concurrent probe runner.

use std::time::Duration;

use futures::future::join_all;
use log::debug;

use super::{ProbeOutcome, Signal, SignalReport};
use crate::page::{ElementState, Page};
use crate::selectors;

/// One selector whose visibility asserts a signal
#[derive(Debug, Clone, Copy)]
pub struct Probe {
    pub signal: Signal,
    pub selector: &'static str,
}

impl Probe {
    pub const fn new(signal: Signal, selector: &'static str) -> Self {
        Self { signal, selector }
    }
}

/// Probes run on every resolution cycle.
///
/// The account-lock probe is not listed: the resolver runs it on its own
/// before consulting the page origin.
pub const PROBES: &[Probe] = &[
    Probe::new(Signal::ErrorAlert, selectors::ERROR_ALERT),
    Probe::new(Signal::PasswordInput, selectors::PASSWORD_INPUT),
    Probe::new(Signal::EmailInput, selectors::EMAIL_INPUT),
    Probe::new(Signal::KmsiPrompt, selectors::KMSI_VIDEO),
    Probe::new(Signal::PasskeyVideo, selectors::PASSKEY_VIDEO),
    Probe::new(Signal::PasskeyError, selectors::PASSKEY_ERROR),
    Probe::new(Signal::SignInAnotherWay, selectors::PASSWORD_TILE),
    Probe::new(Signal::PasswordlessApproval, selectors::PASSWORDLESS_CHECKMARK),
    Probe::new(Signal::TotpChallenge, selectors::TOTP_OTC_INPUT),
    Probe::new(Signal::TotpChallenge, selectors::TOTP_FORM),
    Probe::new(Signal::IdentityBanner, selectors::IDENTITY_BANNER),
    Probe::new(Signal::PrimaryButton, selectors::PRIMARY_BUTTON),
];

/// Run a single probe with a bounded visibility wait.
pub async fn probe_one(page: &dyn Page, probe: &Probe, timeout: Duration) -> ProbeOutcome {
    match page
        .wait_for_selector(probe.selector, ElementState::Visible, timeout)
        .await
    {
        Ok(true) => ProbeOutcome::Present,
        Ok(false) => ProbeOutcome::TimedOut,
        Err(e) => {
            debug!("probe {:?} failed: {}", probe.signal, e);
            ProbeOutcome::Absent
        }
    }
}

/// Run every probe concurrently and collect the outcomes.
pub async fn probe_all(page: &dyn Page, probes: &[Probe], timeout: Duration) -> SignalReport {
    let outcomes = join_all(probes.iter().map(|probe| async move {
        (probe.signal, probe_one(page, probe, timeout).await)
    }))
    .await;

    let mut report = SignalReport::new();
    for (signal, outcome) in outcomes {
        report.record(signal, outcome);
    }
    report
}
