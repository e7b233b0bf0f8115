//! Signal probes - independent read-only checks against the current page
//!
//! Each probe waits a short bounded time for one marker. A probe that times
//! out or errors is simply an absent signal.

mod catalog;

pub use catalog::{PROBES, Probe, probe_all, probe_one};

use std::collections::BTreeMap;

/// A single page marker the resolver knows how to interpret
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Signal {
    AccountLocked,
    ErrorAlert,
    PasswordInput,
    EmailInput,
    KmsiPrompt,
    PasskeyVideo,
    PasskeyError,
    SignInAnotherWay,
    PasswordlessApproval,
    TotpChallenge,
    IdentityBanner,
    PrimaryButton,
}

/// Outcome of one probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Present,
    Absent,
    TimedOut,
}

impl ProbeOutcome {
    pub fn is_present(&self) -> bool {
        matches!(self, ProbeOutcome::Present)
    }
}

/// Probe outcomes for one resolution cycle
///
/// Several probes may report on the same signal (the TOTP challenge has two
/// markers); any present report wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalReport {
    outcomes: BTreeMap<Signal, ProbeOutcome>,
}

impl SignalReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a report where exactly the given signals are present.
    pub fn with_present(signals: &[Signal]) -> Self {
        let mut report = Self::new();
        for signal in signals {
            report.record(*signal, ProbeOutcome::Present);
        }
        report
    }

    /// Record a probe outcome, never downgrading a present signal.
    pub fn record(&mut self, signal: Signal, outcome: ProbeOutcome) {
        let entry = self.outcomes.entry(signal).or_insert(outcome);
        if outcome.is_present() {
            *entry = outcome;
        }
    }

    pub fn has(&self, signal: Signal) -> bool {
        self.outcomes.get(&signal).is_some_and(|o| o.is_present())
    }

    pub fn outcome(&self, signal: Signal) -> Option<ProbeOutcome> {
        self.outcomes.get(&signal).copied()
    }

    /// Signals reported present, in stable order
    pub fn present(&self) -> Vec<Signal> {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.is_present())
            .map(|(s, _)| *s)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.present().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_present_wins_over_timeout() {
        let mut report = SignalReport::new();
        report.record(Signal::TotpChallenge, ProbeOutcome::TimedOut);
        report.record(Signal::TotpChallenge, ProbeOutcome::Present);
        report.record(Signal::TotpChallenge, ProbeOutcome::Absent);
        assert!(report.has(Signal::TotpChallenge));
    }

    #[test]
    fn test_report_absent_signals() {
        let mut report = SignalReport::new();
        report.record(Signal::EmailInput, ProbeOutcome::TimedOut);
        assert!(!report.has(Signal::EmailInput));
        assert_eq!(report.outcome(Signal::EmailInput), Some(ProbeOutcome::TimedOut));
        assert!(report.is_empty());
    }

    #[test]
    fn test_with_present() {
        let report = SignalReport::with_present(&[Signal::KmsiPrompt, Signal::ErrorAlert]);
        assert_eq!(report.present(), vec![Signal::ErrorAlert, Signal::KmsiPrompt]);
    }
}
