//! Stuck-loop detection across driver iterations.

use super::LoginState;

/// What the driver should do after observing a state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardVerdict {
    /// Dispatch the state's handler as usual
    Proceed,
    /// Reload the page and skip this iteration's handler
    Reload,
}

/// Tracks consecutive repeats of the same state within one login attempt
#[derive(Debug, Clone)]
pub struct LoopTracker {
    previous: LoginState,
    repeats: u32,
    threshold: u32,
}

impl LoopTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            previous: LoginState::Unknown,
            repeats: 0,
            threshold: threshold.max(1),
        }
    }

    pub fn previous(&self) -> LoginState {
        self.previous
    }

    pub fn repeats(&self) -> u32 {
        self.repeats
    }

    /// Record the state resolved this iteration.
    ///
    /// AUTHENTICATED and UNKNOWN never count as repeats. Tripping the guard
    /// resets both the counter and the remembered state.
    pub fn observe(&mut self, state: LoginState) -> GuardVerdict {
        let repeat = state == self.previous
            && state != LoginState::Authenticated
            && state != LoginState::Unknown;

        if repeat {
            self.repeats += 1;
            if self.repeats >= self.threshold {
                self.repeats = 0;
                self.previous = LoginState::Unknown;
                return GuardVerdict::Reload;
            }
        } else {
            self.repeats = 0;
        }

        self.previous = state;
        GuardVerdict::Proceed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trips_on_fourth_repeat_not_before() {
        let mut tracker = LoopTracker::new(4);
        // First sighting is not a repeat
        assert_eq!(tracker.observe(LoginState::PasswordInput), GuardVerdict::Proceed);
        for expected in 1..=3 {
            assert_eq!(tracker.observe(LoginState::PasswordInput), GuardVerdict::Proceed);
            assert_eq!(tracker.repeats(), expected);
        }
        assert_eq!(tracker.observe(LoginState::PasswordInput), GuardVerdict::Reload);
        assert_eq!(tracker.repeats(), 0);
        assert_eq!(tracker.previous(), LoginState::Unknown);
    }

    #[test]
    fn test_state_after_reload_is_not_a_repeat() {
        let mut tracker = LoopTracker::new(4);
        for _ in 0..4 {
            tracker.observe(LoginState::KmsiPrompt);
        }
        assert_eq!(tracker.observe(LoginState::KmsiPrompt), GuardVerdict::Reload);
        assert_eq!(tracker.observe(LoginState::KmsiPrompt), GuardVerdict::Proceed);
        assert_eq!(tracker.repeats(), 0);
    }

    #[test]
    fn test_change_resets_counter() {
        let mut tracker = LoopTracker::new(4);
        tracker.observe(LoginState::EmailInput);
        tracker.observe(LoginState::EmailInput);
        tracker.observe(LoginState::EmailInput);
        assert_eq!(tracker.repeats(), 2);
        tracker.observe(LoginState::PasswordInput);
        assert_eq!(tracker.repeats(), 0);
    }

    #[test]
    fn test_unknown_and_authenticated_never_trip() {
        let mut tracker = LoopTracker::new(4);
        for _ in 0..20 {
            assert_eq!(tracker.observe(LoginState::Unknown), GuardVerdict::Proceed);
        }
        for _ in 0..20 {
            assert_eq!(tracker.observe(LoginState::Authenticated), GuardVerdict::Proceed);
        }
        assert_eq!(tracker.repeats(), 0);
    }

    #[test]
    fn test_alternating_states_never_trip() {
        let mut tracker = LoopTracker::new(4);
        for i in 0..50 {
            let state = if i % 2 == 0 {
                LoginState::EmailInput
            } else {
                LoginState::PasswordInput
            };
            assert_eq!(tracker.observe(state), GuardVerdict::Proceed);
        }
    }
}
