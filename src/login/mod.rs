//! Login driver - iterate resolve/dispatch until authenticated.
//!
//! Each iteration:
//! 1. Abort if the page was closed
//! 2. Resolve the canonical state
//! 3. Feed it to the stuck-loop guard; a trip reloads and skips dispatch
//! 4. Stop on AUTHENTICATED, otherwise run the state's handler
//! 5. Wait a fixed delay
//!
//! After authentication the finalizer verifies the session, extracts the
//! request token and captures cookies; the store persists them.

mod finalize;
mod handlers;

pub use finalize::{FinalizedSession, SessionFinalizer, find_request_token};
pub use handlers::{HandlerOutcome, StateHandlers};

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::credentials::{Credentials, Platform};
use crate::error::{AuthError, Result};
use crate::operator::Operator;
use crate::page::{Page, WaitUntil};
use crate::session::{SessionArtifact, SessionStore};
use crate::state::{GuardVerdict, LoginState, LoopTracker, Origin, StateResolver};

/// Result of a successful login attempt
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub artifact: SessionArtifact,
    pub secondary_verified: bool,
    /// Driver iterations used before reaching AUTHENTICATED
    pub iterations: u32,
}

/// Drives one account through the provider's login flow
pub struct Login {
    config: Config,
    clock: Arc<dyn Clock>,
    operator: Arc<dyn Operator>,
    platform: Platform,
}

impl Login {
    pub fn new(config: Config, clock: Arc<dyn Clock>, operator: Arc<dyn Operator>, platform: Platform) -> Self {
        Self {
            config,
            clock,
            operator,
            platform,
        }
    }

    /// Log in on the given page, then finalize and persist the session.
    pub async fn login(
        &self,
        page: &dyn Page,
        creds: &Credentials,
        store: &dyn SessionStore,
    ) -> Result<LoginOutcome> {
        info!("[{}][LOGIN] starting login for {}", self.platform, creds.masked());

        let result = self.run(page, creds, store).await;
        if let Err(e) = &result {
            error!("[{}][LOGIN] login failed for {}: {}", self.platform, creds.masked(), e);
        }
        result
    }

    async fn run(&self, page: &dyn Page, creds: &Credentials, store: &dyn SessionStore) -> Result<LoginOutcome> {
        self.enter(page).await;

        let iterations = self.drive(page, creds).await?;

        let finalizer = SessionFinalizer::new(&self.config, self.clock.clone(), self.platform);
        let finalized = finalizer.finalize(page, &creds.email).await?;
        store.save(&finalized.artifact)?;

        info!("[{}][LOGIN] login complete, session saved", self.platform);
        Ok(LoginOutcome {
            artifact: finalized.artifact,
            secondary_verified: finalized.secondary_verified,
            iterations,
        })
    }

    /// Best-effort navigation to the entry URL.
    async fn enter(&self, page: &dyn Page) {
        let login = &self.config.login;
        if let Err(e) = page
            .goto(&login.entry_url, WaitUntil::DomContentLoaded, login.navigation_timeout())
            .await
        {
            debug!("[{}][LOGIN] entry navigation ended early: {}", self.platform, e);
        }
        self.clock.sleep(Duration::from_millis(login.entry_delay_ms)).await;

        if Origin::classify(&page.url(), &self.config.hosts) == Origin::ErrorPage {
            warn!("[{}][LOGIN] entry landed on the browser error page, reloading", self.platform);
            if let Err(e) = page.reload(WaitUntil::DomContentLoaded).await {
                debug!("[{}][LOGIN] reload failed: {}", self.platform, e);
            }
        }
    }

    /// Run the state machine; returns the iteration that saw AUTHENTICATED.
    async fn drive(&self, page: &dyn Page, creds: &Credentials) -> Result<u32> {
        let login = &self.config.login;
        let max = login.max_iterations;
        let iteration_delay = Duration::from_millis(login.iteration_delay_ms);
        let reload_delay = Duration::from_millis(login.reload_delay_ms);

        let resolver = StateResolver::new(self.config.hosts.clone(), login).with_platform(self.platform);
        let handlers = StateHandlers::new(&self.config, self.clock.clone(), self.operator.clone(), self.platform);
        let mut tracker = LoopTracker::new(login.stuck_threshold);

        for iteration in 1..=max {
            if page.is_closed() {
                return Err(AuthError::PageClosed);
            }
            debug!("[{}][LOGIN] iteration {}/{}", self.platform, iteration, max);

            let state = resolver.detect(page).await;
            let previous = tracker.previous();
            debug!("[{}][LOGIN] current state: {}", self.platform, state);
            if state != previous && previous != LoginState::Unknown {
                info!("[{}][LOGIN] state {} -> {}", self.platform, previous, state);
            }

            if tracker.observe(state) == GuardVerdict::Reload {
                warn!(
                    "[{}][LOGIN] stuck on {} for {} repeats, reloading page",
                    self.platform, state, login.stuck_threshold
                );
                if let Err(e) = page.reload(WaitUntil::DomContentLoaded).await {
                    warn!("[{}][LOGIN] reload failed: {}", self.platform, e);
                }
                self.clock.sleep(reload_delay).await;
                continue;
            }

            if state == LoginState::Authenticated {
                info!("[{}][LOGIN] authenticated after {} iterations", self.platform, iteration);
                return Ok(iteration);
            }

            if handlers.dispatch(state, page, creds).await? == HandlerOutcome::Stop {
                return Err(AuthError::Aborted { state });
            }

            self.clock.sleep(iteration_delay).await;
        }

        Err(AuthError::IterationsExceeded { max })
    }
}
