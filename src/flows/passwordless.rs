//! Passwordless push approval: wait for the authenticator to approve.

use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};

use crate::clock::Clock;
use crate::config::PasswordlessConfig;
use crate::credentials::Platform;
use crate::error::{AuthError, Result};
use crate::operator::{Operator, OperatorNotice};
use crate::page::{ElementState, Page, path_of, settle};
use crate::selectors;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Waits for a passwordless sign-in to be approved
pub struct PasswordlessFlow {
    config: PasswordlessConfig,
    clock: Arc<dyn Clock>,
    operator: Arc<dyn Operator>,
    platform: Platform,
    settle_timeout: Duration,
}

impl PasswordlessFlow {
    pub fn new(
        config: PasswordlessConfig,
        clock: Arc<dyn Clock>,
        operator: Arc<dyn Operator>,
        platform: Platform,
        settle_timeout: Duration,
    ) -> Self {
        Self {
            config,
            clock,
            operator,
            platform,
            settle_timeout,
        }
    }

    pub async fn handle(&self, page: &dyn Page) -> Result<()> {
        info!("[{}][LOGIN-PASSWORDLESS] passwordless approval requested", self.platform);

        let number = self.displayed_number(page).await;
        match &number {
            Some(n) => info!("[{}][LOGIN-PASSWORDLESS] approve on your device and pick {}", self.platform, n),
            None => info!("[{}][LOGIN-PASSWORDLESS] approve the sign-in in your authenticator app", self.platform),
        }
        self.operator.notify(&OperatorNotice::ApproveSignIn { number });

        if !self.wait_for_approval(page).await {
            error!(
                "[{}][LOGIN-PASSWORDLESS] approval timed out after {}s",
                self.platform, self.config.max_polls
            );
            return Err(AuthError::PasswordlessTimeout {
                seconds: self.config.max_polls,
            });
        }

        info!("[{}][LOGIN-PASSWORDLESS] sign-in approved", self.platform);
        settle(page, self.settle_timeout).await;
        Ok(())
    }

    /// Number the operator must pick on the authenticator, if the page shows one.
    async fn displayed_number(&self, page: &dyn Page) -> Option<String> {
        let timeout = Duration::from_millis(self.config.number_timeout_ms);
        let shown = page
            .wait_for_selector(selectors::PASSWORDLESS_NUMBER, ElementState::Attached, timeout)
            .await
            .unwrap_or(false);
        if !shown {
            return None;
        }

        match page.inner_text(selectors::PASSWORDLESS_NUMBER).await {
            Ok(text) => text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
            Err(e) => {
                warn!("[{}][LOGIN-PASSWORDLESS] could not read displayed number: {}", self.platform, e);
                None
            }
        }
    }

    /// Poll once per interval until the approval callback path is reached.
    async fn wait_for_approval(&self, page: &dyn Page) -> bool {
        let limit = self.config.max_polls;
        info!(
            "[{}][LOGIN-PASSWORDLESS] waiting for approval ({}s timeout)",
            self.platform, limit
        );

        for attempt in 1..=limit {
            if path_of(&page.url()).as_deref() == Some(self.config.approval_path.as_str()) {
                return true;
            }

            if self.config.notice_every > 0 && attempt % self.config.notice_every == 0 {
                info!(
                    "[{}][LOGIN-PASSWORDLESS] still waiting ({}/{}s)",
                    self.platform, attempt, limit
                );
                self.operator.notify(&OperatorNotice::StillWaiting { elapsed: attempt, limit });
            }

            self.clock.sleep(POLL_INTERVAL).await;
        }

        false
    }
}
