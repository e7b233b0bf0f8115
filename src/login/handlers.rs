//! One handler per resolved state.

use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::credentials::{Credentials, Platform};
use crate::error::{AuthError, Result};
use crate::flows::{CredentialEntry, PasswordlessFlow, TotpFlow};
use crate::operator::Operator;
use crate::page::{Page, WaitUntil, host_of, path_of, settle};
use crate::selectors;
use crate::state::LoginState;

const RECOVERY_DELAY: Duration = Duration::from_secs(3);

/// What the driver loop should do after a handler ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Resolve the page again on the next iteration
    Continue,
    /// Leave the loop without authenticating
    Stop,
}

/// Maps each resolved state to the single action it needs
pub struct StateHandlers {
    base_url: String,
    identity_root: String,
    navigation_timeout: Duration,
    settle_timeout: Duration,
    platform: Platform,
    clock: Arc<dyn Clock>,
    entry: CredentialEntry,
    totp: TotpFlow,
    passwordless: PasswordlessFlow,
}

impl StateHandlers {
    pub fn new(config: &Config, clock: Arc<dyn Clock>, operator: Arc<dyn Operator>, platform: Platform) -> Self {
        let settle_timeout = config.login.settle_timeout();
        Self {
            base_url: config.base_url.clone(),
            identity_root: config.hosts.identity_root.clone(),
            navigation_timeout: config.login.navigation_timeout(),
            settle_timeout,
            platform,
            entry: CredentialEntry::new(platform, settle_timeout),
            totp: TotpFlow::new(
                config.totp.clone(),
                clock.clone(),
                operator.clone(),
                platform,
                settle_timeout,
            ),
            passwordless: PasswordlessFlow::new(
                config.passwordless.clone(),
                clock.clone(),
                operator,
                platform,
                settle_timeout,
            ),
            clock,
        }
    }

    /// Run the handler for a state.
    ///
    /// Terminal states raise their error; AUTHENTICATED stops the loop.
    pub async fn dispatch(&self, state: LoginState, page: &dyn Page, creds: &Credentials) -> Result<HandlerOutcome> {
        match state {
            LoginState::AccountLocked => {
                error!("[{}][LOGIN] account {} is locked", self.platform, creds.masked());
                Err(AuthError::AccountLocked)
            }
            LoginState::ErrorAlert => {
                let message = match page.inner_text(selectors::ERROR_ALERT).await {
                    Ok(Some(text)) if !text.trim().is_empty() => text.trim().to_string(),
                    _ => "unknown error".to_string(),
                };
                error!("[{}][LOGIN] provider alert: {}", self.platform, message);
                Err(AuthError::ProviderAlert(message))
            }
            LoginState::Authenticated => Ok(HandlerOutcome::Stop),
            LoginState::EmailInput => {
                self.entry.enter_email(page, &creds.email).await?;
                Ok(HandlerOutcome::Continue)
            }
            LoginState::PasswordInput => {
                self.entry.enter_password(page, &creds.password).await?;
                Ok(HandlerOutcome::Continue)
            }
            LoginState::GetACode => {
                info!("[{}][LOGIN] escaping the get-a-code prompt", self.platform);
                self.click(page, selectors::FOOTER_OTHER_WAY).await;
                Ok(HandlerOutcome::Continue)
            }
            LoginState::ProviderErrorPage => {
                self.recover_from_error_page(page).await;
                Ok(HandlerOutcome::Continue)
            }
            LoginState::TotpChallenge => {
                self.totp.handle(page, creds.totp_secret.as_deref()).await?;
                Ok(HandlerOutcome::Continue)
            }
            LoginState::SignInAnotherWay => {
                info!("[{}][LOGIN] choosing password sign-in", self.platform);
                self.click(page, selectors::PASSWORD_TILE).await;
                Ok(HandlerOutcome::Continue)
            }
            LoginState::KmsiPrompt => {
                info!("[{}][LOGIN] accepting keep-me-signed-in", self.platform);
                self.click(page, selectors::PRIMARY_BUTTON).await;
                Ok(HandlerOutcome::Continue)
            }
            LoginState::PasskeyVideo | LoginState::PasskeyError => {
                info!("[{}][LOGIN] skipping passkey prompt", self.platform);
                self.click(page, selectors::SECONDARY_BUTTON).await;
                Ok(HandlerOutcome::Continue)
            }
            LoginState::PasswordlessApproval => {
                self.passwordless.handle(page).await?;
                Ok(HandlerOutcome::Continue)
            }
            LoginState::Unknown => {
                let url = page.url();
                warn!(
                    "[{}][LOGIN] unknown state | host={} | path={} | waiting",
                    self.platform,
                    host_of(&url).unwrap_or_default(),
                    path_of(&url).unwrap_or_default()
                );
                Ok(HandlerOutcome::Continue)
            }
        }
    }

    /// Click then settle; a missing element is left for the next cycle.
    async fn click(&self, page: &dyn Page, selector: &str) {
        if let Err(e) = page.click(selector).await {
            warn!("[{}][LOGIN] click on {} failed: {}", self.platform, selector, e);
        }
        settle(page, self.settle_timeout).await;
    }

    async fn recover_from_error_page(&self, page: &dyn Page) {
        warn!("[{}][LOGIN] browser error page, returning to {}", self.platform, self.base_url);

        if let Err(e) = page
            .goto(&self.base_url, WaitUntil::DomContentLoaded, self.navigation_timeout)
            .await
        {
            warn!(
                "[{}][LOGIN] navigation to target home failed ({}), trying {}",
                self.platform, e, self.identity_root
            );
            if let Err(e) = page
                .goto(&self.identity_root, WaitUntil::DomContentLoaded, self.navigation_timeout)
                .await
            {
                warn!("[{}][LOGIN] navigation to identity root failed: {}", self.platform, e);
            }
        }

        self.clock.sleep(RECOVERY_DELAY).await;
    }
}
