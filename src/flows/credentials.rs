//! Identifier and password entry.

use std::time::Duration;

use log::{info, warn};

use crate::credentials::{Platform, mask_account};
use crate::error::Result;
use crate::page::{Page, is_visible, settle};
use crate::selectors;

const BUTTON_TIMEOUT: Duration = Duration::from_millis(500);

/// Fills the identifier and password forms
#[derive(Debug, Clone)]
pub struct CredentialEntry {
    platform: Platform,
    settle_timeout: Duration,
}

impl CredentialEntry {
    pub fn new(platform: Platform, settle_timeout: Duration) -> Self {
        Self {
            platform,
            settle_timeout,
        }
    }

    /// Fill the account identifier and submit.
    pub async fn enter_email(&self, page: &dyn Page, email: &str) -> Result<()> {
        info!("[{}][LOGIN] entering account {}", self.platform, mask_account(email));
        self.fill_and_submit(page, selectors::EMAIL_INPUT, email, "identifier").await
    }

    /// Fill the password and submit.
    pub async fn enter_password(&self, page: &dyn Page, password: &str) -> Result<()> {
        info!("[{}][LOGIN] entering password", self.platform);
        self.fill_and_submit(page, selectors::PASSWORD_INPUT, password, "password").await
    }

    async fn fill_and_submit(&self, page: &dyn Page, selector: &str, value: &str, what: &str) -> Result<()> {
        // The next resolution cycle decides what to do if the form went away
        if let Err(e) = page.fill(selector, value).await {
            warn!("[{}][LOGIN] could not fill {} field: {}", self.platform, what, e);
            return Ok(());
        }

        let submitted = if is_visible(page, selectors::PRIMARY_BUTTON, BUTTON_TIMEOUT).await {
            page.click(selectors::PRIMARY_BUTTON).await
        } else {
            page.press("Enter").await
        };
        if let Err(e) = submitted {
            warn!("[{}][LOGIN] submitting {} failed, retrying next cycle: {}", self.platform, what, e);
        }

        settle(page, self.settle_timeout).await;
        Ok(())
    }
}
