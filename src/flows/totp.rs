//! TOTP challenge: answer from a provisioned seed or ask the operator.

use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};

use crate::clock::Clock;
use crate::config::TotpConfig;
use crate::credentials::Platform;
use crate::error::{AuthError, Result};
use crate::operator::{Operator, OperatorNotice};
use crate::page::{ElementState, Page, settle};
use crate::selectors;
use crate::totp::{Totp, is_valid_code};

const VISIBLE_INPUT_TIMEOUT: Duration = Duration::from_millis(500);
const PRE_SUBMIT_DELAY: Duration = Duration::from_millis(500);

/// Answers one TOTP challenge
pub struct TotpFlow {
    config: TotpConfig,
    clock: Arc<dyn Clock>,
    operator: Arc<dyn Operator>,
    platform: Platform,
    settle_timeout: Duration,
}

impl TotpFlow {
    pub fn new(
        config: TotpConfig,
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

    /// Fill and submit a code, from the seed if there is one.
    pub async fn handle(&self, page: &dyn Page, seed: Option<&str>) -> Result<()> {
        info!("[{}][LOGIN-TOTP] TOTP challenge requested", self.platform);

        match seed.filter(|s| !s.trim().is_empty()) {
            Some(seed) => self.handle_with_seed(page, seed).await,
            None => self.handle_manual(page).await,
        }
    }

    async fn handle_with_seed(&self, page: &dyn Page, seed: &str) -> Result<()> {
        let code = Totp::from_base32(seed)?
            .with_digits(self.config.digits)
            .with_period(self.config.period_secs)
            .with_algorithm(self.config.algorithm)
            .generate_now()?;
        info!("[{}][LOGIN-TOTP] generated code from seed", self.platform);

        if !self.fill_code(page, &code).await {
            error!("[{}][LOGIN-TOTP] could not locate the code input", self.platform);
            return Err(AuthError::TotpInputMissing);
        }

        self.submit(page).await;
        Ok(())
    }

    async fn handle_manual(&self, page: &dyn Page) -> Result<()> {
        info!("[{}][LOGIN-TOTP] no seed configured, waiting for manual entry", self.platform);

        let max = self.config.manual_attempts;
        let timeout = Duration::from_secs(self.config.manual_timeout_secs);
        let prompt = format!(
            "Enter the {}-digit TOTP code (waiting {}s):",
            self.config.digits, self.config.manual_timeout_secs
        );

        for attempt in 1..=max {
            self.operator.notify(&OperatorNotice::EnterTotpCode { attempt, max });

            let code = self.operator.request_code(&prompt, timeout).await;
            let Some(code) = code.filter(|c| is_valid_code(c, self.config.digits)) else {
                warn!(
                    "[{}][LOGIN-TOTP] missing or malformed code (attempt {}/{})",
                    self.platform, attempt, max
                );
                continue;
            };

            if !self.fill_code(page, &code).await {
                error!(
                    "[{}][LOGIN-TOTP] could not locate the code input (attempt {}/{})",
                    self.platform, attempt, max
                );
                continue;
            }

            self.submit(page).await;
            return Ok(());
        }

        Err(AuthError::TotpExhausted { attempts: max })
    }

    /// Fill the visible input if there is one, else the hidden one.
    async fn fill_code(&self, page: &dyn Page, code: &str) -> bool {
        let visible = page
            .wait_for_selector(selectors::TOTP_VISIBLE_INPUT, ElementState::Visible, VISIBLE_INPUT_TIMEOUT)
            .await
            .unwrap_or(false);

        let target = if visible {
            selectors::TOTP_VISIBLE_INPUT
        } else {
            let hidden = page
                .wait_for_selector(selectors::TOTP_HIDDEN_INPUT, ElementState::Attached, Duration::ZERO)
                .await
                .unwrap_or(false);
            if !hidden {
                return false;
            }
            selectors::TOTP_HIDDEN_INPUT
        };

        match page.fill(target, code).await {
            Ok(()) => {
                let which = if visible { "visible" } else { "hidden" };
                info!("[{}][LOGIN-TOTP] filled {} code input", self.platform, which);
                true
            }
            Err(e) => {
                warn!("[{}][LOGIN-TOTP] filling code input failed: {}", self.platform, e);
                false
            }
        }
    }

    async fn submit(&self, page: &dyn Page) {
        self.clock.sleep(PRE_SUBMIT_DELAY).await;
        if let Err(e) = page.click(selectors::SUBMIT_BUTTON).await {
            warn!("[{}][LOGIN-TOTP] submit click failed, pressing Enter: {}", self.platform, e);
            if let Err(e) = page.press("Enter").await {
                warn!("[{}][LOGIN-TOTP] Enter fallback failed: {}", self.platform, e);
            }
        }
        settle(page, self.settle_timeout).await;
        info!("[{}][LOGIN-TOTP] code submitted", self.platform);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::operator::ScriptedOperator;
    use crate::page::{PageAction, PageFrame, ScriptedPage};

    const SEED: &str = "JBSWY3DPEHPK3PXP";

    fn flow(operator: Arc<ScriptedOperator>) -> TotpFlow {
        TotpFlow::new(
            TotpConfig::default(),
            Arc::new(ManualClock::new()),
            operator,
            Platform::Desktop,
            Duration::from_secs(5),
        )
    }

    fn challenge_page() -> ScriptedPage {
        ScriptedPage::new(vec![
            PageFrame::new("https://login.live.com/")
                .visible("input#floatingLabelInput5")
                .visible(selectors::SUBMIT_BUTTON),
            PageFrame::new("https://login.live.com/kmsi"),
        ])
    }

    fn filled_codes(page: &ScriptedPage) -> Vec<String> {
        page.actions()
            .into_iter()
            .filter_map(|a| match a {
                PageAction::Fill { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_seed_fills_generated_code() {
        let op = Arc::new(ScriptedOperator::new());
        let page = challenge_page();
        flow(op.clone()).handle(&page, Some(SEED)).await.unwrap();

        let codes = filled_codes(&page);
        assert_eq!(codes.len(), 1);
        assert!(is_valid_code(&codes[0], 6));
        assert_eq!(op.prompt_count(), 0);
        assert!(page.actions().contains(&PageAction::Click(selectors::SUBMIT_BUTTON.into())));
    }

    #[tokio::test]
    async fn test_failed_submit_click_presses_enter() {
        let op = Arc::new(ScriptedOperator::new());
        let page = ScriptedPage::new(vec![
            PageFrame::new("https://login.live.com/")
                .visible("input#floatingLabelInput5")
                .visible(selectors::SUBMIT_BUTTON),
            PageFrame::new("https://login.live.com/kmsi"),
        ])
        .failing_clicks(selectors::SUBMIT_BUTTON, 1);
        flow(op).handle(&page, Some(SEED)).await.unwrap();

        assert_eq!(page.actions().last(), Some(&PageAction::Press("Enter".into())));
        assert_eq!(page.cursor(), 1);
    }

    #[tokio::test]
    async fn test_seed_uses_hidden_input_when_no_visible_one() {
        let op = Arc::new(ScriptedOperator::new());
        let page = ScriptedPage::new(vec![
            PageFrame::new("https://login.live.com/")
                .attached("input[name=\"otc\"]")
                .visible(selectors::SUBMIT_BUTTON),
        ]);
        flow(op).handle(&page, Some(SEED)).await.unwrap();

        let fills = page.count_actions(|a| {
            matches!(a, PageAction::Fill { selector, .. } if selector == selectors::TOTP_HIDDEN_INPUT)
        });
        assert_eq!(fills, 1);
    }

    #[tokio::test]
    async fn test_seed_without_input_is_fatal() {
        let op = Arc::new(ScriptedOperator::new());
        let page = ScriptedPage::new(vec![PageFrame::new("https://login.live.com/")]);
        let err = flow(op).handle(&page, Some(SEED)).await.unwrap_err();
        assert!(matches!(err, AuthError::TotpInputMissing));
    }

    #[tokio::test]
    async fn test_invalid_seed_is_fatal() {
        let op = Arc::new(ScriptedOperator::new());
        let page = challenge_page();
        let err = flow(op).handle(&page, Some("not base32!")).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidSeed(_)));
    }

    #[tokio::test]
    async fn test_manual_five_invalid_responses_fail_after_five_prompts() {
        let op = Arc::new(ScriptedOperator::with_responses([
            Some("12345"),
            Some("abcdef"),
            None,
            Some(""),
            Some("1234567"),
            Some("123456"),
        ]));
        let page = challenge_page();
        let err = flow(op.clone()).handle(&page, None).await.unwrap_err();

        assert!(matches!(err, AuthError::TotpExhausted { attempts: 5 }));
        assert_eq!(op.prompt_count(), 5);
        assert!(page.actions().is_empty());
    }

    #[tokio::test]
    async fn test_manual_retries_until_valid_code() {
        let op = Arc::new(ScriptedOperator::with_responses([Some("12"), Some("654321")]));
        let page = challenge_page();
        flow(op.clone()).handle(&page, None).await.unwrap();

        assert_eq!(op.prompt_count(), 2);
        assert_eq!(filled_codes(&page), vec!["654321".to_string()]);
        assert_eq!(
            op.notices(),
            vec![
                OperatorNotice::EnterTotpCode { attempt: 1, max: 5 },
                OperatorNotice::EnterTotpCode { attempt: 2, max: 5 },
            ]
        );
    }

    #[tokio::test]
    async fn test_manual_missing_input_retries_with_fresh_prompt() {
        let op = Arc::new(ScriptedOperator::with_responses([
            Some("111111"),
            Some("222222"),
            Some("333333"),
            Some("444444"),
            Some("555555"),
        ]));
        let page = ScriptedPage::new(vec![PageFrame::new("https://login.live.com/")]);
        let err = flow(op.clone()).handle(&page, None).await.unwrap_err();

        assert!(matches!(err, AuthError::TotpExhausted { attempts: 5 }));
        assert_eq!(op.prompt_count(), 5);
    }
}
