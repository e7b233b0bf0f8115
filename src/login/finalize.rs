//! Post-authentication checks and session capture.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use scraper::{Html, Selector};
use url::Url;

use crate::clock::{Clock, now_ms};
use crate::config::{Config, FinalizeConfig};
use crate::credentials::Platform;
use crate::error::{AuthError, Result};
use crate::page::{Page, WaitUntil, host_of, is_host_root, is_visible, settle};
use crate::selectors;
use crate::session::SessionArtifact;
use crate::state::{LoginState, StateResolver};

const RETRY_INTERVAL: Duration = Duration::from_secs(1);
const DISMISS_TIMEOUT: Duration = Duration::from_millis(200);

/// Result of finalizing an authenticated page
#[derive(Debug, Clone)]
pub struct FinalizedSession {
    pub artifact: SessionArtifact,
    /// Whether the secondary service showed a signed-in marker
    pub secondary_verified: bool,
}

/// Turns an authenticated page into a [`SessionArtifact`]
pub struct SessionFinalizer {
    base_url: String,
    target_host: String,
    config: FinalizeConfig,
    navigation_timeout: Duration,
    settle_timeout: Duration,
    platform: Platform,
    clock: Arc<dyn Clock>,
    resolver: StateResolver,
}

impl SessionFinalizer {
    pub fn new(config: &Config, clock: Arc<dyn Clock>, platform: Platform) -> Self {
        Self {
            base_url: config.base_url.clone(),
            target_host: config.target_host(),
            config: config.finalize.clone(),
            navigation_timeout: config.login.navigation_timeout(),
            settle_timeout: config.login.settle_timeout(),
            platform,
            clock,
            resolver: StateResolver::new(config.hosts.clone(), &config.login).with_platform(platform),
        }
    }

    pub async fn finalize(&self, page: &dyn Page, account: &str) -> Result<FinalizedSession> {
        info!("[{}][LOGIN] finalizing session", self.platform);

        self.navigate(page, &self.base_url, WaitUntil::NetworkIdle).await;
        if host_of(&page.url()).as_deref() == Some(self.target_host.as_str()) {
            info!("[{}][LOGIN] signed in to {}", self.platform, self.target_host);
        } else {
            warn!(
                "[{}][LOGIN] could not confirm the {} dashboard, assuming the session is valid",
                self.platform, self.target_host
            );
        }

        let secondary_verified = self.verify_secondary(page).await;
        let token = self.extract_request_token(page).await?;

        let cookies = page.cookies().await?;
        info!("[{}][LOGIN] captured {} cookies", self.platform, cookies.len());

        let artifact = SessionArtifact::new(account, self.platform, cookies).with_request_token(token);
        Ok(FinalizedSession {
            artifact,
            secondary_verified,
        })
    }

    /// Confirm the secondary service accepted the session.
    ///
    /// Failure is never fatal, but it is reported at warn so a broken
    /// sign-in does not go unnoticed.
    async fn verify_secondary(&self, page: &dyn Page) -> bool {
        info!("[{}][VERIFY-SESSION] verifying {} session", self.platform, self.config.secondary_home_host);
        self.navigate(page, &self.config.secondary_bridge_url, WaitUntil::NetworkIdle).await;

        let marker_timeout = Duration::from_millis(self.config.marker_timeout_ms);
        for attempt in 1..=self.config.verify_attempts {
            if page.is_closed() {
                break;
            }

            if self.resolver.detect(page).await == LoginState::PasskeyError {
                debug!("[{}][VERIFY-SESSION] passkey error during verification, dismissing", self.platform);
                if let Err(e) = page.click(selectors::SECONDARY_BUTTON).await {
                    debug!("[{}][VERIFY-SESSION] dismiss failed: {}", self.platform, e);
                }
            }

            if is_host_root(&page.url(), &self.config.secondary_home_host) {
                self.dismiss_overlays(page).await;
                let signed_in = is_visible(page, &self.config.signed_in_marker, marker_timeout).await;

                if signed_in || self.platform.is_mobile() {
                    info!(
                        "[{}][VERIFY-SESSION] {} session established (attempt {})",
                        self.platform, self.config.secondary_home_host, attempt
                    );
                    return true;
                }
            }

            self.clock.sleep(RETRY_INTERVAL).await;
        }

        warn!(
            "[{}][VERIFY-SESSION] SESSION NOT CONFIRMED: no signed-in marker on {} after {} attempts; continuing with the primary session",
            self.platform, self.config.secondary_home_host, self.config.verify_attempts
        );
        false
    }

    /// Read the anti-forgery token from the target service home.
    ///
    /// Never reaching the home page is fatal; reaching it without a token
    /// only degrades features that need the token.
    async fn extract_request_token(&self, page: &dyn Page) -> Result<Option<String>> {
        info!("[{}][REQUEST-TOKEN] fetching request token", self.platform);
        self.navigate(page, &cache_busted(&self.base_url), WaitUntil::NetworkIdle).await;

        let attempts = self.config.token_attempts;
        let mut reached_home = false;

        for attempt in 1..=attempts {
            if page.is_closed() {
                break;
            }

            let url = page.url();
            debug!("[{}][REQUEST-TOKEN] attempt {}/{} | URL={}", self.platform, attempt, attempts, url);

            if is_host_root(&url, &self.target_host) {
                reached_home = true;
                self.dismiss_overlays(page).await;

                match page.content().await {
                    Ok(html) => {
                        if let Some(token) = find_request_token(&html) {
                            info!("[{}][REQUEST-TOKEN] request token set", self.platform);
                            debug!(
                                "[{}][REQUEST-TOKEN] token prefix {}...",
                                self.platform,
                                token.chars().take(10).collect::<String>()
                            );
                            return Ok(Some(token));
                        }
                        debug!("[{}][REQUEST-TOKEN] no token on page", self.platform);
                    }
                    Err(e) => debug!("[{}][REQUEST-TOKEN] reading page content failed: {}", self.platform, e),
                }
            }

            self.clock.sleep(RETRY_INTERVAL).await;
        }

        if !reached_home {
            return Err(AuthError::HomeNotReached { attempts });
        }

        warn!(
            "[{}][REQUEST-TOKEN] {} not found, some activities may not work",
            self.platform,
            selectors::REQUEST_TOKEN_NAME
        );
        Ok(None)
    }

    /// Click any visible overlay close buttons.
    async fn dismiss_overlays(&self, page: &dyn Page) {
        for selector in &self.config.dismiss_selectors {
            if is_visible(page, selector, DISMISS_TIMEOUT).await {
                match page.click(selector).await {
                    Ok(()) => debug!("[{}][LOGIN] dismissed overlay {}", self.platform, selector),
                    Err(e) => debug!("[{}][LOGIN] overlay {} not dismissed: {}", self.platform, selector, e),
                }
            }
        }
        settle(page, self.settle_timeout).await;
    }

    async fn navigate(&self, page: &dyn Page, url: &str, wait: WaitUntil) {
        if let Err(e) = page.goto(url, wait, self.navigation_timeout).await {
            debug!("[{}][LOGIN] navigation to {} ended early: {}", self.platform, url, e);
        }
    }
}

/// Append a `_=<millis>` query parameter.
fn cache_busted(base: &str) -> String {
    match Url::parse(base) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("_", &now_ms().to_string());
            url.to_string()
        }
        Err(_) => base.to_string(),
    }
}

/// Find the anti-forgery token in a hidden input, else a meta tag.
pub fn find_request_token(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let name = selectors::REQUEST_TOKEN_NAME;

    let Ok(input) = Selector::parse(&format!(r#"input[name="{}"]"#, name)) else {
        return None;
    };
    let Ok(meta) = Selector::parse(&format!(r#"meta[name="{}"]"#, name)) else {
        return None;
    };

    let from_input = document.select(&input).find_map(|el| el.value().attr("value"));
    let from_meta = || document.select(&meta).find_map(|el| el.value().attr("content"));

    from_input
        .or_else(from_meta)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::page::{Cookie, PageAction, PageFrame, ScriptedPage};

    const HOME_WITH_TOKEN: &str =
        r#"<html><body><form><input type="hidden" name="__RequestVerificationToken" value="abc123tokenvalue"></form></body></html>"#;

    fn finalizer(clock: Arc<ManualClock>, platform: Platform) -> SessionFinalizer {
        SessionFinalizer::new(&Config::default(), clock, platform)
    }

    #[test]
    fn test_find_token_in_input() {
        assert_eq!(find_request_token(HOME_WITH_TOKEN), Some("abc123tokenvalue".into()));
    }

    #[test]
    fn test_find_token_in_meta() {
        let html = r#"<html><head><meta name="__RequestVerificationToken" content="meta-token"></head></html>"#;
        assert_eq!(find_request_token(html), Some("meta-token".into()));
    }

    #[test]
    fn test_find_token_missing() {
        assert_eq!(find_request_token("<html><body>nothing</body></html>"), None);
        assert_eq!(
            find_request_token(r#"<input name="__RequestVerificationToken" value="  ">"#),
            None
        );
    }

    #[test]
    fn test_cache_busted_url() {
        let url = cache_busted("https://rewards.bing.com/");
        assert!(url.starts_with("https://rewards.bing.com/?_="));
        assert!(is_host_root(&url, "rewards.bing.com"));
    }

    fn happy_frames() -> Vec<PageFrame> {
        vec![
            // before the base navigation
            PageFrame::new("https://rewards.bing.com/welcome"),
            // after base navigation, before the bridge
            PageFrame::new("https://rewards.bing.com/"),
            // bridge landed on the secondary home
            PageFrame::new("https://www.bing.com/").visible("#id_n"),
            // after the cache-busted navigation
            PageFrame::new("https://rewards.bing.com/?_=1").html(HOME_WITH_TOKEN),
        ]
    }

    #[tokio::test]
    async fn test_finalize_happy_path() {
        let clock = Arc::new(ManualClock::new());
        let page = ScriptedPage::new(happy_frames()).with_cookies(vec![Cookie::new("_U", "x", ".bing.com")]);

        let session = finalizer(clock.clone(), Platform::Desktop)
            .finalize(&page, "someone@example.com")
            .await
            .unwrap();

        assert!(session.secondary_verified);
        assert_eq!(session.artifact.request_token.as_deref(), Some("abc123tokenvalue"));
        assert_eq!(session.artifact.cookies.len(), 1);
        assert_eq!(session.artifact.account, "someone@example.com");
        assert!(clock.sleeps().is_empty());

        let gotos = page.count_actions(|a| matches!(a, PageAction::Goto(_)));
        assert_eq!(gotos, 3);
    }

    #[tokio::test]
    async fn test_passkey_error_during_verification_is_dismissed() {
        let clock = Arc::new(ManualClock::new());
        let page = ScriptedPage::new(vec![
            PageFrame::new("https://rewards.bing.com/welcome"),
            PageFrame::new("https://rewards.bing.com/"),
            // the bridge bounced through the provider's passkey nag
            PageFrame::new("https://login.live.com/ppsecure/post.srf")
                .visible(selectors::PASSKEY_ERROR)
                .visible(selectors::SECONDARY_BUTTON),
            PageFrame::new("https://www.bing.com/").visible("#id_n"),
            PageFrame::new("https://rewards.bing.com/").html(HOME_WITH_TOKEN),
        ]);

        let session = finalizer(clock.clone(), Platform::Desktop)
            .finalize(&page, "someone@example.com")
            .await
            .unwrap();

        assert!(session.secondary_verified);
        assert!(page.actions().contains(&PageAction::Click(selectors::SECONDARY_BUTTON.into())));
        assert!(clock.sleeps().is_empty());
        assert!(session.artifact.has_request_token());
    }

    #[tokio::test]
    async fn test_secondary_failure_is_not_fatal() {
        let clock = Arc::new(ManualClock::new());
        let page = ScriptedPage::new(vec![
            PageFrame::new("https://rewards.bing.com/welcome"),
            PageFrame::new("https://rewards.bing.com/"),
            // signed-out secondary home: no marker
            PageFrame::new("https://www.bing.com/"),
            PageFrame::new("https://rewards.bing.com/").html(HOME_WITH_TOKEN),
        ]);

        let session = finalizer(clock.clone(), Platform::Desktop)
            .finalize(&page, "someone@example.com")
            .await
            .unwrap();

        assert!(!session.secondary_verified);
        assert!(session.artifact.has_request_token());
        assert_eq!(clock.count(RETRY_INTERVAL), 5);
    }

    #[tokio::test]
    async fn test_mobile_skips_marker() {
        let clock = Arc::new(ManualClock::new());
        let page = ScriptedPage::new(vec![
            PageFrame::new("https://rewards.bing.com/welcome"),
            PageFrame::new("https://rewards.bing.com/"),
            PageFrame::new("https://www.bing.com/"),
            PageFrame::new("https://rewards.bing.com/").html(HOME_WITH_TOKEN),
        ]);

        let session = finalizer(clock, Platform::Mobile)
            .finalize(&page, "someone@example.com")
            .await
            .unwrap();
        assert!(session.secondary_verified);
    }

    #[tokio::test]
    async fn test_home_never_reached_is_fatal() {
        let clock = Arc::new(ManualClock::new());
        let page = ScriptedPage::new(vec![
            PageFrame::new("https://rewards.bing.com/welcome"),
            PageFrame::new("https://rewards.bing.com/"),
            PageFrame::new("https://www.bing.com/").visible("#id_n"),
            PageFrame::new("https://rewards.bing.com/welcome"),
        ]);

        let err = finalizer(clock.clone(), Platform::Desktop)
            .finalize(&page, "someone@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::HomeNotReached { attempts: 5 }));
        assert_eq!(clock.count(RETRY_INTERVAL), 5);
    }

    #[tokio::test]
    async fn test_home_without_token_is_a_warning() {
        let clock = Arc::new(ManualClock::new());
        let page = ScriptedPage::new(vec![
            PageFrame::new("https://rewards.bing.com/welcome"),
            PageFrame::new("https://rewards.bing.com/"),
            PageFrame::new("https://www.bing.com/").visible("#id_n"),
            PageFrame::new("https://rewards.bing.com/").html("<html></html>"),
        ]);

        let session = finalizer(clock, Platform::Desktop)
            .finalize(&page, "someone@example.com")
            .await
            .unwrap();
        assert!(session.artifact.request_token.is_none());
    }
}
