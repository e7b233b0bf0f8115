//! Browser page abstraction
//!
//! The state machine never talks to a browser directly. Whoever provisions
//! the browser session supplies a [`Page`]; tests supply a [`ScriptedPage`].

mod scripted;

pub use scripted::{Advance, PageAction, PageFrame, ScriptedPage};

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Result;

/// Which load milestone a navigation or settle wait should reach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    DomContentLoaded,
    Load,
    NetworkIdle,
}

/// Element condition a selector wait should reach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementState {
    /// Present in the DOM, visible or not
    Attached,
    /// Present and rendered
    Visible,
}

/// A browser cookie, in the shape browser drivers export them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    /// Unix seconds; -1 or absent for session cookies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: default_cookie_path(),
            expires: None,
            http_only: false,
            secure: true,
            same_site: None,
        }
    }
}

/// Handle to one live browser page
///
/// Selector waits return `Ok(false)` when the condition was not reached
/// within the timeout. Only handlers may call the mutating methods.
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigate to a URL.
    async fn goto(&self, url: &str, wait: WaitUntil, timeout: Duration) -> Result<()>;

    /// Reload the current document.
    async fn reload(&self, wait: WaitUntil) -> Result<()>;

    /// Current URL of the page.
    fn url(&self) -> String;

    /// Wait for a load milestone.
    async fn wait_for_load_state(&self, state: WaitUntil, timeout: Duration) -> Result<()>;

    /// Wait for a selector to reach the given state.
    async fn wait_for_selector(&self, selector: &str, state: ElementState, timeout: Duration) -> Result<bool>;

    /// Inner text of the first element matching the selector.
    async fn inner_text(&self, selector: &str) -> Result<Option<String>>;

    /// Replace the value of an input.
    async fn fill(&self, selector: &str, text: &str) -> Result<()>;

    /// Click the first element matching the selector.
    async fn click(&self, selector: &str) -> Result<()>;

    /// Press a key on the focused element.
    async fn press(&self, key: &str) -> Result<()>;

    /// Serialized HTML of the current document.
    async fn content(&self) -> Result<String>;

    /// Whether the remote side has closed the page.
    fn is_closed(&self) -> bool;

    /// Every cookie in the page's browser context.
    async fn cookies(&self) -> Result<Vec<Cookie>>;
}

/// Best-effort wait for network quiescence; timeouts and errors are ignored.
pub async fn settle(page: &dyn Page, timeout: Duration) {
    if let Err(e) = page.wait_for_load_state(WaitUntil::NetworkIdle, timeout).await {
        debug!("settle wait ended early: {}", e);
    }
}

/// Bounded visibility check that treats errors as absence.
pub async fn is_visible(page: &dyn Page, selector: &str, timeout: Duration) -> bool {
    page.wait_for_selector(selector, ElementState::Visible, timeout)
        .await
        .unwrap_or(false)
}

/// Host component of a URL, if it parses and has one.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(str::to_string)
}

/// Path component of a URL, if it parses.
pub fn path_of(url: &str) -> Option<String> {
    Url::parse(url).ok().map(|u| u.path().to_string())
}

/// True when the URL is exactly the root of the given host.
pub fn is_host_root(url: &str, host: &str) -> bool {
    match Url::parse(url) {
        Ok(u) => u.host_str() == Some(host) && u.path() == "/",
        Err(_) => false,
    }
}
