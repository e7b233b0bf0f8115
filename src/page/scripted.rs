//! Scripted page for exercising the login state machine without a browser.
//!
//! A script is a list of frames. Mutating actions move the script to the next
//! frame (unless the frame says otherwise); every action is recorded.
//! Navigations and clicks can be told to fail, in which case nothing is
//! recorded and the frame stays put.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{Cookie, ElementState, Page, WaitUntil};
use crate::error::{AuthError, Result};

/// When a frame hands over to the next one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Any click, key press, navigation or reload
    OnAction,
    /// After the URL has been read this many times
    AfterUrlReads(usize),
    /// Stay on this frame forever
    Never,
}

/// One snapshot of the page
#[derive(Debug, Clone)]
pub struct PageFrame {
    url: String,
    visible: HashSet<String>,
    attached: HashSet<String>,
    texts: HashMap<String, String>,
    html: String,
    advance: Advance,
}

impl PageFrame {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            visible: HashSet::new(),
            attached: HashSet::new(),
            texts: HashMap::new(),
            html: String::new(),
            advance: Advance::OnAction,
        }
    }

    /// Mark a selector as visible.
    pub fn visible(mut self, selector: &str) -> Self {
        self.visible.insert(selector.to_string());
        self
    }

    /// Mark a selector as present but hidden.
    pub fn attached(mut self, selector: &str) -> Self {
        self.attached.insert(selector.to_string());
        self
    }

    /// Give a visible selector some inner text.
    pub fn text(mut self, selector: &str, text: &str) -> Self {
        self.visible.insert(selector.to_string());
        self.texts.insert(selector.to_string(), text.to_string());
        self
    }

    pub fn html(mut self, html: &str) -> Self {
        self.html = html.to_string();
        self
    }

    pub fn advance(mut self, advance: Advance) -> Self {
        self.advance = advance;
        self
    }

    fn matches(set: &HashSet<String>, selector: &str) -> bool {
        set.contains(selector) || selector.split(", ").any(|part| set.contains(part.trim()))
    }

    fn is_visible(&self, selector: &str) -> bool {
        Self::matches(&self.visible, selector)
    }

    fn is_attached(&self, selector: &str) -> bool {
        self.is_visible(selector) || Self::matches(&self.attached, selector)
    }

    fn text_of(&self, selector: &str) -> Option<String> {
        self.texts.get(selector).cloned().or_else(|| {
            selector
                .split(", ")
                .find_map(|part| self.texts.get(part.trim()).cloned())
        })
    }
}

/// A recorded page action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageAction {
    Goto(String),
    Reload,
    Fill { selector: String, text: String },
    Click(String),
    Press(String),
}

#[derive(Debug)]
struct ScriptState {
    frames: Vec<PageFrame>,
    cursor: usize,
    cycle: bool,
    closed: bool,
    url_reads: usize,
    cookies: Vec<Cookie>,
    actions: Vec<PageAction>,
    failing_gotos: HashSet<String>,
    failing_clicks: HashMap<String, usize>,
}

impl ScriptState {
    fn frame(&self) -> &PageFrame {
        &self.frames[self.cursor]
    }

    fn step(&mut self) {
        self.url_reads = 0;
        if self.cursor + 1 < self.frames.len() {
            self.cursor += 1;
        } else if self.cycle {
            self.cursor = 0;
        }
    }

    fn click_fails(&mut self, selector: &str) -> bool {
        match self.failing_clicks.get_mut(selector) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn act(&mut self, action: PageAction) {
        self.actions.push(action);
        if self.frame().advance == Advance::OnAction {
            self.step();
        }
    }
}

/// In-memory [`Page`] driven by a list of frames
#[derive(Debug)]
pub struct ScriptedPage {
    state: Mutex<ScriptState>,
}

impl ScriptedPage {
    /// Create a page from frames; an empty script gets a blank frame.
    pub fn new(mut frames: Vec<PageFrame>) -> Self {
        if frames.is_empty() {
            frames.push(PageFrame::new("about:blank"));
        }
        Self {
            state: Mutex::new(ScriptState {
                frames,
                cursor: 0,
                cycle: false,
                closed: false,
                url_reads: 0,
                cookies: Vec::new(),
                actions: Vec::new(),
                failing_gotos: HashSet::new(),
                failing_clicks: HashMap::new(),
            }),
        }
    }

    /// Wrap back to the first frame after the last one.
    pub fn cycling(self) -> Self {
        self.lock().cycle = true;
        self
    }

    pub fn with_cookies(self, cookies: Vec<Cookie>) -> Self {
        self.lock().cookies = cookies;
        self
    }

    /// Every navigation to `url` fails.
    pub fn failing_goto(self, url: &str) -> Self {
        self.lock().failing_gotos.insert(url.to_string());
        self
    }

    /// The next `times` clicks on `selector` fail.
    pub fn failing_clicks(self, selector: &str, times: usize) -> Self {
        self.lock().failing_clicks.insert(selector.to_string(), times);
        self
    }

    /// Simulate the remote side closing the page.
    pub fn close(&self) {
        self.lock().closed = true;
    }

    /// Every action performed so far
    pub fn actions(&self) -> Vec<PageAction> {
        self.lock().actions.clone()
    }

    /// Index of the current frame
    pub fn cursor(&self) -> usize {
        self.lock().cursor
    }

    /// Number of recorded actions matching a predicate
    pub fn count_actions(&self, predicate: impl Fn(&PageAction) -> bool) -> usize {
        self.lock().actions.iter().filter(|a| predicate(a)).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        // A poisoned lock only happens after a test already panicked
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Page for ScriptedPage {
    async fn goto(&self, url: &str, _wait: WaitUntil, _timeout: Duration) -> Result<()> {
        let mut state = self.lock();
        if state.failing_gotos.contains(url) {
            return Err(AuthError::Page(format!("net::ERR_CONNECTION_RESET at {}", url)));
        }
        state.act(PageAction::Goto(url.to_string()));
        Ok(())
    }

    async fn reload(&self, _wait: WaitUntil) -> Result<()> {
        self.lock().act(PageAction::Reload);
        Ok(())
    }

    fn url(&self) -> String {
        let mut state = self.lock();
        let url = state.frame().url.clone();
        state.url_reads += 1;
        let advance = state.frame().advance;
        if let Advance::AfterUrlReads(n) = advance {
            if state.url_reads >= n {
                state.step();
            }
        }
        url
    }

    async fn wait_for_load_state(&self, _state: WaitUntil, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, state: ElementState, _timeout: Duration) -> Result<bool> {
        let guard = self.lock();
        let frame = guard.frame();
        Ok(match state {
            ElementState::Visible => frame.is_visible(selector),
            ElementState::Attached => frame.is_attached(selector),
        })
    }

    async fn inner_text(&self, selector: &str) -> Result<Option<String>> {
        Ok(self.lock().frame().text_of(selector))
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<()> {
        let mut state = self.lock();
        if !state.frame().is_attached(selector) {
            return Err(AuthError::Page(format!("no element matches {}", selector)));
        }
        // Filling never navigates, so the frame stays put
        state.actions.push(PageAction::Fill {
            selector: selector.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let mut state = self.lock();
        if !state.frame().is_attached(selector) {
            return Err(AuthError::Page(format!("no element matches {}", selector)));
        }
        if state.click_fails(selector) {
            return Err(AuthError::Page(format!("element {} is detached from the DOM", selector)));
        }
        state.act(PageAction::Click(selector.to_string()));
        Ok(())
    }

    async fn press(&self, key: &str) -> Result<()> {
        self.lock().act(PageAction::Press(key.to_string()));
        Ok(())
    }

    async fn content(&self) -> Result<String> {
        Ok(self.lock().frame().html.clone())
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }

    async fn cookies(&self) -> Result<Vec<Cookie>> {
        Ok(self.lock().cookies.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_click_advances_frame() {
        let page = ScriptedPage::new(vec![
            PageFrame::new("https://a.example/").visible("#next"),
            PageFrame::new("https://b.example/"),
        ]);
        page.click("#next").await.unwrap();
        assert_eq!(page.url(), "https://b.example/");
        assert_eq!(page.actions(), vec![PageAction::Click("#next".into())]);
    }

    #[tokio::test]
    async fn test_fill_does_not_advance() {
        let page = ScriptedPage::new(vec![
            PageFrame::new("https://a.example/").visible("#in"),
            PageFrame::new("https://b.example/"),
        ]);
        page.fill("#in", "hello").await.unwrap();
        assert_eq!(page.cursor(), 0);
    }

    #[tokio::test]
    async fn test_missing_element_errors() {
        let page = ScriptedPage::new(vec![PageFrame::new("https://a.example/")]);
        assert!(page.click("#nope").await.is_err());
        assert!(page.fill("#nope", "x").await.is_err());
        assert!(page.actions().is_empty());
    }

    #[test]
    fn test_advance_after_url_reads() {
        let page = ScriptedPage::new(vec![
            PageFrame::new("https://a.example/").advance(Advance::AfterUrlReads(2)),
            PageFrame::new("https://b.example/"),
        ]);
        assert_eq!(page.url(), "https://a.example/");
        assert_eq!(page.url(), "https://a.example/");
        assert_eq!(page.url(), "https://b.example/");
    }

    #[tokio::test]
    async fn test_never_advance_and_cycling() {
        let page = ScriptedPage::new(vec![PageFrame::new("https://a.example/").advance(Advance::Never)]);
        page.reload(WaitUntil::Load).await.unwrap();
        assert_eq!(page.cursor(), 0);

        let page = ScriptedPage::new(vec![
            PageFrame::new("https://a.example/"),
            PageFrame::new("https://b.example/"),
        ])
        .cycling();
        page.press("Enter").await.unwrap();
        page.press("Enter").await.unwrap();
        assert_eq!(page.cursor(), 0);
    }

    #[tokio::test]
    async fn test_injected_failures_leave_frame_alone() {
        let page = ScriptedPage::new(vec![
            PageFrame::new("https://a.example/").visible("#next"),
            PageFrame::new("https://b.example/"),
        ])
        .failing_goto("https://down.example/")
        .failing_clicks("#next", 1);

        assert!(page.goto("https://down.example/", WaitUntil::Load, Duration::ZERO).await.is_err());
        assert!(page.click("#next").await.is_err());
        assert_eq!(page.cursor(), 0);
        assert!(page.actions().is_empty());

        page.click("#next").await.unwrap();
        assert_eq!(page.cursor(), 1);
    }

    #[tokio::test]
    async fn test_compound_selector_matches_any_part() {
        let page = ScriptedPage::new(vec![PageFrame::new("https://a.example/").attached("input[name=\"otc\"]")]);
        let found = page
            .wait_for_selector(
                "input[id=\"otc-confirmation-input\"], input[name=\"otc\"]",
                ElementState::Attached,
                Duration::ZERO,
            )
            .await
            .unwrap();
        assert!(found);
    }
}
