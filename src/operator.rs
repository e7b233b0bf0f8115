//! Human-in-the-loop surface: manual code entry and approval hints.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use colored::*;
use log::{debug, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};

/// Something the operator should know or do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorNotice {
    /// Approve the sign-in on the authenticator, picking this number if shown
    ApproveSignIn { number: Option<String> },
    /// Passwordless approval still pending
    StillWaiting { elapsed: u32, limit: u32 },
    /// A manual TOTP code is about to be requested
    EnterTotpCode { attempt: u32, max: u32 },
}

/// The person watching the login
#[async_trait]
pub trait Operator: Send + Sync {
    /// Ask for a code; `None` when nothing arrived within the timeout.
    async fn request_code(&self, prompt: &str, timeout: Duration) -> Option<String>;

    /// Surface a notice.
    fn notify(&self, notice: &OperatorNotice);
}

#[derive(Debug)]
struct TerminalInput {
    reader: BufReader<Stdin>,
    /// Bytes of a line that was still being typed when a prompt timed out
    pending: Vec<u8>,
}

/// Operator on the controlling terminal
///
/// One stdin reader is shared by every prompt so nothing buffered by an
/// earlier read is lost.
#[derive(Debug)]
pub struct TerminalOperator {
    input: tokio::sync::Mutex<TerminalInput>,
}

impl TerminalOperator {
    pub fn new() -> Self {
        Self {
            input: tokio::sync::Mutex::new(TerminalInput {
                reader: BufReader::new(tokio::io::stdin()),
                pending: Vec::new(),
            }),
        }
    }
}

impl Default for TerminalOperator {
    fn default() -> Self {
        Self::new()
    }
}

/// Read one line within `timeout`.
///
/// Partial input stays in `pending` across timeouts and is completed by the
/// next call.
async fn read_line_within<R>(reader: &mut R, pending: &mut Vec<u8>, timeout: Duration) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    match tokio::time::timeout(timeout, reader.read_until(b'\n', pending)).await {
        Ok(Ok(n)) if n > 0 || !pending.is_empty() => {
            let line = String::from_utf8_lossy(pending).trim().to_string();
            pending.clear();
            Some(line)
        }
        Ok(Ok(_)) => None,
        Ok(Err(e)) => {
            warn!("reading operator input failed: {}", e);
            pending.clear();
            None
        }
        Err(_) => {
            debug!("operator prompt timed out with {} bytes pending", pending.len());
            None
        }
    }
}

#[async_trait]
impl Operator for TerminalOperator {
    async fn request_code(&self, prompt: &str, timeout: Duration) -> Option<String> {
        let mut stdout = tokio::io::stdout();
        if let Err(e) = stdout.write_all(format!("{} ", prompt.cyan()).as_bytes()).await {
            warn!("could not write operator prompt: {}", e);
        }
        if let Err(e) = stdout.flush().await {
            debug!("could not flush operator prompt: {}", e);
        }

        let mut input = self.input.lock().await;
        let TerminalInput { reader, pending } = &mut *input;
        read_line_within(reader, pending, timeout).await
    }

    fn notify(&self, notice: &OperatorNotice) {
        match notice {
            OperatorNotice::ApproveSignIn { number: Some(number) } => {
                eprintln!("{} approve the sign-in and select {}", "Action:".yellow(), number.bold());
            }
            OperatorNotice::ApproveSignIn { number: None } => {
                eprintln!("{} approve the sign-in in your authenticator app", "Action:".yellow());
            }
            OperatorNotice::StillWaiting { elapsed, limit } => {
                eprintln!("{} still waiting for approval ({}/{}s)", "Waiting:".cyan(), elapsed, limit);
            }
            OperatorNotice::EnterTotpCode { attempt, max } => {
                eprintln!("{} TOTP code required (attempt {}/{})", "Action:".yellow(), attempt, max);
            }
        }
    }
}

/// Operator with canned responses that records what it was shown
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    responses: Mutex<VecDeque<Option<String>>>,
    prompts: Mutex<Vec<String>>,
    notices: Mutex<Vec<OperatorNotice>>,
}

impl ScriptedOperator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue responses; `None` simulates a timed-out prompt.
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        let op = Self::new();
        if let Ok(mut queue) = op.responses.lock() {
            queue.extend(responses.into_iter().map(|r| r.map(Into::into)));
        }
        op
    }

    /// Number of times a code was requested
    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn notices(&self) -> Vec<OperatorNotice> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Operator for ScriptedOperator {
    async fn request_code(&self, prompt: &str, _timeout: Duration) -> Option<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.responses.lock().ok().and_then(|mut q| q.pop_front()).flatten()
    }

    fn notify(&self, notice: &OperatorNotice) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice.clone());
        }
    }
}
