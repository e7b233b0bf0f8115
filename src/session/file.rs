//! JSON-file session store.
//!
//! Layout: `<root>/<account>/<platform>_cookies.json`, one pretty-printed
//! cookie array per file.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{SessionArtifact, SessionStore, StoredSession};
use crate::credentials::{Platform, mask_account};
use crate::error::{AuthError, Result};
use crate::page::Cookie;

const PLATFORMS: [Platform; 2] = [Platform::Desktop, Platform::Mobile];
const METADATA_FILE: &str = "session.json";

/// Written next to the cookie files; describes the most recent save
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub platform: Platform,
    pub cookie_count: usize,
    pub has_request_token: bool,
    pub captured_at: DateTime<Utc>,
}

/// Session store rooted at a directory
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    root: PathBuf,
}

impl FileSessionStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn account_dir(&self, account: &str) -> Result<PathBuf> {
        let name = account.trim();
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(AuthError::Storage(format!("invalid account directory name: {:?}", account)));
        }
        Ok(self.root.join(name))
    }

    fn cookie_path(&self, account: &str, platform: Platform) -> Result<PathBuf> {
        Ok(self.account_dir(account)?.join(format!("{}_cookies.json", platform)))
    }

    /// Metadata of the most recent save for an account
    pub fn metadata(&self, account: &str) -> Result<Option<SessionMetadata>> {
        let path = self.account_dir(account)?.join(METADATA_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, artifact: &SessionArtifact) -> Result<()> {
        let path = self.cookie_path(&artifact.account, artifact.platform)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(&artifact.cookies)?;
        fs::write(&path, json)?;

        let metadata = SessionMetadata {
            platform: artifact.platform,
            cookie_count: artifact.cookies.len(),
            has_request_token: artifact.has_request_token(),
            captured_at: artifact.captured_at,
        };
        let meta_path = self.account_dir(&artifact.account)?.join(METADATA_FILE);
        fs::write(&meta_path, serde_json::to_string_pretty(&metadata)?)?;

        info!(
            "[{}][SESSION] saved {} cookies for {}",
            artifact.platform,
            artifact.cookies.len(),
            mask_account(&artifact.account)
        );
        Ok(())
    }

    fn load_cookies(&self, account: &str, platform: Platform) -> Result<Option<Vec<Cookie>>> {
        let path = self.cookie_path(account, platform)?;
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn list(&self) -> Result<Vec<StoredSession>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut sessions = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let account = entry.file_name().to_string_lossy().to_string();
            for platform in PLATFORMS {
                match self.load_cookies(&account, platform) {
                    Ok(Some(cookies)) => sessions.push(StoredSession {
                        account: account.clone(),
                        platform,
                        cookie_count: cookies.len(),
                    }),
                    Ok(None) => {}
                    Err(e) => debug!("skipping unreadable session {}/{}: {}", account, platform, e),
                }
            }
        }

        sessions.sort_by(|a, b| (&a.account, a.platform.as_str()).cmp(&(&b.account, b.platform.as_str())));
        Ok(sessions)
    }

    fn clear(&self, account: Option<&str>) -> Result<usize> {
        if !self.root.exists() {
            return Ok(0);
        }

        let dirs: Vec<PathBuf> = match account {
            Some(account) => {
                let dir = self.account_dir(account)?;
                if dir.exists() { vec![dir] } else { Vec::new() }
            }
            None => fs::read_dir(&self.root)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect(),
        };

        for dir in &dirs {
            fs::remove_dir_all(dir)?;
            debug!("removed session directory {}", dir.display());
        }
        Ok(dirs.len())
    }
}
