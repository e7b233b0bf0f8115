use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::credentials::Credentials;
use crate::error::{AuthError, Result};
use crate::totp::Algorithm;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    /// Target service home
    pub base_url: String,
    pub session_path: PathBuf,
    pub hosts: HostConfig,
    pub login: LoginConfig,
    pub totp: TotpConfig,
    pub passwordless: PasswordlessConfig,
    pub finalize: FinalizeConfig,
    pub accounts: Vec<Credentials>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub identity_provider: String,
    pub identity_root: String,
    pub authenticated: Vec<String>,
    pub error_page: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            identity_provider: "login.live.com".to_string(),
            identity_root: "https://login.live.com/".to_string(),
            authenticated: vec!["rewards.bing.com".to_string(), "account.microsoft.com".to_string()],
            error_page: "chromewebdata".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    pub entry_url: String,
    pub max_iterations: u32,
    pub stuck_threshold: u32,
    pub probe_timeout_ms: u64,
    pub settle_timeout_ms: u64,
    pub iteration_delay_ms: u64,
    pub reload_delay_ms: u64,
    pub entry_delay_ms: u64,
    pub navigation_timeout_ms: u64,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            entry_url: "https://www.bing.com/rewards/dashboard".to_string(),
            max_iterations: 25,
            stuck_threshold: 4,
            probe_timeout_ms: 200,
            settle_timeout_ms: 5000,
            iteration_delay_ms: 1000,
            reload_delay_ms: 3000,
            entry_delay_ms: 2000,
            navigation_timeout_ms: 10000,
        }
    }
}

impl LoginConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn settle_timeout(&self) -> Duration {
        Duration::from_millis(self.settle_timeout_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TotpConfig {
    pub manual_attempts: u32,
    pub manual_timeout_secs: u64,
    pub digits: u32,
    pub period_secs: u64,
    pub algorithm: Algorithm,
}

impl Default for TotpConfig {
    fn default() -> Self {
        Self {
            manual_attempts: 5,
            manual_timeout_secs: 60,
            digits: 6,
            period_secs: 30,
            algorithm: Algorithm::Sha1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordlessConfig {
    pub max_polls: u32,
    pub notice_every: u32,
    pub approval_path: String,
    pub number_timeout_ms: u64,
}

impl Default for PasswordlessConfig {
    fn default() -> Self {
        Self {
            max_polls: 60,
            notice_every: 5,
            approval_path: "/ppsecure/post.srf".to_string(),
            number_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalizeConfig {
    pub verify_attempts: u32,
    pub token_attempts: u32,
    pub secondary_bridge_url: String,
    pub secondary_home_host: String,
    pub signed_in_marker: String,
    pub marker_timeout_ms: u64,
    pub dismiss_selectors: Vec<String>,
}

impl Default for FinalizeConfig {
    fn default() -> Self {
        Self {
            verify_attempts: 5,
            token_attempts: 5,
            secondary_bridge_url: "https://www.bing.com/fd/auth/signin?action=interactive&provider=windows_live_id&return_url=https%3A%2F%2Fwww.bing.com%2F".to_string(),
            secondary_home_host: "www.bing.com".to_string(),
            signed_in_marker: "#id_n".to_string(),
            marker_timeout_ms: 3000,
            dismiss_selectors: vec![
                "#bnp_btn_accept".to_string(),
                "#reward_pivot_earn button.close".to_string(),
                r#"button[aria-label="Close"]"#.to_string(),
            ],
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            base_url: "https://rewards.bing.com/".to_string(),
            session_path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("authflow")
                .join("sessions"),
            hosts: HostConfig::default(),
            login: LoginConfig::default(),
            totp: TotpConfig::default(),
            passwordless: PasswordlessConfig::default(),
            finalize: FinalizeConfig::default(),
            accounts: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, it must load
        if let Some(path) = config_path {
            return Self::load_from_file(path)
                .map_err(|e| AuthError::Config(format!("Failed to load config from {}: {}", path.display(), e)));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config = Self::from_yaml(&content)?;
        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the login flow cannot run with.
    pub fn validate(&self) -> Result<()> {
        if url::Url::parse(&self.base_url).is_err() {
            return Err(AuthError::Config(format!("base_url is not a valid URL: {}", self.base_url)));
        }
        if self.login.max_iterations == 0 {
            return Err(AuthError::Config("login.max_iterations must be at least 1".into()));
        }
        if self.login.stuck_threshold == 0 {
            return Err(AuthError::Config("login.stuck_threshold must be at least 1".into()));
        }
        if !(6..=8).contains(&self.totp.digits) {
            return Err(AuthError::Config(format!("totp.digits must be 6-8, got {}", self.totp.digits)));
        }
        if self.totp.period_secs == 0 {
            return Err(AuthError::Config("totp.period_secs must be positive".into()));
        }
        Ok(())
    }

    /// Host of the target service home
    pub fn target_host(&self) -> String {
        crate::page::host_of(&self.base_url).unwrap_or_default()
    }

    /// Find a configured account by its identifier (case-insensitive).
    pub fn account(&self, email: &str) -> Option<&Credentials> {
        self.accounts.iter().find(|a| a.email.eq_ignore_ascii_case(email))
    }

    /// Copy safe to print: account secrets replaced, identifiers masked.
    pub fn redacted(&self) -> Self {
        Self {
            accounts: self.accounts.iter().map(Credentials::redacted).collect(),
            ..self.clone()
        }
    }
}
