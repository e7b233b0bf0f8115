//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - code: print the current TOTP code for an account or seed
//! - accounts: list configured accounts
//! - sessions: list or clear saved sessions
//! - config: show the resolved configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// authflow - operator tools for the identity provider login state machine
#[derive(Parser, Debug)]
#[command(name = "authflow")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the current TOTP code
    Code {
        /// Configured account whose seed to use
        #[arg(required_unless_present = "seed", conflicts_with = "seed")]
        account: Option<String>,

        /// Base32 seed to use instead of a configured account
        #[arg(short, long)]
        seed: Option<String>,
    },

    /// List configured accounts
    Accounts,

    /// Saved session management
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Show the resolved configuration with secrets redacted
    Config,
}

/// Session subcommands
#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// List saved sessions
    List,

    /// Delete saved sessions
    Clear {
        /// Only clear this account
        #[arg(short, long)]
        account: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_code_with_account() {
        let cli = Cli::try_parse_from(["authflow", "code", "someone@example.com"]).unwrap();
        match cli.command {
            Commands::Code { account, seed } => {
                assert_eq!(account.as_deref(), Some("someone@example.com"));
                assert!(seed.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_code_with_seed() {
        let cli = Cli::try_parse_from(["authflow", "code", "--seed", "JBSWY3DPEHPK3PXP"]).unwrap();
        assert!(matches!(cli.command, Commands::Code { account: None, seed: Some(_) }));
    }

    #[test]
    fn test_code_needs_account_or_seed() {
        assert!(Cli::try_parse_from(["authflow", "code"]).is_err());
        assert!(Cli::try_parse_from(["authflow", "code", "a@b.c", "--seed", "AAAA"]).is_err());
    }

    #[test]
    fn test_parse_sessions_clear() {
        let cli = Cli::try_parse_from(["authflow", "-v", "sessions", "clear", "--account", "a@b.c"]).unwrap();
        assert!(cli.is_verbose());
        match cli.command {
            Commands::Sessions {
                command: SessionCommands::Clear { account },
            } => assert_eq!(account.as_deref(), Some("a@b.c")),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["authflow", "accounts", "--config", "/tmp/x.yml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/x.yml")));
    }
}
