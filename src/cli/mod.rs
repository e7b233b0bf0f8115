//! CLI module for authflow - command-line interface and subcommands.
//!
//! Operator utilities around the login state machine: TOTP codes, configured
//! accounts, saved sessions and the resolved configuration.

pub mod commands;

pub use commands::Cli;
