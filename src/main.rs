use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use std::fs;
use std::path::PathBuf;

use authflow::clock::now_secs;
use authflow::config::Config;
use authflow::session::{FileSessionStore, SessionStore};
use authflow::totp::Totp;

mod cli;

use cli::Cli;
use cli::commands::{Commands, SessionCommands};

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("authflow")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("authflow.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("trace"))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Narrow logging to the configured level unless RUST_LOG decides.
fn apply_log_level(config: &Config) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    let level = config
        .log_level
        .as_deref()
        .and_then(|l| l.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Info);
    log::set_max_level(level);
}

fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
        println!("  Sessions: {}", config.session_path.display());
    }

    match &cli.command {
        Commands::Code { account, seed } => handle_code_command(account.as_deref(), seed.as_deref(), config),
        Commands::Accounts => handle_accounts_command(config),
        Commands::Sessions { command } => handle_sessions_command(command, config),
        Commands::Config => handle_config_command(config),
    }
}

fn handle_code_command(account: Option<&str>, seed: Option<&str>, config: &Config) -> Result<()> {
    let seed = match (seed, account) {
        (Some(seed), _) => seed.to_string(),
        (None, Some(account)) => {
            let creds = config
                .account(account)
                .ok_or_else(|| eyre!("No configured account matches {}", account))?;
            info!("Generating TOTP code for {}", creds.masked());
            creds
                .totp_secret
                .clone()
                .ok_or_else(|| eyre!("Account {} has no TOTP seed configured", creds.masked()))?
        }
        (None, None) => return Err(eyre!("Either an account or --seed is required")),
    };

    let totp = Totp::from_base32(&seed)
        .context("Failed to decode TOTP seed")?
        .with_digits(config.totp.digits)
        .with_period(config.totp.period_secs)
        .with_algorithm(config.totp.algorithm);

    let now = now_secs();
    let code = totp.generate_at(now).context("Failed to generate TOTP code")?;
    println!(
        "{} {}",
        code.bold().green(),
        format!("({}s remaining)", totp.seconds_remaining(now)).dimmed()
    );
    Ok(())
}

fn handle_accounts_command(config: &Config) -> Result<()> {
    info!("Listing {} configured accounts", config.accounts.len());

    if config.accounts.is_empty() {
        println!("{}", "No accounts configured".yellow());
        return Ok(());
    }

    for creds in &config.accounts {
        let method = if creds.has_totp() {
            "totp".green()
        } else {
            "manual".yellow()
        };
        println!("  {} [{}]", creds.masked(), method);
    }
    Ok(())
}

fn handle_sessions_command(command: &SessionCommands, config: &Config) -> Result<()> {
    let store = FileSessionStore::new(&config.session_path);

    match command {
        SessionCommands::List => {
            let sessions = store.list().context("Failed to list sessions")?;
            if sessions.is_empty() {
                println!("{}", "No saved sessions".yellow());
                return Ok(());
            }
            for session in sessions {
                println!(
                    "  {} {} ({} cookies)",
                    authflow::credentials::mask_account(&session.account),
                    session.platform.to_string().cyan(),
                    session.cookie_count
                );
            }
        }
        SessionCommands::Clear { account } => {
            let removed = store
                .clear(account.as_deref())
                .context("Failed to clear sessions")?;
            info!("Cleared {} session directories", removed);
            println!("{} {} session(s)", "Cleared:".green(), removed);
        }
    }
    Ok(())
}

fn handle_config_command(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(&config.redacted()).context("Failed to render configuration")?;
    println!("{}", yaml);
    Ok(())
}

fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    apply_log_level(&config);
    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).context("Application failed")?;

    Ok(())
}
