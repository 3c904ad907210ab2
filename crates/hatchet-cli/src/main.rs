//! hatchet - scrobble to the Hatchet service from the command line.
//!
//! Single events go through `now-playing` and `scrobble`. `feed` reads a
//! stream of events from stdin (e.g. piped from a player hook) and replays
//! queued scrobbles on a fixed interval while it runs.

mod config;
mod credentials;
mod feed;

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use hatchet_core::{HatchetClient, SubmitOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::Config;
use credentials::CredentialStore;
use feed::FeedEvent;

/// Environment variable checked before the keychain for the password
const PASSWORD_ENV: &str = "HATCHET_PASSWORD";

/// Log file name prefix inside the configured log directory
const LOG_FILE_PREFIX: &str = "hatchet.log";

#[derive(Debug, Parser)]
#[command(name = "hatchet", version, about = "Scrobble to the Hatchet service")]
struct Cli {
    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Hatchet username (defaults to the one saved by `hatchet login`)
    #[arg(short, long, global = true, env = "HATCHET_USERNAME")]
    username: Option<String>,

    /// Client identifier sent as User-Agent
    #[arg(long, global = true, env = "HATCHET_CLIENT_ID")]
    client_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Verify a password and store it in the OS keychain
    Login,
    /// Remove the stored password for the user
    Logout,
    /// Announce the track that is playing right now
    NowPlaying {
        artist: String,
        album: String,
        track: String,
    },
    /// Record a finished play
    Scrobble {
        artist: String,
        album: String,
        track: String,
        /// When the track was played (RFC 3339), defaults to now
        #[arg(long, value_parser = feed::parse_timestamp)]
        timestamp: Option<DateTime<Utc>>,
    },
    /// Read tab-separated events from stdin until EOF
    Feed {
        /// Seconds between retries of queued scrobbles
        #[arg(long, default_value_t = 60)]
        retry_secs: u64,
    },
}

/// Initialize the tracing subscriber for logging.
/// The returned guard must stay alive for file logs to be flushed.
fn init_tracing(verbose: bool, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let mut config = Config::load()?;
    let _guard = init_tracing(cli.verbose, config.log_dir.as_deref());

    if let Some(ref client_id) = cli.client_id {
        config.client_id = Some(client_id.clone());
    }

    match cli.command {
        Command::Login => login(&mut config, cli.username).await,
        Command::Logout => {
            let username = resolve_username(&config, cli.username)?;
            if CredentialStore::open(&config, &username)?.delete()? {
                eprintln!("Removed stored password for {}", username);
            } else {
                eprintln!("No stored password for {}", username);
            }
            Ok(())
        }
        Command::NowPlaying {
            artist,
            album,
            track,
        } => {
            let client = connect(&config, cli.username)?;
            client.now_playing(&artist, &album, &track).await?;
            eprintln!("Now playing: {} - {}", artist, track);
            Ok(())
        }
        Command::Scrobble {
            artist,
            album,
            track,
            timestamp,
        } => {
            let client = connect(&config, cli.username)?;
            match client.scrobble(&artist, &album, &track, timestamp).await? {
                SubmitOutcome::Delivered => eprintln!("Scrobbled: {} - {}", artist, track),
                SubmitOutcome::Queued => {
                    // One more attempt; the queue does not outlive this process
                    let report = client.process_queue().await?;
                    if report.queued > 0 {
                        anyhow::bail!("Service unreachable, scrobble not delivered");
                    }
                    eprintln!("Scrobbled on retry: {} - {}", artist, track);
                }
            }
            Ok(())
        }
        Command::Feed { retry_secs } => {
            let client = connect(&config, cli.username)?;
            run_feed(&client, Duration::from_secs(retry_secs.max(1))).await
        }
    }
}

async fn login(config: &mut Config, username: Option<String>) -> Result<()> {
    let username = match username.or_else(|| config.username.clone()) {
        Some(username) => username,
        None => prompt("Username: ")?,
    };
    let password = match std::env::var(PASSWORD_ENV) {
        Ok(password) => password,
        Err(_) => rpassword::prompt_password("Password: ").context("Failed to read password")?,
    };

    let client = HatchetClient::with_config(config.service(), config.client_id(), &username, &password)?;
    client
        .credentials()
        .ensure_access_token()
        .await
        .context("Login failed")?;
    info!(username = %username, "Login verified");

    let stored = CredentialStore::open(config, &username).and_then(|store| store.store(&password));
    if let Err(e) = stored {
        warn!(error = %e, "Could not save password to keychain");
    }
    config.username = Some(username.clone());
    config.save()?;

    eprintln!("Logged in as {}", username);
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    eprint!("{}", label);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let value = line.trim().to_string();
    if value.is_empty() {
        anyhow::bail!("No input given");
    }
    Ok(value)
}

fn resolve_username(config: &Config, username: Option<String>) -> Result<String> {
    username
        .or_else(|| config.username.clone())
        .ok_or_else(|| anyhow::anyhow!("No username configured. Pass --username or run `hatchet login`"))
}

fn resolve_password(config: &Config, username: &str) -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    if let Some(password) = CredentialStore::open(config, username)?.password()? {
        return Ok(password);
    }
    rpassword::prompt_password(format!("Password for {}: ", username))
        .context("Failed to read password")
}

fn connect(config: &Config, username: Option<String>) -> Result<HatchetClient> {
    let username = resolve_username(config, username)?;
    let password = resolve_password(config, &username)?;
    debug!(username = %username, client_id = config.client_id(), "Creating client");
    Ok(HatchetClient::with_config(
        config.service(),
        config.client_id(),
        username,
        password,
    )?)
}

async fn run_feed(client: &HatchetClient, retry_every: Duration) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut retry = tokio::time::interval(retry_every);
    retry.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // First tick completes immediately
    retry.tick().await;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match feed::parse_line(&line) {
                    Ok(event) => handle_event(client, event).await,
                    Err(e) => warn!(error = %e, "Skipping malformed line"),
                }
            }
            _ = retry.tick() => drain_queue(client).await,
        }
    }

    drain_queue(client).await;
    let remaining = client.queue().len().await;
    if remaining > 0 {
        warn!(remaining, "Exiting with undelivered scrobbles");
    }
    Ok(())
}

async fn handle_event(client: &HatchetClient, event: FeedEvent) {
    match event {
        FeedEvent::NowPlaying {
            artist,
            album,
            track,
        } => {
            if let Err(e) = client.now_playing(&artist, &album, &track).await {
                warn!(error = %e, artist = %artist, track = %track, "Now playing update failed");
            }
        }
        FeedEvent::Scrobble {
            artist,
            album,
            track,
            played_at,
        } => match client.scrobble(&artist, &album, &track, played_at).await {
            Ok(SubmitOutcome::Delivered) => info!(artist = %artist, track = %track, "Scrobbled"),
            Ok(SubmitOutcome::Queued) => info!(artist = %artist, track = %track, "Scrobble queued"),
            Err(e) => warn!(error = %e, artist = %artist, track = %track, "Scrobble rejected"),
        },
    }
}

async fn drain_queue(client: &HatchetClient) {
    match client.process_queue().await {
        Ok(report) if report.delivered > 0 || report.queued > 0 => {
            info!(delivered = report.delivered, queued = report.queued, "Retried queued scrobbles");
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Dropped queued scrobble"),
    }
}
