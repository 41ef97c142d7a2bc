//! framefeed — polls Reddit image feeds and publishes a picture-frame payload.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌───────────┐  refresh   ┌──────────┐  publish   ┌───────────┐
//! │ source/   │ ─────────► │  app.rs  │ ─────────► │ data.json │
//! │ (reddit)  │ (pool.rs)  │ (state)  │            │ (display) │
//! └───────────┘            └──────────┘            └───────────┘
//!                               ▲
//!                               │ normalize_url() / is_good_image()
//!                     ┌─────────┴─────────┐
//!                     │ imgur.rs          │
//!                     │ admission.rs      │
//!                     └───────────────────┘
//! ```
//!
//! * **`source/`** — the `PostSource` trait and concrete implementations
//!   (currently Reddit only).
//! * **`pool`** — rebuilds the candidate pool, one worker thread per feed.
//! * **`imgur`** — URL normalization and album resolution.
//! * **`admission`** — decides whether a candidate image may be displayed.
//! * **`app`** — owns all daemon state and runs the select/publish loop.
//! * **`config`** — the TOML configuration surface.
//! * **`main`** — wires everything together: parse args, load config, set up
//!   logging, and run the loop.

mod admission;
mod app;
mod config;
mod imgur;
mod pool;
mod source;

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::time::ChronoLocal;

use admission::{AdmissionFilter, HttpFetcher, SizeLogic};
use app::App;
use config::Config;
use imgur::AlbumClient;
use source::RedditSource;

#[derive(Parser)]
#[command(
    name = "framefeed",
    version,
    about = "Polls Reddit image feeds and publishes a picture-frame payload"
)]
struct Cli {
    /// Path to the config file.
    #[arg(long, default_value = "framefeed.toml")]
    config: PathBuf,
    /// Log level override: trace, debug, info, warn, error.
    #[arg(short = 'l', long)]
    level: Option<String>,
}

/// Timestamp shape for the log file.
const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Point the global subscriber at an append-only file under `log_dir`.
fn init_logging(log_dir: &Path, level: Level) -> Result<()> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;
    let path = log_dir.join("framefeed.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_timer(ChronoLocal::new(LOG_TIME_FORMAT.to_string()))
        .with_writer(Arc::new(file))
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    // -- logging -------------------------------------------------------------
    // The CLI flag wins over the config file.  An unrecognized level falls
    // back to `info` with a warning once the subscriber is up.
    let level_text = cli
        .level
        .unwrap_or_else(|| config.logging.level.clone());
    let (level, level_ok) = match level_text.parse::<Level>() {
        Ok(level) => (level, true),
        Err(_) => (Level::INFO, false),
    };
    init_logging(&config.paths.log_dir, level)?;
    if !level_ok {
        warn!(requested = %level_text, "unrecognized log level, using info");
        info!("valid levels: trace, debug, info, warn, error");
    }
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "framefeed starting"
    );

    // -- shared http client --------------------------------------------------
    let client = reqwest::blocking::Client::builder()
        .user_agent(config.reddit.user_agent.clone())
        .timeout(Duration::from_secs(config.http.timeout_secs))
        .build()
        .context("building http client")?;

    // -- wiring --------------------------------------------------------------
    fs::create_dir_all(&config.paths.display_dir).with_context(|| {
        format!(
            "creating display directory {}",
            config.paths.display_dir.display()
        )
    })?;

    let source = RedditSource::new(client.clone());
    let albums = AlbumClient::new(client.clone(), config.imgur.client_id.clone());
    let filter = AdmissionFilter::new(
        config.images.minimum_width,
        config.images.minimum_height,
        SizeLogic::parse(&config.images.logic),
        Box::new(HttpFetcher::new(client)),
    );

    let mut app = App::new(config, Box::new(source), Box::new(albums), filter);
    app.run()
}
