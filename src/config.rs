//! Daemon configuration.
//!
//! Loaded once at startup from a TOML file.  Every key except the `[paths]`
//! section is optional; defaults are shown below.  Unknown keys are rejected
//! to catch typos early.
//!
//! ```toml
//! [reddit]
//! user_agent = "linux:framefeed:0.1 (picture-frame daemon)"
//!
//! [imgur]
//! client_id = ""        # register at https://api.imgur.com/oauth2/addclient
//! client_secret = ""
//!
//! [feeds]
//! number_posts = 1000           # newest posts fetched per feed
//! image_feeds = ["earthporn"]
//! text_feeds = []
//!
//! [images]
//! minimum_width = 1920
//! minimum_height = 1080
//! logic = "and"                 # "or" admits either dimension
//!
//! [paths]                       # required; leading ~ expands to $HOME
//! template_dir = "~/frame/templates"
//! display_dir = "~/frame/display"
//! log_dir = "~/frame/logs"
//!
//! [refresh]
//! hours = 4
//!
//! [http]
//! timeout_secs = 30
//! fetch_attempts = 5
//! retry_delay_secs = 2
//!
//! [selection]
//! max_attempts = 200
//!
//! [logging]
//! level = "info"                # trace, debug, info, warn, error
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Everything the daemon reads at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub reddit: RedditConfig,
    #[serde(default)]
    pub imgur: ImgurConfig,
    #[serde(default)]
    pub feeds: FeedsConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    /// Required: where the payload and log files live.
    pub paths: PathsConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Read and parse the config file, expanding `~` in every path.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let mut config: Config = toml::from_str(&raw)
            .with_context(|| format!("parsing config from {}", path.display()))?;
        config.paths.template_dir = expand_tilde(&config.paths.template_dir);
        config.paths.display_dir = expand_tilde(&config.paths.display_dir);
        config.paths.log_dir = expand_tilde(&config.paths.log_dir);
        Ok(config)
    }
}

/// Identification sent with every Reddit request.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RedditConfig {
    /// User agent in Reddit's recommended `platform:app:version` shape.
    pub user_agent: String,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            user_agent: "linux:framefeed:0.1 (picture-frame daemon)".to_string(),
        }
    }
}

/// Imgur API credentials.  Without them album posts never resolve and are
/// skipped; everything else still works.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImgurConfig {
    pub client_id: String,
    pub client_secret: String,
}

/// Which feeds to poll and how deep.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedsConfig {
    /// Newest posts fetched per feed on every refresh.
    pub number_posts: u32,
    /// Feeds whose posts carry candidate images.
    pub image_feeds: Vec<String>,
    /// Text-only feeds.  Parsed but not consumed by the selection loop,
    /// which captions images with their own titles.
    pub text_feeds: Vec<String>,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            number_posts: 1000,
            image_feeds: vec!["earthporn".to_string()],
            text_feeds: Vec::new(),
        }
    }
}

/// Minimum pixel dimensions for an admissible image.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    pub minimum_width: u32,
    pub minimum_height: u32,
    /// `"or"` admits an image on either dimension; any other value means
    /// both are required.
    pub logic: String,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            minimum_width: 1920,
            minimum_height: 1080,
            logic: "and".to_string(),
        }
    }
}

/// Filesystem locations.  The payload is written to
/// `<display_dir>/data.json`; the log to `<log_dir>/framefeed.log`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Display template assets.  Kept alongside the other paths for the
    /// frame's web server; the daemon itself only writes the payload.
    pub template_dir: PathBuf,
    pub display_dir: PathBuf,
    pub log_dir: PathBuf,
}

/// How often the candidate pool is rebuilt.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RefreshConfig {
    pub hours: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self { hours: 4 }
    }
}

/// Timeouts and retry bounds for all outbound requests.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    /// Attempts per feed before a refresh gives up on it.
    pub fetch_attempts: u32,
    pub retry_delay_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            fetch_attempts: 5,
            retry_delay_secs: 2,
        }
    }
}

/// Bounds on the per-cycle candidate draw.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelectionConfig {
    /// Draws per cycle before the loop gives up and forces a refresh.
    pub max_attempts: u32,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self { max_attempts: 200 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// One of `trace`, `debug`, `info`, `warn`, `error`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Replace a leading `~` component with the home directory.  Paths without
/// one, and `~user` forms, come back unchanged.
fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
