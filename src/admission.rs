//! Image admission filtering.
//!
//! A candidate URL has to clear four gates before it reaches the display:
//! no `gallery` marker left in the URL, not on the blacklist, a plausible
//! image extension, and decoded pixel dimensions meeting the configured
//! minimums.  The first three are free; only the last one costs a fetch.
//!
//! Fetch and decode failures are absorbed here: they are logged,
//! the URL goes on the blacklist so it is never fetched again this run, and
//! the candidate is rejected.  Nothing in this module can take the selection
//! loop down.

use std::collections::HashSet;

use anyhow::Result;
use image::GenericImageView;
use tracing::{debug, error};

/// URLs that failed to fetch or decode; never re-admitted within a run.
///
/// Owned by the orchestrator and passed in by reference, so tests can
/// inspect it and nothing hides behind a process-wide singleton.
pub type Blacklist = HashSet<String>;

/// How the two minimum-dimension checks combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeLogic {
    /// Both width and height must meet their minimum.
    And,
    /// Either dimension meeting its minimum is enough.
    Or,
}

impl SizeLogic {
    /// Parse the configured value.  `"or"` selects [`SizeLogic::Or`]; any
    /// other value silently means [`SizeLogic::And`].
    pub fn parse(text: &str) -> Self {
        if text == "or" {
            Self::Or
        } else {
            Self::And
        }
    }
}

/// Fetches raw image bytes for admission checks.
///
/// A trait seam so the filter can run against in-memory fixtures in tests;
/// the production implementation is [`HttpFetcher`].
pub trait ImageFetcher {
    /// Fetch the resource at `url` and return its body.
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

/// Production fetcher on top of the shared blocking client.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let bytes = self.client.get(url).send()?.error_for_status()?.bytes()?;
        Ok(bytes.to_vec())
    }
}

/// The admission filter: cheap URL rejections plus the dimension check.
pub struct AdmissionFilter {
    min_width: u32,
    min_height: u32,
    logic: SizeLogic,
    fetcher: Box<dyn ImageFetcher>,
}

impl AdmissionFilter {
    /// Build a filter admitting images at least `min_width` × `min_height`,
    /// with the two comparisons combined per `logic`.
    pub fn new(
        min_width: u32,
        min_height: u32,
        logic: SizeLogic,
        fetcher: Box<dyn ImageFetcher>,
    ) -> Self {
        Self {
            min_width,
            min_height,
            logic,
            fetcher,
        }
    }

    /// Fetch the image at `url` and test its pixel dimensions.
    ///
    /// Any fetch or decode failure is absorbed: logged, `url` blacklisted,
    /// `false` returned.  Size rejections do NOT blacklist; only fetch and
    /// decode failures do.
    pub fn check_size(&self, url: &str, blacklist: &mut Blacklist) -> bool {
        let bytes = match self.fetcher.fetch_bytes(url) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(url = %url, error = %e, "image fetch failed; blacklisting url");
                blacklist.insert(url.to_string());
                return false;
            }
        };

        let image = match image::load_from_memory(&bytes) {
            Ok(image) => image,
            Err(e) => {
                error!(url = %url, error = %e, "image decode failed; blacklisting url");
                blacklist.insert(url.to_string());
                return false;
            }
        };

        let (width, height) = image.dimensions();
        debug!(url = %url, width, height, "image dimensions");

        match self.logic {
            SizeLogic::And => width >= self.min_width && height >= self.min_height,
            SizeLogic::Or => width >= self.min_width || height >= self.min_height,
        }
    }

    /// Full admission decision for a normalized URL.
    ///
    /// Rejects unresolved galleries, blacklisted URLs, and non-`.jpg`/`.png`
    /// extensions before spending a fetch on [`check_size`](Self::check_size).
    pub fn is_good_image(&self, url: &str, blacklist: &mut Blacklist) -> bool {
        debug!(url = %url, "admission check");

        // An album that slipped through normalization unresolved.
        if url.contains("gallery") {
            return false;
        }
        // Known-bad URLs are rejected without another fetch.
        if blacklist.contains(url) {
            return false;
        }
        if !has_image_extension(url) {
            return false;
        }
        self.check_size(url, blacklist)
    }
}

/// Substring check over the last five characters of the URL, not MIME
/// detection.  `photo.jpg` and `photo.png` pass; `.jpeg` does not.
fn has_image_extension(url: &str) -> bool {
    let tail_start = url
        .char_indices()
        .rev()
        .nth(4)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let tail = &url[tail_start..];
    tail.contains(".jpg") || tail.contains(".png")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
