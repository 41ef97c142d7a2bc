//! Imgur URL normalization.
//!
//! Feed posts link to imgur in several shapes: page URLs
//! (`https://imgur.com/<id>`), album/gallery URLs (`.../a/<id>`,
//! `.../gallery/<id>`), and direct image URLs (`https://i.imgur.com/<id>.png`).
//! The display process can only render direct image URLs, so everything else
//! gets rewritten here before admission.
//!
//! [`normalize_url`] applies, in order:
//!
//! 1. strip a query string from imgur URLs,
//! 2. resolve album/gallery URLs to one member image, chosen at random,
//! 3. rewrite page URLs into the `i.` direct-image form, preserving the
//!    scheme and appending `.png`,
//! 4. pass everything else through untouched.
//!
//! Host detection is a deliberate substring match on `imgur`, not domain
//! parsing.  A hostname merely *containing* `imgur` matches too; the
//! admission filter downstream is what actually keeps bad candidates out.

use anyhow::Result;
use rand::seq::SliceRandom;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Imgur API v3 root.
const API_BASE: &str = "https://api.imgur.com/3";

/// Resolves an album id to the direct links of its member images.
///
/// Split out as a trait so the normalizer can be exercised in tests without
/// the imgur API.  The production implementation is [`AlbumClient`].
pub trait AlbumResolver {
    /// Return the direct image links of every member of the album.
    fn album_images(&self, album_id: &str) -> Result<Vec<String>>;
}

/// Imgur API client used to expand albums.
///
/// Anonymous access is enough for public albums; the API wants the
/// registered application's client id in an `Authorization: Client-ID`
/// header.
pub struct AlbumClient {
    client: reqwest::blocking::Client,
    client_id: String,
}

impl AlbumClient {
    /// Create a new album client on top of an already-configured HTTP client.
    pub fn new(client: reqwest::blocking::Client, client_id: impl Into<String>) -> Self {
        Self {
            client,
            client_id: client_id.into(),
        }
    }
}

impl AlbumResolver for AlbumClient {
    fn album_images(&self, album_id: &str) -> Result<Vec<String>> {
        let url = format!("{API_BASE}/album/{album_id}/images");
        let response: AlbumImages = self
            .client
            .get(&url)
            .header(AUTHORIZATION, format!("Client-ID {}", self.client_id))
            .send()?
            .error_for_status()?
            .json()?;
        Ok(response.data.into_iter().map(|image| image.link).collect())
    }
}

/// Wire shape of `GET /3/album/<id>/images`; everything but the links is
/// skipped.
#[derive(Debug, Deserialize)]
struct AlbumImages {
    data: Vec<AlbumImage>,
}

#[derive(Debug, Deserialize)]
struct AlbumImage {
    link: String,
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Normalize a post URL into a direct-image URL where possible.
///
/// Returns `None` when the URL is an album whose member list could not be
/// fetched (or came back empty); the caller discards the candidate and
/// samples again.  Every other URL comes back `Some`, rewritten or untouched.
pub fn normalize_url(url: &str, albums: &dyn AlbumResolver) -> Option<String> {
    debug!(url = %url, "normalizing url");

    let mut url = url;
    if url.contains('?') && url.contains("imgur") {
        url = &url[..url.find('?').unwrap_or(url.len())];
    }

    if url.contains("imgur.com/a/") || url.contains("imgur.com/gallery/") {
        return resolve_album(url, albums);
    }

    // `i.i` / `iob.i` mark URLs already on a direct-image host.
    if url.contains("imgur") && !url.contains("i.i") && !url.contains("iob.i") {
        if let Some(rest) = url.strip_prefix("https://") {
            return Some(format!("https://i.{rest}.png"));
        }
        if let Some(rest) = url.strip_prefix("http://") {
            return Some(format!("http://i.{rest}.png"));
        }
        // No scheme to anchor the rewrite on; leave it for the admission
        // filter to reject.
    }

    Some(url.to_string())
}

/// Expand an album URL and pick one member image uniformly at random.
fn resolve_album(url: &str, albums: &dyn AlbumResolver) -> Option<String> {
    info!(url = %url, "expanding imgur album");
    let album_id = url.rsplit('/').next().unwrap_or("");

    match albums.album_images(album_id) {
        Ok(links) => {
            let chosen = links.choose(&mut rand::thread_rng()).cloned();
            if chosen.is_none() {
                warn!(url = %url, "album has no images");
            }
            chosen
        }
        Err(e) => {
            warn!(url = %url, error = %e, "album resolution failed");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
