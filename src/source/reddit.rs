//! Reddit feed source implementation.
//!
//! Polls the public listing endpoint (`/r/<feed>/new.json`), which serves
//! read-only data without credentials as long as the request carries a
//! descriptive User-Agent (set on the shared client at startup).  This module
//! is a complete worked example of a [`PostSource`]; use it as a template
//! when adding another source.
//!
//! ## Pagination
//!
//! The endpoint caps one page at 100 submissions and hands back an `after`
//! cursor naming the last one.  [`fetch_newest`](PostSource::fetch_newest)
//! follows the cursor until the requested limit is reached or the listing
//! runs out.  Callers routinely ask for 1000 posts, so a single page is
//! never enough.

use anyhow::Result;
use serde::Deserialize;

use super::{Post, PostSource};

/// Where the public listing lives.
const BASE_URL: &str = "https://www.reddit.com";

/// Hard per-page cap imposed by the listing endpoint.
const PAGE_SIZE: u32 = 100;

/// A Reddit feed source.
///
/// Fetches `/new` listings for a subreddit over HTTP and converts them into
/// [`Post`] values.
pub struct RedditSource {
    /// Shared blocking client; carries the configured User-Agent and timeout.
    client: reqwest::blocking::Client,
}

impl RedditSource {
    /// Create a new Reddit source on top of an already-configured client.
    pub fn new(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }

    /// Convert one decoded listing page into [`Post`]s.
    ///
    /// This is a pure function (no I/O) so that tests can exercise the
    /// conversion against fixture JSON without hitting the network.
    fn parse_listing(listing: &Listing, feed: &str) -> Vec<Post> {
        listing
            .data
            .children
            .iter()
            .map(|child| Post {
                feed: feed.to_string(),
                title: child.data.title.clone(),
                url: child.data.url.clone(),
            })
            .collect()
    }
}

impl PostSource for RedditSource {
    fn name(&self) -> &str {
        "reddit"
    }

    fn fetch_newest(&self, feed: &str, limit: u32) -> Result<Vec<Post>> {
        let mut posts: Vec<Post> = Vec::new();
        let mut after: Option<String> = None;

        while (posts.len() as u32) < limit {
            let want = (limit - posts.len() as u32).min(PAGE_SIZE);
            // raw_json=1 stops the API from HTML-escaping titles.
            let mut url = format!("{BASE_URL}/r/{feed}/new.json?limit={want}&raw_json=1");
            if let Some(cursor) = &after {
                url.push_str("&after=");
                url.push_str(cursor);
            }

            let listing: Listing = self.client.get(&url).send()?.error_for_status()?.json()?;
            if listing.data.children.is_empty() {
                break;
            }
            posts.extend(Self::parse_listing(&listing, feed));

            after = listing.data.after;
            if after.is_none() {
                // Listing exhausted before the limit was reached.
                break;
            }
        }

        Ok(posts)
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// Top-level shape of a listing response.  Only the fields we consume are
/// declared; serde skips the rest of Reddit's (large) submission objects.
#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    /// Cursor naming the last submission on this page; absent on the final page.
    after: Option<String>,
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Submission,
}

#[derive(Debug, Deserialize)]
struct Submission {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
