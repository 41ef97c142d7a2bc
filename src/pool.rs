//! Parallel pool refresh.
//!
//! Every refresh fans out one worker thread per feed, fetches that feed's
//! newest posts with bounded retry, and merges whatever arrived into a
//! single pool.  A feed that keeps failing contributes nothing; the other
//! feeds are unaffected.
//!
//! ## For contributors
//!
//! Workers run under [`std::thread::scope`], so they can borrow the source
//! and the feed list directly.  Feed lists are short in practice and the
//! work is network-bound; if you ever need to refresh hundreds of feeds,
//! cap the fan-out with a small worker pool instead.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::source::{Post, PostSource};

/// Per-feed retry bounds for one refresh.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts per feed before giving up until the next refresh.
    pub max_attempts: u32,
    /// Pause between consecutive attempts on the same feed.
    pub delay: Duration,
}

/// Fetch the newest `limit` posts from every feed and merge the results.
///
/// Feeds are fetched concurrently; results are merged in feed order.  A
/// panicked worker is logged and contributes nothing.
pub fn refresh(
    source: &dyn PostSource,
    feeds: &[String],
    limit: u32,
    retry: RetryPolicy,
) -> Vec<Post> {
    let started = Instant::now();

    let mut posts = Vec::new();
    thread::scope(|scope| {
        let handles: Vec<_> = feeds
            .iter()
            .map(|feed| {
                let handle = scope.spawn(move || fetch_with_retry(source, feed, limit, retry));
                (feed, handle)
            })
            .collect();

        for (feed, handle) in handles {
            match handle.join() {
                Ok(mut fetched) => posts.append(&mut fetched),
                Err(_) => error!(feed = %feed, "feed worker panicked"),
            }
        }
    });

    info!(
        posts = posts.len(),
        feeds = feeds.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "pool refreshed"
    );
    posts
}

/// Fetch one feed, retrying transient failures up to the policy's bound.
fn fetch_with_retry(
    source: &dyn PostSource,
    feed: &str,
    limit: u32,
    retry: RetryPolicy,
) -> Vec<Post> {
    for attempt in 1..=retry.max_attempts {
        match source.fetch_newest(feed, limit) {
            Ok(posts) => {
                debug!(feed = %feed, posts = posts.len(), attempt, "feed fetched");
                return posts;
            }
            Err(e) => {
                error!(feed = %feed, attempt, error = %e, "feed fetch failed");
                if attempt < retry.max_attempts {
                    thread::sleep(retry.delay);
                }
            }
        }
    }
    warn!(feed = %feed, attempts = retry.max_attempts, "giving up on feed until next refresh");
    Vec::new()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
