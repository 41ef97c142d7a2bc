//! Feed source abstraction layer.
//!
//! This module defines the [`PostSource`] trait and the common [`Post`]
//! type.  Concrete source implementations live in sub-modules (currently only
//! [`reddit`]).
//!
//! ## For contributors
//!
//! To add a new source:
//!
//! 1. Create a new file in this directory (e.g. `lemmy.rs`).
//! 2. Define a struct (e.g. `LemmySource`) and implement [`PostSource`] for it.
//! 3. Add `mod lemmy;` below and re-export your struct in the `pub use` block.
//! 4. Construct an instance in `main.rs` in place of [`RedditSource`].
//!
//! That's it.  The pool refresher, admission filter, and selection loop are
//! all source-agnostic.

mod post;
mod reddit;

// Re-export the public API of this module so callers can write
// `use crate::source::{Post, PostSource, RedditSource};`
pub use post::Post;
pub use reddit::RedditSource;

use anyhow::Result;

/// Trait that every feed source must implement.
///
/// The pool refresher calls [`fetch_newest`](PostSource::fetch_newest) from
/// one worker thread per feed, so implementations must be `Send + Sync`.
///
/// ## Implementing a new source
///
/// ```ignore
/// pub struct MySource { /* client + config fields */ }
///
/// impl PostSource for MySource {
///     fn name(&self) -> &str { "my-source" }
///
///     fn fetch_newest(&self, feed: &str, limit: u32) -> Result<Vec<Post>> {
///         // Perform HTTP / IO, then convert into Post values.
///         todo!()
///     }
/// }
/// ```
pub trait PostSource: Send + Sync {
    /// Human-readable label used in log lines.
    fn name(&self) -> &str;

    /// Fetch up to `limit` newest posts from the named feed.
    ///
    /// Implementations should perform their own HTTP/IO work and return
    /// parsed [`Post`] values.  Errors are handled by the refresher's
    /// bounded retry loop and never travel further than that.
    fn fetch_newest(&self, feed: &str, limit: u32) -> Result<Vec<Post>>;
}
