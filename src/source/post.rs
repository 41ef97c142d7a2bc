//! The candidate type shared across all feed sources.
//!
//! `Post` represents a single submission from any content feed. Every source
//! implementation converts its native wire format into `Post`s so the rest of
//! the pipeline (refresher, normalizer, admission filter, selection loop)
//! stays source-agnostic.

/// A single feed submission, normalized from any source.
///
/// Only the fields the selection pipeline consumes are carried: the linked
/// media URL and the title that becomes the display caption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    /// Name of the feed this came from (e.g. `EarthPorn`).
    pub feed: String,

    /// Submission title; becomes the caption when the post is published.
    pub title: String,

    /// URL the submission links to, usually an image-hosting page.
    pub url: String,
}
