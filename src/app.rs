//! The refresh/select/publish loop.
//!
//! [`App`] owns all mutable state: the candidate pool, the blacklist of
//! URLs that failed to fetch or decode, and the refresh clock.  The post
//! source, album resolution, and image fetching sit behind trait objects
//! injected at startup, so the whole loop runs against in-memory doubles
//! in tests.

use std::fs;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::admission::{AdmissionFilter, Blacklist};
use crate::config::Config;
use crate::imgur::{self, AlbumResolver};
use crate::pool::{self, RetryPolicy};
use crate::source::{Post, PostSource};

/// Pause between publishes.  The display re-reads its payload every few
/// seconds; publishing faster than this would only churn the file.
const PUBLISH_INTERVAL: Duration = Duration::from_secs(10);

/// Captions longer than this many characters get broken onto two lines.
const CAPTION_WIDTH: usize = 146;

/// Exactly what the display consumes: an image URL and its caption.
#[derive(Debug, Serialize)]
pub struct DisplayPayload {
    pub img: String,
    pub text: String,
}

pub struct App {
    config: Config,
    source: Box<dyn PostSource>,
    albums: Box<dyn AlbumResolver>,
    filter: AdmissionFilter,
    /// Candidate posts from the last refresh.
    pool: Vec<Post>,
    /// URLs that failed to fetch or decode; skipped for the rest of the run.
    blacklist: Blacklist,
    /// When the pool was last filled.  `None` forces a refresh.
    last_refresh: Option<Instant>,
}

impl App {
    pub fn new(
        config: Config,
        source: Box<dyn PostSource>,
        albums: Box<dyn AlbumResolver>,
        filter: AdmissionFilter,
    ) -> Self {
        Self {
            config,
            source,
            albums,
            filter,
            pool: Vec::new(),
            blacklist: Blacklist::new(),
            last_refresh: None,
        }
    }

    /// Run the refresh/select/publish loop until the process is killed.
    pub fn run(&mut self) -> Result<()> {
        info!(source = self.source.name(), "starting publish loop");
        loop {
            if self.needs_refresh() {
                self.refresh_pool();
            }
            if let Some(payload) = self.select_once() {
                self.publish(&payload)?;
            }
            thread::sleep(PUBLISH_INTERVAL);
        }
    }

    // -- refresh -------------------------------------------------------------

    /// True when the pool has never been filled or has outlived the
    /// configured refresh window.
    fn needs_refresh(&self) -> bool {
        match self.last_refresh {
            None => true,
            Some(at) => at.elapsed() >= self.refresh_interval(),
        }
    }

    fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.config.refresh.hours.saturating_mul(3600))
    }

    /// Re-fetch every feed and replace the pool wholesale.
    fn refresh_pool(&mut self) {
        info!(
            feeds = self.config.feeds.image_feeds.len(),
            "refreshing candidate pool"
        );
        let retry = RetryPolicy {
            max_attempts: self.config.http.fetch_attempts,
            delay: Duration::from_secs(self.config.http.retry_delay_secs),
        };
        self.pool = pool::refresh(
            self.source.as_ref(),
            &self.config.feeds.image_feeds,
            self.config.feeds.number_posts,
            retry,
        );
        self.last_refresh = Some(Instant::now());
    }

    // -- selection -----------------------------------------------------------

    /// Draw random candidates until one is admissible or the attempt limit
    /// runs out.
    ///
    /// Returns `None` when the pool is empty or every draw was rejected; in
    /// both cases the next cycle starts with a fresh pool.
    fn select_once(&mut self) -> Option<DisplayPayload> {
        if self.pool.is_empty() {
            warn!("pool is empty; refreshing on the next cycle");
            self.last_refresh = None;
            return None;
        }

        for _ in 0..self.config.selection.max_attempts {
            let post = self.pool.choose(&mut rand::thread_rng())?;
            debug!(feed = %post.feed, url = %post.url, "drew candidate");

            let Some(img) = imgur::normalize_url(&post.url, self.albums.as_ref()) else {
                continue;
            };
            if self.filter.is_good_image(&img, &mut self.blacklist) {
                return Some(DisplayPayload {
                    img,
                    text: wrap_caption(&post.title),
                });
            }
        }

        warn!(
            attempts = self.config.selection.max_attempts,
            "no admissible image found; refreshing on the next cycle"
        );
        self.last_refresh = None;
        None
    }

    // -- publishing ----------------------------------------------------------

    /// Overwrite the display payload on disk.
    ///
    /// The display re-reads this file on its own schedule; each publish
    /// replaces the whole document.
    fn publish(&self, payload: &DisplayPayload) -> Result<()> {
        let path = self.config.paths.display_dir.join("data.json");
        let json = serde_json::to_string(payload)?;
        fs::write(&path, json)
            .with_context(|| format!("writing display payload to {}", path.display()))?;
        info!(img = %payload.img, path = %path.display(), "published");
        Ok(())
    }
}

/// Break a long caption onto two lines for the display.
///
/// Captions up to [`CAPTION_WIDTH`] characters fit on one line.  Longer
/// ones get a newline in place of the character before the last space in
/// the first half, so the break lands near the middle instead of at the
/// edge.  A long caption with no space in its first half is left alone.
fn wrap_caption(title: &str) -> String {
    let chars: Vec<char> = title.chars().collect();
    if chars.len() <= CAPTION_WIDTH {
        return title.to_string();
    }
    let middle = chars.len() / 2;
    let Some(space) = chars[..middle].iter().rposition(|&c| c == ' ') else {
        return title.to_string();
    };
    // The newline goes in front of the space; line two keeps it.
    let mut wrapped: String = chars[..space].iter().collect();
    wrapped.push('\n');
    wrapped.extend(&chars[space..]);
    wrapped
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::{ImageFetcher, SizeLogic};
    use crate::config::PathsConfig;
    use anyhow::{anyhow, bail};
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::path::Path;
    use tempfile::tempdir;

    // -- caption wrapping ----------------------------------------------------

    #[test]
    fn short_caption_is_unchanged() {
        let title = "a".repeat(CAPTION_WIDTH);
        assert_eq!(wrap_caption(&title), title);
    }

    #[test]
    fn long_caption_breaks_at_last_space_in_first_half() {
        // 161 chars, single space at index 70 (inside the first half of 80).
        let title = format!("{} {}", "a".repeat(70), "b".repeat(90));
        let wrapped = wrap_caption(&title);

        assert_eq!(wrapped, format!("{}\n {}", "a".repeat(70), "b".repeat(90)));
        assert_eq!(wrapped.chars().filter(|&c| c == '\n').count(), 1);
    }

    #[test]
    fn break_uses_the_last_space_before_the_middle() {
        // "ab " repeated: spaces at 2, 5, 8, ...; the last one before the
        // middle (90) sits at index 89.
        let title = "ab ".repeat(60);
        let wrapped = wrap_caption(&title);

        assert_eq!(wrapped.chars().position(|c| c == '\n'), Some(89));
        assert_eq!(wrapped.chars().filter(|&c| c == '\n').count(), 1);
    }

    #[test]
    fn long_caption_without_spaces_is_unchanged() {
        let title = "x".repeat(200);
        assert_eq!(wrap_caption(&title), title);
    }

    #[test]
    fn space_only_in_second_half_leaves_caption_unchanged() {
        let title = format!("{} {}", "a".repeat(100), "b".repeat(60));
        assert_eq!(wrap_caption(&title), title);
    }

    #[test]
    fn wrapping_counts_characters_not_bytes() {
        let title = format!("{} {}", "é".repeat(70), "é".repeat(90));
        let wrapped = wrap_caption(&title);

        assert_eq!(wrapped.chars().count(), title.chars().count() + 1);
        assert_eq!(wrapped.chars().position(|c| c == '\n'), Some(70));
    }

    // -- test doubles --------------------------------------------------------

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = image::DynamicImage::new_rgb8(width, height);
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn post(title: &str, url: &str) -> Post {
        Post {
            feed: "earthporn".to_string(),
            title: title.to_string(),
            url: url.to_string(),
        }
    }

    /// A source that always serves the same posts, for refresh tests.
    struct SeededSource(Vec<Post>);

    impl PostSource for SeededSource {
        fn name(&self) -> &str {
            "seeded"
        }

        fn fetch_newest(&self, _feed: &str, _limit: u32) -> Result<Vec<Post>> {
            Ok(self.0.clone())
        }
    }

    /// Album resolution is never reached by these tests.
    struct NoAlbums;

    impl AlbumResolver for NoAlbums {
        fn album_images(&self, _album_id: &str) -> Result<Vec<String>> {
            bail!("albums are not part of this test")
        }
    }

    /// Serves fixture bytes by URL.
    struct MapFetcher {
        images: HashMap<String, Vec<u8>>,
    }

    impl ImageFetcher for MapFetcher {
        fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
            self.images
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow!("no fixture for {url}"))
        }
    }

    fn test_config(dir: &Path) -> Config {
        Config {
            reddit: Default::default(),
            imgur: Default::default(),
            feeds: Default::default(),
            images: Default::default(),
            paths: PathsConfig {
                template_dir: dir.to_path_buf(),
                display_dir: dir.to_path_buf(),
                log_dir: dir.to_path_buf(),
            },
            refresh: Default::default(),
            http: Default::default(),
            selection: Default::default(),
            logging: Default::default(),
        }
    }

    fn make_app(dir: &Path, pool: Vec<Post>, images: HashMap<String, Vec<u8>>) -> App {
        let filter = AdmissionFilter::new(
            100,
            100,
            SizeLogic::And,
            Box::new(MapFetcher { images }),
        );
        let mut app = App::new(
            test_config(dir),
            Box::new(SeededSource(Vec::new())),
            Box::new(NoAlbums),
            filter,
        );
        app.pool = pool;
        app.last_refresh = Some(Instant::now());
        app
    }

    // -- refresh -------------------------------------------------------------

    #[test]
    fn fresh_app_needs_a_refresh() {
        let dir = tempdir().unwrap();
        let app = make_app_without_state(dir.path());
        assert!(app.needs_refresh());
    }

    #[test]
    fn refresh_pool_fills_pool_and_stamps_the_clock() {
        let dir = tempdir().unwrap();
        let posts = vec![post("Valley", "https://example.com/a.jpg")];
        let filter = AdmissionFilter::new(
            100,
            100,
            SizeLogic::And,
            Box::new(MapFetcher {
                images: HashMap::new(),
            }),
        );
        let mut app = App::new(
            test_config(dir.path()),
            Box::new(SeededSource(posts)),
            Box::new(NoAlbums),
            filter,
        );

        app.refresh_pool();

        assert_eq!(app.pool.len(), app.config.feeds.image_feeds.len());
        assert!(app.last_refresh.is_some());
        assert!(!app.needs_refresh());
    }

    fn make_app_without_state(dir: &Path) -> App {
        let filter = AdmissionFilter::new(
            100,
            100,
            SizeLogic::And,
            Box::new(MapFetcher {
                images: HashMap::new(),
            }),
        );
        App::new(
            test_config(dir),
            Box::new(SeededSource(Vec::new())),
            Box::new(NoAlbums),
            filter,
        )
    }

    // -- selection -----------------------------------------------------------

    #[test]
    fn empty_pool_yields_none_and_forces_a_refresh() {
        let dir = tempdir().unwrap();
        let mut app = make_app(dir.path(), Vec::new(), HashMap::new());

        assert!(app.select_once().is_none());
        assert!(app.last_refresh.is_none());
        assert!(app.needs_refresh());
    }

    #[test]
    fn admissible_candidate_becomes_a_payload() {
        let dir = tempdir().unwrap();
        let url = "https://example.com/big.jpg";
        let mut images = HashMap::new();
        images.insert(url.to_string(), png_bytes(1920, 1080));
        let mut app = make_app(dir.path(), vec![post("Big valley", url)], images);

        let payload = app.select_once().expect("payload");
        assert_eq!(payload.img, url);
        assert_eq!(payload.text, "Big valley");
    }

    #[test]
    fn selection_skips_rejected_candidates() {
        let dir = tempdir().unwrap();
        let good = "https://example.com/big.jpg";
        let mut images = HashMap::new();
        images.insert(good.to_string(), png_bytes(1920, 1080));
        // The gallery URL is rejected without a fetch; only `good` can win.
        let pool = vec![
            post("Album", "https://imgur.com/gallery/zzz.jpg"),
            post("Big valley", good),
        ];
        let mut app = make_app(dir.path(), pool, images);

        let payload = app.select_once().expect("payload");
        assert_eq!(payload.img, good);
    }

    #[test]
    fn undersized_candidate_is_never_published() {
        let dir = tempdir().unwrap();
        let big = "https://example.com/big.jpg";
        let small = "https://example.com/small.jpg";
        let mut images = HashMap::new();
        images.insert(big.to_string(), png_bytes(1920, 1080));
        images.insert(small.to_string(), png_bytes(64, 48));
        let pool = vec![post("Big", big), post("Small", small)];
        let mut app = make_app(dir.path(), pool, images);

        // Every cycle re-draws until the admissible candidate comes up.
        for _ in 0..5 {
            let payload = app.select_once().expect("payload");
            assert_eq!(payload.img, big);
            app.publish(&payload).unwrap();
        }

        let raw = fs::read_to_string(dir.path().join("data.json")).unwrap();
        assert!(raw.contains("big.jpg"));
        assert!(!raw.contains("small.jpg"));
    }

    #[test]
    fn exhausted_attempts_yield_none_and_force_a_refresh() {
        let dir = tempdir().unwrap();
        let url = "https://example.com/small.jpg";
        let mut images = HashMap::new();
        images.insert(url.to_string(), png_bytes(10, 10));
        let mut app = make_app(dir.path(), vec![post("Tiny", url)], images);
        app.config.selection.max_attempts = 8;

        assert!(app.select_once().is_none());
        assert!(app.needs_refresh());
    }

    #[test]
    fn failed_fetches_land_on_the_blacklist() {
        let dir = tempdir().unwrap();
        let url = "https://example.com/gone.jpg";
        let mut app = make_app(dir.path(), vec![post("Gone", url)], HashMap::new());
        app.config.selection.max_attempts = 4;

        assert!(app.select_once().is_none());
        assert!(app.blacklist.contains(url));
    }

    // -- publishing ----------------------------------------------------------

    #[test]
    fn publish_writes_exactly_img_and_text() {
        let dir = tempdir().unwrap();
        let app = make_app(dir.path(), Vec::new(), HashMap::new());
        let payload = DisplayPayload {
            img: "https://example.com/a.jpg".to_string(),
            text: "A caption".to_string(),
        };

        app.publish(&payload).unwrap();

        let raw = fs::read_to_string(dir.path().join("data.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(object["img"], "https://example.com/a.jpg");
        assert_eq!(object["text"], "A caption");
    }

    #[test]
    fn publish_overwrites_the_previous_payload() {
        let dir = tempdir().unwrap();
        let app = make_app(dir.path(), Vec::new(), HashMap::new());

        let first = DisplayPayload {
            img: "https://example.com/first.jpg".to_string(),
            text: "First with a much longer caption than the second".to_string(),
        };
        let second = DisplayPayload {
            img: "https://example.com/second.jpg".to_string(),
            text: "Second".to_string(),
        };
        app.publish(&first).unwrap();
        app.publish(&second).unwrap();

        let raw = fs::read_to_string(dir.path().join("data.json")).unwrap();
        // A single valid document, not an append of two.
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["img"], "https://example.com/second.jpg");
        assert_eq!(value["text"], "Second");
    }
}
