//! Thumbnail resolution.
//!
//! Downloads a listing's thumbnail, deduplicates it by content hash, and
//! re-encodes it into a bounded-size base64 data URI. Search pages reuse one
//! placeholder image across many listings; hashing the raw bytes (and the
//! re-encoded bytes, which can converge even when sources differ) collapses
//! those to a single stored copy.
//!
//! With the `thumbnails` feature the image is resized and re-encoded as
//! JPEG, walking a descending quality ladder until the base64 payload lands
//! in the target band. Without it the raw bytes are base64-encoded as-is,
//! subject only to the hard ceiling.

use std::collections::HashSet;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::fetch::Fetcher;

/// Bounding box for re-encoded thumbnails, width by height.
#[cfg(feature = "thumbnails")]
const TARGET_WIDTH: u32 = 500;
#[cfg(feature = "thumbnails")]
const TARGET_HEIGHT: u32 = 350;

/// JPEG qualities tried in order; first encoding inside the band wins.
#[cfg(feature = "thumbnails")]
const QUALITY_LADDER: &[u8] = &[95, 90, 85, 80, 75, 70];
#[cfg(feature = "thumbnails")]
const FALLBACK_QUALITY: u8 = 80;

/// Preferred base64 payload band, in characters.
#[cfg(feature = "thumbnails")]
const BAND_MIN: usize = 40_000;
#[cfg(feature = "thumbnails")]
const BAND_MAX: usize = 106_000;

/// Hard ceiling; payloads above this are discarded, not stored.
const CEILING: usize = 160_000;

const DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// How one thumbnail resolution ended. Only `Resolved` carries a payload;
/// the rest exist so the pipeline can count them distinctly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailOutcome {
    Resolved(String),
    Duplicate,
    Oversized,
    Unavailable,
}

/// Run-scoped resolver owning the dedup hash sets.
#[derive(Default)]
pub struct ThumbnailResolver {
    raw_hashes: HashSet<String>,
    encoded_hashes: HashSet<String>,
}

impl ThumbnailResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch, dedup, and encode one thumbnail URL.
    pub async fn resolve(&mut self, fetcher: &dyn Fetcher, url: &str) -> ThumbnailOutcome {
        let bytes = match fetcher.fetch_bytes(url).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => {
                debug!(%url, "empty thumbnail body");
                return ThumbnailOutcome::Unavailable;
            }
            Err(e) => {
                warn!(%url, error = %e, "thumbnail fetch failed");
                return ThumbnailOutcome::Unavailable;
            }
        };

        let raw_hash = hex::encode(Sha256::digest(&bytes));
        if self.raw_hashes.contains(&raw_hash) {
            debug!(%url, "duplicate thumbnail source");
            return ThumbnailOutcome::Duplicate;
        }

        let Some(encoded) = encode_bounded(&bytes) else {
            return ThumbnailOutcome::Oversized;
        };

        // Distinct sources can re-encode to identical bytes.
        let encoded_hash = hex::encode(Sha256::digest(encoded.as_bytes()));
        if self.encoded_hashes.contains(&encoded_hash) {
            debug!(%url, "duplicate thumbnail after re-encode");
            return ThumbnailOutcome::Duplicate;
        }

        if encoded.len() > CEILING {
            debug!(%url, size = encoded.len(), "thumbnail over ceiling");
            return ThumbnailOutcome::Oversized;
        }

        // Hashes are recorded only for accepted thumbnails; a dropped image
        // must not turn a later identical one into a duplicate.
        self.raw_hashes.insert(raw_hash);
        self.encoded_hashes.insert(encoded_hash);

        ThumbnailOutcome::Resolved(format!("{DATA_URI_PREFIX}{encoded}"))
    }
}

/// Resize and re-encode into the target base64 band.
#[cfg(feature = "thumbnails")]
fn encode_bounded(bytes: &[u8]) -> Option<String> {
    use image::imageops::FilterType;

    let img = match image::load_from_memory(bytes) {
        Ok(img) => img,
        Err(e) => {
            debug!(error = %e, "thumbnail decode failed, storing raw bytes");
            return Some(BASE64.encode(bytes));
        }
    };
    let resized = img.resize(TARGET_WIDTH, TARGET_HEIGHT, FilterType::Lanczos3);
    walk_quality_ladder(|quality| jpeg_base64(&resized, quality))
}

/// Try the quality ladder, accepting the first encoding whose base64 length
/// lands in the band. Nothing in the band falls back to the reference
/// quality; a small image never reaches the band and a huge one is caught
/// by the ceiling either way.
#[cfg(feature = "thumbnails")]
fn walk_quality_ladder(encode: impl Fn(u8) -> Option<String>) -> Option<String> {
    let mut fallback: Option<String> = None;
    for &quality in QUALITY_LADDER {
        let Some(encoded) = encode(quality) else {
            continue;
        };
        if (BAND_MIN..=BAND_MAX).contains(&encoded.len()) {
            return Some(encoded);
        }
        if quality == FALLBACK_QUALITY {
            fallback = Some(encoded);
        }
    }
    fallback.or_else(|| encode(FALLBACK_QUALITY))
}

#[cfg(feature = "thumbnails")]
fn jpeg_base64(img: &image::DynamicImage, quality: u8) -> Option<String> {
    use image::codecs::jpeg::JpegEncoder;

    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    match img.write_with_encoder(encoder) {
        Ok(()) => Some(BASE64.encode(&buf)),
        Err(e) => {
            debug!(error = %e, quality, "jpeg encode failed");
            None
        }
    }
}

/// Raw passthrough when no image codec is compiled in.
#[cfg(not(feature = "thumbnails"))]
fn encode_bounded(bytes: &[u8]) -> Option<String> {
    Some(BASE64.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::error::ScrapeError;
    use crate::fetch::FetchedPage;

    /// Serves each URL's bytes from a fixed map.
    struct ByteServer(std::collections::HashMap<String, Vec<u8>>);

    #[async_trait]
    impl Fetcher for ByteServer {
        async fn fetch(&self, _url: &str) -> Result<FetchedPage, ScrapeError> {
            Err(ScrapeError::Parse("not a page server".into()))
        }

        async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ScrapeError> {
            self.0
                .get(url)
                .cloned()
                .ok_or_else(|| ScrapeError::Http {
                    status: 404,
                    url: url.to_string(),
                })
        }
    }

    #[cfg(feature = "thumbnails")]
    fn png_bytes(seed: u8) -> Vec<u8> {
        use image::{ImageFormat, RgbImage};

        let img = RgbImage::from_fn(64, 48, |x, y| {
            image::Rgb([seed, (x % 256) as u8, (y % 256) as u8])
        });
        let mut buf = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[cfg(not(feature = "thumbnails"))]
    fn png_bytes(seed: u8) -> Vec<u8> {
        vec![seed; 256]
    }

    fn server() -> ByteServer {
        let mut map = std::collections::HashMap::new();
        map.insert("https://img.test/a.jpg".to_string(), png_bytes(10));
        map.insert("https://img.test/b.jpg".to_string(), png_bytes(200));
        map.insert("https://img.test/a-copy.jpg".to_string(), png_bytes(10));
        ByteServer(map)
    }

    #[tokio::test]
    async fn resolves_distinct_images() {
        let fetcher = server();
        let mut resolver = ThumbnailResolver::new();

        let a = resolver.resolve(&fetcher, "https://img.test/a.jpg").await;
        let b = resolver.resolve(&fetcher, "https://img.test/b.jpg").await;

        let (ThumbnailOutcome::Resolved(a), ThumbnailOutcome::Resolved(b)) = (a, b) else {
            panic!("expected two resolved thumbnails");
        };
        assert!(a.starts_with(DATA_URI_PREFIX));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn identical_bytes_collapse_to_duplicate() {
        let fetcher = server();
        let mut resolver = ThumbnailResolver::new();

        let first = resolver.resolve(&fetcher, "https://img.test/a.jpg").await;
        assert!(matches!(first, ThumbnailOutcome::Resolved(_)));

        let copy = resolver
            .resolve(&fetcher, "https://img.test/a-copy.jpg")
            .await;
        assert_eq!(copy, ThumbnailOutcome::Duplicate);
    }

    /// Base64 of this many raw bytes lands well over the ceiling; the byte
    /// pattern defeats the image decoder so it passes through unresized
    /// under either feature configuration.
    fn oversized_bytes(seed: u8) -> Vec<u8> {
        vec![seed; 130_000]
    }

    #[tokio::test]
    async fn over_ceiling_payload_is_dropped_not_truncated() {
        let mut map = std::collections::HashMap::new();
        map.insert("https://img.test/huge.jpg".to_string(), oversized_bytes(3));
        let fetcher = ByteServer(map);

        let mut resolver = ThumbnailResolver::new();
        let outcome = resolver.resolve(&fetcher, "https://img.test/huge.jpg").await;
        assert_eq!(outcome, ThumbnailOutcome::Oversized);
    }

    #[tokio::test]
    async fn dropped_image_does_not_poison_dedup_sets() {
        let mut map = std::collections::HashMap::new();
        map.insert("https://img.test/huge.jpg".to_string(), oversized_bytes(3));
        map.insert(
            "https://img.test/huge-copy.jpg".to_string(),
            oversized_bytes(3),
        );
        map.insert("https://img.test/ok.jpg".to_string(), png_bytes(10));
        let fetcher = ByteServer(map);

        let mut resolver = ThumbnailResolver::new();
        let first = resolver.resolve(&fetcher, "https://img.test/huge.jpg").await;
        assert_eq!(first, ThumbnailOutcome::Oversized);

        // The same bytes again: still oversized, not a duplicate.
        let again = resolver
            .resolve(&fetcher, "https://img.test/huge-copy.jpg")
            .await;
        assert_eq!(again, ThumbnailOutcome::Oversized);

        // And an unrelated image still resolves.
        let ok = resolver.resolve(&fetcher, "https://img.test/ok.jpg").await;
        assert!(matches!(ok, ThumbnailOutcome::Resolved(_)));
    }

    #[cfg(feature = "thumbnails")]
    #[test]
    fn quality_ladder_accepts_first_encoding_in_band() {
        // Stub encoder: size shrinks as quality drops; quality 85 is the
        // first to land inside the band.
        let sizes = |q: u8| -> usize {
            match q {
                95 => 150_000,
                90 => 120_000,
                85 => 90_000,
                80 => 70_000,
                75 => 50_000,
                _ => 30_000,
            }
        };
        let picked = walk_quality_ladder(|q| Some("x".repeat(sizes(q)))).unwrap();
        assert_eq!(picked.len(), 90_000);
    }

    #[cfg(feature = "thumbnails")]
    #[test]
    fn quality_ladder_falls_back_to_reference_quality() {
        // Every encoding overshoots the band: the quality-80 result is kept.
        let picked = walk_quality_ladder(|q| Some("x".repeat(200_000 + q as usize))).unwrap();
        assert_eq!(picked.len(), 200_080);

        // Every encoding undershoots: same fallback applies.
        let picked = walk_quality_ladder(|q| Some("x".repeat(q as usize))).unwrap();
        assert_eq!(picked.len(), 80);
    }

    #[tokio::test]
    async fn fetch_failure_is_unavailable() {
        let fetcher = server();
        let mut resolver = ThumbnailResolver::new();
        let outcome = resolver
            .resolve(&fetcher, "https://img.test/missing.jpg")
            .await;
        assert_eq!(outcome, ThumbnailOutcome::Unavailable);
    }
}
