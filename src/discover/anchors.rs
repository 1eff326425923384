//! Heuristic DOM discovery (cascade tier 3).
//!
//! Last resort when no structured hydration state can be obtained: scan
//! anchor elements whose target path contains the listing segment, validate
//! the token format, and pair each anchor with the nearest unclaimed image.
//! "Nearest" combines DOM tree distance (through the lowest common ancestor)
//! with raw-markup byte-offset proximity. Best-effort by design; markup
//! changes can mis-pair images.

use std::collections::HashSet;

use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::token::{is_likely_valid_identifier, token_from_url, LISTING_PATH};
use crate::models::ListingReference;

/// Tree distance dominates; byte offset breaks ties between siblings.
const TREE_DISTANCE_WEIGHT: i64 = 10_000;

/// Extract listing references by anchor scanning.
pub fn extract(html: &str, page: u32) -> Vec<ListingReference> {
    let document = Html::parse_document(html);
    let anchor_sel = Selector::parse("a[href]").expect("static selector");
    let img_sel = Selector::parse("img[src]").expect("static selector");

    // Candidate images, each assignable at most once.
    let images: Vec<ImageCandidate> = document
        .select(&img_sel)
        .filter_map(|img| {
            let src = img.value().attr("src")?;
            Some(ImageCandidate {
                src: src.to_string(),
                offset: html.find(src)? as i64,
                lineage: lineage(img),
            })
        })
        .collect();

    let mut seen_tokens: HashSet<String> = HashSet::new();
    let mut claimed: HashSet<usize> = HashSet::new();
    let mut refs = Vec::new();

    for anchor in document.select(&anchor_sel) {
        let href = anchor.value().attr("href").unwrap_or_default();
        if !href.contains(LISTING_PATH) {
            continue;
        }
        let Some(token) = token_from_url(href) else {
            continue;
        };
        if !is_likely_valid_identifier(token) || !seen_tokens.insert(token.to_string()) {
            continue;
        }

        let anchor_offset = html.find(href).map(|o| o as i64).unwrap_or(0);
        let anchor_lineage = lineage(anchor);
        let thumbnail = nearest_image(&images, &claimed, &anchor_lineage, anchor_offset)
            .map(|idx| {
                claimed.insert(idx);
                images[idx].src.clone()
            });

        refs.push(ListingReference::new(token, thumbnail, page));
    }

    debug!(page, count = refs.len(), "anchor-scan discovery");
    refs
}

struct ImageCandidate {
    src: String,
    offset: i64,
    lineage: Vec<NodeId>,
}

/// Ancestor chain from the element up to the root, element first.
fn lineage(element: ElementRef<'_>) -> Vec<NodeId> {
    let mut chain = vec![element.id()];
    chain.extend(element.ancestors().map(|n| n.id()));
    chain
}

/// Steps from each node up to their lowest common ancestor, summed.
fn tree_distance(a: &[NodeId], b: &[NodeId]) -> i64 {
    for (up_a, id) in a.iter().enumerate() {
        if let Some(up_b) = b.iter().position(|other| other == id) {
            return (up_a + up_b) as i64;
        }
    }
    // Disconnected nodes (shouldn't happen in one document).
    (a.len() + b.len()) as i64
}

fn nearest_image(
    images: &[ImageCandidate],
    claimed: &HashSet<usize>,
    anchor_lineage: &[NodeId],
    anchor_offset: i64,
) -> Option<usize> {
    images
        .iter()
        .enumerate()
        .filter(|(idx, _)| !claimed.contains(idx))
        .min_by_key(|(_, img)| {
            let tree = tree_distance(anchor_lineage, &img.lineage);
            let offset = (img.offset - anchor_offset).abs();
            tree * TREE_DISTANCE_WEIGHT + offset
        })
        .map(|(idx, _)| idx)
}
