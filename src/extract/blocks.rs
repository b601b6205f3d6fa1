//! Heuristic content-block scoring
//!
//! Every block-level element with enough text is scored on four signals:
//!
//! | Signal | Value |
//! |--------|-------|
//! | length | `min(chars / saturation, 1)` |
//! | density | visible chars / markup chars of the subtree |
//! | link penalty | `max(0, 1 - links / max(words, 1) * factor)` |
//! | position | 1.0 in the middle 60% of the document, edge weight elsewhere |
//!
//! The weighted sum is multiplied by a tag weight (article and main highest,
//! adjusted by class/id hints).

use crate::config::ScoringWeights;
use crate::extract::text::collapse_whitespace;
use scraper::{ElementRef, Html, Selector};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Elements considered as content blocks
pub const BLOCK_SELECTOR: &str =
    "article, main, section, div, p, blockquote, pre, li, td, h1, h2, h3, h4, h5, h6";

const CONTENT_HINTS: &[&str] = &[
    "article", "content", "post", "entry", "story", "body", "text", "main",
];

const CHROME_HINTS: &[&str] = &[
    "comment", "sidebar", "footer", "header", "share", "social", "related", "promo", "sponsor",
    "widget", "nav", "menu", "banner", "cookie",
];

/// Middle band of the document favored by the position signal
const MIDDLE_BAND: (f64, f64) = (0.2, 0.8);

/// A scored unit of markup, alive for one scoring pass
#[derive(Debug, Clone)]
pub struct ContentBlock<'a> {
    pub element: ElementRef<'a>,
    pub text: String,
    pub tag: String,
    /// Class and id attributes, lower-cased
    pub class_hint: String,
    pub length: usize,
    pub density: f64,
    pub links: usize,
    pub words: usize,
    /// Document-order index among all candidate elements
    pub position: usize,
    pub score: f64,
}

/// Collects and scores every block with at least `min_chars` visible characters
pub fn score_blocks<'a>(
    document: &'a Html,
    weights: &ScoringWeights,
    min_chars: usize,
) -> Vec<ContentBlock<'a>> {
    let (Ok(blocks), Ok(links)) = (Selector::parse(BLOCK_SELECTOR), Selector::parse("a")) else {
        return Vec::new();
    };

    let candidates: Vec<ElementRef<'a>> = document.select(&blocks).collect();
    let last = candidates.len().saturating_sub(1).max(1) as f64;

    candidates
        .into_iter()
        .enumerate()
        .filter_map(|(position, element)| {
            let text = collapse_whitespace(&element.text().collect::<String>());
            let length = text.chars().count();
            if length < min_chars {
                return None;
            }

            let markup_chars = element.html().chars().count().max(1);
            let tag = element.value().name().to_string();
            let class_hint = format!(
                "{} {}",
                element.value().attr("class").unwrap_or_default(),
                element.value().id().unwrap_or_default()
            )
            .to_lowercase();

            let mut block = ContentBlock {
                element,
                text,
                tag,
                class_hint,
                length,
                density: (length as f64 / markup_chars as f64).min(1.0),
                links: element.select(&links).count(),
                words: 0,
                position,
                score: 0.0,
            };
            block.words = block.text.split_whitespace().count();
            block.score = composite_score(&block, position as f64 / last, weights);
            Some(block)
        })
        .collect()
}

fn composite_score(block: &ContentBlock<'_>, relative_position: f64, weights: &ScoringWeights) -> f64 {
    let length_score = (block.length as f64 / weights.length_saturation).min(1.0);
    let link_penalty =
        (1.0 - (block.links as f64 / block.words.max(1) as f64) * weights.link_penalty_factor)
            .max(0.0);
    let position_weight = if (MIDDLE_BAND.0..=MIDDLE_BAND.1).contains(&relative_position) {
        1.0
    } else {
        weights.edge_position_weight
    };

    let composite = weights.length * length_score
        + weights.density * block.density
        + weights.link * link_penalty
        + weights.position * position_weight;

    composite * tag_weight(&block.tag, &block.class_hint)
}

/// Structural prior of a block from its tag and class/id hints
pub fn tag_weight(tag: &str, class_hint: &str) -> f64 {
    let base = match tag {
        "article" => 1.5,
        "main" => 1.4,
        "section" => 1.1,
        "p" | "div" | "pre" => 1.0,
        "blockquote" => 0.9,
        "td" => 0.7,
        "li" => 0.6,
        _ => 0.8,
    };

    let mut weight = base;
    if CHROME_HINTS.iter().any(|hint| class_hint.contains(hint)) {
        weight *= 0.5;
    } else if CONTENT_HINTS.iter().any(|hint| class_hint.contains(hint)) {
        weight *= 1.2;
    }
    weight
}

/// Picks the `k` best blocks and returns them in document order
///
/// A block whose ancestor is also picked is dropped so its text is not
/// repeated; the ancestor already contains it.
pub fn select_top_blocks<'a>(mut blocks: Vec<ContentBlock<'a>>, k: usize) -> Vec<ContentBlock<'a>> {
    blocks.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.position.cmp(&b.position))
    });
    blocks.truncate(k);

    let picked: HashSet<_> = blocks.iter().map(|b| b.element.id()).collect();
    let mut selected: Vec<ContentBlock<'a>> = blocks
        .into_iter()
        .filter(|block| {
            !block
                .element
                .ancestors()
                .any(|ancestor| picked.contains(&ancestor.id()))
        })
        .collect();

    selected.sort_by_key(|block| block.position);
    selected
}
