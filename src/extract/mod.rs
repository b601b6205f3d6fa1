//! Content extraction
//!
//! Turns raw markup into best-guess body text. Paths are tried in order and
//! the first that clears its floor wins:
//!
//! 1. **Structured**: JSON documents, title and body fields
//! 2. **Profile**: the site profile's content selectors, minus its exclude selectors
//! 3. **Heuristic**: top-K scored content blocks, reassembled in document order
//! 4. **Fallback container**: the single container with the most text
//! 5. **Fallback document**: all text outside script/style/nav/footer
//!
//! Every path runs the same line cleanup: entity decoding, whitespace
//! collapsing, short-line removal, boilerplate removal and de-duplication.

mod blocks;
mod structured;
mod text;

pub use blocks::{score_blocks, select_top_blocks, tag_weight, ContentBlock};
pub use structured::{json_lines, parse_json_document};
pub use text::{collapse_whitespace, element_lines, Line, LineFilter};

use crate::config::ExtractionConfig;
use crate::fetcher::FetchedPage;
use crate::profile::SiteProfile;
use crate::ConfigError;
use regex::{Regex, RegexBuilder};
use scraper::{Html, Selector};
use serde::Serialize;
use std::fmt;

/// Containers considered by the fallback path
const FALLBACK_CONTAINERS: &str = "article, main, [role='main'], section, div, td";

/// Subtrees removed before whole-document fallback text is read
const DOCUMENT_NOISE: &[&str] = &["script", "style", "noscript", "nav", "footer"];

/// Which extraction path produced the text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionPath {
    Structured,
    Profile,
    Heuristic,
    FallbackContainer,
    FallbackDocument,
}

impl ExtractionPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::Profile => "profile",
            Self::Heuristic => "heuristic",
            Self::FallbackContainer => "fallback-container",
            Self::FallbackDocument => "fallback-document",
        }
    }
}

impl fmt::Display for ExtractionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extracted body text and the path that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    pub path: ExtractionPath,
}

/// Markup to body text
///
/// Holds compiled boilerplate patterns and noise selectors; share one
/// instance across crawls.
pub struct ContentExtractor {
    config: ExtractionConfig,
    boilerplate: Vec<Regex>,
    noise: Vec<Selector>,
    document_noise: Vec<Selector>,
}

impl ContentExtractor {
    /// Compiles the configured patterns and selectors
    ///
    /// # Returns
    ///
    /// * `Ok(ContentExtractor)` - Ready to extract
    /// * `Err(ConfigError)` - A boilerplate pattern or noise selector does not compile
    pub fn new(config: &ExtractionConfig) -> Result<Self, ConfigError> {
        let boilerplate = compile_patterns(&config.boilerplate_patterns)?;
        let noise = config
            .noise_selectors
            .iter()
            .map(|s| Selector::parse(s).map_err(|_| ConfigError::InvalidSelector(s.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        let document_noise = DOCUMENT_NOISE
            .iter()
            .filter_map(|s| Selector::parse(s).ok())
            .collect();

        Ok(Self {
            config: config.clone(),
            boilerplate,
            noise,
            document_noise,
        })
    }

    /// Extracts body text from a fetched page, honoring its content type
    pub fn extract_page(&self, page: &FetchedPage, profile: Option<&SiteProfile>) -> Option<Extraction> {
        if page.is_json() {
            return parse_json_document(&page.body)
                .and_then(|value| self.extract_structured(&value, profile));
        }
        self.extract(&page.body, profile)
    }

    /// Extracts body text from markup (or a JSON document)
    ///
    /// # Arguments
    ///
    /// * `markup` - Raw HTML, or a JSON object/array
    /// * `profile` - Site profile whose selectors and filters apply, if any
    ///
    /// # Returns
    ///
    /// * `Some(Extraction)` - Text that cleared the floor of the path that produced it
    /// * `None` - No path produced enough text
    pub fn extract(&self, markup: &str, profile: Option<&SiteProfile>) -> Option<Extraction> {
        if let Some(value) = parse_json_document(markup) {
            if let Some(extraction) = self.extract_structured(&value, profile) {
                return Some(extraction);
            }
        }

        let text_filters = profile
            .map(|p| compile_patterns_lossy(&p.text_filters))
            .unwrap_or_default();
        let filter = LineFilter {
            min_line_chars: self.config.min_line_chars,
            boilerplate: &self.boilerplate,
            text_filters: &text_filters,
        };

        let mut document = Html::parse_document(markup);

        if let Some(profile) = profile {
            remove_subtrees(&mut document, &parse_selectors(&profile.exclude_selectors));
            if let Some(text) = self.extract_with_profile(&document, profile, &filter) {
                return Some(Extraction {
                    text,
                    path: ExtractionPath::Profile,
                });
            }
        }

        remove_subtrees(&mut document, &self.noise);

        if let Some(text) = self.extract_heuristic(&document, &filter) {
            return Some(Extraction {
                text,
                path: ExtractionPath::Heuristic,
            });
        }

        if let Some(text) = self.extract_largest_container(&document, &filter) {
            return Some(Extraction {
                text,
                path: ExtractionPath::FallbackContainer,
            });
        }

        let mut document = Html::parse_document(markup);
        remove_subtrees(&mut document, &self.document_noise);
        let text = filter.apply(element_lines(document.root_element()));
        if text.chars().count() > self.config.min_fallback_chars {
            return Some(Extraction {
                text,
                path: ExtractionPath::FallbackDocument,
            });
        }

        tracing::debug!("No extraction path produced enough text");
        None
    }

    fn extract_structured(&self, value: &serde_json::Value, profile: Option<&SiteProfile>) -> Option<Extraction> {
        let text_filters = profile
            .map(|p| compile_patterns_lossy(&p.text_filters))
            .unwrap_or_default();
        let filter = LineFilter {
            min_line_chars: self.config.min_line_chars,
            boilerplate: &self.boilerplate,
            text_filters: &text_filters,
        };

        let text = filter.apply(json_lines(value, self.config.min_line_chars));
        (text.chars().count() > self.config.min_fallback_chars).then_some(Extraction {
            text,
            path: ExtractionPath::Structured,
        })
    }

    /// Each content selector in turn; all matches of a selector are concatenated
    fn extract_with_profile(
        &self,
        document: &Html,
        profile: &SiteProfile,
        filter: &LineFilter<'_>,
    ) -> Option<String> {
        for raw in &profile.content_selectors {
            let Ok(selector) = Selector::parse(raw) else {
                tracing::warn!("Skipping invalid content selector '{}'", raw);
                continue;
            };

            let lines: Vec<Line> = document.select(&selector).flat_map(element_lines).collect();
            if lines.is_empty() {
                continue;
            }

            let text = filter.apply(lines);
            let chars = text.chars().count();
            tracing::trace!("Content selector '{}' yielded {} chars", raw, chars);
            if chars > self.config.min_primary_chars {
                return Some(text);
            }
        }
        None
    }

    fn extract_heuristic(&self, document: &Html, filter: &LineFilter<'_>) -> Option<String> {
        let blocks = score_blocks(document, &self.config.weights, self.config.min_block_chars);
        if blocks.is_empty() {
            return None;
        }

        let selected = select_top_blocks(blocks, self.config.top_k);
        tracing::trace!("Heuristic path selected {} blocks", selected.len());

        let text = filter.apply(selected.into_iter().flat_map(|block| element_lines(block.element)));
        (text.chars().count() > self.config.min_primary_chars).then_some(text)
    }

    fn extract_largest_container(&self, document: &Html, filter: &LineFilter<'_>) -> Option<String> {
        let selector = Selector::parse(FALLBACK_CONTAINERS).ok()?;
        let largest = document
            .select(&selector)
            .map(|element| (element.text().map(|t| t.trim().chars().count()).sum::<usize>(), element))
            .max_by_key(|(visible, _)| *visible)?
            .1;

        let text = filter.apply(element_lines(largest));
        (text.chars().count() > self.config.min_primary_chars).then_some(text)
    }
}

fn parse_selectors(raw: &[String]) -> Vec<Selector> {
    raw.iter()
        .filter_map(|s| match Selector::parse(s) {
            Ok(selector) => Some(selector),
            Err(_) => {
                tracing::warn!("Skipping invalid selector '{}'", s);
                None
            }
        })
        .collect()
}

/// Detaches every subtree matching any of `selectors`
fn remove_subtrees(document: &mut Html, selectors: &[Selector]) {
    let ids: Vec<_> = selectors
        .iter()
        .flat_map(|selector| document.select(selector).map(|element| element.id()))
        .collect();

    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| ConfigError::InvalidPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })
        })
        .collect()
}

fn compile_patterns_lossy(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| tracing::warn!("Skipping invalid text filter '{}': {}", pattern, e))
                .ok()
        })
        .collect()
}
