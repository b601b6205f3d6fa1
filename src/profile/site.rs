use crate::profile::{ScrollBehavior, Strategy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-domain crawl configuration
///
/// Loaded once from the `[[site]]` and `[default-profile]` config sections
/// and read-only afterwards. Missing keys take the generic defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    /// Normalized domain this profile applies to (empty for the default profile)
    pub domain: String,

    /// Statically recommended strategy
    #[serde(rename = "strategy")]
    pub recommended: Strategy,

    /// Fallback strategies, in the order they should be tried
    pub fallbacks: Vec<Strategy>,

    /// Hard timeout for a single fetch attempt (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Number of rounds over the candidate strategies
    #[serde(rename = "retry-count")]
    pub retry_count: u32,

    /// The site builds its content with JavaScript
    #[serde(rename = "requires-js")]
    pub requires_js: bool,

    /// The site actively blocks automated clients
    #[serde(rename = "anti-bot")]
    pub anti_bot: bool,

    /// Selectors that locate the article body, tried in order
    #[serde(rename = "content-selectors")]
    pub content_selectors: Vec<String>,

    /// Subtrees removed from the body before reading its text
    #[serde(rename = "exclude-selectors")]
    pub exclude_selectors: Vec<String>,

    /// Line patterns removed from the extracted text
    #[serde(rename = "text-filters")]
    pub text_filters: Vec<String>,

    /// Selectors that signal the rendered content is ready, probed in order
    #[serde(rename = "wait-selectors")]
    pub wait_selectors: Vec<String>,

    #[serde(rename = "scroll-behavior")]
    pub scroll_behavior: ScrollBehavior,

    /// Settle delay after the content-ready probe (seconds)
    #[serde(rename = "wait-time-secs")]
    pub wait_time_secs: f64,

    #[serde(rename = "max-scrolls")]
    pub max_scrolls: u32,
}

impl SiteProfile {
    /// The generic profile used for domains without a configured entry
    pub fn generic() -> Self {
        Self {
            domain: String::new(),
            recommended: Strategy::Lightweight,
            fallbacks: vec![Strategy::Hybrid, Strategy::Rendering],
            timeout_secs: 15,
            retry_count: 2,
            requires_js: false,
            anti_bot: false,
            content_selectors: [
                "article",
                "main",
                "[role='main']",
                ".post-content",
                ".entry-content",
                ".article-content",
                ".main-content",
                "#content",
                ".content",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            exclude_selectors: [".ad", ".advertisement", ".sidebar", ".comments"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            text_filters: Vec::new(),
            wait_selectors: Vec::new(),
            scroll_behavior: ScrollBehavior::Smooth,
            wait_time_secs: 2.0,
            max_scrolls: 2,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Settle delay applied by the rendering strategies
    pub fn wait_time(&self) -> Duration {
        Duration::from_secs_f64(self.wait_time_secs.max(0.0))
    }

    /// Number of candidate rounds; a profile always gets at least one
    pub fn rounds(&self) -> u32 {
        self.retry_count.max(1)
    }

    /// Returns a copy of this profile bound to `domain`
    pub fn for_domain(&self, domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            ..self.clone()
        }
    }
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self::generic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_profile_defaults() {
        let profile = SiteProfile::generic();
        assert_eq!(profile.recommended, Strategy::Lightweight);
        assert_eq!(profile.timeout(), Duration::from_secs(15));
        assert_eq!(profile.retry_count, 2);
        assert!(profile.content_selectors.contains(&"article".to_string()));
    }

    #[test]
    fn test_partial_toml_profile_keeps_defaults() {
        let profile: SiteProfile = toml::from_str(
            r#"
domain = "medium.com"
strategy = "advanced-rendering"
fallbacks = ["rendering"]
timeout-secs = 25
scroll-behavior = "aggressive"
"#,
        )
        .unwrap();

        assert_eq!(profile.domain, "medium.com");
        assert_eq!(profile.recommended, Strategy::AdvancedRendering);
        assert_eq!(profile.fallbacks, vec![Strategy::Rendering]);
        assert_eq!(profile.timeout_secs, 25);
        assert_eq!(profile.scroll_behavior, ScrollBehavior::Aggressive);
        assert_eq!(profile.retry_count, 2);
        assert_eq!(profile.max_scrolls, 2);
    }

    #[test]
    fn test_rounds_never_zero() {
        let profile = SiteProfile {
            retry_count: 0,
            ..SiteProfile::generic()
        };
        assert_eq!(profile.rounds(), 1);
    }
}
