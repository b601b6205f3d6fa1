//! Site profiles and fetch strategies
//!
//! A [`SiteProfile`] carries the per-domain knowledge the crawler starts
//! from: which strategy to try first, which to fall back to, how long to
//! wait, and which selectors locate the article body. The
//! [`SiteProfileRegistry`] resolves a domain to its profile by exact match
//! on the normalized domain, falling back to a generic default profile.

mod registry;
mod site;

pub use registry::SiteProfileRegistry;
pub use site::SiteProfile;

use serde::{Deserialize, Serialize};
use std::fmt;

/// A fetch technique the orchestrator can try for a URL
///
/// Declaration order is the tie-break order used when two strategies have
/// identical scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Plain HTTP GET with browser-like headers
    Lightweight,
    /// Disposable headless browser session
    Rendering,
    /// Headless browser with anti-automation-detection measures
    AdvancedRendering,
    /// Lightweight first, escalating to rendering for script-built pages
    Hybrid,
}

impl Strategy {
    /// Every strategy, in declaration order
    pub const ALL: [Strategy; 4] = [
        Strategy::Lightweight,
        Strategy::Rendering,
        Strategy::AdvancedRendering,
        Strategy::Hybrid,
    ];

    /// The strategy always appended last to a candidate list
    pub const BASELINE: Strategy = Strategy::Lightweight;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lightweight => "lightweight",
            Self::Rendering => "rendering",
            Self::AdvancedRendering => "advanced-rendering",
            Self::Hybrid => "hybrid",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "lightweight" => Some(Self::Lightweight),
            "rendering" => Some(Self::Rendering),
            "advanced-rendering" => Some(Self::AdvancedRendering),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }

    /// Whether this strategy needs a headless browser session
    pub fn uses_browser(&self) -> bool {
        matches!(self, Self::Rendering | Self::AdvancedRendering)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_string(&s.to_lowercase().replace('_', "-"))
            .ok_or_else(|| format!("unknown strategy '{}'", s))
    }
}

/// Scripted scrolling used by the rendering strategies to trigger lazy content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScrollBehavior {
    /// Jump to the bottom and back to the top on every pass
    Aggressive,
    /// Scroll down one viewport step per pass
    #[default]
    Smooth,
    /// A single scroll to the middle of the page
    Minimal,
}

impl ScrollBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aggressive => "aggressive",
            Self::Smooth => "smooth",
            Self::Minimal => "minimal",
        }
    }
}
