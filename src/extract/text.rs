//! Markup to text lines, and the post-processing every extraction path shares

use regex::Regex;
use scraper::ElementRef;
use std::collections::HashSet;

/// Elements whose text never reaches the output
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "svg", "iframe"];

/// Elements that start and end a line of text
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption", "figure",
    "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav",
    "ol", "p", "pre", "section", "table", "tbody", "td", "th", "thead", "tr", "ul",
];

/// One line of extracted text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    /// Came from a heading or a title field; exempt from the short-line rule
    pub heading: bool,
}

impl Line {
    pub fn body(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            heading: false,
        }
    }

    pub fn heading(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            heading: true,
        }
    }
}

pub fn is_heading_tag(name: &str) -> bool {
    matches!(name, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// Splits an element's visible text into lines at block boundaries
pub fn element_lines(element: ElementRef<'_>) -> Vec<Line> {
    let mut collector = LineCollector::default();
    if is_heading_tag(element.value().name()) {
        collector.heading_depth = 1;
    }
    collector.walk(element);
    collector.flush();
    collector.lines
}

#[derive(Default)]
struct LineCollector {
    lines: Vec<Line>,
    current: String,
    heading_depth: usize,
}

impl LineCollector {
    fn walk(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            if let Some(text) = child.value().as_text() {
                self.current.push_str(text);
                continue;
            }

            let Some(child) = ElementRef::wrap(child) else {
                continue;
            };
            let name = child.value().name();
            if SKIPPED_TAGS.contains(&name) {
                continue;
            }
            if name == "br" {
                self.flush();
                continue;
            }

            let block = BLOCK_TAGS.contains(&name);
            let heading = is_heading_tag(name);

            if block {
                self.flush();
            } else {
                self.current.push(' ');
            }
            if heading {
                self.heading_depth += 1;
            }

            self.walk(child);

            if block {
                self.flush();
            } else {
                self.current.push(' ');
            }
            if heading {
                self.heading_depth -= 1;
            }
        }
    }

    fn flush(&mut self) {
        let text = collapse_whitespace(&self.current);
        self.current.clear();
        if !text.is_empty() {
            self.lines.push(Line {
                text,
                heading: self.heading_depth > 0,
            });
        }
    }
}

/// Collapses runs of whitespace (including non-breaking spaces) into one space
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Line-level cleanup shared by every extraction path
pub struct LineFilter<'a> {
    pub min_line_chars: usize,
    pub boilerplate: &'a [Regex],
    pub text_filters: &'a [Regex],
}

impl LineFilter<'_> {
    /// Decodes entities, collapses whitespace, and drops short lines,
    /// boilerplate lines and repeated lines. Returns the surviving lines
    /// joined with newlines.
    pub fn apply(&self, lines: impl IntoIterator<Item = Line>) -> String {
        let mut seen = HashSet::new();
        let mut kept = Vec::new();

        for line in lines {
            let decoded = html_escape::decode_html_entities(&line.text);
            let text = collapse_whitespace(&decoded);
            if text.is_empty() {
                continue;
            }
            if !line.heading && text.chars().count() < self.min_line_chars {
                continue;
            }
            if self
                .boilerplate
                .iter()
                .chain(self.text_filters.iter())
                .any(|pattern| pattern.is_match(&text))
            {
                tracing::trace!("Dropped boilerplate line: {}", text);
                continue;
            }
            if !seen.insert(text.clone()) {
                continue;
            }
            kept.push(text);
        }

        kept.join("\n")
    }
}
