use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::decode::{decode_body, DecodeError};
use crate::ContentCategory;

const DEFAULT_MAX_REFERENCES: usize = 5_000;

/// `rel` tokens of `<link>` elements whose target is needed to render the page.
const REQUISITE_LINK_RELS: &[&str] = &[
    "stylesheet",
    "icon",
    "preload",
    "modulepreload",
    "apple-touch-icon",
];

static CSS_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid css comment regex"));

static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^)"'\s]+))\s*\)"#).expect("valid css url regex")
});

static CSS_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)@import\s+(?:"([^"]*)"|'([^']*)')"#).expect("valid css import regex")
});

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("{0:?} content has no requisites")]
    NotExpandable(ContentCategory),
    #[error("extraction aborted: {0}")]
    Aborted(String),
}

/// Finds the references a fetched body makes to other resources.
///
/// References are returned as written in the body; resolving them against the
/// item they came from is the caller's job.
pub trait ChildExtractor: Send + Sync {
    fn extract_children(
        &self,
        body: &[u8],
        category: ContentCategory,
        content_type: Option<&str>,
    ) -> Result<Vec<String>, ExtractError>;
}

/// Extracts page requisites from HTML and CSS: images, scripts, stylesheets,
/// icons, media, frames, and `url(...)`/`@import` targets in CSS.
#[derive(Debug, Clone)]
pub struct RequisiteExtractor {
    max_references: usize,
}

impl RequisiteExtractor {
    pub fn new() -> Self {
        Self::with_max_references(DEFAULT_MAX_REFERENCES)
    }

    pub fn with_max_references(max_references: usize) -> Self {
        Self { max_references }
    }

    fn html_references(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let mut refs = References::new(self.max_references);
        let Ok(every_element) = Selector::parse("*") else {
            return Vec::new();
        };

        for element in document.select(&every_element) {
            self.visit_element(element, &mut refs);
        }

        refs.into_inner()
    }

    fn visit_element(&self, element: ElementRef, refs: &mut References) {
        let el = element.value();
        match el.name() {
            "img" | "source" => {
                refs.push(el.attr("src"));
                if let Some(srcset) = el.attr("srcset") {
                    for candidate in srcset_candidates(srcset) {
                        refs.push(Some(candidate));
                    }
                }
            }
            "script" | "embed" | "iframe" | "audio" | "track" => refs.push(el.attr("src")),
            "video" => {
                refs.push(el.attr("src"));
                refs.push(el.attr("poster"));
            }
            "object" => refs.push(el.attr("data")),
            "input" => {
                let is_image = el
                    .attr("type")
                    .is_some_and(|kind| kind.trim().eq_ignore_ascii_case("image"));
                if is_image {
                    refs.push(el.attr("src"));
                }
            }
            "link" => {
                if el.attr("rel").is_some_and(is_requisite_rel) {
                    refs.push(el.attr("href"));
                }
            }
            "style" => {
                let css = element.text().collect::<String>();
                for reference in css_references(&css) {
                    refs.push(Some(reference.as_str()));
                }
            }
            _ => {}
        }

        if let Some(style) = el.attr("style") {
            for reference in css_references(style) {
                refs.push(Some(reference.as_str()));
            }
        }
    }
}

impl Default for RequisiteExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ChildExtractor for RequisiteExtractor {
    fn extract_children(
        &self,
        body: &[u8],
        category: ContentCategory,
        content_type: Option<&str>,
    ) -> Result<Vec<String>, ExtractError> {
        if !category.is_expandable() {
            return Err(ExtractError::NotExpandable(category));
        }
        let decoded = decode_body(body, content_type)?;
        let references = match category {
            ContentCategory::Hypertext => self.html_references(&decoded.text),
            _ => {
                let mut refs = References::new(self.max_references);
                for reference in css_references(&decoded.text) {
                    refs.push(Some(reference.as_str()));
                }
                refs.into_inner()
            }
        };
        Ok(references)
    }
}

struct References {
    items: Vec<String>,
    max: usize,
}

impl References {
    fn new(max: usize) -> Self {
        Self {
            items: Vec::new(),
            max,
        }
    }

    fn push(&mut self, reference: Option<&str>) {
        let Some(reference) = reference.map(str::trim) else {
            return;
        };
        if self.items.len() >= self.max || !is_fetchable_reference(reference) {
            return;
        }
        self.items.push(reference.to_string());
    }

    fn into_inner(self) -> Vec<String> {
        self.items
    }
}

fn is_fetchable_reference(reference: &str) -> bool {
    if reference.is_empty() || reference.starts_with('#') {
        return false;
    }
    let lower = reference.to_ascii_lowercase();
    !["data:", "javascript:", "about:", "blob:", "mailto:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}

fn is_requisite_rel(rel: &str) -> bool {
    rel.split_ascii_whitespace().any(|token| {
        REQUISITE_LINK_RELS
            .iter()
            .any(|wanted| token.eq_ignore_ascii_case(wanted))
    })
}

/// URLs of the image candidates in a `srcset`.
///
/// A URL runs up to the next whitespace and may itself contain commas. Only a
/// trailing comma ends a candidate that has no descriptors; otherwise the
/// descriptors run to the next comma outside parentheses.
fn srcset_candidates(srcset: &str) -> Vec<&str> {
    let mut urls = Vec::new();
    let mut rest = srcset;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_ascii_whitespace() || c == ',');
        if rest.is_empty() {
            return urls;
        }
        let end = rest.find(|c: char| c.is_ascii_whitespace()).unwrap_or(rest.len());
        let (url, after) = rest.split_at(end);
        let trimmed = url.trim_end_matches(',');
        if !trimmed.is_empty() {
            urls.push(trimmed);
        }
        rest = if trimmed.len() < url.len() {
            after
        } else {
            skip_descriptors(after)
        };
    }
}

fn skip_descriptors(descriptors: &str) -> &str {
    let mut depth = 0usize;
    for (offset, c) in descriptors.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return &descriptors[offset + 1..],
            _ => {}
        }
    }
    ""
}

/// `url(...)` and `@import "..."` targets in a stylesheet, in source order.
fn css_references(css: &str) -> Vec<String> {
    let css = CSS_COMMENT.replace_all(css, "");
    let mut found: Vec<(usize, String)> = Vec::new();
    for regex in [&*CSS_URL, &*CSS_IMPORT] {
        for captures in regex.captures_iter(&css) {
            let Some(target) = captures.iter().skip(1).flatten().next() else {
                continue;
            };
            found.push((target.start(), target.as_str().to_string()));
        }
    }
    found.sort_by_key(|(offset, _)| *offset);
    found.into_iter().map(|(_, target)| target).collect()
}
