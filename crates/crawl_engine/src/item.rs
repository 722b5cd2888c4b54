use std::fmt;

use url::Url;

/// One unit of crawl work: an absolute http(s) locator in canonical form.
///
/// The canonical form is whatever `url` serializes (lowercased scheme and
/// host, default port dropped, dot segments resolved) with the fragment
/// removed, so `https://Example.com:443/a/../b#top` and
/// `https://example.com/b` are the same item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkItem(Url);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidItem {
    #[error("{0}")]
    Parse(#[from] url::ParseError),
    #[error("unsupported scheme {0}")]
    UnsupportedScheme(String),
}

impl WorkItem {
    /// Parses an absolute http(s) locator.
    pub fn parse(raw: &str) -> Result<Self, InvalidItem> {
        let url = Url::parse(raw.trim())?;
        Self::from_url(url)
    }

    pub fn from_url(mut url: Url) -> Result<Self, InvalidItem> {
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(InvalidItem::UnsupportedScheme(other.to_string())),
        }
        url.set_fragment(None);
        Ok(Self(url))
    }

    pub fn url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Resolves a reference found in the body of `base` to an absolute item.
///
/// Returns `None` for references that cannot name a fetchable resource
/// (blank, fragment-only, `data:`/`javascript:`/`mailto:` and friends).
pub fn resolve_reference(base: &WorkItem, reference: &str) -> Option<WorkItem> {
    let trimmed = reference.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let joined = base.url().join(trimmed).ok()?;
    WorkItem::from_url(joined).ok()
}
