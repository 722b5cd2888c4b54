use std::fs;
use std::path::Path;

use regex::Regex;

use crate::{CrawlError, WorkItem};

/// Locator patterns that must never be requested.
#[derive(Debug, Clone, Default)]
pub struct ExclusionPolicy {
    patterns: Vec<Regex>,
}

impl ExclusionPolicy {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_patterns<I, S>(patterns: I) -> Result<Self, CrawlError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(pattern).map_err(|err| CrawlError::InvalidExclusionPattern {
                    pattern: pattern.to_string(),
                    message: err.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Loads one regular expression per line. Blank lines are ignored.
    pub fn from_file(path: &Path) -> Result<Self, CrawlError> {
        let contents = fs::read_to_string(path).map_err(|err| CrawlError::ExclusionFile {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        Self::from_patterns(contents.lines().filter(|line| !line.trim().is_empty()))
    }

    pub fn is_excluded(&self, item: &WorkItem) -> bool {
        self.patterns
            .iter()
            .any(|pattern| pattern.is_match(item.as_str()))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
