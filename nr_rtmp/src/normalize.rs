//! ABOUTME: Stream name normalization for metric labels
//! ABOUTME: Extracts a stable identifier and prefixes the owning application

use nr_core::Result;
use regex::Regex;

/// Pattern that keeps stream names untouched
pub const MATCH_ALL: &str = ".*";

/// Turns raw stream names into stable `stream` label values.
///
/// The pattern is compiled once and shared for the life of the process. The
/// label is the first part of the raw name that matches, so a pattern such as
/// `^[a-z]+` collapses `cam_1a2b3c` and `cam_9f8e7d` into `cam`.
#[derive(Debug, Clone)]
pub struct StreamNameNormalizer {
    pattern: Regex,
}

impl StreamNameNormalizer {
    /// Compile `pattern`; an invalid pattern is a configuration error
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn from_regex(pattern: Regex) -> Self {
        Self { pattern }
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// First match of the pattern in `raw`, or `""` when nothing matches.
    pub fn normalize<'a>(&self, raw: &'a str) -> &'a str {
        self.pattern.find(raw).map(|m| m.as_str()).unwrap_or("")
    }

    /// Normalized name, prefixed with `{application}-` when the owning
    /// application is known.
    pub fn label(&self, application: Option<&str>, raw: &str) -> String {
        let name = self.normalize(raw);
        match application {
            Some(app) => format!("{}-{}", app, name),
            None => name.to_string(),
        }
    }
}

impl Default for StreamNameNormalizer {
    fn default() -> Self {
        Self::from_regex(Regex::new(MATCH_ALL).expect("match-all pattern compiles"))
    }
}
