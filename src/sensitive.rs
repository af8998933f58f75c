use regex::{NoExpand, Regex, RegexBuilder};
use std::collections::HashSet;

use crate::config::SensitiveFilterConfig;

const DEFAULT_REPLACEMENT: &str = "[FILTERED]";

/// Finds and replaces sensitive substrings (emails, phone numbers, card numbers, ...)
#[derive(Debug, Clone)]
pub struct SensitiveFilter {
    enabled: bool,
    patterns: Vec<Regex>,
    replacement: String,
}

impl Default for SensitiveFilter {
    fn default() -> Self {
        Self::new(Self::default_patterns())
    }
}

impl SensitiveFilter {
    /// Create an enabled filter with the default replacement
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self {
            enabled: true,
            patterns: Vec::new(),
            replacement: DEFAULT_REPLACEMENT.to_string(),
        };
        filter.update_patterns(patterns);
        filter
    }

    pub fn from_config(config: &SensitiveFilterConfig) -> Self {
        let mut filter = Self::new(&config.patterns);
        filter.enabled = config.enabled;
        filter.set_replacement(&config.replacement);
        filter
    }

    /// Replace the active patterns. Patterns that fail to compile are logged and skipped.
    pub fn update_patterns<I, S>(&mut self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.patterns = patterns
            .into_iter()
            .filter_map(|pattern| {
                let pattern = pattern.as_ref();
                match RegexBuilder::new(pattern).case_insensitive(true).build() {
                    Ok(regex) => Some(regex),
                    Err(e) => {
                        ::log::warn!("Dropping invalid sensitive pattern '{}': {}", pattern, e);
                        None
                    }
                }
            })
            .collect();
    }

    pub fn set_replacement(&mut self, replacement: &str) {
        self.replacement = replacement.to_string();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of patterns that compiled
    pub fn active_pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Replace every match of every pattern, applying the patterns in order
    pub fn filter(&self, content: &str) -> String {
        if !self.enabled || self.patterns.is_empty() {
            return content.to_string();
        }

        let mut filtered = content.to_string();
        for regex in &self.patterns {
            filtered = regex
                .replace_all(&filtered, NoExpand(&self.replacement))
                .into_owned();
        }
        filtered
    }

    pub fn has_sensitive_info(&self, content: &str) -> bool {
        self.patterns.iter().any(|regex| regex.is_match(content))
    }

    /// Distinct matched substrings, in order of first appearance per pattern
    pub fn sensitive_matches(&self, content: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.patterns
            .iter()
            .flat_map(|regex| regex.find_iter(content))
            .map(|m| m.as_str().to_string())
            .filter(|m| seen.insert(m.clone()))
            .collect()
    }

    /// Built-in patterns for common personal data
    pub fn default_patterns() -> Vec<String> {
        [
            // Labeled secrets: "password: hunter2", "api_key=abc123"
            r"\b(?:password|passwd|pwd|api[_-]?key|secret|token)\s*[:=]\s*\S+",
            // Email addresses
            r"\b[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}\b",
            // Card and account numbers, 16 to 19 digits with optional separators
            r"\b(?:\d[ -]?){15,18}\d\b",
            // Mainland China mobile numbers
            r"\b1[3-9]\d{9}\b",
            // North American phone numbers
            r"\(?\b\d{3}\)?[-. ]\d{3}[-. ]\d{4}\b",
            // IPv4 addresses
            r"\b(?:(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\b",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
}
