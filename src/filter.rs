use regex::{Regex, RegexBuilder};
use url::Url;

/// A blacklist pattern and the rule it is evaluated with
#[derive(Debug, Clone)]
enum PatternRule {
    /// Contains `*`; matched against the host name or the full URL
    Wildcard(Option<Regex>),
    /// Starts with `http`; substring of the full URL
    Scheme,
    /// Starts with `.`; the domain and all of its subdomains
    DomainSuffix,
    /// Starts with `/`; URL path prefix
    PathPrefix,
    /// Anything else; substring of the full URL
    Contains,
}

#[derive(Debug, Clone)]
struct CompiledPattern {
    pattern: String,
    rule: PatternRule,
}

impl CompiledPattern {
    fn new(pattern: String) -> Self {
        let rule = if pattern.contains('*') {
            let regex = compile_wildcard(&pattern);
            if regex.is_none() {
                ::log::warn!("Blacklist pattern '{}' is not a valid wildcard", pattern);
            }
            PatternRule::Wildcard(regex)
        } else if pattern.starts_with("http") {
            PatternRule::Scheme
        } else if pattern.starts_with('.') {
            PatternRule::DomainSuffix
        } else if pattern.starts_with('/') {
            PatternRule::PathPrefix
        } else {
            PatternRule::Contains
        };

        Self { pattern, rule }
    }

    /// `raw` is the URL as given, `url` its parsed form. Substring rules look
    /// at both, since parsing lowercases the host and percent-encodes spaces.
    fn matches(&self, raw: &str, url: &Url) -> bool {
        let full = url.as_str();
        let host = url.host_str().unwrap_or("");

        match &self.rule {
            PatternRule::Wildcard(Some(regex)) => {
                regex.is_match(host) || regex.is_match(raw) || regex.is_match(full)
            }
            PatternRule::Wildcard(None) => false,
            PatternRule::Scheme | PatternRule::Contains => {
                raw.contains(&self.pattern) || full.contains(&self.pattern)
            }
            PatternRule::DomainSuffix => {
                let suffix = self.pattern.to_ascii_lowercase();
                host.ends_with(&suffix) || host == &suffix[1..]
            }
            PatternRule::PathPrefix => url.path().starts_with(&self.pattern),
        }
    }
}

/// Turn a `*` pattern into an anchored, case-insensitive regex.
/// Only dots are escaped; other regex syntax in the pattern is kept.
fn compile_wildcard(pattern: &str) -> Option<Regex> {
    let body = pattern.replace('.', r"\.").replace('*', ".*");
    RegexBuilder::new(&format!("^{}$", body))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Decides whether a URL may be scraped, given a list of blacklist patterns
#[derive(Debug, Clone, Default)]
pub struct UrlMatcher {
    patterns: Vec<CompiledPattern>,
}

impl UrlMatcher {
    /// Create a matcher, ignoring blank patterns
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut matcher = Self::default();
        matcher.update_patterns(patterns);
        matcher
    }

    /// Replace the whole pattern list
    pub fn update_patterns<I, S>(&mut self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.patterns = patterns
            .into_iter()
            .filter_map(|p| {
                let trimmed = p.as_ref().trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(CompiledPattern::new(trimmed.to_string()))
                }
            })
            .collect();

        ::log::debug!("URL matcher loaded {} patterns", self.patterns.len());
    }

    /// Append a pattern unless it is blank or already present
    pub fn add_pattern(&mut self, pattern: &str) -> bool {
        let trimmed = pattern.trim();
        if trimmed.is_empty() || self.patterns.iter().any(|p| p.pattern == trimmed) {
            return false;
        }
        self.patterns.push(CompiledPattern::new(trimmed.to_string()));
        true
    }

    /// Remove a pattern, returning whether it was present
    pub fn remove_pattern(&mut self, pattern: &str) -> bool {
        let trimmed = pattern.trim();
        let before = self.patterns.len();
        self.patterns.retain(|p| p.pattern != trimmed);
        self.patterns.len() != before
    }

    pub fn patterns(&self) -> Vec<&str> {
        self.patterns.iter().map(|p| p.pattern.as_str()).collect()
    }

    /// True if any pattern matches. Strings that are not absolute URLs are never blacklisted.
    pub fn is_blacklisted(&self, url: &str) -> bool {
        self.matching_pattern(url).is_some()
    }

    /// The first configured pattern that matches the URL
    pub fn matching_pattern(&self, url: &str) -> Option<&str> {
        if self.patterns.is_empty() {
            return None;
        }

        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                ::log::trace!("Not matching unparsable URL '{}': {}", url, e);
                return None;
            }
        };

        self.patterns
            .iter()
            .find(|p| p.matches(url.trim(), &parsed))
            .map(|p| p.pattern.as_str())
    }

    /// A pattern is invalid only when it uses `*` and does not compile
    pub fn validate_pattern(pattern: &str) -> bool {
        !pattern.contains('*') || compile_wildcard(pattern).is_some()
    }
}
