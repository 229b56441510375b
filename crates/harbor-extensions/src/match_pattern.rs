//! URL match patterns (`scheme://host/path`, `<all_urls>`).
//!
//! A pattern compiles once into an anchored regex. Malformed patterns
//! compile to a matcher that never matches, so a bad manifest entry can't
//! take the host down.

use regex::Regex;
use tracing::warn;

const ALL_URLS: &str = "<all_urls>";
const ALL_URLS_SCHEMES: &str = "(?:https?|file|ftp|wss?)";

#[derive(Debug, Clone)]
pub struct MatchPattern {
    raw: String,
    regex: Option<Regex>,
}

impl MatchPattern {
    pub fn compile(pattern: &str) -> Self {
        let regex = to_regex(pattern).and_then(|source| match Regex::new(&source) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(pattern, error = %e, "match pattern failed to compile");
                None
            }
        });
        if regex.is_none() {
            warn!(pattern, "malformed match pattern, it will match nothing");
        }
        Self {
            raw: pattern.to_string(),
            regex,
        }
    }

    pub fn test(&self, url: &str) -> bool {
        self.regex.as_ref().is_some_and(|re| re.is_match(url))
    }

    pub fn is_valid(&self) -> bool {
        self.regex.is_some()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn to_regex(pattern: &str) -> Option<String> {
    if pattern == ALL_URLS {
        return Some(format!("^{ALL_URLS_SCHEMES}://.*$"));
    }

    let (scheme, rest) = pattern.split_once("://")?;
    let scheme = match scheme {
        "*" => "https?".to_string(),
        "" => return None,
        literal => regex::escape(literal),
    };

    let (host, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };

    let host = if host == "*" {
        "[^/]*".to_string()
    } else if let Some(suffix) = host.strip_prefix("*.") {
        format!("(?i:(?:[^/.:@]+\\.)*{})(?::\\d+)?", regex::escape(suffix))
    } else if host.contains('*') {
        return None;
    } else {
        format!("(?i:{})(?::\\d+)?", regex::escape(host))
    };

    // No path: the host must end at a slash or at the end of the URL.
    let path = if path.is_empty() {
        "(?:/.*)?".to_string()
    } else {
        path.split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*")
    };

    Some(format!("^{scheme}://{host}{path}$"))
}

/// Any-of set of patterns, e.g. a content script's `matches` list.
#[derive(Debug, Clone, Default)]
pub struct MatchPatternSet {
    patterns: Vec<MatchPattern>,
}

impl MatchPatternSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        Self {
            patterns: patterns
                .iter()
                .map(|p| MatchPattern::compile(p.as_ref()))
                .collect(),
        }
    }

    pub fn test(&self, url: &str) -> bool {
        self.patterns.iter().any(|p| p.test(url))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }
}

/// Decides whether a content script may be injected into a page.
#[derive(Debug, Clone)]
pub struct ContentScriptGate {
    matches: MatchPatternSet,
    exclude: MatchPatternSet,
    match_about_blank: bool,
}

impl ContentScriptGate {
    pub fn new<S: AsRef<str>>(matches: &[S], exclude: &[S], match_about_blank: bool) -> Self {
        Self {
            matches: MatchPatternSet::new(matches),
            exclude: MatchPatternSet::new(exclude),
            match_about_blank,
        }
    }

    /// `about:` pages are eligible only with `match_about_blank` and a
    /// referrer that itself matches.
    pub fn allows(&self, url: &str, referrer: Option<&str>) -> bool {
        if url.starts_with("about:") {
            return self.match_about_blank && referrer.is_some_and(|r| self.allows_url(r));
        }
        self.allows_url(url)
    }

    fn allows_url(&self, url: &str) -> bool {
        self.matches.test(url) && !self.exclude.test(url)
    }
}
