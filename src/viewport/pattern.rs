//! Path-pattern compiler.
//!
//! Patterns are `/`-separated segments: literals, `:name` params, optional `:name?` params and a
//! trailing `*` wildcard. Non-terminal patterns match a prefix and capture the rest of the path.

use regex::Regex;
use std::collections::BTreeMap;
use thiserror::Error;

/// Name of the capture holding the unmatched tail of a non-terminal match.
const REST: &str = "rest";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("empty parameter name in pattern '{pattern}'")]
    EmptyParam { pattern: String },

    #[error("wildcard must be the last segment of '{pattern}'")]
    MisplacedWildcard { pattern: String },

    #[error("pattern '{pattern}' does not compile: {reason}")]
    Regex { pattern: String, reason: String },
}

/// Result of matching a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    /// The consumed prefix.
    pub matched: String,
    pub params: BTreeMap<String, String>,
    /// Unconsumed tail (always starts with `/`). Only non-terminal matchers produce one.
    pub rest: Option<String>,
}

/// A compiled pattern with its capture key names in declaration order.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    regex: Regex,
    keys: Vec<String>,
    end: bool,
}

impl PathMatcher {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn is_end(&self) -> bool {
        self.end
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn matches(&self, path: &str) -> Option<PathMatch> {
        let captures = self.regex.captures(path)?;
        let params = self
            .keys
            .iter()
            .enumerate()
            .filter_map(|(index, key)| {
                captures
                    .get(index + 1)
                    .map(|value| (key.clone(), value.as_str().to_string()))
            })
            .collect();
        let rest = captures
            .name(REST)
            .map(|rest| rest.as_str())
            .filter(|rest| !rest.is_empty());
        let matched_len = rest.map_or(path.len(), |rest| path.len() - rest.len());
        Some(PathMatch {
            matched: path[..matched_len].to_string(),
            params,
            rest: rest.map(String::from),
        })
    }
}

/// Compile `pattern`. With `end`, the whole path must match (a trailing `/` is allowed);
/// without it, any remainder after a segment boundary is captured as the rest.
pub fn compile(pattern: &str, end: bool) -> Result<PathMatcher, PatternError> {
    let mut source = String::from("^");
    let mut keys = Vec::new();
    let segments: Vec<&str> = pattern
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();

    for (index, segment) in segments.iter().enumerate() {
        if *segment == "*" {
            if index + 1 != segments.len() {
                return Err(PatternError::MisplacedWildcard {
                    pattern: pattern.to_string(),
                });
            }
            keys.push(keys.len().to_string());
            source.push_str("(?:/(.*))?");
        } else if let Some(name) = segment.strip_prefix(':') {
            let (name, optional) = match name.strip_suffix('?') {
                Some(name) => (name, true),
                None => (name, false),
            };
            if name.is_empty() {
                return Err(PatternError::EmptyParam {
                    pattern: pattern.to_string(),
                });
            }
            keys.push(name.to_string());
            source.push_str(if optional { "(?:/([^/]+))?" } else { "/([^/]+)" });
        } else {
            source.push('/');
            source.push_str(&regex::escape(segment));
        }
    }

    if end {
        source.push_str("/?$");
    } else {
        source.push_str(&format!("(?P<{REST}>/.*)?$"));
    }

    let regex = Regex::new(&source).map_err(|err| PatternError::Regex {
        pattern: pattern.to_string(),
        reason: err.to_string(),
    })?;
    Ok(PathMatcher { regex, keys, end })
}
