//! Browser location parsing.

use std::collections::BTreeMap;
use std::fmt;

/// A parsed location: scheme/origin, path, query and fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    /// `https://host` style origin, or empty for origin-relative URLs.
    pub origin: String,
    pub path: String,
    /// Query string without the leading `?`.
    pub query: String,
    /// Fragment without the leading `#`.
    pub hash: String,
}

impl Location {
    /// Parse an absolute or origin-relative URL.
    pub fn parse(url: &str) -> Self {
        let (rest, hash) = match url.split_once('#') {
            Some((rest, hash)) => (rest, hash.to_string()),
            None => (url, String::new()),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, query.to_string()),
            None => (rest, String::new()),
        };

        let (origin, path) = match rest.find("://") {
            Some(scheme_end) => {
                let after = scheme_end + 3;
                match rest[after..].find('/') {
                    Some(slash) => (
                        rest[..after + slash].to_string(),
                        rest[after + slash..].to_string(),
                    ),
                    None => (rest.to_string(), "/".to_string()),
                }
            }
            None => (String::new(), rest.to_string()),
        };

        let path = if path.is_empty() { "/".to_string() } else { path };
        Self {
            origin,
            path,
            query,
            hash,
        }
    }

    /// Scheme of the origin (`https`, `file`, ...), if the location is absolute.
    pub fn scheme(&self) -> Option<&str> {
        self.origin.split_once("://").map(|(scheme, _)| scheme)
    }

    /// Pages served from `file:` cannot record history entries.
    pub fn is_file(&self) -> bool {
        self.scheme() == Some("file")
    }

    /// Decoded query parameters. Later duplicates win.
    pub fn query_params(&self) -> BTreeMap<String, String> {
        self.query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((key, value)) => (key.to_string(), value.to_string()),
                None => (pair.to_string(), String::new()),
            })
            .collect()
    }

    /// Path plus query and fragment, as pushed into history.
    pub fn relative(&self) -> String {
        let mut out = self.path.clone();
        if !self.query.is_empty() {
            out.push('?');
            out.push_str(&self.query);
        }
        if !self.hash.is_empty() {
            out.push('#');
            out.push_str(&self.hash);
        }
        out
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.origin, self.relative())
    }
}
