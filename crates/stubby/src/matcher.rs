//! Request matching.
//!
//! A [`RequestSpec`] is compiled once into a [`RequestMatcher`] when the
//! endpoint is stored; every incoming request is reduced to a
//! [`RequestDescriptor`] and tested against the matchers in registry order.
//!
//! Criteria, all of which must hold:
//! - method: the request verb is in the accepted set (empty set = any verb)
//! - url: literal comparison after normalization, or regex for `^` patterns
//! - headers: subset match, names and values compared case-insensitively
//! - query: subset match, exact names and values
//! - post: literal equality or regex, same rule as the url

use crate::contract::RequestSpec;
use hyper::HeaderMap;
use regex::Regex;
use std::collections::HashMap;

/// The parts of an incoming request that matching looks at.
#[derive(Debug, Clone, Default)]
pub struct RequestDescriptor {
    pub method: String,
    /// Percent-decoded request path.
    pub path: String,
    /// Header names are lower-cased.
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Option<String>,
}

impl RequestDescriptor {
    pub fn new(method: impl Into<String>, path: &str) -> Self {
        Self {
            method: method.into(),
            path: decode(path),
            ..Default::default()
        }
    }

    /// Build a descriptor from the pieces of a hyper request.
    pub fn from_parts(
        method: &str,
        path: &str,
        query: Option<&str>,
        headers: &HeaderMap,
        body: Option<String>,
    ) -> Self {
        Self {
            method: method.to_string(),
            path: decode(path),
            headers: headers
                .iter()
                .map(|(k, v)| {
                    (
                        k.as_str().to_ascii_lowercase(),
                        String::from_utf8_lossy(v.as_bytes()).into_owned(),
                    )
                })
                .collect(),
            query: query.map(parse_query_string).unwrap_or_default(),
            body,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Literal text or a compiled pattern.
#[derive(Debug, Clone)]
enum TextMatcher {
    Literal(String),
    Pattern(Regex),
}

impl TextMatcher {
    fn compile(raw: &str) -> Result<Self, regex::Error> {
        if raw.starts_with('^') {
            Ok(TextMatcher::Pattern(Regex::new(raw)?))
        } else {
            Ok(TextMatcher::Literal(raw.to_string()))
        }
    }
}

/// A request spec compiled for repeated evaluation.
#[derive(Debug, Clone)]
pub struct RequestMatcher {
    /// Upper-cased verbs; empty accepts any verb.
    methods: Vec<String>,
    url: TextMatcher,
    /// Lower-cased names.
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    post: Option<TextMatcher>,
}

impl RequestMatcher {
    pub fn compile(spec: &RequestSpec) -> Result<Self, regex::Error> {
        let url = match TextMatcher::compile(&spec.url)? {
            TextMatcher::Literal(url) => {
                TextMatcher::Literal(normalize_path(&decode(&url)).to_string())
            }
            pattern => pattern,
        };

        let post = spec.post.as_deref().map(TextMatcher::compile).transpose()?;

        Ok(Self {
            methods: spec.method.iter().map(|m| m.to_ascii_uppercase()).collect(),
            url,
            headers: spec
                .headers
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
                .collect(),
            query: spec
                .query
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            post,
        })
    }

    /// Whether `request` satisfies every criterion of this matcher.
    pub fn matches(&self, request: &RequestDescriptor) -> bool {
        self.matches_method(&request.method)
            && self.matches_url(&request.path)
            && self.matches_headers(&request.headers)
            && self.matches_query(&request.query)
            && self.matches_body(request.body.as_deref())
    }

    fn matches_method(&self, method: &str) -> bool {
        self.methods.is_empty() || self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }

    fn matches_url(&self, path: &str) -> bool {
        match &self.url {
            TextMatcher::Literal(expected) => expected == normalize_path(path),
            TextMatcher::Pattern(re) => re.is_match(path),
        }
    }

    fn matches_headers(&self, headers: &HashMap<String, String>) -> bool {
        self.headers.iter().all(|(name, expected)| {
            headers
                .get(name)
                .is_some_and(|actual| actual.eq_ignore_ascii_case(expected))
        })
    }

    fn matches_query(&self, query: &HashMap<String, String>) -> bool {
        self.query
            .iter()
            .all(|(name, expected)| query.get(name) == Some(expected))
    }

    fn matches_body(&self, body: Option<&str>) -> bool {
        let body = body.unwrap_or("");
        match &self.post {
            None => true,
            Some(TextMatcher::Literal(expected)) => expected == body,
            Some(TextMatcher::Pattern(re)) => re.is_match(body),
        }
    }
}

/// Index of the first matcher accepting `request`, in iteration order.
pub fn first_match<'a>(
    request: &RequestDescriptor,
    matchers: impl IntoIterator<Item = &'a RequestMatcher>,
) -> Option<usize> {
    matchers.into_iter().position(|m| m.matches(request))
}

/// Parse a query string, form-decoding both keys and values. Later duplicates win.
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_form(key), decode_form(value))
        })
        .collect()
}

/// `+` is a space in query components, unlike in paths.
fn decode_form(raw: &str) -> String {
    decode(&raw.replace('+', " "))
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Strip one trailing slash, keeping the root path intact.
fn normalize_path(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}
