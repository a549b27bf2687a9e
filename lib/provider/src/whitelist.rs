//! Routes that bypass the authentication gate.
//!
//! Entries are evaluated in insertion order and the first entry whose route
//! matches decides: a later entry for the same route never widens or narrows
//! an earlier one.

use regex::Regex;
use std::fmt;

use crate::error::ConfigurationError;

/// Route part of a whitelist entry.
#[derive(Debug, Clone)]
pub enum RouteMatcher {
    /// Matches a path exactly.
    Literal(String),
    /// Matches any path the pattern finds a match in.
    Pattern(Regex),
}

impl RouteMatcher {
    /// Compiles a pattern matcher.
    pub fn pattern(pattern: &str) -> Result<Self, ConfigurationError> {
        Regex::new(pattern)
            .map(Self::Pattern)
            .map_err(|e| ConfigurationError::InvalidWhitelistPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
    }

    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Literal(route) => route == path,
            Self::Pattern(regex) => regex.is_match(path),
        }
    }
}

impl From<&str> for RouteMatcher {
    fn from(route: &str) -> Self {
        Self::Literal(route.to_string())
    }
}

impl From<String> for RouteMatcher {
    fn from(route: String) -> Self {
        Self::Literal(route)
    }
}

impl From<Regex> for RouteMatcher {
    fn from(regex: Regex) -> Self {
        Self::Pattern(regex)
    }
}

/// Method part of a whitelist entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodMatcher {
    All,
    /// Compared case-insensitively.
    Method(String),
}

impl MethodMatcher {
    /// Parses a method name; `ALL` (any case) is the wildcard.
    #[must_use]
    pub fn parse(method: &str) -> Self {
        if method.eq_ignore_ascii_case("ALL") {
            Self::All
        } else {
            Self::Method(method.to_string())
        }
    }

    #[must_use]
    pub fn allows(&self, method: &str) -> bool {
        match self {
            Self::All => true,
            Self::Method(allowed) => allowed.eq_ignore_ascii_case(method),
        }
    }
}

impl fmt::Display for MethodMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("ALL"),
            Self::Method(method) => f.write_str(method),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WhitelistEntry {
    route: RouteMatcher,
    method: MethodMatcher,
}

impl WhitelistEntry {
    /// An entry matching every method on `route`.
    pub fn route(route: impl Into<RouteMatcher>) -> Self {
        Self {
            route: route.into(),
            method: MethodMatcher::All,
        }
    }

    /// An entry matching one method on `route`.
    pub fn with_method(route: impl Into<RouteMatcher>, method: &str) -> Self {
        Self {
            route: route.into(),
            method: MethodMatcher::parse(method),
        }
    }

    #[must_use]
    pub fn route_matcher(&self) -> &RouteMatcher {
        &self.route
    }

    #[must_use]
    pub fn method(&self) -> &MethodMatcher {
        &self.method
    }
}

/// Ordered, append-only list of whitelist entries.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    entries: Vec<WhitelistEntry>,
}

impl Whitelist {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends entries after any already present.
    pub fn add(&mut self, entries: impl IntoIterator<Item = WhitelistEntry>) {
        self.entries.extend(entries);
    }

    /// Whether `method` on `path` bypasses authentication.
    #[must_use]
    pub fn test(&self, path: &str, method: &str) -> bool {
        self.entries
            .iter()
            .find(|entry| entry.route.matches(path))
            .is_some_and(|entry| entry.method.allows(method))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
