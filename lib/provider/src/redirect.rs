//! Redirect URL composition.
//!
//! Parameters are merged with later sources overriding earlier ones on key
//! collision: the target's own query, then caller-supplied parameters, then
//! the `ltik`. A key keeps the position of its first occurrence.
//!
//! Only targets with an explicit host are handed to a URL parser. Anything
//! else (`/path`, `path?x=1`, `localhost:3000/x`) is split on `#` and `?`
//! and its base is left untouched, so a `:digits` suffix is never mistaken
//! for a port or a scheme.

use url::Url;
use url::form_urlencoded;

/// Name of the query parameter carrying the ltik.
pub const LTIK_PARAM: &str = "ltik";

/// Ordered query parameters with unique keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a raw query string (without the leading `?`).
    #[must_use]
    pub fn parse(query: &str) -> Self {
        let mut params = Self::new();
        params.extend(
            form_urlencoded::parse(query.as_bytes()).map(|(k, v)| (k.into_owned(), v.into_owned())),
        );
        params
    }

    /// Sets `key`, replacing any existing value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Form-urlencodes the parameters.
    #[must_use]
    pub fn encode(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.iter())
            .finish()
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for QueryParams {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.set(k, v);
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        params.extend(iter);
        params
    }
}

/// Appends `extra` and the `ltik` to `target`'s query.
#[must_use]
pub fn compose<K, V>(target: &str, extra: impl IntoIterator<Item = (K, V)>, ltik: &str) -> String
where
    K: Into<String>,
    V: Into<String>,
{
    let merge = |existing: &str| {
        let mut params = QueryParams::parse(existing);
        params.extend(extra);
        params.set(LTIK_PARAM, ltik);
        params
    };

    if let Some(mut url) = Url::parse(target).ok().filter(Url::has_host) {
        let params = merge(url.query().unwrap_or(""));
        url.set_query(Some(&params.encode()));
        return url.into();
    }

    let (rest, fragment) = match target.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (target, None),
    };
    let (base, query) = rest.split_once('?').unwrap_or((rest, ""));

    let mut composed = format!("{base}?{}", merge(query).encode());
    if let Some(fragment) = fragment {
        composed.push('#');
        composed.push_str(fragment);
    }
    composed
}

/// Splits a request URI's path and query.
#[must_use]
pub fn split_path_and_query(uri: &str) -> (&str, &str) {
    uri.split_once('?').unwrap_or((uri, ""))
}
