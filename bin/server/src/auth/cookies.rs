//! Signed cookies set by the provider.
//!
//! - `state{state}`: value is the issuer, 60 seconds, set at login and
//!   cleared when the platform posts back
//! - `{platform code}`: value is the launching user, persistent

use axum::http::HeaderMap;
use axum_extra::extract::SignedCookieJar;
use axum_extra::extract::cookie::{Cookie, Key};
use launchgate_provider::{CookieSource, STATE_TTL};

use crate::config::CookieConfig;

/// Name of the cookie bound to a login attempt.
#[must_use]
pub fn state_cookie_name(state: &str) -> String {
    format!("state{state}")
}

/// Reads the request's signed cookies. Cookies with a bad signature are
/// ignored.
#[must_use]
pub fn jar(headers: &HeaderMap, key: &Key) -> SignedCookieJar {
    SignedCookieJar::from_headers(headers, key.clone())
}

fn base<'c>(name: String, value: String, config: &CookieConfig) -> Cookie<'c> {
    let mut cookie = Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(config.secure)
        .same_site(config.same_site.into())
        .build();
    if let Some(domain) = &config.domain {
        cookie.set_domain(domain.clone());
    }
    cookie
}

/// The login attempt cookie.
#[must_use]
pub fn state_cookie<'c>(state: &str, issuer: &str, config: &CookieConfig) -> Cookie<'c> {
    let mut cookie = base(state_cookie_name(state), issuer.to_string(), config);
    cookie.set_max_age(time::Duration::seconds(STATE_TTL.as_secs() as i64));
    cookie
}

/// The platform session cookie binding a platform to its user.
#[must_use]
pub fn session_cookie<'c>(name: &str, user: &str, config: &CookieConfig) -> Cookie<'c> {
    let mut cookie = base(name.to_string(), user.to_string(), config);
    cookie.make_permanent();
    cookie
}

/// A cookie that clears `name` when passed to `SignedCookieJar::remove`.
///
/// Carries the same path and domain the cookie was set with.
#[must_use]
pub fn removal<'c>(name: String, config: &CookieConfig) -> Cookie<'c> {
    base(name, String::new(), config)
}

/// Exposes a signed jar to session validators.
pub struct JarCookies<'a>(pub &'a SignedCookieJar);

impl CookieSource for JarCookies<'_> {
    fn get(&self, name: &str) -> Option<String> {
        self.0.get(name).map(|cookie| cookie.value().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SameSitePolicy;
    use axum_extra::extract::cookie::SameSite;

    #[test]
    fn state_cookie_expires_after_a_minute() {
        let cookie = state_cookie("abc", "https://lms.example.edu", &CookieConfig::default());
        assert_eq!(cookie.name(), "stateabc");
        assert_eq!(cookie.value(), "https://lms.example.edu");
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(60)));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    }

    #[test]
    fn session_cookie_is_persistent_and_follows_config() {
        let config = CookieConfig {
            secure: true,
            same_site: SameSitePolicy::NoRestriction,
            domain: Some("tool.example.com".to_string()),
        };
        let cookie = session_cookie("ltiabc", "user-42", &config);
        assert_eq!(cookie.value(), "user-42");
        assert!(cookie.max_age().is_some_and(|age| age > time::Duration::days(365)));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::None));
        assert_eq!(cookie.domain(), Some("tool.example.com"));
    }

    #[test]
    fn removal_clears_cookie_on_configured_domain() {
        let config = CookieConfig {
            domain: Some("tool.example.com".to_string()),
            ..CookieConfig::default()
        };
        let mut cookie = removal("stateabc".to_string(), &config);
        assert_eq!(cookie.domain(), Some("tool.example.com"));
        assert_eq!(cookie.path(), Some("/"));

        cookie.make_removal();
        let header = cookie.to_string();
        assert!(header.starts_with("stateabc=;"));
        assert!(header.contains("Domain=tool.example.com"));
        assert!(header.contains("Max-Age=0"));
    }

    #[test]
    fn signed_cookies_round_trip_through_headers() {
        let key = Key::derive_from(b"0123456789abcdef0123456789abcdef");
        let signed = SignedCookieJar::new(key.clone()).add(session_cookie(
            "ltiabc",
            "user-42",
            &CookieConfig::default(),
        ));
        let value = signed.get("ltiabc").expect("cookie").value().to_string();
        assert_eq!(value, "user-42");

        let mut headers = HeaderMap::new();
        headers.insert("cookie", "ltiabc=user-42".parse().expect("header"));
        let unsigned = jar(&headers, &key);
        assert_eq!(JarCookies(&unsigned).get("ltiabc"), None);
    }
}
