//! Platform-scoped cookie jar
//!
//! A [`CookieJar`] is the hand-off between cookie extraction and the HTTP
//! session: an ordered set of cookies keyed by (domain, name, path).

use chrono::{DateTime, Utc};
use std::fmt;

/// One browser cookie
#[derive(Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Host or domain the cookie is set for (may start with `.`)
    pub domain: String,
    pub name: String,
    pub value: String,
    pub path: String,
    pub expires: Option<DateTime<Utc>>,
    pub secure: bool,
}

impl Cookie {
    /// Session cookie for `domain` with path `/`
    pub fn new(
        domain: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            name: name.into(),
            value: value.into(),
            path: "/".to_string(),
            expires: None,
            secure: true,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_expiry(mut self, expires: Option<DateTime<Utc>>) -> Self {
        self.expires = expires;
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }

    /// Whether the cookie is sent to `domain` or one of its subdomains
    pub fn matches_domain(&self, domain: &str) -> bool {
        let host = self.domain.trim_start_matches('.').to_ascii_lowercase();
        let domain = domain.trim_start_matches('.').to_ascii_lowercase();
        host == domain || host.ends_with(&format!(".{}", domain))
    }

    /// Host-only `Set-Cookie` rendering.
    ///
    /// The jar is already scoped to the platform, so cookies are bound to the
    /// configured origin instead of their original domain.
    pub fn to_set_cookie(&self) -> String {
        format!("{}={}; Path={}", self.name, self.value, self.path)
    }
}

// Values are bearer credentials; keep them out of logs
impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookie")
            .field("domain", &self.domain)
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .field("path", &self.path)
            .field("expires", &self.expires)
            .field("secure", &self.secure)
            .finish()
    }
}

/// Ordered cookie set; inserting an existing (domain, name, path) replaces it in place
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a cookie
    pub fn insert(&mut self, cookie: Cookie) {
        match self.cookies.iter_mut().find(|c| {
            c.domain == cookie.domain && c.name == cookie.name && c.path == cookie.path
        }) {
            Some(existing) => *existing = cookie,
            None => self.cookies.push(cookie),
        }
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.iter()
    }

    /// First cookie with the given name
    pub fn get(&self, name: &str) -> Option<&Cookie> {
        self.cookies.iter().find(|c| c.name == name)
    }

    /// Keep unexpired cookies belonging to any of `domains`
    pub fn scoped_to(self, domains: &[String], now: DateTime<Utc>) -> Self {
        Self {
            cookies: self
                .cookies
                .into_iter()
                .filter(|c| !c.is_expired(now))
                .filter(|c| domains.iter().any(|d| c.matches_domain(d)))
                .collect(),
        }
    }

    /// Names from `required` that are absent from the jar
    pub fn missing<'a>(&self, required: &'a [String]) -> Vec<&'a str> {
        required
            .iter()
            .filter(|name| self.get(name).is_none())
            .map(String::as_str)
            .collect()
    }

    /// Copy the jar into a reqwest cookie store for requests to `base_url`
    pub fn load_into(&self, store: &reqwest::cookie::Jar, base_url: &url::Url) {
        for cookie in &self.cookies {
            store.add_cookie_str(&cookie.to_set_cookie(), base_url);
        }
    }
}

impl FromIterator<Cookie> for CookieJar {
    fn from_iter<I: IntoIterator<Item = Cookie>>(iter: I) -> Self {
        let mut jar = CookieJar::new();
        for cookie in iter {
            jar.insert(cookie);
        }
        jar
    }
}

impl IntoIterator for CookieJar {
    type Item = Cookie;
    type IntoIter = std::vec::IntoIter<Cookie>;

    fn into_iter(self) -> Self::IntoIter {
        self.cookies.into_iter()
    }
}
