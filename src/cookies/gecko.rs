//! Gecko-family cookie store (Firefox `cookies.sqlite`)

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ini::{Ini, ParseOption};
use rusqlite::params;
use tracing::debug;

use super::{CookieScope, CookieStoreAdapter, StoreCopy, domain_pattern, newest};
use crate::{
    Error, Result,
    cookies::jar::{Cookie, CookieJar},
    types::{BrowserDescriptor, CookieFamily},
};

/// Firefox profile cookie database reader
#[derive(Debug, Default)]
pub struct GeckoCookieStore;

impl CookieStoreAdapter for GeckoCookieStore {
    fn family(&self) -> CookieFamily {
        CookieFamily::Gecko
    }

    fn extract(&self, browser: &BrowserDescriptor, scope: &CookieScope) -> Result<CookieJar> {
        let roots: Vec<PathBuf> = browser
            .profile_roots_for(scope.platform, &scope.dirs)
            .into_iter()
            .filter(|root| root.is_dir())
            .collect();
        if roots.is_empty() {
            return Err(Error::cookie_access(browser.id, "profile directory not found"));
        }

        let db = roots
            .iter()
            .find_map(|root| default_profile_db(root))
            .or_else(|| newest(roots.iter().flat_map(|root| scan_profiles(root))))
            .ok_or_else(|| Error::cookie_access(browser.id, "no cookies.sqlite in any profile"))?;
        debug!("Using cookie database {}", db.display());

        let copy = StoreCopy::of(browser.id, &db)?;
        let conn = copy.open(browser.id)?;

        let unreadable = |e: rusqlite::Error| {
            Error::cookie_access(browser.id, format!("unreadable cookie database: {}", e))
        };
        let mut stmt = conn
            .prepare(
                "SELECT host, name, value, path, expiry, isSecure \
                 FROM moz_cookies WHERE host LIKE ?1 ORDER BY host, name",
            )
            .map_err(unreadable)?;

        let mut jar = CookieJar::new();
        let mut skipped = 0usize;
        for domain in &scope.domains {
            let rows = stmt
                .query_map(params![domain_pattern(domain)], read_row)
                .map_err(unreadable)?;
            for row in rows {
                match row {
                    Ok(Some(cookie)) => jar.insert(cookie),
                    Ok(None) => skipped += 1,
                    Err(e) => {
                        debug!("Skipping unreadable cookie row: {}", e);
                        skipped += 1;
                    }
                }
            }
        }
        if skipped > 0 {
            debug!("Skipped {} incomplete cookie row(s)", skipped);
        }
        Ok(jar)
    }
}

/// One `moz_cookies` row; `None` when host, name or value is missing
fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Option<Cookie>> {
    let (Some(host), Some(name), Some(value)) = (
        row.get::<_, Option<String>>(0)?,
        row.get::<_, Option<String>>(1)?,
        row.get::<_, Option<String>>(2)?,
    ) else {
        return Ok(None);
    };
    let path = row
        .get::<_, Option<String>>(3)?
        .unwrap_or_else(|| "/".to_string());
    let expiry = row.get::<_, Option<i64>>(4)?.and_then(gecko_time);
    let secure = row.get::<_, Option<bool>>(5)?.unwrap_or(false);

    Ok(Some(
        Cookie::new(host, name, value)
            .with_path(path)
            .with_expiry(expiry)
            .with_secure(secure),
    ))
}

/// Database of the profile `profiles.ini` marks as default.
///
/// An `[Install*]` section's `Default=` wins over a `[Profile*]` with
/// `Default=1`, matching what the browser itself launches.
fn default_profile_db(root: &Path) -> Option<PathBuf> {
    let text = std::fs::read_to_string(root.join("profiles.ini")).ok()?;
    // Absolute Windows paths carry backslashes that must survive verbatim
    let options = ParseOption {
        enabled_escape: false,
        enabled_quote: false,
        ..ParseOption::default()
    };
    let ini = match Ini::load_from_str_opt(text.trim_start_matches('\u{feff}'), options) {
        Ok(ini) => ini,
        Err(e) => {
            debug!("Ignoring unparsable profiles.ini: {}", e);
            return None;
        }
    };

    let install_default = ini
        .iter()
        .filter(|(name, _)| name.is_some_and(|n| n.starts_with("Install")))
        .find_map(|(_, keys)| keys.get("Default"))
        .map(|path| root.join(path));

    let flagged_default = ini
        .iter()
        .filter(|(name, _)| name.is_some_and(|n| n.starts_with("Profile")))
        .find(|(_, keys)| keys.get("Default").map(str::trim) == Some("1"))
        .and_then(|(_, keys)| {
            let path = keys.get("Path")?;
            // Missing IsRelative means relative
            Some(if keys.get("IsRelative").map(str::trim) == Some("0") {
                PathBuf::from(path)
            } else {
                root.join(path)
            })
        });

    [install_default, flagged_default]
        .into_iter()
        .flatten()
        .map(|dir| dir.join("cookies.sqlite"))
        .find(|db| db.is_file())
}

/// Every `cookies.sqlite` one or two levels under the root (`Profiles/x/`)
fn scan_profiles(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for base in [root.to_path_buf(), root.join("Profiles")] {
        for entry in std::fs::read_dir(&base).into_iter().flatten().flatten() {
            let db = entry.path().join("cookies.sqlite");
            if db.is_file() {
                found.push(db);
            }
        }
    }
    found.sort();
    found
}

/// `expiry` is seconds since the epoch (milliseconds in newer releases)
fn gecko_time(expiry: i64) -> Option<DateTime<Utc>> {
    match expiry {
        e if e <= 0 => None,
        e if e > 100_000_000_000 => DateTime::from_timestamp_millis(e),
        e => DateTime::from_timestamp(e, 0),
    }
}
