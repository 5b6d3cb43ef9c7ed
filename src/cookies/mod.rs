//! Browser cookie extraction
//!
//! One [`CookieStoreAdapter`] per storage family reads a browser's cookies
//! for the platform domains into a [`CookieJar`]. Stores are never opened in
//! place: SQLite databases are copied to a temporary directory and opened
//! read-only, so a running browser keeps its locks and its data untouched.

pub mod chromium;
pub mod crypto;
pub mod gecko;
pub mod jar;
pub mod keychain;

pub use chromium::ChromiumCookieStore;
pub use gecko::GeckoCookieStore;
pub use jar::{Cookie, CookieJar};
pub use keychain::KeychainCookieStore;

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::Utc;
use rusqlite::{Connection, OpenFlags};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::{
    Error, Result,
    config::PlatformSettings,
    types::{BrowserDescriptor, CookieFamily, DetectedBrowser, Platform, PlatformDirs},
};

/// Where to look and what to keep
#[derive(Debug, Clone)]
pub struct CookieScope {
    pub platform: Platform,
    pub dirs: PlatformDirs,
    /// Platform cookie domains, e.g. `udemy.com`
    pub domains: Vec<String>,
    /// Cookies without which a session cannot be logged in
    pub essential: Vec<String>,
}

impl CookieScope {
    pub fn new(platform: Platform, dirs: PlatformDirs, domains: Vec<String>) -> Self {
        Self {
            platform,
            dirs,
            domains,
            essential: Vec::new(),
        }
    }

    pub fn with_essential(mut self, essential: Vec<String>) -> Self {
        self.essential = essential;
        self
    }

    /// Scope for the configured platform on the given machine layout
    pub fn from_settings(platform: Platform, dirs: PlatformDirs, settings: &PlatformSettings) -> Self {
        Self::new(platform, dirs, settings.cookie_domains.clone())
            .with_essential(settings.essential_cookies.clone())
    }
}

/// Reads one storage family
pub trait CookieStoreAdapter: Send + Sync {
    /// Family this adapter understands
    fn family(&self) -> CookieFamily;

    /// Cookies for `scope.domains` from the browser's newest profile
    fn extract(&self, browser: &BrowserDescriptor, scope: &CookieScope) -> Result<CookieJar>;
}

/// Adapter for a family, if one exists on `platform`
pub fn adapter_for(
    family: CookieFamily,
    platform: Platform,
) -> Option<Box<dyn CookieStoreAdapter>> {
    match family {
        CookieFamily::Chromium => Some(Box::new(ChromiumCookieStore)),
        CookieFamily::Gecko => Some(Box::new(GeckoCookieStore)),
        CookieFamily::Keychain if platform == Platform::MacOs => Some(Box::new(KeychainCookieStore)),
        CookieFamily::Keychain => None,
    }
}

/// Extract a usable platform session from one browser.
///
/// Fails with [`Error::UnsupportedBrowser`] when no adapter serves the
/// browser on this platform, and with [`Error::CookieAccess`] when the store
/// is missing or locked, holds no platform cookies, or lacks an essential one.
pub fn extract_cookies(browser: &BrowserDescriptor, scope: &CookieScope) -> Result<CookieJar> {
    if !browser.supports(scope.platform) {
        return Err(Error::unsupported_browser(browser.id));
    }
    let adapter = adapter_for(browser.family, scope.platform)
        .ok_or_else(|| Error::unsupported_browser(browser.id))?;

    info!("Extracting cookies from {}", browser.name);
    let jar = adapter
        .extract(browser, scope)?
        .scoped_to(&scope.domains, Utc::now());

    if jar.is_empty() {
        return Err(Error::cookie_access(
            browser.id,
            format!("no cookies for {}", scope.domains.join(", ")),
        ));
    }

    let missing = jar.missing(&scope.essential);
    if !missing.is_empty() {
        return Err(Error::cookie_access(
            browser.id,
            format!(
                "no usable browser session (missing {})",
                missing.join(", ")
            ),
        ));
    }

    info!("Loaded {} cookie(s) from {}", jar.len(), browser.name);
    Ok(jar)
}

/// Try browsers in order and return the first usable session.
///
/// Per-browser failures are collected; only when every browser fails does
/// this escalate as [`Error::NoUsableBrowsers`].
pub fn extract_first_usable(
    browsers: &[DetectedBrowser],
    scope: &CookieScope,
) -> Result<(DetectedBrowser, CookieJar)> {
    let mut failures = Vec::new();

    for browser in browsers {
        match extract_cookies(browser.descriptor, scope) {
            Ok(jar) => return Ok((browser.clone(), jar)),
            Err(e) => {
                warn!("{} unusable: {}", browser.descriptor.name, e);
                failures.push(format!("{}: {}", browser.id(), e));
            }
        }
    }

    if failures.is_empty() {
        failures.push("no supported browser is installed".to_string());
    }
    Err(Error::NoUsableBrowsers(failures.join("; ")))
}

/// A store copied out of the browser's profile, removed on drop
pub(crate) struct StoreCopy {
    _dir: TempDir,
    path: PathBuf,
}

impl StoreCopy {
    /// Copy `source` (with its `-wal`/`-journal` siblings) into a temp dir
    pub(crate) fn of(browser: &str, source: &Path) -> Result<Self> {
        let dir = TempDir::new()?;
        let file_name = source
            .file_name()
            .ok_or_else(|| Error::cookie_access(browser, "cookie store path has no file name"))?;
        let path = dir.path().join(file_name);

        std::fs::copy(source, &path).map_err(|e| {
            Error::cookie_access(
                browser,
                format!("cookie store {} is locked or unreadable: {}", source.display(), e),
            )
        })?;

        for suffix in ["-wal", "-journal"] {
            let mut sibling = source.as_os_str().to_owned();
            sibling.push(suffix);
            let sibling = PathBuf::from(sibling);
            if sibling.exists() {
                let mut target = path.as_os_str().to_owned();
                target.push(suffix);
                if let Err(e) = std::fs::copy(&sibling, PathBuf::from(target)) {
                    debug!("Skipping {}: {}", sibling.display(), e);
                }
            }
        }

        Ok(Self { _dir: dir, path })
    }

    /// Open the copy read-only
    pub(crate) fn open(&self, browser: &str) -> Result<Connection> {
        Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| Error::cookie_access(browser, format!("cannot open cookie store: {}", e)))
    }
}

/// Pick the most recently modified path; earlier candidates win ties
pub(crate) fn newest(candidates: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
    candidates
        .into_iter()
        .filter_map(|path| {
            let modified = std::fs::metadata(&path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            path.is_file().then_some((path, modified))
        })
        .fold(None, |best: Option<(PathBuf, SystemTime)>, (path, modified)| match best {
            Some((_, best_time)) if best_time >= modified => best,
            _ => Some((path, modified)),
        })
        .map(|(path, _)| path)
}

/// `LIKE` pattern matching a domain and its subdomains
pub(crate) fn domain_pattern(domain: &str) -> String {
    format!("%{}", domain.trim_start_matches('.'))
}
