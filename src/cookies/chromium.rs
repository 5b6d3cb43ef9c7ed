//! Chromium-family cookie store (Chrome, Edge, Brave, Opera, Opera GX)

use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tracing::{debug, warn};

use super::crypto::{self, ChromiumKeys};
use super::{CookieScope, CookieStoreAdapter, StoreCopy, domain_pattern, newest};
use crate::{
    Error, Result,
    cookies::jar::{Cookie, CookieJar},
    types::{BrowserDescriptor, CookieFamily, Platform},
};

/// Microseconds between 1601-01-01 and 1970-01-01
const WINDOWS_EPOCH_OFFSET_MICROS: i64 = 11_644_473_600_000_000;

/// Encrypted SQLite `Cookies` database reader
#[derive(Debug, Default)]
pub struct ChromiumCookieStore;

impl CookieStoreAdapter for ChromiumCookieStore {
    fn family(&self) -> CookieFamily {
        CookieFamily::Chromium
    }

    fn extract(&self, browser: &BrowserDescriptor, scope: &CookieScope) -> Result<CookieJar> {
        let root = browser
            .profile_roots_for(scope.platform, &scope.dirs)
            .into_iter()
            .find(|root| root.is_dir())
            .ok_or_else(|| Error::cookie_access(browser.id, "user data directory not found"))?;

        let db = find_cookie_db(&root)
            .ok_or_else(|| Error::cookie_access(browser.id, "no Cookies database in any profile"))?;
        debug!("Using cookie database {}", db.display());

        let copy = StoreCopy::of(browser.id, &db)?;
        let conn = copy.open(browser.id)?;

        let mut keys = load_keys(browser, scope.platform, &root)?;
        keys.meta_version = meta_version(&conn);

        read_cookies(&conn, &keys, &scope.domains)
            .map_err(|e| match e {
                Error::Sqlite(e) => Error::cookie_access(browser.id, format!("unreadable cookie database: {}", e)),
                other => other,
            })
            .and_then(|(jar, last_error)| match last_error {
                Some(reason) if jar.is_empty() => Err(Error::cookie_access(browser.id, reason)),
                _ => Ok(jar),
            })
    }
}

/// Candidate databases: the root itself (Opera), `Default`, then `Profile *`
fn find_cookie_db(root: &Path) -> Option<PathBuf> {
    let mut profiles = vec![root.to_path_buf(), root.join("Default")];

    let mut numbered: Vec<PathBuf> = std::fs::read_dir(root)
        .into_iter()
        .flatten()
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_dir()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("Profile "))
        })
        .collect();
    numbered.sort();
    profiles.extend(numbered);

    // Chromium 96+ moved the database under Network/
    let candidates = profiles
        .iter()
        .flat_map(|dir| [dir.join("Network").join("Cookies"), dir.join("Cookies")]);
    newest(candidates)
}

fn load_keys(browser: &BrowserDescriptor, platform: Platform, root: &Path) -> Result<ChromiumKeys> {
    let mut keys = ChromiumKeys::default();

    match platform {
        Platform::Windows => match std::fs::read_to_string(root.join("Local State")) {
            Ok(state) => match crypto::decode_local_state_key(&state) {
                Ok(key) => keys.gcm = Some(key),
                Err(e) => warn!("{}: Local State key unavailable: {}", browser.name, e),
            },
            Err(e) => debug!("{}: no Local State: {}", browser.name, e),
        },
        Platform::MacOs => {
            let service = browser.safe_storage.ok_or_else(|| {
                Error::cookie_access(browser.id, "no Keychain item known for this browser")
            })?;
            let password = keychain_password(service).ok_or_else(|| {
                Error::cookie_access(
                    browser.id,
                    format!("Keychain item \"{}\" is unavailable", service),
                )
            })?;
            keys.v10 = Some(crypto::derive_cbc_key(
                password.as_bytes(),
                crypto::MACOS_ITERATIONS,
            ));
        }
        Platform::Linux => {
            keys.v10 = Some(crypto::derive_cbc_key(
                crypto::LINUX_DEFAULT_PASSWORD,
                crypto::LINUX_ITERATIONS,
            ));
            keys.v11 = browser
                .secret_application
                .and_then(secret_service_password)
                .map(|password| {
                    crypto::derive_cbc_key(password.as_bytes(), crypto::LINUX_ITERATIONS)
                });
        }
    }

    Ok(keys)
}

/// `security find-generic-password -w -s "<Browser> Safe Storage"`
fn keychain_password(service: &str) -> Option<String> {
    command_output("security", &["find-generic-password", "-w", "-s", service])
}

/// `secret-tool lookup application <app>` (GNOME keyring / KWallet bridge)
fn secret_service_password(application: &str) -> Option<String> {
    command_output("secret-tool", &["lookup", "application", application])
}

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        debug!("{} exited with {}", program, output.status);
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim_end_matches(['\r', '\n']);
    (!text.is_empty()).then(|| text.to_string())
}

fn meta_version(conn: &Connection) -> u32 {
    conn.query_row("SELECT value FROM meta WHERE key = 'version'", [], |row| {
        row.get::<_, String>(0)
    })
    .ok()
    .and_then(|v| v.parse().ok())
    .unwrap_or(0)
}

/// Read and decrypt every cookie for `domains`.
///
/// Returns the jar plus the last decryption failure, so a store whose values
/// are all unreadable (e.g. app-bound `v20`) can be reported as such.
fn read_cookies(
    conn: &Connection,
    keys: &ChromiumKeys,
    domains: &[String],
) -> Result<(CookieJar, Option<String>)> {
    let mut stmt = conn.prepare(
        "SELECT host_key, name, value, encrypted_value, path, expires_utc, is_secure \
         FROM cookies WHERE host_key LIKE ?1 ORDER BY host_key, name",
    )?;

    let mut jar = CookieJar::new();
    let mut last_error = None;

    for domain in domains {
        let rows = stmt.query_map(params![domain_pattern(domain)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Vec<u8>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, bool>(6)?,
            ))
        })?;

        for row in rows {
            let (host, name, plain, encrypted, path, expires_utc, secure) = row?;

            let value = if !plain.is_empty() || encrypted.is_empty() {
                plain
            } else {
                match crypto::decrypt_value(keys, &encrypted) {
                    Ok(value) => value,
                    Err(e) => {
                        debug!("Skipping cookie {} on {}: {}", name, host, e);
                        last_error = Some(e.to_string());
                        continue;
                    }
                }
            };

            jar.insert(
                Cookie::new(host, name, value)
                    .with_path(path)
                    .with_expiry(chromium_time(expires_utc))
                    .with_secure(secure),
            );
        }
    }

    Ok((jar, last_error))
}

/// `expires_utc` is microseconds since 1601-01-01; zero means a session cookie
fn chromium_time(micros: i64) -> Option<DateTime<Utc>> {
    if micros <= 0 {
        return None;
    }
    DateTime::from_timestamp_micros(micros - WINDOWS_EPOCH_OFFSET_MICROS)
}
