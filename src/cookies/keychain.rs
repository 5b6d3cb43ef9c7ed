//! Safari cookie store (`Cookies.binarycookies`)
//!
//! File layout, big-endian header then little-endian pages:
//!
//! ```text
//! "cook" | page count (u32 BE) | page sizes (u32 BE each) | pages...
//! page:   0x00000100 | cookie count (u32 LE) | cookie offsets (u32 LE each) | 0
//! cookie: size | ? | flags | ? | domain off | name off | path off | value off
//!         | 8 bytes | expiry (f64 LE, Mac epoch) | creation (f64 LE)
//!         | NUL-terminated strings at the offsets above
//! ```

use chrono::{DateTime, Utc};
use tracing::debug;

use super::{CookieScope, CookieStoreAdapter};
use crate::{
    Error, Result,
    cookies::jar::{Cookie, CookieJar},
    types::{BrowserDescriptor, CookieFamily},
};

const FILE_NAME: &str = "Cookies.binarycookies";
/// Seconds between 1970-01-01 and 2001-01-01
const MAC_EPOCH_OFFSET: f64 = 978_307_200.0;
const FLAG_SECURE: u32 = 0x1;

/// Safari binary cookie jar reader
#[derive(Debug, Default)]
pub struct KeychainCookieStore;

impl CookieStoreAdapter for KeychainCookieStore {
    fn family(&self) -> CookieFamily {
        CookieFamily::Keychain
    }

    fn extract(&self, browser: &BrowserDescriptor, scope: &CookieScope) -> Result<CookieJar> {
        let path = browser
            .profile_roots_for(scope.platform, &scope.dirs)
            .into_iter()
            .map(|dir| dir.join(FILE_NAME))
            .find(|path| path.is_file())
            .ok_or_else(|| Error::cookie_access(browser.id, format!("{} not found", FILE_NAME)))?;
        debug!("Using cookie file {}", path.display());

        // Read whole file at once; Safari replaces it atomically and never locks it
        let data = std::fs::read(&path).map_err(|e| {
            Error::cookie_access(
                browser.id,
                format!("{} is unreadable (Full Disk Access?): {}", path.display(), e),
            )
        })?;

        let cookies = parse_binary_cookies(&data)
            .map_err(|reason| Error::cookie_access(browser.id, reason))?;

        Ok(cookies
            .into_iter()
            .filter(|c| scope.domains.iter().any(|d| c.matches_domain(d)))
            .collect())
    }
}

/// Parse a whole `Cookies.binarycookies` file
pub fn parse_binary_cookies(data: &[u8]) -> std::result::Result<Vec<Cookie>, String> {
    if data.get(..4) != Some(b"cook".as_slice()) {
        return Err("not a binarycookies file".to_string());
    }
    let page_count = be_u32(data, 4)? as usize;

    let mut offset = 8 + page_count * 4;
    let mut cookies = Vec::new();
    for i in 0..page_count {
        let size = be_u32(data, 8 + i * 4)? as usize;
        let page = data
            .get(offset..offset + size)
            .ok_or_else(|| format!("page {} is truncated", i))?;
        parse_page(page, &mut cookies)?;
        offset += size;
    }
    Ok(cookies)
}

fn parse_page(page: &[u8], out: &mut Vec<Cookie>) -> std::result::Result<(), String> {
    if page.get(..4) != Some([0u8, 0, 1, 0].as_slice()) {
        return Err("bad page header".to_string());
    }
    let count = le_u32(page, 4)? as usize;
    for i in 0..count {
        let start = le_u32(page, 8 + i * 4)? as usize;
        let size = le_u32(page, start)? as usize;
        let record = page
            .get(start..start + size)
            .ok_or_else(|| "cookie record is truncated".to_string())?;
        out.push(parse_cookie(record)?);
    }
    Ok(())
}

fn parse_cookie(record: &[u8]) -> std::result::Result<Cookie, String> {
    let flags = le_u32(record, 8)?;
    let domain = c_string(record, le_u32(record, 16)? as usize)?;
    let name = c_string(record, le_u32(record, 20)? as usize)?;
    let path = c_string(record, le_u32(record, 24)? as usize)?;
    let value = c_string(record, le_u32(record, 28)? as usize)?;
    let expiry = le_f64(record, 40)?;

    let expires = DateTime::<Utc>::from_timestamp((expiry + MAC_EPOCH_OFFSET) as i64, 0);

    Ok(Cookie::new(domain, name, value)
        .with_path(path)
        .with_expiry(expires)
        .with_secure(flags & FLAG_SECURE != 0))
}

fn be_u32(data: &[u8], at: usize) -> std::result::Result<u32, String> {
    bytes::<4>(data, at).map(u32::from_be_bytes)
}

fn le_u32(data: &[u8], at: usize) -> std::result::Result<u32, String> {
    bytes::<4>(data, at).map(u32::from_le_bytes)
}

fn le_f64(data: &[u8], at: usize) -> std::result::Result<f64, String> {
    bytes::<8>(data, at).map(f64::from_le_bytes)
}

fn bytes<const N: usize>(data: &[u8], at: usize) -> std::result::Result<[u8; N], String> {
    data.get(at..at + N)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| format!("unexpected end of data at byte {}", at))
}

fn c_string(record: &[u8], at: usize) -> std::result::Result<String, String> {
    let tail = record
        .get(at..)
        .ok_or_else(|| "string offset out of range".to_string())?;
    let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    Ok(String::from_utf8_lossy(&tail[..end]).into_owned())
}
