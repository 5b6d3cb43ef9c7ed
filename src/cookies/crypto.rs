//! Chromium cookie value decryption
//!
//! Chromium prefixes encrypted values with a version tag:
//! - `v10`/`v11` on Linux and macOS: AES-128-CBC, key from PBKDF2-HMAC-SHA1
//!   over a password (`peanuts`, the Secret Service entry or the Keychain
//!   "Safe Storage" item), salt `saltysalt`, IV of sixteen spaces.
//! - `v10` on Windows: AES-256-GCM with the key stored DPAPI-protected in
//!   `Local State`, 12-byte nonce after the tag.
//! - no tag on Windows: a bare DPAPI blob (pre-80 Chromium).
//! - `v20`: app-bound encryption, not recoverable outside the browser.

use aes::Aes128;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce, aead::Aead};
use cbc::cipher::{BlockDecryptMut, KeyIvInit, block_padding::Pkcs7};

use crate::{Error, Result};

/// PBKDF2 salt used by every Chromium build
const SALT: &[u8] = b"saltysalt";
/// CBC initialisation vector: sixteen ASCII spaces
const IV: [u8; 16] = [b' '; 16];
/// Fallback password when no keyring is available on Linux
pub const LINUX_DEFAULT_PASSWORD: &[u8] = b"peanuts";
pub const LINUX_ITERATIONS: u32 = 1;
pub const MACOS_ITERATIONS: u32 = 1003;
/// Length of the SHA-256 host digest prepended since cookie DB version 24
const HOST_DIGEST_LEN: usize = 32;

/// Keys available for one Chromium profile
#[derive(Clone, Default)]
pub struct ChromiumKeys {
    /// AES-128-CBC key for `v10` values (Linux/macOS)
    pub v10: Option<[u8; 16]>,
    /// AES-128-CBC key for `v11` values (Linux keyring)
    pub v11: Option<[u8; 16]>,
    /// AES-256-GCM key from `Local State` (Windows)
    pub gcm: Option<Vec<u8>>,
    /// Cookie DB `meta.version`
    pub meta_version: u32,
}

impl std::fmt::Debug for ChromiumKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromiumKeys")
            .field("v10", &self.v10.is_some())
            .field("v11", &self.v11.is_some())
            .field("gcm", &self.gcm.is_some())
            .field("meta_version", &self.meta_version)
            .finish()
    }
}

/// Derive the AES-128 key from a Chromium safe-storage password
pub fn derive_cbc_key(password: &[u8], iterations: u32) -> [u8; 16] {
    let mut key = [0u8; 16];
    pbkdf2::pbkdf2_hmac::<sha1::Sha1>(password, SALT, iterations, &mut key);
    key
}

/// Decrypt an AES-128-CBC payload (tag already stripped)
pub fn decrypt_cbc(key: &[u8; 16], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let decryptor = cbc::Decryptor::<Aes128>::new_from_slices(key, &IV)
        .map_err(|e| Error::internal(format!("Invalid CBC key: {}", e)))?;
    let mut buffer = ciphertext.to_vec();
    let plaintext = decryptor
        .decrypt_padded_mut::<Pkcs7>(&mut buffer)
        .map_err(|_| Error::internal("Cookie value failed to decrypt (bad key or padding)"))?;
    Ok(plaintext.to_vec())
}

/// Decrypt a Windows `v10` AES-256-GCM value including its 3-byte tag
pub fn decrypt_gcm(key: &[u8], value: &[u8]) -> Result<Vec<u8>> {
    if value.len() < 3 + 12 + 16 {
        return Err(Error::internal("GCM cookie value is truncated"));
    }
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| Error::internal(format!("Invalid GCM key: {}", e)))?;
    let nonce = Nonce::from_slice(&value[3..15]);
    cipher
        .decrypt(nonce, &value[15..])
        .map_err(|_| Error::internal("Cookie value failed GCM authentication"))
}

/// Decrypt one `encrypted_value` column with whatever keys the profile has
pub fn decrypt_value(keys: &ChromiumKeys, encrypted: &[u8]) -> Result<String> {
    let plaintext = match encrypted.get(..3) {
        Some(b"v20") => {
            return Err(Error::internal(
                "App-bound (v20) cookie encryption cannot be read outside the browser",
            ));
        }
        Some(b"v10") | Some(b"v11") => {
            if let Some(gcm) = &keys.gcm {
                decrypt_gcm(gcm, encrypted)?
            } else {
                let key = if &encrypted[..3] == b"v11" {
                    keys.v11.or(keys.v10)
                } else {
                    keys.v10
                };
                let key =
                    key.ok_or_else(|| Error::internal("No decryption key for cookie value"))?;
                decrypt_cbc(&key, &encrypted[3..])?
            }
        }
        _ => dpapi_unprotect(encrypted)?,
    };

    let plaintext = strip_host_digest(&plaintext, keys.meta_version);
    String::from_utf8(plaintext.to_vec())
        .map_err(|_| Error::internal("Decrypted cookie value is not UTF-8"))
}

/// Drop the host digest prefix newer cookie databases add to every value
pub fn strip_host_digest(plaintext: &[u8], meta_version: u32) -> &[u8] {
    if meta_version >= 24 && plaintext.len() >= HOST_DIGEST_LEN {
        &plaintext[HOST_DIGEST_LEN..]
    } else {
        plaintext
    }
}

/// Unwrap the base64 `os_crypt.encrypted_key` from a Windows `Local State`
pub fn decode_local_state_key(local_state: &str) -> Result<Vec<u8>> {
    use base64::Engine;

    let state: serde_json::Value = serde_json::from_str(local_state)?;
    let encoded = state
        .pointer("/os_crypt/encrypted_key")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::internal("Local State has no os_crypt.encrypted_key"))?;
    let wrapped = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| Error::internal(format!("Local State key is not base64: {}", e)))?;
    let protected = wrapped
        .strip_prefix(b"DPAPI")
        .ok_or_else(|| Error::internal("Local State key lacks the DPAPI prefix"))?;
    dpapi_unprotect(protected)
}

/// Decrypt a blob protected for the current Windows user
#[cfg(windows)]
pub fn dpapi_unprotect(data: &[u8]) -> Result<Vec<u8>> {
    use std::ptr;
    use winapi::um::dpapi::CryptUnprotectData;
    use winapi::um::winbase::LocalFree;
    use winapi::um::wincrypt::DATA_BLOB;

    let mut input = data.to_vec();
    let mut in_blob = DATA_BLOB {
        cbData: input.len() as u32,
        pbData: input.as_mut_ptr(),
    };
    let mut out_blob = DATA_BLOB {
        cbData: 0,
        pbData: ptr::null_mut(),
    };

    // SAFETY: `in_blob` borrows `input`, which outlives the call and is not
    // touched until it returns; the optional entropy, reserved, prompt and
    // description pointers are null, which the API permits. `out_blob` starts
    // empty and on success receives a buffer allocated by the OS with
    // LocalAlloc, owned by us from then on.
    let ok = unsafe {
        CryptUnprotectData(
            &mut in_blob,
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            0,
            &mut out_blob,
        )
    };
    if ok == 0 {
        return Err(Error::internal("CryptUnprotectData failed"));
    }

    if out_blob.pbData.is_null() {
        return Ok(Vec::new());
    }

    // SAFETY: on success `pbData` is non-null and points at `cbData`
    // initialised bytes. The bytes are copied out before the buffer is
    // released, the buffer is freed exactly once with LocalFree as the API
    // requires, and no pointer into it survives this block.
    let plain = unsafe {
        let bytes = std::slice::from_raw_parts(out_blob.pbData, out_blob.cbData as usize).to_vec();
        LocalFree(out_blob.pbData as _);
        bytes
    };
    Ok(plain)
}

#[cfg(not(windows))]
pub fn dpapi_unprotect(_data: &[u8]) -> Result<Vec<u8>> {
    Err(Error::internal("DPAPI-protected data is only readable on Windows"))
}

/// Encrypt a value the way Chromium does on Linux/macOS (`v10` + CBC)
#[cfg(test)]
pub(crate) fn encrypt_v10(key: &[u8; 16], plaintext: &[u8]) -> Vec<u8> {
    use cbc::cipher::BlockEncryptMut;

    let encryptor = cbc::Encryptor::<Aes128>::new_from_slices(key, &IV).unwrap();
    let mut buffer = vec![0u8; plaintext.len() + 16];
    buffer[..plaintext.len()].copy_from_slice(plaintext);
    let ciphertext = encryptor
        .encrypt_padded_mut::<Pkcs7>(&mut buffer, plaintext.len())
        .unwrap();

    let mut value = b"v10".to_vec();
    value.extend_from_slice(ciphertext);
    value
}
