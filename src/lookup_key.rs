//! Lookup key derivation.
//!
//! A lookup key identifies "the same quote" across local and remote copies.
//! It is derived from the quote text only, trimmed and lowercased. Category is
//! intentionally not part of the key, so a quote filed under different
//! categories on each side still matches.

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the SHA-256 digest
pub const SHA256_KEY_LEN: usize = 16;

/// Derives a lookup key from quote text.
pub trait LookupKeyDeriver: Send + Sync {
    fn derive(&self, text: &str) -> String;
}

/// Default deriver: truncated SHA-256 of the normalized text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256KeyDeriver;

impl LookupKeyDeriver for Sha256KeyDeriver {
    fn derive(&self, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(normalize_text(text).as_bytes());
        let result = hasher.finalize();

        let hex: String = result.iter().map(|b| format!("{:02x}", b)).collect();
        hex[..SHA256_KEY_LEN].to_string()
    }
}

/// 31-multiplier 32-bit string hash over UTF-16 code units.
///
/// Cheap and stable, but collisions are far more likely than with
/// [`Sha256KeyDeriver`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiplicativeKeyDeriver;

impl LookupKeyDeriver for MultiplicativeKeyDeriver {
    fn derive(&self, text: &str) -> String {
        let hash = normalize_text(text)
            .encode_utf16()
            .fold(0i32, |acc, unit| {
                acc.wrapping_shl(5).wrapping_sub(acc).wrapping_add(unit as i32)
            });
        format!("{:08x}", hash as u32)
    }
}

/// Trim and lowercase quote text before hashing
pub fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}
