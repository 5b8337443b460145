//! Cached schema entries

use chrono::{DateTime, Utc};
use jsonschema::Validator;

/// One resolved schema, cached by key
///
/// An entry is created on first demand and holds either a compiled
/// validator or the compile error. Compile failures are cached too, so the
/// cost of a broken schema is paid once per TTL window instead of once per
/// event.
pub struct CachedSchema {
    /// The opaque schema key this entry resolves
    pub key: String,

    /// When the backend fetch completed
    pub fetched_at: DateTime<Utc>,

    /// Raw document bytes as fetched
    pub raw: Vec<u8>,

    /// Compiled validator, present iff compilation succeeded
    pub validator: Option<Validator>,

    /// Compile error text, present iff compilation failed
    pub compile_error: Option<String>,
}

impl CachedSchema {
    /// Whether this entry has outlived the given TTL
    pub fn is_expired(&self, ttl: std::time::Duration, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now - self.fetched_at > ttl,
            // TTL too large for chrono arithmetic - effectively no expiry
            Err(_) => false,
        }
    }
}

impl std::fmt::Debug for CachedSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedSchema")
            .field("key", &self.key)
            .field("fetched_at", &self.fetched_at)
            .field("raw_len", &self.raw.len())
            .field("compiled", &self.validator.is_some())
            .field("compile_error", &self.compile_error)
            .finish()
    }
}
