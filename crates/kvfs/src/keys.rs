//! Reversible encoding between backend keys and store keys.
//!
//! The store rejects keys with a leading separator, so the separator is
//! replaced by a sentinel character instead of dropped. That keeps the
//! mapping 1:1 in both directions: `/a/b` ↔ `!a/b`, and the root `/`
//! (backend key ``""``) ↔ `!`.

/// Replaces the path's leading separator in store keys.
pub const KEY_SENTINEL: char = '!';

/// Backend key (root is the empty string) to store key.
pub fn encode(backend_key: &str) -> String {
    format!("{}{}", KEY_SENTINEL, backend_key)
}

/// Store key back to backend key; `None` if the sentinel is missing.
pub fn decode(store_key: &str) -> Option<String> {
    store_key
        .strip_prefix(KEY_SENTINEL)
        .map(|rest| rest.to_string())
}
