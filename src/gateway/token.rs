//! Gateway bearer token cache
//!
//! Single-slot cache for the PhonePe OAuth token. The entry is treated as
//! expired 30 seconds before its declared expiry so an in-flight charge
//! never rides a token that lapses mid-call.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds before declared expiry at which the token is considered stale
const EXPIRY_SKEW_SECS: u64 = 30;

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    /// Declared expiry, seconds since the Unix epoch
    expires_at: u64,
}

/// Single-entry token cache with expiry skew
#[derive(Default)]
pub struct TokenCache {
    slot: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached token if still fresh
    pub fn get(&self) -> Option<String> {
        self.get_at(epoch_now())
    }

    fn get_at(&self, now: u64) -> Option<String> {
        let slot = self.slot.lock().expect("token cache lock poisoned");
        slot.as_ref()
            .filter(|cached| cached.expires_at > now + EXPIRY_SKEW_SECS)
            .map(|cached| cached.token.clone())
    }

    /// Store a token with its declared expiry (epoch seconds)
    pub fn store(&self, token: String, expires_at: u64) {
        let mut slot = self.slot.lock().expect("token cache lock poisoned");
        *slot = Some(CachedToken { token, expires_at });
    }

    /// Drop the cached token
    pub fn invalidate(&self) {
        let mut slot = self.slot.lock().expect("token cache lock poisoned");
        *slot = None;
    }
}

fn epoch_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cache_misses() {
        let cache = TokenCache::new();
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_fresh_token_hits() {
        let cache = TokenCache::new();
        cache.store("token-a".to_string(), epoch_now() + 3600);
        assert_eq!(cache.get(), Some("token-a".to_string()));
    }

    #[test]
    fn test_token_is_stale_within_skew_window() {
        let cache = TokenCache::new();
        let now = epoch_now();

        // Expires in 10 seconds: inside the 30-second skew window
        cache.store("token-a".to_string(), now + 10);
        assert!(cache.get_at(now).is_none());

        // Expires in 31 seconds: just outside
        cache.store("token-b".to_string(), now + EXPIRY_SKEW_SECS + 1);
        assert_eq!(cache.get_at(now), Some("token-b".to_string()));
    }

    #[test]
    fn test_invalidate() {
        let cache = TokenCache::new();
        cache.store("token-a".to_string(), epoch_now() + 3600);
        cache.invalidate();
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_store_replaces_previous_token() {
        let cache = TokenCache::new();
        cache.store("token-a".to_string(), epoch_now() + 3600);
        cache.store("token-b".to_string(), epoch_now() + 3600);
        assert_eq!(cache.get(), Some("token-b".to_string()));
    }
}
