//! Single-use identity token nonces.
//!
//! The login flow sends a fresh nonce with every authorization request and
//! the platform echoes it inside the identity token. Recording each nonce on
//! first sight rejects a captured identity token posted a second time.

use async_trait::async_trait;
use launchgate_core::Result;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::StoreError;

/// How long a seen nonce is remembered.
pub const NONCE_TTL: Duration = Duration::from_secs(10 * 60);

/// Storage for nonces that have already been presented.
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Records `nonce`. Returns `false` if it was already recorded and has
    /// not expired. Must be atomic per nonce.
    async fn claim(&self, nonce: &str, ttl: Duration) -> Result<bool, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryNonceStore {
    seen: Mutex<HashMap<String, Instant>>,
}

impl MemoryNonceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NonceStore for MemoryNonceStore {
    async fn claim(&self, nonce: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        seen.retain(|_, expires_at| *expires_at > now);
        if seen.contains_key(nonce) {
            return Ok(false);
        }
        seen.insert(nonce.to_string(), now + ttl);
        Ok(true)
    }
}
