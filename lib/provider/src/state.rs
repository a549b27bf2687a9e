//! Single-use records of in-flight login attempts.
//!
//! # Lifecycle
//!
//! 1. The login endpoint mints an unguessable state token and stores the
//!    issuer plus any extra query parameters of the login request.
//! 2. The platform posts the identity token back with the same `state`.
//! 3. The gatekeeper consumes the record: read and delete in one step.
//!
//! `consume` must be linearizable per state: when concurrent requests carry
//! the same state, at most one of them receives the record. Expiry is the
//! store's job; the gatekeeper never checks record age itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use launchgate_core::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::StoreError;

/// How long a login attempt stays redeemable.
pub const STATE_TTL: Duration = Duration::from_secs(60);

/// An in-flight login attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    pub state: String,
    pub issuer: String,
    /// Query parameters of the login request to replay after the launch.
    pub query: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl StateRecord {
    #[must_use]
    pub fn new(
        state: impl Into<String>,
        issuer: impl Into<String>,
        query: BTreeMap<String, String>,
    ) -> Self {
        Self {
            state: state.into(),
            issuer: issuer.into(),
            query,
            created_at: Utc::now(),
        }
    }
}

/// Storage for in-flight login attempts.
///
/// Implementations must make `consume` atomic: a database should use a
/// single `DELETE ... RETURNING`, an in-memory store a mutex-guarded remove.
#[async_trait]
pub trait StateReplayStore: Send + Sync {
    /// Stores a login attempt that expires after `ttl`.
    async fn put(&self, record: StateRecord, ttl: Duration) -> Result<(), StoreError>;

    /// Atomically reads and deletes the record for `state`.
    ///
    /// Returns `None` when no unexpired record exists, including when another
    /// caller already consumed it.
    async fn consume(&self, state: &str) -> Result<Option<StateRecord>, StoreError>;
}

/// Mutex-guarded in-process state store.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    records: Mutex<HashMap<String, (StateRecord, Instant)>>,
}

impl MemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops expired records, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let before = records.len();
        let now = Instant::now();
        records.retain(|_, (_, expires_at)| *expires_at > now);
        before - records.len()
    }
}

#[async_trait]
impl StateReplayStore for MemoryStateStore {
    async fn put(&self, record: StateRecord, ttl: Duration) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.insert(record.state.clone(), (record, Instant::now() + ttl));
        Ok(())
    }

    async fn consume(&self, state: &str) -> Result<Option<StateRecord>, StoreError> {
        let removed = self
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(state);
        Ok(removed
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(record, _)| record))
    }
}
