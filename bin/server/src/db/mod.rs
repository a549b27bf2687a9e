//! Persistence for the launch provider.
//!
//! PostgreSQL implementations of every store contract, plus [`Stores`], the
//! bundle handed to the provider builder.

pub mod context;
pub mod nonce;
pub mod platform;
pub mod state;

pub use context::PgContextPathStore;
pub use nonce::PgNonceStore;
pub use platform::PgPlatformRegistry;
pub use state::PgStateStore;

use chrono::{DateTime, TimeDelta, Utc};
use launchgate_provider::{
    ContextPathStore, MemoryContextPathStore, MemoryNonceStore, MemoryPlatformRegistry,
    MemoryStateStore, NonceStore, PlatformRegistry, StateReplayStore, StoreError,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

/// The stores a provider reads and writes.
#[derive(Clone)]
pub struct Stores {
    pub platforms: Arc<dyn PlatformRegistry>,
    pub states: Arc<dyn StateReplayStore>,
    pub nonces: Arc<dyn NonceStore>,
    pub paths: Arc<dyn ContextPathStore>,
}

impl Stores {
    /// Empty in-process stores.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            platforms: Arc::new(MemoryPlatformRegistry::new()),
            states: Arc::new(MemoryStateStore::new()),
            nonces: Arc::new(MemoryNonceStore::new()),
            paths: Arc::new(MemoryContextPathStore::new()),
        }
    }

    /// PostgreSQL stores sharing `pool`.
    #[must_use]
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            platforms: Arc::new(PgPlatformRegistry::new(pool.clone())),
            states: Arc::new(PgStateStore::new(pool.clone())),
            nonces: Arc::new(PgNonceStore::new(pool.clone())),
            paths: Arc::new(PgContextPathStore::new(pool)),
        }
    }

    #[must_use]
    pub fn with_platforms(mut self, platforms: Arc<dyn PlatformRegistry>) -> Self {
        self.platforms = platforms;
        self
    }

    #[must_use]
    pub fn with_states(mut self, states: Arc<dyn StateReplayStore>) -> Self {
        self.states = states;
        self
    }
}

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable {
        details: e.to_string(),
    }
}

fn expires_at(ttl: Duration) -> Result<DateTime<Utc>, StoreError> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| StoreError::Unavailable {
            details: format!("ttl out of range: {ttl:?}"),
        })
}
