//! Current resource path per (launch context, user).
//!
//! A launch records the path it landed on. When the tool later redirects to
//! a new resource, the path is replaced so the next request authenticated
//! with the same ltik resolves to the resource the user navigated to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use launchgate_core::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextPathRecord {
    pub context_id: String,
    pub user: String,
    pub path: String,
    pub updated_at: DateTime<Utc>,
}

/// Persistence for context path records.
#[async_trait]
pub trait ContextPathStore: Send + Sync {
    /// Returns the current path for (context, user), if any.
    async fn get(&self, context_id: &str, user: &str) -> Result<Option<String>, StoreError>;

    /// Creates or replaces the path for (context, user).
    async fn set(&self, context_id: &str, user: &str, path: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryContextPathStore {
    records: RwLock<HashMap<(String, String), ContextPathRecord>>,
}

impl MemoryContextPathStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContextPathStore for MemoryContextPathStore {
    async fn get(&self, context_id: &str, user: &str) -> Result<Option<String>, StoreError> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records
            .get(&(context_id.to_string(), user.to_string()))
            .map(|r| r.path.clone()))
    }

    async fn set(&self, context_id: &str, user: &str, path: &str) -> Result<(), StoreError> {
        let record = ContextPathRecord {
            context_id: context_id.to_string(),
            user: user.to_string(),
            path: path.to_string(),
            updated_at: Utc::now(),
        };
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((record.context_id.clone(), record.user.clone()), record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_replaces_previous_path() {
        let store = MemoryContextPathStore::new();
        assert!(store.get("ctx", "u1").await.expect("get").is_none());

        store.set("ctx", "u1", "/week-1").await.expect("set");
        store.set("ctx", "u1", "/week-2").await.expect("set");
        store.set("ctx", "u2", "/intro").await.expect("set");

        assert_eq!(store.get("ctx", "u1").await.expect("get").as_deref(), Some("/week-2"));
        assert_eq!(store.get("ctx", "u2").await.expect("get").as_deref(), Some("/intro"));
    }
}
