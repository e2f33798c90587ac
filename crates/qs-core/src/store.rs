//! Entity Store: read/write access to persisted records
//!
//! The decision core never owns persistence. Callers plug a backend in
//! through [`EntityStore`]; [`MemoryStore`] is the in-process reference
//! implementation used by the service and the tests.
use crate::data_model::{GoldenBatch, ProcessRun};
use crate::error::{QsError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A persisted entity keyed by id
pub trait Record: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;
    fn created_date(&self) -> DateTime<Utc>;
}

impl Record for GoldenBatch {
    fn id(&self) -> &str {
        &self.id
    }

    fn created_date(&self) -> DateTime<Utc> {
        self.created_date
    }
}

impl Record for ProcessRun {
    fn id(&self) -> &str {
        &self.id
    }

    fn created_date(&self) -> DateTime<Utc> {
        self.created_date
    }
}

/// Ordering for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

#[async_trait]
pub trait EntityStore<T: Record>: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<T>>;

    /// List records by creation date, optionally truncated to `limit`
    async fn list(&self, order: ListOrder, limit: Option<usize>) -> Result<Vec<T>>;

    /// Insert a new record; fails if the id is taken
    async fn create(&self, record: T) -> Result<T>;

    /// Replace an existing record; fails if the id is unknown
    async fn update(&self, record: T) -> Result<T>;
}

/// In-memory store guarded by an async read/write lock
pub struct MemoryStore<T: Record> {
    records: RwLock<HashMap<String, T>>,
}

impl<T: Record> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the record with `updated` only if the stored record satisfies
    /// `expected`. Returns `false` without writing when the check fails.
    ///
    /// Check and write happen under one write lock, so concurrent callers
    /// racing on the same record see exactly one winner.
    pub async fn replace_if<F>(&self, updated: T, expected: F) -> Result<bool>
    where
        F: FnOnce(&T) -> bool + Send,
    {
        let mut records = self.records.write().await;
        match records.get_mut(updated.id()) {
            Some(current) if expected(current) => {
                *current = updated;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(QsError::NotFound(updated.id().to_string())),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl<T: Record> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Record> EntityStore<T> for MemoryStore<T> {
    async fn get(&self, id: &str) -> Result<Option<T>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn list(&self, order: ListOrder, limit: Option<usize>) -> Result<Vec<T>> {
        let mut items: Vec<T> = self.records.read().await.values().cloned().collect();
        items.sort_by(|a, b| {
            a.created_date()
                .cmp(&b.created_date())
                .then_with(|| a.id().cmp(b.id()))
        });
        if order == ListOrder::NewestFirst {
            items.reverse();
        }
        if let Some(limit) = limit {
            items.truncate(limit);
        }
        Ok(items)
    }

    async fn create(&self, record: T) -> Result<T> {
        let mut records = self.records.write().await;
        if records.contains_key(record.id()) {
            return Err(QsError::StoreError(format!("duplicate id {}", record.id())));
        }
        tracing::debug!(id = record.id(), "record created");
        records.insert(record.id().to_string(), record.clone());
        Ok(record)
    }

    async fn update(&self, record: T) -> Result<T> {
        let mut records = self.records.write().await;
        match records.get_mut(record.id()) {
            Some(current) => {
                *current = record.clone();
                Ok(record)
            }
            None => Err(QsError::NotFound(record.id().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_model::ParameterSet;

    fn run_at(ts: &str) -> ProcessRun {
        ProcessRun::new("PX-100", "Line 1", ts.parse().unwrap(), ParameterSet::new())
    }

    #[tokio::test]
    async fn test_list_order_and_limit() {
        let store: MemoryStore<ProcessRun> = MemoryStore::new();
        let old = store.create(run_at("2026-01-01T00:00:00Z")).await.unwrap();
        let mid = store.create(run_at("2026-02-01T00:00:00Z")).await.unwrap();
        let new = store.create(run_at("2026-03-01T00:00:00Z")).await.unwrap();

        let newest = store.list(ListOrder::NewestFirst, Some(2)).await.unwrap();
        assert_eq!(newest.len(), 2);
        assert_eq!(newest[0].id, new.id);
        assert_eq!(newest[1].id, mid.id);

        let oldest = store.list(ListOrder::OldestFirst, None).await.unwrap();
        assert_eq!(oldest[0].id, old.id);
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let store: MemoryStore<ProcessRun> = MemoryStore::new();
        let run = store.create(run_at("2026-01-01T00:00:00Z")).await.unwrap();
        let err = store.create(run).await.unwrap_err();
        assert_eq!(err.code(), "STORE");
    }

    #[tokio::test]
    async fn test_replace_if_only_on_match() {
        let store: MemoryStore<ProcessRun> = MemoryStore::new();
        let mut run = store.create(run_at("2026-01-01T00:00:00Z")).await.unwrap();
        run.operator = Some("amy".to_string());

        let swapped = store
            .replace_if(run.clone(), |current| current.operator.is_none())
            .await
            .unwrap();
        assert!(swapped);

        let swapped_again = store
            .replace_if(run.clone(), |current| current.operator.is_none())
            .await
            .unwrap();
        assert!(!swapped_again);
    }

    #[tokio::test]
    async fn test_update_unknown_is_not_found() {
        let store: MemoryStore<ProcessRun> = MemoryStore::new();
        let err = store.update(run_at("2026-01-01T00:00:00Z")).await.unwrap_err();
        assert!(matches!(err, QsError::NotFound(_)));
    }
}
