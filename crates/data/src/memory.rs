//! In-memory trade store.
//!
//! Backs paper runs and tests so the reconciliation pipeline can be
//! exercised without a database, mirroring how paper execution shims the
//! broker.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;

use crate::models::{LocalOrderRecord, OrderChanges};
use crate::store::LocalTradeStore;

/// Trade store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryTradeStore {
    records: RwLock<HashMap<i64, LocalOrderRecord>>,
    next_id: RwLock<i64>,
}

impl MemoryTradeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record, assigning the next id, and returns it.
    pub async fn insert(&self, mut record: LocalOrderRecord) -> LocalOrderRecord {
        let mut next = self.next_id.write().await;
        *next += 1;
        record.id = *next;
        self.records.write().await.insert(record.id, record.clone());
        record
    }

    /// Snapshot of every record, ordered by id.
    pub async fn all(&self) -> Vec<LocalOrderRecord> {
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        records.sort_by_key(|r| r.id);
        records
    }
}

#[async_trait]
impl LocalTradeStore for MemoryTradeStore {
    async fn trades_in_window(&self, since: NaiveDate) -> Result<Vec<LocalOrderRecord>> {
        let mut records: Vec<_> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.entered_at.date_naive() >= since)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    async fn open_positions(&self) -> Result<Vec<LocalOrderRecord>> {
        let mut records: Vec<_> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.is_open())
            .cloned()
            .collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<LocalOrderRecord>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn update(&self, id: i64, changes: &OrderChanges) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| anyhow!("no record with id {id}"))?;
        changes.apply_to(record);
        Ok(())
    }
}
