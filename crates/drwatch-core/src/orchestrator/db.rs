//! Persistent storage for failover executions using redb.
//!
//! # Table design
//!
//! `EXECUTIONS` maps the 16 UUID bytes of an execution to its JSON-encoded
//! [`ExecutionContext`].
//!
//! `SCHEDULE` is an index of live executions with a 24-byte composite key:
//! ```text
//! [ next_step_at_ms: u64 big-endian (8 bytes) | uuid: 16 bytes ]
//! ```
//! Big-endian timestamps make byte order equal time order, so a range scan
//! `..=due_upper_bound(now)` yields every execution due by `now`, oldest
//! first. Terminal executions are removed from the index.

use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use redb::{Database, DatabaseError, ReadableTable, ReadableTableMetadata, TableDefinition};
use uuid::Uuid;

use crate::error::{DrError, Result};

use super::context::ExecutionContext;

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

const EXECUTIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("executions");
const SCHEDULE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("schedule");

const LOCK_RETRY: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Key helpers
// ---------------------------------------------------------------------------

fn schedule_key(ts: DateTime<Utc>, id: Uuid) -> [u8; 24] {
    let mut key = [0u8; 24];
    let ms = ts.timestamp_millis().max(0) as u64;
    key[..8].copy_from_slice(&ms.to_be_bytes());
    key[8..].copy_from_slice(id.as_bytes());
    key
}

/// Upper bound for a range scan returning all executions due by `now`.
///
/// The UUID suffix is `0xff` × 16, greater than any valid UUID.
fn due_upper_bound(now: DateTime<Utc>) -> [u8; 24] {
    let mut key = [0u8; 24];
    let ms = now.timestamp_millis().max(0) as u64;
    key[..8].copy_from_slice(&ms.to_be_bytes());
    key[8..].fill(0xff);
    key
}

fn id_from_schedule_key(key: &[u8]) -> Result<Uuid> {
    Uuid::from_slice(&key[8..]).map_err(|e| DrError::Store(format!("corrupt schedule key: {e}")))
}

fn store_err(e: impl std::fmt::Display) -> DrError {
    DrError::Store(e.to_string())
}

fn decode(bytes: &[u8]) -> Result<ExecutionContext> {
    serde_json::from_slice(bytes).map_err(store_err)
}

// ---------------------------------------------------------------------------
// ExecutionDb
// ---------------------------------------------------------------------------

/// Persistent store for [`ExecutionContext`] records.
pub struct ExecutionDb {
    db: Database,
}

impl ExecutionDb {
    /// Open or create the redb database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_waiting(path, Duration::ZERO)
    }

    /// Like [`Self::open`], but retries for up to `patience` while another
    /// process holds the file lock.
    pub fn open_waiting(path: &Path, patience: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            crate::io::ensure_dir(parent)?;
        }
        let deadline = Instant::now() + patience;
        let db = loop {
            match Database::create(path) {
                Err(DatabaseError::DatabaseAlreadyOpen) if Instant::now() < deadline => {
                    std::thread::sleep(LOCK_RETRY);
                }
                other => break other.map_err(store_err)?,
            }
        };
        let wt = db.begin_write().map_err(store_err)?;
        wt.open_table(EXECUTIONS).map_err(store_err)?;
        wt.open_table(SCHEDULE).map_err(store_err)?;
        wt.commit().map_err(store_err)?;
        Ok(Self { db })
    }

    /// Insert a new execution.
    pub fn insert(&self, ctx: &ExecutionContext) -> Result<()> {
        self.insert_inner(ctx, false)
    }

    /// Insert a new execution unless another one is still live.
    ///
    /// The check and the insert share one write transaction, so two racing
    /// callers cannot both succeed.
    pub fn insert_exclusive(&self, ctx: &ExecutionContext) -> Result<()> {
        self.insert_inner(ctx, true)
    }

    fn insert_inner(&self, ctx: &ExecutionContext, exclusive: bool) -> Result<()> {
        let id = ctx.execution_id;
        let value = serde_json::to_vec(ctx).map_err(store_err)?;
        let wt = self.db.begin_write().map_err(store_err)?;
        {
            let mut schedule = wt.open_table(SCHEDULE).map_err(store_err)?;
            if exclusive {
                let live = schedule
                    .first()
                    .map_err(store_err)?
                    .map(|(k, _)| k.value().to_vec());
                if let Some(key) = live {
                    let other = id_from_schedule_key(&key)?;
                    return Err(DrError::ExecutionInProgress(other.to_string()));
                }
            }

            let mut executions = wt.open_table(EXECUTIONS).map_err(store_err)?;
            if executions
                .get(id.as_bytes().as_slice())
                .map_err(store_err)?
                .is_some()
            {
                return Err(DrError::Store(format!("execution {id} already exists")));
            }
            executions
                .insert(id.as_bytes().as_slice(), value.as_slice())
                .map_err(store_err)?;
            if !ctx.is_terminal() {
                let key = schedule_key(ctx.next_step_at, id);
                schedule
                    .insert(key.as_slice(), [].as_slice())
                    .map_err(store_err)?;
            }
        }
        wt.commit().map_err(store_err)?;
        Ok(())
    }

    /// Persist `ctx` and move its schedule entry to `next_step_at`, dropping
    /// the entry once the execution is terminal.
    pub fn save(&self, ctx: &ExecutionContext) -> Result<()> {
        let id = ctx.execution_id;
        let value = serde_json::to_vec(ctx).map_err(store_err)?;
        let wt = self.db.begin_write().map_err(store_err)?;
        {
            let mut executions = wt.open_table(EXECUTIONS).map_err(store_err)?;
            let previous = executions
                .get(id.as_bytes().as_slice())
                .map_err(store_err)?
                .map(|v| v.value().to_vec())
                .ok_or_else(|| DrError::ExecutionNotFound(id.to_string()))?;
            let previous = decode(&previous)?;

            let mut schedule = wt.open_table(SCHEDULE).map_err(store_err)?;
            let old_key = schedule_key(previous.next_step_at, id);
            schedule.remove(old_key.as_slice()).map_err(store_err)?;
            if !ctx.is_terminal() {
                let key = schedule_key(ctx.next_step_at, id);
                schedule
                    .insert(key.as_slice(), [].as_slice())
                    .map_err(store_err)?;
            }

            executions
                .insert(id.as_bytes().as_slice(), value.as_slice())
                .map_err(store_err)?;
        }
        wt.commit().map_err(store_err)?;
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Result<ExecutionContext> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(EXECUTIONS).map_err(store_err)?;
        let value = table
            .get(id.as_bytes().as_slice())
            .map_err(store_err)?
            .ok_or_else(|| DrError::ExecutionNotFound(id.to_string()))?;
        decode(value.value())
    }

    /// Live executions whose `next_step_at` is `<= now`, oldest first.
    pub fn range_due(&self, now: DateTime<Utc>) -> Result<Vec<ExecutionContext>> {
        let upper = due_upper_bound(now);
        let rt = self.db.begin_read().map_err(store_err)?;
        let schedule = rt.open_table(SCHEDULE).map_err(store_err)?;
        let executions = rt.open_table(EXECUTIONS).map_err(store_err)?;

        let mut result = Vec::new();
        for entry in schedule.range(..=upper.as_slice()).map_err(store_err)? {
            let (k, _) = entry.map_err(store_err)?;
            let id = id_from_schedule_key(k.value())?;
            if let Some(v) = executions.get(id.as_bytes().as_slice()).map_err(store_err)? {
                result.push(decode(v.value())?);
            }
        }
        Ok(result)
    }

    /// Earliest `next_step_at` among live executions.
    pub fn next_due(&self) -> Result<Option<DateTime<Utc>>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let schedule = rt.open_table(SCHEDULE).map_err(store_err)?;
        let first = schedule.first().map_err(store_err)?;
        Ok(first.and_then(|(k, _)| {
            let mut ms = [0u8; 8];
            ms.copy_from_slice(&k.value()[..8]);
            DateTime::from_timestamp_millis(u64::from_be_bytes(ms) as i64)
        }))
    }

    /// Number of executions that have not reached a terminal state.
    pub fn active_count(&self) -> Result<u64> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let schedule = rt.open_table(SCHEDULE).map_err(store_err)?;
        schedule.len().map_err(store_err)
    }

    /// List all executions, newest first.
    pub fn list_all(&self) -> Result<Vec<ExecutionContext>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(EXECUTIONS).map_err(store_err)?;

        let mut result = Vec::new();
        for entry in table.iter().map_err(store_err)? {
            let (_, v) = entry.map_err(store_err)?;
            result.push(decode(v.value())?);
        }
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
