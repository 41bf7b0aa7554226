use crate::config::Config;
use crate::error::{Error, Result};
use crate::ledger::DebitPlan;
use crate::state::{
    AgentNode, AgentQuotaKey, BetEntry, BillNo, DrawKey, DrawResult, DrawWindow, GlobalQuotaKey,
    OverrideKey, QuotaOverride, RateTable, Role, State, TicketLimits,
};
use crate::storage::{EntryFilter, MemoryStorage, Storage};
use chrono::NaiveDate;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File-backed storage: an in-memory store plus a snapshot written on every
/// mutation.
///
/// A mutation is applied to a copy of the state, the copy is written out, and
/// only then does it replace the live state. A failed write therefore leaves
/// both memory and disk as they were.
///
/// Files:
/// - `state.bin`: State snapshot (bincode serialized)
/// - `state.bin.tmp`: Temporary file for atomic snapshot writes
pub struct FileStorage {
    inner: MemoryStorage,
    state_path: PathBuf,
    state_tmp_path: PathBuf,
}

impl FileStorage {
    /// Open storage at the config's data directory, loading any snapshot.
    pub fn open(config: &Config) -> Result<Self> {
        FileStorage::with_path(config.get_state_path())
    }

    /// Open storage at a custom snapshot path (for testing)
    pub fn with_path(state_path: PathBuf) -> Result<Self> {
        let state_tmp_path = state_path.with_extension("bin.tmp");
        let state = load_state(&state_path)?.unwrap_or_default();
        Ok(FileStorage {
            inner: MemoryStorage::from_state(state),
            state_path,
            state_tmp_path,
        })
    }

    /// Ensure the data directory exists
    fn ensure_dir(&self) -> Result<()> {
        if let Some(parent) = self.state_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Storage(format!("Failed to create data directory: {}", e)))?;
        }
        Ok(())
    }

    /// Write a snapshot atomically (write to temp file, fsync, rename)
    fn write_snapshot(&self, state: &State) -> Result<()> {
        self.ensure_dir()?;

        let state_bytes = bincode::serialize(state)
            .map_err(|e| Error::Storage(format!("Failed to serialize state: {}", e)))?;

        let mut file = File::create(&self.state_tmp_path)
            .map_err(|e| Error::Storage(format!("Failed to create temp state file: {}", e)))?;
        file.write_all(&state_bytes)
            .map_err(|e| Error::Storage(format!("Failed to write state: {}", e)))?;

        // Fsync before rename (crash safety)
        file.sync_all()
            .map_err(|e| Error::Storage(format!("Failed to fsync temp state file: {}", e)))?;
        drop(file);

        fs::rename(&self.state_tmp_path, &self.state_path)
            .map_err(|e| Error::Storage(format!("Failed to rename temp state file: {}", e)))?;

        // Fsync parent directory (ensure rename is persisted)
        if let Some(parent) = self.state_path.parent() {
            let parent_file = File::open(parent)
                .map_err(|e| Error::Storage(format!("Failed to open parent directory: {}", e)))?;
            parent_file
                .sync_all()
                .map_err(|e| Error::Storage(format!("Failed to fsync parent directory: {}", e)))?;
        }

        debug!(path = %self.state_path.display(), bytes = state_bytes.len(), "snapshot written");
        Ok(())
    }

    /// Snapshot the current state as is.
    pub fn persist(&self) -> Result<()> {
        self.mutate(|_| Ok(()))
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut State) -> Result<R>) -> Result<R> {
        self.inner.transact(f, |next| self.write_snapshot(next))
    }
}

/// Load a snapshot; `None` if no file exists yet.
pub fn load_state(path: &Path) -> Result<Option<State>> {
    if !path.exists() {
        return Ok(None);
    }

    let mut file = File::open(path)
        .map_err(|e| Error::Storage(format!("Failed to open state file: {}", e)))?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)
        .map_err(|e| Error::Storage(format!("Failed to read state file: {}", e)))?;

    let state: State = bincode::deserialize(&data)
        .map_err(|e| Error::Storage(format!("Failed to deserialize state: {}", e)))?;
    Ok(Some(state))
}

impl Storage for FileStorage {
    fn get_window(&self, draw: &DrawKey, role: &Role) -> Result<Option<DrawWindow>> {
        self.inner.get_window(draw, role)
    }

    fn put_window(&self, window: DrawWindow) -> Result<()> {
        self.mutate(|s| s.insert_window(window))
    }

    fn is_date_blocked(&self, draw: &DrawKey, date: NaiveDate) -> Result<bool> {
        self.inner.is_date_blocked(draw, date)
    }

    fn block_date(&self, draw: DrawKey, date: NaiveDate) -> Result<()> {
        self.mutate(|s| {
            s.blocked_dates.insert((draw, date));
            Ok(())
        })
    }

    fn get_ticket_limits(&self) -> Result<Option<TicketLimits>> {
        self.inner.get_ticket_limits()
    }

    fn put_ticket_limits(&self, limits: TicketLimits) -> Result<()> {
        self.mutate(|s| {
            s.ticket_limits = Some(limits);
            Ok(())
        })
    }

    fn get_override(&self, key: &OverrideKey) -> Result<Option<QuotaOverride>> {
        self.inner.get_override(key)
    }

    fn put_override(&self, o: QuotaOverride) -> Result<()> {
        self.mutate(|s| {
            s.insert_override(o);
            Ok(())
        })
    }

    fn global_remaining(&self, key: &GlobalQuotaKey) -> Result<Option<u32>> {
        self.inner.global_remaining(key)
    }

    fn agent_remaining(&self, key: &AgentQuotaKey) -> Result<Option<u32>> {
        self.inner.agent_remaining(key)
    }

    fn next_bill_no(&self) -> Result<BillNo> {
        self.inner.next_bill_no()
    }

    fn commit_bill(&self, entries: Vec<BetEntry>, plan: &DebitPlan) -> Result<Vec<BetEntry>> {
        self.mutate(|s| s.commit_bill(entries, plan))
    }

    fn get_entry(&self, id: u64) -> Result<Option<BetEntry>> {
        self.inner.get_entry(id)
    }

    fn set_entry_count(&self, id: u64, from: u32, to: u32, plan: &DebitPlan) -> Result<BetEntry> {
        self.mutate(|s| s.set_entry_count(id, from, to, plan))
    }

    fn invalidate_entry(&self, id: u64) -> Result<BetEntry> {
        self.mutate(|s| s.invalidate_entry(id))
    }

    fn delete_bill(&self, bill_no: BillNo) -> Result<usize> {
        self.mutate(|s| Ok(s.remove_bill(bill_no)))
    }

    fn query_entries(&self, filter: &EntryFilter) -> Result<Vec<BetEntry>> {
        self.inner.query_entries(filter)
    }

    fn get_result(&self, date: NaiveDate, draw: &DrawKey) -> Result<Option<DrawResult>> {
        self.inner.get_result(date, draw)
    }

    fn put_result(&self, result: DrawResult) -> Result<()> {
        self.mutate(|s| {
            s.insert_result(result);
            Ok(())
        })
    }

    fn get_rate_table(&self, agent: &str, draw: &DrawKey) -> Result<Option<RateTable>> {
        self.inner.get_rate_table(agent, draw)
    }

    fn put_rate_table(&self, table: RateTable) -> Result<()> {
        self.mutate(|s| {
            s.insert_rate_table(table);
            Ok(())
        })
    }

    fn agents(&self) -> Result<Vec<AgentNode>> {
        self.inner.agents()
    }

    fn put_agent(&self, node: AgentNode) -> Result<()> {
        self.mutate(|s| {
            s.insert_agent(node);
            Ok(())
        })
    }
}
