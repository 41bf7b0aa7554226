pub mod kv;
pub mod memory;

pub use kv::FileStorage;
pub use memory::MemoryStorage;

use crate::error::Result;
use crate::ledger::DebitPlan;
use crate::state::{
    AgentId, AgentNode, AgentQuotaKey, BetEntry, BillNo, DrawKey, DrawResult, DrawWindow,
    GlobalQuotaKey, OverrideKey, QuotaOverride, RateTable, Role, TicketLimits,
};
use chrono::NaiveDate;
use std::collections::HashSet;

/// Selection of persisted entries by settlement date, draw and agent.
///
/// Only valid entries ever match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFilter {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub draw: Option<DrawKey>,
    /// `None` matches every agent.
    pub agents: Option<HashSet<AgentId>>,
}

impl EntryFilter {
    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        EntryFilter {
            from,
            to,
            draw: None,
            agents: None,
        }
    }

    pub fn matches(&self, entry: &BetEntry) -> bool {
        entry.is_valid
            && entry.effective_date >= self.from
            && entry.effective_date <= self.to
            && self.draw.as_ref().map_or(true, |d| *d == entry.draw)
            && self
                .agents
                .as_ref()
                .map_or(true, |a| a.contains(&entry.created_by))
    }
}

/// Keyed persistence collaborator for the back office.
///
/// Implementations must preserve:
/// - Strictly increasing bill numbers, never reused, under concurrent callers
/// - `commit_bill` as one critical section: quota re-check, decrement and row
///   insert either all happen or none do
/// - Floor-at-zero remaining counters, created lazily from their ceiling
/// - A mutation that returns an error leaves no trace, in memory or on disk
pub trait Storage: Send + Sync {
    fn get_window(&self, draw: &DrawKey, role: &Role) -> Result<Option<DrawWindow>>;

    /// Insert or replace the window for its (draw, role).
    fn put_window(&self, window: DrawWindow) -> Result<()>;

    fn is_date_blocked(&self, draw: &DrawKey, date: NaiveDate) -> Result<bool>;

    fn block_date(&self, draw: DrawKey, date: NaiveDate) -> Result<()>;

    fn get_ticket_limits(&self) -> Result<Option<TicketLimits>>;

    fn put_ticket_limits(&self, limits: TicketLimits) -> Result<()>;

    /// Active override for the key; inactive records are invisible.
    fn get_override(&self, key: &OverrideKey) -> Result<Option<QuotaOverride>>;

    fn put_override(&self, o: QuotaOverride) -> Result<()>;

    /// Stored global remaining, `None` before the first debit.
    fn global_remaining(&self, key: &GlobalQuotaKey) -> Result<Option<u32>>;

    /// Stored per-agent remaining, `None` before the first debit.
    fn agent_remaining(&self, key: &AgentQuotaKey) -> Result<Option<u32>>;

    /// Atomically increment and fetch the bill sequence.
    fn next_bill_no(&self) -> Result<BillNo>;

    /// Re-validate and apply `plan`, then insert `entries`, in one critical
    /// section. Returns the stored entries with their ids assigned.
    fn commit_bill(&self, entries: Vec<BetEntry>, plan: &DebitPlan) -> Result<Vec<BetEntry>>;

    fn get_entry(&self, id: u64) -> Result<Option<BetEntry>>;

    /// Move an entry's count from `from` to `to`, re-validating and applying
    /// `plan` in the same critical section. `NotFound` if missing.
    fn set_entry_count(&self, id: u64, from: u32, to: u32, plan: &DebitPlan) -> Result<BetEntry>;

    /// Mark an entry invalid; `NotFound` if missing.
    fn invalidate_entry(&self, id: u64) -> Result<BetEntry>;

    /// Remove every row of a bill and return how many were removed.
    fn delete_bill(&self, bill_no: BillNo) -> Result<usize>;

    fn query_entries(&self, filter: &EntryFilter) -> Result<Vec<BetEntry>>;

    fn get_result(&self, date: NaiveDate, draw: &DrawKey) -> Result<Option<DrawResult>>;

    /// Insert or replace the result for its (date, draw).
    fn put_result(&self, result: DrawResult) -> Result<()>;

    fn get_rate_table(&self, agent: &str, draw: &DrawKey) -> Result<Option<RateTable>>;

    fn put_rate_table(&self, table: RateTable) -> Result<()>;

    fn agents(&self) -> Result<Vec<AgentNode>>;

    fn put_agent(&self, node: AgentNode) -> Result<()>;
}
