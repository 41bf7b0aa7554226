use crate::error::Result;
use crate::ledger::DebitPlan;
use crate::state::{
    AgentNode, AgentQuotaKey, BetEntry, BillNo, DrawKey, DrawResult, DrawWindow, GlobalQuotaKey,
    OverrideKey, QuotaOverride, RateTable, Role, State, TicketLimits,
};
use crate::storage::{EntryFilter, Storage};
use chrono::NaiveDate;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// In-process storage: one `State` behind a read-write lock.
///
/// The bill sequence lives outside the lock so issuing a number never waits
/// on a commit in progress.
#[derive(Debug)]
pub struct MemoryStorage {
    state: RwLock<State>,
    bill_seq: AtomicU64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage::from_state(State::new())
    }

    /// Resume from a loaded snapshot; the sequence continues after its counter.
    pub fn from_state(state: State) -> Self {
        let bill_seq = AtomicU64::new(state.bill_counter);
        MemoryStorage {
            state: RwLock::new(state),
            bill_seq,
        }
    }

    /// Copy of the current state with the live bill counter folded in.
    pub fn snapshot(&self) -> State {
        let mut state = self.state.read().clone();
        state.bill_counter = self.bill_seq.load(Ordering::SeqCst);
        state
    }

    fn write<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        f(&mut self.state.write())
    }

    /// Apply `f` to a copy of the state, hand the copy to `durable`, and only
    /// then make it live.
    ///
    /// If either step fails the live state is untouched. The write lock is
    /// held throughout, so `durable` sees copies in commit order.
    pub fn transact<R>(
        &self,
        f: impl FnOnce(&mut State) -> Result<R>,
        durable: impl FnOnce(&State) -> Result<()>,
    ) -> Result<R> {
        let mut guard = self.state.write();
        let mut next = guard.clone();
        let out = f(&mut next)?;
        next.bill_counter = next.bill_counter.max(self.bill_seq.load(Ordering::SeqCst));
        durable(&next)?;
        *guard = next;
        Ok(out)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        MemoryStorage::new()
    }
}

impl Storage for MemoryStorage {
    fn get_window(&self, draw: &DrawKey, role: &Role) -> Result<Option<DrawWindow>> {
        Ok(self.state.read().get_window(draw, role).cloned())
    }

    fn put_window(&self, window: DrawWindow) -> Result<()> {
        self.write(|s| s.insert_window(window))
    }

    fn is_date_blocked(&self, draw: &DrawKey, date: NaiveDate) -> Result<bool> {
        Ok(self.state.read().is_date_blocked(draw, date))
    }

    fn block_date(&self, draw: DrawKey, date: NaiveDate) -> Result<()> {
        self.write(|s| s.blocked_dates.insert((draw, date)));
        Ok(())
    }

    fn get_ticket_limits(&self) -> Result<Option<TicketLimits>> {
        Ok(self.state.read().ticket_limits.clone())
    }

    fn put_ticket_limits(&self, limits: TicketLimits) -> Result<()> {
        self.write(|s| s.ticket_limits = Some(limits));
        Ok(())
    }

    fn get_override(&self, key: &OverrideKey) -> Result<Option<QuotaOverride>> {
        Ok(self.state.read().get_active_override(key).cloned())
    }

    fn put_override(&self, o: QuotaOverride) -> Result<()> {
        self.write(|s| s.insert_override(o));
        Ok(())
    }

    fn global_remaining(&self, key: &GlobalQuotaKey) -> Result<Option<u32>> {
        Ok(self.state.read().global_quota.get(key).copied())
    }

    fn agent_remaining(&self, key: &AgentQuotaKey) -> Result<Option<u32>> {
        Ok(self.state.read().agent_quota.get(key).copied())
    }

    fn next_bill_no(&self) -> Result<BillNo> {
        Ok(BillNo(self.bill_seq.fetch_add(1, Ordering::SeqCst) + 1))
    }

    fn commit_bill(&self, entries: Vec<BetEntry>, plan: &DebitPlan) -> Result<Vec<BetEntry>> {
        self.write(|s| s.commit_bill(entries, plan))
    }

    fn get_entry(&self, id: u64) -> Result<Option<BetEntry>> {
        Ok(self.state.read().get_entry(id).cloned())
    }

    fn set_entry_count(&self, id: u64, from: u32, to: u32, plan: &DebitPlan) -> Result<BetEntry> {
        self.write(|s| s.set_entry_count(id, from, to, plan))
    }

    fn invalidate_entry(&self, id: u64) -> Result<BetEntry> {
        self.write(|s| s.invalidate_entry(id))
    }

    fn delete_bill(&self, bill_no: BillNo) -> Result<usize> {
        Ok(self.write(|s| s.remove_bill(bill_no)))
    }

    fn query_entries(&self, filter: &EntryFilter) -> Result<Vec<BetEntry>> {
        Ok(self
            .state
            .read()
            .entries
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }

    fn get_result(&self, date: NaiveDate, draw: &DrawKey) -> Result<Option<DrawResult>> {
        Ok(self.state.read().results.get(&(date, draw.clone())).cloned())
    }

    fn put_result(&self, result: DrawResult) -> Result<()> {
        self.write(|s| s.insert_result(result));
        Ok(())
    }

    fn get_rate_table(&self, agent: &str, draw: &DrawKey) -> Result<Option<RateTable>> {
        Ok(self.state.read().get_rate_table(agent, draw).cloned())
    }

    fn put_rate_table(&self, table: RateTable) -> Result<()> {
        self.write(|s| s.insert_rate_table(table));
        Ok(())
    }

    fn agents(&self) -> Result<Vec<AgentNode>> {
        Ok(self.state.read().agents.values().cloned().collect())
    }

    fn put_agent(&self, node: AgentNode) -> Result<()> {
        self.write(|s| s.insert_agent(node));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_bill_numbers_unique_across_threads() {
        let storage = Arc::new(MemoryStorage::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let storage = Arc::clone(&storage);
                thread::spawn(move || {
                    (0..100)
                        .map(|_| storage.next_bill_no().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for bill in h.join().unwrap() {
                assert!(seen.insert(bill), "duplicate {}", bill);
            }
        }
        assert_eq!(seen.len(), 800);
        assert_eq!(storage.next_bill_no().unwrap(), BillNo(801));
    }

    #[test]
    fn test_sequence_resumes_from_snapshot() {
        let storage = MemoryStorage::new();
        storage.next_bill_no().unwrap();
        storage.next_bill_no().unwrap();
        let resumed = MemoryStorage::from_state(storage.snapshot());
        assert_eq!(resumed.next_bill_no().unwrap(), BillNo(3));
    }

    #[test]
    fn test_missing_entry_is_not_found() {
        let storage = MemoryStorage::new();
        let plan = DebitPlan::default();
        assert!(matches!(
            storage.set_entry_count(9, 1, 2, &plan),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(storage.invalidate_entry(9), Err(Error::NotFound(_))));
        assert_eq!(storage.delete_bill(BillNo(1)).unwrap(), 0);
    }

    #[test]
    fn test_failed_transaction_keeps_live_state() {
        let storage = MemoryStorage::new();
        let err = storage
            .transact(
                |s| {
                    s.blocked_dates.insert((DrawKey::resolve("D-1"), NaiveDate::MIN));
                    Ok(())
                },
                |_| Err(Error::Storage("disk full".to_string())),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert!(!storage
            .is_date_blocked(&DrawKey::resolve("D-1"), NaiveDate::MIN)
            .unwrap());
    }
}
