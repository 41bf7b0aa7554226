pub mod agent;
pub mod draw;
pub mod entry;
pub mod quota;
pub mod rate;
pub mod result;
pub mod window;

pub use agent::{AgentNode, AgentTree, DEFAULT_SCHEME};
pub use draw::{normalize_label, Draw, DrawKey};
pub use entry::{default_unit_amount, AgentId, BetEntry, BetType, BillNo, LineKey, DRAW_WIDTH};
pub use quota::{
    AgentQuotaKey, GlobalQuotaKey, OverrideKey, QuotaOverride, TicketLimits, DEFAULT_GROUP_CAP,
};
pub use rate::{rate_or_default, RateMap, RateTable, DEFAULT_RATE};
pub use result::{DrawResult, PRIZE_POSITIONS};
pub use window::{parse_hhmm, DrawWindow, Role};

use crate::error::{Error, Result};
use crate::ledger::{self, DebitPlan};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Everything the back office persists.
///
/// Storage implementations guard one `State` and snapshot it whole. Every
/// mutation a store exposes is a method here, so the in-memory and file
/// stores apply identical rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct State {
    /// Block windows indexed by (draw, role)
    pub windows: HashMap<(DrawKey, Role), DrawWindow>,

    /// Dates closed for new entries, per draw
    pub blocked_dates: HashSet<(DrawKey, NaiveDate)>,

    /// Single ticket-group cap record (None until the operator saves one)
    pub ticket_limits: Option<TicketLimits>,

    /// Per-agent hard caps
    pub overrides: HashMap<OverrideKey, QuotaOverride>,

    /// Global remaining counters, created lazily on first debit
    pub global_quota: HashMap<GlobalQuotaKey, u32>,

    /// Per-agent remaining counters, created lazily on first debit
    pub agent_quota: HashMap<AgentQuotaKey, u32>,

    /// Bet lines indexed by entry id
    pub entries: BTreeMap<u64, BetEntry>,

    /// Published results indexed by (date, draw)
    pub results: HashMap<(NaiveDate, DrawKey), DrawResult>,

    /// Rate tables indexed by (agent, draw)
    pub rate_tables: HashMap<(AgentId, DrawKey), RateTable>,

    /// Agent hierarchy indexed by id
    pub agents: BTreeMap<AgentId, AgentNode>,

    /// Last issued bill number
    pub bill_counter: u64,

    /// Last issued entry id
    pub entry_counter: u64,
}

impl State {
    /// Create empty genesis state
    pub fn new() -> Self {
        State {
            windows: HashMap::new(),
            blocked_dates: HashSet::new(),
            ticket_limits: None,
            overrides: HashMap::new(),
            global_quota: HashMap::new(),
            agent_quota: HashMap::new(),
            entries: BTreeMap::new(),
            results: HashMap::new(),
            rate_tables: HashMap::new(),
            agents: BTreeMap::new(),
            bill_counter: 0,
            entry_counter: 0,
        }
    }

    pub fn get_window(&self, draw: &DrawKey, role: &Role) -> Option<&DrawWindow> {
        self.windows.get(&(draw.clone(), role.clone()))
    }

    /// Insert or replace the single window record for (draw, role).
    pub fn insert_window(&mut self, window: DrawWindow) -> Result<()> {
        window.validate()?;
        let key = (window.draw.clone(), window.role.clone());
        self.windows.insert(key, window);
        Ok(())
    }

    pub fn is_date_blocked(&self, draw: &DrawKey, date: NaiveDate) -> bool {
        self.blocked_dates.contains(&(draw.clone(), date))
    }

    /// Active override for the key, if any.
    pub fn get_active_override(&self, key: &OverrideKey) -> Option<&QuotaOverride> {
        self.overrides.get(key).filter(|o| o.active)
    }

    pub fn insert_override(&mut self, o: QuotaOverride) {
        self.overrides.insert(o.key.clone(), o);
    }

    pub fn get_entry(&self, id: u64) -> Option<&BetEntry> {
        self.entries.get(&id)
    }

    pub fn get_entry_mut(&mut self, id: u64) -> Option<&mut BetEntry> {
        self.entries.get_mut(&id)
    }

    /// Assign the next entry id and store the entry under it.
    pub fn push_entry(&mut self, mut entry: BetEntry) -> BetEntry {
        self.entry_counter += 1;
        entry.id = self.entry_counter;
        self.entries.insert(entry.id, entry.clone());
        entry
    }

    /// Re-check and apply `plan`, then store `entries` under fresh ids.
    ///
    /// A plan that no longer fits the live counters leaves everything as it
    /// was.
    pub fn commit_bill(
        &mut self,
        entries: Vec<BetEntry>,
        plan: &DebitPlan,
    ) -> Result<Vec<BetEntry>> {
        ledger::debit_all(&mut self.global_quota, &mut self.agent_quota, plan)?;
        Ok(entries.into_iter().map(|e| self.push_entry(e)).collect())
    }

    /// Move an entry's count from `from` to `to`, debiting `plan` first.
    ///
    /// Fails without writing if the entry no longer holds `from`.
    pub fn set_entry_count(
        &mut self,
        id: u64,
        from: u32,
        to: u32,
        plan: &DebitPlan,
    ) -> Result<BetEntry> {
        let current = self.get_entry(id).ok_or_else(|| entry_not_found(id))?.count;
        if current != from {
            return Err(Error::Validation(format!(
                "Entry {} count changed from {} to {} during the update",
                id, from, current
            )));
        }
        ledger::debit_all(&mut self.global_quota, &mut self.agent_quota, plan)?;
        let entry = self.get_entry_mut(id).ok_or_else(|| entry_not_found(id))?;
        entry.count = to;
        Ok(entry.clone())
    }

    pub fn invalidate_entry(&mut self, id: u64) -> Result<BetEntry> {
        let entry = self.get_entry_mut(id).ok_or_else(|| entry_not_found(id))?;
        entry.is_valid = false;
        Ok(entry.clone())
    }

    /// Remove every line of a bill; returns how many were removed.
    pub fn remove_bill(&mut self, bill_no: BillNo) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.bill_no != bill_no);
        before - self.entries.len()
    }

    /// Insert or replace the result for (date, draw).
    pub fn insert_result(&mut self, result: DrawResult) {
        self.results
            .insert((result.date, result.draw.clone()), result);
    }

    pub fn get_rate_table(&self, agent: &str, draw: &DrawKey) -> Option<&RateTable> {
        self.rate_tables.get(&(agent.to_string(), draw.clone()))
    }

    /// Insert or replace the rate table for (agent, draw).
    pub fn insert_rate_table(&mut self, table: RateTable) {
        let key = (table.agent.clone(), table.draw.clone());
        self.rate_tables.insert(key, table);
    }

    pub fn insert_agent(&mut self, node: AgentNode) {
        self.agents.insert(node.id.clone(), node);
    }
}

fn entry_not_found(id: u64) -> Error {
    Error::NotFound(format!("Entry {} not found", id))
}

impl Default for State {
    fn default() -> Self {
        State::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use rust_decimal::Decimal;

    fn entry(bill: u64) -> BetEntry {
        BetEntry {
            id: 0,
            number: "123".to_string(),
            bet_type: BetType::Super,
            count: 1,
            draw: Draw::Dear1Pm.into(),
            bill_no: BillNo(bill),
            created_by: "alice".to_string(),
            effective_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            created_at: NaiveDate::from_ymd_opt(2026, 1, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            rate: Decimal::TEN,
            name: None,
            is_valid: true,
        }
    }

    #[test]
    fn test_state_creation() {
        let state = State::new();
        assert!(state.entries.is_empty());
        assert!(state.ticket_limits.is_none());
        assert_eq!(state.bill_counter, 0);
    }

    #[test]
    fn test_window_upsert_keeps_one_record() {
        let mut state = State::new();
        let draw = DrawKey::from(Draw::Kerala3Pm);
        let role = Role::new("sub");
        let t = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap();
        for (block, unblock) in [(14, 16), (15, 17)] {
            let window = DrawWindow::new(draw.clone(), role.clone(), t(block), t(unblock)).unwrap();
            state.insert_window(window).unwrap();
        }
        assert_eq!(state.windows.len(), 1);
        assert_eq!(state.get_window(&draw, &role).unwrap().block, t(15));

        let mut crossing = state.get_window(&draw, &role).unwrap().clone();
        crossing.unblock = t(1);
        assert!(matches!(state.insert_window(crossing), Err(Error::Validation(_))));
        assert_eq!(state.get_window(&draw, &role).unwrap().unblock, t(17));
    }

    #[test]
    fn test_push_entry_assigns_ids_and_remove_bill() {
        let mut state = State::new();
        let a = state.push_entry(entry(1));
        let b = state.push_entry(entry(1));
        let c = state.push_entry(entry(2));
        assert_eq!((a.id, b.id, c.id), (1, 2, 3));
        assert_eq!(state.remove_bill(BillNo(1)), 2);
        assert_eq!(state.remove_bill(BillNo(1)), 0);
        assert!(state.get_entry(3).is_some());
    }

    #[test]
    fn test_set_entry_count_checks_expected_count() {
        let mut state = State::new();
        let stored = state.push_entry(entry(1));
        let plan = DebitPlan::default();
        assert!(matches!(
            state.set_entry_count(stored.id, 4, 6, &plan),
            Err(Error::Validation(_))
        ));
        assert_eq!(state.set_entry_count(stored.id, 1, 6, &plan).unwrap().count, 6);
        assert!(matches!(
            state.set_entry_count(99, 1, 2, &plan),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_inactive_override_is_ignored() {
        let mut state = State::new();
        let key = OverrideKey::new(LineKey::new(BetType::A, "1"), Draw::Dear6Pm.into(), "bob");
        let mut o = QuotaOverride::new(key.clone(), 5);
        o.active = false;
        state.insert_override(o);
        assert!(state.get_active_override(&key).is_none());
    }
}
