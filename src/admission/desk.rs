use crate::admission::window::DrawWindowResolver;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::ledger::{self, DebitPlan, Demand};
use crate::state::{BetEntry, BillNo, Role};
use crate::storage::Storage;
use std::sync::Arc;
use tracing::{info, warn};

/// Maintenance of already admitted lines.
///
/// Raising a count is a fresh sale of the difference and passes every quota
/// tier. Nothing here gives capacity back: a lowered count or a deleted bill
/// leaves the counters as they are.
pub struct EntryDesk<S: Storage, C: Clock> {
    storage: Arc<S>,
    clock: C,
}

impl<S: Storage, C: Clock> EntryDesk<S, C> {
    pub fn new(storage: Arc<S>, clock: C) -> Self {
        EntryDesk { storage, clock }
    }

    fn existing(&self, id: u64) -> Result<BetEntry> {
        self.storage
            .get_entry(id)?
            .ok_or_else(|| Error::NotFound(format!("Entry {} not found", id)))
    }

    /// Change the count of a line until the draw's block time on its
    /// settlement date.
    pub fn update_count(&self, id: u64, count: u32, role: &Role) -> Result<BetEntry> {
        if count == 0 {
            return Err(Error::Validation(
                "Count must be greater than zero".to_string(),
            ));
        }
        let entry = self.existing(id)?;
        let resolver = DrawWindowResolver::new(self.storage.as_ref());
        let now = self.clock.now();
        if resolver.cutoff_passed(&entry.draw, role, entry.effective_date, now)? {
            let window = self
                .storage
                .get_window(&entry.draw, role)?
                .ok_or_else(|| Error::ConfigurationMissing(entry.draw.to_string()))?;
            return Err(Error::WindowBlocked {
                draw: entry.draw.to_string(),
                block: window.block,
                unblock: window.unblock,
            });
        }
        let plan = if count > entry.count {
            self.plan_increase(&entry, count - entry.count).map_err(|e| {
                warn!(entry = id, reason = %e, "count increase rejected");
                e
            })?
        } else {
            DebitPlan::default()
        };
        let updated = self.storage.set_entry_count(id, entry.count, count, &plan)?;
        info!(entry = id, from = entry.count, to = count, "entry count updated");
        Ok(updated)
    }

    /// Assess `extra` more units of the entry's line against both tiers and
    /// any active override, as a submission of that size would be.
    fn plan_increase(&self, entry: &BetEntry, extra: u32) -> Result<DebitPlan> {
        let storage = self.storage.as_ref();
        let limits = storage.get_ticket_limits()?.ok_or_else(|| {
            Error::ConfigurationMissing("No ticket limits configuration found".to_string())
        })?;
        let date = entry.effective_date;
        let agent = entry.created_by.as_str();
        let mut demand = Demand::new();
        demand.insert(entry.line_key(), extra);

        let global = ledger::assess_global(storage, date, &limits, &demand)?.into_clean()?;
        ledger::check_overrides(storage, &entry.draw, agent, &demand)?;
        let agent_tier = ledger::assess_agent(storage, date, &entry.draw, agent, &limits, &demand)?
            .into_clean()?;
        Ok(ledger::plan(date, agent, &global, &agent_tier))
    }

    pub fn invalidate(&self, id: u64) -> Result<BetEntry> {
        let entry = self.storage.invalidate_entry(id)?;
        info!(entry = id, bill = %entry.bill_no, "entry invalidated");
        Ok(entry)
    }

    /// Remove every line of a bill; `NotFound` if it had none.
    pub fn delete_bill(&self, bill_no: BillNo) -> Result<usize> {
        let removed = self.storage.delete_bill(bill_no)?;
        if removed == 0 {
            return Err(Error::NotFound(format!("No entries for bill {}", bill_no)));
        }
        info!(bill = %bill_no, removed, "bill deleted");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::expand::RawLine;
    use crate::admission::pipeline::{AdmissionPipeline, SubmitRequest};
    use crate::clock::FixedClock;
    use crate::error::QuotaTier;
    use crate::state::{
        BetType, Draw, DrawWindow, GlobalQuotaKey, LineKey, OverrideKey, QuotaOverride,
        TicketLimits,
    };
    use crate::storage::MemoryStorage;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 7, 3)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    /// Bill of A-4 ×2 and AB-45 ×1 for bob; A capped at `cap_a`, with an
    /// optional override on A-4 saved before the sale.
    fn seeded(cap_a: u32, hard_cap: Option<u32>) -> (Arc<MemoryStorage>, BillNo, u64) {
        let storage = Arc::new(MemoryStorage::new());
        let window = DrawWindow::new(
            Draw::Dear6Pm.into(),
            Role::new("sub"),
            NaiveTime::from_hms_opt(17, 50, 0).unwrap(),
            NaiveTime::from_hms_opt(18, 30, 0).unwrap(),
        )
        .unwrap();
        storage.put_window(window).unwrap();
        let mut limits = TicketLimits::default();
        limits.caps.insert(BetType::A, cap_a);
        storage.put_ticket_limits(limits).unwrap();
        if let Some(count) = hard_cap {
            let key = OverrideKey::new(LineKey::new(BetType::A, "4"), Draw::Dear6Pm.into(), "bob");
            storage.put_override(QuotaOverride::new(key, count)).unwrap();
        }
        let pipeline = AdmissionPipeline::new(Arc::clone(&storage), FixedClock(at(10, 0)));
        let out = pipeline
            .submit(&SubmitRequest {
                agent: "bob".to_string(),
                role: "sub".to_string(),
                draw: "DEAR 6 PM".to_string(),
                lines: vec![
                    RawLine::number(BetType::A, "4", 2),
                    RawLine::number(BetType::AB, "45", 1),
                ],
            })
            .unwrap();
        let id = out.entries[0].id;
        (storage, out.bill_no, id)
    }

    #[test]
    fn test_update_count_before_cutoff() {
        let (storage, _, id) = seeded(100, None);
        let desk = EntryDesk::new(storage, FixedClock(at(17, 49)));
        let e = desk.update_count(id, 7, &Role::new("sub")).unwrap();
        assert_eq!(e.count, 7);
    }

    #[test]
    fn test_update_count_after_cutoff_is_blocked() {
        let (storage, _, id) = seeded(100, None);
        let desk = EntryDesk::new(storage, FixedClock(at(17, 50)));
        let err = desk.update_count(id, 7, &Role::new("sub")).unwrap_err();
        assert!(matches!(err, Error::WindowBlocked { .. }));
        assert!(desk.update_count(id, 0, &Role::new("sub")).is_err());
        assert!(matches!(
            desk.update_count(999, 1, &Role::new("sub")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_invalidate_and_delete() {
        let (storage, bill, id) = seeded(100, None);
        let desk = EntryDesk::new(Arc::clone(&storage), FixedClock(at(11, 0)));
        assert!(!desk.invalidate(id).unwrap().is_valid);
        assert_eq!(desk.delete_bill(bill).unwrap(), 2);
        assert!(matches!(desk.delete_bill(bill), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_count_increase_is_held_to_group_cap() {
        let (storage, _, id) = seeded(5, None);
        let desk = EntryDesk::new(Arc::clone(&storage), FixedClock(at(11, 0)));
        let sub = Role::new("sub");
        let key = GlobalQuotaKey::new(at(0, 0).date(), LineKey::new(BetType::A, "4"));

        let err = desk.update_count(id, 500, &sub).unwrap_err();
        assert!(matches!(
            err,
            Error::QuotaExceeded {
                tier: QuotaTier::Global,
                ..
            }
        ));
        assert_eq!(storage.get_entry(id).unwrap().unwrap().count, 2);
        assert_eq!(storage.global_remaining(&key).unwrap(), Some(3));

        assert_eq!(desk.update_count(id, 5, &sub).unwrap().count, 5);
        assert_eq!(storage.global_remaining(&key).unwrap(), Some(0));
        assert!(desk.update_count(id, 6, &sub).is_err());

        // Lowering never gives capacity back
        assert_eq!(desk.update_count(id, 1, &sub).unwrap().count, 1);
        assert_eq!(storage.global_remaining(&key).unwrap(), Some(0));
    }

    #[test]
    fn test_count_increase_is_held_to_override() {
        let (storage, _, id) = seeded(100, Some(3));
        let desk = EntryDesk::new(Arc::clone(&storage), FixedClock(at(11, 0)));
        let sub = Role::new("sub");

        assert_eq!(desk.update_count(id, 3, &sub).unwrap().count, 3);
        assert!(matches!(
            desk.update_count(id, 4, &sub),
            Err(Error::QuotaExceeded {
                tier: QuotaTier::Agent,
                ..
            })
        ));
        assert!(matches!(
            desk.update_count(id, 10, &sub),
            Err(Error::OverrideExceeded { .. })
        ));
        assert_eq!(storage.get_entry(id).unwrap().unwrap().count, 3);
    }
}
