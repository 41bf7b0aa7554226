use crate::admission::expand::{self, RawLine};
use crate::admission::window::DrawWindowResolver;
use crate::clock::Clock;
use crate::error::{Error, LineViolation, Result};
use crate::ledger;
use crate::state::{AgentId, BetEntry, BillNo, DrawKey, Role};
use crate::storage::Storage;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A bill as an agent submits it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub agent: AgentId,
    pub role: String,
    pub draw: String,
    pub lines: Vec<RawLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub bill_no: BillNo,
    pub settlement_date: NaiveDate,
    pub entries: Vec<BetEntry>,
    /// Always empty: a batch with any clamped line is refused as a whole.
    pub exceeded: Vec<LineViolation>,
}

/// The submission entry point.
pub struct AdmissionPipeline<S: Storage, C: Clock> {
    storage: Arc<S>,
    clock: C,
}

impl<S: Storage, C: Clock> AdmissionPipeline<S, C> {
    pub fn new(storage: Arc<S>, clock: C) -> Self {
        AdmissionPipeline { storage, clock }
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Admit a bill or refuse it whole.
    ///
    /// Nothing is written unless every line passes every tier at its full
    /// requested count.
    pub fn submit(&self, req: &SubmitRequest) -> Result<SubmitOutcome> {
        let agent = req.agent.trim();
        if agent.is_empty() {
            return Err(Error::Validation("Agent is required".to_string()));
        }
        let draw: DrawKey = req.draw.parse()?;
        let role = Role::new(&req.role);
        let now = self.clock.now();
        let storage = self.storage.as_ref();

        let decision = DrawWindowResolver::new(storage).resolve(&draw, &role, now)?;
        let date = decision.open_date().map_err(|e| {
            warn!(agent, draw = %draw, %now, "submission inside block window");
            e
        })?;

        if storage.is_date_blocked(&draw, date)? {
            warn!(agent, draw = %draw, %date, "submission for blocked date");
            return Err(Error::DateBlocked {
                draw: draw.to_string(),
                date,
            });
        }

        let limits = storage.get_ticket_limits()?.ok_or_else(|| {
            Error::ConfigurationMissing(
                "No ticket limits configuration found. Please set up ticket limits first."
                    .to_string(),
            )
        })?;

        let lines = expand::expand(&req.lines)?;
        let demand = ledger::demand(&lines);
        debug!(
            agent,
            draw = %draw,
            %date,
            lines = lines.len(),
            keys = demand.len(),
            "batch expanded"
        );

        let global = ledger::assess_global(storage, date, &limits, &demand)?
            .into_clean()
            .map_err(|e| log_rejection(agent, &draw, e))?;
        ledger::check_overrides(storage, &draw, agent, &demand)
            .map_err(|e| log_rejection(agent, &draw, e))?;
        let agent_tier = ledger::assess_agent(storage, date, &draw, agent, &limits, &demand)?
            .into_clean()
            .map_err(|e| log_rejection(agent, &draw, e))?;
        let plan = ledger::plan(date, agent, &global, &agent_tier);

        let bill_no = storage.next_bill_no()?;
        let rows = lines
            .iter()
            .map(|line| BetEntry {
                id: 0,
                number: line.number.clone(),
                bet_type: line.bet_type,
                count: line.count,
                draw: draw.clone(),
                bill_no,
                created_by: agent.to_string(),
                effective_date: date,
                created_at: now,
                rate: line.amount(),
                name: line.name.clone(),
                is_valid: true,
            })
            .collect();

        let entries = storage
            .commit_bill(rows, &plan)
            .map_err(|e| log_rejection(agent, &draw, e))?;

        info!(
            agent,
            draw = %draw,
            %date,
            bill = %bill_no,
            lines = entries.len(),
            "bill admitted"
        );
        Ok(SubmitOutcome {
            bill_no,
            settlement_date: date,
            entries,
            exceeded: Vec::new(),
        })
    }
}

fn log_rejection(agent: &str, draw: &DrawKey, err: Error) -> Error {
    warn!(agent, draw = %draw, reason = %err, "bill rejected");
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::QuotaTier;
    use crate::state::{
        BetType, Draw, DrawWindow, GlobalQuotaKey, LineKey, OverrideKey, QuotaOverride,
        TicketLimits,
    };
    use crate::storage::{EntryFilter, MemoryStorage};
    use chrono::{NaiveDateTime, NaiveTime};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn storage(cap: u32) -> Arc<MemoryStorage> {
        let storage = MemoryStorage::new();
        let window = DrawWindow::new(
            Draw::Dear1Pm.into(),
            Role::new("sub"),
            NaiveTime::from_hms_opt(12, 55, 0).unwrap(),
            NaiveTime::from_hms_opt(13, 30, 0).unwrap(),
        )
        .unwrap();
        storage.put_window(window).unwrap();
        let mut limits = TicketLimits::default();
        limits.caps.insert(BetType::Super, cap);
        storage.put_ticket_limits(limits).unwrap();
        Arc::new(storage)
    }

    fn request(lines: Vec<RawLine>) -> SubmitRequest {
        SubmitRequest {
            agent: "alice".to_string(),
            role: "sub".to_string(),
            draw: "dear 1 pm".to_string(),
            lines,
        }
    }

    #[test]
    fn test_admits_and_records_lines() {
        let pipeline = AdmissionPipeline::new(storage(10), FixedClock(at(9, 0)));
        let out = pipeline
            .submit(&request(vec![RawLine::number(BetType::Super, "123", 4)]))
            .unwrap();
        assert_eq!(out.bill_no, BillNo(1));
        assert!(out.exceeded.is_empty());
        assert_eq!(out.entries.len(), 1);
        assert_eq!(out.entries[0].rate, rust_decimal::Decimal::from(40));
        assert_eq!(out.entries[0].draw, DrawKey::Known(Draw::Dear1Pm));
    }

    #[test]
    fn test_duplicate_keys_are_summed_before_checking() {
        let pipeline = AdmissionPipeline::new(storage(5), FixedClock(at(9, 0)));
        let err = pipeline
            .submit(&request(vec![
                RawLine::number(BetType::Super, "123", 3),
                RawLine::number(BetType::Super, "123", 3),
            ]))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::QuotaExceeded {
                tier: QuotaTier::Global,
                ..
            }
        ));
        let today = at(0, 0).date();
        assert!(pipeline
            .storage()
            .query_entries(&EntryFilter::between(today, today))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_second_bill_over_remaining_is_refused_whole() {
        let pipeline = AdmissionPipeline::new(storage(5), FixedClock(at(9, 0)));
        pipeline
            .submit(&request(vec![RawLine::number(BetType::Super, "123", 4)]))
            .unwrap();
        let err = pipeline
            .submit(&request(vec![
                RawLine::number(BetType::Super, "999", 1),
                RawLine::number(BetType::Super, "123", 2),
            ]))
            .unwrap_err();
        assert!(err.to_string().contains("SUPER-123 → attempted 2, remaining 1"));
        let key = GlobalQuotaKey::new(at(0, 0).date(), LineKey::new(BetType::Super, "999"));
        assert_eq!(pipeline.storage().global_remaining(&key).unwrap(), None);
    }

    #[test]
    fn test_override_is_strict() {
        let storage = storage(100);
        let line = LineKey::new(BetType::Super, "123");
        let key = OverrideKey::new(line, Draw::Dear1Pm.into(), "alice");
        storage.put_override(QuotaOverride::new(key, 2)).unwrap();
        let pipeline = AdmissionPipeline::new(storage, FixedClock(at(9, 0)));
        let err = pipeline
            .submit(&request(vec![RawLine::number(BetType::Super, "123", 3)]))
            .unwrap_err();
        assert!(matches!(err, Error::OverrideExceeded { .. }));

        pipeline
            .submit(&request(vec![RawLine::number(BetType::Super, "123", 2)]))
            .unwrap();
        let err = pipeline
            .submit(&request(vec![RawLine::number(BetType::Super, "123", 1)]))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::QuotaExceeded {
                tier: QuotaTier::Agent,
                ..
            }
        ));
    }

    #[test]
    fn test_missing_limits_is_configuration_error() {
        let storage = MemoryStorage::new();
        let window = DrawWindow::new(
            Draw::Dear1Pm.into(),
            Role::new("sub"),
            NaiveTime::from_hms_opt(12, 55, 0).unwrap(),
            NaiveTime::from_hms_opt(13, 30, 0).unwrap(),
        )
        .unwrap();
        storage.put_window(window).unwrap();
        let pipeline = AdmissionPipeline::new(Arc::new(storage), FixedClock(at(9, 0)));
        let err = pipeline
            .submit(&request(vec![RawLine::number(BetType::Super, "123", 1)]))
            .unwrap_err();
        assert!(matches!(err, Error::ConfigurationMissing(_)));
    }
}
