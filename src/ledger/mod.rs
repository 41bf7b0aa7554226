//! Multi-tier daily quota enforcement.
//!
//! Assessment is read-only and runs against whatever the store reports as
//! remaining. The decrement happens later in [`debit_all`], which storage calls
//! under its write lock and which re-checks every debit against the live
//! counters, so two batches that both passed assessment cannot jointly oversell
//! a key.

use crate::admission::expand::BetLine;
use crate::error::{Error, LineViolation, QuotaTier, Result};
use crate::state::{
    AgentQuotaKey, DrawKey, GlobalQuotaKey, LineKey, OverrideKey, TicketLimits,
};
use crate::storage::Storage;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// Requested count per key, summed over an expanded batch.
pub type Demand = BTreeMap<LineKey, u32>;

/// Sum requested counts per `LineKey`.
pub fn demand(lines: &[BetLine]) -> Demand {
    let mut out = Demand::new();
    for line in lines {
        let slot = out.entry(line.key()).or_insert(0);
        *slot = slot.saturating_add(line.count);
    }
    out
}

/// Outcome of one key in one tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaLine {
    pub key: LineKey,
    pub requested: u32,
    pub ceiling: u32,
    pub remaining: u32,
    pub accepted: u32,
    pub exceeded: bool,
}

impl QuotaLine {
    fn violation(&self) -> LineViolation {
        LineViolation {
            key: self.key.to_string(),
            attempted: self.requested,
            remaining: self.remaining,
        }
    }
}

/// Clamp one request against a ceiling and an optional stored remaining.
///
/// A missing record means first use, so remaining starts at the ceiling.
pub fn assess_line(key: LineKey, requested: u32, ceiling: u32, stored: Option<u32>) -> QuotaLine {
    let remaining = stored.unwrap_or(ceiling);
    let (accepted, exceeded) = if remaining == 0 {
        (0, true)
    } else if requested <= remaining {
        (requested, false)
    } else {
        (remaining, true)
    };
    QuotaLine {
        key,
        requested,
        ceiling,
        remaining,
        accepted,
        exceeded,
    }
}

/// Every key of a batch assessed against one tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierAssessment {
    pub tier: QuotaTier,
    pub lines: Vec<QuotaLine>,
}

impl TierAssessment {
    pub fn violations(&self) -> Vec<LineViolation> {
        self.lines
            .iter()
            .filter(|l| l.exceeded)
            .map(QuotaLine::violation)
            .collect()
    }

    /// Reject the whole batch if any key was clamped or refused.
    pub fn into_clean(self) -> Result<Self> {
        let lines = self.violations();
        if lines.is_empty() {
            Ok(self)
        } else {
            Err(Error::QuotaExceeded {
                tier: self.tier,
                lines,
            })
        }
    }

    fn line(&self, key: &LineKey) -> Option<&QuotaLine> {
        self.lines.iter().find(|l| l.key == *key)
    }
}

/// Global tier: ceiling is the ticket-group cap.
pub fn assess_global<S: Storage + ?Sized>(
    storage: &S,
    date: NaiveDate,
    limits: &TicketLimits,
    demand: &Demand,
) -> Result<TierAssessment> {
    let mut lines = Vec::with_capacity(demand.len());
    for (key, requested) in demand {
        let ceiling = limits.cap_for(key.bet_type);
        let stored = storage.global_remaining(&GlobalQuotaKey::new(date, key.clone()))?;
        lines.push(assess_line(key.clone(), *requested, ceiling, stored));
    }
    Ok(TierAssessment {
        tier: QuotaTier::Global,
        lines,
    })
}

/// Strict override tier: a request above an active hard cap is refused
/// outright, regardless of what the agent ledger says.
pub fn check_overrides<S: Storage + ?Sized>(
    storage: &S,
    draw: &DrawKey,
    agent: &str,
    demand: &Demand,
) -> Result<()> {
    let mut lines = Vec::new();
    for (key, requested) in demand {
        let override_key = OverrideKey::new(key.clone(), draw.clone(), agent);
        if let Some(o) = storage.get_override(&override_key)? {
            if *requested > o.count {
                lines.push(LineViolation {
                    key: key.to_string(),
                    attempted: *requested,
                    remaining: o.count,
                });
            }
        }
    }
    if lines.is_empty() {
        Ok(())
    } else {
        Err(Error::OverrideExceeded { lines })
    }
}

/// Per-agent tier: ceiling is the agent's override when one is active,
/// otherwise the group cap.
pub fn assess_agent<S: Storage + ?Sized>(
    storage: &S,
    date: NaiveDate,
    draw: &DrawKey,
    agent: &str,
    limits: &TicketLimits,
    demand: &Demand,
) -> Result<TierAssessment> {
    let mut lines = Vec::with_capacity(demand.len());
    for (key, requested) in demand {
        let override_key = OverrideKey::new(key.clone(), draw.clone(), agent);
        let ceiling = match storage.get_override(&override_key)? {
            Some(o) => o.count,
            None => limits.cap_for(key.bet_type),
        };
        let stored = storage.agent_remaining(&AgentQuotaKey::new(date, agent, key.clone()))?;
        lines.push(assess_line(key.clone(), *requested, ceiling, stored));
    }
    Ok(TierAssessment {
        tier: QuotaTier::Agent,
        lines,
    })
}

/// Counter keys that name the line they track.
pub trait QuotaKey: Clone + Eq + Hash {
    fn line(&self) -> &LineKey;
}

impl QuotaKey for GlobalQuotaKey {
    fn line(&self) -> &LineKey {
        &self.line
    }
}

impl QuotaKey for AgentQuotaKey {
    fn line(&self) -> &LineKey {
        &self.line
    }
}

/// One pending decrement; `ceiling` seeds the counter if it does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debit<K> {
    pub key: K,
    pub ceiling: u32,
    pub amount: u32,
}

/// Decrements for both tiers of one accepted batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebitPlan {
    pub global: Vec<Debit<GlobalQuotaKey>>,
    pub agent: Vec<Debit<AgentQuotaKey>>,
}

/// Combine the two tiers: each key is debited by the smaller accepted count.
pub fn plan(
    date: NaiveDate,
    agent: &str,
    global: &TierAssessment,
    agent_tier: &TierAssessment,
) -> DebitPlan {
    let mut out = DebitPlan::default();
    for g in &global.lines {
        let Some(a) = agent_tier.line(&g.key) else {
            continue;
        };
        let amount = g.accepted.min(a.accepted);
        if amount == 0 {
            continue;
        }
        out.global.push(Debit {
            key: GlobalQuotaKey::new(date, g.key.clone()),
            ceiling: g.ceiling,
            amount,
        });
        out.agent.push(Debit {
            key: AgentQuotaKey::new(date, agent, g.key.clone()),
            ceiling: a.ceiling,
            amount,
        });
    }
    out
}

/// Debits that no longer fit the live counters.
pub fn recheck<K: QuotaKey>(table: &HashMap<K, u32>, debits: &[Debit<K>]) -> Vec<LineViolation> {
    debits
        .iter()
        .filter_map(|d| {
            let remaining = table.get(&d.key).copied().unwrap_or(d.ceiling);
            (d.amount > remaining).then(|| LineViolation {
                key: d.key.line().to_string(),
                attempted: d.amount,
                remaining,
            })
        })
        .collect()
}

fn apply<K: QuotaKey>(table: &mut HashMap<K, u32>, debits: &[Debit<K>]) {
    for d in debits {
        let slot = table.entry(d.key.clone()).or_insert(d.ceiling);
        *slot = slot.saturating_sub(d.amount);
    }
}

/// Re-validate then decrement both tiers as one step.
///
/// Callers must hold exclusive access to both tables for the duration. If any
/// debit in either tier exceeds its live remaining, nothing is written.
pub fn debit_all(
    global: &mut HashMap<GlobalQuotaKey, u32>,
    agent: &mut HashMap<AgentQuotaKey, u32>,
    plan: &DebitPlan,
) -> Result<()> {
    let lines = recheck(global, &plan.global);
    if !lines.is_empty() {
        return Err(Error::QuotaExceeded {
            tier: QuotaTier::Global,
            lines,
        });
    }
    let lines = recheck(agent, &plan.agent);
    if !lines.is_empty() {
        return Err(Error::QuotaExceeded {
            tier: QuotaTier::Agent,
            lines,
        });
    }
    apply(global, &plan.global);
    apply(agent, &plan.agent);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::BetType;
    use proptest::prelude::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 10).unwrap()
    }

    fn key(n: &str) -> LineKey {
        LineKey::new(BetType::Super, n)
    }

    #[test]
    fn test_assess_line_first_use_starts_at_ceiling() {
        let l = assess_line(key("123"), 5, 10, None);
        assert_eq!((l.remaining, l.accepted, l.exceeded), (10, 5, false));
    }

    #[test]
    fn test_assess_line_clamps_and_refuses() {
        let l = assess_line(key("123"), 5, 10, Some(3));
        assert_eq!((l.accepted, l.exceeded), (3, true));
        let l = assess_line(key("123"), 1, 10, Some(0));
        assert_eq!((l.accepted, l.exceeded), (0, true));
    }

    #[test]
    fn test_demand_sums_per_key() {
        let line = |n: &str, c| BetLine {
            bet_type: BetType::Super,
            number: n.to_string(),
            count: c,
            rate: None,
            name: None,
        };
        let d = demand(&[line("123", 2), line("123", 3), line("124", 1)]);
        assert_eq!(d.get(&key("123")), Some(&5));
        assert_eq!(d.get(&key("124")), Some(&1));
    }

    #[test]
    fn test_plan_takes_minimum_accepted() {
        let global = TierAssessment {
            tier: QuotaTier::Global,
            lines: vec![assess_line(key("123"), 5, 100, None)],
        };
        let agent = TierAssessment {
            tier: QuotaTier::Agent,
            lines: vec![assess_line(key("123"), 5, 4, None)],
        };
        let p = plan(day(), "alice", &global, &agent);
        assert_eq!(p.global[0].amount, 4);
        assert_eq!(p.agent[0].ceiling, 4);
    }

    #[test]
    fn test_debit_all_is_all_or_nothing() {
        let mut global = HashMap::new();
        let mut agent = HashMap::new();
        let plan = DebitPlan {
            global: vec![Debit {
                key: GlobalQuotaKey::new(day(), key("123")),
                ceiling: 10,
                amount: 4,
            }],
            agent: vec![Debit {
                key: AgentQuotaKey::new(day(), "alice", key("123")),
                ceiling: 3,
                amount: 4,
            }],
        };
        let err = debit_all(&mut global, &mut agent, &plan).unwrap_err();
        assert!(matches!(
            err,
            Error::QuotaExceeded {
                tier: QuotaTier::Agent,
                ..
            }
        ));
        assert!(global.is_empty());
        assert!(agent.is_empty());
    }

    #[test]
    fn test_debit_all_initialises_lazily() {
        let mut global = HashMap::new();
        let mut agent = HashMap::new();
        let gk = GlobalQuotaKey::new(day(), key("123"));
        let plan = DebitPlan {
            global: vec![Debit {
                key: gk.clone(),
                ceiling: 10,
                amount: 4,
            }],
            agent: vec![],
        };
        debit_all(&mut global, &mut agent, &plan).unwrap();
        debit_all(&mut global, &mut agent, &plan).unwrap();
        assert_eq!(global[&gk], 2);
        assert!(debit_all(&mut global, &mut agent, &plan).is_err());
        assert_eq!(global[&gk], 2);
    }

    proptest! {
        #[test]
        fn prop_accepted_never_exceeds_ceiling(
            ceiling in 1u32..50,
            requests in proptest::collection::vec(1u32..20, 1..40),
        ) {
            let mut global = HashMap::new();
            let mut agent = HashMap::new();
            let gk = GlobalQuotaKey::new(day(), key("777"));
            let mut sold = 0u32;

            for requested in requests {
                let stored = global.get(&gk).copied();
                let line = assess_line(key("777"), requested, ceiling, stored);
                if line.exceeded {
                    continue;
                }
                let plan = DebitPlan {
                    global: vec![Debit { key: gk.clone(), ceiling, amount: line.accepted }],
                    agent: vec![],
                };
                if debit_all(&mut global, &mut agent, &plan).is_ok() {
                    sold += line.accepted;
                }
                prop_assert!(sold <= ceiling);
                prop_assert_eq!(global[&gk], ceiling - sold);
            }
        }
    }
}
