use crate::state::draw::DrawKey;
use crate::state::entry::{AgentId, BetType, LineKey};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ceiling used for a ticket group that has no configured cap.
pub const DEFAULT_GROUP_CAP: u32 = 9999;

/// Operator-configured daily caps per ticket group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketLimits {
    pub caps: BTreeMap<BetType, u32>,
    #[serde(default)]
    pub created_by: Option<AgentId>,
}

impl TicketLimits {
    pub fn cap_for(&self, bet_type: BetType) -> u32 {
        self.caps.get(&bet_type).copied().unwrap_or(DEFAULT_GROUP_CAP)
    }
}

/// Global remaining counter key: `(date, betType, number)`.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GlobalQuotaKey {
    pub date: NaiveDate,
    pub line: LineKey,
}

impl GlobalQuotaKey {
    pub fn new(date: NaiveDate, line: LineKey) -> Self {
        GlobalQuotaKey { date, line }
    }
}

/// Per-agent remaining counter key: `(date, agent, betType, number)`.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentQuotaKey {
    pub date: NaiveDate,
    pub agent: AgentId,
    pub line: LineKey,
}

impl AgentQuotaKey {
    pub fn new(date: NaiveDate, agent: &str, line: LineKey) -> Self {
        AgentQuotaKey {
            date,
            agent: agent.to_string(),
            line,
        }
    }
}

/// Key of an operator hard cap: `(betType, number, draw, agent)`.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OverrideKey {
    pub line: LineKey,
    pub draw: DrawKey,
    pub agent: AgentId,
}

impl OverrideKey {
    pub fn new(line: LineKey, draw: DrawKey, agent: &str) -> Self {
        OverrideKey {
            line,
            draw,
            agent: agent.to_string(),
        }
    }
}

/// Operator hard cap for one agent on one line of one draw.
///
/// When active it replaces the group cap as that agent's ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaOverride {
    pub key: OverrideKey,
    pub count: u32,
    pub active: bool,
}

impl QuotaOverride {
    pub fn new(key: OverrideKey, count: u32) -> Self {
        QuotaOverride {
            key,
            count,
            active: true,
        }
    }
}
