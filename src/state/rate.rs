use crate::state::draw::DrawKey;
use crate::state::entry::{AgentId, BetType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Commission rate per bet type.
pub type RateMap = BTreeMap<BetType, Decimal>;

/// Rate applied to bet types with no configured rate.
pub const DEFAULT_RATE: Decimal = Decimal::TEN;

/// Operator-maintained rates for one agent on one draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTable {
    pub agent: AgentId,
    pub draw: DrawKey,
    pub rates: RateMap,
}

impl RateTable {
    pub fn new(agent: &str, draw: DrawKey, rates: RateMap) -> Self {
        RateTable {
            agent: agent.to_string(),
            draw,
            rates,
        }
    }
}

/// Rate for `bet_type` from a possibly empty map, defaulting to [`DEFAULT_RATE`].
pub fn rate_or_default(rates: Option<&RateMap>, bet_type: BetType) -> Decimal {
    rates
        .and_then(|m| m.get(&bet_type))
        .copied()
        .unwrap_or(DEFAULT_RATE)
}
