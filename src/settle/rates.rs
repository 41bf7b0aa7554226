use crate::error::{Error, Result};
use crate::state::{rate_or_default, AgentId, BetType, Draw, DrawKey, RateMap};
use crate::storage::Storage;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// How commission rates are looked up for a set of agents.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateMode {
    /// Each agent's own rate table.
    PerAgent,
    /// The reference agent's table applied to every agent.
    Cascade,
}

impl FromStr for RateMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per-agent" | "peragent" | "agent" => Ok(RateMode::PerAgent),
            "cascade" => Ok(RateMode::Cascade),
            other => Err(Error::Validation(format!("Unknown rate mode: {}", other))),
        }
    }
}

/// Resolved rates per agent for one draw.
pub type AgentRates = BTreeMap<AgentId, RateMap>;

/// Rate for one agent and bet type, falling back to the default rate.
pub fn rate_for(rates: &AgentRates, agent: &str, bet_type: BetType) -> Decimal {
    rate_or_default(rates.get(agent), bet_type)
}

pub struct RateResolver<'a, S: Storage + ?Sized> {
    storage: &'a S,
}

impl<'a, S: Storage + ?Sized> RateResolver<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        RateResolver { storage }
    }

    fn table(&self, agent: &str, draw: &DrawKey) -> Result<RateMap> {
        Ok(self
            .storage
            .get_rate_table(agent, draw)?
            .map(|t| t.rates)
            .unwrap_or_default())
    }

    /// Rates for every agent in `agents` on `draw`.
    ///
    /// Agents with no row get an empty map.
    pub fn resolve(
        &self,
        agents: &[AgentId],
        draw: &DrawKey,
        mode: RateMode,
        reference: &str,
    ) -> Result<AgentRates> {
        let mut out = AgentRates::new();
        match mode {
            RateMode::PerAgent => {
                for agent in agents {
                    out.insert(agent.clone(), self.table(agent, draw)?);
                }
            }
            RateMode::Cascade => {
                let shared = self.table(reference, draw)?;
                for agent in agents {
                    out.insert(agent.clone(), shared.clone());
                }
            }
        }
        Ok(out)
    }

    /// Rates for every agent on every known draw.
    pub fn resolve_all(
        &self,
        agents: &[AgentId],
        mode: RateMode,
        reference: &str,
    ) -> Result<BTreeMap<AgentId, BTreeMap<DrawKey, RateMap>>> {
        let mut out: BTreeMap<AgentId, BTreeMap<DrawKey, RateMap>> = BTreeMap::new();
        for draw in Draw::ALL {
            let key = DrawKey::from(draw);
            for (agent, rates) in self.resolve(agents, &key, mode, reference)? {
                out.entry(agent).or_default().insert(key.clone(), rates);
            }
        }
        Ok(out)
    }
}
