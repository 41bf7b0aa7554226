//! Settlement reports over date ranges and agent subtrees.

pub mod cache;

pub use cache::TtlCache;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::settle::{rate_for, score, AgentRates, RateMode, RateResolver, Score, WinType};
use crate::state::{
    rate_or_default, AgentId, AgentTree, BetEntry, BetType, BillNo, DrawKey, DrawResult, RateMap,
};
use crate::storage::{EntryFilter, Storage};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportKind {
    NetPay,
    Winning,
    Sales,
}

/// Full parameter tuple of a report; doubles as its cache key.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub kind: ReportKind,
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// `None` covers every draw.
    pub draw: Option<DrawKey>,
    /// Subtree root; `None` covers every agent.
    pub agent: Option<AgentId>,
    pub mode: RateMode,
    /// Whose rates apply in cascade mode; defaults to `agent`.
    pub reference: Option<AgentId>,
}

/// One settled line with its payout and commission figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetPayLine {
    pub entry_id: u64,
    pub bill_no: BillNo,
    pub agent: AgentId,
    pub draw: DrawKey,
    pub date: NaiveDate,
    pub bet_type: BetType,
    pub number: String,
    pub count: u32,
    pub name: Option<String>,
    pub win_amount: u64,
    pub win_type: WinType,
    pub scheme: String,
    pub applied_rate: Decimal,
    pub calculated_amount: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Totals {
    pub sales: Decimal,
    pub winnings: Decimal,
    pub net: Decimal,
}

impl Totals {
    fn add(&mut self, line: &NetPayLine) {
        self.sales += line.calculated_amount;
        self.winnings += Decimal::from(line.win_amount);
        self.net = self.sales - self.winnings;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetPayReport {
    pub lines: Vec<NetPayLine>,
    pub by_agent: BTreeMap<AgentId, Totals>,
    pub total: Totals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WinningLine {
    pub number: String,
    pub bet_type: BetType,
    pub win_type: WinType,
    pub count: u32,
    pub win_amount: u64,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WinningBill {
    pub bill_no: BillNo,
    pub agent: AgentId,
    pub scheme: String,
    pub draw: DrawKey,
    pub winnings: Vec<WinningLine>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WinningReport {
    pub bills: Vec<WinningBill>,
    pub grand_total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentSales {
    pub agent: AgentId,
    pub count: u64,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesReport {
    pub count: u64,
    pub amount: Decimal,
    /// Highest amount first.
    pub by_agent: Vec<AgentSales>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Report {
    NetPay(NetPayReport),
    Winning(WinningReport),
    Sales(SalesReport),
}

/// Live count totals for one settlement date; never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRequest {
    pub date: NaiveDate,
    pub draw: Option<DrawKey>,
    pub agent: Option<AgentId>,
    /// Group by (bet type, number) instead of number alone.
    pub by_type: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountRow {
    pub number: String,
    pub bet_type: Option<BetType>,
    pub count: u64,
}

/// Rates either for the one requested draw or for every draw.
enum Rates {
    Draw(AgentRates),
    All(BTreeMap<AgentId, BTreeMap<DrawKey, RateMap>>),
}

impl Rates {
    fn rate(&self, agent: &str, draw: &DrawKey, bet_type: BetType) -> Decimal {
        match self {
            Rates::Draw(rates) => rate_for(rates, agent, bet_type),
            Rates::All(all) => rate_or_default(all.get(agent).and_then(|d| d.get(draw)), bet_type),
        }
    }
}

pub struct ReportAggregator<S: Storage> {
    storage: Arc<S>,
    cache: TtlCache<ReportRequest, Report>,
}

impl<S: Storage> ReportAggregator<S> {
    pub fn new(storage: Arc<S>, cache: TtlCache<ReportRequest, Report>) -> Self {
        ReportAggregator { storage, cache }
    }

    pub fn from_config(storage: Arc<S>, config: &Config) -> Self {
        let cache = TtlCache::new(config.report_cache_ttl(), config.report_cache_capacity);
        ReportAggregator::new(storage, cache)
    }

    /// Build a report, serving a cached copy while it is fresh.
    pub fn report(&self, req: &ReportRequest) -> Result<Report> {
        if let Some(hit) = self.cache.get(req) {
            debug!(kind = ?req.kind, from = %req.from, to = %req.to, "report cache hit");
            return Ok(hit);
        }
        debug!(kind = ?req.kind, from = %req.from, to = %req.to, "report cache miss");
        let report = self.build(req)?;
        self.cache.insert(req.clone(), report.clone());
        Ok(report)
    }

    fn build(&self, req: &ReportRequest) -> Result<Report> {
        if req.from > req.to {
            return Err(Error::Validation(format!(
                "Report range starts after it ends: {} > {}",
                req.from, req.to
            )));
        }
        let lines = self.settle(req)?;
        Ok(match req.kind {
            ReportKind::NetPay => Report::NetPay(net_pay(lines)),
            ReportKind::Winning => Report::Winning(winning(lines)),
            ReportKind::Sales => Report::Sales(sales(&lines)),
        })
    }

    fn tree(&self) -> Result<AgentTree> {
        Ok(AgentTree::build(&self.storage.agents()?))
    }

    fn agent_filter(tree: &AgentTree, agent: Option<&str>) -> Option<HashSet<AgentId>> {
        agent.map(|root| tree.subtree(root).into_iter().collect())
    }

    /// Score and price every matching entry.
    fn settle(&self, req: &ReportRequest) -> Result<Vec<NetPayLine>> {
        let tree = self.tree()?;
        let filter = EntryFilter {
            from: req.from,
            to: req.to,
            draw: req.draw.clone(),
            agents: Self::agent_filter(&tree, req.agent.as_deref()),
        };
        let entries = self.storage.query_entries(&filter)?;

        let mut agents: Vec<AgentId> = entries.iter().map(|e| e.created_by.clone()).collect();
        agents.sort();
        agents.dedup();

        let reference = match req.mode {
            RateMode::PerAgent => String::new(),
            RateMode::Cascade => req
                .reference
                .clone()
                .or_else(|| req.agent.clone())
                .ok_or_else(|| {
                    Error::Validation("Cascade rates need a reference agent".to_string())
                })?,
        };
        let resolver = RateResolver::new(self.storage.as_ref());
        let rates = match &req.draw {
            Some(draw) => Rates::Draw(resolver.resolve(&agents, draw, req.mode, &reference)?),
            None => Rates::All(resolver.resolve_all(&agents, req.mode, &reference)?),
        };

        let mut results: HashMap<(NaiveDate, DrawKey), Option<DrawResult>> = HashMap::new();
        let mut lines = Vec::with_capacity(entries.len());
        for entry in entries {
            let slot = (entry.effective_date, entry.draw.clone());
            if !results.contains_key(&slot) {
                let found = self.storage.get_result(slot.0, &slot.1)?;
                results.insert(slot.clone(), found);
            }
            let result = results.get(&slot).and_then(Option::as_ref);
            let applied_rate = rates.rate(&entry.created_by, &entry.draw, entry.bet_type);
            lines.push(price(entry, result, &tree, applied_rate));
        }
        Ok(lines)
    }

    /// Number totals for one date, straight from storage.
    pub fn count_report(&self, req: &CountRequest) -> Result<Vec<CountRow>> {
        let tree = self.tree()?;
        let filter = EntryFilter {
            from: req.date,
            to: req.date,
            draw: req.draw.clone(),
            agents: Self::agent_filter(&tree, req.agent.as_deref()),
        };
        let mut totals: BTreeMap<(String, Option<BetType>), u64> = BTreeMap::new();
        for e in self.storage.query_entries(&filter)? {
            let bet_type = req.by_type.then_some(e.bet_type);
            *totals.entry((e.number, bet_type)).or_insert(0) += u64::from(e.count);
        }
        let mut rows: Vec<CountRow> = totals
            .into_iter()
            .map(|((number, bet_type), count)| CountRow {
                number,
                bet_type,
                count,
            })
            .collect();
        rows.sort_by(|a, b| b.count.cmp(&a.count));
        Ok(rows)
    }
}

fn price(
    entry: BetEntry,
    result: Option<&DrawResult>,
    tree: &AgentTree,
    applied_rate: Decimal,
) -> NetPayLine {
    let s = result
        .map(|r| score(entry.bet_type, &entry.number, entry.count, r))
        .unwrap_or(Score::MISS);
    NetPayLine {
        entry_id: entry.id,
        bill_no: entry.bill_no,
        scheme: tree.scheme(&entry.created_by).to_string(),
        calculated_amount: applied_rate * Decimal::from(entry.count),
        applied_rate,
        win_amount: s.win_amount,
        win_type: s.win_type,
        agent: entry.created_by,
        draw: entry.draw,
        date: entry.effective_date,
        bet_type: entry.bet_type,
        number: entry.number,
        count: entry.count,
        name: entry.name,
    }
}

fn net_pay(lines: Vec<NetPayLine>) -> NetPayReport {
    let mut by_agent: BTreeMap<AgentId, Totals> = BTreeMap::new();
    let mut total = Totals::default();
    for line in &lines {
        by_agent.entry(line.agent.clone()).or_default().add(line);
        total.add(line);
    }
    NetPayReport {
        lines,
        by_agent,
        total,
    }
}

fn winning(lines: Vec<NetPayLine>) -> WinningReport {
    let mut bills: BTreeMap<BillNo, WinningBill> = BTreeMap::new();
    for line in lines.into_iter().filter(|l| l.win_amount > 0) {
        let bill = bills.entry(line.bill_no).or_insert_with(|| WinningBill {
            bill_no: line.bill_no,
            agent: line.agent.clone(),
            scheme: line.scheme.clone(),
            draw: line.draw.clone(),
            winnings: Vec::new(),
            total: 0,
        });
        bill.total += line.win_amount;
        bill.winnings.push(WinningLine {
            number: line.number,
            bet_type: line.bet_type,
            win_type: line.win_type,
            count: line.count,
            win_amount: line.win_amount,
            name: line.name,
        });
    }
    let bills: Vec<WinningBill> = bills.into_values().collect();
    let grand_total = bills.iter().map(|b| b.total).sum();
    WinningReport { bills, grand_total }
}

fn sales(lines: &[NetPayLine]) -> SalesReport {
    let mut per_agent: BTreeMap<&str, AgentSales> = BTreeMap::new();
    for line in lines {
        let slot = per_agent
            .entry(line.agent.as_str())
            .or_insert_with(|| AgentSales {
                agent: line.agent.clone(),
                count: 0,
                amount: Decimal::ZERO,
            });
        slot.count += u64::from(line.count);
        slot.amount += line.calculated_amount;
    }
    let mut by_agent: Vec<AgentSales> = per_agent.into_values().collect();
    by_agent.sort_by(|a, b| b.amount.cmp(&a.amount));
    SalesReport {
        count: by_agent.iter().map(|a| a.count).sum(),
        amount: by_agent.iter().map(|a| a.amount).sum(),
        by_agent,
    }
}
