use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use draw_ledger::admission::{AdmissionPipeline, EntryDesk, RawLine, SubmitRequest};
use draw_ledger::clock::SystemClock;
use draw_ledger::config::Config;
use draw_ledger::error::{Error, Result};
use draw_ledger::logger;
use draw_ledger::report::{CountRequest, ReportAggregator, ReportKind, ReportRequest};
use draw_ledger::settle::RateMode;
use draw_ledger::state::{
    parse_hhmm, AgentNode, BetType, BillNo, Draw, DrawKey, DrawResult, DrawWindow, LineKey,
    OverrideKey, QuotaOverride, RateMap, RateTable, Role, TicketLimits,
};
use draw_ledger::storage::{FileStorage, Storage};
use rust_decimal::Decimal;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "draw-ledger")]
#[command(about = "Draw ledger CLI - bet admission, quotas and settlement reports")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: "human" or "json"
    #[arg(short, long, default_value = "human")]
    pub format: String,

    /// Data directory path
    #[arg(short, long)]
    pub data_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the data directory
    Init,

    /// Submit a bill
    Submit {
        #[arg(long)]
        agent: String,

        #[arg(long)]
        role: String,

        #[arg(long)]
        draw: String,

        /// Lines as a JSON array (or read from stdin if not provided)
        #[arg(long)]
        lines: Option<String>,

        /// Lines file path
        #[arg(long)]
        file: Option<String>,
    },

    /// Net pay, winning or sales report
    Report {
        /// "net-pay", "winning" or "sales"
        #[arg(long, default_value = "net-pay")]
        kind: String,

        #[arg(long)]
        from: NaiveDate,

        #[arg(long)]
        to: NaiveDate,

        #[arg(long)]
        draw: Option<DrawKey>,

        /// Subtree root (all agents if not provided)
        #[arg(long)]
        agent: Option<String>,

        #[arg(long, default_value = "per-agent")]
        mode: RateMode,

        /// Rate owner for cascade mode
        #[arg(long)]
        reference: Option<String>,
    },

    /// Count totals per number for one date
    Count {
        #[arg(long)]
        date: NaiveDate,

        #[arg(long)]
        draw: Option<DrawKey>,

        #[arg(long)]
        agent: Option<String>,

        /// Group by bet type and number
        #[arg(long)]
        by_type: bool,
    },

    /// Set the block window of a draw for a role
    SetWindow {
        #[arg(long)]
        draw: DrawKey,

        #[arg(long)]
        role: String,

        /// HH:MM
        #[arg(long)]
        block: String,

        /// HH:MM
        #[arg(long)]
        unblock: String,
    },

    /// Set ticket-group caps, e.g. --cap SUPER=50 --cap BOX=30
    SetLimits {
        #[arg(long = "cap")]
        caps: Vec<String>,

        #[arg(long)]
        created_by: Option<String>,
    },

    /// Close a date for new entries on a draw ("ALL" for every draw)
    BlockDate {
        #[arg(long)]
        draw: String,

        #[arg(long)]
        date: NaiveDate,
    },

    /// Publish a draw result
    SetResult {
        #[arg(long)]
        date: NaiveDate,

        #[arg(long)]
        draw: DrawKey,

        /// Ranked prizes, comma separated
        #[arg(long, value_delimiter = ',')]
        prizes: Vec<String>,

        /// Consolation numbers, comma separated
        #[arg(long, value_delimiter = ',')]
        others: Vec<String>,
    },

    /// Set an agent's rates on a draw, e.g. --rate SUPER=8.5
    SetRates {
        #[arg(long)]
        agent: String,

        #[arg(long)]
        draw: DrawKey,

        #[arg(long = "rate")]
        rates: Vec<String>,
    },

    /// Add or replace an agent in the hierarchy
    AddAgent {
        #[arg(long)]
        id: String,

        #[arg(long)]
        parent: Option<String>,

        #[arg(long)]
        scheme: Option<String>,
    },

    /// Set an agent's hard cap on one line of a draw
    SetOverride {
        #[arg(long)]
        agent: String,

        #[arg(long)]
        draw: DrawKey,

        #[arg(long)]
        bet_type: BetType,

        #[arg(long)]
        number: String,

        #[arg(long)]
        count: u32,

        /// Store the override switched off
        #[arg(long)]
        inactive: bool,
    },

    /// Change the count of an entry
    UpdateCount {
        #[arg(long)]
        id: u64,

        #[arg(long)]
        count: u32,

        #[arg(long)]
        role: String,
    },

    /// Mark an entry invalid
    Invalidate {
        #[arg(long)]
        id: u64,
    },

    /// Delete every line of a bill
    DeleteBill {
        #[arg(long)]
        bill: BillNo,
    },
}

/// Parse the lines of a bill from JSON
fn parse_lines(json: &str) -> Result<Vec<RawLine>> {
    serde_json::from_str(json)
        .map_err(|e| Error::Validation(format!("Failed to parse lines JSON: {}", e)))
}

/// Read lines from file or stdin
fn read_lines(file: Option<&str>) -> Result<String> {
    match file {
        Some(path) => fs::read_to_string(path)
            .map_err(|e| Error::Validation(format!("Failed to read file {}: {}", path, e))),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| Error::Validation(format!("Failed to read from stdin: {}", e)))?;
            Ok(buffer)
        }
    }
}

/// Split `NAME=VALUE`
fn parse_pair(raw: &str) -> Result<(BetType, &str)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| Error::Validation(format!("Expected TYPE=VALUE, got {}", raw)))?;
    Ok((name.parse()?, value.trim()))
}

fn parse_report_kind(kind: &str) -> Result<ReportKind> {
    match kind.trim().to_ascii_lowercase().as_str() {
        "net-pay" | "netpay" => Ok(ReportKind::NetPay),
        "winning" => Ok(ReportKind::Winning),
        "sales" => Ok(ReportKind::Sales),
        other => Err(Error::Validation(format!("Unknown report kind: {}", other))),
    }
}

/// Format output based on format type
fn format_output<T: serde::Serialize + std::fmt::Debug>(data: &T, format: &str) -> Result<String> {
    match format {
        "json" => serde_json::to_string_pretty(data)
            .map_err(|e| Error::Storage(format!("Failed to serialize JSON: {}", e))),
        _ => Ok(format!("{:#?}", data)),
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env();
    if let Some(dir) = cli.data_dir {
        config.set_data_dir(PathBuf::from(dir));
    }
    if cli.format == "json" {
        config.set_output_format("json".to_string());
    }
    logger::init(config.get_log_level());

    let format = config.get_output_format().to_string();
    let clock = || SystemClock::with_offset_minutes(config.utc_offset_minutes);

    if let Commands::Init = cli.command {
        FileStorage::open(&config)?.persist()?;
        println!("Initialized data directory at: {}", config.get_data_dir().display());
        return Ok(());
    }

    let storage = Arc::new(FileStorage::open(&config)?);

    match cli.command {
        Commands::Init => Ok(()),

        Commands::Submit {
            agent,
            role,
            draw,
            lines,
            file,
        } => {
            let json = match lines {
                Some(json) => json,
                None => read_lines(file.as_deref())?,
            };
            let request = SubmitRequest {
                agent,
                role,
                draw,
                lines: parse_lines(&json)?,
            };
            let outcome = AdmissionPipeline::new(storage, clock()).submit(&request)?;
            println!("{}", format_output(&outcome, &format)?);
            Ok(())
        }

        Commands::Report {
            kind,
            from,
            to,
            draw,
            agent,
            mode,
            reference,
        } => {
            let request = ReportRequest {
                kind: parse_report_kind(&kind)?,
                from,
                to,
                draw,
                agent,
                mode,
                reference,
            };
            let report = ReportAggregator::from_config(storage, &config).report(&request)?;
            println!("{}", format_output(&report, &format)?);
            Ok(())
        }

        Commands::Count {
            date,
            draw,
            agent,
            by_type,
        } => {
            let rows = ReportAggregator::from_config(storage, &config).count_report(
                &CountRequest {
                    date,
                    draw,
                    agent,
                    by_type,
                },
            )?;
            println!("{}", format_output(&rows, &format)?);
            Ok(())
        }

        Commands::SetWindow {
            draw,
            role,
            block,
            unblock,
        } => {
            let window = DrawWindow::new(
                draw,
                Role::new(&role),
                parse_hhmm(&block)?,
                parse_hhmm(&unblock)?,
            )?;
            storage.put_window(window.clone())?;
            println!("{}", format_output(&window, &format)?);
            Ok(())
        }

        Commands::SetLimits { caps, created_by } => {
            let mut limits = TicketLimits {
                created_by,
                ..TicketLimits::default()
            };
            for raw in &caps {
                let (bet_type, value) = parse_pair(raw)?;
                let cap = value
                    .parse::<u32>()
                    .map_err(|_| Error::Validation(format!("Invalid cap: {}", raw)))?;
                limits.caps.insert(bet_type, cap);
            }
            storage.put_ticket_limits(limits.clone())?;
            println!("{}", format_output(&limits, &format)?);
            Ok(())
        }

        Commands::BlockDate { draw, date } => {
            let draws: Vec<DrawKey> = if draw.trim().eq_ignore_ascii_case("ALL") {
                Draw::ALL.iter().copied().map(DrawKey::from).collect()
            } else {
                vec![draw.parse()?]
            };
            for key in draws {
                storage.block_date(key.clone(), date)?;
                println!("✓ Blocked {} for {}", date, key);
            }
            Ok(())
        }

        Commands::SetResult {
            date,
            draw,
            prizes,
            others,
        } => {
            let result = DrawResult::new(date, draw, prizes, others);
            storage.put_result(result.clone())?;
            println!("{}", format_output(&result, &format)?);
            Ok(())
        }

        Commands::SetRates {
            agent,
            draw,
            rates,
        } => {
            let mut map = RateMap::new();
            for raw in &rates {
                let (bet_type, value) = parse_pair(raw)?;
                let rate = value
                    .parse::<Decimal>()
                    .map_err(|_| Error::Validation(format!("Invalid rate: {}", raw)))?;
                map.insert(bet_type, rate);
            }
            let table = RateTable::new(&agent, draw, map);
            storage.put_rate_table(table.clone())?;
            println!("{}", format_output(&table, &format)?);
            Ok(())
        }

        Commands::AddAgent { id, parent, scheme } => {
            let node = AgentNode::new(&id, parent.as_deref(), scheme.as_deref());
            storage.put_agent(node.clone())?;
            println!("{}", format_output(&node, &format)?);
            Ok(())
        }

        Commands::SetOverride {
            agent,
            draw,
            bet_type,
            number,
            count,
            inactive,
        } => {
            let key = OverrideKey::new(LineKey::new(bet_type, number), draw, &agent);
            let mut o = QuotaOverride::new(key, count);
            o.active = !inactive;
            storage.put_override(o.clone())?;
            println!("{}", format_output(&o, &format)?);
            Ok(())
        }

        Commands::UpdateCount { id, count, role } => {
            let entry =
                EntryDesk::new(storage, clock()).update_count(id, count, &Role::new(&role))?;
            println!("{}", format_output(&entry, &format)?);
            Ok(())
        }

        Commands::Invalidate { id } => {
            let entry = EntryDesk::new(storage, clock()).invalidate(id)?;
            println!("{}", format_output(&entry, &format)?);
            Ok(())
        }

        Commands::DeleteBill { bill } => {
            let removed = EntryDesk::new(storage, clock()).delete_bill(bill)?;
            println!("✓ Deleted {} lines of bill {}", removed, bill);
            Ok(())
        }
    }
}
