use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which quota tier rejected a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuotaTier {
    Global,
    Agent,
}

impl fmt::Display for QuotaTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaTier::Global => write!(f, "Daily limit"),
            QuotaTier::Agent => write!(f, "User daily limit"),
        }
    }
}

/// One offending line in a rejected batch, keyed as `TYPE-NUMBER`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineViolation {
    pub key: String,
    pub attempted: u32,
    pub remaining: u32,
}

impl fmt::Display for LineViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} → attempted {}, remaining {}",
            self.key, self.attempted, self.remaining
        )
    }
}

fn render_lines(lines: &[LineViolation]) -> String {
    lines
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("Entry time is blocked for {draw} ({block} - {unblock})")]
    WindowBlocked {
        draw: String,
        block: NaiveTime,
        unblock: NaiveTime,
    },

    #[error("Entries are blocked for {date} for {draw}")]
    DateBlocked { draw: String, date: NaiveDate },

    #[error("{tier} reached for:\n{}\n\nNothing was saved. Reduce the count and try again.", render_lines(.lines))]
    QuotaExceeded {
        tier: QuotaTier,
        lines: Vec<LineViolation>,
    },

    #[error("User limit exceeded:\n{}", render_lines(.lines))]
    OverrideExceeded { lines: Vec<LineViolation> },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, Error>;
