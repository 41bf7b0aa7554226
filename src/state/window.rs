use crate::error::{Error, Result};
use crate::state::draw::DrawKey;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// User type a block window applies to (e.g. "master", "sub").
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Role(String);

impl Role {
    pub fn new(role: &str) -> Self {
        Role(role.trim().to_ascii_lowercase())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Daily block window for a (draw, role). Submissions are refused while
/// `block <= now < unblock`; windows never cross midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawWindow {
    pub draw: DrawKey,
    pub role: Role,
    pub block: NaiveTime,
    pub unblock: NaiveTime,
}

impl DrawWindow {
    pub fn new(draw: DrawKey, role: Role, block: NaiveTime, unblock: NaiveTime) -> Result<Self> {
        let window = DrawWindow {
            draw,
            role,
            block,
            unblock,
        };
        window.validate()?;
        Ok(window)
    }

    /// `block` must come strictly before `unblock` on the same day.
    pub fn validate(&self) -> Result<()> {
        if self.block >= self.unblock {
            return Err(Error::Validation(format!(
                "Block time {} must be before unblock time {} for {}",
                self.block.format("%H:%M"),
                self.unblock.format("%H:%M"),
                self.draw
            )));
        }
        Ok(())
    }
}

/// Parse an operator time-of-day in strict `HH:MM` form.
pub fn parse_hhmm(value: &str) -> Result<NaiveTime> {
    let value = value.trim();
    if value.len() != 5 {
        return Err(Error::Validation(format!(
            "Time must be in HH:MM format, got {}",
            value
        )));
    }
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| Error::Validation(format!("Time must be in HH:MM format, got {}", value)))
}
