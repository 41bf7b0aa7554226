use crate::state::draw::DrawKey;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Number of ranked prize positions in a published result.
pub const PRIZE_POSITIONS: usize = 5;

/// Published outcome of one draw on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawResult {
    pub date: NaiveDate,
    pub draw: DrawKey,
    /// Ranked prizes, position 1 first. Blank positions are dropped on input.
    pub prizes: Vec<String>,
    /// Unranked consolation numbers.
    pub others: Vec<String>,
}

impl DrawResult {
    pub fn new(date: NaiveDate, draw: DrawKey, prizes: Vec<String>, others: Vec<String>) -> Self {
        let clean = |v: Vec<String>| -> Vec<String> {
            v.into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        };
        let mut prizes = clean(prizes);
        prizes.truncate(PRIZE_POSITIONS);
        DrawResult {
            date,
            draw,
            prizes,
            others: clean(others),
        }
    }

    /// Prize at a 1-based position.
    pub fn prize(&self, position: usize) -> Option<&str> {
        position
            .checked_sub(1)
            .and_then(|i| self.prizes.get(i))
            .map(String::as_str)
    }

    pub fn first(&self) -> Option<&str> {
        self.prize(1)
    }
}
