use crate::error::{Error, Result};
use crate::state::draw::DrawKey;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of digits in a full draw number (SUPER and BOX bets).
pub const DRAW_WIDTH: usize = 3;

/// Agent identifier (the username of a sales agent).
pub type AgentId = String;

/// Ticket group a bet line belongs to; decides the number width and payout rule.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BetType {
    #[serde(rename = "SUPER")]
    Super,
    #[serde(rename = "BOX")]
    Box,
    A,
    B,
    C,
    AB,
    BC,
    AC,
}

impl BetType {
    /// Digits a number of this type must have.
    pub fn width(&self) -> usize {
        match self {
            BetType::A | BetType::B | BetType::C => 1,
            BetType::AB | BetType::BC | BetType::AC => 2,
            BetType::Super | BetType::Box => DRAW_WIDTH,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BetType::Super => "SUPER",
            BetType::Box => "BOX",
            BetType::A => "A",
            BetType::B => "B",
            BetType::C => "C",
            BetType::AB => "AB",
            BetType::BC => "BC",
            BetType::AC => "AC",
        }
    }

    /// Parse a plain type name or a compound ticket code such as `LSK3SUPER`,
    /// `D-1-AB` or `D-6-A`.
    ///
    /// Precedence follows the sales frontends: SUPER, BOX, AB, BC, AC, then the
    /// single letters by a `-X` segment or a trailing letter.
    pub fn from_code(code: &str) -> Option<BetType> {
        let upper = code.trim().to_ascii_uppercase();
        if upper.is_empty() {
            return None;
        }
        if upper.contains("SUPER") {
            return Some(BetType::Super);
        }
        if upper.contains("BOX") {
            return Some(BetType::Box);
        }
        for (needle, ty) in [("AB", BetType::AB), ("BC", BetType::BC), ("AC", BetType::AC)] {
            if upper.contains(needle) {
                return Some(ty);
            }
        }
        for (letter, ty) in [('A', BetType::A), ('B', BetType::B), ('C', BetType::C)] {
            if upper.contains(&format!("-{}", letter)) || upper.ends_with(letter) {
                return Some(ty);
            }
        }
        None
    }
}

impl FromStr for BetType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        BetType::from_code(s)
            .ok_or_else(|| Error::Validation(format!("Unknown bet type: {}", s)))
    }
}

impl fmt::Display for BetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `(betType, number)` pair every quota is tracked against.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineKey {
    pub bet_type: BetType,
    pub number: String,
}

impl LineKey {
    pub fn new(bet_type: BetType, number: impl Into<String>) -> Self {
        LineKey {
            bet_type,
            number: number.into(),
        }
    }
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.bet_type, self.number)
    }
}

/// Bill sequence number; all lines of one submission share it.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BillNo(pub u64);

impl fmt::Display for BillNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:05}", self.0)
    }
}

impl FromStr for BillNo {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u64>()
            .map(BillNo)
            .map_err(|_| Error::Validation(format!("Invalid bill number: {}", s)))
    }
}

/// Default per-unit amount of a line: 12 for single-digit numbers, 10 otherwise.
pub fn default_unit_amount(number: &str) -> Decimal {
    if number.len() == 1 {
        Decimal::from(12)
    } else {
        Decimal::from(10)
    }
}

/// A persisted bet line.
///
/// Created on successful admission; afterwards only `count` and `is_valid`
/// change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BetEntry {
    pub id: u64,
    pub number: String,
    pub bet_type: BetType,
    pub count: u32,
    pub draw: DrawKey,
    pub bill_no: BillNo,
    pub created_by: AgentId,
    /// Settlement date the line is recorded against.
    pub effective_date: NaiveDate,
    pub created_at: NaiveDateTime,
    /// Line amount as sold.
    pub rate: Decimal,
    #[serde(default)]
    pub name: Option<String>,
    pub is_valid: bool,
}

impl BetEntry {
    pub fn line_key(&self) -> LineKey {
        LineKey::new(self.bet_type, self.number.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bet_type_codes() {
        assert_eq!(BetType::from_code("SUPER"), Some(BetType::Super));
        assert_eq!(BetType::from_code("LSK3SUPER"), Some(BetType::Super));
        assert_eq!(BetType::from_code("D-1-BOX"), Some(BetType::Box));
        assert_eq!(BetType::from_code("D-1-AB"), Some(BetType::AB));
        assert_eq!(BetType::from_code("d-6-bc"), Some(BetType::BC));
        assert_eq!(BetType::from_code("D-8-A"), Some(BetType::A));
        assert_eq!(BetType::from_code("LSK3C"), Some(BetType::C));
        assert_eq!(BetType::from_code("XYZ"), None);
        assert!("".parse::<BetType>().is_err());
    }

    #[test]
    fn test_widths() {
        assert_eq!(BetType::A.width(), 1);
        assert_eq!(BetType::AC.width(), 2);
        assert_eq!(BetType::Box.width(), DRAW_WIDTH);
    }

    #[test]
    fn test_bill_no_padding() {
        assert_eq!(BillNo(7).to_string(), "00007");
        assert_eq!(BillNo(123456).to_string(), "123456");
        assert_eq!("00042".parse::<BillNo>().unwrap(), BillNo(42));
    }

    #[test]
    fn test_line_key_display() {
        assert_eq!(LineKey::new(BetType::Box, "123").to_string(), "BOX-123");
    }

    #[test]
    fn test_default_unit_amount() {
        assert_eq!(default_unit_amount("7"), Decimal::from(12));
        assert_eq!(default_unit_amount("77"), Decimal::from(10));
    }
}
