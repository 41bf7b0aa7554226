//! Prize matching of a settled line against a published result.

use crate::state::{BetType, DrawResult, PRIZE_POSITIONS};
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

/// Per-unit SUPER payout by prize position 1..=5.
const SUPER_POSITION: [u64; PRIZE_POSITIONS] = [5000, 500, 250, 100, 50];
const SUPER_OTHER: u64 = 20;
const BOX_PERFECT: u64 = 3000;
const BOX_PERMUTATION: u64 = 800;
const BOX_DOUBLE_PERFECT: u64 = 3800;
const BOX_DOUBLE_PERMUTATION: u64 = 1600;
const PAIR: u64 = 700;
const SINGLE: u64 = 100;

/// Which rule paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WinType {
    None,
    Super(u8),
    SuperOther,
    BoxPerfect,
    BoxPermutation,
    BoxDoublePerfect,
    BoxDoublePermutation,
    Pair(BetType),
    Single(BetType),
}

impl fmt::Display for WinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WinType::None => Ok(()),
            WinType::Super(p) => write!(f, "SUPER {}", p),
            WinType::SuperOther => f.write_str("SUPER other"),
            WinType::BoxPerfect => f.write_str("BOX perfect"),
            WinType::BoxPermutation => f.write_str("BOX permutation"),
            WinType::BoxDoublePerfect => f.write_str("BOX double perfect"),
            WinType::BoxDoublePermutation => f.write_str("BOX double permutation"),
            WinType::Pair(t) | WinType::Single(t) => f.write_str(t.as_str()),
        }
    }
}

impl Serialize for WinType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Score {
    pub win_amount: u64,
    pub win_type: WinType,
}

impl Score {
    pub const MISS: Score = Score {
        win_amount: 0,
        win_type: WinType::None,
    };

    fn hit(unit: u64, count: u32, win_type: WinType) -> Score {
        Score {
            win_amount: unit.saturating_mul(u64::from(count)),
            win_type,
        }
    }

    pub fn is_win(&self) -> bool {
        self.win_amount > 0
    }
}

/// Exactly two distinct digits, e.g. "112".
pub fn is_double(number: &str) -> bool {
    number.chars().collect::<BTreeSet<_>>().len() == 2
}

fn sorted_digits(number: &str) -> Vec<char> {
    let mut d: Vec<char> = number.chars().collect();
    d.sort_unstable();
    d
}

fn digit(s: &str, i: usize) -> Option<char> {
    s.chars().nth(i)
}

fn score_super(number: &str, count: u32, result: &DrawResult) -> Score {
    if let Some(pos) = result.prizes.iter().position(|p| p == number) {
        let unit = SUPER_POSITION.get(pos).copied().unwrap_or(SUPER_OTHER);
        return Score::hit(unit, count, WinType::Super(pos as u8 + 1));
    }
    if result.others.iter().any(|o| o == number) {
        return Score::hit(SUPER_OTHER, count, WinType::SuperOther);
    }
    Score::MISS
}

fn score_box(number: &str, count: u32, first: &str) -> Score {
    let double = is_double(first);
    if number == first {
        return if double {
            Score::hit(BOX_DOUBLE_PERFECT, count, WinType::BoxDoublePerfect)
        } else {
            Score::hit(BOX_PERFECT, count, WinType::BoxPerfect)
        };
    }
    if sorted_digits(number) == sorted_digits(first) {
        return if double {
            Score::hit(BOX_DOUBLE_PERMUTATION, count, WinType::BoxDoublePermutation)
        } else {
            Score::hit(BOX_PERMUTATION, count, WinType::BoxPermutation)
        };
    }
    Score::MISS
}

/// Score one line. A result without a first prize pays nothing.
pub fn score(bet_type: BetType, number: &str, count: u32, result: &DrawResult) -> Score {
    let Some(first) = result.first() else {
        return Score::MISS;
    };

    let pair = |a: usize, b: usize| -> Option<String> {
        Some([digit(first, a)?, digit(first, b)?].iter().collect())
    };
    let single = |i: usize| digit(first, i).map(String::from);

    let target = match bet_type {
        BetType::Super => return score_super(number, count, result),
        BetType::Box => return score_box(number, count, first),
        BetType::AB => pair(0, 1),
        BetType::BC => pair(1, 2),
        BetType::AC => pair(0, 2),
        BetType::A => single(0),
        BetType::B => single(1),
        BetType::C => single(2),
    };

    match target {
        Some(t) if t == number => match bet_type {
            BetType::AB | BetType::BC | BetType::AC => {
                Score::hit(PAIR, count, WinType::Pair(bet_type))
            }
            _ => Score::hit(SINGLE, count, WinType::Single(bet_type)),
        },
        _ => Score::MISS,
    }
}
