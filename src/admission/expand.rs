//! Expansion of compact bet specifications into concrete per-number lines.

use crate::error::{Error, Result};
use crate::state::{default_unit_amount, BetType, LineKey};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

fn default_count() -> u32 {
    1
}

/// A bet line as the sales frontends send it.
///
/// Either `number` or `range` must be present. `width` selects the digit
/// width of range-generated numbers: 1 → one digit, 2 → two digits, anything
/// else → three, and it must match the bet type. `set` expands each number
/// into its distinct permutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLine {
    pub bet_type: BetType,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub range: Option<(u32, u32)>,
    #[serde(default)]
    pub width: Option<u8>,
    #[serde(default)]
    pub set: bool,
    /// Amount as sold; `unit × count` when absent.
    #[serde(default)]
    pub rate: Option<Decimal>,
    #[serde(default)]
    pub name: Option<String>,
}

impl RawLine {
    pub fn number(bet_type: BetType, number: &str, count: u32) -> Self {
        RawLine {
            bet_type,
            number: Some(number.to_string()),
            count,
            range: None,
            width: None,
            set: false,
            rate: None,
            name: None,
        }
    }

    pub fn range(bet_type: BetType, start: u32, end: u32, width: u8, count: u32) -> Self {
        RawLine {
            bet_type,
            number: None,
            count,
            range: Some((start, end)),
            width: Some(width),
            set: false,
            rate: None,
            name: None,
        }
    }

    pub fn with_set(mut self) -> Self {
        self.set = true;
        self
    }
}

/// One concrete number after expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetLine {
    pub bet_type: BetType,
    pub number: String,
    pub count: u32,
    pub rate: Option<Decimal>,
    pub name: Option<String>,
}

impl BetLine {
    pub fn key(&self) -> LineKey {
        LineKey::new(self.bet_type, self.number.clone())
    }

    /// Amount recorded on the persisted entry.
    pub fn amount(&self) -> Decimal {
        self.rate
            .unwrap_or_else(|| default_unit_amount(&self.number) * Decimal::from(self.count))
    }
}

fn toggle_width(width: Option<u8>) -> usize {
    match width {
        Some(1) => 1,
        Some(2) => 2,
        _ => 3,
    }
}

/// Distinct digit permutations of `number`, sorted.
pub fn permutations(number: &str) -> Vec<String> {
    let mut digits: Vec<char> = number.chars().collect();
    digits.sort_unstable();
    let mut out = vec![digits.iter().collect::<String>()];

    // Next lexicographic permutation; starting from the sorted order visits
    // every distinct arrangement exactly once.
    loop {
        let Some(i) = (1..digits.len()).rev().find(|&i| digits[i - 1] < digits[i]) else {
            break;
        };
        let pivot = i - 1;
        let Some(j) = (i..digits.len()).rev().find(|&j| digits[j] > digits[pivot]) else {
            break;
        };
        digits.swap(pivot, j);
        digits[i..].reverse();
        out.push(digits.iter().collect());
    }
    out
}

fn validate_number(bet_type: BetType, number: &str) -> Result<()> {
    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::Validation(format!(
            "Number must be digits only, got {:?}",
            number
        )));
    }
    if number.len() != bet_type.width() {
        return Err(Error::Validation(format!(
            "{} needs a {}-digit number, got {}",
            bet_type,
            bet_type.width(),
            number
        )));
    }
    Ok(())
}

fn numbers_of(line: &RawLine) -> Result<Vec<String>> {
    let base: Vec<String> = match (&line.range, &line.number) {
        (Some((start, end)), _) => {
            if start > end {
                return Err(Error::Validation(format!(
                    "Range start {} is after range end {}",
                    start, end
                )));
            }
            let width = toggle_width(line.width);
            if width != line.bet_type.width() {
                return Err(Error::Validation(format!(
                    "{} needs {}-digit numbers, got a {}-digit range",
                    line.bet_type,
                    line.bet_type.width(),
                    width
                )));
            }
            if u64::from(*end) >= 10u64.pow(width as u32) {
                return Err(Error::Validation(format!(
                    "Range end {} does not fit in {} digits",
                    end, width
                )));
            }
            (*start..=*end)
                .map(|n| format!("{:0width$}", n, width = width))
                .collect()
        }
        (None, Some(number)) => {
            let number = number.trim();
            // Width first; only valid numbers are permuted
            validate_number(line.bet_type, number)?;
            vec![number.to_string()]
        }
        (None, None) => {
            return Err(Error::Validation(
                "Line needs a number or a range".to_string(),
            ))
        }
    };

    if !line.set {
        return Ok(base);
    }
    Ok(base.iter().flat_map(|n| permutations(n)).collect())
}

/// Expand a batch into concrete lines.
///
/// Every produced number is validated against its bet type width; a bad line
/// fails the whole batch.
pub fn expand(lines: &[RawLine]) -> Result<Vec<BetLine>> {
    if lines.is_empty() {
        return Err(Error::Validation("No entries provided".to_string()));
    }

    let mut out = Vec::new();
    for line in lines {
        if line.count == 0 {
            return Err(Error::Validation(
                "Count must be greater than zero".to_string(),
            ));
        }
        for number in numbers_of(line)? {
            validate_number(line.bet_type, &number)?;
            out.push(BetLine {
                bet_type: line.bet_type,
                number,
                count: line.count,
                rate: line.rate,
                name: line.name.clone(),
            });
        }
    }
    Ok(out)
}
