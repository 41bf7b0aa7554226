//! Canonical draw identities and the alias table used to resolve the many
//! spellings the sales frontends send ("LSK 3 PM", "KERALA 3PM", "D-1", ...).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The scheduled draws this back office sells.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Draw {
    Dear1Pm,
    Kerala3Pm,
    Dear6Pm,
    Dear8Pm,
}

impl Draw {
    pub const ALL: [Draw; 4] = [Draw::Dear1Pm, Draw::Kerala3Pm, Draw::Dear6Pm, Draw::Dear8Pm];

    /// Operator-facing label, e.g. "KERALA 3 PM".
    pub fn label(&self) -> &'static str {
        match self {
            Draw::Dear1Pm => "DEAR 1 PM",
            Draw::Kerala3Pm => "KERALA 3 PM",
            Draw::Dear6Pm => "DEAR 6 PM",
            Draw::Dear8Pm => "DEAR 8 PM",
        }
    }
}

/// Normalized spellings (upper-case, whitespace removed) and the draw they mean.
const ALIASES: &[(&str, Draw)] = &[
    ("DEAR1PM", Draw::Dear1Pm),
    ("DEAR1", Draw::Dear1Pm),
    ("D-1", Draw::Dear1Pm),
    ("D1", Draw::Dear1Pm),
    ("KERALA3PM", Draw::Kerala3Pm),
    ("KERALA3", Draw::Kerala3Pm),
    ("LSK3PM", Draw::Kerala3Pm),
    ("LSK3", Draw::Kerala3Pm),
    ("DEAR6PM", Draw::Dear6Pm),
    ("DEAR6", Draw::Dear6Pm),
    ("D-6", Draw::Dear6Pm),
    ("D6", Draw::Dear6Pm),
    ("DEAR8PM", Draw::Dear8Pm),
    ("DEAR8", Draw::Dear8Pm),
    ("D-8", Draw::Dear8Pm),
    ("D8", Draw::Dear8Pm),
];

/// Upper-case with all whitespace removed.
pub fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// A draw as seen by storage and lookups: either one of the known draws or an
/// unrecognised label kept in normalized form.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DrawKey {
    Known(Draw),
    Other(String),
}

impl DrawKey {
    /// Resolve a free-form label through the alias table.
    pub fn resolve(label: &str) -> DrawKey {
        let normalized = normalize_label(label);
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == normalized)
            .map(|(_, draw)| DrawKey::Known(*draw))
            .unwrap_or(DrawKey::Other(normalized))
    }

    pub fn label(&self) -> &str {
        match self {
            DrawKey::Known(d) => d.label(),
            DrawKey::Other(s) => s,
        }
    }
}

impl From<Draw> for DrawKey {
    fn from(draw: Draw) -> Self {
        DrawKey::Known(draw)
    }
}

impl FromStr for DrawKey {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(crate::error::Error::Validation(
                "Draw label must not be empty".to_string(),
            ));
        }
        Ok(DrawKey::resolve(s))
    }
}

impl fmt::Display for DrawKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
