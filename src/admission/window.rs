use crate::error::{Error, Result};
use crate::state::{DrawKey, DrawWindow, Role};
use crate::storage::Storage;
use chrono::{Days, NaiveDate, NaiveDateTime};

/// Where `now` falls relative to a draw's block window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowDecision {
    pub window: DrawWindow,
    pub blocked: bool,
    /// `None` while blocked.
    pub settlement_date: Option<NaiveDate>,
}

impl WindowDecision {
    /// Settlement date, or `WindowBlocked` if inside the window.
    pub fn open_date(&self) -> Result<NaiveDate> {
        self.settlement_date.ok_or_else(|| Error::WindowBlocked {
            draw: self.window.draw.to_string(),
            block: self.window.block,
            unblock: self.window.unblock,
        })
    }
}

/// Decide against a known window.
///
/// Both times are taken on `now`'s calendar day: blocked while
/// `block <= now < unblock`, settle today before `block`, tomorrow from
/// `unblock` on.
pub fn decide(window: &DrawWindow, now: NaiveDateTime) -> Result<WindowDecision> {
    let t = now.time();
    let today = now.date();
    let blocked = window.block <= t && t < window.unblock;

    let settlement_date = if blocked {
        None
    } else if t < window.block {
        Some(today)
    } else {
        let tomorrow = today
            .checked_add_days(Days::new(1))
            .ok_or_else(|| Error::Validation(format!("No calendar day after {}", today)))?;
        Some(tomorrow)
    };

    Ok(WindowDecision {
        window: window.clone(),
        blocked,
        settlement_date,
    })
}

pub struct DrawWindowResolver<'a, S: Storage + ?Sized> {
    storage: &'a S,
}

impl<'a, S: Storage + ?Sized> DrawWindowResolver<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        DrawWindowResolver { storage }
    }

    fn window(&self, draw: &DrawKey, role: &Role) -> Result<DrawWindow> {
        self.storage.get_window(draw, role)?.ok_or_else(|| {
            Error::ConfigurationMissing(format!(
                "No block time configuration found for draw: {} ({})",
                draw, role
            ))
        })
    }

    pub fn resolve(
        &self,
        draw: &DrawKey,
        role: &Role,
        now: NaiveDateTime,
    ) -> Result<WindowDecision> {
        decide(&self.window(draw, role)?, now)
    }

    /// Whether the block time on `entry_date` has been reached, after which
    /// lines recorded for that date are frozen.
    pub fn cutoff_passed(
        &self,
        draw: &DrawKey,
        role: &Role,
        entry_date: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<bool> {
        let window = self.window(draw, role)?;
        Ok(now >= entry_date.and_time(window.block))
    }
}
