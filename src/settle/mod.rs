pub mod payout;
pub mod rates;

pub use payout::{score, Score, WinType};
pub use rates::{rate_for, AgentRates, RateMode, RateResolver};
