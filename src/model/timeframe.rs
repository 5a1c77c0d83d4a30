use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Minutes in one regular trading day (6.5 hours), used to scale intraday
/// bar counts to a trading year.
pub const TRADING_DAY_MINUTES: u32 = 390;

/// Trading days per calendar year.
pub const TRADING_DAYS_PER_YEAR: u32 = 252;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    Day,
    Week,
    /// Intraday bars of a fixed minute span (e.g. 5, 15, 60).
    Min(u32),
}

impl Timeframe {
    /// Parse a timeframe string like "1d", "1w", "5m", "60m".
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() < 2 {
            bail!("invalid timeframe '{}': expected format like '1d' or '5m'", s);
        }
        let (num_str, suffix) = s.split_at(s.len() - 1);
        let n: u32 = num_str
            .parse()
            .with_context(|| format!("invalid timeframe '{}': quantity must be a positive integer", s))?;
        if n == 0 {
            bail!("invalid timeframe '{}': quantity must be > 0", s);
        }
        match suffix {
            "d" if n == 1 => Ok(Timeframe::Day),
            "w" if n == 1 => Ok(Timeframe::Week),
            "d" | "w" => bail!("invalid timeframe '{}': only 1d and 1w are supported", s),
            "m" => {
                if n > TRADING_DAY_MINUTES {
                    bail!("invalid timeframe '{}': intraday span exceeds one trading day", s);
                }
                Ok(Timeframe::Min(n))
            }
            _ => bail!(
                "invalid timeframe '{}': unsupported suffix '{}', expected one of m/d/w",
                s,
                suffix
            ),
        }
    }

    /// Expected number of bars in one trading year at this timeframe.
    /// Intraday counts assume a 390-minute trading day.
    pub fn bars_per_trading_year(&self) -> u32 {
        match self {
            Timeframe::Day => TRADING_DAYS_PER_YEAR,
            Timeframe::Week => 52,
            Timeframe::Min(minutes) => {
                let per_day = TRADING_DAY_MINUTES.div_ceil(*minutes);
                TRADING_DAYS_PER_YEAR * per_day
            }
        }
    }

    pub fn label(&self) -> String {
        match self {
            Timeframe::Day => "1d".to_string(),
            Timeframe::Week => "1w".to_string(),
            Timeframe::Min(n) => format!("{}m", n),
        }
    }
}
