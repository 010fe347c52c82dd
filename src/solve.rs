use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Milliseconds added to the raw time by a +2 penalty
pub const PLUS_TWO_MS: u64 = 2000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Penalty {
    #[default]
    None,
    #[serde(rename = "+2")]
    Plus2,
    Dnf,
}

impl Penalty {
    /// Text form used by the database and CSV files
    pub fn as_str(&self) -> &'static str {
        match self {
            Penalty::None => "none",
            Penalty::Plus2 => "+2",
            Penalty::Dnf => "dnf",
        }
    }
}

impl fmt::Display for Penalty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown penalty '{0}'")]
pub struct UnknownPenalty(pub String);

impl FromStr for Penalty {
    type Err = UnknownPenalty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" | "ok" => Ok(Penalty::None),
            "+2" | "plus2" => Ok(Penalty::Plus2),
            "dnf" => Ok(Penalty::Dnf),
            other => Err(UnknownPenalty(other.to_string())),
        }
    }
}

/// Time used for ranking and averaging after the penalty is applied.
///
/// `Dnf` orders above every finite time, so sorting a window puts
/// DNFs in the slowest slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EffectiveTime {
    Finite(u64),
    Dnf,
}

impl EffectiveTime {
    pub fn finite(&self) -> Option<u64> {
        match self {
            EffectiveTime::Finite(ms) => Some(*ms),
            EffectiveTime::Dnf => None,
        }
    }

    pub fn is_dnf(&self) -> bool {
        matches!(self, EffectiveTime::Dnf)
    }
}

/// A single recorded solve. `time_ms` is always the raw time, before any penalty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solve {
    pub time_ms: u64,
    pub penalty: Penalty,
    pub scramble: Option<String>,
    pub recorded_at: DateTime<Local>,
}

impl Solve {
    pub fn new(time_ms: u64, penalty: Penalty) -> Self {
        Self {
            time_ms,
            penalty,
            scramble: None,
            recorded_at: Local::now(),
        }
    }

    pub fn with_scramble(mut self, scramble: impl Into<String>) -> Self {
        self.scramble = Some(scramble.into());
        self
    }

    pub fn effective_time(&self) -> EffectiveTime {
        match self.penalty {
            Penalty::None => EffectiveTime::Finite(self.time_ms),
            Penalty::Plus2 => EffectiveTime::Finite(self.time_ms + PLUS_TWO_MS),
            Penalty::Dnf => EffectiveTime::Dnf,
        }
    }
}
