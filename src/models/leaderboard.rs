use core::fmt;
use std::convert::Infallible;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reporting window for a leaderboard query.
///
/// The set of windows is owned by the backend. Anything we don't recognise is kept verbatim in
/// [`TimeFrame::Other`] and sent as-is, leaving validation to the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum TimeFrame {
    Daily,
    #[default]
    Weekly,
    Monthly,
    AllTime,
    Other(String),
}

impl TimeFrame {
    pub fn known() -> [TimeFrame; 4] {
        [
            TimeFrame::Daily,
            TimeFrame::Weekly,
            TimeFrame::Monthly,
            TimeFrame::AllTime,
        ]
    }

    /// Wire form used for the `timeFrame` query parameter.
    pub fn as_str(&self) -> &str {
        match self {
            TimeFrame::Daily => "daily",
            TimeFrame::Weekly => "weekly",
            TimeFrame::Monthly => "monthly",
            TimeFrame::AllTime => "all-time",
            TimeFrame::Other(raw) => raw,
        }
    }
}

impl FromStr for TimeFrame {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "daily" => TimeFrame::Daily,
            "weekly" => TimeFrame::Weekly,
            "monthly" => TimeFrame::Monthly,
            "all-time" => TimeFrame::AllTime,
            other => TimeFrame::Other(other.to_string()),
        })
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ranked participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub name: String,
    pub avatar: String,
    pub total_xp: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub level: u32,
    /// Places gained since the previous period; negative when the participant dropped.
    pub change: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntry>,

    /// The requesting user's own position. Absent for anonymous or unranked users, and may sit
    /// outside of `entries`.
    #[serde(default)]
    pub current_user_entry: Option<LeaderboardEntry>,
}

impl LeaderboardResponse {
    /// Canonical result for a leaderboard with nothing in it.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.current_user_entry.is_none()
    }

    /// Checks the ordering and value constraints the backend promises for a snapshot, returning
    /// the first breach found.
    ///
    /// Entries are expected to arrive sorted; this never reorders anything.
    pub fn validate(&self) -> Result<(), ContractViolation> {
        let mut previous: Option<u32> = None;

        for (index, entry) in self.entries.iter().enumerate() {
            entry.validate()?;

            if let Some(prev) = previous
                && entry.rank <= prev
            {
                return Err(ContractViolation::RankOrder {
                    index,
                    previous: prev,
                    rank: entry.rank,
                });
            }
            previous = Some(entry.rank);
        }

        if let Some(entry) = &self.current_user_entry {
            entry.validate()?;
        }

        Ok(())
    }
}

impl LeaderboardEntry {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.rank == 0 {
            return Err(ContractViolation::ZeroRank {
                name: self.name.clone(),
            });
        }

        if self.level == 0 {
            return Err(ContractViolation::ZeroLevel { rank: self.rank });
        }

        if self.longest_streak < self.current_streak {
            return Err(ContractViolation::StreakExceedsLongest {
                rank: self.rank,
                current: self.current_streak,
                longest: self.longest_streak,
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    #[error("entry '{name}' has rank 0")]
    ZeroRank { name: String },

    #[error("entry at rank {rank} has level 0")]
    ZeroLevel { rank: u32 },

    #[error("entry {index} has rank {rank}, not after previous rank {previous}")]
    RankOrder { index: usize, previous: u32, rank: u32 },

    #[error("entry at rank {rank} has current streak {current} above longest streak {longest}")]
    StreakExceedsLongest { rank: u32, current: u32, longest: u32 },
}
