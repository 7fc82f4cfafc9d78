use core::fmt;

use clap::{Parser, Subcommand};

use crate::models::leaderboard::{LeaderboardEntry, LeaderboardResponse, TimeFrame};

#[derive(Parser, Debug)]
#[command(version, about = "Leaderboard client and startup tooling")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch the leaderboard for a time frame and print it
    Fetch {
        /// Reporting window (daily, weekly, monthly, all-time); other values are sent as-is
        #[arg(short, long, default_value = "weekly")]
        time_frame: TimeFrame,

        /// Print the response as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Apply pending database migrations
    Migrate,

    /// Print the resolved configuration
    Config,
}

/// Plain-text rendering of a leaderboard snapshot.
pub struct LeaderboardTable<'a> {
    time_frame: &'a TimeFrame,
    leaderboard: &'a LeaderboardResponse,
}

impl<'a> LeaderboardTable<'a> {
    pub fn new(time_frame: &'a TimeFrame, leaderboard: &'a LeaderboardResponse) -> Self {
        Self {
            time_frame,
            leaderboard,
        }
    }
}

impl fmt::Display for LeaderboardTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "leaderboard ({})", self.time_frame)?;

        if self.leaderboard.entries.is_empty() {
            writeln!(f, "no entries")?;
        } else {
            writeln!(
                f,
                "{:>5}  {:<20} {:>5} {:>8} {:>6} {:>6} {:>6}",
                "RANK", "NAME", "LEVEL", "XP", "STREAK", "BEST", "CHANGE"
            )?;
            for entry in &self.leaderboard.entries {
                write_row(f, &entry.rank.to_string(), entry)?;
            }
        }

        if let Some(me) = &self.leaderboard.current_user_entry {
            writeln!(f)?;
            write_row(f, &format!("you #{}", me.rank), me)?;
        }

        Ok(())
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, label: &str, entry: &LeaderboardEntry) -> fmt::Result {
    writeln!(
        f,
        "{:>5}  {:<20} {:>5} {:>8} {:>6} {:>6} {:>6}",
        label,
        entry.name,
        entry.level,
        entry.total_xp,
        entry.current_streak,
        entry.longest_streak,
        format_change(entry.change)
    )
}

pub fn format_change(change: i32) -> String {
    match change {
        0 => "=".to_string(),
        c if c > 0 => format!("+{c}"),
        c => c.to_string(),
    }
}
