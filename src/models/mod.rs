pub mod leaderboard;

pub use leaderboard::{ContractViolation, LeaderboardEntry, LeaderboardResponse, TimeFrame};
