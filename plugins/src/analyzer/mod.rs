pub mod text_stats;

pub use text_stats::{TextStats, TextStatsAnalyzer, TextStatsConfig};
