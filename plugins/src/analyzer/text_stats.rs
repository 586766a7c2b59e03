use anyhow::Context;
use batchlint_core::worker::ItemProcessor;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_LINE_LENGTH: usize = 120;

#[derive(Debug, Clone, Deserialize)]
pub struct TextStatsConfig {
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

fn default_max_line_length() -> usize {
    DEFAULT_MAX_LINE_LENGTH
}

impl Default for TextStatsConfig {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl TextStatsConfig {
    /// Reads the `[analyzer]` table. `null` means "use defaults".
    pub fn from_value(value: &serde_json::Value) -> anyhow::Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        let cfg: Self =
            serde_json::from_value(value.clone()).context("invalid text-stats analyzer config")?;
        if cfg.max_line_length == 0 {
            anyhow::bail!("max_line_length must be greater than 0");
        }
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextStats {
    pub lines: usize,
    pub bytes: usize,
    /// 1-based line numbers longer than `max_line_length` characters.
    pub long_lines: Vec<usize>,
    /// 1-based line numbers ending in spaces or tabs.
    pub trailing_whitespace: Vec<usize>,
}

/// Per-file line statistics. Reads each item as a UTF-8 file path.
pub struct TextStatsAnalyzer {
    config: TextStatsConfig,
}

impl TextStatsAnalyzer {
    pub fn new(config: TextStatsConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, text: &str) -> TextStats {
        let mut stats = TextStats {
            bytes: text.len(),
            ..TextStats::default()
        };

        for (idx, line) in text.lines().enumerate() {
            stats.lines += 1;
            if line.chars().count() > self.config.max_line_length {
                stats.long_lines.push(idx + 1);
            }
            if line.ends_with([' ', '\t']) {
                stats.trailing_whitespace.push(idx + 1);
            }
        }
        stats
    }
}

impl ItemProcessor for TextStatsAnalyzer {
    fn process_item(&mut self, item_id: &str) -> anyhow::Result<serde_json::Value> {
        let text = std::fs::read_to_string(item_id).with_context(|| format!("read {item_id}"))?;
        let stats = self.analyze(&text);
        tracing::trace!(
            item = item_id,
            lines = stats.lines,
            long_lines = stats.long_lines.len(),
            "analyzed file"
        );
        Ok(serde_json::to_value(stats)?)
    }
}
