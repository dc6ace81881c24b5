use serde::{Deserialize, Serialize};

/// One aggregated (day, model) usage total, the unit uploaded to the stats service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Calendar day, `YYYY-MM-DD`.
    pub date: String,
    /// Normalized model name ("Opus", "Sonnet", "Haiku" or the raw name).
    pub model: String,
    pub input: u64,
    pub output: u64,
}

impl UsageRecord {
    pub fn total_tokens(&self) -> u64 {
        self.input.saturating_add(self.output)
    }
}
