use serde::{Deserialize, Serialize};

/// Credentials handed out by the stats service at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    #[serde(default)]
    pub write_token: String,
    #[serde(default)]
    pub public_id: String,
}

impl SyncConfig {
    pub fn is_complete(&self) -> bool {
        !self.write_token.is_empty() && !self.public_id.is_empty()
    }
}

/// Liveness state of the sync loop.
///
/// Fields this version doesn't know about are carried through `extra`
/// so a read-modify-write never drops them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCache {
    /// Epoch milliseconds of the last successful sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Layout of the pre-folder state file (`~/.claude-stats-state`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LegacyState {
    pub write_token: Option<String>,
    pub public_id: Option<String>,
}
