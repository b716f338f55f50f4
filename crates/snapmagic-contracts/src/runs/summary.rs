use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::photos::{EditFailureKind, PhotoStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoOutcome {
    pub photo_id: String,
    pub name: String,
    pub status: PhotoStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<EditFailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub tool: String,
    pub provider: String,
    pub total: u64,
    pub done: u64,
    pub failed: u64,
    pub photos: Vec<PhotoOutcome>,
}

impl BatchSummary {
    pub fn all_done(&self) -> bool {
        self.failed == 0 && self.done == self.total
    }
}

pub fn write_summary(path: &Path, summary: &BatchSummary) -> anyhow::Result<()> {
    let mut payload = serde_json::to_value(summary)?;
    if let Some(object) = payload.as_object_mut() {
        object.insert("ts".to_string(), serde_json::Value::String(now_utc_iso()));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&payload)?)?;
    Ok(())
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
