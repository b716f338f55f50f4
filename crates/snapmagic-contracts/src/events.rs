use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

/// JSONL log of batch activity. `batch_id` is `null` until a batch tags the
/// writer; clones share the tag and the file.
#[derive(Debug, Clone)]
pub struct EventWriter {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    path: PathBuf,
    batch_id: Mutex<Option<String>>,
    file_lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            shared: Arc::new(Shared {
                path: path.into(),
                batch_id: Mutex::new(None),
                file_lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    pub fn batch_id(&self) -> Option<String> {
        self.shared
            .batch_id
            .lock()
            .ok()
            .and_then(|current| current.clone())
    }

    pub fn set_batch_id(&self, batch_id: impl Into<String>) {
        if let Ok(mut current) = self.shared.batch_id.lock() {
            *current = Some(batch_id.into());
        }
    }

    /// Appends one event. Payload keys win over `type`, `batch_id` and `ts`.
    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::from(event_type));
        event.insert(
            "batch_id".to_string(),
            self.batch_id().map(Value::from).unwrap_or(Value::Null),
        );
        event.insert(
            "ts".to_string(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)),
        );
        event.extend(payload);

        if let Some(parent) = self.shared.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(&event)?;
        line.push('\n');

        let _guard = self
            .shared
            .file_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event log lock poisoned"))?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.shared.path)?
            .write_all(line.as_bytes())?;

        Ok(Value::Object(event))
    }
}
