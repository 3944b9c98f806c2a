use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;
use uuid::Uuid;

use crate::types::{UnitIdentity, UnitState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLogMode {
    /// Every poll writes the full unit list.
    Full,
    /// First poll writes the full list, later polls only changed units.
    Diffed,
}

/// NDJSON log of controller traffic, one line per entry.
pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    previous: Option<Vec<UnitState>>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            mode,
            file,
            previous: None,
        })
    }

    pub fn log_request(&mut self, op: Uuid, method: &str, path: &str) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "op": op.to_string(),
            "dir": "req",
            "method": method,
            "path": path,
        });
        self.write_line(&entry);
    }

    pub fn log_command(&mut self, op: Uuid, unit: UnitIdentity, path: &str, body: &Value) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "op": op.to_string(),
            "dir": "cmd",
            "unit": unit.to_string(),
            "path": path,
            "body": body,
        });
        self.write_line(&entry);
    }

    pub fn log_failure(&mut self, op: Uuid, error: &crate::Error) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "op": op.to_string(),
            "dir": "err",
            "error": error.to_string(),
        });
        self.write_line(&entry);
    }

    pub fn log_poll(&mut self, op: Uuid, units: &[UnitState]) {
        let ts = Utc::now().to_rfc3339();
        let entry = match (self.mode, self.previous.as_deref()) {
            (MessageLogMode::Diffed, Some(previous)) => {
                let changed: Vec<&UnitState> = units
                    .iter()
                    .filter(|u| !previous.contains(u))
                    .collect();
                json!({ "ts": ts, "op": op.to_string(), "dir": "poll", "changes": changed })
            }
            (MessageLogMode::Diffed, None) => {
                json!({ "ts": ts, "op": op.to_string(), "dir": "poll", "full": true, "units": units })
            }
            (MessageLogMode::Full, _) => {
                json!({ "ts": ts, "op": op.to_string(), "dir": "poll", "units": units })
            }
        };
        self.write_line(&entry);
        if self.mode == MessageLogMode::Diffed {
            self.previous = Some(units.to_vec());
        }
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}
