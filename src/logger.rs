use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

use crate::diff::diff_json;
use crate::protocol::Form;

const REDACTED: &str = "***";

/// How poll bodies are written to the wire log.
pub enum MessageLogMode {
    Full,
    /// First body in full, then only the changed paths.
    Diffed,
}

/// NDJSON log of every exchange with the web API.
pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
    previous_state: Option<Value>,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            mode,
            file,
            previous_state: None,
        })
    }

    pub fn log_request(&mut self, method: &str, path: &str, status: Option<u16>, form: Option<&Form>) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "method": method,
            "path": path,
            "status": status,
            "body": form.map(redacted),
        });
        self.write_line(&entry);
    }

    pub fn log_command(&mut self, action: &str, status: Option<u16>, form: &Form) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "cmd",
            "action": action,
            "status": status,
            "body": redacted(form),
        });
        self.write_line(&entry);
    }

    pub fn log_poll(&mut self, status: u16, body: &str) {
        let body: Value = serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()));

        match self.mode {
            MessageLogMode::Full => {
                let entry = json!({
                    "ts": Utc::now().to_rfc3339(),
                    "dir": "poll",
                    "status": status,
                    "body": body,
                });
                self.write_line(&entry);
            }
            MessageLogMode::Diffed => {
                let entry = match &self.previous_state {
                    None => json!({
                        "ts": Utc::now().to_rfc3339(),
                        "dir": "poll",
                        "status": status,
                        "full": true,
                        "body": body,
                    }),
                    Some(prev) => {
                        let mut changes = Vec::new();
                        diff_json(prev, &body, "", &mut changes);
                        let change_entries: Vec<Value> = changes
                            .iter()
                            .map(|(path, old, new)| json!({ "path": path, "old": old, "new": new }))
                            .collect();
                        json!({
                            "ts": Utc::now().to_rfc3339(),
                            "dir": "poll",
                            "status": status,
                            "changes": change_entries,
                        })
                    }
                };
                self.write_line(&entry);
                self.previous_state = Some(body);
            }
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

/// Form as a JSON object with credentials masked.
fn redacted(form: &Form) -> Value {
    let map = form
        .iter()
        .map(|(key, value)| {
            let value = match *key {
                "password" | "token" => REDACTED.to_string(),
                _ => value.clone(),
            };
            (key.to_string(), Value::String(value))
        })
        .collect();
    Value::Object(map)
}
