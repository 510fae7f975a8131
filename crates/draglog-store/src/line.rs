use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use draglog_types::Operation;

use crate::error::{Result, StoreError};

/// The on-disk unit of the append log.
///
/// On-disk format (one line, UTF-8):
/// ```text
/// {"timestamp":"<RFC 3339 append time>","operation":"<tag>","payload":{...}}
/// ```
///
/// `timestamp` is when the line was appended, distinct from any timestamp
/// carried inside the payload.
#[derive(Clone, Debug, PartialEq)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub operation: Operation,
}

#[derive(Serialize, Deserialize)]
struct WireLine {
    timestamp: DateTime<Utc>,
    operation: String,
    payload: Value,
}

impl LogLine {
    /// A line for `operation` stamped with the current time.
    pub fn now(operation: Operation) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
        }
    }

    /// Encode as a single JSON line without the trailing newline.
    pub fn encode(&self) -> Result<String> {
        let mut tagged = serde_json::to_value(&self.operation)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let payload = tagged
            .get_mut("payload")
            .map(Value::take)
            .unwrap_or(Value::Null);

        let wire = WireLine {
            timestamp: self.timestamp,
            operation: self.operation.tag().to_string(),
            payload,
        };
        serde_json::to_string(&wire).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Decode one line of text.
    pub fn decode(text: &str) -> std::result::Result<Self, serde_json::Error> {
        let wire: WireLine = serde_json::from_str(text)?;
        let operation = serde_json::from_value(serde_json::json!({
            "operation": wire.operation,
            "payload": wire.payload,
        }))?;
        Ok(Self {
            timestamp: wire.timestamp,
            operation,
        })
    }

    /// Append time in the ledger's `<seconds>.<nanoseconds>` form.
    pub fn ledger_timestamp(&self) -> String {
        format!(
            "{}.{:09}",
            self.timestamp.timestamp(),
            self.timestamp.timestamp_subsec_nanos()
        )
    }
}
