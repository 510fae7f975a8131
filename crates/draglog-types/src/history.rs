use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::record::EventRecord;

/// One committed version in a record's change history.
///
/// `record` is present if and only if the version is not a deletion. The
/// constructors and deserialization both enforce this.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawHistoryEntry")]
pub struct HistoryEntry {
    record: Option<EventRecord>,
    timestamp: String,
    #[serde(rename = "txID")]
    transaction_id: String,
    #[serde(rename = "isDelete")]
    is_delete: bool,
}

impl HistoryEntry {
    /// A version that wrote `record`.
    pub fn version(record: EventRecord, timestamp: String, transaction_id: String) -> Self {
        Self {
            record: Some(record),
            timestamp,
            transaction_id,
            is_delete: false,
        }
    }

    /// A version that removed the record.
    pub fn deletion(timestamp: String, transaction_id: String) -> Self {
        Self {
            record: None,
            timestamp,
            transaction_id,
            is_delete: true,
        }
    }

    pub fn record(&self) -> Option<&EventRecord> {
        self.record.as_ref()
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    pub fn is_delete(&self) -> bool {
        self.is_delete
    }
}

/// Wire shape as returned by the remote ledger.
///
/// The remote ledger fills `record` with a stub carrying only the ID on
/// deletions; that stub is dropped here.
#[derive(Deserialize)]
struct RawHistoryEntry {
    record: Option<serde_json::Value>,
    timestamp: String,
    #[serde(rename = "txID")]
    transaction_id: String,
    #[serde(rename = "isDelete")]
    is_delete: bool,
}

impl TryFrom<RawHistoryEntry> for HistoryEntry {
    type Error = TypeError;

    fn try_from(raw: RawHistoryEntry) -> Result<Self, Self::Error> {
        match (raw.is_delete, raw.record) {
            (true, _) => Ok(Self::deletion(raw.timestamp, raw.transaction_id)),
            (false, Some(record)) => {
                let record: EventRecord = serde_json::from_value(record)
                    .map_err(|e| TypeError::Serialization(e.to_string()))?;
                Ok(Self::version(record, raw.timestamp, raw.transaction_id))
            }
            (false, None) => Err(TypeError::InvalidHistory(format!(
                "transaction {} has no record but is not a deletion",
                raw.transaction_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordKind;

    #[test]
    fn deletion_has_no_record() {
        let entry = HistoryEntry::deletion("1.000000000".into(), "tx".into());
        assert!(entry.is_delete());
        assert!(entry.record().is_none());
    }

    #[test]
    fn serde_roundtrip_version() {
        let entry = HistoryEntry::version(
            EventRecord::event(RecordKind::Log, "l1", "logger"),
            "1700000000.000000001".into(),
            "abc".into(),
        );
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"txID\":\"abc\""));
        assert!(json.contains("\"isDelete\":false"));
        let back: HistoryEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn remote_deletion_stub_is_dropped() {
        let json = r#"{
            "record": {"logID":"l1","loggerID":"","type":"","input":"","inputFrom":"",
                       "output":"","outputTo":"","reliabilityScore":0,"timestamp":"","reserved":""},
            "timestamp": "5.000000000",
            "txID": "t9",
            "isDelete": true
        }"#;
        let entry: HistoryEntry = serde_json::from_str(json).unwrap();
        assert!(entry.is_delete());
        assert!(entry.record().is_none());
        assert_eq!(entry.transaction_id(), "t9");
    }

    #[test]
    fn missing_record_without_delete_is_rejected() {
        let json = r#"{"record": null, "timestamp": "1", "txID": "t", "isDelete": false}"#;
        assert!(serde_json::from_str::<HistoryEntry>(json).is_err());
    }
}
