use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::record::{EventRecord, RecordKind, Score};

/// Body of a reliability score update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityUpdate {
    #[serde(rename = "logID")]
    pub source_id: String,
    /// Delta or absolute value, depending on `is_delta`.
    #[serde(rename = "reliabilityScore")]
    pub amount: Score,
    #[serde(rename = "isDelta")]
    pub is_delta: bool,
    /// Free-form note explaining the update.
    #[serde(default)]
    pub info: String,
}

impl ReliabilityUpdate {
    pub fn delta(source_id: impl Into<String>, amount: Score) -> Self {
        Self {
            source_id: source_id.into(),
            amount,
            is_delta: true,
            info: String::new(),
        }
    }

    pub fn absolute(source_id: impl Into<String>, amount: Score) -> Self {
        Self {
            source_id: source_id.into(),
            amount,
            is_delta: false,
            info: String::new(),
        }
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }

    /// Score after applying this update to `current`.
    ///
    /// Delta updates add (the amount may be negative); absolute updates
    /// discard `current`. No clamping is performed.
    pub fn apply(&self, current: Score) -> Score {
        if self.is_delta {
            current + self.amount
        } else {
            self.amount
        }
    }
}

/// One ledger call, as persisted in the local append log.
///
/// Serialized adjacently tagged: the snake_case variant name is the
/// `operation` tag and the variant body is the `payload`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "payload", rename_all = "snake_case")]
pub enum Operation {
    /// Replace the whole reliability table.
    InitSources { sources: BTreeMap<String, Score> },
    CreateLogRecord(EventRecord),
    CreateFeedbackRecord(EventRecord),
    CreateReliabilityRecord(EventRecord),
    CreateReliabilityRecordsBatch { records: Vec<EventRecord> },
    UpdateReliabilityRecord(ReliabilityUpdate),
    DeleteRecord {
        #[serde(rename = "logID")]
        record_id: String,
    },
}

impl Operation {
    /// The `operation` tag written to the log.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::InitSources { .. } => "init_sources",
            Self::CreateLogRecord(_) => "create_log_record",
            Self::CreateFeedbackRecord(_) => "create_feedback_record",
            Self::CreateReliabilityRecord(_) => "create_reliability_record",
            Self::CreateReliabilityRecordsBatch { .. } => "create_reliability_records_batch",
            Self::UpdateReliabilityRecord(_) => "update_reliability_record",
            Self::DeleteRecord { .. } => "delete_record",
        }
    }

    /// Kind of records this operation creates, if it is a creation.
    pub fn creates(&self) -> Option<RecordKind> {
        match self {
            Self::CreateLogRecord(_) => Some(RecordKind::Log),
            Self::CreateFeedbackRecord(_) => Some(RecordKind::Feedback),
            Self::InitSources { .. }
            | Self::CreateReliabilityRecord(_)
            | Self::CreateReliabilityRecordsBatch { .. } => Some(RecordKind::Reliability),
            Self::UpdateReliabilityRecord(_) | Self::DeleteRecord { .. } => None,
        }
    }

    /// IDs of every record this operation touches, in payload order.
    pub fn touched_ids(&self) -> Vec<&str> {
        match self {
            Self::InitSources { sources } => sources.keys().map(String::as_str).collect(),
            Self::CreateLogRecord(r) | Self::CreateFeedbackRecord(r) | Self::CreateReliabilityRecord(r) => {
                vec![r.record_id.as_str()]
            }
            Self::CreateReliabilityRecordsBatch { records } => {
                records.iter().map(|r| r.record_id.as_str()).collect()
            }
            Self::UpdateReliabilityRecord(u) => vec![u.source_id.as_str()],
            Self::DeleteRecord { record_id } => vec![record_id.as_str()],
        }
    }

    pub fn touches(&self, id: &str) -> bool {
        self.touched_ids().contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn adjacently_tagged_layout() {
        let op = Operation::DeleteRecord {
            record_id: "l1".into(),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["operation"], "delete_record");
        assert_eq!(json["payload"]["logID"], "l1");
    }

    #[test]
    fn tag_matches_serialized_tag() {
        let ops = vec![
            Operation::InitSources {
                sources: BTreeMap::from([("s".to_string(), 1.0)]),
            },
            Operation::CreateLogRecord(EventRecord::event(RecordKind::Log, "l", "x")),
            Operation::CreateFeedbackRecord(EventRecord::event(RecordKind::Feedback, "f", "x")),
            Operation::CreateReliabilityRecord(EventRecord::reliability("s", 100.0)),
            Operation::CreateReliabilityRecordsBatch {
                records: vec![EventRecord::reliability("a", 1.0)],
            },
            Operation::UpdateReliabilityRecord(ReliabilityUpdate::delta("s", 0.5)),
            Operation::DeleteRecord {
                record_id: "l".into(),
            },
        ];
        for op in ops {
            let json = serde_json::to_value(&op).unwrap();
            assert_eq!(json["operation"], op.tag());
            let back: Operation = serde_json::from_value(json).unwrap();
            assert_eq!(back, op);
        }
    }

    #[test]
    fn update_info_defaults_to_empty() {
        let json = serde_json::json!({
            "operation": "update_reliability_record",
            "payload": {"logID": "s", "reliabilityScore": 2.0, "isDelta": false}
        });
        let op: Operation = serde_json::from_value(json).unwrap();
        assert_eq!(op, Operation::UpdateReliabilityRecord(ReliabilityUpdate::absolute("s", 2.0)));
    }

    #[test]
    fn creation_kinds() {
        let batch = Operation::CreateReliabilityRecordsBatch { records: vec![] };
        assert_eq!(batch.creates(), Some(RecordKind::Reliability));
        let upd = Operation::UpdateReliabilityRecord(ReliabilityUpdate::delta("s", 1.0));
        assert_eq!(upd.creates(), None);
    }

    #[test]
    fn touched_ids_cover_every_source() {
        let op = Operation::InitSources {
            sources: BTreeMap::from([("b".to_string(), 1.0), ("a".to_string(), 2.0)]),
        };
        assert_eq!(op.touched_ids(), vec!["a", "b"]);
        assert!(op.touches("a"));
        assert!(!op.touches("c"));
    }

    #[test]
    fn absolute_update_discards_prior() {
        assert_eq!(ReliabilityUpdate::absolute("s", 1.0).apply(0.7), 1.0);
    }

    proptest! {
        #[test]
        fn deltas_accumulate(old in -1.0e3f32..1.0e3, a in -1.0e3f32..1.0e3, b in -1.0e3f32..1.0e3) {
            let once = ReliabilityUpdate::delta("s", a).apply(old);
            let twice = ReliabilityUpdate::delta("s", b).apply(once);
            prop_assert_eq!(twice, old + a + b);
        }

        #[test]
        fn absolute_ignores_history(old in any::<f32>(), a in -1.0e3f32..1.0e3) {
            prop_assert_eq!(ReliabilityUpdate::absolute("s", a).apply(old), a);
        }
    }
}
