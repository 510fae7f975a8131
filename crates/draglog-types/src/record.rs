use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;

/// Reliability score of a data source.
///
/// The remote ledger stores scores as 32-bit floats; keeping the same width
/// locally makes delta arithmetic reproduce the remote results exactly.
pub type Score = f32;

/// Sentinel score carried by records for which reliability does not apply.
pub const NOT_APPLICABLE: Score = -1.0;

/// Classification of an [`EventRecord`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// A logged transformation from an input to an output.
    Log,
    /// Feedback about an earlier output.
    Feedback,
    /// The reliability score of a data source.
    Reliability,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [Self::Log, Self::Feedback, Self::Reliability];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Feedback => "feedback",
            Self::Reliability => "reliability",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "log" => Ok(Self::Log),
            "feedback" => Ok(Self::Feedback),
            "reliability" => Ok(Self::Reliability),
            other => Err(format!("unknown record kind: {other}")),
        }
    }
}

/// One provenance entry.
///
/// Field names on the wire match the remote ledger (`logID`, `type`, ...), so
/// records produced locally and records fetched remotely are interchangeable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Log event ID, or the data source ID for reliability records.
    #[serde(rename = "logID")]
    pub record_id: String,
    /// Actor that produced the event; empty for reliability records.
    #[serde(rename = "loggerID")]
    pub logger_id: String,
    #[serde(rename = "type")]
    pub kind: RecordKind,
    /// Opaque payload or digest.
    pub input: String,
    #[serde(rename = "inputFrom")]
    pub input_from: String,
    pub output: String,
    #[serde(rename = "outputTo")]
    pub output_to: String,
    /// Meaningful only for reliability records; [`NOT_APPLICABLE`] otherwise.
    #[serde(rename = "reliabilityScore")]
    pub reliability_score: Score,
    /// Caller-supplied ISO-8601 time of the event.
    pub timestamp: String,
    pub reserved: String,
}

impl EventRecord {
    /// Build a reliability record for `source_id` carrying `score`.
    pub fn reliability(source_id: impl Into<String>, score: Score) -> Self {
        Self {
            record_id: source_id.into(),
            logger_id: String::new(),
            kind: RecordKind::Reliability,
            input: String::new(),
            input_from: String::new(),
            output: String::new(),
            output_to: String::new(),
            reliability_score: score,
            timestamp: String::new(),
            reserved: String::new(),
        }
    }

    /// Build an empty record of a non-reliability kind.
    pub fn event(kind: RecordKind, record_id: impl Into<String>, logger_id: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            logger_id: logger_id.into(),
            kind,
            input: String::new(),
            input_from: String::new(),
            output: String::new(),
            output_to: String::new(),
            reliability_score: NOT_APPLICABLE,
            timestamp: String::new(),
            reserved: String::new(),
        }
    }

    /// Re-tag this record as `kind`, resetting the score sentinel when the
    /// new kind carries no score. This is what the ledger does on create.
    pub fn into_kind(mut self, kind: RecordKind) -> Self {
        self.kind = kind;
        if kind != RecordKind::Reliability {
            self.reliability_score = NOT_APPLICABLE;
        }
        self
    }

    /// Check the score sentinel invariant.
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.kind != RecordKind::Reliability && self.reliability_score != NOT_APPLICABLE {
            return Err(TypeError::ScoreNotApplicable {
                kind: self.kind,
                score: self.reliability_score,
            });
        }
        Ok(())
    }

    /// Flatten into a field-name → value mapping using the wire field names.
    pub fn to_flat(&self) -> BTreeMap<String, Value> {
        let mut map = BTreeMap::new();
        map.insert("logID".into(), Value::from(self.record_id.clone()));
        map.insert("loggerID".into(), Value::from(self.logger_id.clone()));
        map.insert("type".into(), Value::from(self.kind.as_str()));
        map.insert("input".into(), Value::from(self.input.clone()));
        map.insert("inputFrom".into(), Value::from(self.input_from.clone()));
        map.insert("output".into(), Value::from(self.output.clone()));
        map.insert("outputTo".into(), Value::from(self.output_to.clone()));
        map.insert(
            "reliabilityScore".into(),
            Value::from(f64::from(self.reliability_score)),
        );
        map.insert("timestamp".into(), Value::from(self.timestamp.clone()));
        map.insert("reserved".into(), Value::from(self.reserved.clone()));
        map
    }

    /// Rebuild a record from a mapping produced by [`EventRecord::to_flat`].
    pub fn from_flat(map: BTreeMap<String, Value>) -> Result<Self, TypeError> {
        let object: serde_json::Map<String, Value> = map.into_iter().collect();
        let record: Self = serde_json::from_value(Value::Object(object))
            .map_err(|e| TypeError::Serialization(e.to_string()))?;
        record.validate()?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_log() -> EventRecord {
        EventRecord {
            record_id: "default0-reranker0".into(),
            logger_id: "reranker0".into(),
            kind: RecordKind::Log,
            input: "q".into(),
            input_from: "default0".into(),
            output: "ranked".into(),
            output_to: "LLM0".into(),
            reliability_score: NOT_APPLICABLE,
            timestamp: "2025-01-01T00:00:00".into(),
            reserved: String::new(),
        }
    }

    #[test]
    fn reliability_constructor_clears_event_fields() {
        let r = EventRecord::reliability("src1", 0.5);
        assert_eq!(r.kind, RecordKind::Reliability);
        assert_eq!(r.record_id, "src1");
        assert!(r.logger_id.is_empty());
        assert!(r.input.is_empty() && r.output.is_empty());
        assert!(r.input_from.is_empty() && r.output_to.is_empty());
        assert_eq!(r.reliability_score, 0.5);
    }

    #[test]
    fn wire_field_names_match_remote_ledger() {
        let json = serde_json::to_value(sample_log()).unwrap();
        let obj = json.as_object().unwrap();
        for key in [
            "logID",
            "loggerID",
            "type",
            "input",
            "inputFrom",
            "output",
            "outputTo",
            "reliabilityScore",
            "timestamp",
            "reserved",
        ] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert_eq!(obj["type"], "log");
    }

    #[test]
    fn into_kind_resets_sentinel() {
        let r = EventRecord::reliability("x", 42.0).into_kind(RecordKind::Feedback);
        assert_eq!(r.reliability_score, NOT_APPLICABLE);
        assert!(r.validate().is_ok());
    }

    #[test]
    fn validate_rejects_score_on_log_record() {
        let mut r = sample_log();
        r.reliability_score = 3.0;
        assert_eq!(
            r.validate(),
            Err(TypeError::ScoreNotApplicable {
                kind: RecordKind::Log,
                score: 3.0
            })
        );
    }

    #[test]
    fn from_flat_rejects_missing_field() {
        let mut flat = sample_log().to_flat();
        flat.remove("outputTo");
        assert!(matches!(
            EventRecord::from_flat(flat),
            Err(TypeError::Serialization(_))
        ));
    }

    #[test]
    fn kind_parses_from_str() {
        for kind in RecordKind::ALL {
            assert_eq!(kind.as_str().parse::<RecordKind>().unwrap(), kind);
        }
        assert!("audit".parse::<RecordKind>().is_err());
    }

    fn arb_record() -> impl Strategy<Value = EventRecord> {
        (
            prop_oneof![
                Just(RecordKind::Log),
                Just(RecordKind::Feedback),
                Just(RecordKind::Reliability)
            ],
            any::<[String; 8]>(),
            -1.0e6f32..1.0e6f32,
        )
            .prop_map(|(kind, s, score)| {
                let [id, logger, input, input_from, output, output_to, ts, reserved] = s;
                EventRecord {
                    record_id: id,
                    logger_id: logger,
                    kind,
                    input,
                    input_from,
                    output,
                    output_to,
                    reliability_score: score,
                    timestamp: ts,
                    reserved,
                }
                .into_kind(kind)
            })
    }

    proptest! {
        #[test]
        fn flat_mapping_roundtrip(record in arb_record()) {
            let back = EventRecord::from_flat(record.to_flat()).unwrap();
            prop_assert_eq!(back, record);
        }
    }
}
