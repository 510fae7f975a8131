use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::error::TypeError;
use crate::record::EventRecord;

/// A rich query in the ledger's selector syntax, restricted to field
/// equality: `{"selector": {"type": "log", "loggerID": "reranker0"}}`.
///
/// Field names are the wire names of [`EventRecord`]. A record matches when
/// every listed field is present and equal. Numbers compare by value, so
/// `100` matches a score of `100.0`. An empty selector matches everything.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selector {
    fields: BTreeMap<String, Value>,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value`.
    pub fn field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Parse a query string. Accepts the full `{"selector": {...}}` form or
    /// the bare field object.
    pub fn parse(text: &str) -> Result<Self, TypeError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| TypeError::InvalidSelector(e.to_string()))?;
        let Value::Object(mut object) = value else {
            return Err(TypeError::InvalidSelector("expected a JSON object".into()));
        };
        let object = match object.remove("selector") {
            Some(Value::Object(inner)) if object.is_empty() => inner,
            Some(_) => {
                return Err(TypeError::InvalidSelector(
                    "\"selector\" must be the only key and hold an object".into(),
                ))
            }
            None => object,
        };

        let mut fields = BTreeMap::new();
        for (field, value) in object {
            if matches!(value, Value::Object(_) | Value::Array(_)) {
                return Err(TypeError::InvalidSelector(format!(
                    "only equality is supported, {field} has an operator or list"
                )));
            }
            fields.insert(field, value);
        }
        Ok(Self { fields })
    }

    pub fn matches(&self, record: &EventRecord) -> bool {
        if self.fields.is_empty() {
            return true;
        }
        let flat = record.to_flat();
        self.fields
            .iter()
            .all(|(field, wanted)| flat.get(field).is_some_and(|have| values_equal(have, wanted)))
    }

    /// The `{"selector": {...}}` query string sent to the remote ledger.
    pub fn to_query_string(&self) -> String {
        let object: serde_json::Map<String, Value> = self.fields.clone().into_iter().collect();
        serde_json::json!({ "selector": object }).to_string()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordKind;

    fn log(id: &str, logger: &str) -> EventRecord {
        EventRecord::event(RecordKind::Log, id, logger)
    }

    #[test]
    fn parses_full_and_bare_forms() {
        let full = Selector::parse(r#"{"selector": {"type": "log"}}"#).unwrap();
        let bare = Selector::parse(r#"{"type": "log"}"#).unwrap();
        assert_eq!(full, bare);
        assert_eq!(full, Selector::new().field("type", "log"));
    }

    #[test]
    fn rejects_operators_and_garbage() {
        for text in [
            r#"{"selector": {"reliabilityScore": {"$gt": 1}}}"#,
            r#"{"selector": {"type": ["log"]}}"#,
            r#"{"selector": {"type": "log"}, "limit": 5}"#,
            r#"{"selector": "log"}"#,
            r#"["log"]"#,
            "not json",
        ] {
            assert!(
                matches!(Selector::parse(text), Err(TypeError::InvalidSelector(_))),
                "{text}"
            );
        }
    }

    #[test]
    fn matches_field_equality() {
        let by_logger = Selector::new().field("type", "log").field("loggerID", "reranker0");
        assert!(by_logger.matches(&log("a", "reranker0")));
        assert!(!by_logger.matches(&log("a", "reranker1")));
        assert!(!by_logger.matches(&EventRecord::reliability("reranker0", 1.0)));

        assert!(!Selector::new().field("noSuchField", "x").matches(&log("a", "b")));
        assert!(Selector::new().matches(&log("a", "b")));
    }

    #[test]
    fn numbers_compare_by_value() {
        let record = EventRecord::reliability("s", 100.0);
        assert!(Selector::parse(r#"{"reliabilityScore": 100}"#).unwrap().matches(&record));
        assert!(Selector::parse(r#"{"reliabilityScore": 100.0}"#).unwrap().matches(&record));
        assert!(!Selector::parse(r#"{"reliabilityScore": "100"}"#).unwrap().matches(&record));
    }

    #[test]
    fn query_string_parses_back() {
        let selector = Selector::new().field("type", "feedback").field("logID", "fb1");
        let text = selector.to_query_string();
        assert!(text.starts_with(r#"{"selector":"#));
        assert_eq!(Selector::parse(&text).unwrap(), selector);
    }
}
