use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use draglog_ledger::{ensure_finite, LedgerError, ProvenanceLedger};
use draglog_types::{EventRecord, HistoryEntry, RecordKind, ReliabilityUpdate, Score, Selector};

/// HTTP shim over the remote ledger API.
///
/// Network and decoding failures never propagate: they are logged with
/// `warn!` and degrade to an empty list, a silently dropped write, or
/// [`LedgerError::NotFound`] for single-record lookups.
pub struct RemoteLedger {
    base_url: String,
    agent: ureq::Agent,
}

impl fmt::Debug for RemoteLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteLedger")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct RecordsResponse {
    #[serde(default)]
    records: Option<Vec<EventRecord>>,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    history: Option<Vec<HistoryEntry>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReliabilityRecordBody<'a> {
    #[serde(rename = "dataSourceID")]
    data_source_id: &'a str,
    digest: &'a str,
    reserved: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchBody {
    #[serde(rename = "recordsJSON")]
    records_json: String,
}

/// The selector travels as a JSON string, not a nested object.
#[derive(Serialize)]
struct SelectorBody {
    selector: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBody<'a> {
    reliability_score: Score,
    is_delta: bool,
    info: &'a str,
}

impl RemoteLedger {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        let url = self.url(path);
        debug!(%url, "GET");
        let result = self
            .agent
            .get(&url)
            .call()
            .and_then(|response| response.into_body().read_json::<T>());
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(%url, error = %e, "remote ledger request failed");
                None
            }
        }
    }

    fn get_json_with_body<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Option<T> {
        let url = self.url(path);
        debug!(%url, "GET with body");
        let result = self
            .agent
            .get(&url)
            .force_send_body()
            .send_json(body)
            .and_then(|response| response.into_body().read_json::<T>());
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(%url, error = %e, "remote ledger request failed");
                None
            }
        }
    }

    fn post_json<B: Serialize>(&self, path: &str, body: &B) {
        let url = self.url(path);
        debug!(%url, "POST");
        if let Err(e) = self.agent.post(&url).send_json(body) {
            warn!(%url, error = %e, "remote ledger request failed");
        }
    }

    fn put_json<B: Serialize>(&self, path: &str, body: &B) {
        let url = self.url(path);
        debug!(%url, "PUT");
        if let Err(e) = self.agent.put(&url).send_json(body) {
            warn!(%url, error = %e, "remote ledger request failed");
        }
    }
}

impl ProvenanceLedger for RemoteLedger {
    fn init_ledger(&mut self, sources: BTreeMap<String, Score>) -> Result<(), LedgerError> {
        if !sources.is_empty() {
            debug!(sources = sources.len(), "remote ledger seeds its own sources; ignoring");
        }
        if let Err(e) = self.agent.get(&self.url("/init-ledger")).call() {
            warn!(error = %e, "remote ledger init failed");
        }
        Ok(())
    }

    fn create_log_record(&mut self, record: EventRecord) -> Result<(), LedgerError> {
        self.post_json("/create-log-record", &record.into_kind(RecordKind::Log));
        Ok(())
    }

    fn create_feedback_record(&mut self, record: EventRecord) -> Result<(), LedgerError> {
        self.post_json("/create-feedback-record", &record.into_kind(RecordKind::Feedback));
        Ok(())
    }

    fn create_reliability_record(
        &mut self,
        source_id: &str,
        digest: &str,
        reserved: &str,
    ) -> Result<(), LedgerError> {
        let body = ReliabilityRecordBody {
            data_source_id: source_id,
            digest,
            reserved,
        };
        self.post_json("/create-reliability-record", &body);
        Ok(())
    }

    fn create_reliability_records_batch(&mut self, records: Vec<EventRecord>) -> Result<(), LedgerError> {
        let records: Vec<EventRecord> = records
            .into_iter()
            .map(|r| r.into_kind(RecordKind::Reliability))
            .collect();
        for record in &records {
            ensure_finite(&record.record_id, record.reliability_score)?;
        }
        let records_json =
            serde_json::to_string(&records).map_err(|e| LedgerError::Serialization(e.to_string()))?;
        self.post_json("/create-reliability-records-batch", &BatchBody { records_json });
        Ok(())
    }

    fn update_reliability_record(&mut self, update: ReliabilityUpdate) -> Result<(), LedgerError> {
        ensure_finite(&update.source_id, update.amount)?;
        let body = UpdateBody {
            reliability_score: update.amount,
            is_delta: update.is_delta,
            info: &update.info,
        };
        let path = format!("/update-reliability-record/{}", encode_segment(&update.source_id));
        self.put_json(&path, &body);
        Ok(())
    }

    fn get_all_records(&self, kind: RecordKind) -> Result<Vec<EventRecord>, LedgerError> {
        let path = format!("/get-all-{kind}-records");
        Ok(self
            .get_json::<RecordsResponse>(&path)
            .and_then(|r| r.records)
            .unwrap_or_default())
    }

    fn get_record(&self, kind: RecordKind, id: &str) -> Result<EventRecord, LedgerError> {
        let path = format!("/get-{kind}-record/{}", encode_segment(id));
        self.get_json::<RecordsResponse>(&path)
            .and_then(|r| r.records)
            .and_then(|records| records.into_iter().next())
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }

    fn query_records(&self, selector: &Selector) -> Result<Vec<EventRecord>, LedgerError> {
        let body = SelectorBody {
            selector: selector.to_query_string(),
        };
        Ok(self
            .get_json_with_body::<_, RecordsResponse>("/get-record-with-selector", &body)
            .and_then(|r| r.records)
            .unwrap_or_default())
    }

    fn get_history_for_record(&self, id: &str) -> Result<Vec<HistoryEntry>, LedgerError> {
        let path = format!("/get-history-for-record/{}", encode_segment(id));
        Ok(self
            .get_json::<HistoryResponse>(&path)
            .and_then(|r| r.history)
            .unwrap_or_default())
    }
}

/// Percent-encode one URL path segment.
fn encode_segment(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(char::from(byte))
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
