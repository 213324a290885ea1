//! Wire payloads exchanged with the enrichment service.
//!
//! HTTP bodies and Socket.IO event data share these types. Incoming shapes
//! are parsed leniently (optional fields, aliases) because the service has
//! shipped more than one variant of each.

use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::ModelField;

// -- Requests ---------------------------------------------------------------

/// Extra model-generated output column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalColumn {
    pub name: String,
    pub instructions: String,
}

/// Validated processing configuration; built once per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingRequest {
    pub api_key: String,
    pub model: String,
    pub instructions: String,
    pub file_path: String,
    pub row_limit: Option<NonZeroU64>,
    pub additional_columns: Vec<AdditionalColumn>,
}

impl ProcessingRequest {
    /// JSON body with the model under `field`; `row_limit` omitted when unset.
    pub fn to_payload(&self, field: ModelField) -> Value {
        let mut body = Map::new();
        body.insert(field.key().to_string(), json!(self.model));
        body.insert("api_key".to_string(), json!(self.api_key));
        body.insert("instructions".to_string(), json!(self.instructions));
        body.insert("file_path".to_string(), json!(self.file_path));
        if let Some(limit) = self.row_limit {
            body.insert("row_limit".to_string(), json!(limit.get()));
        }
        body.insert("additional_columns".to_string(), json!(self.additional_columns));
        Value::Object(body)
    }
}

// -- Responses --------------------------------------------------------------

/// Successful `/upload` outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub file_path: String,
    pub row_count: u64,
    pub columns: Vec<String>,
    pub filename: Option<String>,
}

/// `/upload` body as sent; every field optional so malformed bodies are
/// reported precisely instead of failing deserialization wholesale.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawUploadResponse {
    pub file_path: Option<String>,
    pub row_count: Option<u64>,
    pub columns: Option<Vec<String>>,
    pub filename: Option<String>,
    pub error: Option<String>,
}

impl RawUploadResponse {
    /// Name of the first required field that is missing, if any.
    pub fn into_result(self) -> Result<UploadResult, &'static str> {
        let file_path = self.file_path.filter(|p| !p.is_empty()).ok_or("file_path")?;
        let row_count = self.row_count.ok_or("row_count")?;
        let columns = self.columns.ok_or("columns")?;
        Ok(UploadResult { file_path, row_count, columns, filename: self.filename })
    }
}

/// Body of an `{error: ...}` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(alias = "message")]
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressStatus {
    #[serde(rename = "in-progress", alias = "in_progress", alias = "processing")]
    InProgress,
    #[serde(rename = "complete", alias = "completed")]
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub current: u64,
    pub total: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProgressStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProcessingComplete {
    #[serde(default)]
    pub csv_data: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProcessingFailure {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ProcessingFailure {
    pub fn text(&self) -> String {
        self.error
            .clone()
            .or_else(|| self.message.clone())
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "Processing failed".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeQuota {
    pub scrapes_used: u64,
    pub scrape_limit: u64,
}

impl std::fmt::Display for ScrapeQuota {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Scrapes: {}/{}", self.scrapes_used, self.scrape_limit)
    }
}

/// One-shot reply to `start_processing`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    Ok,
    Error(String),
    /// Any status other than `ok`/`error`.
    Unexpected(String),
}

impl Ack {
    pub fn from_value(value: &Value) -> Ack {
        let status = value.get("status").and_then(Value::as_str).unwrap_or_default();
        match status {
            "ok" => Ack::Ok,
            "error" => Ack::Error(
                value
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("Processing failed to start.")
                    .to_string(),
            ),
            other => Ack::Unexpected(other.to_string()),
        }
    }
}

// -- Server-pushed events ---------------------------------------------------

pub const EVENT_START_PROCESSING: &str = "start_processing";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    Progress(ProgressEvent),
    Complete(ProcessingComplete),
    Failed(ProcessingFailure),
    Quota(ScrapeQuota),
    /// An event this client does not consume.
    Other(String),
}

impl ServerEvent {
    /// Decode a named Socket.IO event and its first argument.
    pub fn parse(name: &str, data: Value) -> Result<ServerEvent, serde_json::Error> {
        Ok(match name {
            "processing_progress" => ServerEvent::Progress(serde_json::from_value(data)?),
            "processing_complete" => {
                let payload = if data.is_null() {
                    ProcessingComplete::default()
                } else {
                    serde_json::from_value(data)?
                };
                ServerEvent::Complete(payload)
            }
            "processing_error" => {
                let payload = if data.is_null() {
                    ProcessingFailure::default()
                } else {
                    serde_json::from_value(data)?
                };
                ServerEvent::Failed(payload)
            }
            "scrape_count_updated" => ServerEvent::Quota(serde_json::from_value(data)?),
            other => ServerEvent::Other(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ProcessingRequest {
        ProcessingRequest {
            api_key: "sk".into(),
            model: "gpt-4".into(),
            instructions: "Describe".into(),
            file_path: "uploads/x.csv".into(),
            row_limit: NonZeroU64::new(10),
            additional_columns: vec![AdditionalColumn {
                name: "Industry".into(),
                instructions: "Name it".into(),
            }],
        }
    }

    #[test]
    fn test_payload_uses_api_model_key() {
        let v = request().to_payload(ModelField::ApiModel);
        assert_eq!(v["api_model"], "gpt-4");
        assert!(v.get("gpt_model").is_none());
        assert_eq!(v["row_limit"], 10);
        assert_eq!(v["additional_columns"][0]["name"], "Industry");
    }

    #[test]
    fn test_payload_uses_gpt_model_key() {
        let v = request().to_payload(ModelField::GptModel);
        assert_eq!(v["gpt_model"], "gpt-4");
        assert!(v.get("api_model").is_none());
    }

    #[test]
    fn test_payload_omits_absent_row_limit() {
        let mut r = request();
        r.row_limit = None;
        assert!(r.to_payload(ModelField::ApiModel).get("row_limit").is_none());
    }

    #[test]
    fn test_upload_response_complete() {
        let raw: RawUploadResponse = serde_json::from_str(
            r#"{"filename":"ab_leads.csv","file_path":"uploads/ab_leads.csv","columns":["Websites","Name"],"row_count":42}"#,
        )
        .unwrap();
        let result = raw.into_result().unwrap();
        assert_eq!(result.row_count, 42);
        assert_eq!(result.columns, vec!["Websites", "Name"]);
        assert_eq!(result.filename.as_deref(), Some("ab_leads.csv"));
    }

    #[test]
    fn test_upload_response_missing_row_count() {
        let raw: RawUploadResponse =
            serde_json::from_str(r#"{"file_path":"p","columns":[]}"#).unwrap();
        assert_eq!(raw.into_result(), Err("row_count"));
    }

    #[test]
    fn test_progress_accepts_server_processing_status() {
        let ev = ServerEvent::parse(
            "processing_progress",
            json!({"current": 3, "total": 9, "progress": 33, "status": "processing"}),
        )
        .unwrap();
        assert_eq!(
            ev,
            ServerEvent::Progress(ProgressEvent {
                current: 3,
                total: 9,
                status: Some(ProgressStatus::InProgress)
            })
        );
    }

    #[test]
    fn test_complete_without_payload() {
        let ev = ServerEvent::parse("processing_complete", Value::Null).unwrap();
        assert_eq!(ev, ServerEvent::Complete(ProcessingComplete { csv_data: None }));
    }

    #[test]
    fn test_failure_text_prefers_error_then_message() {
        let f: ProcessingFailure = serde_json::from_value(json!({"message": "boom"})).unwrap();
        assert_eq!(f.text(), "boom");
        let f: ProcessingFailure =
            serde_json::from_value(json!({"error": "bad key", "message": "boom"})).unwrap();
        assert_eq!(f.text(), "bad key");
        assert_eq!(ProcessingFailure::default().text(), "Processing failed");
    }

    #[test]
    fn test_quota_display() {
        let q = ScrapeQuota { scrapes_used: 12, scrape_limit: 100 };
        assert_eq!(q.to_string(), "Scrapes: 12/100");
    }

    #[test]
    fn test_unknown_event_is_kept_by_name() {
        let ev = ServerEvent::parse("status_update", json!({})).unwrap();
        assert_eq!(ev, ServerEvent::Other("status_update".into()));
    }

    #[test]
    fn test_ack_variants() {
        assert_eq!(Ack::from_value(&json!({"status": "ok"})), Ack::Ok);
        assert_eq!(
            Ack::from_value(&json!({"status": "error", "error": "quota exceeded"})),
            Ack::Error("quota exceeded".into())
        );
        assert_eq!(
            Ack::from_value(&json!({"status": "queued"})),
            Ack::Unexpected("queued".into())
        );
    }
}
