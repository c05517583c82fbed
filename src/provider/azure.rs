//! Azure Document Intelligence (Form Recognizer) provider.
//!
//! Submits the image to the analyze endpoint, polls the returned operation
//! until it settles, then flattens document fields and key/value pairs into
//! [`RawField`]s in reported order.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{DocumentInput, FieldProvider};
use crate::config::env_or;
use crate::schema::{Analysis, DocumentSummary, RawField};

const DEFAULT_MODEL_ID: &str = "prebuilt-document";
const DEFAULT_API_VERSION: &str = "2023-07-31";
const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Which parts of the analyze result become fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// Named fields of each recognized document (custom models).
    Documents,
    /// Free-form key/value pairs found on the page.
    KeyValuePairs,
    /// Document fields first, then key/value pairs.
    All,
}

impl FromStr for FieldSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "documents" => Ok(Self::Documents),
            "key_value_pairs" => Ok(Self::KeyValuePairs),
            "all" => Ok(Self::All),
            other => Err(format!(
                "unknown field source '{}' (expected documents, key_value_pairs or all)",
                other
            )),
        }
    }
}

pub struct AzureProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model_id: String,
    api_version: String,
    poll_interval: Duration,
    poll_timeout: Duration,
    field_source: FieldSource,
    skip_leading_pairs: usize,
}

impl AzureProvider {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let endpoint = std::env::var("AZURE_ENDPOINT")
            .map_err(|_| anyhow::anyhow!("AZURE_ENDPOINT not set"))?;
        let api_key =
            std::env::var("AZURE_KEY").map_err(|_| anyhow::anyhow!("AZURE_KEY not set"))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            model_id: env_or("AZURE_MODEL_ID", DEFAULT_MODEL_ID.to_string())?,
            api_version: env_or("AZURE_API_VERSION", DEFAULT_API_VERSION.to_string())?,
            poll_interval: Duration::from_millis(env_or("AZURE_POLL_INTERVAL_MS", 1000)?),
            poll_timeout: Duration::from_secs(env_or("AZURE_POLL_TIMEOUT_SECS", 120)?),
            field_source: env_or("AZURE_FIELD_SOURCE", FieldSource::All)?,
            skip_leading_pairs: env_or("AZURE_SKIP_LEADING_PAIRS", 0)?,
        })
    }

    fn analyze_url(&self) -> String {
        format!(
            "{}/formrecognizer/documentModels/{}:analyze?api-version={}",
            self.endpoint, self.model_id, self.api_version
        )
    }
}

// ── Azure API request/response types ───────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest {
    base64_source: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: String,
    #[serde(default)]
    analyze_result: Option<AnalyzeResult>,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResult {
    model_id: String,
    #[serde(default)]
    documents: Vec<AnalyzedDocument>,
    #[serde(default)]
    key_value_pairs: Vec<KeyValuePair>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzedDocument {
    doc_type: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct KeyValuePair {
    #[serde(default)]
    key: Option<TextElement>,
    #[serde(default)]
    value: Option<TextElement>,
    #[serde(default)]
    confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TextElement {
    #[serde(default)]
    content: String,
}

// ── Provider implementation ─────────────────────────────────────────────────

#[async_trait::async_trait]
impl FieldProvider for AzureProvider {
    fn name(&self) -> &str {
        "azure_document_intelligence"
    }

    async fn analyze(&self, input: &DocumentInput) -> Result<Analysis> {
        let operation_url = self.submit(input).await?;
        let result = self.wait_for_result(&operation_url).await?;

        let analysis = Analysis {
            documents: result
                .documents
                .iter()
                .map(|d| DocumentSummary {
                    doc_type: d.doc_type.clone(),
                    confidence: d.confidence,
                })
                .collect(),
            fields: collect_fields(&result, self.field_source, self.skip_leading_pairs),
            model_id: result.model_id,
        };

        for (idx, doc) in analysis.documents.iter().enumerate() {
            info!(
                "Analyzed document #{} of type {} (confidence {:?}) with model {}",
                idx + 1,
                doc.doc_type,
                doc.confidence,
                analysis.model_id
            );
        }
        for field in &analysis.fields {
            debug!(
                "Found field '{}' of type {:?} with value {} (confidence {:?})",
                field.label, field.value_type, field.value, field.confidence
            );
        }

        Ok(analysis)
    }
}

impl AzureProvider {
    /// Start an analysis, returning the operation URL to poll.
    async fn submit(&self, input: &DocumentInput) -> Result<String> {
        info!(
            "AzureProvider: submitting {} ({} bytes, {}) to model {}",
            input.filename,
            input.data.len(),
            input.media_type.as_mime(),
            self.model_id
        );

        let body = AnalyzeRequest {
            base64_source: BASE64.encode(&input.data),
        };

        let resp = self
            .client
            .post(self.analyze_url())
            .header(KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send analyze request")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Azure analyze API error ({}): {}", status, text);
        }

        let operation_url = resp
            .headers()
            .get("Operation-Location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Azure analyze response has no Operation-Location"))?;

        debug!("AzureProvider: operation at {}", operation_url);
        Ok(operation_url)
    }

    /// Poll the operation until it succeeds, fails, or the timeout passes.
    async fn wait_for_result(&self, operation_url: &str) -> Result<AnalyzeResult> {
        let deadline = Instant::now() + self.poll_timeout;
        let mut delay = self.poll_interval;

        loop {
            tokio::time::sleep(delay).await;

            let resp = self
                .client
                .get(operation_url)
                .header(KEY_HEADER, &self.api_key)
                .send()
                .await
                .context("Failed to poll analyze operation")?;

            if !resp.status().is_success() {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                anyhow::bail!("Azure operation poll error ({}): {}", status, text);
            }

            delay = retry_after(resp.headers()).unwrap_or(self.poll_interval);
            let operation: AnalyzeOperation = resp
                .json()
                .await
                .context("Failed to parse analyze operation")?;

            match operation.status.as_str() {
                "succeeded" => {
                    return operation
                        .analyze_result
                        .ok_or_else(|| anyhow::anyhow!("Analysis succeeded without a result"));
                }
                "failed" => {
                    let detail = operation
                        .error
                        .map(|e| format!("{}: {}", e.code, e.message))
                        .unwrap_or_else(|| "no error detail".to_string());
                    anyhow::bail!("Azure analysis failed: {}", detail);
                }
                "notStarted" | "running" => {
                    debug!("Analysis is {}... waiting", operation.status);
                }
                other => {
                    warn!("Unexpected analysis status: {}", other);
                }
            }

            if Instant::now() + delay > deadline {
                anyhow::bail!(
                    "Timed out after {:?} waiting for analysis (last status: {})",
                    self.poll_timeout,
                    operation.status
                );
            }
        }
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// `Retry-After` in whole seconds, if the service sent one.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get("Retry-After")?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Flatten an analyze result into fields, in the order the service reported them.
fn collect_fields(
    result: &AnalyzeResult,
    source: FieldSource,
    skip_leading_pairs: usize,
) -> Vec<RawField> {
    let mut fields = Vec::new();

    if matches!(source, FieldSource::Documents | FieldSource::All) {
        for document in &result.documents {
            for (name, field) in &document.fields {
                fields.push(document_field(name, field));
            }
        }
    }

    if matches!(source, FieldSource::KeyValuePairs | FieldSource::All) {
        for pair in result.key_value_pairs.iter().skip(skip_leading_pairs) {
            if let (Some(key), Some(value)) = (&pair.key, &pair.value) {
                fields.push(RawField {
                    label: key.content.clone(),
                    value: Value::String(value.content.clone()),
                    confidence: pair.confidence,
                    value_type: None,
                });
            }
        }
    }

    fields
}

/// A named document field: the value member for its `type` when set, else its text.
fn document_field(name: &str, field: &Value) -> RawField {
    let value_type = field.get("type").and_then(Value::as_str);

    let value = value_type
        .and_then(|t| field.get(typed_value_member(t)))
        .filter(|v| is_present(v))
        .or_else(|| field.get("content").filter(|v| is_present(v)))
        .cloned()
        .unwrap_or(Value::Null);

    RawField {
        label: name.to_string(),
        value,
        confidence: field.get("confidence").and_then(Value::as_f64),
        value_type: value_type.map(str::to_string),
    }
}

/// `string` -> `valueString`, `phoneNumber` -> `valuePhoneNumber`.
fn typed_value_member(value_type: &str) -> String {
    let mut chars = value_type.chars();
    match chars.next() {
        Some(first) => format!("value{}{}", first.to_uppercase(), chars.as_str()),
        None => "value".to_string(),
    }
}

/// Blank values (null, false, zero, empty) fall back to the field's content.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    const SUCCEEDED: &str = r#"{
        "status": "succeeded",
        "analyzeResult": {
            "apiVersion": "2023-07-31",
            "modelId": "student-form",
            "documents": [{
                "docType": "student-form",
                "confidence": 0.91,
                "fields": {
                    "1. Student Name": {"type": "string", "valueString": "Asha Rao", "content": "Asha Rao", "confidence": 0.98},
                    "Course Fee": {"type": "number", "valueNumber": 1200, "content": "1,200", "confidence": 0.9},
                    "Pincode": {"type": "string", "valueString": "", "content": "834001", "confidence": 0.7},
                    "Remarks": {"type": "string", "confidence": 0.1}
                }
            }],
            "keyValuePairs": [
                {"key": {"content": "FORM NO."}, "value": {"content": "17"}, "confidence": 0.5},
                {"key": {"content": "2. Father's Name"}, "value": {"content": "Vikram"}, "confidence": 0.8},
                {"key": {"content": "Signature"}, "confidence": 0.4},
                {"key": {"content": "3. Email"}, "value": {"content": "asha@example.com"}, "confidence": 0.85}
            ]
        }
    }"#;

    fn parse_result() -> AnalyzeResult {
        let operation: AnalyzeOperation = serde_json::from_str(SUCCEEDED).unwrap();
        assert_eq!(operation.status, "succeeded");
        operation.analyze_result.unwrap()
    }

    #[test]
    fn test_document_fields_prefer_typed_value() {
        let result = parse_result();
        assert_eq!(result.model_id, "student-form");

        let fields = collect_fields(&result, FieldSource::Documents, 0);
        let labels: Vec<&str> = fields.iter().map(|f| f.label.as_str()).collect();
        assert_eq!(labels, vec!["1. Student Name", "Course Fee", "Pincode", "Remarks"]);

        assert_eq!(fields[0].value, Value::from("Asha Rao"));
        assert_eq!(fields[0].confidence, Some(0.98));
        assert_eq!(fields[0].value_type.as_deref(), Some("string"));
        assert_eq!(fields[1].value, Value::from(1200));
        // Empty typed value falls back to content
        assert_eq!(fields[2].value, Value::from("834001"));
        assert_eq!(fields[3].value, Value::Null);
    }

    #[test]
    fn test_document_field_reads_member_named_by_type() {
        let field = serde_json::json!({
            "type": "phoneNumber",
            "valueString": "unrelated",
            "valuePhoneNumber": "+919876543210",
            "content": "98765 43210",
            "confidence": 0.6
        });
        let raw = document_field("Mobile", &field);
        assert_eq!(raw.value, Value::from("+919876543210"));
        assert_eq!(raw.value_type.as_deref(), Some("phoneNumber"));

        // A value member for another type is ignored in favor of content
        let mismatched = serde_json::json!({
            "type": "date",
            "valueString": "unrelated",
            "content": "01/02/2024"
        });
        assert_eq!(document_field("Day", &mismatched).value, Value::from("01/02/2024"));
    }

    #[test]
    fn test_typed_value_member() {
        assert_eq!(typed_value_member("string"), "valueString");
        assert_eq!(typed_value_member("phoneNumber"), "valuePhoneNumber");
        assert_eq!(typed_value_member("selectionMark"), "valueSelectionMark");
        assert_eq!(typed_value_member(""), "value");
    }

    #[test]
    fn test_key_value_pairs_skip_incomplete_and_leading() {
        let result = parse_result();

        let fields = collect_fields(&result, FieldSource::KeyValuePairs, 0);
        let labels: Vec<&str> = fields.iter().map(|f| f.label.as_str()).collect();
        assert_eq!(labels, vec!["FORM NO.", "2. Father's Name", "3. Email"]);
        assert_eq!(fields[1].value, Value::from("Vikram"));
        assert_eq!(fields[1].value_type, None);

        let skipped = collect_fields(&result, FieldSource::KeyValuePairs, 1);
        assert_eq!(skipped.len(), 2);
        assert_eq!(skipped[0].label, "2. Father's Name");
    }

    #[test]
    fn test_all_sources_documents_first() {
        let result = parse_result();
        let fields = collect_fields(&result, FieldSource::All, 0);
        assert_eq!(fields.len(), 7);
        assert_eq!(fields[0].label, "1. Student Name");
        assert_eq!(fields[4].label, "FORM NO.");
    }

    #[test]
    fn test_failed_operation_parses_error() {
        let raw = r#"{"status": "failed", "error": {"code": "InvalidRequest", "message": "Invalid input."}}"#;
        let operation: AnalyzeOperation = serde_json::from_str(raw).unwrap();
        assert_eq!(operation.status, "failed");
        assert!(operation.analyze_result.is_none());
        let error = operation.error.unwrap();
        assert_eq!(error.code, "InvalidRequest");
        assert_eq!(error.message, "Invalid input.");
    }

    #[test]
    fn test_field_source_from_str() {
        assert_eq!("documents".parse(), Ok(FieldSource::Documents));
        assert_eq!("key_value_pairs".parse(), Ok(FieldSource::KeyValuePairs));
        assert_eq!("all".parse(), Ok(FieldSource::All));
        assert!("pages".parse::<FieldSource>().is_err());
    }

    #[test]
    fn test_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);

        headers.insert("retry-after", HeaderValue::from_static("2"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(2)));

        headers.insert("retry-after", HeaderValue::from_static("soon"));
        assert_eq!(retry_after(&headers), None);
    }
}
