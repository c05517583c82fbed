//! Extraction result types shared by providers, the extractor and stores.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A single label/value pair as reported by a field provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawField {
    pub label: String,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Provider-specific value type (`string`, `date`, `phoneNumber`, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
}

impl RawField {
    pub fn new(label: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            confidence: None,
            value_type: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Classification of one analyzed document within an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub doc_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Everything a provider reports for one uploaded file.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub model_id: String,
    pub documents: Vec<DocumentSummary>,
    /// Fields in provider-reported order.
    pub fields: Vec<RawField>,
}

/// Finalized extraction for one uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub id: String,
    pub source_file: String,
    pub media_type: String,
    pub content_hash: String,
    pub model_id: String,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    pub extracted_at: String, // RFC 3339, UTC
    pub extractor_version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<DocumentSummary>,
    /// Canonical key to value, in first-seen order.
    pub fields: Map<String, Value>,
    /// Template labels that no extracted field resolved to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,
}

impl ExtractedRecord {
    pub fn new(source_file: String, media_type: String, content_hash: String) -> Self {
        Self {
            id: format!("rec_{}", Uuid::new_v4().simple()),
            source_file,
            media_type,
            content_hash,
            model_id: String::new(),
            provider: String::new(),
            template: None,
            extracted_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            extractor_version: env!("CARGO_PKG_VERSION").to_string(),
            documents: Vec::new(),
            fields: Map::new(),
            missing_fields: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_fields_in_order() {
        let mut record = ExtractedRecord::new(
            "form.png".to_string(),
            "image/png".to_string(),
            "abc".to_string(),
        );
        record.fields.insert("Student Name".to_string(), Value::from("Asha"));
        record.fields.insert("Email".to_string(), Value::from("a@b.c"));
        record.fields.insert("Course Fee".to_string(), Value::from(1200));

        assert!(record.id.starts_with("rec_"));
        assert!(record.extracted_at.ends_with('Z'));

        let json = serde_json::to_value(&record).unwrap();
        let keys: Vec<&str> = json["fields"]
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["Student Name", "Email", "Course Fee"]);
        assert!(json.get("template").is_none());
        assert!(json.get("missing_fields").is_none());
    }
}
