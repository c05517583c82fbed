//! Extraction pipeline: provider analysis followed by key reconciliation.

use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::FormTemplate;
use crate::field_map::{FieldMap, Resolution};
use crate::provider::{DocumentInput, FieldProvider};
use crate::schema::{ExtractedRecord, RawField};

/// Extraction pipeline orchestrator.
pub struct Extractor {
    provider: Arc<dyn FieldProvider>,
    template: Option<FormTemplate>,
}

impl Extractor {
    pub fn new(provider: Arc<dyn FieldProvider>) -> Self {
        Self {
            provider,
            template: None,
        }
    }

    /// Reconcile extracted labels against a known form's labels.
    pub fn with_template(mut self, template: FormTemplate) -> Self {
        self.template = Some(template);
        self
    }

    /// Analyze one document and resolve its fields into a record.
    pub async fn extract(&self, input: &DocumentInput) -> Result<ExtractedRecord> {
        info!(
            "Starting extraction for: {} ({} bytes, provider={}, template={})",
            input.filename,
            input.data.len(),
            self.provider.name(),
            self.template.as_ref().map(|t| t.name.as_str()).unwrap_or("none")
        );

        let content_hash = {
            let mut hasher = Sha256::new();
            hasher.update(&input.data);
            format!("{:x}", hasher.finalize())
        };

        let analysis = self
            .provider
            .analyze(input)
            .await
            .with_context(|| format!("Analysis failed for {}", input.filename))?;

        let field_map = build_field_map(&analysis.fields, self.template.as_ref());
        let finished = field_map.finish();

        let mut record = ExtractedRecord::new(
            input.filename.clone(),
            input.media_type.as_mime().to_string(),
            content_hash,
        );
        record.model_id = analysis.model_id;
        record.provider = self.provider.name().to_string();
        record.template = self.template.as_ref().map(|t| t.name.clone());
        record.documents = analysis.documents;
        record.fields = finished.fields;
        record.missing_fields = finished.missing;

        info!(
            "Extraction complete: {} fields resolved to {} keys ({} template labels missing)",
            analysis.fields.len(),
            record.fields.len(),
            record.missing_fields.len()
        );

        Ok(record)
    }

    /// Extract each document in turn; stops at the first failure.
    pub async fn extract_all(&self, inputs: &[DocumentInput]) -> Result<Vec<ExtractedRecord>> {
        let mut records = Vec::with_capacity(inputs.len());
        for input in inputs {
            records.push(self.extract(input).await?);
        }
        Ok(records)
    }
}

/// Resolve provider fields, in order, into a fresh per-document map.
pub fn build_field_map(fields: &[RawField], template: Option<&FormTemplate>) -> FieldMap {
    let mut map = template.map(FieldMap::with_template).unwrap_or_default();

    for field in fields {
        match map.observe(&field.label, field.value.clone()) {
            Resolution::Matched { key, distance } => {
                debug!("'{}' resolved to '{}' (distance {})", field.label, key, distance);
            }
            Resolution::New { key } => {
                debug!("'{}' added as new key '{}'", field.label, key);
            }
        }
    }

    map
}
