//! Persistence of finalized records.
//!
//! [`SupabaseStore`] writes one row per record through the PostgREST API.
//! It is optional: [`SupabaseStore::from_env`] returns `None` unless both the
//! URL and the service role key are set.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::env_or;
use crate::schema::ExtractedRecord;

/// Sink for finalized records.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    async fn store(&self, record: &ExtractedRecord) -> Result<()>;
}

#[derive(Clone)]
pub struct SupabaseStore {
    client: Client,
    base_url: String,
    service_role_key: String,
    table: String,
    schema: String,
}

impl SupabaseStore {
    /// Load from env. Returns `Ok(None)` if the URL or key is missing.
    pub fn from_env(client: Client) -> Result<Option<Self>> {
        let (Ok(base_url), Ok(service_role_key)) = (
            std::env::var("SUPABASE_URL"),
            std::env::var("SUPABASE_SERVICE_ROLE_KEY"),
        ) else {
            return Ok(None);
        };

        Ok(Some(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_role_key,
            table: env_or("SUPABASE_TABLE", "extracted_records".to_string())?,
            schema: env_or("SUPABASE_SCHEMA", "public".to_string())?,
        }))
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }
}

#[async_trait::async_trait]
impl RecordStore for SupabaseStore {
    async fn store(&self, record: &ExtractedRecord) -> Result<()> {
        debug!("Inserting record {} into {}", record.id, self.table);

        let resp = self
            .client
            .post(self.table_url())
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("Content-Type", "application/json")
            .header("Content-Profile", &self.schema)
            .header("Prefer", "return=minimal")
            .json(&record_row(record))
            .send()
            .await
            .context("Failed to send record to Supabase")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Failed to insert record {}: {} - {}",
                record.id,
                status,
                text
            ));
        }

        info!(
            "Stored record {} ({} fields) for {}",
            record.id,
            record.fields.len(),
            record.source_file
        );
        Ok(())
    }
}

/// Row body for one record. Fields are stored as a single JSON object.
fn record_row(record: &ExtractedRecord) -> Value {
    json!({
        "id": record.id,
        "source_file": record.source_file,
        "media_type": record.media_type,
        "content_hash": record.content_hash,
        "model_id": record.model_id,
        "provider": record.provider,
        "template": record.template,
        "fields": record.fields,
        "missing_fields": record.missing_fields,
        "extracted_at": record.extracted_at,
        "extractor_version": record.extractor_version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_row() {
        let mut record = ExtractedRecord::new(
            "scan.jpg".to_string(),
            "image/jpeg".to_string(),
            "deadbeef".to_string(),
        );
        record.model_id = "prebuilt-document".to_string();
        record.fields.insert("Email".to_string(), Value::from("a@b.c"));
        record.missing_fields.push("Pincode".to_string());

        let row = record_row(&record);
        assert_eq!(row["id"], Value::from(record.id.clone()));
        assert_eq!(row["content_hash"], "deadbeef");
        assert_eq!(row["template"], Value::Null);
        assert_eq!(row["fields"]["Email"], "a@b.c");
        assert_eq!(row["missing_fields"], json!(["Pincode"]));
        assert!(row.get("documents").is_none());
    }
}
