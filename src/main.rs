//! form-keys - analyze form images and print their reconciled fields as JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use form_keys::config::TemplateStore;
use form_keys::extractor::Extractor;
use form_keys::provider::azure::AzureProvider;
use form_keys::provider::DocumentInput;
use form_keys::store::{RecordStore, SupabaseStore};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str =
    "Usage: form-keys [--template NAME] [--templates-dir DIR] [--persist] FILE...";

#[derive(Debug, Default)]
struct Args {
    template: Option<String>,
    templates_dir: Option<PathBuf>,
    persist: bool,
    files: Vec<PathBuf>,
}

fn parse_args(raw: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut args = Args::default();
    let mut raw = raw.into_iter();

    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--template" => {
                args.template = Some(raw.next().context("--template needs a name")?);
            }
            "--templates-dir" => {
                let dir = raw.next().context("--templates-dir needs a path")?;
                args.templates_dir = Some(PathBuf::from(dir));
            }
            "--persist" => args.persist = true,
            "-h" | "--help" => anyhow::bail!("{}", USAGE),
            flag if flag.starts_with("--") => anyhow::bail!("Unknown option {}\n{}", flag, USAGE),
            _ => args.files.push(PathBuf::from(arg)),
        }
    }

    if args.files.is_empty() {
        anyhow::bail!("No input files\n{}", USAGE);
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries the JSON output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "form_keys=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = parse_args(std::env::args().skip(1))?;

    // Reject unsupported or unreadable files before any provider call
    let inputs = args
        .files
        .iter()
        .map(|path| DocumentInput::from_path(path))
        .collect::<Result<Vec<_>, _>>()?;

    let client = reqwest::Client::new();
    let provider = AzureProvider::from_env(client.clone())?;
    let mut extractor = Extractor::new(Arc::new(provider));

    if let Some(name) = &args.template {
        let dir = args
            .templates_dir
            .as_deref()
            .unwrap_or_else(|| Path::new("templates"));
        let templates = TemplateStore::load_from_dir(dir)?;
        let template = templates.get(name).cloned().with_context(|| {
            format!("Unknown template: {}. Available: {:?}", name, templates.list())
        })?;
        extractor = extractor.with_template(template);
    }

    let records = extractor.extract_all(&inputs).await?;

    if args.persist {
        match SupabaseStore::from_env(client)? {
            Some(store) => {
                for record in &records {
                    store.store(record).await?;
                }
                info!("Persisted {} records", records.len());
            }
            None => warn!("--persist given but SUPABASE_URL / SUPABASE_SERVICE_ROLE_KEY not set"),
        }
    }

    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Result<Args> {
        parse_args(raw.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_args() {
        let parsed = args(&["--template", "student_admission", "--persist", "a.png", "b.jpg"]).unwrap();
        assert_eq!(parsed.template.as_deref(), Some("student_admission"));
        assert!(parsed.persist);
        assert_eq!(parsed.files, vec![PathBuf::from("a.png"), PathBuf::from("b.jpg")]);
        assert!(parsed.templates_dir.is_none());
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(args(&[]).is_err());
        assert!(args(&["--template"]).is_err());
        assert!(args(&["--verbose", "a.png"]).is_err());
    }
}
