pub mod handlers;
mod types;

pub use types::*;

use crate::document;

use chrono::{SecondsFormat, Utc};
use rand::Rng;
use std::{path::PathBuf, sync::Arc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum LeadError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type SharedLeadStore = Arc<LeadStore>;

/// Newest-first list of leads kept in a single JSON document.
pub struct LeadStore {
    document: PathBuf,
    write_lock: Mutex<()>,
}

impl LeadStore {
    pub fn new(document: PathBuf) -> Self {
        Self {
            document,
            write_lock: Mutex::new(()),
        }
    }

    /// All leads, newest first. A missing or unreadable document is empty.
    pub async fn load(&self) -> Vec<Lead> {
        self.read_document().await.unwrap_or_else(|e| {
            warn!("Leads document {:?} is unreadable: {}", self.document, e);
            Vec::new()
        })
    }

    async fn read_document(&self) -> Result<Vec<Lead>, LeadError> {
        let bytes = match tokio::fs::read(&self.document).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No leads document at {:?}", self.document);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        if document::is_blank(&bytes) {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Validate and prepend a lead. `name` and `phone` must be non-blank.
    pub async fn add(&self, submission: LeadSubmission) -> Result<Lead, LeadError> {
        let name = submission.name.trim();
        let phone = submission.phone.trim();
        if name.is_empty() {
            return Err(LeadError::MissingField("name"));
        }
        if phone.is_empty() {
            return Err(LeadError::MissingField("phone"));
        }

        let source = match submission.source.trim() {
            "" => DEFAULT_SOURCE.to_string(),
            source => source.to_string(),
        };

        let lead = Lead {
            id: generate_lead_id(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            name: name.to_string(),
            phone: phone.to_string(),
            message: submission.message.trim().to_string(),
            source,
            from_crm: submission.from_crm,
        };

        let _guard = self.write_lock.lock().await;
        let mut leads = match self.read_document().await {
            Ok(leads) => leads,
            Err(LeadError::SerdeError(e)) => {
                error!("Leads document {:?} is unreadable: {}", self.document, e);
                document::quarantine(&self.document).await;
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        leads.insert(0, lead.clone());

        if let Some(parent) = self.document.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&leads)?;
        tokio::fs::write(&self.document, json).await?;

        info!(lead_id = %lead.id, source = %lead.source, from_crm = lead.from_crm, "Lead captured");
        Ok(lead)
    }
}

/// `<unix millis>-<7 base36 chars>`
fn generate_lead_id() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::rng();
    let suffix: String = (0..7)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{}-{}", Utc::now().timestamp_millis(), suffix)
}

/// Exact match against the configured secret. No secret configured means the
/// webhook is open.
pub fn check_webhook_token(secret: Option<&str>, provided: Option<&str>) -> bool {
    match secret.map(str::trim).filter(|s| !s.is_empty()) {
        None => true,
        Some(secret) => provided == Some(secret),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn submission(name: &str, phone: &str) -> LeadSubmission {
        LeadSubmission {
            name: name.to_string(),
            phone: phone.to_string(),
            ..LeadSubmission::default()
        }
    }

    #[tokio::test]
    async fn test_add_rejects_missing_phone() {
        let temp = TempDir::new().unwrap();
        let store = LeadStore::new(temp.path().join("leads.json"));

        let result = store.add(submission("Иван", "  ")).await;
        assert!(matches!(result, Err(LeadError::MissingField("phone"))));
        assert!(!temp.path().join("leads.json").exists());
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_add_prepends_with_defaults() {
        let temp = TempDir::new().unwrap();
        let store = LeadStore::new(temp.path().join("data").join("leads.json"));

        let first = store.add(submission("Иван", "9001234567")).await.unwrap();
        assert_eq!(first.source, "Сайт");
        assert!(!first.from_crm);
        assert!(first.created_at.ends_with('Z'));

        let (millis, suffix) = first.id.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), 7);

        let mut second = submission("Пётр", "9007654321");
        second.source = "Каталог".to_string();
        let second = store.add(second).await.unwrap();

        let leads = store.load().await;
        assert_eq!(leads.len(), 2);
        assert_eq!(leads[0].id, second.id);
        assert_eq!(leads[1].id, first.id);
        assert_eq!(leads[0].source, "Каталог");

        let raw = std::fs::read_to_string(temp.path().join("data").join("leads.json")).unwrap();
        assert!(raw.contains("Иван"), "Cyrillic must not be escaped");
        assert!(raw.contains("\"createdAt\""));
    }

    #[tokio::test]
    async fn test_add_moves_unreadable_document_aside() {
        let temp = TempDir::new().unwrap();
        let document = temp.path().join("leads.json");
        let truncated = r#"[{"id":"1-abcdefg","createdAt":"2024-01-01T00:00:00.000Z","name":"Old","#;
        std::fs::write(&document, truncated).unwrap();
        let store = LeadStore::new(document.clone());

        store.add(submission("Иван", "9001234567")).await.unwrap();

        let leads = store.load().await;
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].name, "Иван");

        let backups: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .flatten()
            .filter(|e| {
                e.file_name()
                    .to_string_lossy()
                    .starts_with("leads.json.corrupt-")
            })
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(std::fs::read_to_string(backups[0].path()).unwrap(), truncated);
    }

    #[test]
    fn test_check_webhook_token() {
        assert!(check_webhook_token(None, None));
        assert!(check_webhook_token(Some(""), Some("anything")));
        assert!(check_webhook_token(Some("s3cret"), Some("s3cret")));
        assert!(!check_webhook_token(Some("s3cret"), Some("S3CRET")));
        assert!(!check_webhook_token(Some("s3cret"), None));
    }

    #[test]
    fn test_lead_ids_differ() {
        assert_ne!(generate_lead_id(), generate_lead_id());
    }
}
