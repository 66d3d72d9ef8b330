use crate::Config;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Failed to create data directory: {0}")]
    DataDirectoryCreationFailed(#[from] std::io::Error),

    #[error("Image directory does not exist: {0}")]
    ImageDirectoryMissing(String),

    #[error("Data document is not valid JSON: {0}")]
    DocumentUnreadable(String),
}

impl StartupCheckError {
    /// Critical failures stop the server from starting.
    pub fn is_critical(&self) -> bool {
        matches!(self, StartupCheckError::DataDirectoryCreationFailed(_))
    }
}

pub async fn perform_startup_checks(config: &Config) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    let data_dir = &config.content.data_directory;
    if !data_dir.exists() {
        info!("Data directory does not exist, creating: {:?}", data_dir);
        if let Err(e) = tokio::fs::create_dir_all(data_dir).await {
            error!("Failed to create data directory: {}", e);
            errors.push(StartupCheckError::DataDirectoryCreationFailed(e));
        } else {
            info!("Data directory created successfully");
        }
    } else {
        info!("Data directory exists: {:?}", data_dir);
    }

    for (label, dir) in [
        ("objects", &config.content.objects_directory),
        ("catalog", &config.content.catalog_directory),
    ] {
        if dir.is_dir() {
            info!("Image directory for {} exists: {:?}", label, dir);
        } else {
            warn!(
                "Image directory for {} does not exist, it will scan as empty: {:?}",
                label, dir
            );
            errors.push(StartupCheckError::ImageDirectoryMissing(
                dir.display().to_string(),
            ));
        }
    }

    for document in [
        config.content.gallery_document(),
        config.content.catalog_document(),
        config.content.leads_document(),
    ] {
        if let Some(error) = check_document(&document).await {
            errors.push(error);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// A document that exists but does not parse will be moved aside on load.
async fn check_document(path: &Path) -> Option<StartupCheckError> {
    let bytes = tokio::fs::read(path).await.ok()?;
    if crate::document::is_blank(&bytes) {
        return None;
    }
    match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(_) => None,
        Err(e) => {
            warn!("Document {:?} does not parse: {}", path, e);
            Some(StartupCheckError::DocumentUnreadable(
                path.display().to_string(),
            ))
        }
    }
}
