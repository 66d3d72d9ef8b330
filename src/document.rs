use std::{
    ffi::OsString,
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::{error, warn};

/// True when `bytes` hold nothing but whitespace.
pub fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

/// `<document>.corrupt-<unix seconds>`
fn quarantine_path(document: &Path) -> OsString {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let mut backup = document.as_os_str().to_os_string();
    backup.push(format!(".corrupt-{}", stamp));
    backup
}

/// Move an unparseable document aside so the next write never destroys it.
pub async fn quarantine(document: &Path) {
    let backup = quarantine_path(document);
    match tokio::fs::rename(document, &backup).await {
        Ok(()) => warn!("Moved unreadable document {:?} to {:?}", document, backup),
        Err(e) => error!("Failed to move unreadable document {:?} aside: {}", document, e),
    }
}
