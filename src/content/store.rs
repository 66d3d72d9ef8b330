use super::{ContentError, ContentStore, Entry};
use crate::document;
use crate::paths::{self, AssetNamespace};
use crate::scanner;
use tracing::{debug, error, info, warn};

/// Parse an entry id the lenient way form fields arrive: leading whitespace
/// is skipped and the leading run of digits is used. Anything else is `None`.
pub fn parse_entry_id(raw: &str) -> Option<u64> {
    let digits: String = raw
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok().filter(|id| *id > 0)
}

/// Stored references may be relative paths or public URLs written by older
/// admin clients; both compare by their relative form.
pub(crate) fn stored_relative(reference: &str, namespace: AssetNamespace) -> String {
    let reference = reference.trim();
    if reference.starts_with('/') {
        paths::to_relative(reference, namespace)
    } else {
        reference.to_string()
    }
}

/// Public URL (or relative path) to the relative form stored in documents.
/// External references are kept verbatim.
pub(crate) fn public_to_stored(reference: &str, namespace: AssetNamespace) -> String {
    if reference.trim().is_empty() || paths::is_external(reference) {
        reference.trim().to_string()
    } else {
        paths::to_relative(reference, namespace)
    }
}

impl<E: Entry> ContentStore<E> {
    /// Load the document, bootstrapping it from a scan of the image root when
    /// it is missing or empty, and return the materialized entries.
    ///
    /// The snapshot served by [`ContentStore::get`] is replaced on success.
    pub async fn load(&self) -> Result<Vec<E>, ContentError> {
        let raw = {
            let _guard = self.write_lock.lock().await;

            let raw = match self.read_document().await {
                Ok(entries) => entries,
                Err(ContentError::ParseFailed { path, source }) => {
                    error!("Content document {:?} is unreadable: {}", path, source);
                    document::quarantine(&self.document).await;
                    Vec::new()
                }
                Err(e) => return Err(e),
            };

            if raw.is_empty() {
                let scanned = self.scan().await?;
                if !scanned.is_empty() {
                    info!(
                        "Bootstrapped {:?} with {} entries from {:?}",
                        self.document,
                        scanned.len(),
                        self.image_root
                    );
                    self.write_raw(&scanned).await?;
                }
                scanned
            } else {
                raw
            }
        };

        let public = self.materialize(raw);
        *self.snapshot.write().await = public.clone();
        Ok(public)
    }

    /// Last materialized entries.
    pub async fn get(&self) -> Vec<E> {
        self.snapshot.read().await.clone()
    }

    pub async fn refresh(&self) -> Result<(), ContentError> {
        self.load().await.map(|_| ())
    }

    /// Stored entries exactly as on disk. A missing or unreadable document is
    /// empty; nothing is scanned or written.
    pub async fn load_raw(&self) -> Vec<E> {
        match self.read_document().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Treating content document as empty: {}", e);
                Vec::new()
            }
        }
    }

    /// Rewrite the whole document, pretty-printed.
    pub async fn write_raw(&self, entries: &[E]) -> Result<(), ContentError> {
        if let Some(parent) = self.document.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        tokio::fs::write(&self.document, json).await?;
        debug!("Wrote {} entries to {:?}", entries.len(), self.document);
        Ok(())
    }

    /// Replace the whole document with caller-supplied entries in public shape.
    ///
    /// Entries without an id get the next id above every id currently stored
    /// or present in the payload.
    pub async fn save(&self, entries: Vec<E>) -> Result<Vec<E>, ContentError> {
        let _guard = self.write_lock.lock().await;

        let existing = self.load_raw().await;
        let mut next_id = existing
            .iter()
            .chain(entries.iter())
            .map(|entry| entry.id())
            .max()
            .unwrap_or(0)
            + 1;

        let stored: Vec<E> = entries
            .into_iter()
            .map(|entry| {
                let mut entry = entry.into_stored();
                if entry.id() == 0 {
                    entry.set_id(next_id);
                    next_id += 1;
                }
                entry
            })
            .collect();

        self.write_raw(&stored).await?;
        info!("Saved {} entries to {:?}", stored.len(), self.document);
        Ok(stored)
    }

    /// Append relative image paths to an entry.
    pub async fn add_images(
        &self,
        id: &str,
        relative_paths: Vec<String>,
    ) -> Result<bool, ContentError> {
        self.mutate(id, |entry| {
            entry.images_mut().extend(relative_paths);
            entry.images_added();
        })
        .await
    }

    pub async fn remove_image(&self, id: &str, url: &str) -> Result<bool, ContentError> {
        self.remove_images(id, &[url.to_string()]).await
    }

    /// Drop every stored reference matching one of `urls`. Matching compares
    /// canonical relative paths, so a stored `.jpg` matches its `.webp` URL.
    pub async fn remove_images(&self, id: &str, urls: &[String]) -> Result<bool, ContentError> {
        let namespace = E::NAMESPACE;
        let targets: Vec<String> = urls
            .iter()
            .map(|url| paths::canonical_relative(&paths::to_relative(url, namespace)))
            .collect();
        if targets.is_empty() {
            return Ok(false);
        }

        self.mutate(id, |entry| {
            entry.images_mut().retain(|stored| {
                let relative = paths::canonical_relative(&stored_relative(stored, namespace));
                !targets.contains(&relative)
            });
            entry.images_removed();
        })
        .await
    }

    pub async fn update_entry(&self, id: &str, patch: E::Patch) -> Result<bool, ContentError> {
        self.mutate(id, |entry| entry.apply_patch(patch)).await
    }

    /// Rebuild the document from a fresh scan, discarding the stored one.
    pub async fn import_from_scan(&self) -> Result<Vec<E>, ContentError> {
        {
            let _guard = self.write_lock.lock().await;
            let scanned = self.scan().await?;
            info!(
                "Imported {} entries from {:?} into {:?}",
                scanned.len(),
                self.image_root,
                self.document
            );
            self.write_raw(&scanned).await?;
        }
        self.load().await
    }

    /// Remove the file behind a public URL. The literal path is tried first,
    /// then its canonical and original-extension variants.
    pub async fn delete_image_file(&self, url: &str) -> Result<(), ContentError> {
        let relative = public_to_stored(url, E::NAMESPACE);

        let mut last_error = None;
        for candidate in paths::lookup_candidates(&relative) {
            let Some(path) = paths::resolve(&self.image_root, &candidate) else {
                break;
            };
            if path == self.image_root {
                break;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!("Deleted image file {:?}", path);
                    return Ok(());
                }
                Err(source) => last_error = Some(ContentError::DeleteFailed { path, source }),
            }
        }

        Err(last_error.unwrap_or_else(|| ContentError::DeleteFailed {
            path: self.image_root.join(&relative),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "path escapes image root",
            ),
        }))
    }

    async fn mutate<F>(&self, id: &str, apply: F) -> Result<bool, ContentError>
    where
        F: FnOnce(&mut E),
    {
        let Some(id) = parse_entry_id(id) else {
            debug!("Ignoring mutation with malformed id {:?}", id);
            return Ok(false);
        };

        let _guard = self.write_lock.lock().await;
        let mut entries = self.load_raw().await;

        let Some(entry) = entries.iter_mut().find(|entry| entry.id() == id) else {
            debug!("No entry {} in {:?}", id, self.document);
            return Ok(false);
        };

        apply(entry);
        self.write_raw(&entries).await?;
        Ok(true)
    }

    async fn read_document(&self) -> Result<Vec<E>, ContentError> {
        let bytes = match tokio::fs::read(&self.document).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Content document {:?} not found", self.document);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        if document::is_blank(&bytes) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&bytes).map_err(|source| ContentError::ParseFailed {
            path: self.document.clone(),
            source,
        })
    }

    async fn scan(&self) -> Result<Vec<E>, ContentError> {
        let root = self.image_root.clone();
        let scanned = tokio::task::spawn_blocking(move || scanner::scan_entries(&root)).await?;

        Ok(scanned
            .into_iter()
            .enumerate()
            .map(|(index, entry)| E::from_scan(index as u64 + 1, entry))
            .collect())
    }

    fn materialize(&self, raw: Vec<E>) -> Vec<E> {
        let namespace = E::NAMESPACE;
        raw.into_iter()
            .map(|entry| {
                let urls = entry
                    .image_references()
                    .into_iter()
                    .filter_map(|reference| {
                        if paths::is_external(&reference) {
                            return Some(reference.trim().to_string());
                        }
                        let relative = stored_relative(&reference, namespace);
                        paths::image_exists(&self.image_root, &relative)
                            .then(|| paths::to_url(&relative, namespace))
                    })
                    .collect();
                entry.into_public(urls)
            })
            .collect()
    }
}
