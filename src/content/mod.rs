// Content module - gallery albums and catalog products backed by JSON documents
mod catalog;
mod error;
mod gallery;
pub mod handlers;
mod store;
mod types;

pub use catalog::slugify;
pub use error::ContentError;
pub use store::parse_entry_id;
pub use types::*;

use crate::{paths::AssetNamespace, scanner::ScannedEntry};
use serde::{Serialize, de::DeserializeOwned};
use std::{path::PathBuf, sync::Arc};
use tokio::sync::{Mutex, RwLock};

/// A unit of a content document: a gallery album or a catalog product.
pub trait Entry: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    type Patch: Send + 'static;

    /// Namespace the entry's image URLs live under.
    const NAMESPACE: AssetNamespace;

    fn id(&self) -> u64;
    fn set_id(&mut self, id: u64);

    fn from_scan(id: u64, scanned: ScannedEntry) -> Self;

    /// Stored image references in display order.
    fn image_references(&self) -> Vec<String>;
    fn images_mut(&mut self) -> &mut Vec<String>;

    fn images_added(&mut self) {}
    fn images_removed(&mut self) {}

    /// Replace the stored references with materialized public URLs.
    fn into_public(self, urls: Vec<String>) -> Self;

    /// Convert a caller-supplied public entry back to its stored shape.
    fn into_stored(self) -> Self;

    fn apply_patch(&mut self, patch: Self::Patch);
}

/// JSON document of entries plus the image root their paths resolve against.
///
/// Every mutation re-reads the document and rewrites it whole. Mutations made
/// through the store are serialized by `write_lock`; the materialized snapshot
/// is only replaced by `load`/`refresh`.
pub struct ContentStore<E: Entry> {
    document: PathBuf,
    image_root: PathBuf,
    write_lock: Mutex<()>,
    snapshot: RwLock<Vec<E>>,
}

pub type GalleryStore = ContentStore<Album>;
pub type CatalogStore = ContentStore<Product>;
pub type SharedGalleryStore = Arc<GalleryStore>;
pub type SharedCatalogStore = Arc<CatalogStore>;

impl<E: Entry> ContentStore<E> {
    pub fn new(document: PathBuf, image_root: PathBuf) -> Self {
        Self {
            document,
            image_root,
            write_lock: Mutex::new(()),
            snapshot: RwLock::new(Vec::new()),
        }
    }

    pub fn document_path(&self) -> &std::path::Path {
        &self.document
    }

    pub fn image_root(&self) -> &std::path::Path {
        &self.image_root
    }

    pub fn namespace(&self) -> AssetNamespace {
        E::NAMESPACE
    }
}
