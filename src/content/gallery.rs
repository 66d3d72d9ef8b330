use super::store::{parse_entry_id, public_to_stored};
use super::{Album, AlbumPatch, Entry, GalleryStore, UNTITLED_ALBUM};
use crate::ingest::entry_directory_name;
use crate::paths::AssetNamespace;
use crate::scanner::ScannedEntry;

impl Entry for Album {
    type Patch = AlbumPatch;

    const NAMESPACE: AssetNamespace = AssetNamespace::Objects;

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn from_scan(id: u64, scanned: ScannedEntry) -> Self {
        Self {
            id,
            title: scanned.name,
            images: scanned.images,
        }
    }

    fn image_references(&self) -> Vec<String> {
        self.images.clone()
    }

    fn images_mut(&mut self) -> &mut Vec<String> {
        &mut self.images
    }

    fn into_public(self, urls: Vec<String>) -> Self {
        Self {
            images: urls,
            ..self
        }
    }

    fn into_stored(self) -> Self {
        let title = match self.title.trim() {
            "" => UNTITLED_ALBUM.to_string(),
            title => title.to_string(),
        };
        Self {
            id: self.id,
            title,
            images: self
                .images
                .iter()
                .map(|url| public_to_stored(url, Self::NAMESPACE))
                .collect(),
        }
    }

    fn apply_patch(&mut self, patch: AlbumPatch) {
        if let Some(title) = patch.title {
            let title = title.trim();
            if !title.is_empty() {
                self.title = title.to_string();
            }
        }
        if let Some(images) = patch.images {
            self.images = images
                .iter()
                .map(|url| public_to_stored(url, Self::NAMESPACE))
                .collect();
        }
    }
}

impl GalleryStore {
    /// Directory under the objects root that uploads for an album land in.
    pub async fn album_directory(&self, id: &str) -> Option<String> {
        let id = parse_entry_id(id)?;
        self.load_raw()
            .await
            .into_iter()
            .find(|album| album.id == id)
            .map(|album| entry_directory_name(&album.title))
    }
}
