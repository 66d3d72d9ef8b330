use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

pub const UNTITLED_ALBUM: &str = "Без названия";

/// Completed-project album shown in the gallery.
///
/// An `id` of `0` means "not assigned yet"; stored ids are positive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Album {
    pub id: u64,
    pub title: String,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Product {
    pub id: u64,
    pub slug: String,
    pub title: String,
    pub category: String,
    pub short: String,
    pub description: String,
    pub image: String,
    pub gallery: Vec<String>,
    /// Display rows, serialized as `[label, value]` pairs
    pub specs: Vec<(String, String)>,
    pub color: String,
    pub format: String,
    pub tags: BTreeSet<String>,
    pub price_from: Option<f64>,
    pub price_rub: Option<f64>,
    pub unit: String,
    pub availability: String,
    pub is_featured: bool,
    pub is_bestseller: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlbumPatch {
    pub title: Option<String>,
    pub images: Option<Vec<String>>,
}

/// Field-level product update. Absent fields are left untouched; for the
/// nullable prices an explicit `null` clears the value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    pub title: Option<String>,
    pub category: Option<String>,
    pub short: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub price_from: Option<Option<f64>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub price_rub: Option<Option<f64>>,
    pub unit: Option<String>,
    pub availability: Option<String>,
    pub color: Option<String>,
    pub format: Option<String>,
    pub tags: Option<BTreeSet<String>>,
    pub specs: Option<Vec<(String, String)>>,
    pub is_featured: Option<bool>,
    pub is_bestseller: Option<bool>,
    pub image: Option<String>,
    pub gallery: Option<Vec<String>>,
}

fn explicit_null<'de, D>(deserializer: D) -> Result<Option<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<f64>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RemoveImagesRequest {
    pub url: Option<String>,
    pub urls: Vec<String>,
    /// Also remove the backing files. Failures are logged, not reported.
    pub delete_files: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MutationResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MutationResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            message: None,
        }
    }

    pub fn declined(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub ok: bool,
    /// Public URLs of the stored images
    pub added: Vec<String>,
}
