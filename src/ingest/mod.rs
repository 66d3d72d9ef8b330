// Image ingest - normalizes uploaded images into the canonical WebP format
pub mod compress;
mod webp;

use crate::{IngestConfig, paths, scanner::is_image_file};
use image::{DynamicImage, imageops::FilterType};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("WebP encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Invalid target directory: {0}")]
    InvalidDirectory(String),

    #[error("Background task failed: {0}")]
    TaskError(#[from] tokio::task::JoinError),
}

/// One uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ImageIngest {
    config: IngestConfig,
}

impl ImageIngest {
    pub fn new(config: IngestConfig) -> Self {
        Self { config }
    }

    /// Normalize and write a batch of uploads under `root/directory`.
    ///
    /// Files with unrecognized extensions are skipped. Files are processed in
    /// order and the first failure aborts the batch; files already written stay
    /// on disk. Returns the relative paths of the written files.
    pub async fn ingest_batch(
        &self,
        root: &Path,
        directory: &str,
        uploads: Vec<Upload>,
    ) -> Result<Vec<String>, IngestError> {
        let target_dir = paths::resolve(root, directory)
            .filter(|dir| dir != root)
            .ok_or_else(|| IngestError::InvalidDirectory(directory.to_string()))?;
        tokio::fs::create_dir_all(&target_dir).await?;

        let stamp = chrono::Utc::now().timestamp_millis();
        let mut written = Vec::new();

        for (index, upload) in uploads.into_iter().enumerate() {
            if !is_image_file(&upload.file_name) {
                debug!("Skipping upload with unsupported name {:?}", upload.file_name);
                continue;
            }

            let file_name = generated_file_name(stamp, index, &upload.file_name);
            let output = target_dir.join(&file_name);
            let max_side = self.config.max_side;
            let quality = self.config.webp_quality;

            tokio::task::spawn_blocking(move || {
                process_upload(&upload.bytes, &output, max_side, quality)
            })
            .await??;

            written.push(format!("{}/{}", directory, file_name));
        }

        info!(
            "Ingested {} images into {:?}",
            written.len(),
            target_dir
        );
        Ok(written)
    }
}

/// Directory name for an entry title: path separators become `_`.
pub fn entry_directory_name(title: &str) -> String {
    let name = title.trim().replace(['/', '\\'], "_");
    match name.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => name,
    }
}

/// `<timestamp>-<index>-<stem>.webp` with whitespace removed from the stem.
fn generated_file_name(stamp: i64, index: usize, original: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or(original);
    let stem = base.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(base);
    let stem: String = stem.chars().filter(|c| !c.is_whitespace()).collect();

    if stem.is_empty() {
        format!("{}-{}.{}", stamp, index, paths::CANONICAL_EXTENSION)
    } else {
        format!("{}-{}-{}.{}", stamp, index, stem, paths::CANONICAL_EXTENSION)
    }
}

fn process_upload(
    bytes: &[u8],
    output: &Path,
    max_side: u32,
    quality: f32,
) -> Result<(), IngestError> {
    let img = image::load_from_memory(bytes)?;
    let resized = fit_within(img, max_side);
    webp::save(&resized, output, quality)
}

/// Shrink so neither side exceeds `max_side`, keeping the aspect ratio.
/// Never upscales.
fn fit_within(img: DynamicImage, max_side: u32) -> DynamicImage {
    if img.width() <= max_side && img.height() <= max_side {
        return img;
    }
    img.resize(max_side, max_side, FilterType::Lanczos3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn ingest() -> ImageIngest {
        ImageIngest::new(IngestConfig::default())
    }

    #[test]
    fn test_entry_directory_name() {
        assert_eq!(entry_directory_name("Дом / баня"), "Дом _ баня");
        assert_eq!(entry_directory_name("a\\b"), "a_b");
        assert_eq!(entry_directory_name(".."), "_");
        assert_eq!(entry_directory_name("  "), "_");
    }

    #[test]
    fn test_generated_file_name_strips_whitespace() {
        assert_eq!(
            generated_file_name(1700000000000, 2, "My Photo 1.JPG"),
            "1700000000000-2-MyPhoto1.webp"
        );
        assert_eq!(
            generated_file_name(1, 0, "C:\\Users\\me\\img.png"),
            "1-0-img.webp"
        );
        assert_eq!(generated_file_name(1, 0, ".png"), "1-0.webp");
    }

    #[test]
    fn test_fit_within_never_upscales() {
        let small = DynamicImage::ImageRgb8(ImageBuffer::new(640, 480));
        let kept = fit_within(small, 1920);
        assert_eq!((kept.width(), kept.height()), (640, 480));

        let wide = DynamicImage::ImageRgb8(ImageBuffer::new(4000, 1000));
        let resized = fit_within(wide, 1920);
        assert_eq!((resized.width(), resized.height()), (1920, 480));
    }

    #[tokio::test]
    async fn test_ingest_batch_writes_webp() {
        let temp = TempDir::new().unwrap();
        let uploads = vec![
            Upload {
                file_name: "фасад 1.png".to_string(),
                bytes: png_bytes(2400, 1200),
            },
            Upload {
                file_name: "notes.txt".to_string(),
                bytes: b"not an image".to_vec(),
            },
        ];

        let written = ingest()
            .ingest_batch(temp.path(), "Объект", uploads)
            .await
            .unwrap();

        assert_eq!(written.len(), 1);
        assert!(written[0].starts_with("Объект/"));
        assert!(written[0].ends_with("-0-фасад1.webp"));

        let path = paths::resolve(temp.path(), &written[0]).unwrap();
        let decoded = image::open(&path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1920, 960));
    }

    #[tokio::test]
    async fn test_ingest_batch_fails_fast() {
        let temp = TempDir::new().unwrap();
        let uploads = vec![
            Upload {
                file_name: "good.png".to_string(),
                bytes: png_bytes(10, 10),
            },
            Upload {
                file_name: "broken.jpg".to_string(),
                bytes: b"definitely not a jpeg".to_vec(),
            },
            Upload {
                file_name: "later.png".to_string(),
                bytes: png_bytes(10, 10),
            },
        ];

        let result = ingest().ingest_batch(temp.path(), "album", uploads).await;
        assert!(matches!(result, Err(IngestError::ImageError(_))));

        let names: Vec<String> = std::fs::read_dir(temp.path().join("album"))
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names.len(), 1, "only the first file is written: {:?}", names);
        assert!(names[0].ends_with("-0-good.webp"));
    }

    #[tokio::test]
    async fn test_ingest_batch_rejects_escaping_directory() {
        let temp = TempDir::new().unwrap();
        let result = ingest()
            .ingest_batch(temp.path(), "..", Vec::new())
            .await;
        assert!(matches!(result, Err(IngestError::InvalidDirectory(_))));
    }
}
