use super::{IngestError, fit_within};
use crate::{paths::CANONICAL_EXTENSION, scanner::is_image_file};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{debug, error, info};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy)]
pub struct CompressOptions {
    pub max_side: u32,
    pub quality: f32,
    /// Files converted at the same time
    pub concurrency: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CompressSummary {
    pub converted: usize,
    pub failed: usize,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

impl CompressSummary {
    /// Percentage of input bytes saved, 0 when nothing was read.
    pub fn saved_percent(&self) -> f64 {
        if self.bytes_in == 0 {
            return 0.0;
        }
        (1.0 - self.bytes_out as f64 / self.bytes_in as f64) * 100.0
    }
}

/// Every image below `root` as (absolute path, path relative to `root`).
fn collect_images(root: &Path) -> Vec<(PathBuf, PathBuf)> {
    WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .flatten()
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name().to_str().is_some_and(is_image_file))
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(root).ok()?.to_path_buf();
            Some((entry.path().to_path_buf(), relative))
        })
        .collect()
}

/// Convert every image under `source` into a WebP under `target` at the same
/// relative path. A file that fails is logged and counted; the rest go on.
pub async fn compress_tree(
    source: &Path,
    target: &Path,
    options: CompressOptions,
) -> Result<CompressSummary, IngestError> {
    if !source.is_dir() {
        return Err(IngestError::InvalidDirectory(source.display().to_string()));
    }

    let root = source.to_path_buf();
    let images = tokio::task::spawn_blocking(move || collect_images(&root)).await?;
    let total = images.len();
    info!("Found {} images under {:?}", total, source);

    let permits = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let mut jobs = JoinSet::new();

    for (input, relative) in images {
        let output = target.join(&relative).with_extension(CANONICAL_EXTENSION);
        let permits = Arc::clone(&permits);
        jobs.spawn(async move {
            let _permit = permits.acquire_owned().await;
            let result = tokio::task::spawn_blocking({
                let input = input.clone();
                move || compress_file(&input, &output, options.max_side, options.quality)
            })
            .await;
            (input, result)
        });
    }

    let mut summary = CompressSummary::default();
    while let Some(joined) = jobs.join_next().await {
        let (input, result) = joined?;
        match result {
            Ok(Ok((bytes_in, bytes_out))) => {
                summary.converted += 1;
                summary.bytes_in += bytes_in;
                summary.bytes_out += bytes_out;
            }
            Ok(Err(e)) => {
                summary.failed += 1;
                error!("Failed to compress {:?}: {}", input, e);
            }
            Err(e) => {
                summary.failed += 1;
                error!("Compression task for {:?} failed: {}", input, e);
            }
        }

        let done = summary.converted + summary.failed;
        if done % 50 == 0 || done == total {
            info!("Processed {}/{}", done, total);
        }
    }

    Ok(summary)
}

/// Returns the input and output sizes in bytes.
fn compress_file(
    input: &Path,
    output: &Path,
    max_side: u32,
    quality: f32,
) -> Result<(u64, u64), IngestError> {
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let bytes = std::fs::read(input)?;
    let img = image::load_from_memory(&bytes)?;
    super::webp::save(&fit_within(img, max_side), output, quality)?;

    let written = std::fs::metadata(output)?.len();
    debug!("Compressed {:?} -> {:?}", input, output);
    Ok((bytes.len() as u64, written))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use std::fs;
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 64])
        });
        DynamicImage::ImageRgb8(img)
            .save_with_format(path, ImageFormat::Png)
            .unwrap();
    }

    fn options() -> CompressOptions {
        CompressOptions {
            max_side: 1920,
            quality: 90.0,
            concurrency: 2,
        }
    }

    #[tokio::test]
    async fn test_compress_tree_mirrors_relative_paths() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("raw");
        let target = temp.path().join("web");
        write_png(&source.join("Объект 1/фасад.png"), 2400, 1200);
        write_png(&source.join("Объект 1/этап 2/IMG_01.PNG"), 40, 30);
        fs::write(source.join("Объект 1/notes.txt"), b"x").unwrap();
        fs::write(source.join("broken.jpg"), b"not a jpeg").unwrap();

        let summary = compress_tree(&source, &target, options()).await.unwrap();
        assert_eq!(summary.converted, 2);
        assert_eq!(summary.failed, 1);
        assert!(summary.bytes_in > 0 && summary.bytes_out > 0);

        let large = image::open(target.join("Объект 1/фасад.webp")).unwrap();
        assert_eq!((large.width(), large.height()), (1920, 960));

        let small = image::open(target.join("Объект 1/этап 2/IMG_01.webp")).unwrap();
        assert_eq!((small.width(), small.height()), (40, 30));

        assert!(!target.join("Объект 1/notes.webp").exists());
        assert!(!target.join("broken.webp").exists());
        assert!(source.join("Объект 1/фасад.png").exists(), "sources are left in place");
    }

    #[tokio::test]
    async fn test_compress_tree_requires_source_directory() {
        let temp = TempDir::new().unwrap();
        let result = compress_tree(&temp.path().join("missing"), temp.path(), options()).await;
        assert!(matches!(result, Err(IngestError::InvalidDirectory(_))));
    }

    #[test]
    fn test_saved_percent() {
        let summary = CompressSummary {
            converted: 1,
            failed: 0,
            bytes_in: 1000,
            bytes_out: 250,
        };
        assert_eq!(summary.saved_percent(), 75.0);
        assert_eq!(CompressSummary::default().saved_percent(), 0.0);
    }
}
