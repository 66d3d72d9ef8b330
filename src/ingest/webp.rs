use image::DynamicImage;
use std::path::Path;
use tracing::debug;

use super::IngestError;

/// Encode `image` as WebP at `quality` (0-100) and write it to `path`.
/// Images with an alpha channel keep it.
pub fn save(image: &DynamicImage, path: &Path, quality: f32) -> Result<(), IngestError> {
    let (width, height) = (image.width(), image.height());

    let encoded = if image.color().has_alpha() {
        let rgba = image.to_rgba8();
        ::webp::Encoder::from_rgba(rgba.as_raw(), width, height).encode(quality)
    } else {
        let rgb = image.to_rgb8();
        ::webp::Encoder::from_rgb(rgb.as_raw(), width, height).encode(quality)
    };

    if encoded.is_empty() {
        return Err(IngestError::EncodingFailed(format!(
            "empty output for {}x{} image",
            width, height
        )));
    }

    std::fs::write(path, &*encoded)?;
    debug!(
        "WebP written: {:?} ({}x{}, {} bytes)",
        path,
        width,
        height,
        encoded.len()
    );
    Ok(())
}
