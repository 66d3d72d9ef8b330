use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Extensions recognized as images, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// One top-level directory of a scanned root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedEntry {
    pub name: String,
    /// Paths relative to the scanned root, `/`-separated, sorted.
    pub images: Vec<String>,
}

/// Recognized by extension alone.
pub fn is_image_file(file_name: &str) -> bool {
    match file_name.rsplit_once('.') {
        Some((_, ext)) => {
            let ext = ext.to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}

/// Walk `root` and produce one entry per immediate child directory holding at
/// least one image anywhere below it.
///
/// A missing root yields an empty list. Directories are visited in file-name
/// order so ids assigned from this listing are stable between scans.
pub fn scan_entries(root: &Path) -> Vec<ScannedEntry> {
    if !root.is_dir() {
        debug!("Scan root {:?} does not exist", root);
        return Vec::new();
    }

    let mut entries = Vec::new();

    for top in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .flatten()
    {
        if !top.file_type().is_dir() {
            continue;
        }

        let name = top.file_name().to_string_lossy().to_string();
        let mut images = collect_images(top.path(), root);
        if images.is_empty() {
            debug!("Skipping {:?}: no images", top.path());
            continue;
        }
        images.sort();

        entries.push(ScannedEntry { name, images });
    }

    debug!("Scanned {:?}: {} entries", root, entries.len());
    entries
}

fn collect_images(dir: &Path, root: &Path) -> Vec<String> {
    WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .flatten()
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(is_image_file)
        })
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(root).ok()?;
            let segments: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect();
            Some(segments.join("/"))
        })
        .collect()
}
