use crate::scanner::IMAGE_EXTENSIONS;
use std::path::{Path, PathBuf};

/// Extension every ingested image is stored with.
pub const CANONICAL_EXTENSION: &str = "webp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetNamespace {
    /// Completed-project photos (gallery albums)
    Objects,
    /// Product photos (catalog)
    Catalog,
}

impl AssetNamespace {
    pub fn prefix(&self) -> &'static str {
        match self {
            AssetNamespace::Objects => "/assets/objects",
            AssetNamespace::Catalog => "/assets/catalog",
        }
    }
}

/// Convert a stored relative path into its public URL.
///
/// Every segment is percent-encoded on its own so `/` survives as the
/// separator, and the trailing extension is rewritten to the canonical one.
pub fn to_url(relative: &str, namespace: AssetNamespace) -> String {
    let canonical = canonical_relative(relative);
    let encoded: Vec<String> = canonical
        .trim_start_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("{}/{}", namespace.prefix(), encoded.join("/"))
}

/// Convert a public URL back into the `/`-separated relative path stored in
/// content documents.
///
/// Never fails: a segment that does not decode is kept as-is. Values that do
/// not carry the namespace prefix are decoded whole, so relative paths pass
/// through unchanged.
pub fn to_relative(url: &str, namespace: AssetNamespace) -> String {
    let url = url.trim();
    let rest = url
        .strip_prefix(namespace.prefix())
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(url);

    rest.split('/')
        .map(|segment| match urlencoding::decode(segment) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Relative path with its extension replaced by the canonical one.
/// Paths without an alphabetic extension are returned unchanged.
pub fn canonical_relative(relative: &str) -> String {
    let trimmed = relative.trim();
    if has_canonical_extension(trimmed) {
        return trimmed.to_string();
    }

    match trimmed.rfind('.') {
        Some(dot) if is_extension(&trimmed[dot + 1..]) => {
            format!("{}.{}", &trimmed[..dot], CANONICAL_EXTENSION)
        }
        _ => trimmed.to_string(),
    }
}

pub fn has_canonical_extension(path: &str) -> bool {
    path.to_lowercase()
        .ends_with(&format!(".{}", CANONICAL_EXTENSION))
}

fn is_extension(candidate: &str) -> bool {
    !candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_alphabetic())
}

/// Join a stored relative path onto `root` with platform separators.
///
/// Returns `None` when the path would escape `root`.
pub fn resolve(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for segment in relative.trim().split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if s.contains('\\') || Path::new(s).is_absolute() => return None,
            s => path.push(s),
        }
    }
    Some(path)
}

/// True when any of [`lookup_candidates`] exists under `root`, so listings
/// agree with what the asset routes serve.
pub fn image_exists(root: &Path, relative: &str) -> bool {
    let relative = relative.trim();
    if relative.is_empty() {
        return false;
    }

    lookup_candidates(relative)
        .iter()
        .filter_map(|candidate| resolve(root, candidate))
        .any(|path| path != root && path.is_file())
}

/// Relative paths that may hold the file for `relative`, most specific first:
/// the literal path, then its canonical variant, and for a canonical path the
/// originals it may have been converted from.
pub fn lookup_candidates(relative: &str) -> Vec<String> {
    let relative = relative.trim();
    let canonical = canonical_relative(relative);
    let mut candidates = vec![relative.to_string()];
    if canonical != relative {
        candidates.push(canonical);
    } else if let Some((stem, _)) = relative.rsplit_once('.') {
        candidates.extend(
            IMAGE_EXTENSIONS
                .iter()
                .filter(|ext| **ext != CANONICAL_EXTENSION)
                .map(|ext| format!("{}.{}", stem, ext)),
        );
    }
    candidates
}

/// Absolute `http(s)` references stored in place of a relative path.
pub fn is_external(value: &str) -> bool {
    let value = value.trim();
    value.starts_with("http://") || value.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const NAMESPACES: [AssetNamespace; 2] = [AssetNamespace::Objects, AssetNamespace::Catalog];

    #[test]
    fn test_to_url_encodes_each_segment() {
        let url = to_url("Дом у озера/фото 1.jpg", AssetNamespace::Objects);
        assert!(url.starts_with("/assets/objects/"));
        assert!(url.ends_with(".webp"));
        assert_eq!(url.matches('/').count(), 4, "separator must stay literal");
        assert!(!url.contains(' '));
        assert!(url.contains("%20"));
    }

    #[test]
    fn test_round_trip_rewrites_extension() {
        let paths = [
            "Кирпич красный/IMG_0001.JPG",
            "a/b/c d.png",
            "plain.jpeg",
            "folder/50% off.gif",
        ];

        for namespace in NAMESPACES {
            for path in paths {
                let back = to_relative(&to_url(path, namespace), namespace);
                let dot = path.rfind('.').unwrap();
                assert_eq!(back, format!("{}.webp", &path[..dot]));
            }
        }
    }

    #[test]
    fn test_to_url_is_idempotent_for_canonical_paths() {
        for namespace in NAMESPACES {
            let first = to_url("Объект 7/фасад.webp", namespace);
            let again = to_url(&to_relative(&first, namespace), namespace);
            assert_eq!(first, again);

            let from_jpg = to_url("Объект 7/фасад.jpg", namespace);
            assert_eq!(
                to_url(&to_relative(&from_jpg, namespace), namespace),
                from_jpg
            );
        }
    }

    #[test]
    fn test_to_relative_tolerates_malformed_escapes() {
        // %FF%FE is not valid UTF-8 once decoded
        let relative = to_relative("/assets/catalog/ok%20dir/%FF%FE.webp", AssetNamespace::Catalog);
        assert_eq!(relative, "ok dir/%FF%FE.webp");
    }

    #[test]
    fn test_to_relative_passes_relative_paths_through() {
        assert_eq!(
            to_relative("Альбом/1.webp", AssetNamespace::Objects),
            "Альбом/1.webp"
        );
    }

    #[test]
    fn test_canonical_relative() {
        assert_eq!(canonical_relative("a/b.JPG"), "a/b.webp");
        assert_eq!(canonical_relative("a/b.WEBP"), "a/b.WEBP");
        assert_eq!(canonical_relative("no_extension"), "no_extension");
        assert_eq!(canonical_relative("v1.2/file"), "v1.2/file");
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let root = Path::new("/srv/images");
        assert!(resolve(root, "../etc/passwd").is_none());
        assert!(resolve(root, "a/../../b").is_none());
        assert_eq!(
            resolve(root, "a/b.webp").unwrap(),
            root.join("a").join("b.webp")
        );
    }

    #[test]
    fn test_image_exists_checks_canonical_variant() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("album")).unwrap();
        std::fs::write(temp.path().join("album/photo.webp"), b"x").unwrap();

        assert!(image_exists(temp.path(), "album/photo.webp"));
        assert!(image_exists(temp.path(), "album/photo.jpg"));
        assert!(!image_exists(temp.path(), "album/other.jpg"));
        assert!(!image_exists(temp.path(), "  "));
    }

    #[test]
    fn test_image_exists_finds_unconverted_original() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("album")).unwrap();
        std::fs::write(temp.path().join("album/raw.jpg"), b"x").unwrap();

        assert!(image_exists(temp.path(), "album/raw.webp"));
        assert!(image_exists(temp.path(), "album/raw.jpg"));
        assert!(!image_exists(temp.path(), "album/other.webp"));
    }

    #[test]
    fn test_lookup_candidates() {
        assert_eq!(lookup_candidates("A/1.jpg"), vec!["A/1.jpg", "A/1.webp"]);

        let canonical = lookup_candidates("A/1.webp");
        assert_eq!(canonical[0], "A/1.webp");
        assert!(canonical.contains(&"A/1.png".to_string()));
        assert_eq!(canonical.iter().filter(|c| c.ends_with(".webp")).count(), 1);
    }

    #[test]
    fn test_is_external() {
        assert!(is_external("https://cdn.example.com/a.jpg"));
        assert!(!is_external("/assets/catalog/a.webp"));
        assert!(!is_external("httpfolder/a.jpg"));
    }
}
