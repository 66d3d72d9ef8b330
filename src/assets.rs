use crate::{
    AppState,
    paths::{self, AssetNamespace},
};
use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use std::{path::PathBuf, time::UNIX_EPOCH};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, error};

/// Serves one image root under its public URL namespace.
#[derive(Clone)]
pub struct AssetHandler {
    root: PathBuf,
    namespace: AssetNamespace,
}

impl AssetHandler {
    pub fn new(root: PathBuf, namespace: AssetNamespace) -> Self {
        Self { root, namespace }
    }

    /// File behind a request path, see [`paths::lookup_candidates`].
    pub async fn locate(&self, request_path: &str) -> Option<PathBuf> {
        let relative = paths::to_relative(request_path, self.namespace);

        for candidate in paths::lookup_candidates(&relative) {
            let Some(path) = paths::resolve(&self.root, &candidate) else {
                error!("Path traversal attempt: {:?}", request_path);
                return None;
            };
            if path == self.root {
                return None;
            }
            if tokio::fs::metadata(&path)
                .await
                .is_ok_and(|metadata| metadata.is_file())
            {
                return Some(path);
            }
        }
        None
    }

    pub async fn serve(&self, request_path: &str, request_headers: &HeaderMap) -> Response {
        let Some(file_path) = self.locate(request_path).await else {
            debug!("No asset for {:?}", request_path);
            return (StatusCode::NOT_FOUND, "File not found").into_response();
        };

        let metadata = match tokio::fs::metadata(&file_path).await {
            Ok(m) => m,
            Err(e) => {
                debug!("Failed to get metadata for {:?}: {}", file_path, e);
                return (StatusCode::NOT_FOUND, "File not found").into_response();
            }
        };

        let etag = metadata
            .modified()
            .ok()
            .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
            .map(|duration| format!("\"{}-{}\"", duration.as_secs(), metadata.len()));

        if let Some(etag) = &etag
            && request_headers
                .get(header::IF_NONE_MATCH)
                .and_then(|value| value.to_str().ok())
                .is_some_and(|value| value == etag.as_str())
        {
            return StatusCode::NOT_MODIFIED.into_response();
        }

        let file = match File::open(&file_path).await {
            Ok(file) => file,
            Err(e) => {
                debug!("Failed to open file {:?}: {}", file_path, e);
                return (StatusCode::NOT_FOUND, "File not found").into_response();
            }
        };

        let content_type = mime_guess::from_path(&file_path)
            .first_or_octet_stream()
            .to_string();
        let body = Body::from_stream(ReaderStream::new(file));

        let mut response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CACHE_CONTROL, "public, max-age=86400");

        if let Ok(modified) = metadata.modified() {
            response = response.header(header::LAST_MODIFIED, httpdate::fmt_http_date(modified));
        }
        if let Some(etag) = etag {
            response = response.header(header::ETAG, etag);
        }

        response.body(body).unwrap_or_else(|e| {
            error!("Failed to build asset response: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        })
    }
}

pub async fn objects_asset_handler(
    State(app_state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    app_state.objects_assets.serve(uri.path(), &headers).await
}

pub async fn catalog_asset_handler(
    State(app_state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    app_state.catalog_assets.serve(uri.path(), &headers).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn handler(temp: &TempDir) -> AssetHandler {
        AssetHandler::new(temp.path().to_path_buf(), AssetNamespace::Objects)
    }

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"bytes").unwrap();
    }

    #[tokio::test]
    async fn test_locate_prefers_literal_then_canonical() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "Дом/1.webp");
        touch(temp.path(), "Дом/2.png");

        let handler = handler(&temp);
        let url = paths::to_url("Дом/1.jpg", AssetNamespace::Objects);
        assert_eq!(
            handler.locate(&url).await,
            Some(temp.path().join("Дом").join("1.webp"))
        );

        // A non-canonical request resolves to the converted file.
        assert_eq!(
            handler.locate("/assets/objects/%D0%94%D0%BE%D0%BC/1.jpg").await,
            Some(temp.path().join("Дом").join("1.webp"))
        );

        // A canonical URL for a file that was never converted.
        let url = paths::to_url("Дом/2.png", AssetNamespace::Objects);
        assert_eq!(
            handler.locate(&url).await,
            Some(temp.path().join("Дом").join("2.png"))
        );
    }

    #[tokio::test]
    async fn test_locate_rejects_traversal_and_missing() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "A/1.webp");
        let handler = handler(&temp);

        assert!(handler.locate("/assets/objects/../secret.webp").await.is_none());
        assert!(handler.locate("/assets/objects/A/none.webp").await.is_none());
        assert!(handler.locate("/assets/objects/").await.is_none());
    }
}
