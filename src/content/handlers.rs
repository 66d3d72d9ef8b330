use super::{
    Album, AlbumPatch, ContentError, ContentStore, Entry, MutationResponse, Product, ProductPatch,
    RemoveImagesRequest, UploadResponse,
};
use crate::{
    AppState,
    ingest::{ImageIngest, IngestError, Upload},
    paths,
};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::{error, info, warn};

const ENTRY_NOT_FOUND: &str = "Запись не найдена";

pub async fn gallery_list_handler(State(app_state): State<AppState>) -> Json<Vec<Album>> {
    Json(app_state.gallery.get().await)
}

pub async fn catalog_list_handler(State(app_state): State<AppState>) -> Json<Vec<Product>> {
    Json(app_state.catalog.get().await)
}

pub async fn catalog_product_handler(
    State(app_state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Product>, StatusCode> {
    app_state
        .catalog
        .find_by_slug(&slug)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn gallery_save_handler(
    State(app_state): State<AppState>,
    Json(albums): Json<Vec<Album>>,
) -> Result<Json<Vec<Album>>, StatusCode> {
    save_entries(&app_state.gallery, albums).await.map(Json)
}

pub async fn catalog_save_handler(
    State(app_state): State<AppState>,
    Json(products): Json<Vec<Product>>,
) -> Result<Json<Vec<Product>>, StatusCode> {
    save_entries(&app_state.catalog, products).await.map(Json)
}

pub async fn gallery_import_handler(
    State(app_state): State<AppState>,
) -> Result<Json<Vec<Album>>, StatusCode> {
    import_entries(&app_state.gallery).await.map(Json)
}

pub async fn catalog_import_handler(
    State(app_state): State<AppState>,
) -> Result<Json<Vec<Product>>, StatusCode> {
    import_entries(&app_state.catalog).await.map(Json)
}

pub async fn gallery_update_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<AlbumPatch>,
) -> Response {
    update_entry(&app_state.gallery, &id, patch).await
}

pub async fn catalog_update_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<ProductPatch>,
) -> Response {
    update_entry(&app_state.catalog, &id, patch).await
}

pub async fn gallery_upload_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Response {
    let directory = app_state.gallery.album_directory(&id).await;
    upload_images(&app_state.gallery, &app_state.ingest, &id, directory, multipart).await
}

pub async fn catalog_upload_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Response {
    let directory = app_state.catalog.product_directory(&id).await;
    upload_images(&app_state.catalog, &app_state.ingest, &id, directory, multipart).await
}

pub async fn gallery_remove_images_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RemoveImagesRequest>,
) -> Response {
    remove_images(&app_state.gallery, &id, request).await
}

pub async fn catalog_remove_images_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RemoveImagesRequest>,
) -> Response {
    remove_images(&app_state.catalog, &id, request).await
}

fn internal_error(context: &str, e: impl std::fmt::Display) -> StatusCode {
    error!("{}: {}", context, e);
    StatusCode::INTERNAL_SERVER_ERROR
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(MutationResponse::declined(ENTRY_NOT_FOUND)),
    )
        .into_response()
}

/// Reload the snapshot after a mutation. The mutation itself already
/// succeeded, so a failed reload is only logged.
async fn refresh_after_mutation<E: Entry>(store: &ContentStore<E>) {
    if let Err(e) = store.refresh().await {
        warn!(
            "Failed to refresh {:?} after mutation: {}",
            store.document_path(),
            e
        );
    }
}

async fn save_entries<E: Entry>(
    store: &ContentStore<E>,
    entries: Vec<E>,
) -> Result<Vec<E>, StatusCode> {
    store
        .save(entries)
        .await
        .map_err(|e| internal_error("Failed to save content document", e))?;
    store
        .load()
        .await
        .map_err(|e| internal_error("Failed to reload content document", e))
}

async fn import_entries<E: Entry>(store: &ContentStore<E>) -> Result<Vec<E>, StatusCode> {
    store
        .import_from_scan()
        .await
        .map_err(|e| internal_error("Failed to import from image root", e))
}

async fn update_entry<E: Entry>(store: &ContentStore<E>, id: &str, patch: E::Patch) -> Response {
    match store.update_entry(id, patch).await {
        Ok(true) => {
            refresh_after_mutation(store).await;
            Json(MutationResponse::ok()).into_response()
        }
        Ok(false) => not_found(),
        Err(e) => internal_error("Failed to update entry", e).into_response(),
    }
}

async fn upload_images<E: Entry>(
    store: &ContentStore<E>,
    ingest: &ImageIngest,
    id: &str,
    directory: Option<String>,
    multipart: Multipart,
) -> Response {
    let Some(directory) = directory else {
        return not_found();
    };

    let uploads = match read_uploads(multipart).await {
        Ok(uploads) => uploads,
        Err(e) => {
            warn!("Rejected malformed upload for entry {}: {}", id, e);
            return (
                StatusCode::BAD_REQUEST,
                Json(MutationResponse::declined(e.body_text())),
            )
                .into_response();
        }
    };

    let added = match ingest
        .ingest_batch(store.image_root(), &directory, uploads)
        .await
    {
        Ok(added) => added,
        Err(e @ (IngestError::ImageError(_) | IngestError::InvalidDirectory(_))) => {
            warn!("Rejected upload for entry {}: {}", id, e);
            return (
                StatusCode::BAD_REQUEST,
                Json(MutationResponse::declined(e.to_string())),
            )
                .into_response();
        }
        Err(e) => return internal_error("Image ingest failed", e).into_response(),
    };

    if !added.is_empty() {
        match store.add_images(id, added.clone()).await {
            Ok(true) => refresh_after_mutation(store).await,
            Ok(false) => return not_found(),
            Err(e) => return internal_error("Failed to record uploaded images", e).into_response(),
        }
    }

    info!("Uploaded {} images to entry {}", added.len(), id);
    let added = added
        .iter()
        .map(|relative| paths::to_url(relative, E::NAMESPACE))
        .collect();
    Json(UploadResponse { ok: true, added }).into_response()
}

async fn read_uploads(
    mut multipart: Multipart,
) -> Result<Vec<Upload>, axum::extract::multipart::MultipartError> {
    let mut uploads = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await?;
        uploads.push(Upload {
            file_name,
            bytes: bytes.to_vec(),
        });
    }
    Ok(uploads)
}

async fn remove_images<E: Entry>(
    store: &ContentStore<E>,
    id: &str,
    request: RemoveImagesRequest,
) -> Response {
    let mut urls = request.urls;
    if let Some(url) = request.url {
        urls.push(url);
    }

    let removed = match urls.as_slice() {
        [url] => store.remove_image(id, url).await,
        _ => store.remove_images(id, &urls).await,
    };

    match removed {
        Ok(true) => {}
        Ok(false) => return not_found(),
        Err(e) => return internal_error("Failed to remove images", e).into_response(),
    }

    if request.delete_files {
        for url in &urls {
            if let Err(e) = store.delete_image_file(url).await {
                log_delete_failure(&e);
            }
        }
    }

    refresh_after_mutation(store).await;
    Json(MutationResponse::ok()).into_response()
}

fn log_delete_failure(e: &ContentError) {
    match e {
        ContentError::DeleteFailed { path, source } => {
            warn!("Could not delete image file {:?}: {}", path, source)
        }
        other => warn!("Could not delete image file: {}", other),
    }
}
