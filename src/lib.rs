use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod api;
pub mod assets;
pub mod content;
pub mod document;
pub mod ingest;
pub mod leads;
pub mod paths;
pub mod scanner;
pub mod startup_checks;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub app: AppConfig,
    pub content: ContentConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub name: String,
    pub log_level: String,
    /// Admin routes are open when unset or empty.
    #[serde(default)]
    pub admin_password: Option<String>,
    pub session_secret: String,
    /// CRM webhook token check is disabled when unset or empty.
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContentConfig {
    /// Holds `gallery.json`, `catalog.json` and `leads.json`.
    pub data_directory: PathBuf,
    /// Image root for gallery albums, served under `/assets/objects`.
    pub objects_directory: PathBuf,
    /// Image root for catalog products, served under `/assets/catalog`.
    pub catalog_directory: PathBuf,
}

impl ContentConfig {
    pub fn gallery_document(&self) -> PathBuf {
        self.data_directory.join("gallery.json")
    }

    pub fn catalog_document(&self) -> PathBuf {
        self.data_directory.join("catalog.json")
    }

    pub fn leads_document(&self) -> PathBuf {
        self.data_directory.join("leads.json")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Longest side of a stored image in pixels
    pub max_side: u32,
    pub webp_quality: f32,
    pub max_upload_bytes: usize,
    /// Parallel conversions for the `compress` command
    pub compress_concurrency: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "Brick Site".to_string(),
            log_level: "info".to_string(),
            admin_password: None,
            session_secret: "change-me-in-production".to_string(),
            webhook_secret: None,
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            data_directory: PathBuf::from("data"),
            objects_directory: PathBuf::from("assets/objects"),
            catalog_directory: PathBuf::from("assets/catalog"),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_side: 1920,
            webp_quality: 90.0,
            max_upload_bytes: 50 * 1024 * 1024,
            compress_concurrency: 4,
        }
    }
}

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use content::{CatalogStore, GalleryStore, SharedCatalogStore, SharedGalleryStore, handlers};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub gallery: SharedGalleryStore,
    pub catalog: SharedCatalogStore,
    pub leads: leads::SharedLeadStore,
    pub ingest: ingest::ImageIngest,
    pub objects_assets: assets::AssetHandler,
    pub catalog_assets: assets::AssetHandler,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let content = &config.content;
        Self {
            gallery: Arc::new(GalleryStore::new(
                content.gallery_document(),
                content.objects_directory.clone(),
            )),
            catalog: Arc::new(CatalogStore::new(
                content.catalog_document(),
                content.catalog_directory.clone(),
            )),
            leads: Arc::new(leads::LeadStore::new(content.leads_document())),
            ingest: ingest::ImageIngest::new(config.ingest.clone()),
            objects_assets: assets::AssetHandler::new(
                content.objects_directory.clone(),
                paths::AssetNamespace::Objects,
            ),
            catalog_assets: assets::AssetHandler::new(
                content.catalog_directory.clone(),
                paths::AssetNamespace::Catalog,
            ),
            config,
        }
    }
}

pub async fn create_app(config: Config) -> Router {
    let app_state = AppState::new(config);

    match app_state.gallery.load().await {
        Ok(albums) => tracing::info!("Gallery loaded with {} albums", albums.len()),
        Err(e) => tracing::error!("Failed to load gallery: {}", e),
    }
    match app_state.catalog.load().await {
        Ok(products) => tracing::info!("Catalog loaded with {} products", products.len()),
        Err(e) => tracing::error!("Failed to load catalog: {}", e),
    }

    let admin = Router::new()
        .route(
            "/gallery",
            axum::routing::put(handlers::gallery_save_handler),
        )
        .route(
            "/gallery/import",
            post(handlers::gallery_import_handler),
        )
        .route(
            "/gallery/{id}",
            axum::routing::patch(handlers::gallery_update_handler),
        )
        .route(
            "/gallery/{id}/images",
            post(handlers::gallery_upload_handler)
                .delete(handlers::gallery_remove_images_handler),
        )
        .route(
            "/catalog",
            axum::routing::put(handlers::catalog_save_handler),
        )
        .route(
            "/catalog/import",
            post(handlers::catalog_import_handler),
        )
        .route(
            "/catalog/{id}",
            axum::routing::patch(handlers::catalog_update_handler),
        )
        .route(
            "/catalog/{id}/images",
            post(handlers::catalog_upload_handler)
                .delete(handlers::catalog_remove_images_handler),
        )
        .route("/leads", get(leads::handlers::leads_list_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            app_state.clone(),
            api::require_admin,
        ))
        .layer(DefaultBodyLimit::max(app_state.config.ingest.max_upload_bytes));

    Router::new()
        .route("/api/gallery", get(handlers::gallery_list_handler))
        .route("/api/catalog", get(handlers::catalog_list_handler))
        .route(
            "/api/catalog/{slug}",
            get(handlers::catalog_product_handler),
        )
        .route("/api/lead", post(leads::handlers::lead_handler))
        .route(
            "/api/webhook/lead",
            post(leads::handlers::webhook_handler),
        )
        .route("/api/admin/login", post(api::login_handler))
        .route("/api/admin/logout", post(api::logout_handler))
        .nest("/api/admin", admin)
        .route(
            "/assets/objects/{*path}",
            get(assets::objects_asset_handler),
        )
        .route(
            "/assets/catalog/{*path}",
            get(assets::catalog_asset_handler),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let method = request.method();
                    let uri = request.uri();
                    let matched_path = request
                        .extensions()
                        .get::<axum::extract::MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::info_span!(
                        "http_request",
                        method = %method,
                        uri = %uri,
                        matched_path,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    let uri = request.uri();
                    let user_agent = request
                        .headers()
                        .get("user-agent")
                        .and_then(|h| h.to_str().ok())
                        .unwrap_or("-");

                    tracing::info!(
                        target: "access_log",
                        method = %request.method(),
                        path = %uri.path(),
                        query = ?uri.query(),
                        user_agent = %user_agent,
                        "request"
                    );
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        let size = response
                            .headers()
                            .get("content-length")
                            .and_then(|h| h.to_str().ok())
                            .unwrap_or("-");

                        tracing::info!(
                            target: "access_log",
                            status = %response.status(),
                            size = %size,
                            latency_ms = %latency.as_millis(),
                            "response"
                        );
                    },
                ),
        )
        .with_state(app_state)
}
