use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use brick_site::{
    Config,
    content::{CatalogStore, GalleryStore},
    create_app,
    ingest::compress::{CompressOptions, compress_tree},
    leads::LeadStore,
    startup_checks,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Global options that apply to all commands
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the web server (default if no command specified)
    Serve {
        #[arg(short, long)]
        port: Option<u16>,

        #[arg(long)]
        host: Option<String>,

        /// Automatically quit after specified number of seconds (useful for testing)
        #[arg(long)]
        quit_after: Option<u64>,
    },

    /// Rebuild a content document from its image directory
    Import {
        #[arg(value_enum)]
        target: ImportTarget,
    },

    /// Convert an image tree into WebP at the same relative paths
    Compress {
        /// Directory holding the original images
        source: PathBuf,

        /// Directory the WebP files are written to
        target: PathBuf,

        /// Longest side in pixels (defaults to the ingest setting)
        #[arg(long)]
        max_side: Option<u32>,

        /// WebP quality 0-100 (defaults to the ingest setting)
        #[arg(long)]
        quality: Option<f32>,

        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Print captured leads, newest first
    Leads {
        /// Print at most this many leads
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ImportTarget {
    Gallery,
    Catalog,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(&cli.config)?;

    match cli.command {
        Some(Commands::Import { target }) => run_import(&config, target).await,
        Some(Commands::Leads { limit }) => print_leads(&config, limit).await,
        Some(Commands::Compress {
            source,
            target,
            max_side,
            quality,
            concurrency,
        }) => {
            let options = CompressOptions {
                max_side: max_side.unwrap_or(config.ingest.max_side),
                quality: quality.unwrap_or(config.ingest.webp_quality),
                concurrency: concurrency.unwrap_or(config.ingest.compress_concurrency),
            };
            run_compress(&source, &target, options).await
        }
        Some(Commands::Serve {
            port,
            host,
            quit_after,
        }) => run_server(config, port, host, quit_after).await,
        None => run_server(config, None, None, None).await,
    }
}

fn load_config(config_path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    if config_path.exists() {
        let config_content = std::fs::read_to_string(config_path)?;
        let config = toml_edit::de::from_str::<Config>(&config_content)?;
        info!("Configuration loaded from: {:?}", config_path);
        Ok(config)
    } else {
        info!("Config file not found at {:?}, using defaults", config_path);
        Ok(Config::default())
    }
}

async fn run_import(
    config: &Config,
    target: ImportTarget,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = &config.content;
    let count = match target {
        ImportTarget::Gallery => {
            GalleryStore::new(content.gallery_document(), content.objects_directory.clone())
                .import_from_scan()
                .await?
                .len()
        }
        ImportTarget::Catalog => {
            CatalogStore::new(content.catalog_document(), content.catalog_directory.clone())
                .import_from_scan()
                .await?
                .len()
        }
    };
    println!("Imported {} entries into {:?}", count, target);
    Ok(())
}

async fn run_compress(
    source: &Path,
    target: &Path,
    options: CompressOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "Compressing {:?} into {:?} (max side {}px, quality {})",
        source, target, options.max_side, options.quality
    );
    let started = Instant::now();
    let summary = compress_tree(source, target, options).await?;

    println!(
        "Converted {} images ({} failed) in {:.1}s",
        summary.converted,
        summary.failed,
        started.elapsed().as_secs_f64()
    );
    println!(
        "{:.2} MB -> {:.2} MB ({:.1}% saved)",
        summary.bytes_in as f64 / 1024.0 / 1024.0,
        summary.bytes_out as f64 / 1024.0 / 1024.0,
        summary.saved_percent()
    );
    if summary.converted > 0 {
        println!("Run `import gallery` or `import catalog` to pick up the new files");
    }
    Ok(())
}

async fn print_leads(config: &Config, limit: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    let leads = LeadStore::new(config.content.leads_document()).load().await;
    if leads.is_empty() {
        println!("No leads captured");
        return Ok(());
    }

    for lead in leads.iter().take(limit.unwrap_or(usize::MAX)) {
        let origin = if lead.from_crm { "CRM" } else { "site" };
        println!(
            "{}  {}  {} <{}> [{} / {}]",
            lead.created_at, lead.id, lead.name, lead.phone, lead.source, origin
        );
        if !lead.message.is_empty() {
            println!("    {}", lead.message);
        }
    }
    Ok(())
}

async fn run_server(
    config: Config,
    port: Option<u16>,
    host: Option<String>,
    quit_after: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let host = host.unwrap_or(config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    info!("Starting {} server", config.app.name);
    info!("Data directory: {:?}", config.content.data_directory);
    info!("Objects directory: {:?}", config.content.objects_directory);
    info!("Catalog directory: {:?}", config.content.catalog_directory);
    if config.app.admin_password.as_deref().unwrap_or_default().is_empty() {
        tracing::warn!("No admin password configured, admin routes are open");
    }

    match startup_checks::perform_startup_checks(&config).await {
        Ok(()) => info!("All startup checks passed"),
        Err(errors) => {
            for error in &errors {
                tracing::error!("Startup check failed: {}", error);
            }
            if errors.iter().any(|e| e.is_critical()) {
                tracing::error!("Critical startup check failed, exiting");
                return Err("Critical startup check failed".into());
            } else {
                tracing::warn!("Non-critical startup checks failed, continuing");
            }
        }
    }

    let app = create_app(config).await;

    let addr = SocketAddr::from((host.parse::<std::net::IpAddr>()?, port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server = axum::serve(listener, app);
    let graceful = server.with_graceful_shutdown(shutdown_signal(quit_after));

    if let Err(e) = graceful.await {
        tracing::error!("Server error: {}", e);
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(quit_after: Option<u64>) {
    use tokio::signal;
    use tokio::time::{Duration, sleep};

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let quit_timer = async {
        if let Some(seconds) = quit_after {
            info!(
                "Server will automatically shut down after {} seconds",
                seconds
            );
            sleep(Duration::from_secs(seconds)).await;
            info!("Quit timer expired, shutting down");
        } else {
            std::future::pending::<()>().await
        }
    };

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        },
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        },
        _ = quit_timer => {},
    }
}
