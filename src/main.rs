use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use media_ingest::{
    config::Config,
    ingest::{IngestError, Ingestor, UploadRequest},
    store::{Database, MediaKind},
};

/// Ingest a local file through the full pipeline:
/// `media-ingest <file> <kind> [title]`
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "media-ingest starting");

    let mut args = std::env::args().skip(1);
    let (file, kind) = match (args.next(), args.next()) {
        (Some(file), Some(kind)) => (file, kind),
        _ => {
            eprintln!("usage: media-ingest <file> <image|video|audio|book> [title]");
            std::process::exit(2);
        }
    };
    let title = args.next().unwrap_or_else(|| file.clone());
    let media_kind: MediaKind = kind.parse().map_err(IngestError::from)?;

    // Load configuration
    let config = Config::load()?;
    info!(
        content_root = %config.storage.content_root,
        thumbnail_root = %config.storage.thumbnail_root,
        "Loaded configuration"
    );

    let db = Database::open(&config.data_dir)?;
    info!("Database opened at: {}", config.data_dir);

    let ingestor = Ingestor::new(&config, Arc::new(db));

    let upload = UploadRequest {
        title,
        media_kind,
        original_filename: file.clone(),
    };
    let content = tokio::fs::File::open(&file).await?;
    let owner_id = std::env::var("OWNER_ID").unwrap_or_else(|_| "local".to_string());

    let post_id = ingestor.ingest(upload, content, &owner_id).await?;
    println!("{post_id}");

    Ok(())
}
