//! Postdesk - Blog post management service

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use postdesk::{
    api::{self, AppState},
    config::Config,
    db::{
        self,
        repositories::{
            SqlxCategoryRepository, SqlxPostRepository, SqlxTagRepository, SqlxUniqueLookup,
            SqlxUserRepository,
        },
    },
    services::{
        mailer_from_config, spawn_listener, FlashStore, HtmlSanitizer, ImageStore,
        LocalContentStore, MailRenderer, NotificationDispatcher, PostService, Validator,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "postdesk=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Postdesk...");

    // Load configuration
    let config_path = std::env::var("POSTDESK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.yml"));
    let config = Config::load_with_env(&config_path)?;
    tracing::info!("Configuration loaded from {}", config_path.display());

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Content store for featured images
    tokio::fs::create_dir_all(&config.storage.root).await?;
    let images = ImageStore::new(LocalContentStore::boxed(&config.storage.root), config.image);
    tracing::info!("Content store at {}", config.storage.root.display());

    // Post-created notifications
    let mailer = mailer_from_config(&config.mail)?;
    let (notifications, events) = NotificationDispatcher::channel();
    let _listener = spawn_listener(events, mailer, MailRenderer::new()?);

    let post_service = PostService::new(
        SqlxPostRepository::boxed(pool.clone()),
        SqlxTagRepository::boxed(pool.clone()),
        SqlxCategoryRepository::boxed(pool.clone()),
        Validator::new(SqlxUniqueLookup::boxed(pool.clone())),
        HtmlSanitizer::new(),
        images,
        notifications,
        FlashStore::new(Duration::from_secs(config.flash.ttl_seconds)),
    );

    // Build application state
    let state = AppState {
        post_service: Arc::new(post_service),
        user_repo: SqlxUserRepository::boxed(pool.clone()),
        server_config: Arc::new(config.server.clone()),
        upload_config: Arc::new(config.upload.clone()),
    };

    let app = api::build_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
