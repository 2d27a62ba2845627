use std::sync::Arc;
use std::time::Duration;

use axum::middleware as axum_middleware;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use shelfscan_api::{
    config::Config,
    db::{create_pool, BookStore, PgStore},
    middleware::request_id::request_id_middleware,
    routes::{create_router, AppState},
    services::{
        providers::{google_vision::GoogleVisionProvider, openai::OpenAiProvider, VisionProvider},
        recommendations::{RecommendationModel, Recommender},
        scanner::Scanner,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let attempt_timeout = Duration::from_secs(config.provider_timeout_secs);

    let pool = create_pool(&config.database_url).await?;
    sqlx::migrate!().run(&pool).await?;

    // Providers exist only when their credentials do; the scanner and
    // recommender degrade gracefully around missing slots.
    let openai = config.openai_api_key.clone().map(|key| {
        Arc::new(OpenAiProvider::new(
            key,
            config.openai_api_url.clone(),
            config.openai_vision_model.clone(),
            config.openai_text_model.clone(),
            attempt_timeout,
        ))
    });

    let primary: Option<Arc<dyn VisionProvider>> =
        openai.clone().map(|p| p as Arc<dyn VisionProvider>);
    let model: Option<Arc<dyn RecommendationModel>> =
        openai.map(|p| p as Arc<dyn RecommendationModel>);

    let fallback: Option<Arc<dyn VisionProvider>> =
        config.google_vision_api_key.clone().map(|key| {
            Arc::new(GoogleVisionProvider::new(
                key,
                config.google_vision_api_url.clone(),
                attempt_timeout,
            )) as Arc<dyn VisionProvider>
        });

    tracing::info!(
        primary_configured = primary.is_some(),
        fallback_configured = fallback.is_some(),
        "Vision providers initialized"
    );

    let store: Arc<dyn BookStore> = Arc::new(PgStore::new(pool));
    let scanner = Arc::new(Scanner::new(primary, fallback, attempt_timeout));
    let recommender = Arc::new(Recommender::new(model, store.clone()));

    let state = AppState {
        store,
        scanner,
        recommender,
        max_scan_candidates: config.max_scan_candidates,
        max_upload_bytes: config.max_upload_bytes,
    };

    let app = create_router(state)
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
