use iterabits::ai::{DisabledGenerator, GeminiClient, TextGenerator};
use iterabits::backend::{AuthService, DataService, MemoryBackend, SupabaseClient};
use iterabits::config::{BackendConfig, Config};
use iterabits::insights::Insights;
use iterabits::session::SessionContext;
use iterabits::tracker::follow_auth_events;
use iterabits::{load_preferences, router, AppState};
use std::{net::SocketAddr, sync::Arc};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::from_env();

    let (data, auth): (Arc<dyn DataService>, Arc<dyn AuthService>) = match &config.backend {
        BackendConfig::Supabase { url, anon_key } => {
            info!("using hosted backend at {url}");
            let client = Arc::new(SupabaseClient::new(url, anon_key.clone())?);
            let data: Arc<dyn DataService> = client.clone();
            let auth: Arc<dyn AuthService> = client;
            (data, auth)
        }
        BackendConfig::Memory => {
            warn!("SUPABASE_URL/SUPABASE_ANON_KEY not set, using in-memory backend");
            let backend = Arc::new(MemoryBackend::default());
            let data: Arc<dyn DataService> = backend.clone();
            let auth: Arc<dyn AuthService> = backend;
            (data, auth)
        }
    };

    let generator: Arc<dyn TextGenerator> = match &config.ai.api_key {
        Some(key) => Arc::new(GeminiClient::new(
            &config.ai.base_url,
            config.ai.model.clone(),
            key.clone(),
            config.ai.timeout,
        )?),
        None => {
            info!("GEMINI_API_KEY not set, AI text will use fallbacks");
            Arc::new(DisabledGenerator)
        }
    };

    let prefs = load_preferences(&config.prefs_path).await;
    let state = AppState::new(
        config.prefs_path.clone(),
        prefs,
        SessionContext::new(auth),
        data,
        Insights::new(generator),
    );

    let events = state.session.subscribe();
    tokio::spawn(follow_auth_events(state.clone(), events));
    state.session.verify().await;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
