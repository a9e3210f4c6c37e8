use anyhow::Context;
use splitty::{
    api, config::Config, db::init_db, BroadcastNotifier, LedgerService, LedgerSettings,
    Repository,
};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("loading configuration")?;

    let pool = init_db(&config.database_path)
        .await
        .with_context(|| format!("opening database {}", config.database_path))?;

    let storage = Arc::new(Repository::new(pool));
    let notifier = Arc::new(BroadcastNotifier::default());
    let service = Arc::new(LedgerService::new(
        storage,
        notifier,
        LedgerSettings::from(&config),
    ));

    let app = api::create_router(api::AppState::new(service, config.clone()));

    let addr = SocketAddr::new(config.bind_addr, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    tracing::info!(%addr, currency = %config.default_currency, "server listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
