use mimalloc::MiMalloc;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seat_front::{app, config::Config, AppState};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let registry = tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(&config.app.rust_log));
    if config.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    info!("Starting {} v{} ({})", config.app.name, config.app.version, config.app.environment);
    info!("Booking API at {}", config.api.base_url);

    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port).parse()?;
    let app_state = AppState::new(config)?;
    let router = app(app_state);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router.into_make_service()).await?;
    Ok(())
}
