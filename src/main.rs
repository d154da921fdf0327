use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use crm_backend::auth::credentials::StaticCredentialStore;
use crm_backend::auth::jwt::JwtService;
use crm_backend::config::AppConfig;
use crm_backend::routes;
use crm_backend::state::AppState;
use crm_backend::store::MongoStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        mongodb_uri = %config.redacted_mongodb_uri(),
        mongodb_db = %config.mongodb_db,
        server_host = %config.server_host,
        server_port = config.server_port,
        jwt_issuer = %config.jwt_issuer,
        jwt_expiry_hours = config.jwt_expiry_hours,
        "loaded configuration"
    );

    let store = Arc::new(MongoStore::connect(&config.mongodb_uri, &config.mongodb_db).await?);
    let credentials = Arc::new(StaticCredentialStore::seeded(&config)?);
    let jwt = JwtService::from_config(&config)?;

    let listen_addr: SocketAddr =
        format!("{}:{}", config.server_host, config.server_port).parse()?;

    let state = AppState::new(store, config, credentials, jwt);
    let router = routes::create_router(state);

    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!("listening on {}", listen_addr);

    axum::serve(listener, router).await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
