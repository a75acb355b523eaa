//! FHIR R4 resource server binary.

use std::sync::Arc;

use clap::Parser;
use fhir_persistence::engine::Store;
use fhir_rest::{create_app, init_logging, ServerConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    init_logging(&config.log_level);

    info!(
        backend = %config.backend,
        host = %config.host,
        port = config.port,
        "starting fhirserv"
    );

    match config.backend.as_str() {
        "h2" | "sqlite" => start_sqlite(config).await,
        "postgresql" | "postgres" => start_postgres(config).await,
        other => anyhow::bail!("unknown backend: {other} (expected h2/sqlite or postgresql)"),
    }
}

#[cfg(feature = "sqlite")]
async fn start_sqlite(config: ServerConfig) -> anyhow::Result<()> {
    use fhir_persistence::backends::sqlite::SqliteBackend;

    let backend = SqliteBackend::open(&config.database_path)?;
    let store = Arc::new(Store::new(Arc::new(backend), config.store_config()));
    run(store, config).await
}

#[cfg(not(feature = "sqlite"))]
async fn start_sqlite(_config: ServerConfig) -> anyhow::Result<()> {
    anyhow::bail!("the sqlite backend requires the 'sqlite' feature; build with --features sqlite")
}

#[cfg(feature = "postgres")]
async fn start_postgres(config: ServerConfig) -> anyhow::Result<()> {
    use fhir_persistence::backends::postgres::{PostgresBackend, PostgresBackendConfig};

    let backend_config = PostgresBackendConfig {
        host: config.db_host.clone(),
        port: config.db_port,
        dbname: config.db_name.clone(),
        user: config.db_user.clone(),
        password: config.db_password.clone(),
        ..Default::default()
    };
    let backend = PostgresBackend::connect(backend_config)?;
    let store = Arc::new(Store::new(Arc::new(backend), config.store_config()));
    run(store, config).await
}

#[cfg(not(feature = "postgres"))]
async fn start_postgres(_config: ServerConfig) -> anyhow::Result<()> {
    anyhow::bail!("the postgresql backend requires the 'postgres' feature; build with --features postgres")
}

#[cfg(any(feature = "sqlite", feature = "postgres"))]
async fn run(store: Arc<Store>, config: ServerConfig) -> anyhow::Result<()> {
    store.bootstrap().await?;

    if config.clear_data_on_startup {
        let resource_types = store.known_resource_types().await?;
        store.clear_all(&resource_types).await?;
        info!("cleared existing data on startup");
    }

    let app = create_app(store, &config);
    let addr = config.socket_addr();
    info!(address = %addr, "server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(not(any(feature = "sqlite", feature = "postgres")))]
compile_error!("at least one of the 'sqlite' or 'postgres' features must be enabled");
