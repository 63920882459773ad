use anyhow::Result;
use certmon_storage::CertStore;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use certmon_server::app;
use certmon_server::cert::scheduler::CertStatusScheduler;
use certmon_server::config::ServerConfig;
use certmon_server::state::AppState;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  certmon-server [config.toml]              Start the server (default: config/server.toml)");
    eprintln!("  certmon-server refresh [config.toml]      Run one status refresh and exit");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("certmon=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        Some("refresh") => {
            let config_path = args.get(2).map(|s| s.as_str()).unwrap_or("config/server.toml");
            run_refresh_once(config_path).await
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/server.toml");
            run_server(config_path).await
        }
    }
}

async fn open_store(config: &ServerConfig) -> Result<Arc<CertStore>> {
    let db_url = config.database.connection_url();
    let store = CertStore::new(&db_url, Path::new(&config.database.data_dir)).await?;
    Ok(Arc::new(store))
}

/// One-off refresh, for cron setups that run the scheduler externally.
async fn run_refresh_once(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let cert_store = open_store(&config).await?;
    let threshold = config.status.expiring_soon_days;
    let state = AppState::new(cert_store, config);

    let today = chrono::Utc::now().date_naive();
    let changed = state.refresh_job.refresh_all(today, threshold).await?;
    let stats = state.refresh_job.statistics().await?;
    tracing::info!(
        changed,
        normal = stats.normal_count,
        expiring_soon = stats.expiring_soon_count,
        expired = stats.expired_count,
        "refresh completed"
    );
    Ok(())
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;

    tracing::info!(
        http_port = config.http_port,
        data_dir = %config.database.data_dir,
        db = %config.database.connection_url(),
        expiring_soon_days = config.status.expiring_soon_days,
        "certmon-server starting"
    );

    let cert_store = open_store(&config).await?;
    let state = AppState::new(cert_store, config.clone());

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let app = app::build_http_app(state.clone());
    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
    let http_server = axum::serve(
        http_listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );

    let scheduler_handles = if config.scheduler.enabled {
        let scheduler = Arc::new(CertStatusScheduler::new(
            state.refresh_job.clone(),
            config.status.expiring_soon_days,
            config.scheduler.daily_refresh_time()?,
            config.scheduler.stats_interval_secs,
        ));
        let refresh = scheduler.clone();
        let stats = scheduler;
        vec![
            tokio::spawn(async move { refresh.run_daily_refresh().await }),
            tokio::spawn(async move { stats.run_stats_log().await }),
        ]
    } else {
        tracing::info!("Certificate status scheduler disabled");
        Vec::new()
    };

    tracing::info!(http = %http_addr, "Server started");

    if let Err(e) = http_server
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
            tracing::info!("Shutting down gracefully");
        })
        .await
    {
        tracing::error!(error = %e, "HTTP server error");
    }

    for handle in scheduler_handles {
        handle.abort();
    }
    tracing::info!("Server stopped");

    Ok(())
}
