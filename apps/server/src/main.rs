#![warn(clippy::all, clippy::pedantic)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use clap::Parser;
use logger::LevelFilter;
use tracing::info;
use uptime_service::config::Config;
use uptime_service::database::{Database, DatabaseImpl, initialize_database};
use uptime_service::monitoring::{HttpChecker, MonitoringScheduler, ResultSink};

mod error;
mod routes;
mod state;
#[cfg(test)]
mod testing;

use error::AppError;
use state::AppState;

#[derive(Debug, Parser)]
#[command(version, about = "Polls HTTP endpoints and streams their status")]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, env = "UPTIME_CONFIG")]
    config: Option<PathBuf>,

    #[arg(short, long, env = "UPTIME_LOG_LEVEL", default_value = "info", value_parser = logger::parse_level)]
    log_level: LevelFilter,

    /// Overrides `server.bind`
    #[arg(long)]
    bind: Option<String>,

    /// Overrides `server.port`
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let log_control = Arc::new(logger::init_with_level(cli.log_level));

    let mut config = Config::from_config(cli.config.as_ref())?;
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    info!("Using configuration:\n{config}");

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;

    let database: Arc<dyn Database> = open_database(Path::new(&config.database.path)).await?;
    let checker = Arc::new(HttpChecker::new(config.monitoring.probe_timeout())?);
    let sink = Arc::new(ResultSink::spawn(
        database.clone(),
        config.monitoring.persist_queue_capacity,
        config.server.event_capacity,
    ));
    let scheduler = Arc::new(MonitoringScheduler::new(config.monitoring.clone(), checker, database.clone(), sink));

    scheduler.load_targets().await?;
    if config.monitoring.autostart {
        scheduler.start_all().await;
    }

    let state = web::Data::new(AppState {
        scheduler: scheduler.clone(),
        database,
        log_control,
        default_interval: config.monitoring.default_interval_seconds,
    });

    let served = run_server(addr, state).await;

    info!("Server stopped, shutting down monitoring");
    scheduler.shutdown().await;
    served
}

async fn open_database(path: &Path) -> anyhow::Result<Arc<dyn Database>> {
    let pool = uptime_service::pool::open(path).await?;

    let conn = pool.get().await?;
    initialize_database(&conn).await?;
    drop(conn);

    info!("Database ready at {}", path.display());
    Ok(Arc::new(DatabaseImpl::new_from_pool(pool)))
}

async fn run_server(addr: SocketAddr, state: web::Data<AppState>) -> Result<(), AppError> {
    info!("Listening on http://{addr}");

    HttpServer::new(move || App::new().app_data(state.clone()).configure(routes::routes))
        .bind(addr)?
        .run()
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from(["uptime-server", "-l", "warning", "--port", "8080", "--bind", "127.0.0.1"]).unwrap();

        assert_eq!(cli.log_level, LevelFilter::WARN);
        assert_eq!(cli.port, Some(8080));
        assert_eq!(cli.bind.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn test_cli_rejects_unknown_level() {
        assert!(Cli::try_parse_from(["uptime-server", "--log-level", "loud"]).is_err());
    }
}
