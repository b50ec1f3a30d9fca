use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use sqlx::sqlite::SqlitePoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use etimad_scout::browser::BrowserManager;
use etimad_scout::resolver::CompetitionResolver;
use etimad_scout::scrape::EtimadScraper;
use etimad_scout::store::{self, SqliteCompetitionStore, SqlitePreviewStore};
use etimad_scout::web::{self, AppState};
use etimad_scout::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "etimad-scout", about = "Tender acquisition service for the Etimad portal")]
struct Args {
    /// Configuration profile (reads config/<run_mode>.toml)
    #[arg(long)]
    run_mode: Option<String>,

    /// Override the configured listen port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = AppConfig::load(args.run_mode.clone())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    // Keep the appender guard alive for the process lifetime
    let _log_guard = init_tracing(&config)?;

    info!("Starting Etimad Scout...");

    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.acquire_timeout))
        .connect(&config.database.url)
        .await?;
    store::init_schema(&pool).await?;

    let competitions = Arc::new(SqliteCompetitionStore::new(pool.clone()));
    let previews = Arc::new(SqlitePreviewStore::new(pool));

    // The browser launches lazily on the first live scrape and is shared by
    // every request after that.
    let browser = Arc::new(BrowserManager::new(config.scraper.clone()));
    let scraper = Arc::new(EtimadScraper::new(browser, config.scraper.clone()));
    let resolver = Arc::new(CompetitionResolver::new(
        competitions.clone(),
        previews.clone(),
        scraper,
    ));

    if config.metrics.enabled {
        let addr: SocketAddr = ([0, 0, 0, 0], config.metrics.port).into();
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        info!(%addr, "Metrics exporter listening");
    }

    let state = AppState {
        resolver,
        competitions,
        previews,
        config: config.clone(),
    };

    web::serve(config, state).await
}

fn init_tracing(config: &AppConfig) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("etimad_scout=debug".parse()?);

    match &config.logging.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "etimad-scout.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(env_filter).init();
            Ok(None)
        }
    }
}
