mod adapters;
mod application;
mod config;
mod domain;
mod error;
mod interface;
mod ports;

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use adapters::{CityDataRepository, CityStore, OpenMeteoClient, PlottersRenderer};
use application::{markdown_report, AddCity, CityService, DashboardService, RefreshScheduler};
use config::Config;
use domain::SettingsUpdate;
use error::ClimaError;
use interface::cli::{format_candidates, format_registry, format_settings, Cli, Command};
use interface::http::create_router;
use ports::WeatherProvider;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Wired services shared by every subcommand
struct App {
    config: Config,
    store: Arc<CityStore>,
    repository: Arc<CityDataRepository>,
    provider: Arc<dyn WeatherProvider>,
    city_service: Arc<CityService>,
    dashboard_service: Arc<DashboardService>,
}

impl App {
    fn new(config: Config) -> Result<Self, BoxError> {
        let store = Arc::new(CityStore::new(config.registry_path()));
        let repository = Arc::new(CityDataRepository::new(&config.data_dir));
        let provider: Arc<dyn WeatherProvider> = Arc::new(OpenMeteoClient::new(&config)?);

        let city_service = Arc::new(CityService::new(
            Arc::clone(&provider),
            Arc::clone(&store),
            Arc::clone(&repository),
            config.geocoding_count,
        ));
        let dashboard_service = Arc::new(DashboardService::new(
            Arc::clone(&store),
            Arc::clone(&repository),
            config.ui_refresh_seconds,
        ));

        Ok(Self {
            config,
            store,
            repository,
            provider,
            city_service,
            dashboard_service,
        })
    }

    fn scheduler(&self, interval_override: Option<u64>) -> RefreshScheduler {
        RefreshScheduler::new(
            Arc::clone(&self.store),
            Arc::clone(&self.repository),
            Arc::clone(&self.provider),
            Arc::new(PlottersRenderer::default()),
            self.config.forecast_days,
        )
        .with_interval_override(interval_override)
    }
}

/// Cancel `token` on Ctrl-C
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Stop requested, finishing current city...");
                token.cancel();
            }
            Err(e) => warn!("⚠ Could not listen for Ctrl-C: {}", e),
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load()?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("climawatch={},tower_http=info", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let app = App::new(config)?;

    match cli.command.unwrap_or_default() {
        Command::List => {
            let registry = app.city_service.list()?;
            println!(
                "{}",
                format_registry(&registry, |city| app.repository.read_status(&city.id))
            );
        }
        Command::Search { query, country } => {
            let candidates = app.city_service.search(&query, country.as_deref()).await?;
            println!("{}", format_candidates(&candidates));
        }
        Command::Add {
            query,
            country,
            pick,
            timezone,
        } => {
            let request = AddCity::new(query)
                .with_country(country)
                .with_pick(pick)
                .with_timezone(timezone);
            let candidates = app.city_service.candidates_for(&request).await?;
            println!("{}", format_candidates(&candidates));

            let city = app.city_service.add_from(&request, &candidates)?;
            println!("Added [{}] {} ({})", pick, city.label, city.id);
        }
        Command::Remove { id_or_index } => {
            let city = app.city_service.remove(&id_or_index)?;
            println!("Removed {} ({})", city.label, city.id);
        }
        Command::Settings(args) => {
            let update: SettingsUpdate = args.into();
            let settings = if update.is_empty() {
                app.city_service.list()?.settings
            } else {
                app.city_service.update_settings(&update)?
            };
            println!("{}", format_settings(&settings));
        }
        Command::Report { id } => {
            let city = app
                .dashboard_service
                .find_city(&id)?
                .ok_or_else(|| ClimaError::NotFound(format!("city '{}' is not tracked", id)))?;
            let latest = app.dashboard_service.latest(&city)?;
            print!("{}", markdown_report(&city, latest.as_ref()));
        }
        Command::Run { once, interval } => {
            info!("🚀 Starting ClimaWatch v{}", env!("CARGO_PKG_VERSION"));
            info!("Registry: {}", app.store.path().display());

            let scheduler = app.scheduler(interval);
            if once {
                let report = scheduler.run_once().await;
                println!("Refreshed {}, failed {}", report.refreshed, report.failed);
            } else {
                let token = CancellationToken::new();
                cancel_on_ctrl_c(token.clone());
                scheduler.run(token).await;
            }
        }
        Command::Serve { port } => {
            info!("🚀 Starting ClimaWatch v{}", env!("CARGO_PKG_VERSION"));
            info!("Configuration: {:?}", app.config);

            let token = CancellationToken::new();
            cancel_on_ctrl_c(token.clone());

            let scheduler = app.scheduler(None);
            let scheduler_token = token.clone();
            let scheduler_task = tokio::spawn(async move { scheduler.run(scheduler_token).await });
            info!("✓ Refresh scheduler running");

            // Create HTTP server
            let router = create_router(
                Arc::clone(&app.city_service),
                Arc::clone(&app.dashboard_service),
            );
            let port = port.unwrap_or(app.config.port);
            let addr = format!("{}:{}", app.config.bind_address, port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            info!("✓ ClimaWatch listening on {}", addr);
            info!("  → Dashboard: http://{}", addr);
            info!("  → API: http://{}/api/dashboard", addr);

            let shutdown = token.clone();
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await?;

            token.cancel();
            if let Err(e) = scheduler_task.await {
                warn!("⚠ Scheduler task ended abnormally: {}", e);
            }
            info!("Bye");
        }
    }

    Ok(())
}
