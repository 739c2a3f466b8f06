use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nursery_dashboard::api::{self, middleware::SecurityConfig, AppState};
use nursery_dashboard::config::AppConfig;
use nursery_dashboard::dashboard::{Dashboard, SENSOR_PATH};
use nursery_dashboard::firebase::{AuthClient, DatabaseClient};
use nursery_dashboard::models::SensorReading;
use nursery_dashboard::password::StrengthReport;
use nursery_dashboard::store::{self, RealtimeStore};

const DEFAULT_PORT: u16 = 3000;
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(300);
/// Sessions unused for this many hours are forgotten.
const SESSION_IDLE_HOURS: i64 = 24;

#[derive(Parser)]
#[command(name = "nursery")]
#[command(about = "Live monitoring and control dashboard for a plant-nursery rig")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the dashboard server
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
    /// Print live sensor readings until interrupted
    Watch,
    /// Check whether a local server is up
    Status {
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Score a password with the sign-up strength meter
    Strength {
        password: String,
        /// Confirmation to compare against
        #[arg(long)]
        confirm: Option<String>,
    },
}

/// Initialize tracing to stdout, filtered by `RUST_LOG`.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "nursery_dashboard=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn database_client(config: &AppConfig) -> anyhow::Result<DatabaseClient> {
    let (_, database_url) = config.firebase()?;
    Ok(DatabaseClient::new(
        database_url,
        config.database_secret.clone(),
    ))
}

async fn serve(config: AppConfig, host: &str, port: u16) -> anyhow::Result<()> {
    let (api_key, _) = config.firebase()?;
    let identity = AuthClient::with_urls(api_key, &config.identity_url, &config.token_url);
    let store: Arc<dyn RealtimeStore> = Arc::new(database_client(&config)?);

    let dashboard = Dashboard::start(store)
        .await
        .context("Failed to subscribe to the realtime database")?;
    let state = AppState::new(dashboard.clone(), Arc::new(identity));
    let security = SecurityConfig::from_config(&config);

    let sessions = state.sessions.clone();
    let limiter = security.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HOUSEKEEPING_INTERVAL);
        loop {
            interval.tick().await;
            sessions.prune(chrono::Duration::hours(SESSION_IDLE_HOURS));
            if let Some(limiter) = &limiter {
                limiter.cleanup();
            }
        }
    });
    let app = api::create_router(state, security);

    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    tracing::info!("Nursery dashboard listening on http://{}:{}", host, port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;

    dashboard.shutdown();
    Ok(())
}

async fn watch(config: AppConfig) -> anyhow::Result<()> {
    let client = database_client(&config)?;
    let mut subscription = client.subscribe(SENSOR_PATH).await?;

    loop {
        tokio::select! {
            next = subscription.next() => {
                let Some(value) = next else { break };
                match store::decode::<SensorReading>(SENSOR_PATH, value) {
                    Ok(Some(r)) => println!(
                        "{}  temperature {}  humidity {}  moisture {}  rain {}",
                        chrono::Local::now().format("%H:%M:%S"),
                        r.temperature_display(),
                        r.humidity_display(),
                        r.moisture_display(),
                        r.rain_display(),
                    ),
                    Ok(None) => println!("(no sensor data)"),
                    Err(e) => tracing::error!("{}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

async fn status(port: u16) -> anyhow::Result<()> {
    let url = format!("http://127.0.0.1:{}/api/v1/health", port);
    match reqwest::get(&url).await {
        Ok(response) if response.status().is_success() => {
            println!("Nursery dashboard is running on port {}", port);
        }
        Ok(response) => println!("Server on port {} answered {}", port, response.status()),
        Err(_) => println!("Nursery dashboard is not running on port {}", port),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Some(Commands::Serve { port, host }) => serve(AppConfig::load()?, &host, port).await?,
        Some(Commands::Watch) => watch(AppConfig::load()?).await?,
        Some(Commands::Status { port }) => status(port).await?,
        Some(Commands::Strength { password, confirm }) => {
            let report = StrengthReport::evaluate(&password, confirm.as_deref());
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        None => serve(AppConfig::load()?, "127.0.0.1", DEFAULT_PORT).await?,
    }

    Ok(())
}
