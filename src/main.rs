use drainserve::config::{AppState, Config};
use drainserve::error::ServerError;
use drainserve::gate::RequestGate;
use drainserve::routes::create_router;
use drainserve::shutdown::{listen_for_signals, serve_until_shutdown, ShutdownCoordinator};
use drainserve::Termination;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drainserve=info".into()),
        )
        .init();

    let code = match run().await {
        Ok(termination) => termination.exit_code(),
        Err(e) => {
            tracing::error!("{}", e);
            1
        }
    };

    // Exiting here abandons whatever work is still running.
    std::process::exit(code);
}

async fn run() -> Result<Termination, ServerError> {
    // Load configuration from CLI args, environment variables, and config file
    let config = Config::load()?;

    tracing::info!("Starting drainserve");
    tracing::info!("  Drain timeout (SIGTERM): {}s", config.drain_timeout_secs);
    tracing::info!("  Long task duration: {}s", config.long_task_secs);

    let gate = RequestGate::new();
    let coordinator = ShutdownCoordinator::new(gate.clone(), config.drain_timeout());
    let signals = listen_for_signals().map_err(ServerError::Signal)?;

    let bind_addr = config.bind_addr();
    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: bind_addr.clone(),
            source,
        })?;
    let local_addr = listener
        .local_addr()
        .map_err(|source| ServerError::Bind {
            addr: bind_addr,
            source,
        })?;

    let app = create_router(AppState::new(&config, gate));

    tracing::info!("Server running at http://{}", local_addr);

    Ok(serve_until_shutdown(listener, app, &coordinator, signals).await)
}
