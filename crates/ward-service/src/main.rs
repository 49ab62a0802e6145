//! Ward service entry point.
//!
//! Wires configuration, the Postgres record store, the event-fabric
//! relay actor, and the HTTP surface together, then serves until a
//! shutdown signal arrives.

use event_fabric::{RelayActor, RelayMetrics};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ward_service::config::Config;
use ward_service::observability::metrics::init_metrics_recorder;
use ward_service::repositories::PgRecordStore;
use ward_service::routes::{build_routes, AppState};
use ward_service::services::{
    AppointmentService, DisabledSmsChannel, Dispatcher, HmacPaymentVerifier, QueueService,
    SignalingService, SmsChannel,
};
use ward_service::services::sms::HttpSmsChannel;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ward_service=debug,event_fabric=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ward service");

    // Initialize metrics recorder before anything records
    let metrics_handle = match init_metrics_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Failed to initialize metrics recorder: {e}");
            None
        }
    };

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        ward_id = %config.ward_id,
        bind_address = %config.bind_address,
        sms_configured = config.sms_gateway_url.is_some(),
        "Configuration loaded successfully"
    );

    // Database pool
    info!("Connecting to database...");
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            e
        })?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database connection established");

    // Relay actor
    let cancel_token = CancellationToken::new();
    let relay_metrics = RelayMetrics::new();
    let (relay, relay_task) = RelayActor::spawn(cancel_token.clone(), relay_metrics);

    // Collaborators
    let store = Arc::new(PgRecordStore::new(pool));
    let sms: Arc<dyn SmsChannel> = match &config.sms_gateway_url {
        Some(url) => Arc::new(HttpSmsChannel::new(url.clone(), config.sms_api_key.clone())),
        None => {
            warn!("SMS_GATEWAY_URL not set, durable notification fallback is disabled");
            Arc::new(DisabledSmsChannel)
        }
    };
    let verifier = Arc::new(HmacPaymentVerifier::new(&config.payment_signing_key));

    // Services
    let dispatcher = Dispatcher::new(relay.clone(), sms);
    let appointments = AppointmentService::new(store.clone(), dispatcher.clone(), verifier);
    let queue = QueueService::new(store.clone(), dispatcher);
    let signaling = SignalingService::new(relay.clone());

    let bind_address = config.bind_address.clone();
    let state = Arc::new(AppState {
        config,
        store,
        relay,
        appointments,
        queue,
        signaling,
    });

    let app = build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Ward service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // Stop the relay actor and wait for it to drain
    cancel_token.cancel();
    if let Err(e) = relay_task.await {
        warn!("Relay actor task ended with error: {e}");
    }

    info!("Ward service shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
