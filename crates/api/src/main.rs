//! API server entry point.

use std::sync::Arc;
use std::time::Duration;

use api::AppState;
use api::auth::Authenticator;
use api::config::Config;
use checkout::{
    CheckoutService, CheckoutSettings, DEFAULT_QUEUE_CAPACITY, LogNotifier, NotificationQueue,
    PaystackClient, RetryPolicy,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use store::{InMemoryStore, PostgresStore, Store};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Builds the services over `store` and serves until shutdown.
async fn serve<S>(store: S, config: Config, metrics_handle: PrometheusHandle)
where
    S: Store + Clone + 'static,
{
    let gateway = PaystackClient::new(
        &config.paystack_base_url,
        config.paystack_secret_key.clone(),
        config.gateway_timeout,
    )
    .expect("invalid Paystack configuration");

    let (notifications, worker) = NotificationQueue::spawn(
        LogNotifier,
        RetryPolicy::new(config.notify_max_attempts, config.notify_backoff),
        DEFAULT_QUEUE_CAPACITY,
    );

    let checkout = CheckoutService::new(
        store,
        gateway,
        notifications.clone(),
        CheckoutSettings {
            callback_url: config.callback_url.clone(),
            webhook_secret: config.webhook_secret.clone().into_bytes(),
            verify_timeout: config.verify_timeout,
        },
    );
    let auth = Authenticator::new(config.jwt_secret.as_deref());
    let state = Arc::new(AppState::new(checkout, auth));

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // Deliver whatever was queued before the last requests finished.
    notifications.flush().await;
    drop(notifications);
    if tokio::time::timeout(Duration::from_secs(5), worker).await.is_err() {
        tracing::warn!("notification worker did not stop in time");
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    if config.paystack_secret_key.is_empty() {
        tracing::warn!("PAYSTACK_SECRET_KEY is not set, gateway calls will be rejected");
    }
    if config.webhook_secret.is_empty() {
        tracing::warn!("no webhook secret configured, every webhook will be rejected");
    }

    // 3. Pick the store and serve
    match config.database_url.clone() {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(&url)
                .await
                .expect("failed to connect to Postgres");
            let store = PostgresStore::new(pool);
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using Postgres store");
            serve(store, config, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL is not set, using in-memory store");
            serve(InMemoryStore::new(), config, metrics_handle).await;
        }
    }

    tracing::info!("server shut down gracefully");
}
