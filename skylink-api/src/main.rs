use anyhow::Context;
use skylink_api::{app, AppState};
use skylink_core::repository::{Change, ReservationStore};
use skylink_core::StoreError;
use skylink_order::SideEffects;
use skylink_store::app_config::{Config, StorageBackend};
use skylink_store::{seed, AuditLog, DbClient, InMemoryStore, NotificationQueue, PgReservationStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skylink_api=debug,skylink_order=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting SkyLink reservations on port {}", config.server.port);

    let store: Arc<dyn ReservationStore> = match config.storage.backend {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory storage");
            Arc::new(InMemoryStore::new())
        }
        StorageBackend::Postgres => {
            let db = DbClient::new(config.database_url()?, config.storage.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Arc::new(PgReservationStore::new(db.pool.clone()))
        }
    };

    if config.seed.demo_data {
        let demo = seed::demo_data();
        for change in demo.iter() {
            if let Change::SaveUser(user) = change {
                tracing::info!(user_id = %user.id, username = %user.username, "Demo user");
            }
        }
        match store.commit(demo).await {
            Ok(()) => tracing::info!("Demo data loaded"),
            Err(StoreError::Duplicate(what)) => tracing::info!("Demo data already present ({})", what),
            Err(e) => return Err(e).context("Failed to seed demo data"),
        }
    }

    let audit = Arc::new(AuditLog::new());
    let outbox = Arc::new(NotificationQueue::new(config.notifications.queue_capacity));
    let state = AppState::new(store, &config, SideEffects::new(audit, outbox.clone()));

    let shutdown = CancellationToken::new();
    let dispatcher = tokio::spawn(dispatch_notifications(outbox, shutdown.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let signal = shutdown.clone();
    axum::serve(listener, app(state))
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    dispatcher.await?;
    Ok(())
}

/// Delivers queued notifications. Delivery is a log line; there is no mail relay.
async fn dispatch_notifications(outbox: Arc<NotificationQueue>, shutdown: CancellationToken) {
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tick.tick() => {}
        }
        for notification in outbox.drain().await {
            tracing::info!(
                target: "notifications",
                channel = ?notification.channel,
                recipient = %notification.recipient,
                subject = %notification.subject,
                "notification dispatched"
            );
        }
    }

    // Flush whatever is left.
    for notification in outbox.drain().await {
        tracing::info!(target: "notifications", subject = %notification.subject, "notification dispatched");
    }
}
