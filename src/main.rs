use std::sync::Arc;
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eventpass::{
    api,
    config::Settings,
    jobs,
    notifications::{EmailChannel, LogChannel, Notifier, WhatsAppChannel},
    payments::{PaymentGateway, RazorpayClient},
    repository::{PlanRepository, SqlitePlanRepository},
    service::ServiceContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eventpass=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!("Starting EventPass server on {}:{}", settings.server.host, settings.server.port);

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let seeded = SqlitePlanRepository::new(db_pool.clone()).seed_defaults().await?;
    if !seeded.is_empty() {
        tracing::info!("Seeded {} default membership plans", seeded.len());
    }

    // Notification channels; without a provider everything goes to the log
    let notifier = Arc::new(Notifier::from_config(&settings.notifications));

    let mut has_provider = false;
    if let Some(email) = EmailChannel::new(&settings.notifications)? {
        notifier.register(Arc::new(email)).await;
        has_provider = true;
    }
    if let Some(whatsapp) = WhatsAppChannel::new(settings.notifications.whatsapp.clone()) {
        notifier.register(Arc::new(whatsapp)).await;
        has_provider = true;
    }
    if !has_provider {
        tracing::warn!("No notification provider configured, notifications will only be logged");
        notifier.register(Arc::new(LogChannel)).await;
    }

    for (name, result) in notifier.health_check_all().await {
        match result {
            Ok(_) => tracing::info!("Notification channel {} is healthy", name),
            Err(e) => tracing::warn!("Notification channel {} health check failed: {:?}", name, e),
        }
    }

    let gateway: Option<Arc<dyn PaymentGateway>> = match RazorpayClient::from_config(&settings.razorpay) {
        Some(client) => {
            tracing::info!("Razorpay payment processing enabled");
            Some(Arc::new(client))
        }
        None => {
            tracing::info!("Razorpay payment processing disabled");
            None
        }
    };

    let service_context = Arc::new(ServiceContext::new(
        db_pool.clone(),
        gateway,
        notifier.clone(),
        &settings,
    ));

    let sweeps = if settings.sweeps.enabled {
        jobs::spawn_sweeps(service_context.clone(), &settings.sweeps)
    } else {
        tracing::info!("Background sweeps disabled");
        Vec::new()
    };

    let app = api::create_app(service_context, Arc::new(settings.clone()));

    let listener = tokio::net::TcpListener::bind(
        format!("{}:{}", settings.server.host, settings.server.port)
    ).await?;

    tracing::info!("Server listening on http://{}:{}", settings.server.host, settings.server.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for handle in sweeps {
        handle.abort();
    }
    tracing::info!("Draining notification queues");
    notifier.close().await;
    db_pool.close().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
