use anyhow::Context;
use std::sync::Arc;
use transit_api::{app, state::{AppState, AuthConfig}};
use transit_catalog::{KeysetSearch, OfferingService};
use transit_core::{Clock, SystemClock};
use transit_order::BookingCoordinator;
use transit_store::{
    Config, DbClient, PgAccountBalances, PgBookingLedger, PgRouteDirectory, PgTicketCatalog, RedisClient,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "transit_api=debug,transit_order=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Transit API on port {}", config.server.port);

    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let redis = match config.redis.url.as_deref() {
        Some(url) => match RedisClient::new(url) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "Invalid Redis url, rate limiting disabled");
                None
            }
        },
        None => None,
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let catalog = Arc::new(PgTicketCatalog::new(db.pool.clone()));
    let routes = Arc::new(PgRouteDirectory::new(db.pool.clone()));

    let state = AppState {
        bookings: Arc::new(BookingCoordinator::new(
            catalog.clone(),
            Arc::new(PgBookingLedger::new(db.pool.clone())),
            Arc::new(PgAccountBalances::new(db.pool.clone())),
            clock.clone(),
            config.business_rules,
        )),
        search: Arc::new(KeysetSearch::new(catalog.clone(), routes.clone(), clock.clone(), config.search)),
        offerings: Arc::new(OfferingService::new(catalog, routes, clock)),
        redis,
        rate_limit: config.rate_limit,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app(state)).await?;
    Ok(())
}
