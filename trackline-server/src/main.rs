use anyhow::Context;
use std::sync::Arc;
use trackline_core::{Interval, ReservationStore, TrainKey};
use trackline_inventory::TrainRegistry;
use trackline_server::{bench, calendar, BookingService};
use trackline_store::{
    Config, ConfiguredRouteProvider, InMemoryReservationStore, RedisReservationStore,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "trackline_server=debug,trackline_inventory=info,trackline_store=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    info!("Starting trackline server {}", config.server.id);

    let store: Arc<dyn ReservationStore> = match &config.redis {
        Some(redis) => Arc::new(
            RedisReservationStore::new(&redis.url)
                .await
                .context("Failed to connect to Redis")?,
        ),
        None => {
            info!("No Redis configured, keeping reservations in memory");
            Arc::new(InMemoryReservationStore::new())
        }
    };
    let registry = Arc::new(TrainRegistry::new(
        config.server.id,
        config.inventory.clone(),
    ));
    let routes = Arc::new(ConfiguredRouteProvider::from(&config.routes));
    let service = Arc::new(BookingService::new(registry, store, routes));

    let today = calendar::today(config.calendar.epoch)?;
    let opened = service
        .open_sales_window(config.sales.trains(), today, config.sales.days_ahead)
        .await?;
    info!("{} trains on sale, {} new ledgers", service.registry().len(), opened);

    let probe = TrainKey::new(config.sales.middle_train(), today);
    let Some(ledger) = service.registry().resolve(probe) else {
        warn!("Train {} is not on sale, skipping load runs", probe);
        return Ok(());
    };
    let stops = ledger.route().stop_count;
    let journey = if stops > 17 {
        Interval::new(3, 17)
    } else {
        Interval::new(0, stops - 1)
    };

    let search = bench::run_search_benchmark(
        &service,
        probe,
        journey,
        config.bench.search_iterations,
    )?;
    info!(
        "{} searches of train {} {} took {:?} ({} ns each), last count {}",
        search.iterations,
        probe,
        journey,
        search.elapsed,
        search.nanos_per_search(),
        search.last_count
    );

    let orders = bench::run_order_burst(
        service.clone(),
        probe,
        config.bench.order_workers,
        config.bench.orders_per_worker,
    )
    .await?;
    info!(
        "{} orders on train {} in {:?}: {} committed, {} sold out, {} failed",
        orders.total(),
        probe,
        orders.elapsed,
        orders.committed,
        orders.sold_out,
        orders.failed
    );

    Ok(())
}
