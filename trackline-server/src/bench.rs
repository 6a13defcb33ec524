//! Load generators used by the server binary to exercise a provisioned train.

use crate::booking::{BookingService, ServiceError, ServiceResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use trackline_core::{Interval, TrainKey, UserId};
use trackline_inventory::{BookingError, OrderOutcome};
use tracing::{debug, error};

#[derive(Debug, Clone)]
pub struct SearchReport {
    pub iterations: u64,
    pub elapsed: Duration,
    pub last_count: usize,
}

impl SearchReport {
    pub fn nanos_per_search(&self) -> u128 {
        self.elapsed.as_nanos() / u128::from(self.iterations.max(1))
    }
}

/// Repeats one search, as the availability page of a popular train would.
pub fn run_search_benchmark(
    service: &BookingService,
    key: TrainKey,
    interval: Interval,
    iterations: u64,
) -> ServiceResult<SearchReport> {
    let started = Instant::now();
    let mut last_count = 0;
    for _ in 0..iterations {
        last_count = service.search(key, interval)?;
    }

    Ok(SearchReport {
        iterations,
        elapsed: started.elapsed(),
        last_count,
    })
}

#[derive(Debug, Clone, Default)]
pub struct OrderReport {
    pub committed: usize,
    pub sold_out: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl OrderReport {
    pub fn total(&self) -> usize {
        self.committed + self.sold_out + self.failed
    }

    fn merge(&mut self, other: OrderReport) {
        self.committed += other.committed;
        self.sold_out += other.sold_out;
        self.failed += other.failed;
    }
}

/// Fires random journeys at one train from `workers` concurrent tasks.
pub async fn run_order_burst(
    service: Arc<BookingService>,
    key: TrainKey,
    workers: usize,
    orders_per_worker: usize,
) -> ServiceResult<OrderReport> {
    let ledger = service
        .registry()
        .resolve(key)
        .ok_or(ServiceError::Booking(BookingError::TrainUnknown(key)))?;
    let stops = ledger.route().stop_count;
    let started = Instant::now();

    let mut tasks = JoinSet::new();
    for worker in 0..workers {
        let service = service.clone();
        tasks.spawn(async move {
            let mut rng = StdRng::seed_from_u64(worker as u64);
            let mut report = OrderReport::default();
            for n in 0..orders_per_worker {
                let start = rng.gen_range(0..stops - 1);
                let end = rng.gen_range(start + 1..stops);
                let user = (worker * orders_per_worker + n) as UserId;

                match service.order(user, key, Interval::new(start, end)).await {
                    Ok(OrderOutcome::Committed(_)) => report.committed += 1,
                    Ok(OrderOutcome::SoldOut) => report.sold_out += 1,
                    Err(e) => {
                        debug!("Order for user {} failed: {}", user, e);
                        report.failed += 1;
                    }
                }
            }
            report
        });
    }

    let mut total = OrderReport::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(report) => total.merge(report),
            Err(e) => error!("Order worker did not finish: {}", e),
        }
    }
    total.elapsed = started.elapsed();
    Ok(total)
}
