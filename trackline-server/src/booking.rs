use std::sync::Arc;
use trackline_core::{
    DayOffset, Interval, ReservationStore, RouteConfigProvider, StoreError, TrainKey,
    TrainNumber, UserId,
};
use trackline_inventory::{BookingError, OrderOutcome, SeatLedger, TrainRegistry};
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("Route lookup failed: {0}")]
    Route(#[source] StoreError),

    #[error("Reservation {id} was not persisted: {source}")]
    PersistFailed { id: u64, source: StoreError },
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Host-side booking flow: inventory in memory, reservations in the durable store.
pub struct BookingService {
    registry: Arc<TrainRegistry>,
    store: Arc<dyn ReservationStore>,
    routes: Arc<dyn RouteConfigProvider>,
}

impl BookingService {
    pub fn new(
        registry: Arc<TrainRegistry>,
        store: Arc<dyn ReservationStore>,
        routes: Arc<dyn RouteConfigProvider>,
    ) -> Self {
        Self {
            registry,
            store,
            routes,
        }
    }

    pub fn registry(&self) -> &Arc<TrainRegistry> {
        &self.registry
    }

    /// Provisions one (train, date) with the route the provider reports for the train.
    pub async fn open_sales(&self, key: TrainKey) -> ServiceResult<Arc<SeatLedger>> {
        let route = self
            .routes
            .route_config(key.train)
            .await
            .map_err(ServiceError::Route)?;
        Ok(self.registry.provision(key, route)?)
    }

    /// Opens `days` consecutive travel dates from `first_date` for every train.
    ///
    /// Dates already on sale are skipped. Returns how many ledgers were created.
    pub async fn open_sales_window<I>(
        &self,
        trains: I,
        first_date: DayOffset,
        days: u32,
    ) -> ServiceResult<usize>
    where
        I: IntoIterator<Item = TrainNumber>,
    {
        let mut opened = 0;
        for train in trains {
            for date in first_date..first_date.saturating_add(days) {
                let key = TrainKey::new(train, date);
                if self.registry.contains(key) {
                    continue;
                }
                match self.open_sales(key).await {
                    Ok(_) => opened += 1,
                    Err(ServiceError::Booking(BookingError::AlreadyProvisioned(_))) => {}
                    Err(e) => return Err(e),
                }
            }
        }
        info!("Opened {} sales dates from day {}", opened, first_date);
        Ok(opened)
    }

    pub fn close_sales(&self, key: TrainKey) -> bool {
        self.registry.remove(key).is_some()
    }

    pub fn search(&self, key: TrainKey, interval: Interval) -> ServiceResult<usize> {
        Ok(self.registry.search(key, interval)?)
    }

    /// Books a seat and writes it to the durable store.
    ///
    /// Persistence only runs after the in-memory commit. If it fails the seat is handed back
    /// and the caller gets [`ServiceError::PersistFailed`]; nothing is retried here.
    pub async fn order(
        &self,
        user_id: UserId,
        key: TrainKey,
        interval: Interval,
    ) -> ServiceResult<OrderOutcome> {
        let outcome = self.registry.order(user_id, key, interval)?;
        if let OrderOutcome::Committed(reservation) = &outcome {
            if let Err(source) = self.store.persist(reservation).await {
                warn!(
                    "Persisting reservation {} failed, releasing seat {} of train {}: {}",
                    reservation.id, reservation.seat, key, source
                );
                match self.registry.resolve(key) {
                    Some(ledger) => {
                        if let Err(e) = ledger.release(reservation) {
                            error!("Could not release reservation {}: {}", reservation.id, e);
                        }
                    }
                    None => warn!(
                        "Train {} closed before reservation {} was released",
                        key, reservation.id
                    ),
                }
                return Err(ServiceError::PersistFailed {
                    id: reservation.id,
                    source,
                });
            }
        }

        Ok(outcome)
    }
}
