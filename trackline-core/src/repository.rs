use async_trait::async_trait;
use crate::types::{Reservation, RouteConfig, TrainNumber};
use crate::StoreResult;

/// Durable log of committed reservations.
///
/// A reservation only counts as durably booked once `persist` returned `Ok`.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn persist(&self, reservation: &Reservation) -> StoreResult<()>;
}

/// Source of route shapes (seat and stop counts) per train number.
#[async_trait]
pub trait RouteConfigProvider: Send + Sync {
    async fn route_config(&self, train: TrainNumber) -> StoreResult<RouteConfig>;
}
