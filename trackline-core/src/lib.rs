pub mod types;
pub mod repository;

pub use types::{
    DayOffset, Interval, Reservation, RouteConfig, SeatIndex, StopIndex, TrainKey, TrainNumber,
    UserId,
};
pub use repository::{ReservationStore, RouteConfigProvider};

/// Failures reported by the collaborators behind the inventory core.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Serialization failed: {0}")]
    Serialization(String),
    #[error("No route configured for train {0}")]
    UnknownRoute(TrainNumber),
}

pub type StoreResult<T> = Result<T, StoreError>;
