use crate::idgen::IdError;
use trackline_core::{Interval, SeatIndex, TrainKey};

/// Outcomes of registry and ledger calls that are not a booking.
///
/// A sold-out interval is not listed here; it is a normal [`crate::OrderOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingError {
    #[error("Train {0} is not provisioned")]
    TrainUnknown(TrainKey),

    #[error("Train {0} is already provisioned")]
    AlreadyProvisioned(TrainKey),

    #[error("Invalid interval {interval} for a route with {stop_count} stops")]
    InvalidInterval { interval: Interval, stop_count: u16 },

    #[error("Invalid route for train {key}: {reason}")]
    InvalidRoute { key: TrainKey, reason: String },

    #[error("Seat {seat} of train {key} does not hold {interval}")]
    NotReserved {
        key: TrainKey,
        seat: SeatIndex,
        interval: Interval,
    },

    #[error(transparent)]
    Id(#[from] IdError),
}

impl BookingError {
    /// Whether the same call can succeed later without the caller changing anything.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BookingError::Id(IdError::SequenceExhausted { .. }))
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
