use async_trait::async_trait;
use parking_lot::Mutex;
use trackline_core::{Reservation, ReservationStore, StoreResult, TrainKey};
use tracing::debug;

/// Process-local reservation log, for tests and single-node runs without Redis.
#[derive(Debug, Default)]
pub struct InMemoryReservationStore {
    reservations: Mutex<Vec<Reservation>>,
}

impl InMemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.reservations.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn all(&self) -> Vec<Reservation> {
        self.reservations.lock().clone()
    }

    pub fn for_train(&self, key: TrainKey) -> Vec<Reservation> {
        self.reservations
            .lock()
            .iter()
            .filter(|r| r.key() == key)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn persist(&self, reservation: &Reservation) -> StoreResult<()> {
        self.reservations.lock().push(reservation.clone());
        debug!("Stored reservation {} in memory", reservation.id);
        Ok(())
    }
}
