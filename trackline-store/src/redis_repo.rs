use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::info;
use trackline_core::{Reservation, ReservationStore, StoreError, StoreResult, TrainKey};

/// Reservations kept in one Redis hash per (train, date), keyed by reservation id.
#[derive(Clone)]
pub struct RedisReservationStore {
    client: redis::Client,
}

impl RedisReservationStore {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    pub fn hash_key(key: TrainKey) -> String {
        format!("hashset_{}", key.packed())
    }

    pub async fn reservations(&self, key: TrainKey) -> StoreResult<Vec<Reservation>> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(backend)?;
        let payloads: Vec<String> = conn.hvals(Self::hash_key(key)).await.map_err(backend)?;

        payloads
            .iter()
            .map(|p| serde_json::from_str(p).map_err(|e| StoreError::Serialization(e.to_string())))
            .collect()
    }
}

fn backend(err: redis::RedisError) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[async_trait]
impl ReservationStore for RedisReservationStore {
    async fn persist(&self, reservation: &Reservation) -> StoreResult<()> {
        let payload = serde_json::to_string(reservation)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(backend)?;

        let hash = Self::hash_key(reservation.key());
        conn.hset::<_, _, _, ()>(&hash, reservation.id, payload)
            .await
            .map_err(backend)?;
        info!("Reservation {} persisted to {}", reservation.id, hash);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_key_uses_packed_train_and_date() {
        assert_eq!(
            RedisReservationStore::hash_key(TrainKey::new(2, 1)),
            format!("hashset_{}", (2u64 << 32) | 1)
        );
        assert_ne!(
            RedisReservationStore::hash_key(TrainKey::new(2, 1)),
            RedisReservationStore::hash_key(TrainKey::new(2, 65_537))
        );
    }
}
