//! Coordination-free reservation ids.
//!
//! An id packs, most significant first, `[time bucket][train][server][sequence]`. The time
//! bucket counts whole minutes since [`ID_EPOCH_SECS`]. The sequence restarts at zero in every
//! bucket, so a generator can mint `2^sequence_bits` ids per minute before it has to refuse.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// 2011-12-31T00:00:00Z.
pub const ID_EPOCH_SECS: i64 = 1_325_289_600;

const BUCKET_SECS: i64 = 60;

/// Source of wall-clock time for the generator.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Clones share the same reading.
#[derive(Debug, Clone)]
pub struct ManualClock {
    secs: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            secs: Arc::new(AtomicI64::new(at.timestamp())),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.secs.store(at.timestamp(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.secs.fetch_add(by.num_seconds(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.secs.load(Ordering::SeqCst), 0).unwrap_or_default()
    }
}

/// Bit widths of the id fields. Widths must add up to 64.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdLayout {
    pub time_bits: u8,
    pub train_bits: u8,
    pub server_bits: u8,
    pub sequence_bits: u8,
}

impl Default for IdLayout {
    fn default() -> Self {
        Self {
            time_bits: 24,
            train_bits: 13,
            server_bits: 9,
            sequence_bits: 18,
        }
    }
}

impl IdLayout {
    pub fn validate(&self) -> Result<(), IdError> {
        let widths = [
            self.time_bits,
            self.train_bits,
            self.server_bits,
            self.sequence_bits,
        ];
        if widths.contains(&0) {
            return Err(IdError::InvalidLayout(
                "every field needs at least one bit".to_string(),
            ));
        }
        let total: u32 = widths.iter().map(|w| u32::from(*w)).sum();
        if total != 64 {
            return Err(IdError::InvalidLayout(format!(
                "field widths add up to {} bits, expected 64",
                total
            )));
        }
        Ok(())
    }

    fn field_max(bits: u8) -> u64 {
        if bits >= 64 {
            u64::MAX
        } else {
            (1u64 << bits) - 1
        }
    }

    pub fn sequence_mask(&self) -> u64 {
        Self::field_max(self.sequence_bits)
    }

    /// Ids a single generator can mint inside one time bucket.
    pub fn sequence_capacity(&self) -> u64 {
        self.sequence_mask() + 1
    }

    fn server_shift(&self) -> u32 {
        u32::from(self.sequence_bits)
    }

    fn train_shift(&self) -> u32 {
        self.server_shift() + u32::from(self.server_bits)
    }

    fn time_shift(&self) -> u32 {
        self.train_shift() + u32::from(self.train_bits)
    }

    fn compose(&self, parts: IdParts) -> u64 {
        (parts.bucket << self.time_shift())
            | (parts.train << self.train_shift())
            | (parts.server << self.server_shift())
            | parts.sequence
    }

    pub fn decode(&self, id: u64) -> IdParts {
        IdParts {
            bucket: (id >> self.time_shift()) & Self::field_max(self.time_bits),
            train: (id >> self.train_shift()) & Self::field_max(self.train_bits),
            server: (id >> self.server_shift()) & Self::field_max(self.server_bits),
            sequence: id & self.sequence_mask(),
        }
    }
}

/// The four fields of a minted id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdParts {
    pub bucket: u64,
    pub train: u64,
    pub server: u64,
    pub sequence: u64,
}

impl IdParts {
    /// Start of the minute the id was minted in.
    pub fn minted_at(&self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.bucket)
            .ok()?
            .checked_mul(BUCKET_SECS)?
            .checked_add(ID_EPOCH_SECS)?;
        DateTime::from_timestamp(secs, 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("Sequence exhausted for time bucket {bucket}")]
    SequenceExhausted { bucket: u64 },

    #[error("{field} id {value} does not fit in {bits} bits")]
    ScopeOverflow {
        field: &'static str,
        value: u64,
        bits: u8,
    },

    #[error("Time bucket {bucket} does not fit in {bits} bits")]
    ClockOverflow { bucket: u64, bits: u8 },

    #[error("Clock reads {0}, which is before the id epoch")]
    ClockBeforeEpoch(DateTime<Utc>),

    #[error("Invalid id layout: {0}")]
    InvalidLayout(String),
}

#[derive(Debug, Default)]
struct SequenceState {
    bucket: Option<u64>,
    sequence: u64,
}

/// Mints ids for one (train, server) scope.
pub struct IdGenerator {
    layout: IdLayout,
    train: u64,
    server: u64,
    clock: Arc<dyn Clock>,
    state: Mutex<SequenceState>,
}

impl IdGenerator {
    pub fn new(
        layout: IdLayout,
        train: u32,
        server: u16,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, IdError> {
        layout.validate()?;
        let train = u64::from(train);
        let server = u64::from(server);
        if train > IdLayout::field_max(layout.train_bits) {
            return Err(IdError::ScopeOverflow {
                field: "train",
                value: train,
                bits: layout.train_bits,
            });
        }
        if server > IdLayout::field_max(layout.server_bits) {
            return Err(IdError::ScopeOverflow {
                field: "server",
                value: server,
                bits: layout.server_bits,
            });
        }

        Ok(Self {
            layout,
            train,
            server,
            clock,
            state: Mutex::new(SequenceState::default()),
        })
    }

    pub fn layout(&self) -> IdLayout {
        self.layout
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn current_bucket(&self) -> Result<u64, IdError> {
        let now = self.clock.now();
        let elapsed = now.timestamp() - ID_EPOCH_SECS;
        if elapsed < 0 {
            return Err(IdError::ClockBeforeEpoch(now));
        }
        let bucket = (elapsed / BUCKET_SECS) as u64;
        if bucket > IdLayout::field_max(self.layout.time_bits) {
            return Err(IdError::ClockOverflow {
                bucket,
                bits: self.layout.time_bits,
            });
        }
        Ok(bucket)
    }

    /// Mints the next id.
    ///
    /// A clock reading older than the last bucket used is treated as that bucket, so ids never
    /// go backwards. When the sequence would wrap inside a bucket the call fails with
    /// [`IdError::SequenceExhausted`] and the generator state is left as it was.
    pub fn next_id(&self) -> Result<u64, IdError> {
        let now_bucket = self.current_bucket()?;
        let mut state = self.state.lock();

        let (bucket, sequence) = match state.bucket {
            Some(last) if now_bucket <= last => {
                let next = (state.sequence + 1) & self.layout.sequence_mask();
                if next == 0 {
                    warn!(
                        "Id sequence exhausted for train {} server {} in bucket {}",
                        self.train, self.server, last
                    );
                    return Err(IdError::SequenceExhausted { bucket: last });
                }
                (last, next)
            }
            _ => (now_bucket, 0),
        };

        state.bucket = Some(bucket);
        state.sequence = sequence;

        Ok(self.layout.compose(IdParts {
            bucket,
            train: self.train,
            server: self.server,
            sequence,
        }))
    }
}

impl std::fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdGenerator")
            .field("layout", &self.layout)
            .field("train", &self.train)
            .field("server", &self.server)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::collections::HashSet;

    fn clock_at(hour: u32, min: u32, sec: u32) -> ManualClock {
        ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, hour, min, sec).unwrap())
    }

    fn generator(layout: IdLayout, clock: &ManualClock) -> IdGenerator {
        IdGenerator::new(layout, 1024, 123, Arc::new(clock.clone())).unwrap()
    }

    #[test]
    fn test_ids_increase_within_bucket() {
        let clock = clock_at(8, 0, 5);
        let ids = generator(IdLayout::default(), &clock);
        let layout = ids.layout();

        let first = ids.next_id().unwrap();
        clock.advance(Duration::seconds(30));
        let second = ids.next_id().unwrap();

        let (a, b) = (layout.decode(first), layout.decode(second));
        assert_eq!(a.bucket, b.bucket);
        assert_eq!(a.sequence, 0);
        assert_eq!(b.sequence, 1);
        assert_eq!(b.train, 1024);
        assert_eq!(b.server, 123);
        assert!(second > first);
    }

    #[test]
    fn test_later_bucket_resets_sequence_and_is_greater() {
        let clock = clock_at(8, 0, 0);
        let ids = generator(IdLayout::default(), &clock);
        let mut earlier = Vec::new();
        for _ in 0..100 {
            earlier.push(ids.next_id().unwrap());
        }

        clock.advance(Duration::minutes(1));
        let later = ids.next_id().unwrap();

        assert_eq!(ids.layout().decode(later).sequence, 0);
        assert!(earlier.iter().all(|id| *id < later));
    }

    #[test]
    fn test_bucket_counts_minutes_since_epoch() {
        let minted = DateTime::from_timestamp(ID_EPOCH_SECS + 3 * 60 + 59, 0).unwrap();
        let clock = ManualClock::new(minted);
        let ids = generator(IdLayout::default(), &clock);
        let parts = ids.layout().decode(ids.next_id().unwrap());
        assert_eq!(parts.bucket, 3);
        assert_eq!(
            parts.minted_at().unwrap().timestamp(),
            ID_EPOCH_SECS + 180
        );
    }

    #[test]
    fn test_sequence_exhaustion_is_an_error_until_next_bucket() {
        let clock = clock_at(9, 15, 0);
        let layout = IdLayout {
            time_bits: 40,
            train_bits: 13,
            server_bits: 9,
            sequence_bits: 2,
        };
        let ids = generator(layout, &clock);

        for expected in 0..layout.sequence_capacity() {
            let id = ids.next_id().unwrap();
            assert_eq!(layout.decode(id).sequence, expected);
        }

        let err = ids.next_id().unwrap_err();
        assert!(matches!(err, IdError::SequenceExhausted { .. }));
        // still refused; the counter did not wrap
        assert!(ids.next_id().is_err());

        clock.advance(Duration::minutes(1));
        let id = ids.next_id().unwrap();
        assert_eq!(layout.decode(id).sequence, 0);
    }

    #[test]
    fn test_clock_going_backwards_keeps_ids_monotonic() {
        let clock = clock_at(10, 5, 0);
        let ids = generator(IdLayout::default(), &clock);
        let first = ids.next_id().unwrap();

        clock.advance(Duration::minutes(-3));
        let second = ids.next_id().unwrap();

        assert!(second > first);
        assert_eq!(
            ids.layout().decode(second).bucket,
            ids.layout().decode(first).bucket
        );
    }

    #[test]
    fn test_scope_and_layout_validation() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let err = IdGenerator::new(IdLayout::default(), 8192, 1, clock.clone()).unwrap_err();
        assert!(matches!(err, IdError::ScopeOverflow { field: "train", .. }));

        let err = IdGenerator::new(IdLayout::default(), 1, 512, clock.clone()).unwrap_err();
        assert!(matches!(err, IdError::ScopeOverflow { field: "server", .. }));

        let bad = IdLayout {
            time_bits: 24,
            train_bits: 13,
            server_bits: 9,
            sequence_bits: 10,
        };
        assert!(matches!(
            IdGenerator::new(bad, 1, 1, clock),
            Err(IdError::InvalidLayout(_))
        ));
    }

    #[test]
    fn test_clock_before_epoch_is_rejected() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2010, 6, 1, 0, 0, 0).unwrap());
        let ids = generator(IdLayout::default(), &clock);
        assert!(matches!(ids.next_id(), Err(IdError::ClockBeforeEpoch(_))));
    }

    #[test]
    fn test_concurrent_minting_is_unique() {
        let ids = IdGenerator::new(IdLayout::default(), 7, 3, Arc::new(SystemClock)).unwrap();
        let minted: Vec<u64> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        (0..500)
                            .map(|_| ids.next_id().unwrap())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        let unique: HashSet<u64> = minted.iter().copied().collect();
        assert_eq!(unique.len(), minted.len());
    }
}
