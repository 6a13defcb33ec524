use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type TrainNumber = u32;
/// Days elapsed since the configured calendar epoch.
pub type DayOffset = u32;
pub type StopIndex = u16;
pub type SeatIndex = u32;
pub type UserId = i64;

/// One train running on one travel date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrainKey {
    pub train: TrainNumber,
    pub date: DayOffset,
}

impl TrainKey {
    pub const fn new(train: TrainNumber, date: DayOffset) -> Self {
        Self { train, date }
    }

    /// Packs the key as `train << 32 | date`, the layout used for storage keys.
    /// Both fields keep their full width, so distinct keys never pack to the same value.
    pub fn packed(&self) -> u64 {
        (u64::from(self.train) << 32) | u64::from(self.date)
    }
}

impl fmt::Display for TrainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.train, self.date)
    }
}

/// Half-open range of stop indices `[start, end)` a passenger occupies a seat for.
///
/// The journey covers segments `start..end`, where segment `i` joins stop `i` and stop `i + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub start: StopIndex,
    pub end: StopIndex,
}

impl Interval {
    pub const fn new(start: StopIndex, end: StopIndex) -> Self {
        Self { start, end }
    }

    /// Number of segments travelled.
    pub fn len(&self) -> u16 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// A journey is valid on a route when it is non-empty and ends on one of its stops.
    pub fn fits(&self, stop_count: u16) -> bool {
        !self.is_empty() && self.end < stop_count
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Shape of a train's route as supplied by the schedule source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    pub seat_count: u32,
    pub stop_count: u16,
}

impl RouteConfig {
    pub const fn new(seat_count: u32, stop_count: u16) -> Self {
        Self {
            seat_count,
            stop_count,
        }
    }

    pub fn segment_count(&self) -> u16 {
        self.stop_count.saturating_sub(1)
    }
}

/// A confirmed seat for one passenger over one interval.
///
/// Handed to the durable store once the in-memory commit succeeded; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: u64,
    pub user_id: UserId,
    pub seat: SeatIndex,
    pub train: TrainNumber,
    pub date: DayOffset,
    pub interval: Interval,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub fn key(&self) -> TrainKey {
        TrainKey::new(self.train, self.date)
    }
}
