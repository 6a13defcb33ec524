//! Per-seat occupancy bit-sets.
//!
//! Bit `i` of a seat is set when segment `i` has been sold. A seat owns as many `u64` words as
//! its route needs, so routes of up to 64 segments use exactly one word per seat.

use trackline_core::Interval;

pub const WORD_BITS: usize = u64::BITS as usize;

/// Words needed to hold `segments` bits.
pub fn words_for(segments: u16) -> usize {
    usize::from(segments).max(1).div_ceil(WORD_BITS)
}

/// The bits of an interval that fall into one word of a seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordMask {
    pub word: usize,
    pub bits: u64,
}

/// Mask of a non-empty interval, split per occupancy word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalMask {
    parts: Vec<WordMask>,
}

impl IntervalMask {
    pub fn new(interval: Interval) -> Self {
        debug_assert!(!interval.is_empty());
        let start = usize::from(interval.start);
        let end = usize::from(interval.end);
        let first = start / WORD_BITS;
        let last = (end - 1) / WORD_BITS;

        let parts = (first..=last)
            .map(|word| {
                let base = word * WORD_BITS;
                let lo = start.max(base) - base;
                let hi = end.min(base + WORD_BITS) - base;
                WordMask {
                    word,
                    bits: span(lo, hi),
                }
            })
            .collect();

        Self { parts }
    }

    pub fn parts(&self) -> &[WordMask] {
        &self.parts
    }

    /// No segment of the interval is sold on this seat.
    pub fn is_clear(&self, seat: &[u64]) -> bool {
        self.parts.iter().all(|p| seat[p.word] & p.bits == 0)
    }

    /// Every segment of the interval is sold on this seat.
    pub fn is_set(&self, seat: &[u64]) -> bool {
        self.parts.iter().all(|p| seat[p.word] & p.bits == p.bits)
    }

    pub fn apply(&self, seat: &mut [u64]) {
        for p in &self.parts {
            seat[p.word] |= p.bits;
        }
    }

    pub fn clear(&self, seat: &mut [u64]) {
        for p in &self.parts {
            seat[p.word] &= !p.bits;
        }
    }
}

fn span(lo: usize, hi: usize) -> u64 {
    let width = hi - lo;
    let ones = if width >= WORD_BITS {
        u64::MAX
    } else {
        (1u64 << width) - 1
    };
    ones << lo
}

/// Occupancy words of every seat of one train, stored row by row.
#[derive(Debug, Clone)]
pub struct OccupancyTable {
    words: Vec<u64>,
    stride: usize,
}

impl OccupancyTable {
    pub fn new(seat_count: usize, segments: u16) -> Self {
        let stride = words_for(segments);
        Self {
            words: vec![0; seat_count * stride],
            stride,
        }
    }

    pub fn seat_count(&self) -> usize {
        self.words.len() / self.stride
    }

    pub fn words_per_seat(&self) -> usize {
        self.stride
    }

    pub fn seat(&self, seat: usize) -> Option<&[u64]> {
        let from = seat.checked_mul(self.stride)?;
        self.words.get(from..from + self.stride)
    }

    pub fn seat_mut(&mut self, seat: usize) -> Option<&mut [u64]> {
        let from = seat.checked_mul(self.stride)?;
        self.words.get_mut(from..from + self.stride)
    }

    /// Seats in ascending index order.
    pub fn seats(&self) -> std::slice::ChunksExact<'_, u64> {
        self.words.chunks_exact(self.stride)
    }

    /// Index of the lowest seat on which the whole interval is free.
    pub fn first_free(&self, mask: &IntervalMask) -> Option<usize> {
        self.seats().position(|seat| mask.is_clear(seat))
    }

    /// The lowest seat free over the interval, with its words ready to be written.
    pub fn first_free_mut(&mut self, mask: &IntervalMask) -> Option<(usize, &mut [u64])> {
        self.words
            .chunks_exact_mut(self.stride)
            .enumerate()
            .find(|(_, seat)| mask.is_clear(seat))
    }

    pub fn count_free(&self, mask: &IntervalMask, cap: usize) -> usize {
        self.seats()
            .filter(|seat| mask.is_clear(seat))
            .take(cap)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_word_mask() {
        let mask = IntervalMask::new(Interval::new(0, 2));
        assert_eq!(mask.parts(), &[WordMask { word: 0, bits: 0b11 }]);

        let mask = IntervalMask::new(Interval::new(3, 17));
        assert_eq!(mask.parts()[0].bits, ((1u64 << 14) - 1) << 3);
    }

    #[test]
    fn test_full_word_mask() {
        let mask = IntervalMask::new(Interval::new(0, 64));
        assert_eq!(mask.parts(), &[WordMask { word: 0, bits: u64::MAX }]);
    }

    #[test]
    fn test_mask_spanning_word_boundary() {
        let mask = IntervalMask::new(Interval::new(62, 130));
        assert_eq!(
            mask.parts(),
            &[
                WordMask { word: 0, bits: 0b11 << 62 },
                WordMask { word: 1, bits: u64::MAX },
                WordMask { word: 2, bits: 0b11 },
            ]
        );
    }

    #[test]
    fn test_words_for_segments() {
        assert_eq!(words_for(0), 1);
        assert_eq!(words_for(3), 1);
        assert_eq!(words_for(64), 1);
        assert_eq!(words_for(65), 2);
        assert_eq!(words_for(199), 4);
    }

    #[test]
    fn test_table_first_fit_and_counts() {
        let mut table = OccupancyTable::new(3, 10);
        let journey = IntervalMask::new(Interval::new(2, 5));

        assert_eq!(table.first_free(&journey), Some(0));
        journey.apply(table.seat_mut(0).unwrap());
        assert_eq!(table.first_free(&journey), Some(1));
        assert_eq!(table.count_free(&journey, usize::MAX), 2);
        assert_eq!(table.count_free(&journey, 1), 1);

        let (seat, words) = table.first_free_mut(&journey).unwrap();
        assert_eq!(seat, 1);
        assert_eq!(words, &[0]);

        let disjoint = IntervalMask::new(Interval::new(5, 9));
        assert_eq!(table.first_free(&disjoint), Some(0));

        assert!(journey.is_set(table.seat(0).unwrap()));
        journey.clear(table.seat_mut(0).unwrap());
        assert_eq!(table.seat(0).unwrap(), &[0]);
        assert!(table.seat(3).is_none());
    }
}
