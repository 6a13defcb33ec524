use crate::error::{BookingError, BookingResult};
use crate::idgen::IdGenerator;
use crate::occupancy::{IntervalMask, OccupancyTable};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use trackline_core::{Interval, Reservation, RouteConfig, SeatIndex, TrainKey, UserId};
use tracing::{debug, trace};

/// Result of an order that reached a ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderOutcome {
    Committed(Reservation),
    SoldOut,
}

impl OrderOutcome {
    pub fn reservation(&self) -> Option<&Reservation> {
        match self {
            OrderOutcome::Committed(reservation) => Some(reservation),
            OrderOutcome::SoldOut => None,
        }
    }

    pub fn into_reservation(self) -> Option<Reservation> {
        match self {
            OrderOutcome::Committed(reservation) => Some(reservation),
            OrderOutcome::SoldOut => None,
        }
    }

    pub fn is_sold_out(&self) -> bool {
        matches!(self, OrderOutcome::SoldOut)
    }
}

/// Occupancy words plus the reservations that own their bits, guarded as one unit.
#[derive(Debug)]
struct Seats {
    table: OccupancyTable,
    live: HashMap<u64, (SeatIndex, Interval)>,
}

/// Seat occupancy of one train on one travel date.
///
/// All seats sit behind a single lock: `order` needs the scan for a free seat and the commit
/// to be one step against other writers. `search` only takes the lock shared.
#[derive(Debug)]
pub struct SeatLedger {
    key: TrainKey,
    route: RouteConfig,
    max_search_count: usize,
    ids: Arc<IdGenerator>,
    seats: RwLock<Seats>,
}

impl SeatLedger {
    /// `max_search_count` caps what [`SeatLedger::search`] reports; zero disables the cap.
    pub fn new(
        key: TrainKey,
        route: RouteConfig,
        ids: Arc<IdGenerator>,
        max_search_count: usize,
    ) -> Self {
        let seats = Seats {
            table: OccupancyTable::new(route.seat_count as usize, route.segment_count()),
            live: HashMap::new(),
        };
        Self {
            key,
            route,
            max_search_count: if max_search_count == 0 {
                usize::MAX
            } else {
                max_search_count
            },
            ids,
            seats: RwLock::new(seats),
        }
    }

    pub fn key(&self) -> TrainKey {
        self.key
    }

    pub fn route(&self) -> RouteConfig {
        self.route
    }

    pub fn seat_count(&self) -> usize {
        self.route.seat_count as usize
    }

    fn mask_for(&self, interval: Interval) -> BookingResult<IntervalMask> {
        if !interval.fits(self.route.stop_count) {
            return Err(BookingError::InvalidInterval {
                interval,
                stop_count: self.route.stop_count,
            });
        }
        Ok(IntervalMask::new(interval))
    }

    /// Seats free over the whole interval, capped at the configured search maximum.
    pub fn search(&self, interval: Interval) -> BookingResult<usize> {
        let mask = self.mask_for(interval)?;
        let seats = self.seats.read();
        Ok(seats.table.count_free(&mask, self.max_search_count))
    }

    /// Seats free over the whole interval, without the search cap.
    pub fn available_seats(&self, interval: Interval) -> BookingResult<usize> {
        let mask = self.mask_for(interval)?;
        let seats = self.seats.read();
        Ok(seats.table.count_free(&mask, usize::MAX))
    }

    /// Books the lowest-numbered seat that is free over the whole interval.
    ///
    /// The id is minted before any bit is set, so a failed mint leaves the ledger untouched.
    pub fn order(&self, user_id: UserId, interval: Interval) -> BookingResult<OrderOutcome> {
        let mask = self.mask_for(interval)?;
        let mut seats = self.seats.write();
        let seats = &mut *seats;

        let Some((seat, words)) = seats.table.first_free_mut(&mask) else {
            debug!("Train {} sold out for {}", self.key, interval);
            return Ok(OrderOutcome::SoldOut);
        };

        let id = self.ids.next_id()?;
        mask.apply(words);
        let seat = seat as SeatIndex;
        seats.live.insert(id, (seat, interval));

        trace!(
            "Reservation {} committed: train {} seat {} {}",
            id, self.key, seat, interval
        );

        Ok(OrderOutcome::Committed(Reservation {
            id,
            user_id,
            seat,
            train: self.key.train,
            date: self.key.date,
            interval,
            created_at: self.ids.now(),
        }))
    }

    /// Gives a live reservation's segments back to its seat.
    ///
    /// Only the ledger's own record of the reservation is trusted; a reservation that was
    /// already released, or never committed here, is refused.
    pub fn release(&self, reservation: &Reservation) -> BookingResult<()> {
        let not_reserved = || BookingError::NotReserved {
            key: self.key,
            seat: reservation.seat,
            interval: reservation.interval,
        };
        if reservation.key() != self.key {
            return Err(not_reserved());
        }

        let mask = self.mask_for(reservation.interval)?;
        let mut seats = self.seats.write();
        let seats = &mut *seats;
        match seats.live.get(&reservation.id) {
            Some(&(seat, interval))
                if seat == reservation.seat && interval == reservation.interval => {}
            _ => return Err(not_reserved()),
        }
        let words = seats
            .table
            .seat_mut(reservation.seat as usize)
            .ok_or_else(not_reserved)?;
        mask.clear(words);
        seats.live.remove(&reservation.id);

        debug!(
            "Reservation {} released: train {} seat {} {}",
            reservation.id, self.key, reservation.seat, reservation.interval
        );
        Ok(())
    }

    /// Reservations currently holding seats on this ledger.
    pub fn live_reservations(&self) -> usize {
        self.seats.read().live.len()
    }

    /// Copy of one seat's occupancy words.
    pub fn occupancy(&self, seat: SeatIndex) -> Option<Vec<u64>> {
        self.seats.read().table.seat(seat as usize).map(<[u64]>::to_vec)
    }
}
