use crate::error::{BookingError, BookingResult};
use crate::idgen::{Clock, IdGenerator, IdLayout, SystemClock};
use crate::ledger::{OrderOutcome, SeatLedger};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use trackline_core::{Interval, RouteConfig, TrainKey, TrainNumber, UserId};
use tracing::{info, warn};

/// Tunables shared by every ledger of a registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventorySettings {
    #[serde(default = "default_max_search_count")]
    pub max_search_count: usize,
    #[serde(default = "default_max_stops")]
    pub max_stops: u16,
    #[serde(default)]
    pub id_layout: IdLayout,
}

fn default_max_search_count() -> usize { 10 }
fn default_max_stops() -> u16 { 62 }

impl Default for InventorySettings {
    fn default() -> Self {
        Self {
            max_search_count: default_max_search_count(),
            max_stops: default_max_stops(),
            id_layout: IdLayout::default(),
        }
    }
}

#[derive(Default)]
struct Ledgers {
    by_key: HashMap<TrainKey, Arc<SeatLedger>>,
    // one generator per train number, shared by all of its dates
    generators: HashMap<TrainNumber, Arc<IdGenerator>>,
}

/// Every provisioned (train, date) of this server instance.
///
/// Lookups take the lock shared and hand out an `Arc`, so ledgers are only ever seen fully built.
pub struct TrainRegistry {
    server_id: u16,
    settings: InventorySettings,
    clock: Arc<dyn Clock>,
    ledgers: RwLock<Ledgers>,
}

impl TrainRegistry {
    pub fn new(server_id: u16, settings: InventorySettings) -> Self {
        Self::with_clock(server_id, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(server_id: u16, settings: InventorySettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            server_id,
            settings,
            clock,
            ledgers: RwLock::new(Ledgers::default()),
        }
    }

    pub fn server_id(&self) -> u16 {
        self.server_id
    }

    pub fn settings(&self) -> &InventorySettings {
        &self.settings
    }

    fn validate_route(&self, key: TrainKey, route: RouteConfig) -> BookingResult<()> {
        let reason = if route.stop_count < 2 {
            format!("{} stops, need at least 2", route.stop_count)
        } else if route.stop_count > self.settings.max_stops {
            format!(
                "{} stops, at most {} allowed",
                route.stop_count, self.settings.max_stops
            )
        } else if route.seat_count == 0 {
            "no seats".to_string()
        } else {
            return Ok(());
        };
        Err(BookingError::InvalidRoute { key, reason })
    }

    /// Opens a (train, date) for sale.
    ///
    /// A key that is already provisioned is refused and its ledger left as it is.
    pub fn provision(&self, key: TrainKey, route: RouteConfig) -> BookingResult<Arc<SeatLedger>> {
        self.validate_route(key, route)?;

        let mut ledgers = self.ledgers.write();
        if ledgers.by_key.contains_key(&key) {
            warn!("Refusing to provision train {} twice", key);
            return Err(BookingError::AlreadyProvisioned(key));
        }

        let ids = match ledgers.generators.get(&key.train).cloned() {
            Some(ids) => ids,
            None => {
                let ids = Arc::new(IdGenerator::new(
                    self.settings.id_layout,
                    key.train,
                    self.server_id,
                    self.clock.clone(),
                )?);
                ledgers.generators.insert(key.train, ids.clone());
                ids
            }
        };

        let ledger = Arc::new(SeatLedger::new(
            key,
            route,
            ids,
            self.settings.max_search_count,
        ));
        ledgers.by_key.insert(key, ledger.clone());

        info!(
            "Provisioned train {} with {} seats over {} stops",
            key, route.seat_count, route.stop_count
        );
        Ok(ledger)
    }

    pub fn resolve(&self, key: TrainKey) -> Option<Arc<SeatLedger>> {
        self.ledgers.read().by_key.get(&key).cloned()
    }

    fn ledger(&self, key: TrainKey) -> BookingResult<Arc<SeatLedger>> {
        self.resolve(key).ok_or(BookingError::TrainUnknown(key))
    }

    /// Closes a (train, date). In-flight calls holding the ledger finish against it.
    pub fn remove(&self, key: TrainKey) -> Option<Arc<SeatLedger>> {
        let removed = self.ledgers.write().by_key.remove(&key);
        if removed.is_some() {
            info!("Removed train {}", key);
        }
        removed
    }

    pub fn search(&self, key: TrainKey, interval: Interval) -> BookingResult<usize> {
        self.ledger(key)?.search(interval)
    }

    pub fn order(
        &self,
        user_id: UserId,
        key: TrainKey,
        interval: Interval,
    ) -> BookingResult<OrderOutcome> {
        self.ledger(key)?.order(user_id, interval)
    }

    pub fn contains(&self, key: TrainKey) -> bool {
        self.ledgers.read().by_key.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.ledgers.read().by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<TrainKey> {
        let mut keys: Vec<_> = self.ledgers.read().by_key.keys().copied().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idgen::{IdError, ManualClock};
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;

    fn registry() -> TrainRegistry {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 7, 1, 6, 0, 0).unwrap());
        TrainRegistry::with_clock(123, InventorySettings::default(), Arc::new(clock))
    }

    #[test]
    fn test_unknown_train_is_distinct_from_sold_out() {
        let registry = registry();
        let key = TrainKey::new(5, 10);

        assert_eq!(
            registry.search(key, Interval::new(0, 1)),
            Err(BookingError::TrainUnknown(key))
        );
        assert_eq!(
            registry.order(1, key, Interval::new(0, 1)),
            Err(BookingError::TrainUnknown(key))
        );

        registry.provision(key, RouteConfig::new(1, 3)).unwrap();
        assert!(!registry.order(1, key, Interval::new(0, 2)).unwrap().is_sold_out());
        assert!(registry.order(2, key, Interval::new(0, 1)).unwrap().is_sold_out());
        assert_eq!(registry.search(key, Interval::new(0, 1)), Ok(0));
    }

    #[test]
    fn test_duplicate_provision_keeps_existing_ledger() {
        let registry = registry();
        let key = TrainKey::new(88, 3);
        registry.provision(key, RouteConfig::new(2, 5)).unwrap();
        registry.order(1, key, Interval::new(0, 4)).unwrap();

        assert_eq!(
            registry.provision(key, RouteConfig::new(40, 5)).unwrap_err(),
            BookingError::AlreadyProvisioned(key)
        );

        let ledger = registry.resolve(key).unwrap();
        assert_eq!(ledger.seat_count(), 2);
        assert_eq!(registry.search(key, Interval::new(0, 4)), Ok(1));
    }

    #[test]
    fn test_invalid_routes_are_refused() {
        let registry = registry();
        let key = TrainKey::new(1, 1);
        for route in [
            RouteConfig::new(10, 1),
            RouteConfig::new(10, 63),
            RouteConfig::new(0, 10),
        ] {
            assert!(matches!(
                registry.provision(key, route),
                Err(BookingError::InvalidRoute { .. })
            ));
        }
        assert!(registry.is_empty());

        let wide = TrainKey::new(9000, 1);
        assert!(matches!(
            registry.provision(wide, RouteConfig::new(10, 10)),
            Err(BookingError::Id(IdError::ScopeOverflow { .. }))
        ));
        assert!(!registry.contains(wide));
    }

    #[test]
    fn test_dates_of_one_train_share_an_id_sequence() {
        let registry = registry();
        let monday = TrainKey::new(42, 100);
        let tuesday = TrainKey::new(42, 101);
        registry.provision(monday, RouteConfig::new(4, 6)).unwrap();
        registry.provision(tuesday, RouteConfig::new(4, 6)).unwrap();

        let mut ids = HashSet::new();
        for user in 0..4 {
            for key in [monday, tuesday] {
                let outcome = registry.order(user, key, Interval::new(0, 5)).unwrap();
                assert!(ids.insert(outcome.reservation().unwrap().id));
            }
        }
        assert_eq!(ids.len(), 8);
    }

    #[test]
    fn test_remove_closes_sales() {
        let registry = registry();
        let key = TrainKey::new(3, 30);
        registry.provision(key, RouteConfig::new(1, 4)).unwrap();
        assert_eq!(registry.keys(), vec![key]);

        let removed = registry.remove(key).unwrap();
        assert_eq!(removed.key(), key);
        assert!(registry.remove(key).is_none());
        assert_eq!(
            registry.search(key, Interval::new(0, 1)),
            Err(BookingError::TrainUnknown(key))
        );

        // the date can be opened again afterwards
        registry.provision(key, RouteConfig::new(1, 4)).unwrap();
    }

    #[test]
    fn test_concurrent_orders_take_distinct_seats() {
        let registry = Arc::new(TrainRegistry::new(7, InventorySettings::default()));
        let key = TrainKey::new(1200, 50);
        registry.provision(key, RouteConfig::new(40, 12)).unwrap();
        let journey = Interval::new(2, 9);

        let seats: Vec<u32> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|worker| {
                    let registry = registry.clone();
                    scope.spawn(move || {
                        let mut won = Vec::new();
                        for n in 0..10 {
                            let user = worker * 100 + n;
                            if let OrderOutcome::Committed(r) =
                                registry.order(user, key, journey).unwrap()
                            {
                                won.push(r.seat);
                            }
                            // readers run alongside the writers
                            let _ = registry.search(key, journey).unwrap();
                        }
                        won
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        assert_eq!(seats.len(), 40);
        let distinct: HashSet<_> = seats.iter().collect();
        assert_eq!(distinct.len(), 40);
        assert_eq!(registry.search(key, journey), Ok(0));
    }
}
