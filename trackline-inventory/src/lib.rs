pub mod error;
pub mod idgen;
pub mod occupancy;
pub mod ledger;
pub mod registry;

pub use error::{BookingError, BookingResult};
pub use idgen::{Clock, IdError, IdGenerator, IdLayout, IdParts, ManualClock, SystemClock};
pub use ledger::{OrderOutcome, SeatLedger};
pub use registry::{InventorySettings, TrainRegistry};
