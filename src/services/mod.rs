//! Schema acquisition services.
//!
//! [`SchemaManager`] orchestrates the fetcher, validator and local store
//! behind a per-slot [`SingleFlight`] guard.

mod clock;
mod schema_manager;
mod single_flight;

pub use clock::{Clock, ManualClock, SystemClock};
pub use schema_manager::{CacheSlot, SchemaManager, SlotReport};
pub use single_flight::SingleFlight;
