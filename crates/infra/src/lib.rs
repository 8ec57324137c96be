//! Infrastructure layer: unit storage, the reservation coordinator, the
//! expiry sweeper, configuration and inventory seeding.

pub mod config;
pub mod coordinator;
pub mod seed;
pub mod store;
pub mod sweeper;


pub use config::{ConfigError, EngineConfig};
pub use coordinator::ReservationCoordinator;
pub use seed::{load_inventory_file, load_inventory_str, SeedError, SeedSummary};
pub use store::{
    InMemoryInventoryStore, InventoryRead, InventoryReader, InventoryStore, StoreError,
    UpdateOutcome,
};
pub use sweeper::{ExpirySweeper, SweepReport, SweeperConfig, SweeperHandle, SweeperStats};
