//! Inventory store boundary.
//!
//! Unit records live behind two traits: [`InventoryRead`] for the read path and
//! [`InventoryStore`] which adds creation and the conditional write. Only the
//! reservation coordinator is handed the writer; every other consumer gets an
//! [`InventoryReader`].

pub mod in_memory;
pub mod read_only;
pub mod r#trait;

pub use in_memory::InMemoryInventoryStore;
pub use read_only::InventoryReader;
pub use r#trait::{InventoryRead, InventoryStore, StoreError, UpdateOutcome};
