//! Background history compaction and space reclamation.

mod compactor;

pub use compactor::{Compactor, MaintenanceConfig};
