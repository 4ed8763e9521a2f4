pub mod atomic;
mod registry;
mod repository;

pub use registry::{CityStore, Registry};
pub use repository::{CityDataRepository, SnapshotEntry};
