pub mod charts;
pub mod open_meteo;
pub mod store;

pub use charts::PlottersRenderer;
pub use open_meteo::OpenMeteoClient;
pub use store::{CityDataRepository, CityStore, Registry, SnapshotEntry};
