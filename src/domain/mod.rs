pub mod city;
pub mod forecast;
pub mod location;
pub mod settings;
pub mod stats;
pub mod status;
pub mod weather_code;

pub use city::{CityId, TrackedCity};
pub use forecast::{parse_local_time, FetchRecord, Forecast, CURRENT_FIELDS, DAILY_FIELDS, HOURLY_FIELDS};
pub use location::GeoCandidate;
pub use settings::{Settings, SettingsUpdate, MAX_CITIES};
pub use stats::{Extreme, WeeklyStats};
pub use status::StatusRecord;
