pub mod cities;
pub mod dashboard;
pub mod report;
pub mod scheduler;

pub use cities::{AddCity, CityService};
pub use dashboard::{CityOverview, Dashboard, DashboardService};
pub use report::{markdown_report, report_filename};
pub use scheduler::{CycleReport, RefreshScheduler};
