use std::path::{Path, PathBuf};

use crate::domain::{Forecast, TrackedCity};
use crate::error::Result;

/// Chart files and their dashboard captions, in display order
pub const CHART_FILES: &[(&str, &str)] = &[
    ("temp.png", "Temperature"),
    ("precip.png", "Precipitation per hour"),
    ("pprob.png", "Precipitation probability"),
    ("wind_speed.png", "Wind speed"),
    ("temp_vs_feel.png", "Temperature vs feels like"),
    ("precip_acum.png", "Cumulative precipitation"),
    ("wind_dir_deg.png", "Wind direction"),
];

pub fn is_chart_file(name: &str) -> bool {
    CHART_FILES.iter().any(|(file, _)| *file == name)
}

/// Port for turning a forecast into image files.
///
/// Implementations overwrite fixed filenames inside `out_dir` and return the
/// paths they wrote. Rendering is blocking work.
pub trait ChartRenderer: Send + Sync {
    fn render(&self, city: &TrackedCity, forecast: &Forecast, out_dir: &Path) -> Result<Vec<PathBuf>>;
}
