pub mod chart_renderer;
pub mod weather_provider;

pub use chart_renderer::{is_chart_file, ChartRenderer, CHART_FILES};
pub use weather_provider::{ForecastRequest, GeocodeQuery, WeatherProvider};
