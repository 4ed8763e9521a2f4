use std::fmt::Write;

use chrono::Utc;

use crate::domain::{Extreme, FetchRecord, TrackedCity, WeeklyStats};

use super::dashboard::{daily_rows, hourly_rows, trim_number, CurrentSummary};

/// Download name of a city's report
pub fn report_filename(city: &TrackedCity) -> String {
    format!("{}_report.md", city.id)
}

/// Markdown summary of the latest record, or a placeholder before the first refresh
pub fn markdown_report(city: &TrackedCity, latest: Option<&FetchRecord>) -> String {
    let Some(record) = latest else {
        return format!(
            "# Weather report: {}\n\n(No data yet. Waiting for the first update.)\n",
            city.label
        );
    };
    let forecast = &record.payload;
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out, "# Weather report: {}\n", city.label);
    let _ = writeln!(out, "- Timezone: {}", forecast.timezone().unwrap_or("auto"));
    let _ = writeln!(out, "- Fetched: {}", record.fetched_at.to_rfc3339());
    let _ = writeln!(out, "- Generated: {}\n", Utc::now().to_rfc3339());

    let _ = writeln!(out, "## Current conditions\n");
    match CurrentSummary::from_forecast(forecast) {
        Some(c) => {
            let _ = writeln!(out, "- Temperature: {}", c.temperature.display());
            let _ = writeln!(out, "- Feels like: {}", c.apparent_temperature.display());
            let _ = writeln!(out, "- Humidity: {}", c.humidity.display());
            let _ = writeln!(out, "- Precipitation: {}", c.precipitation.display());
            let _ = writeln!(out, "- Weather: {}", c.weather);
            let _ = writeln!(
                out,
                "- Wind: {} from {}°",
                c.wind_speed.display(),
                c.wind_direction.value.map(trim_number).unwrap_or_else(|| "—".to_string())
            );
        }
        None => {
            let _ = writeln!(out, "- (no current data)");
        }
    }

    let _ = writeln!(out, "\n## Weekly summary\n");
    match WeeklyStats::from_forecast(forecast) {
        Some(stats) => {
            let unit = |field: &str| forecast.daily_unit(field).unwrap_or_default().to_string();
            let (t_unit, p_unit) = (unit("temperature_2m_max"), unit("precipitation_sum"));
            let pp_unit = unit("precipitation_probability_max");

            let _ = writeln!(out, "- Highest max: {}", extreme(&stats.tmax, &t_unit));
            let _ = writeln!(out, "- Lowest min: {}", extreme(&stats.tmin, &unit("temperature_2m_min")));
            let _ = writeln!(out, "- Average max: {}", average(stats.avg_tmax, &t_unit));
            let _ = writeln!(out, "- Average min: {}", average(stats.avg_tmin, &t_unit));
            let _ = writeln!(out, "- Total precipitation: {:.1}{}", stats.precip_total, p_unit);
            if let Some(pp) = &stats.pprob_max {
                let _ = writeln!(out, "- Wettest day: {} ({:.0}{})", pp.day, pp.value, pp_unit);
            }
        }
        None => {
            let _ = writeln!(out, "- (no daily data)");
        }
    }

    let _ = writeln!(out, "\n## Next 7 days\n");
    let daily = daily_rows(forecast);
    if daily.is_empty() {
        let _ = writeln!(out, "- (no daily data)");
    } else {
        let _ = writeln!(out, "| Day | Min | Max | Rain chance | Precipitation | Weather |");
        let _ = writeln!(out, "|---|---:|---:|---:|---:|---|");
        for row in &daily {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} | {} |",
                row.day,
                row.tmin.display(),
                row.tmax.display(),
                row.pprob_max.display(),
                row.precip_sum.display(),
                row.weather
            );
        }
    }

    let _ = writeln!(out, "\n## Next 48 hours\n");
    let hourly = hourly_rows(forecast);
    if hourly.is_empty() {
        let _ = writeln!(out, "- (no hourly data)");
    } else {
        let _ = writeln!(out, "| Time | Temp | Feels like | Precipitation | Rain chance | Wind | Dir | Weather |");
        let _ = writeln!(out, "|---|---:|---:|---:|---:|---:|---:|---|");
        for row in &hourly {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} | {} | {} | {} |",
                row.time,
                row.temperature.display(),
                row.apparent_temperature.display(),
                row.precipitation.display(),
                row.precipitation_probability.display(),
                row.wind_speed.display(),
                row.wind_direction.display(),
                row.weather
            );
        }
    }

    out
}

fn extreme(value: &Option<Extreme>, unit: &str) -> String {
    match value {
        Some(e) => format!("{}{} ({})", trim_number(e.value), unit, e.day),
        None => "—".to_string(),
    }
}

fn average(value: Option<f64>, unit: &str) -> String {
    value.map(|v| format!("{:.1}{}", v, unit)).unwrap_or_else(|| "—".to_string())
}
