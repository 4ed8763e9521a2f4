use serde::{Deserialize, Serialize};

use super::Forecast;

/// An extreme value and the day it falls on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extreme {
    pub value: f64,
    pub day: String,
}

/// Summary of the daily forecast block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyStats {
    pub tmax: Option<Extreme>,
    pub tmin: Option<Extreme>,
    pub avg_tmax: Option<f64>,
    pub avg_tmin: Option<f64>,
    pub precip_total: f64,
    pub pprob_max: Option<Extreme>,
}

impl WeeklyStats {
    /// `None` when the document carries no daily block
    pub fn from_forecast(forecast: &Forecast) -> Option<Self> {
        if !forecast.has_daily() {
            return None;
        }

        let days = forecast.daily_times();
        let tmax = forecast.daily_series("temperature_2m_max");
        let tmin = forecast.daily_series("temperature_2m_min");
        let psum = forecast.daily_series("precipitation_sum");
        let pprob = forecast.daily_series("precipitation_probability_max");

        let at = |idx: Option<(usize, f64)>| {
            idx.map(|(i, value)| Extreme {
                value,
                day: days.get(i).map(|d| d.to_string()).unwrap_or_default(),
            })
        };

        Some(Self {
            tmax: at(extreme(&tmax, |candidate, best| candidate > best)),
            tmin: at(extreme(&tmin, |candidate, best| candidate < best)),
            avg_tmax: mean(&tmax),
            avg_tmin: mean(&tmin),
            precip_total: psum.iter().flatten().sum(),
            pprob_max: at(extreme(&pprob, |candidate, best| candidate > best)),
        })
    }
}

/// First index holding the best present value
fn extreme(values: &[Option<f64>], better: impl Fn(f64, f64) -> bool) -> Option<(usize, f64)> {
    values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .fold(None, |best, (i, v)| match best {
            Some((_, b)) if !better(v, b) => best,
            _ => Some((i, v)),
        })
}

fn mean(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    Some(present.iter().sum::<f64>() / present.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_weekly_stats() {
        let forecast = Forecast::new(json!({
            "daily": {
                "time": ["2025-01-01", "2025-01-02", "2025-01-03"],
                "temperature_2m_max": [14.0, 18.5, 18.5],
                "temperature_2m_min": [4.0, null, 2.5],
                "precipitation_sum": [1.5, 0.0],
                "precipitation_probability_max": [20, 80, 40]
            }
        }));

        let stats = WeeklyStats::from_forecast(&forecast).unwrap();
        let tmax = stats.tmax.unwrap();
        assert_eq!(tmax.value, 18.5);
        assert_eq!(tmax.day, "2025-01-02");
        let tmin = stats.tmin.unwrap();
        assert_eq!(tmin.value, 2.5);
        assert_eq!(tmin.day, "2025-01-03");
        assert_eq!(stats.avg_tmin, Some(3.25));
        assert_eq!(stats.precip_total, 1.5);
        assert_eq!(stats.pprob_max.unwrap().day, "2025-01-02");
    }

    #[test]
    fn test_no_daily_block() {
        let forecast = Forecast::new(json!({ "hourly": { "time": ["2025-01-01T00:00"] } }));
        assert!(WeeklyStats::from_forecast(&forecast).is_none());
    }

    #[test]
    fn test_all_values_missing() {
        let forecast = Forecast::new(json!({ "daily": { "time": ["2025-01-01"] } }));
        let stats = WeeklyStats::from_forecast(&forecast).unwrap();
        assert!(stats.tmax.is_none());
        assert!(stats.avg_tmax.is_none());
        assert_eq!(stats.precip_total, 0.0);
    }
}
