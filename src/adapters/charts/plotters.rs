use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;

use crate::domain::{parse_local_time, Forecast, TrackedCity};
use crate::error::{ClimaError, Result};
use crate::ports::{ChartRenderer, CHART_FILES};

fn chart_err(err: impl std::fmt::Display) -> ClimaError {
    ClimaError::Chart(err.to_string())
}

/// One hourly series restricted to rows with a parseable timestamp
struct Series {
    values: Vec<Option<f64>>,
    unit: String,
}

impl Series {
    fn has_values(&self) -> bool {
        self.values.iter().any(Option::is_some)
    }

    /// Running total, absent hours count as zero
    fn cumulative(&self) -> Vec<Option<f64>> {
        let mut total = 0.0;
        self.values
            .iter()
            .map(|v| {
                total += v.unwrap_or(0.0);
                Some(total)
            })
            .collect()
    }
}

enum Kind {
    Line,
    Bars,
}

struct Plot<'a> {
    #[cfg_attr(not(feature = "chart-text"), allow(dead_code))]
    title: String,
    #[cfg_attr(not(feature = "chart-text"), allow(dead_code))]
    y_desc: String,
    kind: Kind,
    lines: Vec<(&'a str, &'a [Option<f64>], RGBColor)>,
    y_range: Option<Range<f64>>,
}

/// PNG charts drawn with plotters' bitmap backend
#[derive(Debug, Clone)]
pub struct PlottersRenderer {
    width: u32,
    height: u32,
}

impl PlottersRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn draw(&self, path: &Path, labels: &[String], plot: &Plot<'_>) -> Result<()> {
        let root = BitMapBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;

        let x_max = labels.len().saturating_sub(1).max(1) as f64;
        let y_range = plot
            .y_range
            .clone()
            .unwrap_or_else(|| value_range(plot.lines.iter().flat_map(|(_, v, _)| v.iter()), &plot.kind));

        let mut builder = ChartBuilder::on(&root);
        builder.margin(12);
        #[cfg(feature = "chart-text")]
        builder
            .caption(&plot.title, ("sans-serif", 18))
            .x_label_area_size(48)
            .y_label_area_size(56);
        let mut chart = builder
            .build_cartesian_2d(-0.5..x_max + 0.5, y_range)
            .map_err(chart_err)?;

        draw_mesh(&mut chart, labels, plot)?;

        for (name, values, color) in &plot.lines {
            match plot.kind {
                Kind::Bars => {
                    let color = *color;
                    chart
                        .draw_series(values.iter().enumerate().filter_map(|(i, v)| {
                            v.map(|v| {
                                let x = i as f64;
                                Rectangle::new([(x - 0.4, 0.0), (x + 0.4, v)], color.filled())
                            })
                        }))
                        .map_err(chart_err)?;
                }
                Kind::Line => {
                    let mut first = true;
                    for segment in segments(values) {
                        let series = chart
                            .draw_series(LineSeries::new(segment, color.stroke_width(2)))
                            .map_err(chart_err)?;
                        if first && plot.lines.len() > 1 {
                            let color = *color;
                            series
                                .label(*name)
                                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 18, y)], color));
                        }
                        first = false;
                    }
                }
            }
        }

        #[cfg(feature = "chart-text")]
        {
            if plot.lines.len() > 1 {
                chart
                    .configure_series_labels()
                    .background_style(WHITE.mix(0.8))
                    .border_style(BLACK)
                    .draw()
                    .map_err(chart_err)?;
            }
        }

        root.present().map_err(chart_err)?;
        Ok(())
    }
}

type Chart<'a, 'b> = ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

/// Grid, tick labels and axis descriptions
#[cfg(feature = "chart-text")]
fn draw_mesh(chart: &mut Chart<'_, '_>, labels: &[String], plot: &Plot<'_>) -> Result<()> {
    let label_at = |x: &f64| {
        let idx = x.round().max(0.0) as usize;
        labels.get(idx).cloned().unwrap_or_default()
    };
    chart
        .configure_mesh()
        .x_desc("Hour")
        .y_desc(plot.y_desc.as_str())
        .x_labels(8)
        .x_label_formatter(&label_at)
        .light_line_style(BLACK.mix(0.1))
        .draw()
        .map_err(chart_err)
}

/// Without a font backend only the grid and axis lines are drawn
#[cfg(not(feature = "chart-text"))]
fn draw_mesh(chart: &mut Chart<'_, '_>, labels: &[String], plot: &Plot<'_>) -> Result<()> {
    let x_max = labels.len().saturating_sub(1) as f64;
    let y_range = chart.y_range();
    let area = chart.plotting_area();
    let grid = BLACK.mix(0.1);

    for step in 0..=4 {
        let y = y_range.start + (y_range.end - y_range.start) * f64::from(step) / 4.0;
        area.draw(&PathElement::new(vec![(-0.5, y), (x_max + 0.5, y)], grid))
            .map_err(chart_err)?;
    }
    let stride = (labels.len() / 8).max(1);
    for x in (0..labels.len()).step_by(stride) {
        let x = x as f64;
        area.draw(&PathElement::new(vec![(x, y_range.start), (x, y_range.end)], grid))
            .map_err(chart_err)?;
    }

    let baseline = if matches!(plot.kind, Kind::Bars) || y_range.start > 0.0 {
        y_range.start
    } else {
        0.0_f64.min(y_range.end)
    };
    area.draw(&PathElement::new(
        vec![(-0.5, baseline), (x_max + 0.5, baseline)],
        BLACK.mix(0.6),
    ))
    .map_err(chart_err)?;
    Ok(())
}

impl Default for PlottersRenderer {
    fn default() -> Self {
        Self::new(1024, 640)
    }
}

impl ChartRenderer for PlottersRenderer {
    fn render(&self, city: &TrackedCity, forecast: &Forecast, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let times = forecast.hourly_times()?;
        let rows: Vec<usize> = times
            .iter()
            .enumerate()
            .filter_map(|(i, t)| parse_local_time(t).map(|_| i))
            .collect();
        if rows.is_empty() {
            return Err(ClimaError::MalformedPayload(
                "hourly.time holds no parseable timestamps".to_string(),
            ));
        }

        let labels: Vec<String> = rows
            .iter()
            .filter_map(|&i| parse_local_time(times[i]))
            .map(|t| t.format("%d %Hh").to_string())
            .collect();

        let series = |field: &str, default_unit: &str| {
            let all = forecast.hourly_series(field);
            Series {
                values: rows.iter().map(|&i| all.get(i).copied().flatten()).collect(),
                unit: forecast.hourly_unit(field).unwrap_or(default_unit).to_string(),
            }
        };

        let temp = series("temperature_2m", "°C");
        let feel = series("apparent_temperature", "°C");
        let prec = series("precipitation", "mm");
        let pprob = series("precipitation_probability", "%");
        let wspd = series("wind_speed_10m", "km/h");
        let wdir = series("wind_direction_10m", "°");
        let acum = prec.cumulative();

        let tz = forecast.timezone().unwrap_or("auto");
        let span = format!("{}h", rows.len());
        let title = |what: &str| format!("{} ({}) — {} — {}", what, span, city.label, tz);

        let mut plots: Vec<(&str, Plot<'_>)> = vec![
            (
                "temp.png",
                Plot {
                    title: title("Temperature"),
                    y_desc: format!("Temperature ({})", temp.unit),
                    kind: Kind::Line,
                    lines: vec![("Temperature", temp.values.as_slice(), RED)],
                    y_range: None,
                },
            ),
            (
                "precip.png",
                Plot {
                    title: title("Precipitation per hour"),
                    y_desc: format!("Precipitation ({})", prec.unit),
                    kind: Kind::Bars,
                    lines: vec![("Precipitation", prec.values.as_slice(), BLUE)],
                    y_range: None,
                },
            ),
        ];

        if pprob.has_values() {
            plots.push((
                "pprob.png",
                Plot {
                    title: title("Precipitation probability"),
                    y_desc: format!("Probability ({})", pprob.unit),
                    kind: Kind::Line,
                    lines: vec![("Probability", pprob.values.as_slice(), BLUE)],
                    y_range: Some(0.0..100.0),
                },
            ));
        }
        if wspd.has_values() {
            plots.push((
                "wind_speed.png",
                Plot {
                    title: title("Wind speed"),
                    y_desc: format!("Speed ({})", wspd.unit),
                    kind: Kind::Line,
                    lines: vec![("Wind", wspd.values.as_slice(), GREEN)],
                    y_range: None,
                },
            ));
        }
        if temp.has_values() && feel.has_values() {
            plots.push((
                "temp_vs_feel.png",
                Plot {
                    title: title("Temperature vs feels like"),
                    y_desc: format!("Temperature ({})", temp.unit),
                    kind: Kind::Line,
                    lines: vec![
                        ("Temperature", temp.values.as_slice(), RED),
                        ("Feels like", feel.values.as_slice(), MAGENTA),
                    ],
                    y_range: None,
                },
            ));
        }
        plots.push((
            "precip_acum.png",
            Plot {
                title: title("Cumulative precipitation"),
                y_desc: format!("Cumulative ({})", prec.unit),
                kind: Kind::Line,
                lines: vec![("Cumulative", acum.as_slice(), BLUE)],
                y_range: None,
            },
        ));
        if wdir.has_values() {
            plots.push((
                "wind_dir_deg.png",
                Plot {
                    title: title("Wind direction"),
                    y_desc: "Direction (°)".to_string(),
                    kind: Kind::Line,
                    lines: vec![("Direction", wdir.values.as_slice(), CYAN)],
                    y_range: Some(0.0..360.0),
                },
            ));
        }

        fs::create_dir_all(out_dir).map_err(|e| ClimaError::persistence(out_dir, e))?;

        let mut written = Vec::with_capacity(plots.len());
        for (file, plot) in &plots {
            // The bitmap encoder picks the format from the extension, so keep `.png`
            let tmp = out_dir.join(format!(".tmp-{}", file));
            let path = out_dir.join(file);
            if let Err(e) = self.draw(&tmp, &labels, plot) {
                let _ = fs::remove_file(&tmp);
                return Err(e);
            }
            fs::rename(&tmp, &path).map_err(|e| ClimaError::persistence(&path, e))?;
            written.push(path);
        }

        // Charts skipped this time must not linger as if current
        for (file, _) in CHART_FILES {
            if plots.iter().any(|(drawn, _)| drawn == file) {
                continue;
            }
            let stale = out_dir.join(file);
            match fs::remove_file(&stale) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(ClimaError::persistence(&stale, e)),
            }
        }
        Ok(written)
    }
}

/// Runs of consecutive present values as (x, y) points
fn segments(values: &[Option<f64>]) -> Vec<Vec<(f64, f64)>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    for (i, v) in values.iter().enumerate() {
        match v {
            Some(v) => current.push((i as f64, *v)),
            None if !current.is_empty() => out.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn value_range<'a>(values: impl Iterator<Item = &'a Option<f64>>, kind: &Kind) -> Range<f64> {
    let (mut lo, mut hi) = values
        .flatten()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));

    if !lo.is_finite() || !hi.is_finite() {
        return 0.0..1.0;
    }
    if matches!(kind, Kind::Bars) {
        lo = lo.min(0.0);
    }
    if (hi - lo).abs() < 1e-6 {
        hi += 1.0;
        lo -= if matches!(kind, Kind::Bars) { 0.0 } else { 1.0 };
    }
    let pad = (hi - lo) * 0.08;
    let lo = if matches!(kind, Kind::Bars) && lo >= 0.0 { 0.0 } else { lo - pad };
    lo..hi + pad
}
