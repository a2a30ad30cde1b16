//! Plotters-powered line charts for the dashboard, rendered into the
//! Ratatui buffer through `plotters-ratatui-backend`.
//!
//! The widget is data-driven: series and bounds are computed outside the
//! render call, which keeps `render()` focused on drawing and makes the
//! data prep testable on its own.

use chrono::{Datelike, NaiveDate};
use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

/// One named line on a chart. The ratatui color is used for the legend text,
/// the plotters color for the line itself.
pub struct ChartSeries {
    pub name: String,
    pub color: RGBColor,
    pub legend_color: Color,
    pub points: Vec<(f64, f64)>,
}

pub struct LineChart<'a> {
    pub series: &'a [ChartSeries],
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub fmt_x: fn(f64) -> String,
    pub fmt_y: fn(f64) -> String,
}

impl Widget for LineChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // When the available area is too small, Plotters may fail to build a
        // chart. Render a small hint rather than panicking.
        if area.width < 20 || area.height < 5 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let [x0, x1] = self.x_bounds;
        let [y0, y1] = self.y_bounds;
        if !(x0.is_finite() && x1.is_finite() && y0.is_finite() && y1.is_finite())
            || x1 <= x0
            || y1 <= y0
        {
            return;
        }

        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                // Terminal cells are low-res, so keep label areas compact.
                .set_label_area_size(LabelAreaPosition::Left, 7)
                .set_label_area_size(LabelAreaPosition::Bottom, 2)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            // Mesh lines are visual clutter at terminal resolution; the axes
            // and tick labels are enough.
            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_labels(4)
                .y_labels(4)
                .x_label_formatter(&|v| (self.fmt_x)(*v))
                .y_label_formatter(&|v| (self.fmt_y)(*v))
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(&WHITE)
                .draw()?;

            for series in self.series {
                chart.draw_series(LineSeries::new(
                    series.points.iter().copied(),
                    &series.color,
                ))?;
            }
            Ok(())
        });

        widget.render(area, buf);
    }
}

/// Dates are plotted as days-since-CE so every chart shares one x scale.
pub fn date_to_x(date: NaiveDate) -> f64 {
    date.num_days_from_ce() as f64
}

pub fn date_points<I>(dates: &[NaiveDate], values: I) -> Vec<(f64, f64)>
where
    I: IntoIterator<Item = f64>,
{
    dates
        .iter()
        .copied()
        .map(date_to_x)
        .zip(values)
        .collect()
}

/// X bounds covering every series, padded by a day on each side when the
/// range would otherwise be empty.
pub fn x_axis_bounds(series: &[ChartSeries]) -> [f64; 2] {
    let (mut x_min, mut x_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for s in series {
        for &(x, _) in &s.points {
            x_min = x_min.min(x);
            x_max = x_max.max(x);
        }
    }
    if !x_min.is_finite() || !x_max.is_finite() {
        return [0.0, 1.0];
    }
    if x_max <= x_min {
        return [x_min - 1.0, x_min + 1.0];
    }
    [x_min, x_max]
}

/// Y bounds covering every series with a 5% pad, falling back to [0, 1] for
/// empty or degenerate input.
pub fn y_axis_bounds(series: &[ChartSeries]) -> [f64; 2] {
    let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for s in series {
        for &(_, y) in &s.points {
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }
    }
    if !y_min.is_finite() || !y_max.is_finite() || y_max <= y_min {
        if y_min.is_finite() && y_max.is_finite() {
            // A flat series: pad around the single value.
            let pad = y_min.abs().max(1.0) * 0.05;
            return [y_min - pad, y_max + pad];
        }
        return [0.0, 1.0];
    }
    let pad = ((y_max - y_min).abs() * 0.05).max(1e-12);
    [y_min - pad, y_max + pad]
}

pub fn fmt_date_tick(v: f64) -> String {
    NaiveDate::from_num_days_from_ce_opt(v as i32)
        .map(|date| date.format("%b %y").to_string())
        .unwrap_or_default()
}

pub fn fmt_count_tick(v: f64) -> String {
    let magnitude = v.abs();
    if magnitude >= 1e9 {
        format!("{:.1}B", v / 1e9)
    } else if magnitude >= 1e6 {
        format!("{:.1}M", v / 1e6)
    } else if magnitude >= 1e3 {
        format!("{:.0}k", v / 1e3)
    } else {
        format!("{v:.0}")
    }
}

pub fn fmt_ratio_tick(v: f64) -> String {
    format!("{:.2}%", v * 100.0)
}
