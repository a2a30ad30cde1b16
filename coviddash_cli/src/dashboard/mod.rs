//! Ratatui-based terminal dashboard.
//!
//! Three read-only views over the two processed tables: a global overview,
//! a per-country drill-down and a multi-country comparison. If the
//! processed files are missing, the user is pointed at the fetch step
//! instead of rendering.

use std::collections::{HashMap, HashSet};
use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::warn;
use plotters::style::RGBColor;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs},
    Terminal,
};

use coviddash::config::Config;
use coviddash::persist;

use crate::display::format_count;
use crate::error::CoviddashCliResult;

mod chart;
mod data;

use chart::{ChartSeries, LineChart};
use data::{DashboardData, SeriesTable, TableCache};

/// Line colors handed out to chart series in order. The second element is
/// the nearest ratatui color, used for legend text.
const PALETTE: [(RGBColor, Color); 6] = [
    (RGBColor(0, 255, 255), Color::Cyan),
    (RGBColor(255, 85, 85), Color::LightRed),
    (RGBColor(0, 255, 0), Color::Green),
    (RGBColor(255, 255, 0), Color::Yellow),
    (RGBColor(255, 0, 255), Color::Magenta),
    (RGBColor(255, 255, 255), Color::White),
];

/// Start the dashboard over the processed tables.
pub fn run(config: &Config) -> CoviddashCliResult<()> {
    let processed = config.processed_dir();
    let country_path = processed.join(persist::paths::COUNTRY_DAILY);
    let global_path = processed.join(persist::paths::GLOBAL_DAILY);
    if !country_path.exists() || !global_path.exists() {
        println!("Processed data files not found. Run `coviddash fetch` first.");
        return Ok(());
    }

    let mut cache = TableCache::new();
    let data = data::load(&mut cache, config)?;

    let _guard = TerminalGuard::new()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;
    let mut app = App::new(config.clone(), cache, data);
    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> CoviddashCliResult<Self> {
        enable_raw_mode()?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(e.into());
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Overview,
    Country,
    Compare,
}

impl Tab {
    const ALL: [Tab; 3] = [Tab::Overview, Tab::Country, Tab::Compare];

    fn title(&self) -> &'static str {
        match self {
            Tab::Overview => "Overview",
            Tab::Country => "Country",
            Tab::Compare => "Compare",
        }
    }

    fn index(&self) -> usize {
        Self::ALL.iter().position(|t| t == self).unwrap_or(0)
    }

    fn next(&self) -> Tab {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    fn prev(&self) -> Tab {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Metrics the comparison view can plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareMetric {
    NewConfirmed7dma,
    NewDeaths7dma,
    Confirmed,
    Deaths,
}

const COMPARE_METRICS: [CompareMetric; 4] = [
    CompareMetric::NewConfirmed7dma,
    CompareMetric::NewDeaths7dma,
    CompareMetric::Confirmed,
    CompareMetric::Deaths,
];

impl CompareMetric {
    fn label(&self) -> &'static str {
        match self {
            CompareMetric::NewConfirmed7dma => "New cases (7-day MA)",
            CompareMetric::NewDeaths7dma => "New deaths (7-day MA)",
            CompareMetric::Confirmed => "Cumulative confirmed",
            CompareMetric::Deaths => "Cumulative deaths",
        }
    }

    /// Whether the backing column survived into the persisted table.
    fn is_available(&self, table: &SeriesTable) -> bool {
        match self {
            CompareMetric::NewConfirmed7dma => table.new_confirmed_7dma.is_some(),
            CompareMetric::NewDeaths7dma => table.new_deaths_7dma.is_some(),
            CompareMetric::Confirmed | CompareMetric::Deaths => true,
        }
    }

    fn values(&self, table: &SeriesTable) -> Option<Vec<f64>> {
        match self {
            CompareMetric::NewConfirmed7dma => table.new_confirmed_7dma.clone(),
            CompareMetric::NewDeaths7dma => table.new_deaths_7dma.clone(),
            CompareMetric::Confirmed => {
                Some(table.confirmed.iter().map(|v| *v as f64).collect())
            }
            CompareMetric::Deaths => Some(table.deaths.iter().map(|v| *v as f64).collect()),
        }
    }
}

struct App {
    config: Config,
    cache: TableCache,
    data: DashboardData,
    series_cache: HashMap<String, SeriesTable>,
    tab: Tab,
    country_index: usize,
    compare_cursor: usize,
    compare_selected: HashSet<String>,
    compare_metric: CompareMetric,
    status: String,
}

impl App {
    fn new(config: Config, cache: TableCache, data: DashboardData) -> Self {
        let compare_selected: HashSet<String> = data.countries.iter().take(2).cloned().collect();
        let compare_metric = COMPARE_METRICS
            .iter()
            .copied()
            .find(|metric| metric.is_available(&data.global))
            .unwrap_or(CompareMetric::Confirmed);
        Self {
            config,
            cache,
            data,
            series_cache: HashMap::new(),
            tab: Tab::Overview,
            country_index: 0,
            compare_cursor: 0,
            compare_selected,
            compare_metric,
            status: "Loaded processed tables.".to_string(),
        }
    }

    fn event_loop<B: ratatui::backend::Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
    ) -> CoviddashCliResult<()> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| self.draw(f))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))? {
                continue;
            }

            match event::read()? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns true when the app should quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') => return true,
            KeyCode::Right | KeyCode::Tab => self.tab = self.tab.next(),
            KeyCode::Left | KeyCode::BackTab => self.tab = self.tab.prev(),
            KeyCode::Char('1') => self.tab = Tab::Overview,
            KeyCode::Char('2') => self.tab = Tab::Country,
            KeyCode::Char('3') => self.tab = Tab::Compare,
            KeyCode::Up => self.move_selection(-1),
            KeyCode::Down => self.move_selection(1),
            KeyCode::Char(' ') => self.toggle_compare_selection(),
            KeyCode::Char('m') => self.cycle_compare_metric(),
            KeyCode::Char('r') => self.reload(),
            _ => {}
        }
        false
    }

    fn move_selection(&mut self, delta: i64) {
        let len = self.data.countries.len();
        if len == 0 {
            return;
        }
        let index = match self.tab {
            Tab::Country => &mut self.country_index,
            Tab::Compare => &mut self.compare_cursor,
            Tab::Overview => return,
        };
        let next = (*index as i64 + delta).clamp(0, len as i64 - 1);
        *index = next as usize;
    }

    fn toggle_compare_selection(&mut self) {
        if self.tab != Tab::Compare {
            return;
        }
        let Some(name) = self.data.countries.get(self.compare_cursor) else {
            return;
        };
        if !self.compare_selected.remove(name) {
            self.compare_selected.insert(name.clone());
        }
    }

    fn available_metrics(&self) -> Vec<CompareMetric> {
        COMPARE_METRICS
            .iter()
            .copied()
            .filter(|metric| metric.is_available(&self.data.global))
            .collect()
    }

    fn cycle_compare_metric(&mut self) {
        if self.tab != Tab::Compare {
            return;
        }
        let available = self.available_metrics();
        if available.is_empty() {
            return;
        }
        let pos = available
            .iter()
            .position(|metric| *metric == self.compare_metric)
            .unwrap_or(0);
        self.compare_metric = available[(pos + 1) % available.len()];
        self.status = format!("metric: {}", self.compare_metric.label());
    }

    /// Reload both tables through the mtime-keyed cache; a fetch run that
    /// rewrote the files invalidates everything at once.
    fn reload(&mut self) {
        match data::load(&mut self.cache, &self.config) {
            Ok(data) => {
                self.data = data;
                self.series_cache.clear();
                let last = self.data.countries.len().saturating_sub(1);
                self.country_index = self.country_index.min(last);
                self.compare_cursor = self.compare_cursor.min(last);
                let countries = &self.data.countries;
                self.compare_selected
                    .retain(|name| countries.contains(name));
                self.status = "Reloaded processed tables.".to_string();
            }
            Err(err) => {
                self.status = format!("Reload failed: {err}");
            }
        }
    }

    fn country_series(&mut self, name: &str) -> Option<SeriesTable> {
        if let Some(series) = self.series_cache.get(name) {
            return Some(series.clone());
        }
        match data::country_series(&self.data.country_frame, name) {
            Ok(series) => {
                self.series_cache.insert(name.to_string(), series.clone());
                Some(series)
            }
            Err(err) => {
                warn!("Failed to slice series for {name}: {err}");
                self.status = format!("Failed to load {name}: {err}");
                None
            }
        }
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
            ])
            .split(frame.area());

        self.draw_tabs(frame, chunks[0]);
        match self.tab {
            Tab::Overview => self.draw_overview(frame, chunks[1]),
            Tab::Country => self.draw_country(frame, chunks[1]),
            Tab::Compare => self.draw_compare(frame, chunks[1]),
        }
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_tabs(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let titles: Vec<&str> = Tab::ALL.iter().map(Tab::title).collect();
        let tabs = Tabs::new(titles)
            .select(self.tab.index())
            .highlight_style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
            .block(
                Block::default()
                    .title("COVID-19 Global Dashboard")
                    .borders(Borders::ALL),
            );
        frame.render_widget(tabs, area);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = match self.tab {
            Tab::Overview => "←/→ tabs  r reload  q quit",
            Tab::Country => "←/→ tabs  ↑/↓ country  r reload  q quit",
            Tab::Compare => "←/→ tabs  ↑/↓ move  space toggle  m metric  r reload  q quit",
        };
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_overview(&mut self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(12),
            ])
            .split(area);

        self.draw_global_stats(frame, chunks[0]);

        let global = &self.data.global;
        let mut series = Vec::new();
        if let Some(values) = &global.new_confirmed_7dma {
            series.push(make_series(
                "New cases (7d MA)",
                0,
                chart::date_points(&global.dates, values.iter().copied()),
            ));
        }
        if let Some(values) = &global.new_deaths_7dma {
            series.push(make_series(
                "New deaths (7d MA)",
                1,
                chart::date_points(&global.dates, values.iter().copied()),
            ));
        }
        if series.is_empty() {
            // Degrade to the raw daily series when the rolling columns are absent.
            if let Some(values) = &global.new_confirmed {
                series.push(make_series(
                    "New cases",
                    0,
                    chart::date_points(&global.dates, values.iter().map(|v| *v as f64)),
                ));
            }
        }
        render_chart_panel(
            frame,
            chunks[1],
            "Global Trend",
            series,
            chart::fmt_count_tick,
        );

        self.draw_ranking(frame, chunks[2]);
    }

    fn draw_global_stats(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default().title("Latest").borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let global = &self.data.global;
        let Some(idx) = global.latest() else {
            frame.render_widget(
                Paragraph::new("No global data.").style(Style::default().fg(Color::Yellow)),
                inner,
            );
            return;
        };

        let mut spans = vec![
            Span::styled(
                format!("{} ", global.dates[idx]),
                Style::default().fg(Color::Gray),
            ),
            Span::raw(format!(
                "Total confirmed: {}   Total deaths: {}",
                format_count(global.confirmed[idx]),
                format_count(global.deaths[idx]),
            )),
        ];
        if let Some(dma) = &global.new_confirmed_7dma {
            spans.push(Span::raw(format!(
                "   New cases (7d MA): {}",
                format_count(dma[idx].round() as i64)
            )));
        }
        if let Some(cfr) = &global.cfr {
            spans.push(Span::raw(format!("   CFR: {:.2}%", cfr[idx] * 100.0)));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), inner);
    }

    /// Latest-date confirmed counts per country, as a ranked bar list. This
    /// is the terminal stand-in for a world map.
    fn draw_ranking(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default()
            .title("Confirmed by Country (latest)")
            .borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        if inner.height == 0 {
            return;
        }

        let rows = match data::latest_by_country(&self.data.country_frame, inner.height as usize) {
            Ok((_, rows)) => rows,
            Err(err) => {
                frame.render_widget(
                    Paragraph::new(format!("Ranking unavailable: {err}"))
                        .style(Style::default().fg(Color::Yellow)),
                    inner,
                );
                return;
            }
        };

        let max = rows.iter().map(|r| r.confirmed).max().unwrap_or(1).max(1);
        let name_width = 22usize;
        let count_width = 14usize;
        let bar_width = (inner.width as usize).saturating_sub(name_width + count_width + 2);
        let lines: Vec<Line> = rows
            .iter()
            .map(|row| {
                let bar_len = ((row.confirmed as f64 / max as f64) * bar_width as f64) as usize;
                Line::from(vec![
                    Span::raw(format!("{:<name_width$.name_width$}", row.name)),
                    Span::styled("█".repeat(bar_len), Style::default().fg(Color::Red)),
                    Span::raw(format!(" {:>count_width$}", format_count(row.confirmed))),
                ])
            })
            .collect();
        frame.render_widget(Paragraph::new(lines), inner);
    }

    fn draw_country(&mut self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(26), Constraint::Min(0)])
            .split(area);

        self.draw_country_list(frame, chunks[0], self.country_index, None);

        let Some(name) = self.data.countries.get(self.country_index).cloned() else {
            return;
        };
        let Some(series) = self.country_series(&name) else {
            return;
        };

        let has_cfr = series.cfr.is_some();
        let constraints = if has_cfr {
            vec![
                Constraint::Percentage(40),
                Constraint::Percentage(30),
                Constraint::Percentage(30),
            ]
        } else {
            vec![Constraint::Percentage(50), Constraint::Percentage(50)]
        };
        let charts = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(chunks[1]);

        let cumulative = vec![
            make_series(
                "Confirmed",
                0,
                chart::date_points(&series.dates, series.confirmed.iter().map(|v| *v as f64)),
            ),
            make_series(
                "Deaths",
                1,
                chart::date_points(&series.dates, series.deaths.iter().map(|v| *v as f64)),
            ),
        ];
        render_chart_panel(
            frame,
            charts[0],
            &format!("Cumulative — {name}"),
            cumulative,
            chart::fmt_count_tick,
        );

        let mut daily = Vec::new();
        if let Some(values) = &series.new_confirmed_7dma {
            daily.push(make_series(
                "New cases (7d MA)",
                0,
                chart::date_points(&series.dates, values.iter().copied()),
            ));
        }
        if let Some(values) = &series.new_deaths_7dma {
            daily.push(make_series(
                "New deaths (7d MA)",
                1,
                chart::date_points(&series.dates, values.iter().copied()),
            ));
        }
        if daily.is_empty() {
            if let Some(values) = &series.new_confirmed {
                daily.push(make_series(
                    "New cases",
                    0,
                    chart::date_points(&series.dates, values.iter().map(|v| *v as f64)),
                ));
            }
            if let Some(values) = &series.new_deaths {
                daily.push(make_series(
                    "New deaths",
                    1,
                    chart::date_points(&series.dates, values.iter().map(|v| *v as f64)),
                ));
            }
        }
        render_chart_panel(
            frame,
            charts[1],
            &format!("Daily — {name}"),
            daily,
            chart::fmt_count_tick,
        );

        if has_cfr {
            let cfr_series = series
                .cfr
                .as_ref()
                .map(|values| {
                    vec![make_series(
                        "CFR",
                        3,
                        chart::date_points(&series.dates, values.iter().copied()),
                    )]
                })
                .unwrap_or_default();
            render_chart_panel(
                frame,
                charts[2],
                &format!("CFR — {name}"),
                cfr_series,
                chart::fmt_ratio_tick,
            );
        }
    }

    fn draw_compare(&mut self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(26), Constraint::Min(0)])
            .split(area);

        self.draw_country_list(frame, chunks[0], self.compare_cursor, Some(&self.compare_selected));

        // Iterate in display order so colors stay stable as the set changes.
        let picked: Vec<String> = self
            .data
            .countries
            .iter()
            .filter(|name| self.compare_selected.contains(*name))
            .cloned()
            .collect();

        let mut series = Vec::new();
        for (i, name) in picked.iter().enumerate() {
            let Some(table) = self.country_series(name) else {
                continue;
            };
            if let Some(values) = self.compare_metric.values(&table) {
                series.push(make_series(
                    name,
                    i,
                    chart::date_points(&table.dates, values.into_iter()),
                ));
            }
        }
        render_chart_panel(
            frame,
            chunks[1],
            self.compare_metric.label(),
            series,
            chart::fmt_count_tick,
        );
    }

    fn draw_country_list(
        &self,
        frame: &mut ratatui::Frame<'_>,
        area: Rect,
        cursor: usize,
        checked: Option<&HashSet<String>>,
    ) {
        let items: Vec<ListItem> = self
            .data
            .countries
            .iter()
            .map(|name| {
                let label = match checked {
                    Some(selected) if selected.contains(name) => format!("[x] {name}"),
                    Some(_) => format!("[ ] {name}"),
                    None => name.clone(),
                };
                ListItem::new(label)
            })
            .collect();
        let list = List::new(items)
            .block(Block::default().title("Countries").borders(Borders::ALL))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");
        let mut state = ListState::default();
        state.select(Some(cursor));
        frame.render_stateful_widget(list, area, &mut state);
    }
}

fn make_series(name: &str, palette_index: usize, points: Vec<(f64, f64)>) -> ChartSeries {
    let (color, legend_color) = PALETTE[palette_index % PALETTE.len()];
    ChartSeries {
        name: name.to_string(),
        color,
        legend_color,
        points,
    }
}

/// Bordered panel with a one-line legend above the chart. Empty series sets
/// degrade to a hint instead of an error, so views stay up when optional
/// columns are missing.
fn render_chart_panel(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    title: &str,
    series: Vec<ChartSeries>,
    fmt_y: fn(f64) -> String,
) {
    let block = Block::default().title(title).borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.height == 0 {
        return;
    }

    if series.is_empty() || series.iter().all(|s| s.points.is_empty()) {
        frame.render_widget(
            Paragraph::new("No data for this chart.").style(Style::default().fg(Color::Yellow)),
            inner,
        );
        return;
    }

    let chart_area = if inner.height > 2 {
        let mut spans = Vec::new();
        for (i, s) in series.iter().enumerate() {
            if i > 0 {
                spans.push(Span::raw("  "));
            }
            spans.push(Span::styled(
                format!("── {}", s.name),
                Style::default().fg(s.legend_color),
            ));
        }
        let legend_area = Rect { height: 1, ..inner };
        frame.render_widget(Paragraph::new(Line::from(spans)), legend_area);
        Rect {
            y: inner.y + 1,
            height: inner.height - 1,
            ..inner
        }
    } else {
        inner
    };

    let x_bounds = chart::x_axis_bounds(&series);
    let y_bounds = chart::y_axis_bounds(&series);
    frame.render_widget(
        LineChart {
            series: &series,
            x_bounds,
            y_bounds,
            fmt_x: chart::fmt_date_tick,
            fmt_y,
        },
        chart_area,
    );
}
