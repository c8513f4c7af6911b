use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    symbols::Marker,
    text::Line,
    widgets::{Axis, Block, Borders, Chart, Clear, Dataset, GraphType, Paragraph},
};
use std::io;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::analysis;
use crate::report::{PriceState, Report};
use crate::storage::{Settings, SettingsStore};

// --- App State ---

enum Outcome {
    Report(Box<Report>),
    NotFound(String),
    Failed(String),
}

struct App {
    query: String,
    months: u32,
    report: Option<Report>,
    status: Option<String>,
    is_fetching: bool,
}

impl App {
    fn from_settings(settings: Settings) -> Self {
        Self {
            query: settings.query,
            months: settings.months.clamp(1, 12),
            report: None,
            status: None,
            is_fetching: false,
        }
    }

    fn apply(&mut self, outcome: Outcome) {
        self.is_fetching = false;
        match outcome {
            Outcome::Report(report) => {
                self.status = None;
                self.report = Some(*report);
            }
            Outcome::NotFound(query) => {
                self.status = Some(format!("No ticker found for '{}'.", query));
            }
            Outcome::Failed(err) => {
                self.status = Some(format!("Fetch failed: {}", err));
            }
        }
    }
}

// --- TUI ---

pub async fn run_tui() -> Result<()> {
    let store = SettingsStore::open_relative("storage").await?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &store).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    res
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, store: &SettingsStore) -> Result<()> {
    let (data_tx, mut data_rx) = mpsc::channel::<Outcome>(1);
    let mut app = App::from_settings(store.load().await);

    loop {
        terminal.draw(|f| ui(f, &app))?;

        if let Ok(outcome) = data_rx.try_recv() {
            app.apply(outcome);
        }

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) => {
                    if !handle_key_event(key, &mut app, &data_tx) {
                        // Remember the inputs for the next session.
                        store
                            .save(&Settings {
                                query: app.query.clone(),
                                months: app.months,
                            })
                            .await
                            .ok();
                        return Ok(());
                    }
                }
                Event::Resize(_, _) => {
                    // The next terminal.draw() picks up the new size.
                }
                _ => {}
            }
        }
    }
}

fn handle_key_event(key: KeyEvent, app: &mut App, tx: &mpsc::Sender<Outcome>) -> bool {
    match key.code {
        KeyCode::Esc => return false,
        KeyCode::Enter if !app.is_fetching => {
            app.is_fetching = true;
            let query = app.query.clone();
            let months = app.months;
            let tx_clone = tx.clone();
            tokio::spawn(async move {
                let client = reqwest::Client::new();
                let outcome = match analysis::analyze(&client, &query, months).await {
                    Ok(Some(report)) => Outcome::Report(Box::new(report)),
                    Ok(None) => Outcome::NotFound(query),
                    Err(e) => Outcome::Failed(e.to_string()),
                };
                let _ = tx_clone.send(outcome).await;
            });
        }
        KeyCode::Backspace => {
            app.query.pop();
        }
        KeyCode::Left => app.months = app.months.saturating_sub(1).max(1),
        KeyCode::Right => app.months = (app.months + 1).min(12),
        KeyCode::Char(c) => app.query.push(c),
        _ => {}
    }
    true
}

// --- Rendering ---

fn ui(f: &mut Frame, app: &App) {
    let main_layout = Layout::horizontal([Constraint::Percentage(24), Constraint::Percentage(76)])
        .split(f.size());

    render_sidebar(f, app, main_layout[0]);
    render_main(f, app, main_layout[1]);

    if app.is_fetching {
        let area = centered_rect(60, 20, main_layout[1]);
        f.render_widget(Clear, area);
        f.render_widget(
            Paragraph::new("Fetching supply/demand history...\nPlease wait.")
                .block(Block::default().title("Fetching").borders(Borders::ALL))
                .alignment(Alignment::Center),
            area,
        );
    }
}

fn render_sidebar(f: &mut Frame, app: &App, area: Rect) {
    let sidebar_block = Block::default()
        .borders(Borders::ALL)
        .title("Controls")
        .title_alignment(Alignment::Center);
    let inner = sidebar_block.inner(area);
    f.render_widget(sidebar_block, area);

    let chunks = Layout::vertical([
        Constraint::Length(1), // label
        Constraint::Length(1), // query input
        Constraint::Length(1), // spacer
        Constraint::Length(1), // months selector
        Constraint::Min(0),
        Constraint::Length(3), // key hints
    ])
    .split(inner);

    f.render_widget(Paragraph::new("Ticker / company name:"), chunks[0]);
    f.render_widget(
        Paragraph::new(format!("{}_", app.query)).style(Style::default().fg(Color::Yellow)),
        chunks[1],
    );
    f.render_widget(
        Paragraph::new(format!("Window: ← {} months →", app.months)),
        chunks[3],
    );
    f.render_widget(
        Paragraph::new("Enter runs the analysis\n←/→ adjust months\nEsc quits")
            .style(Style::default().fg(Color::DarkGray)),
        chunks[5],
    );
}

fn render_main(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::vertical([
        Constraint::Length(3), // header
        Constraint::Min(0),    // charts
        Constraint::Length(4), // commentary
    ])
    .split(area);

    render_header(f, app, chunks[0]);

    match &app.report {
        Some(report) if !report.window.is_empty() => {
            let chart_chunks =
                Layout::vertical([Constraint::Percentage(55), Constraint::Percentage(45)])
                    .split(chunks[1]);
            render_price_chart(f, report, chart_chunks[0]);
            render_flow_chart(f, report, chart_chunks[1]);
            render_commentary(f, report, chunks[2]);
        }
        _ => {
            f.render_widget(
                Paragraph::new("Enter a ticker code or company name and press Enter.")
                    .alignment(Alignment::Center)
                    .block(Block::default().borders(Borders::ALL)),
                chunks[1],
            );
        }
    }
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let title = match (&app.status, &app.report) {
        (Some(status), _) => Line::from(status.clone()).style(Style::default().fg(Color::Red)),
        (None, Some(report)) => Line::from(format!(
            "{} ({})",
            report.identity.name, report.identity.code
        )),
        (None, None) => Line::from("No analysis yet"),
    };
    f.render_widget(
        Paragraph::new(title)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL)),
        area,
    );
}

fn render_price_chart(f: &mut Frame, report: &Report, area: Rect) {
    let price: Vec<(f64, f64)> = report
        .window
        .iter()
        .enumerate()
        .map(|(i, r)| (i as f64, r.record.close))
        .collect();
    let ma20: Vec<(f64, f64)> = series_of(report, |r| r.ma20);
    let upper: Vec<(f64, f64)> = series_of(report, |r| r.upper);
    let lower: Vec<(f64, f64)> = series_of(report, |r| r.lower);

    let values = price
        .iter()
        .map(|(_, y)| *y)
        .chain(upper.iter().map(|(_, y)| *y))
        .chain(lower.iter().map(|(_, y)| *y));
    let (y_min, y_max) = value_bounds(values);

    // The band envelope is drawn as its two boundary lines; the terminal
    // chart has no area fill.
    let datasets = vec![
        Dataset::default()
            .name("Upper")
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::DarkGray))
            .data(&upper),
        Dataset::default()
            .name("Lower")
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::DarkGray))
            .data(&lower),
        Dataset::default()
            .name("MA20")
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Magenta))
            .data(&ma20),
        Dataset::default()
            .name("Close")
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::White))
            .data(&price),
    ];

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Price / 20-day band"),
        )
        .x_axis(date_axis(report))
        .y_axis(value_axis(y_min, y_max));
    f.render_widget(chart, area);
}

fn render_flow_chart(f: &mut Frame, report: &Report, area: Rect) {
    let foreign: Vec<(f64, f64)> = indexed(report, |r| r.cum_foreign);
    let institution: Vec<(f64, f64)> = indexed(report, |r| r.cum_institution);
    let retail: Vec<(f64, f64)> = indexed(report, |r| r.cum_retail);

    let values = foreign
        .iter()
        .chain(institution.iter())
        .chain(retail.iter())
        .map(|(_, y)| *y)
        .chain([0.0]); // keep the zero line in view
    let (y_min, y_max) = value_bounds(values);

    let last_x = (report.window.len().saturating_sub(1)) as f64;
    let zero_line = [(0.0, 0.0), (last_x, 0.0)];

    let datasets = vec![
        Dataset::default()
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::DarkGray))
            .data(&zero_line),
        Dataset::default()
            .name("Foreign")
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Blue))
            .data(&foreign),
        Dataset::default()
            .name("Inst.")
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Green))
            .data(&institution),
        Dataset::default()
            .name("Retail")
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Red))
            .data(&retail),
    ];

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Cumulative net flow"),
        )
        .x_axis(date_axis(report))
        .y_axis(value_axis(y_min, y_max));
    f.render_widget(chart, area);
}

fn render_commentary(f: &mut Frame, report: &Report, area: Rect) {
    let state_color = match report.commentary.price_state {
        Some(PriceState::Overbought) => Color::Yellow,
        Some(PriceState::Oversold) => Color::Green,
        _ => Color::White,
    };

    let mut lines: Vec<Line> = Vec::new();
    for (i, text) in report.commentary.lines().into_iter().enumerate() {
        let mut line = Line::from(format!("• {}", text));
        if i == 0 {
            line = line.style(Style::default().fg(state_color));
        }
        lines.push(line);
    }

    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Commentary")),
        area,
    );
}

// --- Chart helpers ---

fn indexed(report: &Report, value: impl Fn(&crate::indicators::DerivedRow) -> f64) -> Vec<(f64, f64)> {
    report
        .window
        .iter()
        .enumerate()
        .map(|(i, r)| (i as f64, value(r)))
        .collect()
}

fn series_of(
    report: &Report,
    value: impl Fn(&crate::indicators::DerivedRow) -> Option<f64>,
) -> Vec<(f64, f64)> {
    report
        .window
        .iter()
        .enumerate()
        .filter_map(|(i, r)| value(r).map(|v| (i as f64, v)))
        .collect()
}

/// Shared date axis: first, middle, and last dates of the display window.
fn date_axis(report: &Report) -> Axis<'static> {
    let window = &report.window;
    let last = window.len().saturating_sub(1);
    let label = |i: usize| {
        window
            .get(i)
            .map(|r| r.record.date.format("%m-%d").to_string())
            .unwrap_or_default()
    };

    Axis::default()
        .bounds([0.0, last.max(1) as f64])
        .labels(vec![
            Span::from(label(0)),
            Span::from(label(last / 2)),
            Span::from(label(last)),
        ])
        .style(Style::default().fg(Color::DarkGray))
}

fn value_axis(y_min: f64, y_max: f64) -> Axis<'static> {
    let mid = (y_min + y_max) / 2.0;
    Axis::default()
        .bounds([y_min, y_max])
        .labels(vec![
            Span::from(format!("{:.0}", y_min)),
            Span::from(format!("{:.0}", mid)),
            Span::from(format!("{:.0}", y_max)),
        ])
        .style(Style::default().fg(Color::DarkGray))
}

/// Min/max over the plotted values with a little headroom so lines do not
/// sit on the chart border. Degenerate (flat) series get a unit of padding.
fn value_bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        min = min.min(v);
        max = max.max(v);
    }
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    let pad = ((max - min) * 0.05).max(1.0);
    (min - pad, max + pad)
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .split(r);
    Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_bounds_pad_the_extremes() {
        let (min, max) = value_bounds([10.0, 110.0].into_iter());
        assert!(min < 10.0);
        assert!(max > 110.0);
    }

    #[test]
    fn flat_series_still_gets_a_visible_range() {
        let (min, max) = value_bounds([50.0, 50.0].into_iter());
        assert!(max - min >= 2.0);
    }

    #[test]
    fn empty_series_falls_back_to_a_unit_range() {
        let (min, max) = value_bounds(std::iter::empty());
        assert_eq!((min, max), (0.0, 1.0));
    }

    #[test]
    fn months_selector_is_clamped() {
        let mut app = App::from_settings(Settings {
            query: String::new(),
            months: 1,
        });
        let (tx, _rx) = mpsc::channel(1);

        let left = KeyEvent::from(KeyCode::Left);
        handle_key_event(left, &mut app, &tx);
        assert_eq!(app.months, 1);

        let right = KeyEvent::from(KeyCode::Right);
        for _ in 0..20 {
            handle_key_event(right, &mut app, &tx);
        }
        assert_eq!(app.months, 12);
    }

    #[test]
    fn typing_and_backspace_edit_the_query() {
        let mut app = App::from_settings(Settings {
            query: String::new(),
            months: 6,
        });
        let (tx, _rx) = mpsc::channel(1);

        for c in "005930".chars() {
            handle_key_event(KeyEvent::from(KeyCode::Char(c)), &mut app, &tx);
        }
        assert_eq!(app.query, "005930");

        handle_key_event(KeyEvent::from(KeyCode::Backspace), &mut app, &tx);
        assert_eq!(app.query, "00593");
    }
}
