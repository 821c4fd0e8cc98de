use anyhow::Result;
use chrono::{DateTime, Local, TimeZone, Utc};
use crossterm::{
    cursor::Show,
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame, Terminal,
};
use std::fmt::Display;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::api::{self, RateSource};
use crate::models::{CurrentRate, Interval, RateSample, TimeRange};
use crate::pipeline::{prepare_series, ChartSeries, ViewSelection};

const ACCENT: Color = Color::Rgb(63, 81, 181);
const TICK: Duration = Duration::from_millis(100);

/// Result of one of the start-up fetches
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Current(CurrentRate),
    History(Vec<RateSample>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

/// State behind the dashboard. Each panel stays `None` (loading) until its fetch succeeds.
pub struct Dashboard {
    current: Option<CurrentRate>,
    history: Option<Vec<RateSample>>,
    selection: ViewSelection,
    series: Option<ChartSeries>,
}

impl Dashboard {
    pub fn new(selection: ViewSelection) -> Dashboard {
        Dashboard {
            current: None,
            history: None,
            selection,
            series: None,
        }
    }

    pub fn selection(&self) -> ViewSelection {
        self.selection
    }

    pub fn current(&self) -> Option<&CurrentRate> {
        self.current.as_ref()
    }

    pub fn series(&self) -> Option<&ChartSeries> {
        self.series.as_ref()
    }

    pub fn apply(&mut self, outcome: FetchOutcome) {
        self.apply_at(outcome, Utc::now(), &Local);
    }

    pub fn apply_at<Tz>(&mut self, outcome: FetchOutcome, now: DateTime<Utc>, tz: &Tz)
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        match outcome {
            FetchOutcome::Current(rate) => self.current = Some(rate),
            FetchOutcome::History(samples) => {
                self.history = Some(samples);
                self.refresh_at(now, tz);
            }
        }
    }

    /// Recompute the chart from the full fetched history
    pub fn refresh_at<Tz>(&mut self, now: DateTime<Utc>, tz: &Tz)
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        if let Some(history) = &self.history {
            self.series = Some(prepare_series(history, self.selection, now, tz));
        }
    }

    /// Returns true when the selection actually changed
    pub fn select_range(&mut self, range: TimeRange) -> bool {
        let changed = self.selection.range != range;
        self.selection = self.selection.with_range(range);
        changed
    }

    /// Returns true when the selection actually changed
    pub fn select_interval(&mut self, interval: Interval) -> bool {
        let changed = self.selection.interval != interval;
        self.selection = self.selection.with_interval(interval);
        changed
    }

    pub fn handle_key(&mut self, code: KeyCode) -> Control {
        let changed = match code {
            KeyCode::Char('q') | KeyCode::Esc => return Control::Quit,
            KeyCode::Char('1') | KeyCode::Char('h') => self.select_range(TimeRange::LastHour),
            KeyCode::Char('2') | KeyCode::Char('d') => self.select_range(TimeRange::Last24Hours),
            KeyCode::Char('3') | KeyCode::Char('w') => self.select_range(TimeRange::LastWeek),
            KeyCode::Char('4') | KeyCode::Char('a') => self.select_range(TimeRange::AllTime),
            KeyCode::Char('m') => self.select_interval(Interval::Minute),
            KeyCode::Char('H') => self.select_interval(Interval::Hour),
            KeyCode::Char('D') => self.select_interval(Interval::Day),
            KeyCode::Right => self.select_interval(self.selection.interval.next()),
            KeyCode::Left => self.select_interval(self.selection.interval.previous()),
            _ => false,
        };

        if changed {
            self.refresh_at(Utc::now(), &Local);
        }
        Control::Continue
    }
}

/// Start both fetches on their own tasks. A failed fetch sends nothing.
pub fn spawn_fetches(source: Arc<dyn RateSource>, tx: UnboundedSender<FetchOutcome>) {
    let current_source = Arc::clone(&source);
    let current_tx = tx.clone();
    tokio::spawn(async move {
        if let Some(rate) = api::load_current_rate(current_source.as_ref()).await {
            let _ = current_tx.send(FetchOutcome::Current(rate));
        }
    });

    tokio::spawn(async move {
        if let Some(samples) = api::load_historical_rates(source.as_ref()).await {
            let _ = tx.send(FetchOutcome::History(samples));
        }
    });
}

pub fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    mut app: Dashboard,
    mut rx: UnboundedReceiver<FetchOutcome>,
) -> Result<()> {
    loop {
        while let Ok(outcome) = rx.try_recv() {
            app.apply(outcome);
        }

        terminal.draw(|f| draw_ui(f, &app))?;

        if event::poll(TICK)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && app.handle_key(key.code) == Control::Quit {
                    return Ok(());
                }
            }
        }
    }
}

fn draw_ui(f: &mut Frame, app: &Dashboard) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(5),
            Constraint::Min(10),
            Constraint::Length(1),
        ])
        .split(f.size());

    let title = Paragraph::new("Puffer Tracker")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, chunks[0]);

    draw_current_rate(f, app, chunks[1]);
    draw_history(f, app, chunks[2]);

    let help = Paragraph::new("1-4 / h d w a: time range   m H D / ←→: interval   q: quit")
        .style(Style::default().fg(Color::DarkGray));
    f.render_widget(help, chunks[3]);
}

fn draw_current_rate(f: &mut Frame, app: &Dashboard, area: Rect) {
    let mut lines = vec![Line::from(Span::styled(
        current_rate_text(app.current()),
        Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
    ))];
    if let Some(as_of) = app.current().and_then(|rate| rate.as_of) {
        lines.push(Line::from(format!(
            "as of {}",
            as_of.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        )));
    }

    let panel = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .title("Current Conversion Rate")
                .borders(Borders::ALL),
        );
    f.render_widget(panel, area);
}

/// Rate with four decimals, or the loading placeholder
pub fn current_rate_text(rate: Option<&CurrentRate>) -> String {
    match rate {
        Some(rate) => format!("{:.4}", rate.conversion_rate),
        None => "Loading...".to_string(),
    }
}

fn selector_line<T: Copy + PartialEq>(
    heading: &str,
    options: &[T],
    active: T,
    label: impl Fn(T) -> &'static str,
) -> Line<'static> {
    let mut spans = vec![Span::raw(format!("{:<12}", heading))];
    for option in options {
        let style = if *option == active {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD | Modifier::REVERSED)
        } else {
            Style::default()
        };
        spans.push(Span::styled(format!(" {} ", label(*option)), style));
        spans.push(Span::raw(" "));
    }
    Line::from(spans)
}

fn draw_history(f: &mut Frame, app: &Dashboard, area: Rect) {
    let block = Block::default()
        .title("Historical Conversion Rates")
        .borders(Borders::ALL);

    let Some(series) = app.series() else {
        f.render_widget(Paragraph::new("Loading historical data...").block(block), area);
        return;
    };

    let inner = block.inner(area);
    f.render_widget(block, area);

    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(5)])
        .split(inner);

    let selection = app.selection();
    let controls = Paragraph::new(vec![
        selector_line("Time range", &TimeRange::ALL, selection.range, TimeRange::label),
        selector_line("Interval", &Interval::ALL, selection.interval, Interval::label),
    ]);
    f.render_widget(controls, parts[0]);

    let Some((y_min, y_max)) = series.value_bounds() else {
        f.render_widget(
            Paragraph::new("No samples in the selected time range").alignment(Alignment::Center),
            parts[1],
        );
        return;
    };

    let points = series.points();
    let x_max = (series.len().saturating_sub(1)).max(1) as f64;
    let datasets = vec![Dataset::default()
        .name(series.title.clone())
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(ACCENT))
        .data(&points)];

    let last = series.len().saturating_sub(1);
    let x_labels = [0, last / 2, last]
        .iter()
        .map(|i| Span::raw(series.labels.get(*i).cloned().unwrap_or_default()))
        .collect();
    let y_labels = vec![
        Span::raw(format!("{:.4}", y_min)),
        Span::raw(format!("{:.4}", (y_min + y_max) / 2.0)),
        Span::raw(format!("{:.4}", y_max)),
    ];

    let chart = Chart::new(datasets)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, x_max])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([y_min, y_max])
                .labels(y_labels),
        );
    f.render_widget(chart, parts[1]);
}

/// Runs its closure when dropped, so it also fires on early returns and panics
struct OnDrop<F: FnMut()>(F);

impl<F: FnMut()> Drop for OnDrop<F> {
    fn drop(&mut self) {
        (self.0)()
    }
}

fn restore_terminal() {
    if let Err(e) = disable_raw_mode() {
        tracing::warn!("Failed to disable raw mode: {}", e);
    }
    if let Err(e) = execute!(io::stdout(), LeaveAlternateScreen, Show) {
        tracing::warn!("Failed to leave the alternate screen: {}", e);
    }
}

/// Open the terminal, start both fetches and run the dashboard until the user quits
pub async fn start_dashboard(source: Arc<dyn RateSource>, selection: ViewSelection) -> Result<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    spawn_fetches(source, tx);

    tokio::task::spawn_blocking(move || -> Result<()> {
        enable_raw_mode()?;
        let _restore = OnDrop(restore_terminal);

        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        run_app(&mut terminal, Dashboard::new(selection), rx)
    })
    .await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{FetchError, MockRateSource};
    use chrono::Duration as ChronoDuration;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 8, 12, 0, 0).unwrap()
    }

    fn history() -> Vec<RateSample> {
        (0..(10 * 24))
            .map(|hours_ago| {
                RateSample::new(
                    now() - ChronoDuration::hours(hours_ago),
                    1.0 + hours_ago as f64 / 1000.0,
                )
            })
            .collect()
    }

    #[test]
    fn test_panels_start_loading() {
        let app = Dashboard::new(ViewSelection::default());
        assert!(app.current().is_none());
        assert!(app.series().is_none());
        assert_eq!(current_rate_text(app.current()), "Loading...");
    }

    #[test]
    fn test_current_rate_text() {
        let rate = CurrentRate {
            conversion_rate: 1.023456,
            as_of: None,
        };
        assert_eq!(current_rate_text(Some(&rate)), "1.0235");
    }

    #[test]
    fn test_history_outcome_builds_series() {
        let mut app = Dashboard::new(ViewSelection::new(TimeRange::AllTime, Interval::Day));
        app.apply_at(FetchOutcome::History(history()), now(), &Utc);

        let series = app.series().unwrap();
        let total: usize = series.buckets.iter().map(|b| b.samples).sum();
        assert_eq!(total, 240);
        assert_eq!(series.title, "Conversion Rate Over Time (day)");
    }

    #[test]
    fn test_selection_changes_recompute_from_full_history() {
        let mut app = Dashboard::new(ViewSelection::default());
        app.apply_at(FetchOutcome::History(history()), now(), &Utc);

        assert!(app.select_interval(Interval::Hour));
        assert!(app.select_range(TimeRange::Last24Hours));
        app.refresh_at(now(), &Utc);
        assert_eq!(app.series().unwrap().len(), 25);

        assert!(app.select_range(TimeRange::LastWeek));
        app.refresh_at(now(), &Utc);
        assert_eq!(app.series().unwrap().len(), 7 * 24 + 1);

        assert!(app.select_range(TimeRange::AllTime));
        app.refresh_at(now(), &Utc);
        assert_eq!(app.series().unwrap().len(), 240);

        assert!(!app.select_range(TimeRange::AllTime));
    }

    #[test]
    fn test_key_bindings() {
        let mut app = Dashboard::new(ViewSelection::default());

        assert_eq!(app.handle_key(KeyCode::Char('2')), Control::Continue);
        assert_eq!(app.selection().range, TimeRange::Last24Hours);
        app.handle_key(KeyCode::Char('w'));
        assert_eq!(app.selection().range, TimeRange::LastWeek);

        app.handle_key(KeyCode::Char('D'));
        assert_eq!(app.selection().interval, Interval::Day);
        app.handle_key(KeyCode::Right);
        assert_eq!(app.selection().interval, Interval::Minute);
        app.handle_key(KeyCode::Left);
        assert_eq!(app.selection().interval, Interval::Day);

        // no history yet, so the chart stays in its loading state
        assert!(app.series().is_none());

        assert_eq!(app.handle_key(KeyCode::Char('q')), Control::Quit);
        assert_eq!(app.handle_key(KeyCode::Esc), Control::Quit);
    }

    #[test]
    fn test_on_drop_runs_on_error_and_panic() {
        use std::cell::Cell;
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let restored = Cell::new(0);

        let failed = (|| -> Result<()> {
            let _guard = OnDrop(|| restored.set(restored.get() + 1));
            anyhow::bail!("terminal unavailable")
        })();
        assert!(failed.is_err());
        assert_eq!(restored.get(), 1);

        let panicked = catch_unwind(AssertUnwindSafe(|| {
            let _guard = OnDrop(|| restored.set(restored.get() + 1));
            panic!("draw failed");
        }));
        assert!(panicked.is_err());
        assert_eq!(restored.get(), 2);
    }

    #[tokio::test]
    async fn test_spawn_fetches_delivers_successes_only() {
        let mut source = MockRateSource::new();
        source.expect_fetch_current_rate().times(1).returning(|| {
            Ok(CurrentRate {
                conversion_rate: 1.0213,
                as_of: None,
            })
        });
        source.expect_fetch_historical_rates().times(1).returning(|| {
            Err(FetchError::Status {
                url: "http://127.0.0.1:5000/historical-rates".to_string(),
                status: 500,
                message: "mongo unavailable".to_string(),
            })
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn_fetches(Arc::new(source), tx);

        let mut outcomes = Vec::new();
        while let Some(outcome) = rx.recv().await {
            outcomes.push(outcome);
        }

        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], FetchOutcome::Current(_)));

        let mut app = Dashboard::new(ViewSelection::default());
        for outcome in outcomes {
            app.apply_at(outcome, now(), &Utc);
        }
        assert_eq!(current_rate_text(app.current()), "1.0213");
        assert!(app.series().is_none());
    }
}
