use anyhow::Result;
use chrono::Local;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use kambio::{
    change_breakdown, chart_bounds, chart_series, conversions, format_bs, format_for_exact_copy,
    fetch_with_retry, format_result, format_usd, load_alerts, load_last_rates, parse_currency_input,
    rates_summary, remaining_after_cash, sanitize_amount_input, save_alerts, save_last_rates,
    trend_description, AlertList, BestOptionBadge, ChangeBreakdown, ConversionMode,
    HistoryResponse, Period, QueryCache, QueryKey, QueryPolicy, RateProvider, Rates, Series,
    ThresholdType,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Block, Borders, Cell, Chart, Clear, Dataset, GraphType, List, ListItem, ListState,
        Paragraph, Row, Table, Wrap,
    },
    Frame, Terminal,
};
use rusqlite::Connection;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How long the loop waits for a key before polling again
const TICK_RATE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Rates,
    Calculator,
    Change,
    MixedPayment,
    History,
    Alerts,
}

impl Page {
    pub const ALL: [Page; 6] = [
        Page::Rates,
        Page::Calculator,
        Page::Change,
        Page::MixedPayment,
        Page::History,
        Page::Alerts,
    ];

    pub fn next(&self) -> Self {
        match self {
            Page::Rates => Page::Calculator,
            Page::Calculator => Page::Change,
            Page::Change => Page::MixedPayment,
            Page::MixedPayment => Page::History,
            Page::History => Page::Alerts,
            Page::Alerts => Page::Rates,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Rates => Page::Alerts,
            Page::Calculator => Page::Rates,
            Page::Change => Page::Calculator,
            Page::MixedPayment => Page::Change,
            Page::History => Page::MixedPayment,
            Page::Alerts => Page::History,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Rates => "Rates",
            Page::Calculator => "Calculator",
            Page::Change => "Change",
            Page::MixedPayment => "Mixed Payment",
            Page::History => "History",
            Page::Alerts => "Alerts",
        }
    }
}

/// Which of the two amount fields has the cursor (Change / Mixed Payment)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    First,
    Second,
}

impl Field {
    fn other(&self) -> Self {
        match self {
            Field::First => Field::Second,
            Field::Second => Field::First,
        }
    }
}

/// Result of a fetch run on a worker thread
enum Fetched {
    Rates(Result<Rates>),
    History(u32, Result<HistoryResponse>),
}

pub struct App {
    provider: Arc<dyn RateProvider>,
    conn: Connection,
    rates_cache: QueryCache<Rates>,
    history_cache: QueryCache<HistoryResponse>,
    fetched_tx: Sender<Fetched>,
    fetched_rx: Receiver<Fetched>,
    in_flight: usize,
    pub rates: Option<Rates>,
    pub rates_error: Option<String>,
    pub period: Period,
    pub history_error: Option<String>,
    pub alerts: AlertList,
    pub alerts_state: ListState,
    pub current_page: Page,
    pub mode: ConversionMode,
    pub amount_input: String,
    pub preset_index: usize,
    pub price_input: String,
    pub given_input: String,
    pub total_input: String,
    pub cash_input: String,
    pub focus: Field,
    pub new_alert_input: String,
    pub new_alert_type: ThresholdType,
    pub show_share: bool,
    pub status: Option<String>,
}

impl App {
    pub fn new(provider: Box<dyn RateProvider>, conn: Connection) -> Result<Self> {
        let alerts = load_alerts(&conn)?;
        let rates = load_last_rates(&conn)?;

        let mut alerts_state = ListState::default();
        if !alerts.is_empty() {
            alerts_state.select(Some(0));
        }

        tracing::info!(provider = provider.name(), alerts = alerts.len(), cached_rates = rates.is_some(), "app ready");

        let (fetched_tx, fetched_rx) = mpsc::channel();

        Ok(Self {
            provider: Arc::from(provider),
            conn,
            rates_cache: QueryCache::new(QueryPolicy::rates()),
            history_cache: QueryCache::new(QueryPolicy::history()),
            fetched_tx,
            fetched_rx,
            in_flight: 0,
            rates,
            rates_error: None,
            period: Period::default(),
            history_error: None,
            alerts,
            alerts_state,
            current_page: Page::Rates,
            mode: ConversionMode::default(),
            amount_input: String::new(),
            preset_index: 0,
            price_input: String::new(),
            given_input: String::new(),
            total_input: String::new(),
            cash_input: String::new(),
            focus: Field::First,
            new_alert_input: String::new(),
            new_alert_type: ThresholdType::Above,
            show_share: false,
            status: None,
        })
    }

    // ------------------------------------------------------------------------
    // Data
    // ------------------------------------------------------------------------

    /// Poll-loop hook: apply finished fetches, start the ones that are due
    pub fn tick(&mut self) {
        while let Ok(fetched) = self.fetched_rx.try_recv() {
            self.apply_fetched(fetched);
        }

        if self.rates_cache.needs_refetch(QueryKey::Rates) {
            self.refresh_rates(false);
        }

        if self.current_page == Page::History && self.history().is_none() && self.history_error.is_none() {
            self.load_history();
        }
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    /// Start a rates fetch in the background unless one is running
    pub fn refresh_rates(&mut self, force: bool) {
        if force {
            self.rates_cache.invalidate(QueryKey::Rates);
        }
        if !self.rates_cache.begin(QueryKey::Rates) {
            return;
        }

        let provider = Arc::clone(&self.provider);
        let policy = self.rates_cache.policy().clone();
        self.spawn_fetch(move || {
            Fetched::Rates(fetch_with_retry(QueryKey::Rates, &policy, || provider.fetch_rates()))
        });
    }

    /// Start a history fetch for the selected period unless it is fresh
    pub fn load_history(&mut self) {
        let days = self.period.days();
        let key = QueryKey::History(days);
        if self.history_cache.fresh_data(key).is_some() || !self.history_cache.begin(key) {
            return;
        }

        let provider = Arc::clone(&self.provider);
        let policy = self.history_cache.policy().clone();
        self.spawn_fetch(move || {
            Fetched::History(days, fetch_with_retry(key, &policy, || provider.fetch_history(days)))
        });
    }

    fn spawn_fetch<F>(&mut self, job: F)
    where
        F: FnOnce() -> Fetched + Send + 'static,
    {
        let tx = self.fetched_tx.clone();
        self.in_flight += 1;
        thread::spawn(move || {
            // The receiver only goes away when the app shuts down
            let _ = tx.send(job());
        });
    }

    fn apply_fetched(&mut self, fetched: Fetched) {
        self.in_flight = self.in_flight.saturating_sub(1);

        match fetched {
            Fetched::Rates(result) => match self.rates_cache.resolve(QueryKey::Rates, result) {
                Ok(rates) => {
                    if let Err(err) = save_last_rates(&self.conn, &rates) {
                        tracing::warn!(error = %err, "could not cache rates");
                    }
                    self.rates = Some(rates);
                    self.rates_error = None;
                    self.check_alerts();
                }
                Err(err) => {
                    self.rates_error = Some(format!("{:#}", err));
                }
            },
            Fetched::History(days, result) => {
                let result = self.history_cache.resolve(QueryKey::History(days), result);
                if days == self.period.days() {
                    self.history_error = result.err().map(|err| format!("{:#}", err));
                }
            }
        }
    }

    pub fn history(&self) -> Option<HistoryResponse> {
        self.history_cache.data(QueryKey::History(self.period.days()))
    }

    pub fn set_period(&mut self, period: Period) {
        if self.period != period {
            self.period = period;
            self.history_error = None;
            self.load_history();
        }
    }

    fn check_alerts(&mut self) {
        let Some(rate) = self.rates.as_ref().map(|r| r.primary_rate()) else {
            return;
        };

        let fired = self.alerts.check(rate);
        if fired.is_empty() {
            return;
        }

        if let Err(err) = save_alerts(&self.conn, &self.alerts) {
            tracing::error!(error = %err, "could not save triggered alerts");
        }

        let messages: Vec<String> = fired.iter().map(|n| n.message()).collect();
        self.status = Some(format!("🔔 {}", messages.join(" | ")));
    }

    // ------------------------------------------------------------------------
    // Calculator screens
    // ------------------------------------------------------------------------

    pub fn calculator_amount(&self) -> f64 {
        parse_currency_input(&self.amount_input)
    }

    pub fn toggle_mode(&mut self) {
        self.mode = self.mode.toggled();
        self.amount_input.clear();
        self.preset_index = 0;
    }

    /// Cycle through the quick amounts of the current mode
    pub fn next_preset(&mut self) {
        let presets = self.mode.quick_amounts();
        self.amount_input = presets[self.preset_index % presets.len()].to_string();
        self.preset_index = (self.preset_index + 1) % presets.len();
    }

    /// Exact-copy form of the BCV USD result, shown in the status bar
    pub fn copy_result(&mut self) {
        let Some(rates) = &self.rates else {
            return;
        };
        let rows = conversions(self.calculator_amount(), self.mode, rates);
        if let Some(first) = rows.first() {
            self.status = Some(format!("📋 {}: {}", first.label, format_for_exact_copy(first.result)));
        }
    }

    pub fn change_result(&self) -> Option<ChangeBreakdown> {
        let rates = self.rates.as_ref()?;
        Some(change_breakdown(
            parse_currency_input(&self.price_input),
            parse_currency_input(&self.given_input),
            rates.active_rate(),
        ))
    }

    pub fn mixed_result(&self) -> Option<ChangeBreakdown> {
        let rates = self.rates.as_ref()?;
        Some(remaining_after_cash(
            parse_currency_input(&self.total_input),
            parse_currency_input(&self.cash_input),
            rates.active_rate(),
        ))
    }

    pub fn share_text(&self) -> Option<String> {
        self.rates.as_ref().map(|r| rates_summary(r, &Local::now()))
    }

    fn focused_input(&mut self) -> Option<&mut String> {
        match (self.current_page, self.focus) {
            (Page::Calculator, _) => Some(&mut self.amount_input),
            (Page::Change, Field::First) => Some(&mut self.price_input),
            (Page::Change, Field::Second) => Some(&mut self.given_input),
            (Page::MixedPayment, Field::First) => Some(&mut self.total_input),
            (Page::MixedPayment, Field::Second) => Some(&mut self.cash_input),
            (Page::Alerts, _) => Some(&mut self.new_alert_input),
            _ => None,
        }
    }

    pub fn type_char(&mut self, c: char) {
        let accepted = sanitize_amount_input(&c.to_string());
        if let Some(input) = self.focused_input() {
            input.push_str(&accepted);
        }
    }

    pub fn backspace(&mut self) {
        if let Some(input) = self.focused_input() {
            input.pop();
        }
    }

    // ------------------------------------------------------------------------
    // Alerts screen
    // ------------------------------------------------------------------------

    pub fn create_alert(&mut self) {
        match self.alerts.create(self.new_alert_type, &self.new_alert_input) {
            Ok(alert) => {
                self.status = Some(format!("✅ Alert created: {}", alert.describe()));
                self.new_alert_input.clear();
                self.alerts_state.select(Some(self.alerts.len() - 1));
                if let Err(err) = save_alerts(&self.conn, &self.alerts) {
                    self.status = Some(format!("❌ {:#}", err));
                }
            }
            Err(err) => self.status = Some(format!("❌ {}", err)),
        }
    }

    fn selected_alert_id(&self) -> Option<String> {
        self.alerts_state
            .selected()
            .and_then(|i| self.alerts.alerts().get(i))
            .map(|a| a.id.clone())
    }

    pub fn toggle_selected_alert(&mut self) {
        let Some(id) = self.selected_alert_id() else {
            return;
        };
        let result = self
            .alerts
            .toggle(&id)
            .and_then(|_| save_alerts(&self.conn, &self.alerts));
        if let Err(err) = result {
            self.status = Some(format!("❌ {:#}", err));
        }
    }

    pub fn delete_selected_alert(&mut self) {
        let Some(id) = self.selected_alert_id() else {
            return;
        };
        let result = self
            .alerts
            .delete(&id)
            .and_then(|removed| {
                save_alerts(&self.conn, &self.alerts)?;
                Ok(removed)
            });

        match result {
            Ok(removed) => self.status = Some(format!("🗑️  Deleted {}", removed.describe())),
            Err(err) => self.status = Some(format!("❌ {:#}", err)),
        }

        let len = self.alerts.len();
        let selected = match self.alerts_state.selected() {
            _ if len == 0 => None,
            Some(i) if i >= len => Some(len - 1),
            other => other,
        };
        self.alerts_state.select(selected);
    }

    pub fn next_alert(&mut self) {
        let len = self.alerts.len();
        if len == 0 {
            return;
        }
        let i = match self.alerts_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.alerts_state.select(Some(i));
    }

    pub fn previous_alert(&mut self) {
        let len = self.alerts.len();
        if len == 0 {
            return;
        }
        let i = match self.alerts_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.alerts_state.select(Some(i));
    }

    // ------------------------------------------------------------------------
    // Keys
    // ------------------------------------------------------------------------

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
        self.focus = Field::First;
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
        self.focus = Field::First;
    }

    /// Returns true when the app should quit
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.show_share {
            self.show_share = false;
            return false;
        }

        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Tab => self.next_page(),
            KeyCode::BackTab => self.previous_page(),
            KeyCode::F(5) => self.refresh_rates(true),
            KeyCode::Char('s') => self.show_share = self.rates.is_some(),
            KeyCode::Backspace => self.backspace(),
            _ => self.handle_page_key(key),
        }
        false
    }

    fn handle_page_key(&mut self, key: KeyEvent) {
        match (self.current_page, key.code) {
            (Page::Rates, KeyCode::Char('r')) => self.refresh_rates(true),

            (Page::Calculator, KeyCode::Char('m')) => self.toggle_mode(),
            (Page::Calculator, KeyCode::Char('p')) => self.next_preset(),
            (Page::Calculator, KeyCode::Char('y')) => self.copy_result(),

            (Page::Change | Page::MixedPayment, KeyCode::Up | KeyCode::Down | KeyCode::Enter) => {
                self.focus = self.focus.other();
            }

            (Page::History, KeyCode::Char('1')) => self.set_period(Period::Week),
            (Page::History, KeyCode::Char('2')) => self.set_period(Period::Month),
            (Page::History, KeyCode::Char('3')) => self.set_period(Period::Quarter),
            (Page::History, KeyCode::Char('r')) => {
                self.history_cache.invalidate(QueryKey::History(self.period.days()));
                self.load_history();
            }

            (Page::Alerts, KeyCode::Char('t')) => self.new_alert_type = self.new_alert_type.toggled(),
            (Page::Alerts, KeyCode::Enter) => self.create_alert(),
            (Page::Alerts, KeyCode::Down) => self.next_alert(),
            (Page::Alerts, KeyCode::Up) => self.previous_alert(),
            (Page::Alerts, KeyCode::Char(' ')) => self.toggle_selected_alert(),
            (Page::Alerts, KeyCode::Delete | KeyCode::Char('d')) => self.delete_selected_alert(),

            (_, KeyCode::Char(c)) => self.type_char(c),
            _ => {}
        }
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!(error = %err, "UI loop failed");
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if event::poll(TICK_RATE)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && app.handle_key(key) {
                    return Ok(());
                }
            }
        }

        app.tick();
    }
}

// ============================================================================
// Rendering
// ============================================================================

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Rates => render_rates(f, chunks[1], app),
        Page::Calculator => render_calculator(f, chunks[1], app),
        Page::Change => render_change(f, chunks[1], app),
        Page::MixedPayment => render_mixed(f, chunks[1], app),
        Page::History => render_history(f, chunks[1], app),
        Page::Alerts => render_alerts(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);

    if app.show_share {
        render_share(f, app);
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in Page::ALL.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }
        let style = if *page == app.current_page {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    if let Some(rates) = &app.rates {
        tab_spans.push(Span::raw("   "));
        tab_spans.push(Span::styled(
            format!("BCV {:.2}", rates.primary_rate()),
            Style::default().fg(Color::Green),
        ));
    }

    let header = Paragraph::new(Line::from(tab_spans))
        .block(Block::default().borders(Borders::ALL).title(" 💱 Kambio "));
    f.render_widget(header, area);
}

fn render_rates(f: &mut Frame, area: Rect, app: &App) {
    let mut lines = vec![];

    match &app.rates {
        Some(rates) => {
            let best = rates.best_option();
            let rows = [
                ("🏦 BCV Dólar", rates.primary_rate(), best == kambio::BestOption::Bcv),
                ("🏦 BCV Euro", rates.secondary_rate(), false),
                ("🔷 Binance P2P", rates.alternate_rate(), best == kambio::BestOption::Binance),
            ];
            for (label, rate, is_best) in rows {
                let style = if is_best {
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                lines.push(Line::from(vec![
                    Span::raw(format!("{:<16}", label)),
                    Span::styled(format_bs(rate), style),
                ]));
            }
            lines.push(Line::from(""));

            if let Some(badge) = BestOptionBadge::from_rates(rates.primary_rate(), rates.alternate_rate()) {
                lines.push(Line::from(Span::styled(
                    format!(
                        "💡 Paying with {} is {:.1}% cheaper today",
                        badge.cheapest.label(),
                        badge.percent_cheaper
                    ),
                    Style::default().fg(Color::Cyan),
                )));
            }
            lines.push(Line::from(format!(
                "🕐 Updated {}",
                rates.last_updated.with_timezone(&Local).format("%d/%m/%Y %H:%M")
            )));
        }
        None => lines.push(Line::from("⏳ Loading rates...")),
    }

    if let Some(err) = &app.rates_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("⚠️  Connection error: {}", err),
            Style::default().fg(Color::Red),
        )));
    }

    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(" Today "));
    f.render_widget(paragraph, area);
}

fn input_line<'a>(label: &'a str, value: &'a str, placeholder: &'a str, focused: bool) -> Line<'a> {
    let marker = if focused { "▶ " } else { "  " };
    let value_span = if value.is_empty() {
        Span::styled(placeholder, Style::default().fg(Color::DarkGray))
    } else {
        Span::styled(value, Style::default().add_modifier(Modifier::BOLD))
    };
    Line::from(vec![Span::raw(marker), Span::raw(label), value_span])
}

fn render_calculator(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Min(0)])
        .split(area);

    let amount = app.calculator_amount();
    let echo = kambio::calculator::format_input_echo(amount, app.mode);
    let presets = app.mode.quick_amounts().join("  ");

    let input = Paragraph::new(vec![
        input_line("Amount: ", &app.amount_input, app.mode.placeholder(), true),
        Line::from(format!("  Value: {}", if echo.is_empty() { "-" } else { echo.as_str() })),
        Line::from(format!("  Quick amounts (p): {}", presets)),
    ])
    .block(Block::default().borders(Borders::ALL).title(format!(" {} (m to switch) ", app.mode.label())));
    f.render_widget(input, chunks[0]);

    let Some(rates) = &app.rates else {
        let waiting = Paragraph::new("⏳ Waiting for rates...")
            .block(Block::default().borders(Borders::ALL).title(" Results "));
        f.render_widget(waiting, chunks[1]);
        return;
    };

    let rows: Vec<Row> = conversions(amount, app.mode, rates)
        .into_iter()
        .map(|row| {
            Row::new(vec![
                Cell::from(row.label),
                Cell::from(format!("{:.2}", row.rate)),
                Cell::from(format_result(row.result, app.mode)),
                Cell::from(format_for_exact_copy(row.result)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(14),
            Constraint::Length(10),
            Constraint::Length(22),
            Constraint::Min(12),
        ],
    )
    .header(
        Row::new(vec!["Rate", "Value", "Result", "Copy (y)"])
            .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title(" Results "));
    f.render_widget(table, chunks[1]);
}

fn render_breakdown(
    f: &mut Frame,
    area: Rect,
    title: &str,
    fields: [(&str, &str); 2],
    focus: Field,
    result: Option<ChangeBreakdown>,
    result_labels: (&str, &str),
) {
    let mut lines = vec![
        input_line(fields[0].0, fields[0].1, "0.00", focus == Field::First),
        input_line(fields[1].0, fields[1].1, "0.00", focus == Field::Second),
        Line::from(""),
    ];

    match result {
        Some(breakdown) => {
            lines.push(Line::from(format!("  {} {}", result_labels.0, format_usd(breakdown.usd))));
            lines.push(Line::from(Span::styled(
                format!("  {} {}", result_labels.1, format_bs(breakdown.bs)),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            )));
        }
        None => lines.push(Line::from("  ⏳ Waiting for rates...")),
    }

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(format!(" {} ", title)));
    f.render_widget(paragraph, area);
}

fn render_change(f: &mut Frame, area: Rect, app: &App) {
    render_breakdown(
        f,
        area,
        "Change (↑/↓ switch field)",
        [("Price (USD): ", app.price_input.as_str()), ("Paid with (USD): ", app.given_input.as_str())],
        app.focus,
        app.change_result(),
        ("Change in USD:", "Change in Bs: "),
    );
}

fn render_mixed(f: &mut Frame, area: Rect, app: &App) {
    render_breakdown(
        f,
        area,
        "Mixed Payment (↑/↓ switch field)",
        [("Total (USD): ", app.total_input.as_str()), ("Cash (USD): ", app.cash_input.as_str())],
        app.focus,
        app.mixed_result(),
        ("Remaining USD:", "Pay in Bs:    "),
    );
}

fn render_history(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(6), Constraint::Min(0)])
        .split(area);

    let period_spans: Vec<Span> = Period::ALL
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let style = if *p == app.period {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            Span::styled(format!(" [{}] {}d ", i + 1, p.days()), style)
        })
        .collect();

    let mut lines = vec![Line::from(period_spans)];
    let history = app.history();

    match (history.as_ref(), &app.history_error) {
        (Some(history), _) => {
            let trend = &history.trend;
            lines.push(Line::from(format!(
                "Trend: {}  ({} points)",
                kambio::history::format_change_percent(trend.change_percent),
                trend.data_points
            )));
            lines.push(Line::from(trend_description(trend)));
            if trend.data_points > 0 {
                lines.push(Line::from(format!(
                    "Min {:.2} Bs | Max {:.2} Bs | Avg {:.2} Bs",
                    trend.min_bcv, trend.max_bcv, trend.avg_bcv
                )));
            }
        }
        (None, Some(err)) => lines.push(Line::from(Span::styled(
            format!("⚠️  {}", err),
            Style::default().fg(Color::Red),
        ))),
        (None, None) => lines.push(Line::from("⏳ Loading history...")),
    }

    let summary = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Trend "));
    f.render_widget(summary, chunks[0]);

    let Some(history) = history else {
        return;
    };
    let Some([low, high]) = chart_bounds(&history.data) else {
        let empty = Paragraph::new("Not enough data for a chart")
            .block(Block::default().borders(Borders::ALL).title(" BCV USD "));
        f.render_widget(empty, chunks[1]);
        return;
    };

    let series = Series::BcvUsd;
    let points = chart_series(&history.data, series);
    let last_x = (points.len().saturating_sub(1)) as f64;
    let first_label = history
        .data
        .first()
        .map(|e| e.timestamp.with_timezone(&Local).format("%d/%m").to_string())
        .unwrap_or_default();
    let last_label = history
        .data
        .last()
        .map(|e| e.timestamp.with_timezone(&Local).format("%d/%m").to_string())
        .unwrap_or_default();

    let datasets = vec![Dataset::default()
        .name(series.label())
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Green))
        .data(&points)];

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(" BCV USD "))
        .x_axis(
            Axis::default()
                .bounds([0.0, last_x.max(1.0)])
                .labels(vec![Span::raw(first_label), Span::raw(last_label)]),
        )
        .y_axis(
            Axis::default()
                .bounds([low, high])
                .labels(vec![
                    Span::raw(format!("{:.2}", low)),
                    Span::raw(format!("{:.2}", (low + high) / 2.0)),
                    Span::raw(format!("{:.2}", high)),
                ]),
        );
    f.render_widget(chart, chunks[1]);
}

fn render_alerts(f: &mut Frame, area: Rect, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0)])
        .split(area);

    let kind = match app.new_alert_type {
        ThresholdType::Above => "above (≥)",
        ThresholdType::Below => "below (≤)",
    };
    let form = Paragraph::new(vec![
        input_line("New alert, BCV Bs: ", &app.new_alert_input, "40.00", true),
        Line::from(format!("  Type (t): {}   Enter to create", kind)),
    ])
    .block(Block::default().borders(Borders::ALL).title(" New alert "));
    f.render_widget(form, chunks[0]);

    let items: Vec<ListItem> = app
        .alerts
        .alerts()
        .iter()
        .map(|alert| {
            let (status, color) = match (alert.enabled, alert.triggered) {
                (false, _) => ("off", Color::DarkGray),
                (true, true) => ("triggered", Color::Red),
                (true, false) => ("armed", Color::Green),
            };
            ListItem::new(Line::from(vec![
                Span::raw(format!("{:<22}", alert.describe())),
                Span::styled(format!("[{}]", status), Style::default().fg(color)),
                Span::styled(
                    format!("  {}", alert.created_at.with_timezone(&Local).format("%d/%m/%Y")),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Alerts (space toggle, d delete) "),
        )
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    f.render_stateful_widget(list, chunks[1], &mut app.alerts_state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut text = match &app.status {
        Some(status) => status.clone(),
        None => "Tab/Shift+Tab: pages | F5: refresh | s: share | q: quit".to_string(),
    };
    if app.is_loading() {
        text.push_str("  ⏳");
    }

    let status = Paragraph::new(text).block(Block::default().borders(Borders::ALL));
    f.render_widget(status, area);
}

fn render_share(f: &mut Frame, app: &App) {
    let Some(text) = app.share_text() else {
        return;
    };

    let area = centered_rect(60, 60, f.size());
    let popup = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title(" Share (any key to close) "));
    f.render_widget(Clear, area);
    f.render_widget(popup, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
