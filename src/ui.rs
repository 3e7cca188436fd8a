use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use eco_ledger::{
    all_materials, format_amount, stock, Badge, LedgerQuery, LedgerRow, MaterialFilter,
    RankedBar, RecordKind, RecordStore, SortDirection, SortKey, TypeFilter,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Dashboard,
    Ledger,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Dashboard => Page::Ledger,
            Page::Ledger => Page::Dashboard,
        }
    }

    pub fn previous(&self) -> Self {
        // Two pages: previous and next coincide
        self.next()
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Dashboard => "Dashboard",
            Page::Ledger => "Ledger",
        }
    }
}

pub struct App {
    pub store: RecordStore,
    pub query: LedgerQuery,
    pub materials: Vec<String>,
    pub state: TableState,
    pub current_page: Page,
    pub show_detail: bool,
    pub theme: Color,
    pub pending_delete: Option<(RecordKind, u64)>,
    pub status: Option<String>,
}

impl App {
    pub fn new(store: RecordStore, theme_color: &str) -> Self {
        let mut app = Self {
            store,
            query: LedgerQuery::default(),
            materials: Vec::new(),
            state: TableState::default(),
            current_page: Page::Dashboard,
            show_detail: false,
            theme: theme(theme_color),
            pending_delete: None,
            status: None,
        };
        app.refresh();
        app
    }

    /// Recompute the material list and reset the selection after data or filters change
    pub fn refresh(&mut self) {
        self.materials = all_materials(self.store.day(), self.store.stock());
        if let MaterialFilter::Named(m) = &self.query.material {
            if !self.materials.contains(m) {
                self.query.material = MaterialFilter::All;
            }
        }
        let len = self.row_count();
        self.state.select(if len == 0 { None } else { Some(0) });
    }

    pub fn rows(&self) -> Vec<LedgerRow<'_>> {
        self.store.ledger(&self.query)
    }

    pub fn row_count(&self) -> usize {
        self.rows().len()
    }

    pub fn selected_key(&self) -> Option<(RecordKind, u64)> {
        let i = self.state.selected()?;
        self.rows().get(i).map(|row| (row.kind(), row.id()))
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn sort_by(&mut self, key: SortKey) {
        self.query.sort.toggle(key);
        self.refresh();
    }

    pub fn cycle_type_filter(&mut self) {
        self.query.type_filter = self.query.type_filter.cycle();
        self.refresh();
    }

    /// all → first material → ... → last material → all
    pub fn cycle_material_filter(&mut self) {
        self.query.material = match &self.query.material {
            MaterialFilter::All => self
                .materials
                .first()
                .map(|m| MaterialFilter::Named(m.clone()))
                .unwrap_or(MaterialFilter::All),
            MaterialFilter::Named(current) => {
                let pos = self.materials.iter().position(|m| m == current);
                match pos.and_then(|i| self.materials.get(i + 1)) {
                    Some(next) => MaterialFilter::Named(next.clone()),
                    None => MaterialFilter::All,
                }
            }
        };
        self.refresh();
    }

    pub fn clear_filters(&mut self) {
        self.query.type_filter = TypeFilter::All;
        self.query.material = MaterialFilter::All;
        self.refresh();
    }

    pub fn shift_day(&mut self, days: i64) {
        let date = self.store.date() + chrono::Duration::days(days);
        self.store.select_date(date);
        self.status = None;
        self.refresh();
    }

    pub fn request_delete(&mut self) {
        if let Some((kind, id)) = self.selected_key() {
            self.pending_delete = Some((kind, id));
            self.status = Some(format!("Delete {} #{}? (y/n)", kind, id));
        }
    }

    pub fn confirm_delete(&mut self, confirmed: bool) {
        let Some((kind, id)) = self.pending_delete.take() else {
            return;
        };
        if !confirmed {
            self.status = None;
            return;
        }
        self.status = Some(match self.store.delete(kind, id) {
            Ok(_) if !self.store.is_saved() => {
                format!("Deleted {} #{} but saving failed (see eco-ledger.log)", kind, id)
            }
            Ok(_) => format!("Deleted {} #{}", kind, id),
            Err(e) => format!("Error: {}", e),
        });
        self.refresh();
    }

    pub fn next(&mut self) {
        let len = self.row_count();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i >= len - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.row_count();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i == 0 {
                    len - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.row_count();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => (i + 20).min(len - 1),
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        let i = match self.state.selected() {
            Some(i) => i.saturating_sub(20),
            None => 0,
        };
        self.state.select(Some(i));
    }
}

fn theme(name: &str) -> Color {
    match name.to_lowercase().as_str() {
        "blue" | "indigo" => Color::Blue,
        "green" | "emerald" => Color::Green,
        "orange" | "amber" | "yellow" => Color::Yellow,
        "rose" | "red" => Color::Red,
        "purple" | "violet" => Color::Magenta,
        _ => Color::Cyan,
    }
}

fn badge_color(badge: Badge, theme: Color) -> Color {
    match badge {
        Badge::Buy => theme,
        Badge::Sell => Color::Blue,
        Badge::Processing => Color::Yellow,
        Badge::Expense => Color::Red,
        Badge::Debt => Color::LightRed,
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

        if let Event::Key(key) = event::read()? {
            if app.pending_delete.is_some() {
                app.confirm_delete(matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')));
                continue;
            }

            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.current_page = app.current_page.previous();
                    } else {
                        app.current_page = app.current_page.next();
                    }
                }
                KeyCode::BackTab => app.current_page = app.current_page.previous(),
                KeyCode::Char('1') => app.sort_by(SortKey::Time),
                KeyCode::Char('2') => app.sort_by(SortKey::Type),
                KeyCode::Char('3') => app.sort_by(SortKey::Details),
                KeyCode::Char('4') => app.sort_by(SortKey::Value),
                KeyCode::Char('f') => app.cycle_type_filter(),
                KeyCode::Char('m') => app.cycle_material_filter(),
                KeyCode::Char('c') => app.clear_filters(),
                KeyCode::Char('x') | KeyCode::Delete => app.request_delete(),
                KeyCode::Left | KeyCode::Char('[') => app.shift_day(-1),
                KeyCode::Right | KeyCode::Char(']') => app.shift_day(1),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => {
                    if app.row_count() > 0 {
                        app.state.select(Some(0));
                    }
                }
                KeyCode::End => {
                    let len = app.row_count();
                    if len > 0 {
                        app.state.select(Some(len - 1));
                    }
                }
                _ => {}
            }
        }
    }
}

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
        Page::Dashboard => render_dashboard(f, chunks[1], app),
        Page::Ledger if app.show_detail => {
            let content_chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(chunks[1]);

            render_table(f, content_chunks[0], app);
            render_detail_panel(f, content_chunks[1], app);
        }
        Page::Ledger => render_table(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in [Page::Dashboard, Page::Ledger].iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    let day = app.store.day();
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        app.store.date().format("%d.%m.%Y").to_string(),
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
    ));
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("↑ {}", day.transactions.iter().filter(|t| t.is_sell()).count()),
        Style::default().fg(Color::Blue),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("↓ {}", day.transactions.iter().filter(|t| t.is_buy()).count()),
        Style::default().fg(app.theme),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("⚙ {}", day.processing.len()),
        Style::default().fg(Color::Yellow),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("✗ {}", day.expenses.len()),
        Style::default().fg(Color::Red),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(app.theme)));

    f.render_widget(header, area);
}

// ============================================================================
// DASHBOARD
// ============================================================================

fn render_dashboard(f: &mut Frame, area: Rect, app: &App) {
    let summary = app.store.summary();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // KPI cards
            Constraint::Length(4), // Stock badges
            Constraint::Min(0),    // Ranked bars
        ])
        .split(area);

    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(33),
            Constraint::Percentage(33),
            Constraint::Percentage(34),
        ])
        .split(chunks[0]);

    let kpis = [
        (" Income ", summary.kpis.income, Color::Green),
        (" Expense ", summary.kpis.expense, Color::Red),
        (" Profit ", summary.kpis.profit, Color::Blue),
    ];
    for (i, (title, value, color)) in kpis.iter().enumerate() {
        let card = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(
                format!("  {} c.", format_amount(*value)),
                Style::default().fg(*color).add_modifier(Modifier::BOLD),
            )),
        ])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(*color))
                .title(*title),
        );
        f.render_widget(card, cards[i]);
    }

    render_stock(f, chunks[1], app);

    let bars = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[2]);

    render_bars(f, bars[0], " Top Sales ", &summary.top_sales, app.theme);
    render_bars(f, bars[1], " Top Expenses ", &summary.top_expenses, Color::Red);
}

fn render_stock(f: &mut Frame, area: Rect, app: &App) {
    let line = if stock::has_stock(app.store.stock()) {
        let mut spans = vec![Span::raw(" ")];
        for (material, qty) in stock::in_stock(app.store.stock()) {
            spans.push(Span::styled(
                format!("{} ", material.to_uppercase()),
                Style::default().fg(Color::DarkGray),
            ));
            spans.push(Span::styled(
                stock::format_qty(qty),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::raw("   "));
        }
        Line::from(spans)
    } else {
        Line::from(Span::styled(" Stock is empty", Style::default().fg(Color::DarkGray)))
    };

    let paragraph = Paragraph::new(vec![line]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Stock "),
    );
    f.render_widget(paragraph, area);
}

fn render_bars(f: &mut Frame, area: Rect, title: &str, bars: &[RankedBar], color: Color) {
    let width = area.width.saturating_sub(4) as f64;

    let mut content = vec![Line::from("")];
    if bars.is_empty() {
        content.push(Line::from(Span::styled(
            "  No data",
            Style::default().fg(Color::DarkGray),
        )));
    }
    for bar in bars {
        content.push(Line::from(vec![
            Span::styled(format!("  {:<20}", truncate(&bar.name, 20)), Style::default().fg(Color::White)),
            Span::styled(
                format!("{:>12} c.", format_amount(bar.value)),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ]));
        let filled = ((bar.ratio * width).round() as usize).max(1);
        content.push(Line::from(Span::styled(
            format!("  {}", "█".repeat(filled)),
            Style::default().fg(color),
        )));
    }

    let paragraph = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title.to_string()),
    );
    f.render_widget(paragraph, area);
}

// ============================================================================
// LEDGER
// ============================================================================

fn sort_marker(app: &App, key: SortKey) -> &'static str {
    if app.query.sort.key != key {
        return "";
    }
    match app.query.sort.direction {
        SortDirection::Asc => " ▲",
        SortDirection::Desc => " ▼",
    }
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let titles = [
        format!("1 Time{}", sort_marker(app, SortKey::Time)),
        format!("2 Type{}", sort_marker(app, SortKey::Type)),
        format!("3 Details{}", sort_marker(app, SortKey::Details)),
        format!("4 Sum{}", sort_marker(app, SortKey::Value)),
    ];
    let header_cells = titles.into_iter().map(|h| {
        Cell::from(h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let theme = app.theme;
    let ledger = app.store.ledger(&app.query);
    let empty = ledger.is_empty();
    let rows: Vec<Row> = ledger
        .iter()
        .map(|row| {
            let badge = row.badge();
            let color = badge_color(badge, theme);
            let value_color = match row.kind() {
                RecordKind::Processing => Color::DarkGray,
                _ => color,
            };

            Row::new(vec![
                Cell::from(row.time().to_string()),
                Cell::from(badge.label()).style(Style::default().fg(color)),
                Cell::from(format!(
                    "{:<18} {}",
                    truncate(row.details(), 18),
                    truncate(&row.subtitle(), 30)
                )),
                Cell::from(row.value_text()).style(Style::default().fg(value_color)),
            ])
            .height(1)
        })
        .collect();

    let title = format!(
        " Transactions ({}) | type: {} | material: {} ",
        app.store.date().format("%d.%m.%Y"),
        app.query.type_filter,
        app.query.material.as_str()
    );

    if empty {
        let paragraph = Paragraph::new("\n  No data").block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(title),
        );
        f.render_widget(paragraph, area);
        return;
    }

    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Length(12),
            Constraint::Min(30),
            Constraint::Length(14),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let rows = app.rows();
    let row = match app.state.selected().and_then(|i| rows.get(i)) {
        Some(row) => row,
        None => {
            let no_selection = Paragraph::new("No record selected").block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Yellow))
                    .title(" Record Details "),
            );
            f.render_widget(no_selection, area);
            return;
        }
    };

    let label = |name: &str| {
        Span::styled(
            format!("  {}: ", name),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )
    };

    let mut content = vec![
        Line::from(""),
        Line::from(vec![label("Record"), Span::raw(format!("{} #{}", row.kind(), row.id()))]),
        Line::from(vec![label("Time"), Span::raw(row.time().to_string())]),
        Line::from(vec![
            label("Type"),
            Span::styled(
                row.badge().label(),
                Style::default().fg(badge_color(row.badge(), app.theme)),
            ),
        ]),
        Line::from(""),
    ];

    match *row {
        LedgerRow::Transaction(t) => {
            content.push(Line::from(vec![label("Material"), Span::raw(t.material.clone())]));
            content.push(Line::from(vec![label("Client"), Span::raw(t.client.clone())]));
            content.push(Line::from(vec![label("Payment"), Span::raw(format!("{:?}", t.method))]));
        }
        LedgerRow::Processing(p) => {
            content.push(Line::from(vec![label("From"), Span::raw(p.from.clone())]));
            content.push(Line::from(vec![label("To"), Span::raw(p.to.clone())]));
            content.push(Line::from(vec![
                label("Yield"),
                Span::raw(format!("{}kg → {}kg", format_amount(p.qty_in), format_amount(p.qty_out))),
            ]));
        }
        LedgerRow::Expense(e) => {
            content.push(Line::from(vec![label("Category"), Span::raw(e.category.clone())]));
            content.push(Line::from(vec![label("Note"), Span::raw(e.description.clone())]));
        }
    }

    content.push(Line::from(""));
    content.push(Line::from(vec![label("Sum"), Span::raw(row.value_text())]));
    content.push(Line::from(""));
    content.push(Line::from(Span::styled(
        "  Press Enter to close",
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    )));

    let detail_panel = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Record Details "),
    );

    f.render_widget(detail_panel, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
    let total = app.row_count();

    let mut status_spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, total),
        Style::default().fg(Color::Cyan),
    )];

    if let Some(status) = &app.status {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(status.clone(), Style::default().fg(Color::Green)));
    }

    for (key, action) in [
        ("1-4", " Sort"),
        ("f", " Type"),
        ("m", " Material"),
        ("c", " Clear"),
        ("x", " Delete"),
        ("←/→", " Day"),
        ("Tab", " Page"),
    ] {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(key, Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(action));
    }
    status_spans.push(Span::raw(" | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
