//! Core TUI application state and event loop.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use color_eyre::eyre::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Tabs};
use tokio::runtime::Handle;

use tweetrag_core::PromptTemplate;
use tweetrag_shared::{AppConfig, ModelConfig, expand_home};

use crate::screens::{Screen, ScreenId};
use crate::widgets::status_bar;

/// Everything a background task needs to reach the archive and the models.
#[derive(Clone)]
pub(crate) struct AppContext {
    pub db_path: PathBuf,
    pub collection: String,
    pub models: ModelConfig,
    pub template: PromptTemplate,
    pub context_tweets: usize,
    /// Runtime the RAG and storage calls are spawned on.
    pub runtime: Handle,
}

impl AppContext {
    pub(crate) fn new(config: AppConfig, runtime: Handle) -> Result<Self> {
        let models = ModelConfig::try_from(&config)?;
        let template = PromptTemplate::from_config(config.prompt.template.as_deref())?;
        Ok(Self {
            db_path: expand_home(&config.defaults.db_path),
            collection: config.defaults.collection,
            models,
            template,
            context_tweets: config.defaults.context_tweets,
            runtime,
        })
    }
}

/// Application state.
pub(crate) struct App {
    /// Currently active screen tab.
    pub active_tab: usize,
    /// Available screens.
    pub screens: Vec<ScreenId>,
    /// Whether the app should quit.
    pub should_quit: bool,
    /// Status message shown in bottom bar.
    pub status: String,
    /// Whether help overlay is visible.
    pub show_help: bool,
    /// Per-screen state.
    pub screen_states: Vec<Screen>,
    pub ctx: AppContext,
}

impl App {
    pub(crate) fn new(ctx: AppContext) -> Self {
        let screens = vec![ScreenId::Chat, ScreenId::Archive];
        let mut screen_states: Vec<Screen> = screens.iter().map(|s| Screen::new(*s)).collect();
        for screen in &mut screen_states {
            screen.activate(&ctx);
        }

        Self {
            active_tab: 0,
            screens,
            should_quit: false,
            status: format!("Collection '{}' | press ? for help", ctx.collection),
            show_help: false,
            screen_states,
            ctx,
        }
    }

    fn current_screen(&self) -> &Screen {
        &self.screen_states[self.active_tab]
    }

    fn switch_to(&mut self, idx: usize) {
        self.active_tab = idx;
        self.status = format!("{}", self.screens[idx]);
    }

    /// Collect finished background work.
    fn tick(&mut self) {
        for screen in &mut self.screen_states {
            screen.tick();
        }
    }
}

/// Entry point: sets up terminal, runs event loop, restores terminal.
pub(crate) fn run(ctx: AppContext) -> Result<()> {
    // Setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run app
    let result = run_app(&mut terminal, ctx);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, ctx: AppContext) -> Result<()> {
    let mut app = App::new(ctx);

    loop {
        app.tick();
        terminal.draw(|f| draw(f, &app))?;

        // Poll for events with 100ms timeout so answers show up promptly
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                handle_key(&mut app, key.code, key.modifiers);
            }
        }

        if app.should_quit {
            tracing::info!("tui exiting");
            break;
        }
    }

    Ok(())
}

fn handle_key(app: &mut App, code: KeyCode, modifiers: KeyModifiers) {
    let editing = app.current_screen().is_editing();

    // Global keybindings (always active)
    match code {
        KeyCode::Char('q') | KeyCode::Char('c')
            if modifiers.contains(KeyModifiers::CONTROL) =>
        {
            app.should_quit = true;
            return;
        }
        KeyCode::Char('q') if !editing => {
            app.should_quit = true;
            return;
        }
        KeyCode::Char('?') if !editing => {
            app.show_help = !app.show_help;
            return;
        }
        KeyCode::Esc if app.show_help => {
            app.show_help = false;
            return;
        }
        KeyCode::Char(c @ '1'..='9') if !editing => {
            let idx = (c as usize) - ('1' as usize);
            if idx < app.screens.len() {
                app.switch_to(idx);
            }
            return;
        }
        KeyCode::Tab if !editing => {
            app.switch_to((app.active_tab + 1) % app.screens.len());
            return;
        }
        KeyCode::BackTab if !editing => {
            let idx = if app.active_tab == 0 {
                app.screens.len() - 1
            } else {
                app.active_tab - 1
            };
            app.switch_to(idx);
            return;
        }
        _ => {}
    }

    // If help is showing, consume any key to dismiss
    if app.show_help {
        app.show_help = false;
        return;
    }

    // Delegate to current screen
    let App {
        screen_states,
        active_tab,
        ctx,
        ..
    } = app;
    screen_states[*active_tab].handle_key(code, modifiers, ctx);
}

fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tab bar
            Constraint::Min(1),    // Content
            Constraint::Length(1), // Status bar
        ])
        .split(f.area());

    // Tab bar
    let tab_titles: Vec<Line> = app
        .screens
        .iter()
        .map(|s| Line::from(format!("{s}")))
        .collect();

    let tabs = Tabs::new(tab_titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" TweetRAG "),
        )
        .select(app.active_tab)
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .divider(" │ ");

    f.render_widget(tabs, chunks[0]);

    app.current_screen().draw(f, chunks[1]);

    let status = app
        .current_screen()
        .status()
        .unwrap_or_else(|| app.status.clone());
    let bar = status_bar(&status);
    f.render_widget(bar, chunks[2]);

    if app.show_help {
        draw_help_overlay(f);
    }
}

fn draw_help_overlay(f: &mut Frame) {
    let area = centered_rect(60, 60, f.area());

    let help_text = vec![
        Line::from("Keybindings").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from(""),
        Line::from("  1-2          Switch to screen"),
        Line::from("  Tab/S-Tab    Next/previous screen"),
        Line::from("  ?            Toggle this help"),
        Line::from("  q / Ctrl-C   Quit"),
        Line::from(""),
        Line::from("Chat:").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from("  i / Enter    Start typing a question"),
        Line::from("  Enter        Ask (while typing)"),
        Line::from("  Esc          Stop typing"),
        Line::from("  ↑/↓          Select a source tweet"),
        Line::from(""),
        Line::from("Archive:").style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from("  r            Refresh collection info"),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help | press any key to close ")
                .style(Style::default().bg(Color::DarkGray)),
        )
        .style(Style::default().fg(Color::White).bg(Color::DarkGray));

    f.render_widget(ratatui::widgets::Clear, area);
    f.render_widget(help, area);
}

/// Create a centered rectangle with percentage width and height.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
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
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tweetrag_shared::parse_base_url;

    fn test_context(runtime: &tokio::runtime::Runtime) -> AppContext {
        AppContext {
            db_path: std::env::temp_dir().join("tweetrag_tui_missing.db"),
            collection: "tweets".into(),
            models: ModelConfig {
                base_url: parse_base_url("http://127.0.0.1:9").unwrap(),
                embedding_model: "e".into(),
                generation_model: "g".into(),
                timeout_secs: 1,
            },
            template: PromptTemplate::default(),
            context_tweets: 3,
            runtime: runtime.handle().clone(),
        }
    }

    #[test]
    fn tab_cycles_screens() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut app = App::new(test_context(&runtime));
        assert_eq!(app.active_tab, 0);

        handle_key(&mut app, KeyCode::Tab, KeyModifiers::NONE);
        assert_eq!(app.active_tab, 1);
        handle_key(&mut app, KeyCode::Tab, KeyModifiers::NONE);
        assert_eq!(app.active_tab, 0);
        handle_key(&mut app, KeyCode::BackTab, KeyModifiers::SHIFT);
        assert_eq!(app.active_tab, 1);
        handle_key(&mut app, KeyCode::Char('1'), KeyModifiers::NONE);
        assert_eq!(app.active_tab, 0);
    }

    #[test]
    fn q_types_while_editing_but_quits_otherwise() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut app = App::new(test_context(&runtime));

        handle_key(&mut app, KeyCode::Char('i'), KeyModifiers::NONE);
        assert!(app.current_screen().is_editing());
        handle_key(&mut app, KeyCode::Char('q'), KeyModifiers::NONE);
        assert!(!app.should_quit);

        handle_key(&mut app, KeyCode::Esc, KeyModifiers::NONE);
        handle_key(&mut app, KeyCode::Char('q'), KeyModifiers::NONE);
        assert!(app.should_quit);
    }

    #[test]
    fn ctrl_c_always_quits() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut app = App::new(test_context(&runtime));
        handle_key(&mut app, KeyCode::Char('i'), KeyModifiers::NONE);
        handle_key(&mut app, KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(app.should_quit);
    }

    #[test]
    fn help_overlay_dismissed_by_any_key() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mut app = App::new(test_context(&runtime));
        handle_key(&mut app, KeyCode::Char('?'), KeyModifiers::NONE);
        assert!(app.show_help);
        handle_key(&mut app, KeyCode::Char('x'), KeyModifiers::NONE);
        assert!(!app.show_help);
        assert!(!app.current_screen().is_editing());
    }
}
