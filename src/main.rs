use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame, Terminal,
};
use tracing::{error, info, warn};
use tui_textarea::TextArea;

use git_raid::config::{load_config, EngineConfig};
use git_raid::content::load_rooms;
use git_raid::exec::{SystemExecutor, TempSandboxAllocator};
use git_raid::save::{clear_snapshot, load_snapshot, save_snapshot};
use git_raid::{
    logging, CommandResult, Game, GameEngine, Player, ResultType, Room, SessionSnapshot,
    SessionState,
};

#[derive(Debug, Parser)]
#[command(name = "git-raid", about = "Learn git by raiding a dungeon")]
struct Args {
    /// Engine configuration file (TOML).
    #[arg(long, default_value = "git-raid.toml")]
    config: PathBuf,

    /// Directory of room_*.toml files. Overrides the config.
    #[arg(long)]
    rooms: Option<PathBuf>,

    /// Adventurer name for a new game.
    #[arg(long, default_value = "Raider")]
    name: String,

    /// Skip the title screen and continue the saved game.
    #[arg(long)]
    resume: bool,

    /// Write tracing output to this file. Overrides the config.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

enum GameState {
    TitleScreen,
    Playing,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum MenuOption {
    NewGame,
    Continue,
    Quit,
}

impl MenuOption {
    fn next(self, can_continue: bool) -> Self {
        match self {
            MenuOption::NewGame if can_continue => MenuOption::Continue,
            MenuOption::NewGame | MenuOption::Continue => MenuOption::Quit,
            MenuOption::Quit => MenuOption::NewGame,
        }
    }

    fn prev(self, can_continue: bool) -> Self {
        match self {
            MenuOption::NewGame => MenuOption::Quit,
            MenuOption::Continue => MenuOption::NewGame,
            MenuOption::Quit if can_continue => MenuOption::Continue,
            MenuOption::Quit => MenuOption::NewGame,
        }
    }
}

struct App<'a> {
    config: EngineConfig,
    rooms: Vec<Room>,
    player_name: String,
    saved: Option<SessionSnapshot>,
    engine: Option<GameEngine>,
    input: TextArea<'a>,
    log: Vec<(String, Style)>,
    scroll_back: u16,
    state: GameState,
    menu_selection: MenuOption,
    notice: Option<String>,
}

impl<'a> App<'a> {
    fn new(
        config: EngineConfig,
        rooms: Vec<Room>,
        player_name: String,
        saved: Option<SessionSnapshot>,
    ) -> Self {
        App {
            config,
            rooms,
            player_name,
            saved,
            engine: None,
            input: new_input(),
            log: Vec::new(),
            scroll_back: 0,
            state: GameState::TitleScreen,
            menu_selection: MenuOption::NewGame,
            notice: None,
        }
    }

    fn can_continue(&self) -> bool {
        self.saved.is_some()
    }

    fn start_game(&mut self, resume: bool) {
        let game = match (&self.saved, resume) {
            (Some(snapshot), true) => match Game::from_snapshot(snapshot, self.rooms.clone()) {
                Ok(game) => game,
                Err(err) => {
                    warn!(%err, "saved game does not match the rooms");
                    self.notice = Some(format!("The saved game cannot be restored: {err}"));
                    return;
                }
            },
            _ => match Game::new(
                Player::new(self.player_name.clone(), Utc::now()),
                self.rooms.clone(),
            ) {
                Ok(game) => game,
                Err(err) => {
                    self.notice = Some(format!("The dungeon is malformed: {err}"));
                    return;
                }
            },
        };

        let mut engine = GameEngine::new(
            game,
            Arc::new(SystemExecutor::from_config(&self.config)),
            Arc::new(TempSandboxAllocator::new()),
            &self.config,
        );
        self.log.clear();
        self.scroll_back = 0;
        if resume {
            self.push_line(
                "You return to the dungeon.".to_string(),
                Style::default().fg(Color::DarkGray),
            );
        }
        let result = engine.start();
        self.engine = Some(engine);
        self.push_result(&result);
        self.state = GameState::Playing;
    }

    fn submit(&mut self) {
        let line = self.input.lines().join(" ");
        self.input = new_input();
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        self.push_line(format!("> {line}"), Style::default().fg(Color::DarkGray));
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let result = engine.process(line);
        self.push_result(&result);
    }

    fn push_result(&mut self, result: &CommandResult) {
        let style = match (result.kind, result.success) {
            (ResultType::Movement | ResultType::Look, true) => Style::default().fg(Color::White),
            (ResultType::Help | ResultType::Status, _) => Style::default().fg(Color::Cyan),
            (ResultType::Hint, _) => Style::default().fg(Color::Yellow),
            (_, true) => Style::default().fg(Color::Green),
            (_, false) => Style::default().fg(Color::Red),
        };
        self.push_line(result.message.clone(), style);
        if let Some(hint) = result.hint.as_ref().filter(|_| !result.success) {
            self.push_line(format!("Hint: {hint}"), Style::default().fg(Color::Yellow));
        }
    }

    fn push_line(&mut self, text: String, style: Style) {
        self.log.push((text, style));
        self.scroll_back = 0;
    }

    fn session_over(&self) -> bool {
        matches!(
            self.engine.as_ref().map(GameEngine::state),
            Some(SessionState::Exited { .. })
        )
    }

    fn log_line_count(&self) -> u16 {
        let lines: usize = self.log.iter().map(|(text, _)| text.lines().count() + 1).sum();
        u16::try_from(lines).unwrap_or(u16::MAX)
    }

    /// Save progress, or forget it once the dungeon is cleared.
    fn persist(&self) -> Result<()> {
        let Some(engine) = &self.engine else {
            return Ok(());
        };
        if engine.game().is_completed() {
            clear_snapshot(&self.config.save_path)
        } else {
            save_snapshot(&self.config.save_path, &engine.snapshot())
        }
    }
}

fn new_input<'a>() -> TextArea<'a> {
    let mut input = TextArea::default();
    input.set_block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Command [ENTER: run | PgUp/PgDn: scroll | Esc: leave] "),
    );
    input.set_cursor_line_style(Style::default());
    input
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(&args.config)?;
    if let Some(rooms) = args.rooms {
        config.rooms_dir = rooms;
    }
    if let Some(log_file) = args.log_file {
        config.log_path = Some(log_file);
    }
    logging::init(config.log_path.as_deref())?;

    let rooms = load_rooms(&config.rooms_dir)
        .with_context(|| format!("load rooms from {}", config.rooms_dir.display()))?;
    let saved = match load_snapshot(&config.save_path) {
        Ok(saved) => saved,
        Err(err) => {
            warn!(err = %format!("{err:#}"), "ignoring unreadable save file");
            None
        }
    };
    info!(rooms = rooms.len(), saved = saved.is_some(), "starting");

    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        error!(%panic_info, "panic");
        default_hook(panic_info);
    }));

    let save_path = config.save_path.clone();
    let mut app = App::new(config, rooms, args.name, saved);
    if args.resume && app.can_continue() {
        app.start_game(true);
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let outcome = run(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    outcome?;

    app.persist()?;
    if let Some(engine) = &app.engine {
        let player = engine.game().player();
        if engine.game().is_completed() {
            println!(
                "\nYou cleared the dungeon in {} moves. Well raided, {}!\n",
                player.move_count(),
                player.name()
            );
        } else {
            println!(
                "\nProgress saved to {}. Run with --resume to continue.\n",
                save_path.display()
            );
        }
    }
    Ok(())
}

fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App<'_>) -> Result<()> {
    loop {
        terminal.draw(|f| draw_ui(f, app))?;

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if let GameState::TitleScreen = app.state {
            let can_continue = app.can_continue();
            match key.code {
                KeyCode::Down | KeyCode::Char('j') => {
                    app.menu_selection = app.menu_selection.next(can_continue);
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    app.menu_selection = app.menu_selection.prev(can_continue);
                }
                KeyCode::Enter => match app.menu_selection {
                    MenuOption::NewGame => app.start_game(false),
                    MenuOption::Continue => app.start_game(true),
                    MenuOption::Quit => return Ok(()),
                },
                KeyCode::Char('q') => return Ok(()),
                _ => {}
            }
            continue;
        }

        match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) | (KeyCode::Esc, _) => return Ok(()),
            (KeyCode::Enter, _) => {
                app.submit();
                if app.session_over() {
                    return Ok(());
                }
            }
            (KeyCode::PageUp, _) => {
                let max = app.log_line_count();
                app.scroll_back = app.scroll_back.saturating_add(5).min(max);
            }
            (KeyCode::PageDown, _) => {
                app.scroll_back = app.scroll_back.saturating_sub(5);
            }
            _ => {
                app.input.input(key);
            }
        }
    }
}

fn draw_ui(f: &mut Frame, app: &App) {
    let Some(engine) = app
        .engine
        .as_ref()
        .filter(|_| matches!(app.state, GameState::Playing))
    else {
        draw_title_screen(f, app);
        return;
    };
    let game = engine.game();
    let room = game.current_room();
    let player = game.player();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(10),
            Constraint::Length(3),
        ])
        .split(f.area());

    // Status bar
    let (state_label, state_style) = match engine.state() {
        SessionState::Completed | SessionState::Exited { completed: true } => {
            (" CLEARED ", Style::default().fg(Color::Black).bg(Color::Green))
        }
        _ if game.current_challenge_satisfied() => (" OPEN ", Style::default().fg(Color::Green)),
        _ => (" SEALED ", Style::default().fg(Color::Red)),
    };
    let status = Line::from(vec![
        Span::styled(" GIT RAID ", Style::default().fg(Color::Black).bg(Color::Yellow)),
        Span::raw("  "),
        Span::styled(
            format!(" {} ", room.name()),
            Style::default().fg(Color::White).bg(Color::DarkGray),
        ),
        Span::raw("  "),
        Span::styled(
            format!(" Rooms {}/{} ", player.completed_rooms().len(), game.room_count()),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw("  "),
        Span::styled(
            format!(" Moves: {} ", player.move_count()),
            Style::default().fg(Color::Yellow),
        ),
        Span::raw("  "),
        Span::styled(state_label, state_style),
    ]);
    f.render_widget(
        Paragraph::new(status).block(Block::default().borders(Borders::BOTTOM)),
        chunks[0],
    );

    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(chunks[1]);

    // Room panel
    let mut lines = vec![
        Line::from(Span::styled(room.name(), Style::default().add_modifier(Modifier::BOLD))),
        Line::raw(""),
    ];
    lines.extend(room.description().lines().map(Line::raw));
    if let Some(challenge) = room.challenge() {
        lines.push(Line::raw(""));
        lines.push(Line::from(Span::styled(
            format!("[{}]", challenge.kind().label()),
            Style::default().fg(Color::Magenta),
        )));
        lines.extend(challenge.description().lines().map(Line::raw));
    }
    if !room.exits().is_empty() {
        lines.push(Line::raw(""));
        let exits: Vec<&str> = room.exits().keys().map(String::as_str).collect();
        lines.push(Line::from(vec![
            Span::styled("Exits: ", Style::default().fg(Color::DarkGray)),
            Span::raw(exits.join(", ")),
        ]));
    }
    let panel = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title(" The Chamber "))
        .wrap(Wrap { trim: false });
    f.render_widget(panel, main_chunks[0]);

    // Output log, pinned to the bottom unless scrolled back
    let mut log_lines = Vec::new();
    for (text, style) in &app.log {
        log_lines.extend(text.lines().map(|line| Line::styled(line.to_string(), *style)));
        log_lines.push(Line::raw(""));
    }
    let visible = main_chunks[1].height.saturating_sub(2);
    let top = app
        .log_line_count()
        .saturating_sub(visible)
        .saturating_sub(app.scroll_back);
    let title = if app.scroll_back > 0 {
        " Dungeon Log [scrolled: PgDn to return] "
    } else {
        " Dungeon Log "
    };
    let output = Paragraph::new(Text::from(log_lines))
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false })
        .scroll((top, 0));
    f.render_widget(output, main_chunks[1]);

    f.render_widget(&app.input, chunks[2]);
}

fn draw_title_screen(f: &mut Frame, app: &App) {
    let area = f.area();

    let title_art = r#"
    ╔═══════════════════════════════════════════════════════╗
    ║                                                       ║
    ║             ██████╗ ██╗████████╗                      ║
    ║            ██╔════╝ ██║╚══██╔══╝                      ║
    ║            ██║  ███╗██║   ██║                         ║
    ║            ██║   ██║██║   ██║                         ║
    ║            ╚██████╔╝██║   ██║                         ║
    ║             ╚═════╝ ╚═╝   ╚═╝                         ║
    ║                                                       ║
    ║            ██████╗  █████╗ ██╗██████╗                 ║
    ║            ██╔══██╗██╔══██╗██║██╔══██╗                ║
    ║            ██████╔╝███████║██║██║  ██║                ║
    ║            ██╔══██╗██╔══██║██║██║  ██║                ║
    ║            ██║  ██║██║  ██║██║██████╔╝                ║
    ║            ╚═╝  ╚═╝╚═╝  ╚═╝╚═╝╚═════╝                 ║
    ║                                                       ║
    ║            "Commit. Branch. Survive."                 ║
    ║                                                       ║
    ╚═══════════════════════════════════════════════════════╝
"#;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(22),
            Constraint::Length(2),
            Constraint::Length(2),
            Constraint::Length(2),
            Constraint::Length(2),
            Constraint::Min(1),
        ])
        .split(area);

    let title = Paragraph::new(title_art)
        .style(Style::default().fg(Color::Yellow))
        .alignment(Alignment::Center);
    f.render_widget(title, chunks[0]);

    let item_style = |option: MenuOption, enabled: bool| {
        if !enabled {
            Style::default().fg(Color::DarkGray)
        } else if app.menu_selection == option {
            Style::default().fg(Color::Black).bg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        }
    };
    let items = [
        ("  NEW GAME  ", MenuOption::NewGame, true),
        ("  CONTINUE  ", MenuOption::Continue, app.can_continue()),
        ("  QUIT  ", MenuOption::Quit, true),
    ];
    for (chunk, (label, option, enabled)) in chunks[1..4].iter().zip(items) {
        let item = Paragraph::new(label)
            .style(item_style(option, enabled))
            .alignment(Alignment::Center);
        f.render_widget(item, *chunk);
    }

    if let Some(notice) = &app.notice {
        let notice = Paragraph::new(notice.as_str())
            .style(Style::default().fg(Color::Red))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        f.render_widget(notice, chunks[4]);
    }

    let help = Paragraph::new("↑/↓ to select  •  ENTER to confirm  •  q to quit")
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    f.render_widget(help, chunks[5]);
}
