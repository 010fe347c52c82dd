mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    event::{
        KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
        PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    fs::OpenOptions,
    io::{self, stdin},
    path::PathBuf,
    sync::Mutex,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cubik::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    format::{format_average, format_optional_ms},
    history::SolveStore,
    runtime::{CrosstermEventSource, CubikEvent, FixedTicker, PrimaryControl, PrimaryInput, Runner},
    session::Session,
    solve::Penalty,
    stats,
    timer::{TimerState, TimerStateMachine},
    transfer,
};

/// hold-to-start speedcubing timer with inspection penalties and competition averages
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal solve timer: hold the primary key, release to start inspection or the stopwatch, press again to stop. Keeps a persistent history with ao5/ao12/ao100 and best averages."
)]
pub struct Cli {
    #[clap(subcommand)]
    command: Option<Command>,

    /// skip the inspection countdown
    #[clap(long)]
    no_inspection: bool,

    /// inspection length in seconds
    #[clap(short = 'i', long)]
    inspection_secs: Option<u64>,

    /// how long the key must be held before releasing starts (milliseconds)
    #[clap(long)]
    hold_ms: Option<u64>,

    /// use the longer hold required on touch-primary devices
    #[clap(long)]
    touch: bool,

    /// primary control: space, enter, tab, or a single character
    #[clap(short = 'k', long)]
    key: Option<String>,

    /// scramble to attach to the next solve
    #[clap(short = 's', long)]
    scramble: Option<String>,

    /// write the effective options back to the config file
    #[clap(long)]
    save_config: bool,

    /// keep solves in memory only
    #[clap(long)]
    ephemeral: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// write the solve history to a CSV file
    Export { path: PathBuf },
    /// append solves from a CSV file to the history
    Import { path: PathBuf },
    /// print statistics for the stored history
    Stats,
}

impl Cli {
    /// Layer command line overrides on top of the stored config
    fn apply(&self, mut config: Config) -> Config {
        if self.no_inspection {
            config.inspection_enabled = false;
        }
        if let Some(secs) = self.inspection_secs {
            config.inspection_duration_ms = secs * 1000;
        }
        if self.hold_ms.is_some() {
            config.hold_duration_ms = self.hold_ms;
        }
        if self.touch {
            config.touch_primary = true;
        }
        if let Some(key) = &self.key {
            config.primary_key = key.clone();
        }
        config
    }
}

#[derive(Debug)]
pub struct App {
    pub session: Session,
    pub control: PrimaryControl,
}

impl App {
    pub fn new(
        config: &Config,
        scramble: Option<String>,
        store: Option<SolveStore>,
        release_events: bool,
    ) -> Result<Self, Box<dyn Error>> {
        let mut settings = config.timer_settings();
        if !release_events {
            warn!("terminal does not report key releases; hold time disabled");
            settings.hold_duration_ms = 0;
        }

        let control = PrimaryControl::from_name(&config.primary_key, release_events)
            .unwrap_or_else(|| {
                warn!(key = %config.primary_key, "unknown primary key, using space");
                PrimaryControl::new(KeyCode::Char(' '), release_events)
            });

        let timer = TimerStateMachine::new(settings, Vec::new());
        let mut session = Session::new(timer, store)?;
        session.set_scramble(scramble);

        Ok(Self { session, control })
    }

    /// Returns false once the user asked to quit
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        let inputs = self.control.translate(&key);
        if !inputs.is_empty() {
            let code = self.control.code();
            for input in inputs {
                match input {
                    PrimaryInput::Down { repeat } => self.session.key_down(&code, repeat),
                    PrimaryInput::Up => self.session.key_up(&code),
                }
            }
            return true;
        }

        if key.kind != KeyEventKind::Press {
            return true;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return false;
        }

        let editable = matches!(self.session.state(), TimerState::Idle | TimerState::Stopped);
        match key.code {
            KeyCode::Esc => return false,
            KeyCode::Char('r') => self.session.reset_timer(),
            KeyCode::Char('2') if editable => {
                self.session.toggle_last_penalty(Penalty::Plus2);
            }
            KeyCode::Char('d') if editable => {
                self.session.toggle_last_penalty(Penalty::Dnf);
            }
            KeyCode::Backspace | KeyCode::Delete if editable => {
                self.session.delete_last();
            }
            _ => {}
        }
        true
    }
}

fn init_logging() {
    let Some(path) = AppDirs::log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        if std::fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging();

    let config_store = FileConfigStore::new();
    let config = cli.apply(config_store.load());
    if cli.save_config {
        config_store.save(&config)?;
        info!(path = %config_store.path().display(), "saved config");
    }

    match &cli.command {
        Some(Command::Export { path }) => {
            let store = SolveStore::open_default()?;
            let solves = store.all()?.into_iter().map(|s| s.solve).collect::<Vec<_>>();
            let written = transfer::export_file(path, &solves)?;
            println!("exported {written} solves to {}", path.display());
            return Ok(());
        }
        Some(Command::Import { path }) => {
            let solves = transfer::import_file(path)?;
            let mut store = SolveStore::open_default()?;
            let imported = store.record_batch(&solves)?;
            println!("imported {imported} solves from {}", path.display());
            return Ok(());
        }
        Some(Command::Stats) => {
            let store = SolveStore::open_default()?;
            let solves = store.all()?.into_iter().map(|s| s.solve).collect::<Vec<_>>();
            print_stats(&solves);
            return Ok(());
        }
        None => {}
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let store = if cli.ephemeral {
        None
    } else {
        match SolveStore::open_default() {
            Ok(store) => Some(store),
            Err(e) => {
                warn!(error = %e, "solve history unavailable, keeping solves in memory");
                None
            }
        }
    };

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    let release_events = matches!(supports_keyboard_enhancement(), Ok(true));
    if release_events {
        execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )?;
    }
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = App::new(&config, cli.scramble.clone(), store, release_events)
        .and_then(|mut app| start_tui(&mut terminal, &mut app));

    if release_events {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)?;
    }
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(CrosstermEventSource::new(), FixedTicker::default());
    terminal.draw(|f| ui::draw(app, f))?;

    loop {
        match runner.step() {
            CubikEvent::Tick | CubikEvent::Resize => {}
            CubikEvent::Key(key) => {
                if !app.handle_key(key) {
                    break;
                }
            }
        }
        app.session.pump();
        terminal.draw(|f| ui::draw(app, f))?;
    }

    Ok(())
}

fn print_stats(solves: &[cubik::Solve]) {
    let averages = stats::calculate_averages(solves);
    let summary = stats::summarize(solves);
    println!("solves     {} ({} dnf)", summary.solves, summary.dnfs);
    println!("best       {}", format_optional_ms(averages.best));
    println!("worst      {}", format_optional_ms(averages.worst));
    println!("mean       {}", format_optional_ms(summary.mean));
    println!("ao5        {}", format_average(averages.ao5));
    println!("ao12       {}", format_average(averages.ao12));
    println!("ao100      {}", format_average(averages.ao100));
    println!(
        "best ao5   {}",
        format_optional_ms(stats::best_average(solves, stats::AO5))
    );
    println!(
        "best ao12  {}",
        format_optional_ms(stats::best_average(solves, stats::AO12))
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn release(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        }
    }

    fn app(release_events: bool) -> App {
        let config = Config {
            inspection_enabled: false,
            ..Config::default()
        };
        App::new(&config, Some("R U R'".into()), None, release_events).unwrap()
    }

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["cubik"]);
        assert_eq!(cli.command, None);
        assert!(!cli.no_inspection);
        assert_eq!(cli.inspection_secs, None);
        assert_eq!(cli.hold_ms, None);
        assert!(!cli.touch);
        assert_eq!(cli.apply(Config::default()), Config::default());
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "cubik",
            "--no-inspection",
            "-i",
            "8",
            "--hold-ms",
            "100",
            "--touch",
            "-k",
            "enter",
        ]);
        let config = cli.apply(Config::default());
        assert!(!config.inspection_enabled);
        assert_eq!(config.inspection_duration_ms, 8_000);
        assert_eq!(config.hold_duration_ms, Some(100));
        assert!(config.touch_primary);
        assert_eq!(config.primary_key, "enter");
        assert_eq!(config.timer_settings().hold_duration_ms, 100);
    }

    #[test]
    fn test_cli_subcommands() {
        let cli = Cli::parse_from(["cubik", "export", "out.csv"]);
        assert_eq!(
            cli.command,
            Some(Command::Export {
                path: PathBuf::from("out.csv")
            })
        );
        let cli = Cli::parse_from(["cubik", "stats"]);
        assert_eq!(cli.command, Some(Command::Stats));
    }

    #[test]
    fn test_app_without_release_events_starts_on_press() {
        let mut app = app(false);
        assert!(app.handle_key(press(KeyCode::Char(' '))));
        assert_eq!(app.session.state(), TimerState::Timing);

        assert!(app.handle_key(press(KeyCode::Char(' '))));
        assert_eq!(app.session.state(), TimerState::Stopped);
        assert_eq!(app.session.solves().len(), 1);
        assert_eq!(app.session.solves()[0].scramble.as_deref(), Some("R U R'"));
    }

    #[test]
    fn test_app_with_release_events_needs_hold() {
        let mut app = app(true);
        app.handle_key(press(KeyCode::Char(' ')));
        assert_eq!(app.session.state(), TimerState::Ready);
        // released immediately, well under the hold time
        app.handle_key(release(KeyCode::Char(' ')));
        assert_eq!(app.session.state(), TimerState::Idle);
    }

    #[test]
    fn test_app_edit_keys() {
        let mut app = app(false);
        app.handle_key(press(KeyCode::Char(' ')));
        app.handle_key(press(KeyCode::Char(' ')));

        app.handle_key(press(KeyCode::Char('2')));
        assert_eq!(app.session.solves()[0].penalty, Penalty::Plus2);
        app.handle_key(press(KeyCode::Char('d')));
        assert_eq!(app.session.solves()[0].penalty, Penalty::Dnf);
        app.handle_key(press(KeyCode::Backspace));
        assert!(app.session.solves().is_empty());
    }

    #[test]
    fn test_app_quit_keys() {
        let mut app = app(true);
        assert!(!app.handle_key(press(KeyCode::Esc)));
        assert!(!app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
    }

    #[test]
    fn test_app_reset_key() {
        let mut app = app(false);
        app.handle_key(press(KeyCode::Char(' ')));
        assert_eq!(app.session.state(), TimerState::Timing);
        app.handle_key(press(KeyCode::Char('r')));
        assert_eq!(app.session.state(), TimerState::Idle);
        assert!(app.session.solves().is_empty());
    }
}
