use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyCode, KeyEvent, KeyEventKind};
use tracing::warn;

use crate::timer::TICK_INTERVAL_MS;

/// One step of input for the main loop. `Tick` means nothing arrived in time.
#[derive(Clone, Debug)]
pub enum CubikEvent {
    Key(KeyEvent),
    Resize,
    Tick,
}

/// Where the runner pulls key and resize events from
pub trait CubikEventSource: Send + 'static {
    fn recv_timeout(&self, timeout: Duration) -> Result<CubikEvent, RecvTimeoutError>;
}

/// Reads crossterm events on a background thread
pub struct CrosstermEventSource {
    rx: Receiver<CubikEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let evt = match event::read() {
                Ok(CtEvent::Key(key)) => CubikEvent::Key(key),
                Ok(CtEvent::Resize(_, _)) => CubikEvent::Resize,
                Ok(_) => continue,
                Err(e) => {
                    warn!(error = %e, "terminal event reader stopped");
                    break;
                }
            };
            if tx.send(evt).is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CubikEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<CubikEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Events pushed through a channel by a headless driver
pub struct TestEventSource {
    rx: Receiver<CubikEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<CubikEvent>) -> Self {
        Self { rx }
    }
}

impl CubikEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<CubikEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// How long the runner waits before reporting a `Tick`
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for FixedTicker {
    /// Matches the stopwatch resolution so the timer is pumped often enough
    fn default() -> Self {
        Self::new(Duration::from_millis(TICK_INTERVAL_MS))
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

pub struct Runner<E: CubikEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: CubikEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Next event, or `Tick` once the interval passes. A closed source only ticks.
    pub fn step(&self) -> CubikEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => CubikEvent::Tick,
        }
    }
}

/// Input on the primary control, already filtered from other keys
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimaryInput {
    Down { repeat: bool },
    Up,
}

/// Maps raw key events for one key onto press/release of the primary control.
///
/// Terminals that cannot report key releases get a release right after each
/// press; the hold requirement has to be zero for such a terminal to start.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrimaryControl {
    key: KeyCode,
    release_events: bool,
}

impl PrimaryControl {
    pub fn new(key: KeyCode, release_events: bool) -> Self {
        Self {
            key,
            release_events,
        }
    }

    /// `"space"`, `"enter"`, `"tab"`, or a single character
    pub fn from_name(name: &str, release_events: bool) -> Option<Self> {
        let key = match name.to_lowercase().as_str() {
            "space" => KeyCode::Char(' '),
            "enter" => KeyCode::Enter,
            "tab" => KeyCode::Tab,
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => KeyCode::Char(c),
                    _ => return None,
                }
            }
        };
        Some(Self::new(key, release_events))
    }

    pub fn key(&self) -> KeyCode {
        self.key
    }

    /// Name handed to the timer as the key code
    pub fn code(&self) -> String {
        match self.key {
            KeyCode::Char(' ') => "Space".to_string(),
            other => format!("{other:?}"),
        }
    }

    pub fn translate(&self, key: &KeyEvent) -> Vec<PrimaryInput> {
        if key.code != self.key {
            return Vec::new();
        }
        match (key.kind, self.release_events) {
            (KeyEventKind::Press, true) => vec![PrimaryInput::Down { repeat: false }],
            (KeyEventKind::Press, false) => {
                vec![PrimaryInput::Down { repeat: false }, PrimaryInput::Up]
            }
            (KeyEventKind::Repeat, true) => vec![PrimaryInput::Down { repeat: true }],
            (KeyEventKind::Repeat, false) => Vec::new(),
            (KeyEventKind::Release, _) => vec![PrimaryInput::Up],
        }
    }
}
