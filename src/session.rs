use tracing::{info, warn};

use crate::history::{HistoryError, SolveStore};
use crate::solve::{Penalty, Solve};
use crate::stats::{
    best_average, calculate_averages, is_new_best, summarize, Averages, SessionSummary, AO12, AO5,
};
use crate::timer::{Clock, SystemClock, TimerEvent, TimerState, TimerStateMachine};

/// What the timing display should currently show
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerDisplay {
    pub elapsed_ms: u64,
    pub inspection_remaining_ms: Option<u64>,
    pub pending_penalty: Penalty,
}

/// Host glue around the timer: turns stop events into solves, keeps the
/// history (optionally persisted), and refreshes statistics after every change.
#[derive(Debug)]
pub struct Session<C: Clock = SystemClock> {
    timer: TimerStateMachine<Vec<TimerEvent>, C>,
    solves: Vec<Solve>,
    ids: Vec<Option<i64>>,
    store: Option<SolveStore>,
    scramble: Option<String>,
    display: TimerDisplay,
    averages: Averages,
    best_ao5: Option<u64>,
    best_ao12: Option<u64>,
    last_was_best: bool,
}

impl<C: Clock> Session<C> {
    /// Build a session, loading any history already in `store`
    pub fn new(
        timer: TimerStateMachine<Vec<TimerEvent>, C>,
        store: Option<SolveStore>,
    ) -> Result<Self, HistoryError> {
        let (solves, ids): (Vec<Solve>, Vec<Option<i64>>) = match &store {
            Some(store) => store
                .all()?
                .into_iter()
                .map(|stored| (stored.solve, Some(stored.id)))
                .unzip(),
            None => (Vec::new(), Vec::new()),
        };

        let mut session = Self {
            timer,
            solves,
            ids,
            store,
            scramble: None,
            display: TimerDisplay::default(),
            averages: Averages::default(),
            best_ao5: None,
            best_ao12: None,
            last_was_best: false,
        };
        session.refresh();
        info!(solves = session.solves.len(), "session loaded");
        Ok(session)
    }

    pub fn state(&self) -> TimerState {
        self.timer.state()
    }

    pub fn solves(&self) -> &[Solve] {
        &self.solves
    }

    pub fn display(&self) -> TimerDisplay {
        self.display
    }

    pub fn averages(&self) -> Averages {
        self.averages
    }

    pub fn best_ao5(&self) -> Option<u64> {
        self.best_ao5
    }

    pub fn best_ao12(&self) -> Option<u64> {
        self.best_ao12
    }

    pub fn summary(&self) -> SessionSummary {
        summarize(&self.solves)
    }

    /// Whether the most recent stop set a new single best
    pub fn last_was_best(&self) -> bool {
        self.last_was_best
    }

    /// Scramble attached to the next recorded solve
    pub fn set_scramble(&mut self, scramble: Option<String>) {
        self.scramble = scramble;
    }

    pub fn scramble(&self) -> Option<&str> {
        self.scramble.as_deref()
    }

    pub fn key_down(&mut self, code: &str, repeat: bool) {
        self.timer.handle_key_down(code, repeat);
        self.process_events();
    }

    pub fn key_up(&mut self, code: &str) {
        self.timer.handle_key_up(code);
        self.process_events();
    }

    pub fn pump(&mut self) {
        self.timer.pump();
        self.process_events();
    }

    pub fn reset_timer(&mut self) {
        self.timer.reset();
        self.process_events();
    }

    fn process_events(&mut self) {
        let events = std::mem::take(self.timer.listener_mut());
        for event in events {
            match event {
                TimerEvent::StateChanged(TimerState::Inspection) => {
                    self.display.inspection_remaining_ms =
                        Some(self.timer.settings().inspection_duration_ms);
                }
                TimerEvent::StateChanged(TimerState::Timing) => {
                    self.display = TimerDisplay {
                        pending_penalty: self.timer.pending_penalty(),
                        ..TimerDisplay::default()
                    };
                }
                TimerEvent::StateChanged(TimerState::Idle) => {
                    self.display = TimerDisplay::default();
                }
                TimerEvent::StateChanged(_) => {}
                TimerEvent::Tick(elapsed_ms) => self.display.elapsed_ms = elapsed_ms,
                TimerEvent::InspectionTick(remaining_ms) => {
                    self.display.inspection_remaining_ms = Some(remaining_ms);
                    self.display.pending_penalty = self.timer.pending_penalty();
                }
                TimerEvent::Stopped {
                    elapsed_ms,
                    penalty,
                } => {
                    self.display.elapsed_ms = elapsed_ms;
                    self.record(elapsed_ms, penalty);
                }
            }
        }
    }

    fn record(&mut self, elapsed_ms: u64, penalty: Penalty) {
        let mut solve = Solve::new(elapsed_ms, penalty);
        solve.scramble = self.scramble.take();
        self.last_was_best = is_new_best(self.averages.best, solve.effective_time());

        let id = self.store.as_ref().and_then(|store| match store.record(&solve) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "failed to persist solve");
                None
            }
        });
        info!(elapsed_ms, %penalty, best = self.last_was_best, "solve recorded");

        self.solves.push(solve);
        self.ids.push(id);
        self.refresh();
    }

    /// Replace the penalty of the most recent solve. Returns false with no solves.
    pub fn set_last_penalty(&mut self, penalty: Penalty) -> bool {
        let Some(last) = self.solves.last_mut() else {
            return false;
        };
        last.penalty = penalty;

        if let (Some(store), Some(Some(id))) = (&self.store, self.ids.last()) {
            if let Err(e) = store.set_penalty(*id, penalty) {
                warn!(error = %e, id, "failed to update penalty");
            }
        }
        self.refresh();
        true
    }

    /// Apply `penalty` to the last solve, or clear it if already applied
    pub fn toggle_last_penalty(&mut self, penalty: Penalty) -> bool {
        let next = match self.solves.last() {
            Some(last) if last.penalty == penalty => Penalty::None,
            Some(_) => penalty,
            None => return false,
        };
        self.set_last_penalty(next)
    }

    pub fn delete_last(&mut self) -> Option<Solve> {
        let solve = self.solves.pop()?;
        if let (Some(store), Some(Some(id))) = (&self.store, self.ids.pop()) {
            if let Err(e) = store.delete(id) {
                warn!(error = %e, id, "failed to delete solve");
            }
        }
        self.last_was_best = false;
        self.refresh();
        Some(solve)
    }

    fn refresh(&mut self) {
        self.averages = calculate_averages(&self.solves);
        self.best_ao5 = best_average(&self.solves, AO5);
        self.best_ao12 = best_average(&self.solves, AO12);
    }
}
