//! Hold-to-start solve timer.
//!
//! The machine is driven synchronously by the host: key events go through
//! [`TimerStateMachine::handle_key_down`] / [`TimerStateMachine::handle_key_up`]
//! and periodic work happens when the host calls [`TimerStateMachine::pump`]
//! from its event loop. Each periodic concern (stopwatch tick, inspection
//! countdown) is a single `Option<Interval>` owned by the machine; every
//! transition that supersedes one clears it before the next state is entered.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use tracing::debug;

use crate::solve::Penalty;

pub const TICK_INTERVAL_MS: u64 = 10;
pub const INSPECTION_INTERVAL_MS: u64 = 100;
pub const DEFAULT_HOLD_MS: u64 = 300;
pub const TOUCH_HOLD_MS: u64 = 500;
pub const DEFAULT_INSPECTION_MS: u64 = 15_000;
/// Starting more than this far past the inspection limit is a DNF, otherwise +2
pub const DNF_OVERTIME_MS: u64 = 2_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum TimerState {
    Idle,
    Inspection,
    Ready,
    Timing,
    Stopped,
}

/// Millisecond time source
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Monotonic wall clock measured from construction
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Hand-driven clock for tests and headless drivers. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerSettings {
    /// How long the control must be held before release starts anything
    pub hold_duration_ms: u64,
    pub inspection_duration_ms: u64,
    pub inspection_enabled: bool,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            hold_duration_ms: DEFAULT_HOLD_MS,
            inspection_duration_ms: DEFAULT_INSPECTION_MS,
            inspection_enabled: true,
        }
    }
}

impl TimerSettings {
    /// Defaults for devices where touch is the primary input
    pub fn for_touch() -> Self {
        Self {
            hold_duration_ms: TOUCH_HOLD_MS,
            ..Self::default()
        }
    }

    pub fn apply(&mut self, update: TimerSettingsUpdate) {
        if let Some(ms) = update.inspection_duration_ms {
            self.inspection_duration_ms = ms;
        }
        if let Some(ms) = update.hold_duration_ms {
            self.hold_duration_ms = ms;
        }
        if let Some(enabled) = update.inspection_enabled {
            self.inspection_enabled = enabled;
        }
    }
}

/// Partial settings change; `None` fields keep their current value
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimerSettingsUpdate {
    pub inspection_duration_ms: Option<u64>,
    pub hold_duration_ms: Option<u64>,
    pub inspection_enabled: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerEvent {
    StateChanged(TimerState),
    Tick(u64),
    InspectionTick(u64),
    Stopped { elapsed_ms: u64, penalty: Penalty },
}

/// Receives the machine's output. All methods default to doing nothing.
pub trait TimerListener {
    fn on_state_change(&mut self, _state: TimerState) {}
    fn on_tick(&mut self, _elapsed_ms: u64) {}
    fn on_inspection_tick(&mut self, _remaining_ms: u64) {}
    fn on_stop(&mut self, _elapsed_ms: u64, _penalty: Penalty) {}
}

/// Queue of events for hosts that prefer to drain output after each call
impl TimerListener for Vec<TimerEvent> {
    fn on_state_change(&mut self, state: TimerState) {
        self.push(TimerEvent::StateChanged(state));
    }

    fn on_tick(&mut self, elapsed_ms: u64) {
        self.push(TimerEvent::Tick(elapsed_ms));
    }

    fn on_inspection_tick(&mut self, remaining_ms: u64) {
        self.push(TimerEvent::InspectionTick(remaining_ms));
    }

    fn on_stop(&mut self, elapsed_ms: u64, penalty: Penalty) {
        self.push(TimerEvent::Stopped {
            elapsed_ms,
            penalty,
        });
    }
}

/// A periodic callback. Fires at most once per pump; missed periods coalesce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Interval {
    period_ms: u64,
    next_due_ms: u64,
}

impl Interval {
    fn every(period_ms: u64, now: u64) -> Self {
        Self {
            period_ms,
            next_due_ms: now + period_ms,
        }
    }

    fn fire(&mut self, now: u64) -> bool {
        if now < self.next_due_ms {
            return false;
        }
        let periods = (now - self.next_due_ms) / self.period_ms + 1;
        self.next_due_ms += periods * self.period_ms;
        true
    }
}

#[derive(Clone, Copy, Debug)]
struct Countdown {
    interval: Interval,
    /// Inspection length captured when the countdown began
    duration_ms: u64,
}

#[derive(Debug)]
pub struct TimerStateMachine<L: TimerListener, C: Clock = SystemClock> {
    state: TimerState,
    settings: TimerSettings,
    clock: C,
    listener: L,
    started_at: Option<u64>,
    inspection_started_at: Option<u64>,
    pending_penalty: Penalty,
    key_down: bool,
    key_down_at: Option<u64>,
    hold_required_ms: u64,
    tick: Option<Interval>,
    countdown: Option<Countdown>,
}

impl<L: TimerListener> TimerStateMachine<L, SystemClock> {
    pub fn new(settings: TimerSettings, listener: L) -> Self {
        Self::with_clock(settings, SystemClock::new(), listener)
    }
}

impl<L: TimerListener, C: Clock> TimerStateMachine<L, C> {
    pub fn with_clock(settings: TimerSettings, clock: C, listener: L) -> Self {
        Self {
            state: TimerState::Idle,
            settings,
            clock,
            listener,
            started_at: None,
            inspection_started_at: None,
            pending_penalty: Penalty::None,
            key_down: false,
            key_down_at: None,
            hold_required_ms: settings.hold_duration_ms,
            tick: None,
            countdown: None,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn settings(&self) -> TimerSettings {
        self.settings
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    pub fn pending_penalty(&self) -> Penalty {
        self.pending_penalty
    }

    pub fn inspection_started_at(&self) -> Option<u64> {
        self.inspection_started_at
    }

    pub fn is_key_down(&self) -> bool {
        self.key_down
    }

    pub fn has_live_tick(&self) -> bool {
        self.tick.is_some()
    }

    pub fn has_live_countdown(&self) -> bool {
        self.countdown.is_some()
    }

    /// Stopwatch reading while timing
    pub fn elapsed_ms(&self) -> Option<u64> {
        self.started_at
            .map(|started| self.clock.now_ms().saturating_sub(started))
    }

    /// Inspection time left while the countdown is live
    pub fn inspection_remaining_ms(&self) -> Option<u64> {
        match (self.countdown, self.inspection_started_at) {
            (Some(countdown), Some(started)) => {
                let elapsed = self.clock.now_ms().saturating_sub(started);
                Some(countdown.duration_ms.saturating_sub(elapsed))
            }
            _ => None,
        }
    }

    pub fn update_settings(&mut self, update: TimerSettingsUpdate) {
        self.settings.apply(update);
        debug!(settings = ?self.settings, "timer settings updated");
    }

    pub fn handle_key_down(&mut self, code: &str, repeat: bool) {
        if repeat || self.key_down {
            return;
        }
        let now = self.clock.now_ms();
        self.key_down = true;
        self.key_down_at = Some(now);
        debug!(code, state = %self.state, "key down");

        match self.state {
            TimerState::Idle | TimerState::Stopped | TimerState::Inspection => {
                self.hold_required_ms = self.settings.hold_duration_ms;
                self.transition(TimerState::Ready);
            }
            TimerState::Timing => self.stop(),
            TimerState::Ready => {}
        }
    }

    pub fn handle_key_up(&mut self, code: &str) {
        self.key_down = false;
        let key_down_at = self.key_down_at.take();
        if self.state != TimerState::Ready {
            return;
        }

        let now = self.clock.now_ms();
        let held_ms = now.saturating_sub(key_down_at.unwrap_or(now));
        let from_inspection = self.inspection_started_at.is_some();
        debug!(code, held_ms, from_inspection, "key up");

        // Releasing after inspection starts the solve at once, however short the hold.
        // The release-too-early return to inspection can therefore never trigger.
        if from_inspection || held_ms >= self.hold_required_ms {
            if self.settings.inspection_enabled && !from_inspection {
                self.begin_inspection(now);
            } else {
                self.begin_timing(now);
            }
        } else {
            self.transition(TimerState::Idle);
        }
    }

    /// Begin the inspection countdown. Only valid from `Idle` or `Stopped`.
    pub fn start_inspection(&mut self) {
        if matches!(self.state, TimerState::Idle | TimerState::Stopped) {
            let now = self.clock.now_ms();
            self.begin_inspection(now);
        }
    }

    /// Begin timing. Ignored while already timing.
    pub fn start(&mut self) {
        if self.state != TimerState::Timing {
            let now = self.clock.now_ms();
            self.begin_timing(now);
        }
    }

    /// Stop timing and emit the result. Ignored outside `Timing`.
    pub fn stop(&mut self) {
        if self.state != TimerState::Timing {
            return;
        }
        let now = self.clock.now_ms();
        let elapsed_ms = now.saturating_sub(self.started_at.take().unwrap_or(now));
        self.tick = None;
        self.transition(TimerState::Stopped);

        let penalty = self.pending_penalty;
        debug!(elapsed_ms, %penalty, "solve stopped");
        self.listener.on_stop(elapsed_ms, penalty);

        self.inspection_started_at = None;
        self.pending_penalty = Penalty::None;
    }

    /// Cancel everything in flight and return to `Idle`
    pub fn reset(&mut self) {
        self.tick = None;
        self.countdown = None;
        self.started_at = None;
        self.inspection_started_at = None;
        self.pending_penalty = Penalty::None;
        self.key_down = false;
        self.key_down_at = None;
        self.transition(TimerState::Idle);
    }

    /// Fire whichever periodic callbacks are due
    pub fn pump(&mut self) {
        let now = self.clock.now_ms();

        if let (Some(tick), Some(started)) = (self.tick.as_mut(), self.started_at) {
            if tick.fire(now) {
                self.listener.on_tick(now.saturating_sub(started));
            }
        }

        if let Some(countdown) = self.countdown.as_mut() {
            if countdown.interval.fire(now) {
                let duration_ms = countdown.duration_ms;
                self.inspection_tick(now, duration_ms);
            }
        }
    }

    fn begin_inspection(&mut self, now: u64) {
        self.inspection_started_at = Some(now);
        self.pending_penalty = Penalty::None;
        self.countdown = Some(Countdown {
            interval: Interval::every(INSPECTION_INTERVAL_MS, now),
            duration_ms: self.settings.inspection_duration_ms,
        });
        self.transition(TimerState::Inspection);
    }

    fn begin_timing(&mut self, now: u64) {
        // The penalty is settled against the instant timing starts
        if let Some(countdown) = self.countdown.take() {
            self.settle_penalty(now, countdown.duration_ms);
        }
        self.started_at = Some(now);
        self.tick = Some(Interval::every(TICK_INTERVAL_MS, now));
        self.transition(TimerState::Timing);
    }

    fn inspection_tick(&mut self, now: u64, duration_ms: u64) {
        let Some(started) = self.inspection_started_at else {
            return;
        };
        let elapsed = now.saturating_sub(started);
        let remaining = duration_ms.saturating_sub(elapsed);
        self.listener.on_inspection_tick(remaining);
        if remaining == 0 {
            self.settle_penalty(now, duration_ms);
        }
    }

    fn settle_penalty(&mut self, now: u64, duration_ms: u64) {
        let Some(started) = self.inspection_started_at else {
            return;
        };
        let elapsed = now.saturating_sub(started);
        if elapsed < duration_ms {
            return;
        }

        let penalty = if elapsed - duration_ms > DNF_OVERTIME_MS {
            Penalty::Dnf
        } else {
            Penalty::Plus2
        };
        if penalty != self.pending_penalty {
            debug!(overtime_ms = elapsed - duration_ms, %penalty, "inspection overrun");
            self.pending_penalty = penalty;
        }
    }

    fn transition(&mut self, target: TimerState) {
        if target == self.state {
            return;
        }
        debug!(from = %self.state, to = %target, "timer transition");
        self.state = target;
        self.listener.on_state_change(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const SPACE: &str = "Space";

    type TestMachine = TimerStateMachine<Vec<TimerEvent>, ManualClock>;

    fn machine(settings: TimerSettings) -> (TestMachine, ManualClock) {
        let clock = ManualClock::new(1_000);
        let m = TimerStateMachine::with_clock(settings, clock.clone(), Vec::new());
        (m, clock)
    }

    fn no_inspection() -> TimerSettings {
        TimerSettings {
            inspection_enabled: false,
            ..TimerSettings::default()
        }
    }

    fn drain(m: &mut TestMachine) -> Vec<TimerEvent> {
        std::mem::take(m.listener_mut())
    }

    fn hold(m: &mut TestMachine, clock: &ManualClock, ms: u64) {
        m.handle_key_down(SPACE, false);
        clock.advance(ms);
        m.handle_key_up(SPACE);
    }

    #[test]
    fn test_starts_idle_and_quiet() {
        let (mut m, _clock) = machine(TimerSettings::default());
        assert_eq!(m.state(), TimerState::Idle);
        assert!(drain(&mut m).is_empty());
    }

    #[test]
    fn test_reset_on_idle_fires_nothing() {
        let (mut m, _clock) = machine(TimerSettings::default());
        m.reset();
        assert_eq!(m.state(), TimerState::Idle);
        assert!(drain(&mut m).is_empty());
    }

    #[test]
    fn test_short_hold_returns_to_idle() {
        let (mut m, clock) = machine(no_inspection());
        hold(&mut m, &clock, 299);

        assert_eq!(m.state(), TimerState::Idle);
        assert_eq!(
            drain(&mut m),
            vec![
                TimerEvent::StateChanged(TimerState::Ready),
                TimerEvent::StateChanged(TimerState::Idle),
            ]
        );
        assert!(!m.has_live_tick());
    }

    #[test]
    fn test_full_hold_starts_timing() {
        let (mut m, clock) = machine(no_inspection());
        hold(&mut m, &clock, 300);

        assert_eq!(m.state(), TimerState::Timing);
        assert!(m.has_live_tick());
        assert_eq!(
            drain(&mut m),
            vec![
                TimerEvent::StateChanged(TimerState::Ready),
                TimerEvent::StateChanged(TimerState::Timing),
            ]
        );
    }

    #[test]
    fn test_repeat_key_down_is_ignored() {
        let (mut m, _clock) = machine(no_inspection());
        m.handle_key_down(SPACE, true);
        assert_eq!(m.state(), TimerState::Idle);
        assert!(!m.is_key_down());
        assert!(drain(&mut m).is_empty());
    }

    #[test]
    fn test_second_key_down_does_not_restart_hold() {
        let (mut m, clock) = machine(no_inspection());
        m.handle_key_down(SPACE, false);
        clock.advance(200);
        m.handle_key_down(SPACE, false);
        clock.advance(150);
        m.handle_key_up(SPACE);

        // measured from the first press: 350ms
        assert_eq!(m.state(), TimerState::Timing);
    }

    #[test]
    fn test_key_down_while_timing_stops() {
        let (mut m, clock) = machine(no_inspection());
        hold(&mut m, &clock, 300);
        drain(&mut m);

        clock.advance(12_345);
        m.handle_key_down(SPACE, false);

        assert_eq!(m.state(), TimerState::Stopped);
        assert_eq!(
            drain(&mut m),
            vec![
                TimerEvent::StateChanged(TimerState::Stopped),
                TimerEvent::Stopped {
                    elapsed_ms: 12_345,
                    penalty: Penalty::None
                },
            ]
        );
        assert!(!m.has_live_tick());
        assert_eq!(m.elapsed_ms(), None);

        // releasing the stopping press does nothing
        clock.advance(1_000);
        m.handle_key_up(SPACE);
        assert_eq!(m.state(), TimerState::Stopped);
        assert!(drain(&mut m).is_empty());
    }

    #[test]
    fn test_stopped_accepts_new_hold() {
        let (mut m, clock) = machine(no_inspection());
        hold(&mut m, &clock, 300);
        m.handle_key_down(SPACE, false);
        m.handle_key_up(SPACE);
        drain(&mut m);

        hold(&mut m, &clock, 500);
        assert_eq!(m.state(), TimerState::Timing);
        assert_eq!(
            drain(&mut m),
            vec![
                TimerEvent::StateChanged(TimerState::Ready),
                TimerEvent::StateChanged(TimerState::Timing),
            ]
        );
    }

    #[test]
    fn test_tick_interval_reports_elapsed() {
        let (mut m, clock) = machine(no_inspection());
        hold(&mut m, &clock, 300);
        drain(&mut m);

        clock.advance(5);
        m.pump();
        assert!(drain(&mut m).is_empty());

        clock.advance(5);
        m.pump();
        assert_eq!(drain(&mut m), vec![TimerEvent::Tick(10)]);

        // a late pump reports the current reading once
        clock.advance(15);
        m.pump();
        assert_eq!(drain(&mut m), vec![TimerEvent::Tick(25)]);

        clock.advance(1);
        m.pump();
        assert!(drain(&mut m).is_empty());

        clock.advance(4);
        m.pump();
        assert_eq!(drain(&mut m), vec![TimerEvent::Tick(30)]);
    }

    #[test]
    fn test_no_ticks_after_stop() {
        let (mut m, clock) = machine(no_inspection());
        hold(&mut m, &clock, 300);
        clock.advance(1_000);
        m.stop();
        drain(&mut m);

        clock.advance(1_000);
        m.pump();
        assert!(drain(&mut m).is_empty());
    }

    #[test]
    fn test_hold_starts_inspection_when_enabled() {
        let (mut m, clock) = machine(TimerSettings::default());
        hold(&mut m, &clock, 300);

        assert_eq!(m.state(), TimerState::Inspection);
        assert!(m.has_live_countdown());
        assert!(!m.has_live_tick());
        assert_eq!(m.inspection_started_at(), Some(1_300));

        clock.advance(100);
        m.pump();
        assert_eq!(
            drain(&mut m),
            vec![
                TimerEvent::StateChanged(TimerState::Ready),
                TimerEvent::StateChanged(TimerState::Inspection),
                TimerEvent::InspectionTick(14_900),
            ]
        );
        assert_eq!(m.inspection_remaining_ms(), Some(14_900));
    }

    #[test]
    fn test_short_hold_with_inspection_enabled_returns_idle() {
        let (mut m, clock) = machine(TimerSettings::default());
        hold(&mut m, &clock, 100);
        assert_eq!(m.state(), TimerState::Idle);
        assert!(!m.has_live_countdown());
    }

    #[test]
    fn test_countdown_keeps_running_while_ready() {
        let (mut m, clock) = machine(TimerSettings::default());
        hold(&mut m, &clock, 300);
        let inspection_start = m.inspection_started_at();
        drain(&mut m);

        clock.advance(1_000);
        m.handle_key_down(SPACE, false);
        assert_eq!(m.state(), TimerState::Ready);
        assert_eq!(m.inspection_started_at(), inspection_start);

        clock.advance(100);
        m.pump();
        assert_eq!(
            drain(&mut m),
            vec![
                TimerEvent::StateChanged(TimerState::Ready),
                TimerEvent::InspectionTick(13_900),
            ]
        );
    }

    #[test]
    fn test_release_after_inspection_starts_instantly() {
        let (mut m, clock) = machine(TimerSettings::default());
        hold(&mut m, &clock, 300);
        drain(&mut m);

        clock.advance(5_000);
        hold(&mut m, &clock, 10);

        assert_eq!(m.state(), TimerState::Timing);
        assert!(!m.has_live_countdown());
        assert!(m.has_live_tick());
        assert_eq!(m.pending_penalty(), Penalty::None);
        assert_eq!(
            drain(&mut m),
            vec![
                TimerEvent::StateChanged(TimerState::Ready),
                TimerEvent::StateChanged(TimerState::Timing),
            ]
        );
    }

    fn solve_after_inspection(start_after_ms: u64) -> Penalty {
        let (mut m, clock) = machine(TimerSettings::default());
        hold(&mut m, &clock, 300);
        let inspection_start = m.inspection_started_at().unwrap();

        // pump the countdown as a host would while the scramble is studied
        while clock.now_ms() < inspection_start + start_after_ms - 100 {
            clock.advance(100);
            m.pump();
        }
        m.handle_key_down(SPACE, false);
        clock.set(inspection_start + start_after_ms);
        m.handle_key_up(SPACE);
        assert_eq!(m.state(), TimerState::Timing);

        clock.advance(9_000);
        m.handle_key_down(SPACE, false);
        let stopped = drain(&mut m)
            .into_iter()
            .filter_map(|e| match e {
                TimerEvent::Stopped {
                    elapsed_ms,
                    penalty,
                } => Some((elapsed_ms, penalty)),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(stopped.len(), 1);
        assert_eq!(stopped[0].0, 9_000);
        stopped[0].1
    }

    #[test]
    fn test_start_within_inspection_has_no_penalty() {
        assert_eq!(solve_after_inspection(14_000), Penalty::None);
    }

    #[test]
    fn test_one_second_over_inspection_is_plus_two() {
        assert_eq!(solve_after_inspection(16_000), Penalty::Plus2);
    }

    #[test]
    fn test_exactly_two_seconds_over_is_plus_two() {
        assert_eq!(solve_after_inspection(17_000), Penalty::Plus2);
    }

    #[test]
    fn test_three_seconds_over_inspection_is_dnf() {
        assert_eq!(solve_after_inspection(18_000), Penalty::Dnf);
    }

    #[test]
    fn test_countdown_escalates_penalty() {
        let (mut m, clock) = machine(TimerSettings::default());
        hold(&mut m, &clock, 300);
        drain(&mut m);

        clock.advance(15_000);
        m.pump();
        assert_eq!(drain(&mut m), vec![TimerEvent::InspectionTick(0)]);
        assert_eq!(m.pending_penalty(), Penalty::Plus2);

        clock.advance(2_100);
        m.pump();
        assert_eq!(drain(&mut m), vec![TimerEvent::InspectionTick(0)]);
        assert_eq!(m.pending_penalty(), Penalty::Dnf);
    }

    #[test]
    fn test_penalty_is_consumed_by_one_stop() {
        let (mut m, clock) = machine(TimerSettings::default());
        hold(&mut m, &clock, 300);
        clock.advance(16_000);
        hold(&mut m, &clock, 0);
        m.stop();
        assert_eq!(m.pending_penalty(), Penalty::None);
        assert_eq!(m.inspection_started_at(), None);

        m.update_settings(TimerSettingsUpdate {
            inspection_enabled: Some(false),
            ..Default::default()
        });
        drain(&mut m);
        hold(&mut m, &clock, 300);
        clock.advance(1_000);
        m.stop();
        assert_matches!(
            drain(&mut m).last(),
            Some(TimerEvent::Stopped {
                penalty: Penalty::None,
                ..
            })
        );
    }

    #[test]
    fn test_stop_outside_timing_is_noop() {
        let (mut m, _clock) = machine(TimerSettings::default());
        m.stop();
        assert_eq!(m.state(), TimerState::Idle);
        assert!(drain(&mut m).is_empty());
    }

    #[test]
    fn test_start_inspection_only_from_idle_or_stopped() {
        let (mut m, clock) = machine(no_inspection());
        hold(&mut m, &clock, 300);
        drain(&mut m);

        m.start_inspection();
        assert_eq!(m.state(), TimerState::Timing);
        assert!(!m.has_live_countdown());

        m.stop();
        m.start_inspection();
        assert_eq!(m.state(), TimerState::Inspection);
        assert!(m.has_live_countdown());
    }

    #[test]
    fn test_start_while_timing_keeps_original_start() {
        let (mut m, clock) = machine(no_inspection());
        m.start();
        clock.advance(500);
        m.start();
        assert_eq!(m.elapsed_ms(), Some(500));
    }

    #[test]
    fn test_reset_cancels_everything() {
        let (mut m, clock) = machine(TimerSettings::default());
        hold(&mut m, &clock, 300);
        clock.advance(16_000);
        m.pump();
        hold(&mut m, &clock, 0);
        drain(&mut m);

        m.reset();
        assert_eq!(m.state(), TimerState::Idle);
        assert!(!m.has_live_tick());
        assert!(!m.has_live_countdown());
        assert_eq!(m.pending_penalty(), Penalty::None);
        assert_eq!(m.inspection_started_at(), None);
        assert_eq!(
            drain(&mut m),
            vec![TimerEvent::StateChanged(TimerState::Idle)]
        );

        clock.advance(1_000);
        m.pump();
        assert!(drain(&mut m).is_empty());
    }

    #[test]
    fn test_reset_during_inspection_stops_countdown() {
        let (mut m, clock) = machine(TimerSettings::default());
        hold(&mut m, &clock, 300);
        m.reset();
        drain(&mut m);

        clock.advance(500);
        m.pump();
        assert!(drain(&mut m).is_empty());
    }

    #[test]
    fn test_reset_clears_held_key() {
        let (mut m, clock) = machine(no_inspection());
        m.handle_key_down(SPACE, false);
        m.reset();
        assert!(!m.is_key_down());

        hold(&mut m, &clock, 300);
        assert_eq!(m.state(), TimerState::Timing);
    }

    #[test]
    fn test_hold_duration_update_applies_to_next_press() {
        let (mut m, clock) = machine(no_inspection());
        m.handle_key_down(SPACE, false);
        m.update_settings(TimerSettingsUpdate {
            hold_duration_ms: Some(50),
            ..Default::default()
        });
        clock.advance(100);
        m.handle_key_up(SPACE);
        // the press began under the 300ms requirement
        assert_eq!(m.state(), TimerState::Idle);

        hold(&mut m, &clock, 100);
        assert_eq!(m.state(), TimerState::Timing);
    }

    #[test]
    fn test_inspection_duration_update() {
        let (mut m, clock) = machine(TimerSettings::default());
        m.update_settings(TimerSettingsUpdate {
            inspection_duration_ms: Some(8_000),
            ..Default::default()
        });
        assert_eq!(m.settings().inspection_duration_ms, 8_000);
        assert_eq!(m.settings().hold_duration_ms, DEFAULT_HOLD_MS);

        hold(&mut m, &clock, 300);
        clock.advance(100);
        m.pump();
        assert_eq!(drain(&mut m).last(), Some(&TimerEvent::InspectionTick(7_900)));
    }

    #[test]
    fn test_stray_key_up_is_ignored() {
        let (mut m, _clock) = machine(TimerSettings::default());
        m.handle_key_up(SPACE);
        assert_eq!(m.state(), TimerState::Idle);
        assert!(drain(&mut m).is_empty());
    }

    #[test]
    fn test_touch_settings() {
        let settings = TimerSettings::for_touch();
        assert_eq!(settings.hold_duration_ms, TOUCH_HOLD_MS);
        assert_eq!(settings.inspection_duration_ms, DEFAULT_INSPECTION_MS);
        assert!(settings.inspection_enabled);
    }

    #[test]
    fn test_settings_partial_update_keeps_other_fields() {
        let mut settings = TimerSettings::default();
        settings.apply(TimerSettingsUpdate {
            inspection_enabled: Some(false),
            ..Default::default()
        });
        assert_eq!(
            settings,
            TimerSettings {
                inspection_enabled: false,
                ..TimerSettings::default()
            }
        );
    }
}
