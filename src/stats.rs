//! Competition statistics over an ordered solve history.
//!
//! Everything here is a pure function of the slice it is given. Callers
//! pass exactly the history they want considered, oldest first.

use itertools::{Itertools, MinMaxResult};

use crate::solve::{EffectiveTime, Solve};
use crate::util::{rounded_mean, std_dev};

pub const AO5: usize = 5;
pub const AO12: usize = 12;
pub const AO100: usize = 100;

/// Outcome of a trimmed average that had enough data to be computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Average {
    /// Trimmed mean in whole milliseconds
    Time(u64),
    /// Too many DNFs in the window: the average itself is a DNF
    Dnf,
}

impl Average {
    pub fn time(&self) -> Option<u64> {
        match self {
            Average::Time(ms) => Some(*ms),
            Average::Dnf => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Averages {
    pub ao5: Option<Average>,
    pub ao12: Option<Average>,
    pub ao100: Option<Average>,
    pub best: Option<u64>,
    pub worst: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionSummary {
    pub solves: usize,
    pub dnfs: usize,
    /// Plain mean of every non-DNF effective time
    pub mean: Option<u64>,
    pub std_dev: Option<f64>,
}

/// Entries dropped from each end of a window before averaging
pub fn trim_count(window_size: usize) -> usize {
    if window_size < 100 {
        1
    } else {
        5
    }
}

/// Trimmed average of the most recent `window_size` solves.
///
/// `None` means there is not enough data (fewer solves than the window, or a
/// window with nothing left after trimming). `Some(Average::Dnf)` means the
/// window has more DNFs than can be trimmed away, whatever its size.
pub fn compute_trimmed_average(solves: &[Solve], window_size: usize) -> Option<Average> {
    if window_size == 0 || solves.len() < window_size {
        return None;
    }

    let mut times = solves[solves.len() - window_size..]
        .iter()
        .map(Solve::effective_time)
        .collect::<Vec<EffectiveTime>>();
    times.sort_unstable();

    trimmed_mean_of_sorted(&times)
}

fn trimmed_mean_of_sorted(sorted: &[EffectiveTime]) -> Option<Average> {
    let trim = trim_count(sorted.len());
    if sorted.iter().filter(|t| t.is_dnf()).count() > trim {
        return Some(Average::Dnf);
    }
    if sorted.len() <= trim * 2 {
        return None;
    }

    // DNFs sort last, so with at most `trim` of them none survive the cut
    let kept = sorted[trim..sorted.len() - trim]
        .iter()
        .filter_map(EffectiveTime::finite)
        .collect::<Vec<u64>>();

    rounded_mean(&kept).map(Average::Time)
}

pub fn calculate_averages(solves: &[Solve]) -> Averages {
    let (best, worst) = match solves
        .iter()
        .filter_map(|s| s.effective_time().finite())
        .minmax()
    {
        MinMaxResult::NoElements => (None, None),
        MinMaxResult::OneElement(ms) => (Some(ms), Some(ms)),
        MinMaxResult::MinMax(min, max) => (Some(min), Some(max)),
    };

    Averages {
        ao5: compute_trimmed_average(solves, AO5),
        ao12: compute_trimmed_average(solves, AO12),
        ao100: compute_trimmed_average(solves, AO100),
        best,
        worst,
    }
}

/// Lowest trimmed average over every contiguous window of `window_size`.
///
/// DNF averages and non-positive results never qualify. The window is slid
/// one solve at a time over a sorted buffer instead of re-sorting each
/// window; results match recomputing every window from scratch. Only a
/// strictly lower average replaces the current best, so the earliest window
/// wins a tie.
pub fn best_average(solves: &[Solve], window_size: usize) -> Option<u64> {
    if window_size == 0 || solves.len() < window_size {
        return None;
    }

    let mut sorted = solves[..window_size]
        .iter()
        .map(Solve::effective_time)
        .collect::<Vec<EffectiveTime>>();
    sorted.sort_unstable();

    let mut best: Option<u64> = None;
    for start in 0..=solves.len() - window_size {
        if start > 0 {
            let outgoing = solves[start - 1].effective_time();
            if let Ok(idx) = sorted.binary_search(&outgoing) {
                sorted.remove(idx);
            }
            let incoming = solves[start + window_size - 1].effective_time();
            let idx = sorted.partition_point(|t| *t <= incoming);
            sorted.insert(idx, incoming);
        }

        if let Some(Average::Time(ms)) = trimmed_mean_of_sorted(&sorted) {
            if ms > 0 && best.map_or(true, |b| ms < b) {
                best = Some(ms);
            }
        }
    }

    best
}

/// Whether `candidate` beats `previous_best`. Ties are not a new best.
pub fn is_new_best(previous_best: Option<u64>, candidate: EffectiveTime) -> bool {
    match (candidate, previous_best) {
        (EffectiveTime::Dnf, _) => false,
        (EffectiveTime::Finite(_), None) => true,
        (EffectiveTime::Finite(ms), Some(best)) => ms < best,
    }
}

pub fn summarize(solves: &[Solve]) -> SessionSummary {
    let finite = solves
        .iter()
        .filter_map(|s| s.effective_time().finite())
        .collect::<Vec<u64>>();

    SessionSummary {
        solves: solves.len(),
        dnfs: solves.len() - finite.len(),
        mean: rounded_mean(&finite),
        std_dev: std_dev(&finite),
    }
}
