use crate::solve::{Penalty, Solve};
use crate::stats::Average;

/// Render milliseconds as `s.cc` or `m:ss.cc`, truncating to hundredths
pub fn format_ms(ms: u64) -> String {
    let centis = ms / 10;
    let minutes = centis / 6000;
    let seconds = (centis / 100) % 60;
    let hundredths = centis % 100;

    if minutes > 0 {
        format!("{minutes}:{seconds:02}.{hundredths:02}")
    } else {
        format!("{seconds}.{hundredths:02}")
    }
}

/// A solve as shown in lists: `12.34`, `14.34+`, or `DNF(12.34)`
pub fn format_solve(solve: &Solve) -> String {
    match solve.penalty {
        Penalty::None => format_ms(solve.time_ms),
        Penalty::Plus2 => format!("{}+", format_ms(solve.effective_time().finite().unwrap_or(0))),
        Penalty::Dnf => format!("DNF({})", format_ms(solve.time_ms)),
    }
}

/// `-` when there is not enough data, `DNF` for a DNF average
pub fn format_average(average: Option<Average>) -> String {
    match average {
        None => "-".to_string(),
        Some(Average::Dnf) => "DNF".to_string(),
        Some(Average::Time(ms)) => format_ms(ms),
    }
}

pub fn format_optional_ms(ms: Option<u64>) -> String {
    ms.map_or_else(|| "-".to_string(), format_ms)
}

/// Inspection countdown in whole seconds, rounded up, or the penalty once past zero
pub fn format_countdown(remaining_ms: u64, pending: Penalty) -> String {
    if remaining_ms > 0 {
        remaining_ms.div_ceil(1000).to_string()
    } else {
        match pending {
            Penalty::Dnf => "DNF".to_string(),
            _ => "+2".to_string(),
        }
    }
}
