use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use cubik::format::{format_average, format_countdown, format_ms, format_optional_ms, format_solve};
use cubik::solve::Penalty;
use cubik::timer::TimerState;

use crate::App;

const RECENT_SOLVES: usize = 12;

pub fn draw(app: &App, f: &mut Frame) {
    let area = f.area();

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .margin(1)
        .constraints([Constraint::Min(30), Constraint::Length(28)])
        .split(area);

    let main = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // scramble
            Constraint::Min(5),    // timer
            Constraint::Length(3), // help
        ])
        .split(columns[0]);

    render_scramble(app, f, main[0]);
    render_timer(app, f, main[1]);
    render_help(app, f, main[2]);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(11), Constraint::Min(3)])
        .split(columns[1]);

    render_averages(app, f, side[0]);
    render_recent(app, f, side[1]);
}

fn render_scramble(app: &App, f: &mut Frame, area: Rect) {
    let text = app
        .session
        .scramble()
        .map(str::to_string)
        .unwrap_or_else(|| "no scramble".to_string());
    let widget = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Scramble"))
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center);
    f.render_widget(widget, area);
}

/// Text and colour of the main readout for the current state
fn timer_readout(app: &App) -> (String, Style) {
    let session = &app.session;
    let display = session.display();
    let bold = Style::default().add_modifier(Modifier::BOLD);

    match (session.state(), display.inspection_remaining_ms) {
        (TimerState::Inspection, Some(remaining)) | (TimerState::Ready, Some(remaining)) => {
            let color = if remaining == 0 {
                Color::Red
            } else if session.state() == TimerState::Ready {
                Color::Green
            } else {
                Color::Yellow
            };
            (
                format_countdown(remaining, display.pending_penalty),
                bold.fg(color),
            )
        }
        (TimerState::Ready, None) => ("0.00".to_string(), bold.fg(Color::Green)),
        (TimerState::Timing, _) => (format_ms(display.elapsed_ms), bold.fg(Color::White)),
        (TimerState::Stopped, _) | (TimerState::Idle, _) | (TimerState::Inspection, None) => {
            let text = session
                .solves()
                .last()
                .map(format_solve)
                .unwrap_or_else(|| "0.00".to_string());
            let color = if session.last_was_best() && session.state() == TimerState::Stopped {
                Color::Magenta
            } else {
                Color::Cyan
            };
            (text, bold.fg(color))
        }
    }
}

fn render_timer(app: &App, f: &mut Frame, area: Rect) {
    let (text, style) = timer_readout(app);

    let mut lines = vec![Line::from(""), Line::from(Span::styled(text, style))];
    match app.session.state() {
        TimerState::Stopped if app.session.last_was_best() => {
            lines.push(Line::from(Span::styled(
                "new best single",
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::ITALIC),
            )));
        }
        TimerState::Timing if app.session.display().pending_penalty != Penalty::None => {
            lines.push(Line::from(Span::styled(
                format!("inspection penalty: {}", app.session.display().pending_penalty),
                Style::default().fg(Color::Red),
            )));
        }
        _ => {}
    }

    let title = format!("{}", app.session.state());
    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title))
        .alignment(Alignment::Center);
    f.render_widget(widget, area);
}

fn render_help(app: &App, f: &mut Frame, area: Rect) {
    let primary = app.control.code().to_lowercase();
    let text = format!(
        "hold ({primary}) to start | (2) +2 | (d) DNF | (backspace) delete | (r) reset | (esc) quit"
    );
    let widget = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL))
        .style(
            Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::ITALIC),
        )
        .alignment(Alignment::Center);
    f.render_widget(widget, area);
}

fn render_averages(app: &App, f: &mut Frame, area: Rect) {
    let averages = app.session.averages();
    let summary = app.session.summary();
    let label = Style::default().fg(Color::Yellow);

    let row = |name: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("{name:<9}"), label),
            Span::raw(value),
        ])
    };

    let lines = vec![
        row("solves", format!("{} ({} dnf)", summary.solves, summary.dnfs)),
        row("best", format_optional_ms(averages.best)),
        row("worst", format_optional_ms(averages.worst)),
        row("mean", format_optional_ms(summary.mean)),
        row("ao5", format_average(averages.ao5)),
        row("ao12", format_average(averages.ao12)),
        row("ao100", format_average(averages.ao100)),
        row("best ao5", format_optional_ms(app.session.best_ao5())),
        row("best ao12", format_optional_ms(app.session.best_ao12())),
    ];

    let widget = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Stats"));
    f.render_widget(widget, area);
}

fn render_recent(app: &App, f: &mut Frame, area: Rect) {
    let solves = app.session.solves();
    let lines = solves
        .iter()
        .enumerate()
        .rev()
        .take(RECENT_SOLVES)
        .map(|(idx, solve)| {
            let style = match solve.penalty {
                Penalty::None => Style::default(),
                Penalty::Plus2 => Style::default().fg(Color::Yellow),
                Penalty::Dnf => Style::default().fg(Color::Red),
            };
            Line::from(vec![
                Span::styled(format!("{:>4}. ", idx + 1), Style::default().fg(Color::DarkGray)),
                Span::styled(format_solve(solve), style),
            ])
        })
        .collect::<Vec<Line>>();

    let widget = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Recent"));
    f.render_widget(widget, area);
}
