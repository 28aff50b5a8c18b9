use std::io;
use std::sync::mpsc::{Receiver, Sender};
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use lights_core::fade::{FadeRequest, LEVEL_MAX};
use lights_core::wakelock::SleepInhibitor;
use log::Level;
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph},
};

use crate::log_capture::LogEntry;
use crate::mock_hw::{SharedSim, SimState};

const LEVEL_STEP: u8 = 16;
const BATTERY_STEP_VOLTS: f32 = 0.05;
const BATTERY_RANGE_VOLTS: (f32, f32) = (2.8, 4.3);
const HELP_TEXT: &str = "Space: On/Off | ↑/↓ or +/-: Level | ←/→: Battery voltage | Q/ESC: Quit";

// Extension trait for log::Level to provide UI rendering methods
trait LevelExt {
    fn color(&self) -> Color;
    fn prefix(&self) -> &str;
}

impl LevelExt for Level {
    fn color(&self) -> Color {
        match *self {
            Level::Error => Color::Red,
            Level::Warn => Color::Yellow,
            Level::Info => Color::Cyan,
            Level::Debug => Color::Gray,
            Level::Trace => Color::DarkGray,
        }
    }

    fn prefix(&self) -> &str {
        match *self {
            Level::Error => "[ERROR]",
            Level::Warn => "[WARN] ",
            Level::Info => "[INFO] ",
            Level::Debug => "[DEBUG]",
            Level::Trace => "[TRACE]",
        }
    }
}

/// What the control panel drives and observes
pub struct MockHwTui {
    pub sim: SharedSim,
    pub inhibitor: SleepInhibitor,
    /// Trigger source feeding the fade mailbox
    pub requests: Sender<FadeRequest>,
    pub logs: Receiver<LogEntry>,
}

// TUI state
struct TuiState {
    hw: MockHwTui,
    logs: Vec<LogEntry>,
    max_logs: usize,
    light_on: bool,
    level: u8,
    should_quit: bool,
}

impl TuiState {
    fn new(hw: MockHwTui) -> Self {
        Self {
            hw,
            logs: Vec::new(),
            max_logs: 200,
            light_on: false,
            level: 0,
            should_quit: false,
        }
    }

    fn collect_logs(&mut self) {
        while let Ok(entry) = self.hw.logs.try_recv() {
            self.logs.push(entry);
            if self.logs.len() > self.max_logs {
                self.logs.remove(0);
            }
        }
    }

    fn snapshot(&self) -> SimState {
        self.hw
            .sim
            .lock()
            .map(|sim| sim.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn request(&mut self, request: FadeRequest) {
        if self.hw.requests.send(request).is_err() {
            log::error!("Trigger source stopped, quitting");
            self.should_quit = true;
        }
    }

    fn toggle(&mut self) {
        self.light_on = !self.light_on;
        self.request(FadeRequest::OnOff(self.light_on));
    }

    fn step_level(&mut self, up: bool) {
        self.level = if up {
            self.level.saturating_add(LEVEL_STEP)
        } else {
            self.level.saturating_sub(LEVEL_STEP)
        };
        self.light_on = self.level > 0;
        self.request(FadeRequest::Level(self.level));
    }

    fn adjust_battery(&mut self, increase: bool) {
        let delta = if increase { BATTERY_STEP_VOLTS } else { -BATTERY_STEP_VOLTS };
        if let Ok(mut sim) = self.hw.sim.lock() {
            let (min, max) = BATTERY_RANGE_VOLTS;
            sim.battery_volts = (sim.battery_volts + delta).clamp(min, max);
        }
    }
}

pub fn run(hw: MockHwTui) -> Result<(), io::Error> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut tui_state = TuiState::new(hw);
    log::info!("Mock hardware TUI started");

    let result = event_loop(&mut terminal, &mut tui_state);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    tui_state: &mut TuiState,
) -> Result<(), io::Error> {
    while !tui_state.should_quit {
        tui_state.collect_logs();
        terminal.draw(|f| ui(f, tui_state))?;

        // Poll for events with timeout
        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => tui_state.should_quit = true,
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    tui_state.should_quit = true;
                }
                KeyCode::Char(' ') => tui_state.toggle(),
                KeyCode::Up | KeyCode::Char('+') | KeyCode::Char('=') => tui_state.step_level(true),
                KeyCode::Down | KeyCode::Char('-') => tui_state.step_level(false),
                KeyCode::Right => tui_state.adjust_battery(true),
                KeyCode::Left => tui_state.adjust_battery(false),
                _ => {}
            }
        }
    }
    Ok(())
}

fn ui(f: &mut Frame, state: &TuiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // Title
            Constraint::Length(12), // Hardware
            Constraint::Min(8),     // Logs
            Constraint::Length(3),  // Help
        ])
        .split(f.area());

    let title = Paragraph::new("Light Controller Simulator")
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, chunks[0]);

    render_hardware(f, chunks[1], state);
    render_logs(f, chunks[2], state);

    let help = Paragraph::new(HELP_TEXT)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, chunks[3]);
}

fn render_hardware(f: &mut Frame, area: Rect, state: &TuiState) {
    let block = Block::default().borders(Borders::ALL).title("Hardware");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let sim = state.snapshot();
    let (battery_min, battery_max) = BATTERY_RANGE_VOLTS;

    let attribute_label = match sim.battery_attribute {
        Some(value) => format!("Battery remaining: {:.1}%", value as f32 / 2.0),
        None => "Battery remaining: not reported yet".to_string(),
    };
    let gauges = [
        (
            format!(
                "Light output: {:.1}% duty ({} bits)",
                sim.light_duty * 100.0,
                sim.light_bit_depth
            ),
            sim.light_duty,
            Color::Yellow,
        ),
        (
            format!(
                "Requested: {} ({}/{})",
                if state.light_on { "ON" } else { "OFF" },
                state.level,
                LEVEL_MAX
            ),
            state.level as f32 / LEVEL_MAX as f32,
            Color::White,
        ),
        (
            format!("Battery cell: {:.2} V", sim.battery_volts),
            (sim.battery_volts - battery_min) / (battery_max - battery_min),
            Color::Green,
        ),
        (
            attribute_label,
            sim.battery_attribute.unwrap_or(0) as f32 / 200.0,
            Color::Green,
        ),
    ];

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(2),
            Constraint::Length(2),
            Constraint::Length(2),
            Constraint::Length(2),
        ])
        .split(inner);

    for (i, (label, ratio, color)) in gauges.into_iter().enumerate() {
        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(color))
            .ratio(ratio.clamp(0.0, 1.0) as f64)
            .label(label);
        f.render_widget(gauge, layout[i]);
    }

    let held = state.hw.inhibitor.count();
    let sleep = Paragraph::new(format!(
        "Wakelocks held: {} - light sleep {}",
        held,
        if held > 0 { "inhibited" } else { "allowed" }
    ))
    .style(Style::default().fg(if held > 0 { Color::Yellow } else { Color::Gray }));
    f.render_widget(sleep, layout[4]);
}

fn render_logs(f: &mut Frame, area: Rect, state: &TuiState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Logs (scrolls automatically)");

    let inner = block.inner(area);
    f.render_widget(block, area);

    // Show last N logs that fit in the area
    let max_logs = inner.height as usize;
    let start_idx = state.logs.len().saturating_sub(max_logs);

    let log_items: Vec<ListItem> = state.logs[start_idx..]
        .iter()
        .map(|log| {
            let content = Line::from(vec![
                Span::styled(log.level.prefix(), Style::default().fg(log.level.color())),
                Span::raw(" "),
                Span::styled(&log.target, Style::default().fg(Color::DarkGray)),
                Span::raw(": "),
                Span::raw(&log.message),
            ]);
            ListItem::new(content)
        })
        .collect();

    f.render_widget(List::new(log_items), inner);
}
