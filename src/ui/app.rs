// Main TUI application using ratatui
// Draws the track list, reads keys on a background thread, and runs the
// single event loop that feeds commands and playback outcomes to the
// coordinator.

use std::io::{self, Stdout};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::player::catalog::Catalog;
use crate::player::coordinator::Coordinator;
use crate::player::engine::Outcome;
use crate::player::output::AudioOutput;
use crate::player::selection::{Command, ErrorPolicy, ExitReason, SelectionSnapshot};

const DEFAULT_TITLE: &str = "Choose a sound to play with space or enter";
const INPUT_POLL: Duration = Duration::from_millis(100);

pub struct AmbientApp {
    coordinator: Coordinator,
    outcomes: mpsc::UnboundedReceiver<Outcome>,
}

impl AmbientApp {
    pub fn new(catalog: Catalog, policy: ErrorPolicy, output: Arc<dyn AudioOutput>) -> Self {
        let (coordinator, outcomes) = Coordinator::new(catalog, policy, output);
        AmbientApp {
            coordinator,
            outcomes,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<ExitReason> {
        let mut terminal = TerminalGuard::enter()?;

        let (command_tx, commands) = mpsc::unbounded_channel();
        spawn_input_reader(command_tx)?;

        let result = self.event_loop(&mut terminal, commands).await;

        // Playback stops on every exit path, before we hand the terminal back
        self.coordinator.shutdown().await;
        terminal.restore()?;

        if let Ok(reason) = &result {
            info!(?reason, "exiting");
        }
        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut TerminalGuard,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) -> anyhow::Result<ExitReason> {
        loop {
            let snapshot = self.coordinator.snapshot();
            let catalog = self.coordinator.catalog();
            terminal
                .terminal
                .draw(|frame| draw_ui(frame, catalog, &snapshot))?;

            let exit = tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.coordinator.handle(command),
                    // The input thread is gone, nothing can reach us anymore
                    None => Some(ExitReason::Quit),
                },
                Some(outcome) = self.outcomes.recv() => self.coordinator.on_outcome(outcome),
            };

            if let Some(reason) = exit {
                return Ok(reason);
            }
        }
    }
}

// Raw mode + alternate screen, undone on drop if restore() was not called.
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    restored: bool,
}

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(TerminalGuard {
            terminal,
            restored: false,
        })
    }

    fn restore(&mut self) -> io::Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

// Reads keys on a plain thread and forwards them as commands. Stops once
// the receiving side is dropped.
fn spawn_input_reader(commands: mpsc::UnboundedSender<Command>) -> io::Result<()> {
    thread::Builder::new()
        .name("input".to_string())
        .spawn(move || {
            while !commands.is_closed() {
                match event::poll(INPUT_POLL) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => {
                        warn!("terminal input failed: {e}");
                        break;
                    }
                }

                match event::read() {
                    Ok(Event::Key(key)) => {
                        if let Some(command) = command_for(key) {
                            if commands.send(command).is_err() {
                                break;
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("terminal input failed: {e}");
                        break;
                    }
                }
            }
        })?;
    Ok(())
}

pub fn command_for(key: KeyEvent) -> Option<Command> {
    if key.kind != KeyEventKind::Press {
        return None;
    }

    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Command::Quit),
        KeyCode::Char('q') => Some(Command::Quit),
        KeyCode::Up | KeyCode::Char('k') => Some(Command::MoveCursor(-1)),
        KeyCode::Down | KeyCode::Char('j') => Some(Command::MoveCursor(1)),
        KeyCode::Enter | KeyCode::Char(' ') => Some(Command::ToggleSelect),
        _ => None,
    }
}

fn title_for(catalog: &Catalog, snapshot: &SelectionSnapshot) -> String {
    match snapshot.active.and_then(|index| catalog.get(index)) {
        Some(entry) if snapshot.pending => format!("Up next: {}", entry.name),
        Some(entry) => format!("⏯ Now playing: {}", entry.name),
        None => DEFAULT_TITLE.to_string(),
    }
}

// "> [x] Rain"
fn row_label(index: usize, name: &str, snapshot: &SelectionSnapshot) -> String {
    let cursor = if snapshot.cursor == Some(index) { ">" } else { " " };
    let checked = if snapshot.active == Some(index) { "x" } else { " " };
    format!("{cursor} [{checked}] {name}")
}

fn draw_ui(frame: &mut Frame, catalog: &Catalog, snapshot: &SelectionSnapshot) {
    let error_height = if snapshot.error.is_some() { 4 } else { 0 };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(3),
            Constraint::Length(error_height),
            Constraint::Length(1),
        ])
        .split(frame.size());

    // Header
    let header = Paragraph::new(title_for(catalog, snapshot))
        .style(Style::default().fg(Color::White).add_modifier(Modifier::BOLD));
    frame.render_widget(header, chunks[0]);

    // Track list
    let block = Block::default().borders(Borders::ALL).title("Sounds");
    if catalog.is_empty() {
        let empty = Paragraph::new("No tracks configured").block(block);
        frame.render_widget(empty, chunks[1]);
    } else {
        let items: Vec<ListItem> = catalog
            .entries()
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let style = if snapshot.cursor == Some(i) {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };

                let mut lines = vec![Line::from(Span::styled(row_label(i, &entry.name, snapshot), style))];
                if let Some(credit) = &entry.credit {
                    lines.push(Line::from(Span::styled(
                        format!("      {credit}"),
                        Style::default().fg(Color::DarkGray),
                    )));
                }
                ListItem::new(lines)
            })
            .collect();

        frame.render_widget(List::new(items).block(block), chunks[1]);
    }

    // Error panel
    if let Some(error) = &snapshot.error {
        let title = if snapshot.fatal { "Fatal error" } else { "Error" };
        let panel = Paragraph::new(error.as_str())
            .style(Style::default().fg(Color::Red))
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(panel, chunks[2]);
    }

    // Footer
    let footer = Paragraph::new("Press q to quit.").style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, chunks[3]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::catalog::TrackEntry;
    use crossterm::event::KeyEventState;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn snapshot(cursor: Option<usize>, active: Option<usize>, pending: bool) -> SelectionSnapshot {
        SelectionSnapshot {
            cursor,
            active,
            pending,
            error: None,
            fatal: false,
        }
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![
            TrackEntry::new("Rain", "rain.wav"),
            TrackEntry::new("Forest", "forest.wav"),
        ])
        .unwrap()
    }

    #[test]
    fn keys_map_to_commands() {
        assert_eq!(command_for(press(KeyCode::Char('j'))), Some(Command::MoveCursor(1)));
        assert_eq!(command_for(press(KeyCode::Down)), Some(Command::MoveCursor(1)));
        assert_eq!(command_for(press(KeyCode::Char('k'))), Some(Command::MoveCursor(-1)));
        assert_eq!(command_for(press(KeyCode::Up)), Some(Command::MoveCursor(-1)));
        assert_eq!(command_for(press(KeyCode::Enter)), Some(Command::ToggleSelect));
        assert_eq!(command_for(press(KeyCode::Char(' '))), Some(Command::ToggleSelect));
        assert_eq!(command_for(press(KeyCode::Char('q'))), Some(Command::Quit));
        assert_eq!(
            command_for(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Command::Quit)
        );
        assert_eq!(command_for(press(KeyCode::Char('c'))), None);
        assert_eq!(command_for(press(KeyCode::Esc)), None);
    }

    #[test]
    fn key_releases_are_ignored() {
        let release = KeyEvent {
            code: KeyCode::Char('q'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        assert_eq!(command_for(release), None);
    }

    #[test]
    fn title_follows_the_active_track() {
        let catalog = catalog();
        assert_eq!(title_for(&catalog, &snapshot(Some(0), None, false)), DEFAULT_TITLE);
        assert_eq!(
            title_for(&catalog, &snapshot(Some(1), Some(1), false)),
            "⏯ Now playing: Forest"
        );
        assert_eq!(title_for(&catalog, &snapshot(Some(1), Some(1), true)), "Up next: Forest");
    }

    #[test]
    fn rows_mark_cursor_and_active_track() {
        let state = snapshot(Some(1), Some(0), false);
        assert_eq!(row_label(0, "Rain", &state), "  [x] Rain");
        assert_eq!(row_label(1, "Forest", &state), "> [ ] Forest");
    }
}
