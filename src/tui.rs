use std::io;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Terminal;

use crate::core::event::{classify_log_line, LogLevel, RunnerEvent};
use crate::core::job::RunnerState;
use crate::core::process::Launcher;
use crate::core::progress::{parse_progress_line, ProgressUpdate};
use crate::core::runner::{JobRunner, RunnerHandle};

const MAX_LINES: usize = 500;
const PROGRESS_LOG_EVERY: u64 = 25;
const DIVIDER_MARKER: &str = "<divider>";

struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        io::stdout().execute(EnterAlternateScreen)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = io::stdout().execute(LeaveAlternateScreen);
    }
}

#[derive(Debug, Default)]
struct AppState {
    queue: Vec<PathBuf>,
    selected: usize,
    history: Vec<(LogLevel, String)>,
    scroll_offset: usize,
    view_lines: usize,
    current: Option<PathBuf>,
    progress: Option<ProgressUpdate>,
    progress_log_counter: u64,
    finished: usize,
    failed: usize,
    batch_complete: bool,
    quitting: bool,
    /// Set when leaving with a process still running; the runner waits for its exit.
    kill_on_exit: bool,
    should_quit: bool,
}

impl AppState {
    fn push_history(&mut self, level: LogLevel, line: impl Into<String>) {
        if self.history.len() >= MAX_LINES {
            let drain_count = self.history.len().saturating_sub(MAX_LINES - 1);
            self.history.drain(0..drain_count);
        }
        self.history.push((level, line.into()));
        self.clamp_scroll();
    }

    fn push_info(&mut self, line: impl Into<String>) {
        self.push_history(LogLevel::Info, line);
    }

    fn apply(&mut self, event: RunnerEvent) {
        match event {
            RunnerEvent::Output(line) => {
                let level = classify_log_line(&line);
                if level == LogLevel::Progress {
                    self.progress = parse_progress_line(&line).or(self.progress.take());
                    self.progress_log_counter = self.progress_log_counter.wrapping_add(1);
                    if self.progress_log_counter % PROGRESS_LOG_EVERY != 0 {
                        return;
                    }
                }
                self.push_history(level, line);
            }
            RunnerEvent::QueueChanged(queue) => {
                self.queue = queue;
                self.selected = self.selected.min(self.queue.len().saturating_sub(1));
            }
            RunnerEvent::JobStarted { path, command_line } => {
                self.batch_complete = false;
                self.progress = None;
                if !self.history.is_empty() {
                    self.push_info(DIVIDER_MARKER);
                }
                self.push_info(format!(">> {command_line}"));
                self.current = Some(path);
            }
            RunnerEvent::JobExited { path, code } => {
                if code == Some(0) {
                    self.finished += 1;
                } else {
                    self.failed += 1;
                }
                let code = code.map_or_else(|| "killed".to_string(), |code| code.to_string());
                self.push_info(format!("{} exited ({code})", path.display()));
                self.current = None;
            }
            RunnerEvent::JobFailed { path, message } => {
                self.failed += 1;
                self.push_history(LogLevel::Error, format!("error: {message}"));
                if self.current.as_ref() == Some(&path) {
                    self.current = None;
                }
            }
            RunnerEvent::Error(message) => {
                self.push_history(LogLevel::Error, format!("error: {message}"));
            }
            RunnerEvent::BatchComplete => {
                self.batch_complete = true;
                self.current = None;
                self.push_info(format!(
                    "Batch complete: {} finished, {} failed.",
                    self.finished, self.failed
                ));
                if self.quitting {
                    self.should_quit = true;
                }
            }
        }
    }

    fn set_view_lines(&mut self, lines: usize) {
        self.view_lines = lines.max(1);
        self.clamp_scroll();
    }

    fn scroll_up(&mut self, lines: usize) {
        let max_scroll = self.max_scroll();
        self.scroll_offset = (self.scroll_offset + lines).min(max_scroll);
    }

    fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    fn max_scroll(&self) -> usize {
        self.history.len().saturating_sub(self.view_lines)
    }

    fn clamp_scroll(&mut self) {
        self.scroll_offset = self.scroll_offset.min(self.max_scroll());
    }

    fn select_next(&mut self) {
        if self.selected + 1 < self.queue.len() {
            self.selected += 1;
        }
    }

    fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Pending entry under the cursor. The running file cannot be removed.
    fn removable_selection(&self) -> Option<PathBuf> {
        let path = self.queue.get(self.selected)?;
        if self.current.as_ref() == Some(path) && self.selected == 0 {
            return None;
        }
        Some(path.clone())
    }
}

/// Runs the dashboard until the operator quits. The batch starts immediately.
pub fn run<L: Launcher>(
    mut runner: JobRunner<L>,
    events: Receiver<RunnerEvent>,
    inputs: Vec<PathBuf>,
) -> io::Result<()> {
    let _guard = TerminalGuard::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    let handle = runner.handle();
    let mut app = AppState::default();
    app.push_info(format!(
        "Loaded {} files. Log: {}",
        inputs.len(),
        runner.log_path().display()
    ));
    handle.enqueue(inputs);
    handle.start();

    loop {
        runner.pump();
        while let Ok(event) = events.try_recv() {
            app.apply(event);
        }
        if app.should_quit {
            break;
        }

        let state = runner.state();
        let size = terminal.size()?;
        let history_height = size.height.saturating_sub(7).max(3) as usize;
        app.set_view_lines(history_height.saturating_sub(2).max(1));

        terminal.draw(|frame| {
            let layout = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(4),
                    Constraint::Min(3),
                    Constraint::Length(3),
                ])
                .split(frame.size());

            frame.render_widget(render_header(&app, state), layout[0]);

            let body = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
                .split(layout[1]);

            let mut queue_state = ListState::default();
            if !app.queue.is_empty() {
                queue_state.select(Some(app.selected));
            }
            frame.render_stateful_widget(render_queue(&app), body[0], &mut queue_state);
            frame.render_widget(
                render_history(&app, body[1].height as usize, body[1].width as usize),
                body[1],
            );
            frame.render_widget(render_keys(state), layout[2]);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(&mut app, &handle, state, key.code, key.modifiers);
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    shutdown(&mut runner, &app);
    Ok(())
}

/// Delivers the keys pressed on the way out. A kill waits for ffmpeg to go away.
fn shutdown<L: Launcher>(runner: &mut JobRunner<L>, app: &AppState) {
    runner.pump();
    if app.kill_on_exit {
        runner.run_until_idle();
    }
}

fn handle_key(
    app: &mut AppState,
    handle: &RunnerHandle,
    state: RunnerState,
    code: KeyCode,
    modifiers: KeyModifiers,
) {
    match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
            handle.stop_all();
            handle.kill();
            app.kill_on_exit = true;
            app.should_quit = true;
        }
        KeyCode::Enter | KeyCode::Char('r') => {
            handle.start();
        }
        KeyCode::Char('s') => {
            app.push_info(">> stop current");
            handle.stop_current();
        }
        KeyCode::Char('a') => {
            app.push_info(">> stop all");
            handle.stop_all();
        }
        KeyCode::Char('k') => {
            app.push_info(">> kill");
            handle.kill();
        }
        KeyCode::Delete | KeyCode::Char('x') => {
            if let Some(path) = app.removable_selection() {
                handle.remove(path);
            }
        }
        KeyCode::Up => app.select_previous(),
        KeyCode::Down => app.select_next(),
        KeyCode::PageUp => {
            let step = app.view_lines.saturating_sub(1).max(1);
            app.scroll_up(step);
        }
        KeyCode::PageDown => {
            let step = app.view_lines.saturating_sub(1).max(1);
            app.scroll_down(step);
        }
        KeyCode::Home => app.scroll_offset = app.max_scroll(),
        KeyCode::End => app.scroll_offset = 0,
        KeyCode::Char('q') | KeyCode::Esc => {
            if state == RunnerState::Idle || app.quitting {
                if app.quitting {
                    handle.kill();
                    app.kill_on_exit = true;
                }
                app.should_quit = true;
            } else {
                app.quitting = true;
                app.push_info(">> stopping batch before exit (q again to kill)");
                handle.stop_all();
            }
        }
        _ => {}
    }
}

fn render_header(app: &AppState, state: RunnerState) -> Paragraph<'static> {
    let status = match state {
        RunnerState::Idle if app.batch_complete => "Complete",
        RunnerState::Idle => "Idle",
        RunnerState::Running => "Running",
        RunnerState::Draining => "Stopping",
    };
    let current = app
        .current
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_default();
    let progress = app
        .progress
        .as_ref()
        .map(ProgressUpdate::summary)
        .unwrap_or_else(|| ProgressUpdate::default().summary());

    let text = vec![
        Line::from(vec![
            Span::raw("Status: "),
            Span::styled(status, Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!(
                "  pending={} finished={} failed={}",
                app.queue.len(),
                app.finished,
                app.failed
            )),
        ]),
        Line::from(vec![Span::raw(current), Span::raw("  "), Span::raw(progress)]),
    ];

    Paragraph::new(text)
        .block(Block::default().title("ffqueue").borders(Borders::ALL))
        .wrap(Wrap { trim: true })
}

fn render_queue(app: &AppState) -> List<'static> {
    let items: Vec<ListItem> = app
        .queue
        .iter()
        .enumerate()
        .map(|(index, path)| {
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            if index == 0 && app.current.as_ref() == Some(path) {
                ListItem::new(format!("> {name}")).style(Style::default().fg(Color::Green))
            } else {
                ListItem::new(format!("  {name}"))
            }
        })
        .collect();

    List::new(items)
        .block(Block::default().title("Queue").borders(Borders::ALL))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
}

fn render_history(app: &AppState, height: usize, width: usize) -> Paragraph<'static> {
    let max_lines = height.saturating_sub(2).max(1);
    let end = app.history.len().saturating_sub(app.scroll_offset);
    let start = end.saturating_sub(max_lines);
    let divider = "─".repeat(width.saturating_sub(2).max(1));
    let lines: Vec<Line> = app.history[start..end]
        .iter()
        .map(|(level, line)| {
            if line == DIVIDER_MARKER {
                return Line::from(Span::raw(divider.clone()));
            }
            let style = match level {
                LogLevel::Error => Style::default().fg(Color::Red),
                LogLevel::Warning => Style::default().fg(Color::Yellow),
                LogLevel::Progress => Style::default().fg(Color::Cyan),
                LogLevel::Info => Style::default(),
            };
            Line::from(Span::styled(line.clone(), style))
        })
        .collect();

    Paragraph::new(lines)
        .block(Block::default().title("Output").borders(Borders::ALL))
        .wrap(Wrap { trim: false })
}

fn render_keys(state: RunnerState) -> Paragraph<'static> {
    let keys = match state {
        RunnerState::Idle => "Enter start  x remove  ↑/↓ select  PgUp/PgDn scroll  q quit",
        _ => "s stop current  a stop all  k kill  x remove  ↑/↓ select  PgUp/PgDn scroll  q quit",
    };
    Paragraph::new(keys).block(Block::default().title("Keys").borders(Borders::ALL))
}
