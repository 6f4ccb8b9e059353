use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};

use crate::core::builder::CommandBuilder;
use crate::core::error::RunnerError;
use crate::core::event::{classify_log_line, LogLevel, RunnerEvent, RunnerMessage};
use crate::core::job::{ActiveJob, JobId, JobQueue, RunnerState};
use crate::core::logsink::LogSink;
use crate::core::process::{Launcher, ProcessControl};

/// Cloneable sender side of the runner's message channel, for UI code and other threads.
#[derive(Debug, Clone)]
pub struct RunnerHandle {
    tx: Sender<RunnerMessage>,
}

impl RunnerHandle {
    pub fn send(&self, message: RunnerMessage) -> bool {
        self.tx.send(message).is_ok()
    }

    pub fn enqueue(&self, paths: Vec<PathBuf>) -> bool {
        self.send(RunnerMessage::Enqueue(paths))
    }

    pub fn remove(&self, path: PathBuf) -> bool {
        self.send(RunnerMessage::Remove(path))
    }

    pub fn start(&self) -> bool {
        self.send(RunnerMessage::Start)
    }

    pub fn stop_current(&self) -> bool {
        self.send(RunnerMessage::StopCurrent)
    }

    pub fn stop_all(&self) -> bool {
        self.send(RunnerMessage::StopAll)
    }

    pub fn kill(&self) -> bool {
        self.send(RunnerMessage::Kill)
    }
}

/// Sequential job runner. Owned by one control thread; everything else talks to it through
/// `RunnerHandle` messages, and process threads report back on the same channel.
pub struct JobRunner<L: Launcher> {
    builder: CommandBuilder,
    launcher: L,
    queue: JobQueue,
    active: Option<ActiveJob>,
    process: Option<Box<dyn ProcessControl>>,
    state: RunnerState,
    log: LogSink,
    next_job: JobId,
    tx: Sender<RunnerMessage>,
    rx: Receiver<RunnerMessage>,
    events: Sender<RunnerEvent>,
}

impl<L: Launcher> JobRunner<L> {
    pub fn new(
        builder: CommandBuilder,
        launcher: L,
        log_path: impl Into<PathBuf>,
    ) -> (Self, Receiver<RunnerEvent>) {
        let (tx, rx) = mpsc::channel();
        let (events, events_rx) = mpsc::channel();
        let runner = Self {
            builder,
            launcher,
            queue: JobQueue::new(),
            active: None,
            process: None,
            state: RunnerState::Idle,
            log: LogSink::new(log_path),
            next_job: 0,
            tx,
            rx,
            events,
        };
        (runner, events_rx)
    }

    pub fn handle(&self) -> RunnerHandle {
        RunnerHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn active(&self) -> Option<&ActiveJob> {
        self.active.as_ref()
    }

    pub fn log_is_open(&self) -> bool {
        self.log.is_open()
    }

    pub fn log_path(&self) -> &Path {
        self.log.path()
    }

    /// Applies every message already waiting, without blocking. Returns how many ran.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.rx.try_recv() {
            self.dispatch(message);
            handled += 1;
        }
        handled
    }

    /// Blocks until the current batch finishes. Returns at once when already idle.
    pub fn run_until_idle(&mut self) {
        while self.state != RunnerState::Idle {
            match self.rx.recv() {
                Ok(message) => self.dispatch(message),
                Err(_) => break,
            }
        }
    }

    pub fn dispatch(&mut self, message: RunnerMessage) {
        match message {
            RunnerMessage::Enqueue(paths) => self.enqueue(paths),
            RunnerMessage::Remove(path) => self.remove(&path),
            RunnerMessage::Start => self.start(),
            RunnerMessage::StopCurrent => self.stop_current(),
            RunnerMessage::StopAll => self.stop_all(),
            RunnerMessage::Kill => self.kill(),
            RunnerMessage::Diagnostic { job, line } => self.diagnostic(job, line),
            RunnerMessage::Exited { job, code } => self.exited(job, code),
        }
    }

    fn emit(&self, event: RunnerEvent) {
        let _ = self.events.send(event);
    }

    fn notify_queue(&self) {
        self.emit(RunnerEvent::QueueChanged(self.queue.paths()));
    }

    fn report(&self, err: &RunnerError) {
        tracing::error!("{err}");
        self.emit(RunnerEvent::Error(err.to_string()));
    }

    fn enqueue(&mut self, paths: Vec<PathBuf>) {
        if paths.is_empty() {
            return;
        }
        let count = paths.len();
        for path in paths {
            self.queue.push(path);
        }
        tracing::debug!(count, pending = self.queue.len(), "queued files");
        self.notify_queue();
    }

    fn remove(&mut self, path: &Path) {
        if self.queue.remove_path(path).is_some() {
            tracing::debug!(path = %path.display(), "removed from queue");
            self.notify_queue();
        }
    }

    fn start(&mut self) {
        if self.state != RunnerState::Idle || self.queue.is_empty() {
            return;
        }

        let output_dir = self.builder.output_directory().to_path_buf();
        if let Err(source) = fs::create_dir_all(&output_dir) {
            self.report(&RunnerError::OutputDir {
                path: output_dir,
                source,
            });
            self.complete();
            return;
        }

        if let Err(err) = self.log.open() {
            self.report(&err);
        }
        tracing::info!(pending = self.queue.len(), log = %self.log.path().display(), "batch started");
        self.state = RunnerState::Running;
        self.launch_next();
    }

    /// Starts the head of the queue. Entries that fail to render or spawn count as exited
    /// and the next one is tried; an empty queue completes the batch.
    fn launch_next(&mut self) {
        while let Some(entry) = self.queue.front().cloned() {
            match self.launch(&entry.path) {
                Ok(()) => return,
                Err(err) => {
                    tracing::error!("{err}");
                    self.emit(RunnerEvent::JobFailed {
                        path: entry.path.clone(),
                        message: err.to_string(),
                    });
                    self.queue.remove_path(&entry.path);
                    self.notify_queue();
                }
            }
        }
        self.complete();
    }

    fn launch(&mut self, input: &Path) -> Result<(), RunnerError> {
        let command = self.builder.render(input).map_err(|source| RunnerError::Render {
            path: input.to_path_buf(),
            source,
        })?;

        self.next_job += 1;
        let job = self.next_job;
        let process = self
            .launcher
            .launch(job, input, &command, self.tx.clone())?;

        let command_line = command.command_line();
        tracing::info!(job, input = %input.display(), output = %command.output.display(), "job started");
        tracing::debug!("{command_line}");

        self.process = Some(process);
        self.active = Some(ActiveJob {
            id: job,
            path: input.to_path_buf(),
        });
        self.state = RunnerState::Running;
        self.emit(RunnerEvent::JobStarted {
            path: input.to_path_buf(),
            command_line,
        });
        Ok(())
    }

    fn complete(&mut self) {
        self.state = RunnerState::Idle;
        self.active = None;
        self.process = None;
        self.log.close();
        tracing::info!("batch complete");
        self.emit(RunnerEvent::BatchComplete);
    }

    fn stop_current(&mut self) {
        let Some(process) = self.process.as_mut() else {
            return;
        };
        tracing::info!("requesting graceful stop");
        if let Err(err) = process.request_quit() {
            self.report(&RunnerError::Signal(err));
        }
    }

    fn stop_all(&mut self) {
        self.queue.clear();
        self.notify_queue();
        if self.active.is_some() {
            self.state = RunnerState::Draining;
        }
        self.stop_current();
    }

    fn kill(&mut self) {
        let Some(process) = self.process.as_mut() else {
            return;
        };
        tracing::warn!("killing active process");
        if let Err(err) = process.kill() {
            self.report(&RunnerError::Signal(err));
        }
    }

    /// Blank lines go to the log file only.
    fn diagnostic(&mut self, job: JobId, line: String) {
        self.log.write_line(&line);
        if line.is_empty() {
            return;
        }
        match classify_log_line(&line) {
            LogLevel::Error => tracing::warn!(job, "{line}"),
            LogLevel::Progress => tracing::trace!(job, "{line}"),
            _ => tracing::debug!(job, "{line}"),
        }
        self.emit(RunnerEvent::Output(line));
    }

    fn exited(&mut self, job: JobId, code: Option<i32>) {
        if self.active.as_ref().map(|active| active.id) != Some(job) {
            tracing::debug!(job, "ignoring exit of a job that is not active");
            return;
        }
        let Some(finished) = self.active.take() else {
            return;
        };
        self.process = None;

        tracing::info!(job, ?code, input = %finished.path.display(), "job exited");
        self.emit(RunnerEvent::JobExited {
            path: finished.path.clone(),
            code,
        });

        if self.queue.remove_path(&finished.path).is_some() {
            self.notify_queue();
        }
        self.launch_next();
    }
}
