use std::path::PathBuf;

use crate::core::job::JobId;

/// Everything that mutates runner state travels as one of these, through one channel.
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerMessage {
    Enqueue(Vec<PathBuf>),
    Remove(PathBuf),
    Start,
    StopCurrent,
    StopAll,
    Kill,
    Diagnostic { job: JobId, line: String },
    Exited { job: JobId, code: Option<i32> },
}

/// Notifications for the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerEvent {
    Output(String),
    QueueChanged(Vec<PathBuf>),
    JobStarted { path: PathBuf, command_line: String },
    JobExited { path: PathBuf, code: Option<i32> },
    /// A queued file was dropped because its command could not be rendered or spawned.
    JobFailed { path: PathBuf, message: String },
    /// Runner trouble not tied to one file: log sink, signals, output directory.
    Error(String),
    BatchComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Progress,
    Warning,
    Error,
    Info,
}

pub fn classify_log_line(line: &str) -> LogLevel {
    let trimmed = line.trim();
    if trimmed.contains("frame=") && trimmed.contains("time=") {
        return LogLevel::Progress;
    }
    if trimmed.starts_with("size=") && trimmed.contains("time=") {
        return LogLevel::Progress;
    }

    let lower = trimmed.to_ascii_lowercase();
    if lower.contains("error") || lower.contains("invalid") || lower.contains("no such file") {
        return LogLevel::Error;
    }
    if lower.contains("warning") || lower.contains("deprecated") {
        return LogLevel::Warning;
    }

    LogLevel::Info
}
