use std::io::{self, BufReader, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use crate::core::builder::RenderedCommand;
use crate::core::decode::DiagnosticDecoder;
use crate::core::error::RunnerError;
use crate::core::event::RunnerMessage;
use crate::core::job::JobId;

const EXIT_POLL: Duration = Duration::from_millis(50);
const QUIT_SIGNAL: &[u8] = b"q";

/// Control surface of a running encoder process. Exit is never observed here; it arrives
/// later as `RunnerMessage::Exited`.
pub trait ProcessControl: Send {
    /// Writes the graceful quit key and closes stdin. Does not wait for the exit.
    fn request_quit(&mut self) -> io::Result<()>;
    fn kill(&mut self) -> io::Result<()>;
}

pub trait Launcher {
    fn launch(
        &mut self,
        job: JobId,
        input: &Path,
        command: &RenderedCommand,
        messages: Sender<RunnerMessage>,
    ) -> Result<Box<dyn ProcessControl>, RunnerError>;
}

/// Spawns the real encoder and reports its stderr lines and exit through the runner channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegLauncher {
    decoder: DiagnosticDecoder,
}

impl FfmpegLauncher {
    pub fn new(decoder: DiagnosticDecoder) -> Self {
        Self { decoder }
    }
}

impl Launcher for FfmpegLauncher {
    fn launch(
        &mut self,
        job: JobId,
        input: &Path,
        command: &RenderedCommand,
        messages: Sender<RunnerMessage>,
    ) -> Result<Box<dyn ProcessControl>, RunnerError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .env("AV_LOG_FORCE_NOCOLOR", "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                RunnerError::BinaryNotFound {
                    program: command.program.clone(),
                }
            } else {
                RunnerError::Spawn {
                    path: input.to_path_buf(),
                    message: e.to_string(),
                }
            }
        })?;

        let stderr = match child.stderr.take() {
            Some(stderr) => stderr,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RunnerError::Spawn {
                    path: input.to_path_buf(),
                    message: "failed to capture ffmpeg stderr".to_string(),
                });
            }
        };
        let stdin = child.stdin.take();

        let reader = spawn_line_reader(job, stderr, self.decoder, messages.clone());
        let (kill_tx, kill_rx) = mpsc::channel::<()>();
        thread::spawn(move || watch_exit(job, child, reader, kill_rx, messages));

        Ok(Box::new(FfmpegProcess { stdin, kill_tx }))
    }
}

struct FfmpegProcess {
    stdin: Option<ChildStdin>,
    kill_tx: Sender<()>,
}

impl ProcessControl for FfmpegProcess {
    fn request_quit(&mut self) -> io::Result<()> {
        match self.stdin.take() {
            Some(mut stdin) => {
                stdin.write_all(QUIT_SIGNAL)?;
                stdin.flush()
            }
            None => Ok(()),
        }
    }

    fn kill(&mut self) -> io::Result<()> {
        self.kill_tx
            .send(())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "process already exited"))
    }
}

fn watch_exit(
    job: JobId,
    mut child: Child,
    reader: thread::JoinHandle<()>,
    kill_rx: Receiver<()>,
    messages: Sender<RunnerMessage>,
) {
    let code = loop {
        if kill_rx.try_recv().is_ok() {
            if let Err(err) = child.kill() {
                tracing::warn!(job, "kill failed: {err}");
            }
        }
        match child.try_wait() {
            Ok(Some(status)) => break status.code(),
            Ok(None) => thread::sleep(EXIT_POLL),
            Err(err) => {
                tracing::warn!(job, "waiting for ffmpeg failed: {err}");
                break None;
            }
        }
    };

    // every diagnostic line must be queued before the exit notification
    let _ = reader.join();
    let _ = messages.send(RunnerMessage::Exited { job, code });
}

fn spawn_line_reader<R: Read + Send + 'static>(
    job: JobId,
    reader: R,
    decoder: DiagnosticDecoder,
    sender: Sender<RunnerMessage>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(reader);
        let mut line_buf: Vec<u8> = Vec::new();
        let mut byte = [0u8; 1];
        let mut previous = 0u8;

        let flush = |line_buf: &mut Vec<u8>| {
            let line = decoder.decode(line_buf).into_owned();
            line_buf.clear();
            let _ = sender.send(RunnerMessage::Diagnostic { job, line });
        };

        loop {
            match reader.read(&mut byte) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }

            match byte[0] {
                // \r\n ends one line, not two
                b'\n' if previous == b'\r' => {}
                b'\r' | b'\n' => flush(&mut line_buf),
                other => line_buf.push(other),
            }
            previous = byte[0];
        }

        if !line_buf.is_empty() {
            flush(&mut line_buf);
        }
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn shell(script: &str) -> RenderedCommand {
        RenderedCommand {
            program: PathBuf::from("sh"),
            args: vec!["-c".to_string(), script.to_string()],
            output: PathBuf::from("/dev/null"),
        }
    }

    fn collect_until_exit(rx: &Receiver<RunnerMessage>) -> Vec<RunnerMessage> {
        let mut seen = Vec::new();
        while let Ok(message) = rx.recv_timeout(Duration::from_secs(10)) {
            let done = matches!(message, RunnerMessage::Exited { .. });
            seen.push(message);
            if done {
                break;
            }
        }
        seen
    }

    #[test]
    fn reports_lines_then_exit() {
        let (tx, rx) = mpsc::channel();
        let mut launcher = FfmpegLauncher::default();
        let command = shell("printf 'one\\rtwo\\n\\nthree' >&2; exit 3");
        launcher.launch(7, Path::new("in.mp4"), &command, tx).unwrap();

        let seen = collect_until_exit(&rx);
        assert_eq!(
            seen,
            vec![
                RunnerMessage::Diagnostic { job: 7, line: "one".into() },
                RunnerMessage::Diagnostic { job: 7, line: "two".into() },
                RunnerMessage::Diagnostic { job: 7, line: "".into() },
                RunnerMessage::Diagnostic { job: 7, line: "three".into() },
                RunnerMessage::Exited { job: 7, code: Some(3) },
            ]
        );
    }

    #[test]
    fn crlf_ends_a_single_line() {
        let (tx, rx) = mpsc::channel();
        let mut launcher = FfmpegLauncher::default();
        let command = shell("printf 'a\\r\\nb\\r\\n' >&2");
        launcher.launch(2, Path::new("in.mp4"), &command, tx).unwrap();

        let seen = collect_until_exit(&rx);
        assert_eq!(
            seen,
            vec![
                RunnerMessage::Diagnostic { job: 2, line: "a".into() },
                RunnerMessage::Diagnostic { job: 2, line: "b".into() },
                RunnerMessage::Exited { job: 2, code: Some(0) },
            ]
        );
    }

    #[test]
    fn quit_writes_q_to_stdin() {
        let (tx, rx) = mpsc::channel();
        let mut launcher = FfmpegLauncher::default();
        let command = shell("read key; echo \"got $key\" >&2");
        let mut process = launcher.launch(1, Path::new("in.mp4"), &command, tx).unwrap();
        process.request_quit().unwrap();

        let seen = collect_until_exit(&rx);
        assert_eq!(
            seen.first(),
            Some(&RunnerMessage::Diagnostic { job: 1, line: "got q".into() })
        );
        assert_eq!(seen.last(), Some(&RunnerMessage::Exited { job: 1, code: Some(0) }));
    }

    #[test]
    fn kill_ends_process_through_exit_path() {
        let (tx, rx) = mpsc::channel();
        let mut launcher = FfmpegLauncher::default();
        let mut process = launcher
            .launch(2, Path::new("in.mp4"), &shell("exec sleep 30"), tx)
            .unwrap();
        process.kill().unwrap();

        let seen = collect_until_exit(&rx);
        assert_eq!(seen.last(), Some(&RunnerMessage::Exited { job: 2, code: None }));
    }

    #[test]
    fn missing_binary_is_reported() {
        let (tx, _rx) = mpsc::channel();
        let mut launcher = FfmpegLauncher::default();
        let command = RenderedCommand {
            program: PathBuf::from("/definitely/not/here/ffmpeg"),
            args: Vec::new(),
            output: PathBuf::from("out.mp4"),
        };
        let err = launcher.launch(3, Path::new("in.mp4"), &command, tx).err();
        assert!(matches!(err, Some(RunnerError::BinaryNotFound { .. })));
    }
}
