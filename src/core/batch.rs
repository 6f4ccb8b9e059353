use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::core::builder::CommandBuilder;
use crate::core::decode::DiagnosticDecoder;
use crate::core::error::BuildError;

/// Characters `cmd.exe` treats as operators outside quotes.
const BATCH_SPECIAL: [char; 7] = ['&', '|', '<', '>', '^', '(', ')'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFlavor {
    /// `cmd.exe` batch file: CRLF line endings, `@echo off` header, `pause` footer.
    Batch,
    /// POSIX shell script: shebang, `set +x`, a read-based pause.
    Posix,
}

impl Default for ScriptFlavor {
    fn default() -> Self {
        if cfg!(windows) {
            Self::Batch
        } else {
            Self::Posix
        }
    }
}

impl ScriptFlavor {
    fn header(self) -> &'static [&'static str] {
        match self {
            Self::Batch => &["@echo off"],
            Self::Posix => &["#!/bin/sh", "set +x"],
        }
    }

    fn footer(self) -> &'static [&'static str] {
        match self {
            Self::Batch => &["pause"],
            Self::Posix => &["printf 'Press Enter to continue...'", "read _"],
        }
    }

    fn newline(self) -> &'static str {
        match self {
            Self::Batch => "\r\n",
            Self::Posix => "\n",
        }
    }

    fn quote(self, arg: &str) -> String {
        match self {
            Self::Batch => {
                // cmd expands `%` even inside quotes
                let escaped = arg.replace('%', "%%").replace('"', "\\\"");
                let needs_quotes = arg.is_empty()
                    || arg
                        .chars()
                        .any(|c| c.is_whitespace() || BATCH_SPECIAL.contains(&c));
                if needs_quotes {
                    format!("\"{escaped}\"")
                } else {
                    escaped
                }
            }
            Self::Posix => shell_words::quote(arg).into_owned(),
        }
    }
}

/// Renders one invocation per input, in order, framed by the flavor's header and footer.
/// Uses the builder exactly like a real batch would, so templated names advance.
pub fn render_script<P: AsRef<Path>>(
    builder: &mut CommandBuilder,
    inputs: &[P],
    flavor: ScriptFlavor,
) -> Result<String, BuildError> {
    let newline = flavor.newline();
    let mut script = String::new();

    for line in flavor.header() {
        script.push_str(line);
        script.push_str(newline);
    }

    for input in inputs {
        let command = builder.render(input.as_ref())?;
        let program = command.program.to_string_lossy();
        script.push_str(&flavor.quote(&program));
        for arg in &command.args {
            script.push(' ');
            script.push_str(&flavor.quote(arg));
        }
        script.push_str(newline);
    }

    for line in flavor.footer() {
        script.push_str(line);
        script.push_str(newline);
    }

    Ok(script)
}

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write script {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Writes the script encoded in the legacy encoding the diagnostics use, and creates the
/// output directory the script's commands write into.
pub fn write_script<P: AsRef<Path>>(
    builder: &mut CommandBuilder,
    inputs: &[P],
    flavor: ScriptFlavor,
    decoder: &DiagnosticDecoder,
    destination: &Path,
) -> Result<(), ScriptError> {
    let script = render_script(builder, inputs, flavor)?;
    let output_dir = builder.output_directory();
    fs::create_dir_all(output_dir).map_err(|source| ScriptError::OutputDir {
        path: output_dir.to_path_buf(),
        source,
    })?;
    fs::write(destination, decoder.encode(&script)).map_err(|source| ScriptError::Write {
        path: destination.to_path_buf(),
        source,
    })?;
    tracing::info!(
        path = %destination.display(),
        files = inputs.len(),
        encoding = decoder.name(),
        "script written"
    );
    Ok(())
}

/// One input path per line. Blank lines and `#` comments are skipped.
pub fn read_file_list(path: &Path) -> Result<Vec<PathBuf>, io::Error> {
    let reader = BufReader::new(File::open(path)?);
    let mut files = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        files.push(PathBuf::from(trimmed));
    }

    Ok(files)
}
