use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum BuildError {
    #[error("crop on a cuvid decoder needs the decode size; call size() before crop()")]
    CropWithoutSize,
    #[error("crop rectangle {width}x{height}+{x}+{y} does not fit inside {frame_width}x{frame_height}")]
    CropOutOfBounds {
        width: u32,
        height: u32,
        x: u32,
        y: u32,
        frame_width: u32,
        frame_height: u32,
    },
    #[error("output file would overwrite its input: {path}")]
    SameFile { path: PathBuf },
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("ffmpeg binary not found: {program}")]
    BinaryNotFound { program: PathBuf },
    #[error("failed to start ffmpeg for {path}: {message}")]
    Spawn { path: PathBuf, message: String },
    #[error("cannot render command for {path}: {source}")]
    Render {
        path: PathBuf,
        #[source]
        source: BuildError,
    },
    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("log file {path}: {source}")]
    LogSink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to signal ffmpeg: {0}")]
    Signal(#[from] std::io::Error),
}
