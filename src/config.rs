use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::builder::{CommandBuilder, CropRect, Rotation};
use crate::core::decode::{DiagnosticDecoder, DEFAULT_LEGACY_ENCODING};
use crate::core::error::BuildError;
use crate::core::logsink;
use crate::core::variant::{Deinterlace, EncoderVariant, Orientation};

const APP_DIR: &str = "ffqueue";
const CONFIG_FILE: &str = "config.toml";
const DEFAULT_PROGRAM: &str = "ffmpeg";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine the user config directory")]
    NoConfigDir,
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("unknown legacy encoding label '{0}'")]
    Encoding(String),
    #[error("config file {0} already exists (use --force to overwrite)")]
    Exists(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tool: ToolConfig,

    #[serde(default)]
    pub job: JobProfile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Explicit encoder path. Falls back to a PATH search when unset or missing.
    #[serde(default)]
    pub ffmpeg: Option<PathBuf>,

    /// Batch log location. Defaults to a file in the temp directory.
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// WHATWG label of the code page used for non-UTF-8 diagnostics and exported scripts.
    #[serde(default = "default_legacy_encoding")]
    pub legacy_encoding: String,
}

fn default_legacy_encoding() -> String {
    DEFAULT_LEGACY_ENCODING.to_string()
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            ffmpeg: None,
            log_file: None,
            legacy_encoding: default_legacy_encoding(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

/// Every encoder setting an operator picks for a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobProfile {
    pub variant: EncoderVariant,
    pub encoder: String,
    pub device: u32,
    /// kbit/s, or the quality target with `constant_quality`. `0` picks the codec default.
    pub bitrate: i32,
    pub constant_quality: bool,
    pub preset: String,
    pub lookahead: u32,
    pub hw_decoder: Option<String>,
    pub size: Option<FrameSize>,
    pub crop: Option<CropRect>,
    pub scale: Option<u32>,
    pub orientation: Orientation,
    pub rotate: Rotation,
    pub deinterlace: Option<Deinterlace>,
    /// `None` copies the audio stream untouched.
    pub audio_codec: Option<String>,
    pub audio_bitrate: i32,
    pub audio_only: bool,
    pub start: Option<String>,
    pub end: Option<String>,
    pub extra: Option<String>,
    /// Additional video filters, `name=params` or a bare `name`, applied last.
    pub filters: Vec<String>,
    pub output_dir: Option<PathBuf>,
    pub prefix: String,
    pub suffix: String,
    pub base: Option<String>,
    pub extension: Option<String>,
}

impl Default for JobProfile {
    fn default() -> Self {
        Self {
            variant: EncoderVariant::Software,
            encoder: "hevc".to_string(),
            device: 0,
            bitrate: 0,
            constant_quality: true,
            preset: String::new(),
            lookahead: 0,
            hw_decoder: None,
            size: None,
            crop: None,
            scale: None,
            orientation: Orientation::Landscape,
            rotate: Rotation::None,
            deinterlace: None,
            audio_codec: None,
            audio_bitrate: 0,
            audio_only: false,
            start: None,
            end: None,
            extra: None,
            filters: Vec::new(),
            output_dir: None,
            prefix: String::new(),
            suffix: String::new(),
            base: None,
            extension: None,
        }
    }
}

impl JobProfile {
    pub fn is_copy(&self) -> bool {
        self.encoder.trim() == "copy"
    }

    /// Translates the profile into a configured builder. Audio-only and stream-copy
    /// profiles skip every video setting.
    pub fn to_builder(&self, program: impl Into<PathBuf>) -> Result<CommandBuilder, BuildError> {
        let mut builder = CommandBuilder::new(self.variant, program);

        if let Some(start) = &self.start {
            builder.starts(start);
        }
        if let Some(end) = &self.end {
            builder.to(end);
        }

        if self.audio_only {
            builder.audio_only(true);
            self.apply_audio(&mut builder);
            self.apply_output(&mut builder);
            return Ok(builder);
        }

        if self.is_copy() {
            builder.video_codec("copy", self.device);
            self.apply_output(&mut builder);
            self.apply_audio(&mut builder);
            return Ok(builder);
        }

        builder
            .video_codec(&self.encoder, self.device)
            .video_bitrate(self.bitrate, self.constant_quality)
            .lookahead(self.lookahead)
            .preset(&self.preset);

        if let Some(decoder) = &self.hw_decoder {
            builder.hw_decoder(decoder);
        }
        if let Some(size) = self.size {
            builder.size(size.width, size.height);
        }
        if let Some(rect) = self.crop {
            builder.crop(rect)?;
        }

        self.apply_audio(&mut builder);
        self.apply_output(&mut builder);

        builder
            .deinterlace(self.deinterlace)
            .scale(self.scale, self.orientation)
            .rotate(self.rotate);

        for filter in &self.filters {
            let (name, params) = filter.split_once('=').unwrap_or((filter.as_str(), ""));
            let name = name.trim();
            if !name.is_empty() {
                builder.set_filter(name, params.trim());
            }
        }

        if let Some(extra) = &self.extra {
            builder.extra_options(extra);
        }

        Ok(builder)
    }

    fn apply_audio(&self, builder: &mut CommandBuilder) {
        match &self.audio_codec {
            Some(codec) => builder.audio_codec(codec).audio_bitrate(self.audio_bitrate),
            None => builder.audio_codec("copy").audio_bitrate(0),
        };
    }

    fn apply_output(&self, builder: &mut CommandBuilder) {
        if let Some(dir) = &self.output_dir {
            builder.output_dir(dir);
        }
        builder
            .prefix(&self.prefix)
            .suffix(&self.suffix)
            .base_template(self.base.as_deref())
            .extension(self.extension.as_deref());
    }
}

impl Config {
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Loads `path`, or the default location when `None`. A missing default file yields
    /// the built-in defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (Self::config_path()?, false),
        };

        if !explicit && !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Writes the built-in defaults to `path` as a starting point for editing.
    pub fn init(path: &Path, force: bool) -> Result<Self, ConfigError> {
        if path.exists() && !force {
            return Err(ConfigError::Exists(path.to_path_buf()));
        }
        let config = Self::default();
        config.save(path)?;
        tracing::info!(path = %path.display(), "wrote default config");
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, contents).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Configured path when it exists, else the first `ffmpeg` on PATH, else the bare name.
    pub fn resolve_ffmpeg(&self) -> PathBuf {
        if let Some(path) = self.tool.ffmpeg.as_ref().filter(|path| path.exists()) {
            return path.clone();
        }
        if let Some(path) = &self.tool.ffmpeg {
            tracing::warn!(path = %path.display(), "configured ffmpeg does not exist, searching PATH");
        }
        which::which(DEFAULT_PROGRAM).unwrap_or_else(|_| PathBuf::from(DEFAULT_PROGRAM))
    }

    pub fn log_path(&self) -> PathBuf {
        self.tool
            .log_file
            .clone()
            .unwrap_or_else(logsink::default_log_path)
    }

    pub fn decoder(&self) -> Result<DiagnosticDecoder, ConfigError> {
        DiagnosticDecoder::for_label(&self.tool.legacy_encoding)
            .ok_or_else(|| ConfigError::Encoding(self.tool.legacy_encoding.clone()))
    }
}
