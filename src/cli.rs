use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::{FrameSize, JobProfile};
use crate::core::batch::ScriptFlavor;
use crate::core::builder::{CropRect, Rotation};
use crate::core::variant::{Deinterlace, EncoderVariant, Orientation};

#[derive(Debug, Parser)]
#[command(name = "ffqueue", version, about = "Batch ffmpeg transcoding queue")]
pub struct Cli {
    /// Config file (defaults to <config dir>/ffqueue/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log at debug level to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Encode every file in order, streaming ffmpeg output to the terminal
    Run(BatchArgs),
    /// Encode with a live dashboard
    Tui(BatchArgs),
    /// Print the command line each file would run
    Print(BatchArgs),
    /// Write a shell script that runs the whole batch
    Script(ScriptArgs),
    /// Write a config file with the default settings
    Init(InitArgs),
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct BatchArgs {
    /// Input files
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Text file with one input path per line
    #[arg(long, value_name = "FILE")]
    pub list: Option<PathBuf>,

    #[command(flatten)]
    pub job: JobArgs,
}

#[derive(Debug, Args)]
pub struct ScriptArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    /// Script destination
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Script dialect (defaults to the host platform's)
    #[arg(long, value_enum)]
    pub flavor: Option<FlavorArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FlavorArg {
    Batch,
    Posix,
}

impl From<FlavorArg> for ScriptFlavor {
    fn from(value: FlavorArg) -> Self {
        match value {
            FlavorArg::Batch => ScriptFlavor::Batch,
            FlavorArg::Posix => ScriptFlavor::Posix,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RotateArg {
    None,
    Cw,
    Ccw,
}

/// Job settings given on the command line. Anything set here overrides the config profile.
#[derive(Debug, Default, Args)]
pub struct JobArgs {
    /// Encoder variant: software, cuda or qsv (inferred from a concrete codec otherwise)
    #[arg(long, value_parser = parse_variant)]
    pub variant: Option<EncoderVariant>,

    /// Video encoder, logical (hevc, h264, av1) or concrete (libx265, hevc_nvenc, copy)
    #[arg(short = 'c', long = "vcodec")]
    pub encoder: Option<String>,

    /// GPU index for hardware encoders
    #[arg(long)]
    pub device: Option<u32>,

    /// Video bitrate in kbit/s, or quality target with --cq; 0 = codec default
    #[arg(short = 'b', long)]
    pub bitrate: Option<i32>,

    /// Treat --bitrate as a constant-quality target
    #[arg(long, conflicts_with = "abr")]
    pub cq: bool,

    /// Treat --bitrate as an average bitrate
    #[arg(long)]
    pub abr: bool,

    #[arg(short, long)]
    pub preset: Option<String>,

    /// Look-ahead frames; 0 disables
    #[arg(long)]
    pub lookahead: Option<u32>,

    /// Hardware decoder, e.g. h264_cuvid
    #[arg(long)]
    pub hw_decoder: Option<String>,

    /// Decoded frame size WxH, required for cuvid cropping
    #[arg(long, value_parser = parse_size)]
    pub size: Option<FrameSize>,

    /// Crop rectangle W:H:X:Y
    #[arg(long, value_parser = parse_crop)]
    pub crop: Option<CropRect>,

    /// Scale the short side to this many pixels
    #[arg(long)]
    pub scale: Option<u32>,

    /// Scale a portrait source (width is the short side)
    #[arg(long)]
    pub portrait: bool,

    #[arg(long, value_enum)]
    pub rotate: Option<RotateArg>,

    /// bwdif, yadif, bob or adaptive
    #[arg(long, value_parser = parse_deinterlace)]
    pub deinterlace: Option<Deinterlace>,

    /// Audio encoder; omit to copy the audio stream
    #[arg(short = 'a', long = "acodec")]
    pub audio_codec: Option<String>,

    /// Audio bitrate in kbit/s
    #[arg(long)]
    pub audio_bitrate: Option<i32>,

    /// Drop video and extract audio only
    #[arg(long)]
    pub audio_only: bool,

    /// Trim start (hh:mm:ss[.f] or seconds with s/ms/us)
    #[arg(long = "ss")]
    pub start: Option<String>,

    /// Trim end
    #[arg(long = "to")]
    pub end: Option<String>,

    /// Extra ffmpeg options, pieces separated by ';', ',' or ':'
    #[arg(long)]
    pub extra: Option<String>,

    /// Additional video filter, e.g. hqdn3d=4 (repeatable)
    #[arg(long = "filter", value_name = "NAME[=PARAMS]")]
    pub filters: Vec<String>,

    /// Output directory
    #[arg(long = "out-dir")]
    pub output_dir: Option<PathBuf>,

    #[arg(long)]
    pub prefix: Option<String>,

    #[arg(long)]
    pub suffix: Option<String>,

    /// Numbered base name: clip -> clip01, clip02, ...
    #[arg(long)]
    pub base: Option<String>,

    /// Output extension including the dot, e.g. .mkv
    #[arg(long)]
    pub ext: Option<String>,
}

impl JobArgs {
    pub fn apply(&self, profile: &mut JobProfile) {
        if let Some(encoder) = &self.encoder {
            profile.encoder = encoder.clone();
            if self.variant.is_none() {
                profile.variant = EncoderVariant::infer(encoder);
            }
        }
        if let Some(variant) = self.variant {
            profile.variant = variant;
        }
        if let Some(device) = self.device {
            profile.device = device;
        }
        if let Some(bitrate) = self.bitrate {
            profile.bitrate = bitrate;
        }
        if self.cq {
            profile.constant_quality = true;
        }
        if self.abr {
            profile.constant_quality = false;
        }
        if let Some(preset) = &self.preset {
            profile.preset = preset.clone();
        }
        if let Some(lookahead) = self.lookahead {
            profile.lookahead = lookahead;
        }
        if self.hw_decoder.is_some() {
            profile.hw_decoder = self.hw_decoder.clone();
        }
        if self.size.is_some() {
            profile.size = self.size;
        }
        if self.crop.is_some() {
            profile.crop = self.crop;
        }
        if self.scale.is_some() {
            profile.scale = self.scale;
        }
        if self.portrait {
            profile.orientation = Orientation::Portrait;
        }
        if let Some(rotate) = self.rotate {
            profile.rotate = match rotate {
                RotateArg::None => Rotation::None,
                RotateArg::Cw => Rotation::Clockwise,
                RotateArg::Ccw => Rotation::CounterClockwise,
            };
        }
        if self.deinterlace.is_some() {
            profile.deinterlace = self.deinterlace;
        }
        if self.audio_codec.is_some() {
            profile.audio_codec = self.audio_codec.clone();
        }
        if let Some(audio_bitrate) = self.audio_bitrate {
            profile.audio_bitrate = audio_bitrate;
        }
        if self.audio_only {
            profile.audio_only = true;
        }
        if self.start.is_some() {
            profile.start = self.start.clone();
        }
        if self.end.is_some() {
            profile.end = self.end.clone();
        }
        if self.extra.is_some() {
            profile.extra = self.extra.clone();
        }
        profile.filters.extend(self.filters.iter().cloned());
        if self.output_dir.is_some() {
            profile.output_dir = self.output_dir.clone();
        }
        if let Some(prefix) = &self.prefix {
            profile.prefix = prefix.clone();
        }
        if let Some(suffix) = &self.suffix {
            profile.suffix = suffix.clone();
        }
        if self.base.is_some() {
            profile.base = self.base.clone();
        }
        if self.ext.is_some() {
            profile.extension = self.ext.clone();
        }
    }
}

fn parse_variant(value: &str) -> Result<EncoderVariant, String> {
    value.parse()
}

fn parse_deinterlace(value: &str) -> Result<Deinterlace, String> {
    value.parse()
}

fn parse_numbers(value: &str, separator: char, count: usize) -> Result<Vec<u32>, String> {
    let numbers = value
        .split(separator)
        .map(|part| part.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| format!("'{value}': {err}"))?;
    if numbers.len() != count {
        return Err(format!("'{value}': expected {count} numbers separated by '{separator}'"));
    }
    Ok(numbers)
}

fn parse_size(value: &str) -> Result<FrameSize, String> {
    let numbers = parse_numbers(&value.to_ascii_lowercase(), 'x', 2)?;
    Ok(FrameSize {
        width: numbers[0],
        height: numbers[1],
    })
}

fn parse_crop(value: &str) -> Result<CropRect, String> {
    let numbers = parse_numbers(value, ':', 4)?;
    Ok(CropRect {
        width: numbers[0],
        height: numbers[1],
        x: numbers[2],
        y: numbers[3],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("ffqueue").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn run_collects_files_and_job_flags() {
        let cli = parse(&["run", "a.mkv", "b.mkv", "-c", "hevc_nvenc", "--crop", "1280:720:0:0", "--abr"]);
        let Commands::Run(batch) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(batch.files, vec![PathBuf::from("a.mkv"), PathBuf::from("b.mkv")]);

        let mut profile = JobProfile::default();
        batch.job.apply(&mut profile);
        assert_eq!(profile.variant, EncoderVariant::Cuda);
        assert_eq!(profile.encoder, "hevc_nvenc");
        assert_eq!(profile.crop, Some(CropRect { width: 1280, height: 720, x: 0, y: 0 }));
        assert!(!profile.constant_quality);
    }

    #[test]
    fn explicit_variant_beats_inference() {
        let cli = parse(&["print", "a.mkv", "-c", "hevc", "--variant", "qsv"]);
        let Commands::Print(batch) = cli.command else {
            panic!("expected print");
        };
        let mut profile = JobProfile::default();
        batch.job.apply(&mut profile);
        assert_eq!(profile.variant, EncoderVariant::Qsv);
    }

    #[test]
    fn unset_flags_keep_profile_values() {
        let mut profile = JobProfile {
            prefix: "p_".to_string(),
            scale: Some(1080),
            ..JobProfile::default()
        };
        JobArgs::default().apply(&mut profile);
        assert_eq!(profile.prefix, "p_");
        assert_eq!(profile.scale, Some(1080));
    }

    #[test]
    fn script_takes_destination_and_flavor() {
        let cli = parse(&["--verbose", "script", "-o", "run.bat", "--flavor", "batch", "a.mkv"]);
        assert!(cli.verbose);
        let Commands::Script(args) = cli.command else {
            panic!("expected script");
        };
        assert_eq!(args.output, PathBuf::from("run.bat"));
        assert!(matches!(args.flavor, Some(FlavorArg::Batch)));
        assert_eq!(args.batch.files, vec![PathBuf::from("a.mkv")]);
    }

    #[test]
    fn filters_repeat_and_extend_the_profile() {
        let cli = parse(&["run", "a.mkv", "--filter", "hqdn3d=4", "--filter", "hflip"]);
        let Commands::Run(batch) = cli.command else {
            panic!("expected run");
        };
        let mut profile = JobProfile {
            filters: vec!["unsharp".to_string()],
            ..JobProfile::default()
        };
        batch.job.apply(&mut profile);
        assert_eq!(profile.filters, vec!["unsharp", "hqdn3d=4", "hflip"]);
    }

    #[test]
    fn init_takes_force_and_global_config() {
        let cli = parse(&["init", "--force", "--config", "/tmp/ffq.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/ffq.toml")));
        assert!(matches!(cli.command, Commands::Init(InitArgs { force: true })));
    }

    #[test]
    fn size_and_crop_parsers_validate_shape() {
        assert_eq!(parse_size("1920x1080"), Ok(FrameSize { width: 1920, height: 1080 }));
        assert!(parse_size("1920").is_err());
        assert!(parse_crop("1:2:3").is_err());
        assert!(parse_crop("a:b:c:d").is_err());
    }
}
