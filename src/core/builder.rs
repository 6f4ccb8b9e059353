use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::BuildError;
use crate::core::filters::FilterChain;
use crate::core::naming::{self, NamingPlan};
use crate::core::options::{OptionKey, OptionSet};
use crate::core::timespec::is_valid_time;
use crate::core::variant::{
    codec_family, CodecFamily, Deinterlace, EncoderVariant, Orientation, DEINTERLACE_FILTERS,
    SCALE_FILTERS,
};

const GLOBAL_FLAGS: [&str; 2] = ["-hide_banner", "-y"];
const HEVC_TAG: &str = "-tag:v hvc1";
const DEFAULT_CQ: i32 = 25;
const DEFAULT_CRF: i32 = 23;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    #[default]
    None,
    Clockwise,
    CounterClockwise,
}

/// One file's invocation: program, ordered arguments and the resolved output path.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub output: PathBuf,
}

impl RenderedCommand {
    /// Single-line form for logs and dry runs. The program is quoted only when it contains
    /// whitespace; arguments are shell-quoted.
    pub fn command_line(&self) -> String {
        let program = self.program.to_string_lossy();
        let mut line = if program.chars().any(char::is_whitespace) {
            format!("\"{program}\"")
        } else {
            program.into_owned()
        };
        for arg in &self.args {
            line.push(' ');
            line.push_str(&shell_words::quote(arg));
        }
        line
    }
}

/// Mutable encoder configuration, rendered once per queued file.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    program: PathBuf,
    variant: EncoderVariant,
    options: OptionSet,
    filters: FilterChain,
    device: u32,
    family: CodecFamily,
    passthrough: bool,
    audio_only: bool,
    decode_size: Option<(u32, u32)>,
    decoder_crop: Option<String>,
    output_dir: PathBuf,
    prefix: String,
    suffix: String,
    base_template: Option<String>,
    file_index: u32,
    extension: Option<String>,
}

impl CommandBuilder {
    pub fn new(variant: EncoderVariant, program: impl Into<PathBuf>) -> Self {
        let mut options = OptionSet::new();
        options.set(OptionKey::ContainerTag, HEVC_TAG);
        options.set(OptionKey::AudioCodec, "-c:a copy");
        options.set(OptionKey::VideoBitrate, "");
        options.set(OptionKey::Preset, "");

        Self {
            program: program.into(),
            variant,
            options,
            filters: FilterChain::new(),
            device: 0,
            family: CodecFamily::Hevc,
            passthrough: false,
            audio_only: false,
            decode_size: None,
            decoder_crop: None,
            output_dir: PathBuf::from("."),
            prefix: String::new(),
            suffix: String::new(),
            base_template: None,
            file_index: 1,
            extension: None,
        }
    }

    pub fn variant(&self) -> EncoderVariant {
        self.variant
    }

    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_dir
    }

    /// Trim start. Anything that is not a valid time clears the slot.
    pub fn starts(&mut self, time: &str) -> &mut Self {
        self.set_time(OptionKey::TimeStart, "-ss", time);
        self
    }

    /// Trim end. Anything that is not a valid time clears the slot.
    pub fn to(&mut self, time: &str) -> &mut Self {
        self.set_time(OptionKey::TimeEnd, "-to", time);
        self
    }

    fn set_time(&mut self, key: OptionKey, flag: &str, time: &str) {
        if is_valid_time(time) {
            self.options.set(key, format!("{flag} {time}"));
        } else {
            self.options.clear(key);
        }
    }

    pub fn video_codec(&mut self, name: &str, device: u32) -> &mut Self {
        let selection = self.variant.ops().select_codec(name, device);
        self.device = device;
        self.passthrough = selection.codec == "copy";
        self.family = codec_family(&selection.codec);

        let mut fragment = format!("-c:v {}", selection.codec);
        for arg in &selection.device_args {
            fragment.push(' ');
            fragment.push_str(arg);
        }
        self.options.set(OptionKey::VideoCodec, fragment);

        if self.family == CodecFamily::Hevc {
            self.options.set(OptionKey::ContainerTag, HEVC_TAG);
        } else {
            self.options.clear(OptionKey::ContainerTag);
        }
        self
    }

    /// `value <= 0` picks the family default quality target. A positive value is a kbit/s
    /// bitrate, or a quality target when `constant_quality` is on.
    pub fn video_bitrate(&mut self, value: i32, constant_quality: bool) -> &mut Self {
        let fragment = match (value > 0, constant_quality) {
            (false, _) => self.quality_fragment(None),
            (true, true) => self.quality_fragment(Some(value)),
            (true, false) => format!("-b:v {value}K"),
        };
        self.options.set(OptionKey::VideoBitrate, fragment);
        self
    }

    fn quality_fragment(&self, value: Option<i32>) -> String {
        match self.family {
            CodecFamily::Hevc => format!("-b:v 0 -cq {}", value.unwrap_or(DEFAULT_CQ)),
            CodecFamily::Other => format!("-crf {}", value.unwrap_or(DEFAULT_CRF)),
        }
    }

    pub fn preset(&mut self, preset: &str) -> &mut Self {
        let preset = preset.trim();
        if preset.is_empty() {
            self.options.clear(OptionKey::Preset);
        } else {
            self.options.set(OptionKey::Preset, format!("-preset {preset}"));
        }
        self
    }

    pub fn lookahead(&mut self, frames: u32) -> &mut Self {
        if frames == 0 {
            self.options.clear(OptionKey::Lookahead);
        } else {
            let fragment = self.variant.ops().lookahead_fragment(frames);
            self.options.set(OptionKey::Lookahead, fragment);
        }
        self
    }

    pub fn hw_decoder(&mut self, decoder: &str) -> &mut Self {
        let decoder = decoder.trim();
        if decoder.is_empty() {
            self.options.clear(OptionKey::HwDecoder);
        } else {
            self.options.set(OptionKey::HwDecoder, format!("-c:v {decoder}"));
        }
        self
    }

    fn uses_cuvid(&self) -> bool {
        self.options
            .get(OptionKey::HwDecoder)
            .is_some_and(|fragment| fragment.trim_end().ends_with("_cuvid"))
    }

    /// Pins the decoded frame size. Required before `crop` when cropping happens inside a
    /// cuvid decoder.
    pub fn size(&mut self, width: u32, height: u32) -> &mut Self {
        self.decode_size = Some((width, height));
        self
    }

    pub fn crop(&mut self, rect: CropRect) -> Result<&mut Self, BuildError> {
        self.clear_crop();

        if self.variant.ops().supports_decoder_crop() && self.uses_cuvid() {
            let (frame_width, frame_height) = self.decode_size.ok_or(BuildError::CropWithoutSize)?;
            let out_of_bounds = || BuildError::CropOutOfBounds {
                width: rect.width,
                height: rect.height,
                x: rect.x,
                y: rect.y,
                frame_width,
                frame_height,
            };
            let bottom = frame_height
                .checked_sub(rect.y)
                .and_then(|rest| rest.checked_sub(rect.height))
                .ok_or_else(out_of_bounds)?;
            let right = frame_width
                .checked_sub(rect.x)
                .and_then(|rest| rest.checked_sub(rect.width))
                .ok_or_else(out_of_bounds)?;
            self.decoder_crop = Some(format!("{}x{}x{}x{}", rect.y, bottom, rect.x, right));
        } else {
            let params = format!("{}:{}:{}:{}", rect.width, rect.height, rect.x, rect.y);
            self.set_filter("crop", &params);
        }
        Ok(self)
    }

    pub fn clear_crop(&mut self) -> &mut Self {
        self.decoder_crop = None;
        self.remove_filter("crop")
    }

    pub fn deinterlace(&mut self, algorithm: Option<Deinterlace>) -> &mut Self {
        for name in DEINTERLACE_FILTERS {
            self.remove_filter(name);
        }
        match algorithm {
            Some(algorithm) => {
                let (name, params) = self.variant.ops().deinterlace_filter(algorithm);
                self.set_filter(name, params)
            }
            None => self,
        }
    }

    pub fn scale(&mut self, size: Option<u32>, orientation: Orientation) -> &mut Self {
        for name in SCALE_FILTERS {
            self.remove_filter(name);
        }
        match size.filter(|size| *size > 0) {
            Some(size) => {
                let (name, params) = self.variant.ops().scale_filter(size, orientation);
                self.set_filter(name, &params)
            }
            None => self,
        }
    }

    pub fn rotate(&mut self, rotation: Rotation) -> &mut Self {
        match rotation {
            Rotation::None => self.remove_filter("transpose"),
            Rotation::Clockwise => self.set_filter("transpose", "1"),
            Rotation::CounterClockwise => self.set_filter("transpose", "2"),
        }
    }

    pub fn set_filter(&mut self, name: &str, params: &str) -> &mut Self {
        self.filters.set(name, params);
        self
    }

    pub fn remove_filter(&mut self, name: &str) -> &mut Self {
        self.filters.remove(name);
        self
    }

    pub fn extra_options(&mut self, text: &str) -> &mut Self {
        if text.trim().is_empty() {
            self.options.clear(OptionKey::Extra);
        } else {
            self.options.set(OptionKey::Extra, text);
        }
        self
    }

    /// Empty names are ignored and keep the previous codec.
    pub fn audio_codec(&mut self, codec: &str) -> &mut Self {
        let codec = codec.trim();
        if !codec.is_empty() {
            self.options.set(OptionKey::AudioCodec, format!("-c:a {codec}"));
        }
        self
    }

    pub fn audio_bitrate(&mut self, kbps: i32) -> &mut Self {
        if kbps > 0 {
            self.options.set(OptionKey::AudioBitrate, format!("-b:a {kbps}K"));
        } else {
            self.options.clear(OptionKey::AudioBitrate);
        }
        self
    }

    pub fn audio_only(&mut self, enabled: bool) -> &mut Self {
        self.audio_only = enabled;
        self
    }

    pub fn output_dir(&mut self, dir: impl AsRef<Path>) -> &mut Self {
        let dir = dir.as_ref();
        self.output_dir = if dir.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            dir.to_path_buf()
        };
        self
    }

    pub fn prefix(&mut self, prefix: &str) -> &mut Self {
        self.prefix = prefix.to_string();
        self
    }

    pub fn suffix(&mut self, suffix: &str) -> &mut Self {
        self.suffix = suffix.to_string();
        self
    }

    /// Any assignment restarts numbering at 01.
    pub fn base_template(&mut self, template: Option<&str>) -> &mut Self {
        self.base_template = template
            .map(str::trim)
            .filter(|template| !template.is_empty())
            .map(str::to_string);
        self.file_index = 1;
        self
    }

    /// Appended verbatim, leading dot included.
    pub fn extension(&mut self, extension: Option<&str>) -> &mut Self {
        self.extension = extension
            .filter(|extension| !extension.is_empty())
            .map(str::to_string);
        self
    }

    fn audio_codec_name(&self) -> Option<String> {
        self.options.tokens(OptionKey::AudioCodec).into_iter().nth(1)
    }

    fn resolve_extension(&self) -> String {
        if let Some(extension) = &self.extension {
            return extension.clone();
        }
        if self.audio_only {
            let codec = self.audio_codec_name().unwrap_or_default();
            return naming::audio_extension(&codec)
                .unwrap_or(naming::FALLBACK_AUDIO_EXTENSION)
                .to_string();
        }
        naming::DEFAULT_EXTENSION.to_string()
    }

    /// Output path for the next render. Does not consume a template number.
    pub fn peek_output_path(&self, input: &Path) -> PathBuf {
        let base = self
            .base_template
            .as_ref()
            .map(|template| naming::templated_base(template, self.file_index));
        let extension = self.resolve_extension();
        let plan = NamingPlan {
            output_dir: &self.output_dir,
            prefix: &self.prefix,
            suffix: &self.suffix,
            base: base.as_deref(),
            extension: &extension,
        };
        naming::output_path(input, &plan)
    }

    /// Resolves the output path, advancing the file index when a base template is set.
    pub fn output_path(&mut self, input: &Path) -> PathBuf {
        let output = self.peek_output_path(input);
        if self.base_template.is_some() {
            self.file_index += 1;
        }
        output
    }

    /// A rejected render leaves the template counter untouched.
    pub fn render(&mut self, input: &Path) -> Result<RenderedCommand, BuildError> {
        let output = self.peek_output_path(input);
        if naming::is_same_file(input, &output) {
            return Err(BuildError::SameFile { path: output });
        }
        self.output_path(input);

        let encode_video = !self.audio_only && !self.passthrough;
        let mut args: Vec<String> = GLOBAL_FLAGS.iter().map(|flag| flag.to_string()).collect();

        self.options.push_tokens(OptionKey::TimeStart, &mut args);
        self.options.push_tokens(OptionKey::TimeEnd, &mut args);

        if encode_video {
            self.push_input_options(&mut args);
        }
        args.push("-i".to_string());
        args.push(input.to_string_lossy().into_owned());

        if self.audio_only {
            args.push("-vn".to_string());
        } else {
            self.options.push_tokens(OptionKey::VideoCodec, &mut args);
            if encode_video {
                self.options.push_tokens(OptionKey::Preset, &mut args);
                self.options.push_tokens(OptionKey::VideoBitrate, &mut args);
                self.options.push_tokens(OptionKey::Lookahead, &mut args);
                self.options.push_tokens(OptionKey::ContainerTag, &mut args);
                if let Some(graph) = self.filters.render() {
                    args.push("-vf".to_string());
                    args.push(graph);
                }
            }
        }

        if let Some(extra) = self.options.get(OptionKey::Extra) {
            args.extend(split_extra_options(extra));
        }

        self.options.push_tokens(OptionKey::AudioCodec, &mut args);
        self.options.push_tokens(OptionKey::AudioBitrate, &mut args);
        args.push(output.to_string_lossy().into_owned());

        Ok(RenderedCommand {
            program: self.program.clone(),
            args,
            output,
        })
    }

    fn push_input_options(&self, args: &mut Vec<String>) {
        let has_decoder = self.options.is_set(OptionKey::HwDecoder);
        self.options.push_tokens(OptionKey::HwDecoder, args);
        if let Some(crop) = &self.decoder_crop {
            args.push("-crop".to_string());
            args.push(crop.clone());
        }
        if !has_decoder {
            let hwaccel = self.variant.ops().hwaccel_args(self.filters.names());
            args.extend(hwaccel.iter().map(|flag| flag.to_string()));
        }
    }
}

/// Splits free-form options on the first separator present (`;`, then `,`, then `:`),
/// trimming each piece and tokenizing it like a shell would.
pub fn split_extra_options(text: &str) -> Vec<String> {
    let separator = [';', ',', ':'].into_iter().find(|sep| text.contains(*sep));
    let pieces: Vec<&str> = match separator {
        Some(sep) => text.split(sep).collect(),
        None => vec![text],
    };

    pieces
        .into_iter()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .flat_map(|piece| {
            shell_words::split(piece)
                .unwrap_or_else(|_| piece.split_whitespace().map(str::to_string).collect())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn software() -> CommandBuilder {
        let mut builder = CommandBuilder::new(EncoderVariant::Software, "ffmpeg");
        builder.output_dir("/out");
        builder
    }

    fn position(args: &[String], flag: &str) -> usize {
        args.iter()
            .position(|arg| arg == flag)
            .unwrap_or_else(|| panic!("{flag} missing from {args:?}"))
    }

    #[test]
    fn time_setters_store_valid_values() {
        let mut builder = software();
        builder.starts("00:01:30.5").to("95s");
        assert_eq!(builder.options().get(OptionKey::TimeStart), Some("-ss 00:01:30.5"));
        assert_eq!(builder.options().get(OptionKey::TimeEnd), Some("-to 95s"));
    }

    #[test]
    fn invalid_or_empty_time_clears_slot() {
        let mut builder = software();
        builder.starts("10").to("20");
        builder.starts("ten seconds").to("");
        assert_eq!(builder.options().get(OptionKey::TimeStart), None);
        assert_eq!(builder.options().get(OptionKey::TimeEnd), None);
        let rendered = builder.render(Path::new("/in/a.mkv")).unwrap();
        assert!(!rendered.args.iter().any(|arg| arg == "-ss" || arg == "-to"));
    }

    #[test]
    fn rendered_order_is_fixed() {
        let mut builder = software();
        builder
            .audio_codec("aac")
            .audio_bitrate(192)
            .extra_options("-movflags +faststart; -map 0")
            .video_codec("h264", 0)
            .video_bitrate(3000, false)
            .preset("slow")
            .to("00:02:00")
            .starts("00:01:00");

        let rendered = builder.render(Path::new("/in/a.mkv")).unwrap();
        let args = &rendered.args;
        assert_eq!(&args[..2], &["-hide_banner", "-y"]);
        let order = [
            position(args, "-ss"),
            position(args, "-to"),
            position(args, "-i"),
            position(args, "-c:v"),
            position(args, "-movflags"),
            position(args, "-map"),
            position(args, "-c:a"),
            position(args, "-b:a"),
        ];
        assert!(order.windows(2).all(|pair| pair[0] < pair[1]), "{args:?}");
        assert_eq!(args.last().map(String::as_str), Some("/out/a.mp4"));
    }

    #[test]
    fn full_software_command() {
        let mut builder = software();
        builder.video_codec("hevc", 0).video_bitrate(0, false).preset("medium");
        let rendered = builder.render(Path::new("/in/a.mkv")).unwrap();
        assert_eq!(
            rendered.args,
            vec![
                "-hide_banner", "-y", "-i", "/in/a.mkv", "-c:v", "libx265", "-preset", "medium",
                "-b:v", "0", "-cq", "25", "-tag:v", "hvc1", "-c:a", "copy", "/out/a.mp4",
            ]
        );
    }

    #[test]
    fn bitrate_modes_depend_on_family_and_toggle() {
        let mut builder = software();
        builder.video_codec("hevc", 0).video_bitrate(28, true);
        assert_eq!(builder.options().get(OptionKey::VideoBitrate), Some("-b:v 0 -cq 28"));
        builder.video_bitrate(28, false);
        assert_eq!(builder.options().get(OptionKey::VideoBitrate), Some("-b:v 28K"));

        builder.video_codec("h264", 0).video_bitrate(0, true);
        assert_eq!(builder.options().get(OptionKey::VideoBitrate), Some("-crf 23"));
        builder.video_bitrate(18, true);
        assert_eq!(builder.options().get(OptionKey::VideoBitrate), Some("-crf 18"));
        assert_eq!(builder.options().get(OptionKey::ContainerTag), None);
    }

    #[test]
    fn audio_only_renders_vn_and_infers_extension() {
        let mut builder = software();
        builder
            .video_codec("hevc", 0)
            .audio_only(true)
            .audio_codec("libmp3lame")
            .audio_bitrate(320);
        let rendered = builder.render(Path::new("/in/a.mkv")).unwrap();
        assert!(rendered.args.contains(&"-vn".to_string()));
        assert!(!rendered.args.contains(&"-c:v".to_string()));
        assert_eq!(rendered.output, PathBuf::from("/out/a.mp3"));

        builder.audio_codec("aac");
        assert_eq!(builder.render(Path::new("/in/a.mkv")).unwrap().output, PathBuf::from("/out/a.aac"));

        builder.audio_codec("libopus");
        assert_eq!(builder.render(Path::new("/in/a.mkv")).unwrap().output, PathBuf::from("/out/a.mka"));
    }

    #[test]
    fn extension_override_wins() {
        let mut builder = software();
        builder.audio_only(true).audio_codec("aac").extension(Some(".m4a"));
        let rendered = builder.render(Path::new("/in/a.mkv")).unwrap();
        assert_eq!(rendered.output, PathBuf::from("/out/a.m4a"));
    }

    #[test]
    fn templated_names_advance_and_reset() {
        let mut builder = software();
        builder.prefix("A_").suffix("_done").base_template(Some("clip"));
        let first = builder.render(Path::new("/in/x.mov")).unwrap();
        let second = builder.render(Path::new("/in/y.mov")).unwrap();
        assert_eq!(first.output, PathBuf::from("/out/A_clip01_done.mp4"));
        assert_eq!(second.output, PathBuf::from("/out/A_clip02_done.mp4"));

        builder.base_template(Some("clip"));
        let again = builder.render(Path::new("/in/z.mov")).unwrap();
        assert_eq!(again.output, PathBuf::from("/out/A_clip01_done.mp4"));
    }

    #[test]
    fn rendering_is_idempotent_without_template() {
        let mut builder = software();
        builder.video_codec("h264", 0).video_bitrate(2500, false).rotate(Rotation::Clockwise);
        let first = builder.render(Path::new("/in/a.mkv")).unwrap();
        let second = builder.render(Path::new("/in/a.mkv")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn same_file_is_rejected() {
        let mut builder = CommandBuilder::new(EncoderVariant::Software, "ffmpeg");
        builder.output_dir("/videos").extension(Some(".mp4"));
        let err = builder.render(Path::new("/videos/holiday.mp4")).unwrap_err();
        assert_eq!(
            err,
            BuildError::SameFile {
                path: PathBuf::from("/videos/holiday.mp4")
            }
        );
    }

    #[test]
    fn copy_is_passthrough() {
        let mut builder = CommandBuilder::new(EncoderVariant::Cuda, "ffmpeg");
        builder
            .output_dir("/out")
            .hw_decoder("h264_cuvid")
            .video_codec("copy", 0)
            .video_bitrate(4000, false)
            .preset("p7")
            .scale(Some(720), Orientation::Landscape);
        let rendered = builder.render(Path::new("/in/a.ts")).unwrap();
        assert_eq!(
            rendered.args,
            vec!["-hide_banner", "-y", "-i", "/in/a.ts", "-c:v", "copy", "-c:a", "copy", "/out/a.mp4"]
        );
    }

    #[test]
    fn cuda_decoder_crop_needs_size() {
        let mut builder = CommandBuilder::new(EncoderVariant::Cuda, "ffmpeg");
        builder.hw_decoder("hevc_cuvid");
        let rect = CropRect { width: 1280, height: 720, x: 320, y: 180 };
        assert_eq!(builder.crop(rect).err(), Some(BuildError::CropWithoutSize));

        builder.size(1920, 1080);
        builder.crop(rect).unwrap().output_dir("/out").video_codec("hevc", 1);
        let rendered = builder.render(Path::new("/in/a.mkv")).unwrap();
        let args = &rendered.args;
        assert_eq!(args[position(args, "-crop") + 1], "180x180x320x320");
        assert!(position(args, "-crop") < position(args, "-i"));
        assert!(position(args, "-gpu") > position(args, "-i"));
        assert!(!builder.filters().contains("crop"));
    }

    #[test]
    fn crop_outside_frame_is_rejected() {
        let mut builder = CommandBuilder::new(EncoderVariant::Cuda, "ffmpeg");
        builder.hw_decoder("h264_cuvid").size(640, 480);
        let rect = CropRect { width: 640, height: 480, x: 10, y: 0 };
        assert!(matches!(builder.crop(rect), Err(BuildError::CropOutOfBounds { .. })));
    }

    #[test]
    fn software_and_qsv_crop_with_filter() {
        for variant in [EncoderVariant::Software, EncoderVariant::Qsv, EncoderVariant::Cuda] {
            let mut builder = CommandBuilder::new(variant, "ffmpeg");
            let rect = CropRect { width: 100, height: 50, x: 4, y: 2 };
            builder.crop(rect).unwrap();
            assert_eq!(builder.filters().get("crop"), Some("100:50:4:2"), "{variant}");
        }
    }

    #[test]
    fn one_scale_and_one_deinterlace_at_a_time() {
        let mut builder = CommandBuilder::new(EncoderVariant::Cuda, "ffmpeg");
        builder
            .deinterlace(Some(Deinterlace::Yadif))
            .deinterlace(Some(Deinterlace::Bwdif))
            .scale(Some(1080), Orientation::Landscape)
            .scale(Some(720), Orientation::Portrait);
        assert_eq!(
            builder.filters().render().as_deref(),
            Some("bwdif_cuda=mode=send_frame,scale_cuda=720:-2")
        );
        builder.deinterlace(None).scale(None, Orientation::Landscape);
        assert!(builder.filters().is_empty());
    }

    #[test]
    fn hardware_filters_upload_frames() {
        let mut builder = CommandBuilder::new(EncoderVariant::Qsv, "ffmpeg");
        builder
            .output_dir("/out")
            .video_codec("hevc", 0)
            .scale(Some(720), Orientation::Landscape);
        let rendered = builder.render(Path::new("/in/a.mkv")).unwrap();
        let args = &rendered.args;
        assert!(position(args, "-hwaccel") < position(args, "-i"));
        assert_eq!(args[position(args, "-vf") + 1], "scale_qsv=-1:720");
        assert_eq!(args[position(args, "-c:v") + 1], "hevc_qsv");
    }

    #[test]
    fn mixed_filter_chain_decodes_in_software() {
        let mut builder = CommandBuilder::new(EncoderVariant::Cuda, "ffmpeg");
        builder
            .output_dir("/out")
            .video_codec("hevc", 0)
            .scale(Some(720), Orientation::Landscape)
            .rotate(Rotation::Clockwise);
        let rendered = builder.render(Path::new("/in/a.mkv")).unwrap();
        assert!(!rendered.args.iter().any(|arg| arg == "-hwaccel"));
        assert_eq!(
            rendered.args[position(&rendered.args, "-vf") + 1],
            "scale_cuda=-2:720,transpose=1"
        );

        builder.rotate(Rotation::None);
        let rendered = builder.render(Path::new("/in/a.mkv")).unwrap();
        assert!(position(&rendered.args, "-hwaccel") < position(&rendered.args, "-i"));
    }

    #[test]
    fn custom_filters_join_the_chain() {
        let mut builder = software();
        builder.set_filter("hqdn3d", "4").rotate(Rotation::CounterClockwise);
        builder.set_filter("hqdn3d", "2");
        assert_eq!(builder.filters().render().as_deref(), Some("hqdn3d=2,transpose=2"));
        builder.remove_filter("hqdn3d");
        assert_eq!(builder.filters().render().as_deref(), Some("transpose=2"));
    }

    #[test]
    fn rejected_render_keeps_template_number() {
        let mut builder = CommandBuilder::new(EncoderVariant::Software, "ffmpeg");
        builder
            .output_dir("/in")
            .extension(Some(".mkv"))
            .base_template(Some("a"));
        assert!(matches!(
            builder.render(Path::new("/in/a01.mkv")),
            Err(BuildError::SameFile { .. })
        ));
        let rendered = builder.render(Path::new("/in/b.mkv")).unwrap();
        assert_eq!(rendered.output, PathBuf::from("/in/a01.mkv"));
        assert_eq!(builder.peek_output_path(Path::new("/in/c.mkv")), PathBuf::from("/in/a02.mkv"));
    }

    #[test]
    fn lookahead_uses_variant_flag() {
        let mut builder = CommandBuilder::new(EncoderVariant::Qsv, "ffmpeg");
        builder.lookahead(40);
        assert_eq!(builder.options().get(OptionKey::Lookahead), Some("-look_ahead_depth 40"));
        builder.lookahead(0);
        assert_eq!(builder.options().get(OptionKey::Lookahead), None);
    }

    #[test]
    fn extra_options_split_on_first_separator() {
        assert_eq!(
            split_extra_options(" -map 0 ;; -metadata title=\"My clip\" "),
            vec!["-map", "0", "-metadata", "title=My clip"]
        );
        assert_eq!(
            split_extra_options("-ac 2, -ar 48000"),
            vec!["-ac", "2", "-ar", "48000"]
        );
        assert_eq!(split_extra_options("-an"), vec!["-an"]);
        assert!(split_extra_options(" ; ").is_empty());
    }

    #[test]
    fn command_line_quotes_program_and_args() {
        let rendered = RenderedCommand {
            program: PathBuf::from("/opt/my tools/ffmpeg"),
            args: vec!["-i".into(), "a b.mp4".into()],
            output: PathBuf::from("x"),
        };
        assert_eq!(rendered.command_line(), "\"/opt/my tools/ffmpeg\" -i 'a b.mp4'");
    }
}
