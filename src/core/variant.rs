use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Encoder capability variant a builder renders for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderVariant {
    #[default]
    Software,
    Cuda,
    Qsv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Deinterlace {
    Bwdif,
    Yadif,
    Bob,
    Adaptive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Landscape,
    Portrait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecFamily {
    Hevc,
    Other,
}

/// Every filter name the deinterlace setter may install, across variants.
pub const DEINTERLACE_FILTERS: [&str; 5] =
    ["bwdif", "yadif", "bwdif_cuda", "yadif_cuda", "deinterlace_qsv"];
/// Every filter name the scale setter may install, across variants.
pub const SCALE_FILTERS: [&str; 3] = ["scale", "scale_cuda", "scale_qsv"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecSelection {
    pub codec: String,
    pub device_args: Vec<String>,
}

/// Per-variant behaviour, looked up by tag instead of through a trait object.
pub struct VariantOps {
    codec_suffix: Option<&'static str>,
    device_flag: Option<&'static str>,
    lookahead_flag: &'static str,
    scale_filter: &'static str,
    scale_auto: &'static str,
    deinterlace: fn(Deinterlace) -> (&'static str, &'static str),
    hw_filter_suffix: Option<&'static str>,
    hwaccel_args: &'static [&'static str],
    decoder_crop: bool,
}

static SOFTWARE: VariantOps = VariantOps {
    codec_suffix: None,
    device_flag: None,
    lookahead_flag: "-rc-lookahead",
    scale_filter: "scale",
    scale_auto: "-2",
    deinterlace: software_deinterlace,
    hw_filter_suffix: None,
    hwaccel_args: &[],
    decoder_crop: false,
};

static CUDA: VariantOps = VariantOps {
    codec_suffix: Some("nvenc"),
    device_flag: Some("-gpu"),
    lookahead_flag: "-rc-lookahead",
    scale_filter: "scale_cuda",
    scale_auto: "-2",
    deinterlace: cuda_deinterlace,
    hw_filter_suffix: Some("_cuda"),
    hwaccel_args: &["-hwaccel", "cuda", "-hwaccel_output_format", "cuda"],
    decoder_crop: true,
};

static QSV: VariantOps = VariantOps {
    codec_suffix: Some("qsv"),
    device_flag: Some("-qsv_device"),
    lookahead_flag: "-look_ahead_depth",
    scale_filter: "scale_qsv",
    scale_auto: "-1",
    deinterlace: qsv_deinterlace,
    hw_filter_suffix: Some("_qsv"),
    hwaccel_args: &["-hwaccel", "qsv", "-hwaccel_output_format", "qsv"],
    decoder_crop: false,
};

fn software_deinterlace(alg: Deinterlace) -> (&'static str, &'static str) {
    match alg {
        Deinterlace::Bwdif | Deinterlace::Adaptive => ("bwdif", "mode=send_frame"),
        Deinterlace::Yadif => ("yadif", "mode=send_frame"),
        Deinterlace::Bob => ("yadif", "mode=send_field"),
    }
}

fn cuda_deinterlace(alg: Deinterlace) -> (&'static str, &'static str) {
    match alg {
        Deinterlace::Bwdif | Deinterlace::Adaptive => ("bwdif_cuda", "mode=send_frame"),
        Deinterlace::Yadif => ("yadif_cuda", "mode=send_frame"),
        Deinterlace::Bob => ("yadif_cuda", "mode=send_field"),
    }
}

fn qsv_deinterlace(alg: Deinterlace) -> (&'static str, &'static str) {
    match alg {
        Deinterlace::Bwdif => ("bwdif", "mode=send_frame"),
        Deinterlace::Yadif => ("yadif", "mode=send_frame"),
        Deinterlace::Bob => ("deinterlace_qsv", "mode=bob"),
        Deinterlace::Adaptive => ("deinterlace_qsv", "mode=advanced"),
    }
}

impl EncoderVariant {
    pub fn ops(self) -> &'static VariantOps {
        match self {
            EncoderVariant::Software => &SOFTWARE,
            EncoderVariant::Cuda => &CUDA,
            EncoderVariant::Qsv => &QSV,
        }
    }

    /// Guess the variant from a concrete codec name such as `hevc_nvenc`.
    pub fn infer(codec: &str) -> Self {
        let lower = codec.to_ascii_lowercase();
        if lower.ends_with("_nvenc") {
            EncoderVariant::Cuda
        } else if lower.ends_with("_qsv") {
            EncoderVariant::Qsv
        } else {
            EncoderVariant::Software
        }
    }
}

impl FromStr for EncoderVariant {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "software" | "cpu" | "sw" => Ok(EncoderVariant::Software),
            "cuda" | "nvenc" | "nvidia" => Ok(EncoderVariant::Cuda),
            "qsv" | "intel" => Ok(EncoderVariant::Qsv),
            other => Err(format!("unknown encoder variant '{other}'")),
        }
    }
}

impl fmt::Display for EncoderVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EncoderVariant::Software => "software",
            EncoderVariant::Cuda => "cuda",
            EncoderVariant::Qsv => "qsv",
        };
        f.write_str(name)
    }
}

impl FromStr for Deinterlace {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bwdif" => Ok(Deinterlace::Bwdif),
            "yadif" => Ok(Deinterlace::Yadif),
            "bob" => Ok(Deinterlace::Bob),
            "adaptive" => Ok(Deinterlace::Adaptive),
            other => Err(format!("unknown deinterlace algorithm '{other}'")),
        }
    }
}

impl VariantOps {
    /// Maps a logical encoder name (`hevc`, `h264`, `av1`) to this variant's codec.
    /// Concrete names (`libx265`, `hevc_nvenc`) and `copy` pass through unchanged.
    pub fn select_codec(&self, name: &str, device: u32) -> CodecSelection {
        let name = name.trim();
        if name == "copy" {
            return CodecSelection {
                codec: name.to_string(),
                device_args: Vec::new(),
            };
        }

        let concrete = name.starts_with("lib") || name.contains('_');
        let codec = match (concrete, self.codec_suffix) {
            (true, _) => name.to_string(),
            (false, Some(suffix)) => format!("{}_{suffix}", logical_alias(name)),
            (false, None) => software_codec(name).to_string(),
        };

        let device_args = match self.device_flag {
            Some(flag) => vec![flag.to_string(), device.to_string()],
            None => Vec::new(),
        };

        CodecSelection { codec, device_args }
    }

    pub fn lookahead_fragment(&self, frames: u32) -> String {
        format!("{} {frames}", self.lookahead_flag)
    }

    pub fn deinterlace_filter(&self, alg: Deinterlace) -> (&'static str, &'static str) {
        (self.deinterlace)(alg)
    }

    pub fn scale_filter(&self, size: u32, orientation: Orientation) -> (&'static str, String) {
        let auto = self.scale_auto;
        let params = match orientation {
            Orientation::Landscape => format!("{auto}:{size}"),
            Orientation::Portrait => format!("{size}:{auto}"),
        };
        (self.scale_filter, params)
    }

    /// Input flags that upload decoded frames to the device when a hardware filter runs
    /// without a hardware decoder.
    /// Frames stay on the device only when every filter in the chain runs there.
    pub fn hwaccel_args<'a>(&self, filter_names: impl Iterator<Item = &'a str>) -> &'static [&'static str] {
        let Some(suffix) = self.hw_filter_suffix else {
            return &[];
        };
        let mut names = filter_names.peekable();
        if names.peek().is_some() && names.all(|name| name.ends_with(suffix)) {
            self.hwaccel_args
        } else {
            &[]
        }
    }

    pub fn supports_decoder_crop(&self) -> bool {
        self.decoder_crop
    }
}

pub fn codec_family(codec: &str) -> CodecFamily {
    let lower = codec.to_ascii_lowercase();
    if lower.contains("hevc") || lower.contains("265") {
        CodecFamily::Hevc
    } else {
        CodecFamily::Other
    }
}

fn logical_alias(name: &str) -> &str {
    match name {
        "h265" | "x265" => "hevc",
        "avc" | "x264" => "h264",
        other => other,
    }
}

fn software_codec(name: &str) -> &str {
    match logical_alias(name) {
        "hevc" => "libx265",
        "h264" => "libx264",
        "av1" => "libsvtav1",
        "vp9" => "libvpx-vp9",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_mapping_per_variant() {
        let sw = EncoderVariant::Software.ops().select_codec("hevc", 1);
        assert_eq!(sw.codec, "libx265");
        assert!(sw.device_args.is_empty());

        let cuda = EncoderVariant::Cuda.ops().select_codec("h265", 1);
        assert_eq!(cuda.codec, "hevc_nvenc");
        assert_eq!(cuda.device_args, vec!["-gpu", "1"]);

        let qsv = EncoderVariant::Qsv.ops().select_codec("h264", 0);
        assert_eq!(qsv.codec, "h264_qsv");
        assert_eq!(qsv.device_args, vec!["-qsv_device", "0"]);
    }

    #[test]
    fn concrete_and_copy_pass_through() {
        let cuda = EncoderVariant::Cuda.ops();
        assert_eq!(cuda.select_codec("av1_nvenc", 0).codec, "av1_nvenc");
        assert_eq!(cuda.select_codec("libx264", 0).codec, "libx264");
        let copy = cuda.select_codec("copy", 2);
        assert_eq!(copy.codec, "copy");
        assert!(copy.device_args.is_empty());
    }

    #[test]
    fn infers_variant_from_codec() {
        assert_eq!(EncoderVariant::infer("hevc_nvenc"), EncoderVariant::Cuda);
        assert_eq!(EncoderVariant::infer("h264_qsv"), EncoderVariant::Qsv);
        assert_eq!(EncoderVariant::infer("libx265"), EncoderVariant::Software);
    }

    #[test]
    fn scale_params_follow_orientation() {
        let (name, params) = EncoderVariant::Qsv.ops().scale_filter(720, Orientation::Landscape);
        assert_eq!((name, params.as_str()), ("scale_qsv", "-1:720"));
        let (name, params) = EncoderVariant::Cuda.ops().scale_filter(1080, Orientation::Portrait);
        assert_eq!((name, params.as_str()), ("scale_cuda", "1080:-2"));
    }

    #[test]
    fn hwaccel_only_for_device_filters() {
        let cuda = EncoderVariant::Cuda.ops();
        assert!(cuda.hwaccel_args(["crop", "transpose"].into_iter()).is_empty());
        assert_eq!(cuda.hwaccel_args(["scale_cuda"].into_iter())[1], "cuda");
        assert!(cuda.hwaccel_args(std::iter::empty()).is_empty());
        assert!(EncoderVariant::Software
            .ops()
            .hwaccel_args(["scale"].into_iter())
            .is_empty());
    }

    #[test]
    fn mixed_chain_keeps_software_frames() {
        let cuda = EncoderVariant::Cuda.ops();
        assert!(cuda.hwaccel_args(["scale_cuda", "transpose"].into_iter()).is_empty());
        assert!(cuda.hwaccel_args(["crop", "yadif_cuda"].into_iter()).is_empty());
        assert!(!cuda
            .hwaccel_args(["yadif_cuda", "scale_cuda"].into_iter())
            .is_empty());
    }

    #[test]
    fn family_detection() {
        assert_eq!(codec_family("hevc_qsv"), CodecFamily::Hevc);
        assert_eq!(codec_family("libx265"), CodecFamily::Hevc);
        assert_eq!(codec_family("libx264"), CodecFamily::Other);
    }

    #[test]
    fn parses_variant_names() {
        assert_eq!("NVENC".parse::<EncoderVariant>(), Ok(EncoderVariant::Cuda));
        assert!("vulkan".parse::<EncoderVariant>().is_err());
    }
}
