use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_EXTENSION: &str = ".mp4";
/// Container used when the audio codec gives no unambiguous extension.
pub const FALLBACK_AUDIO_EXTENSION: &str = ".mka";

/// Everything needed to turn an input path into an output path.
#[derive(Debug, Clone, Copy)]
pub struct NamingPlan<'a> {
    pub output_dir: &'a Path,
    pub prefix: &'a str,
    pub suffix: &'a str,
    /// Resolved base name; `None` means "input stem".
    pub base: Option<&'a str>,
    pub extension: &'a str,
}

/// `<template><NN>` with a two-digit zero-padded counter.
pub fn templated_base(template: &str, index: u32) -> String {
    format!("{template}{index:02}")
}

pub fn audio_extension(codec: &str) -> Option<&'static str> {
    match codec {
        "aac" => Some(".aac"),
        "libmp3lame" | "mp3" => Some(".mp3"),
        _ => None,
    }
}

/// `output_dir/<prefix><base><suffix><extension>`.
pub fn output_path(input: &Path, plan: &NamingPlan<'_>) -> PathBuf {
    let base = match plan.base {
        Some(base) => base.to_string(),
        None => input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    let file_name = format!("{}{}{}{}", plan.prefix, base, plan.suffix, plan.extension);
    plan.output_dir.join(file_name)
}

/// True when writing `output` would overwrite `input`.
pub fn is_same_file(input: &Path, output: &Path) -> bool {
    if input == output {
        return true;
    }
    match (fs::canonicalize(input), fs::canonicalize(output)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
