use once_cell::sync::Lazy;
use regex::Regex;

static RE_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(frame|fps|time|speed)=\s*([^\s]+)").unwrap());

/// Latest `frame=`/`fps=`/`time=`/`speed=` values seen on an ffmpeg status line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressUpdate {
    pub frame: Option<u64>,
    pub fps: Option<f32>,
    pub time: Option<String>,
    pub speed: Option<String>,
}

impl ProgressUpdate {
    pub fn summary(&self) -> String {
        format!(
            "time={} frame={} fps={} speed={}",
            self.time.as_deref().unwrap_or("--:--:--"),
            self.frame.map(|f| f.to_string()).unwrap_or_default(),
            self.fps.map(|f| format!("{f:.1}")).unwrap_or_default(),
            self.speed.as_deref().unwrap_or(""),
        )
    }
}

pub fn parse_progress_line(line: &str) -> Option<ProgressUpdate> {
    let mut update = ProgressUpdate::default();
    let mut matched = false;

    for capture in RE_FIELD.captures_iter(line) {
        let value = &capture[2];
        match &capture[1] {
            "frame" => update.frame = value.parse().ok(),
            "fps" => update.fps = value.parse().ok(),
            "time" => update.time = Some(value.to_string()),
            "speed" => update.speed = Some(value.to_string()),
            _ => continue,
        }
        matched = true;
    }

    matched.then_some(update)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_padded_status_line() {
        let update = parse_progress_line(
            "frame=  240 fps= 59.9 q=28.0 size=    1024kB time=00:00:08.00 bitrate=1048.6kbits/s speed=1.99x",
        )
        .unwrap();
        assert_eq!(update.frame, Some(240));
        assert_eq!(update.fps, Some(59.9));
        assert_eq!(update.time.as_deref(), Some("00:00:08.00"));
        assert_eq!(update.speed.as_deref(), Some("1.99x"));
        assert_eq!(update.summary(), "time=00:00:08.00 frame=240 fps=59.9 speed=1.99x");
    }

    #[test]
    fn ignores_other_lines() {
        assert_eq!(parse_progress_line("Stream mapping:"), None);
    }
}
