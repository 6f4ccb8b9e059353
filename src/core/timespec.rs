use once_cell::sync::Lazy;
use regex::Regex;

static RE_CLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d{2}:)?\d{2}:\d{2}(?:\.\d+)?$").unwrap());
static RE_UNITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\d+(?:\.\d+)?(?:s|ms|us)?$").unwrap());

/// Accepts `[HH:]MM:SS[.frac]` or `<n>[.frac][s|ms|us]`, the two duration shapes ffmpeg
/// takes for `-ss`/`-to`.
pub fn is_valid_time(value: &str) -> bool {
    RE_CLOCK.is_match(value) || RE_UNITS.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_both_shapes() {
        for value in ["01:02:03", "02:03", "00:00:10.500", "90", "1.5", "250ms", "10S", "7US"] {
            assert!(is_valid_time(value), "{value} should be accepted");
        }
    }

    #[test]
    fn rejects_everything_else() {
        for value in ["", "1:2:3", "abc", "10 s", "1h", "-5", "01:02:03:04", ".5"] {
            assert!(!is_valid_time(value), "{value} should be rejected");
        }
    }
}
