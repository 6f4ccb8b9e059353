use std::borrow::Cow;

use encoding_rs::{Encoding, SHIFT_JIS};

pub const DEFAULT_LEGACY_ENCODING: &str = "shift_jis";

/// Legacy regional code page used for diagnostics that are not valid UTF-8 and for
/// exported scripts. Picked once at startup and shared read-only afterwards.
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticDecoder {
    legacy: &'static Encoding,
}

impl Default for DiagnosticDecoder {
    fn default() -> Self {
        Self { legacy: SHIFT_JIS }
    }
}

impl DiagnosticDecoder {
    /// Looks up a WHATWG label such as `shift_jis`, `windows-1252` or `gbk`.
    pub fn for_label(label: &str) -> Option<Self> {
        Encoding::for_label(label.trim().as_bytes()).map(|legacy| Self { legacy })
    }

    pub fn name(&self) -> &'static str {
        self.legacy.name()
    }

    /// Canonical (UTF-8) text for one diagnostic line. Malformed input is never rejected;
    /// undecodable sequences become replacement characters.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        match std::str::from_utf8(bytes) {
            Ok(text) => Cow::Borrowed(text),
            Err(_) => {
                let (text, _had_errors) = self.legacy.decode_without_bom_handling(bytes);
                text
            }
        }
    }

    pub fn encode<'a>(&self, text: &'a str) -> Cow<'a, [u8]> {
        let (bytes, _, _) = self.legacy.encode(text);
        bytes
    }
}
