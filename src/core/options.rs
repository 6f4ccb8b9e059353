use std::collections::BTreeMap;

/// Semantic flag slots of one encoder invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OptionKey {
    VideoCodec,
    AudioCodec,
    VideoBitrate,
    AudioBitrate,
    Preset,
    ContainerTag,
    TimeStart,
    TimeEnd,
    HwDecoder,
    Lookahead,
    Extra,
}

/// Slot -> flag fragment. A slot holding `None` is explicitly cleared and never rendered,
/// which is distinct from `Some("")` (renders zero tokens but still counts as set).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionSet {
    slots: BTreeMap<OptionKey, Option<String>>,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: OptionKey, fragment: impl Into<String>) {
        self.slots.insert(key, Some(fragment.into()));
    }

    pub fn clear(&mut self, key: OptionKey) {
        self.slots.insert(key, None);
    }

    pub fn get(&self, key: OptionKey) -> Option<&str> {
        self.slots.get(&key).and_then(|value| value.as_deref())
    }

    pub fn is_set(&self, key: OptionKey) -> bool {
        self.get(key).is_some()
    }

    /// Whitespace tokens of the fragment stored in `key`, empty when the slot is absent.
    pub fn tokens(&self, key: OptionKey) -> Vec<String> {
        self.get(key)
            .map(|fragment| fragment.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn push_tokens(&self, key: OptionKey, args: &mut Vec<String>) {
        args.extend(self.tokens(key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleared_slot_is_absent() {
        let mut options = OptionSet::new();
        options.set(OptionKey::Preset, "-preset slow");
        options.clear(OptionKey::Preset);
        assert_eq!(options.get(OptionKey::Preset), None);
        assert!(options.tokens(OptionKey::Preset).is_empty());
    }

    #[test]
    fn empty_fragment_is_set_but_renders_nothing() {
        let mut options = OptionSet::new();
        options.set(OptionKey::VideoBitrate, "");
        assert!(options.is_set(OptionKey::VideoBitrate));
        assert!(options.tokens(OptionKey::VideoBitrate).is_empty());
    }

    #[test]
    fn fragments_split_on_whitespace() {
        let mut options = OptionSet::new();
        options.set(OptionKey::VideoBitrate, "-b:v 0  -cq 25");
        assert_eq!(
            options.tokens(OptionKey::VideoBitrate),
            vec!["-b:v", "0", "-cq", "25"]
        );
    }
}
