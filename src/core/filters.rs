/// Video post-processing stages keyed by filter name, kept in insertion order so the
/// rendered graph is stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterChain {
    entries: Vec<(String, String)>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites an existing entry in place, otherwise appends.
    pub fn set(&mut self, name: impl Into<String>, params: impl Into<String>) {
        let name = name.into();
        let params = params.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = params,
            None => self.entries.push((name, params)),
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(existing, _)| existing != name);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, params)| params.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// `name=params` joined with commas, `None` for an empty chain.
    pub fn render(&self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }

        let graph = self
            .entries
            .iter()
            .map(|(name, params)| {
                if params.is_empty() {
                    name.clone()
                } else {
                    format!("{name}={params}")
                }
            })
            .collect::<Vec<_>>()
            .join(",");
        Some(graph)
    }
}
