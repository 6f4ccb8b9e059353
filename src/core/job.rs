use std::collections::VecDeque;
use std::path::{Path, PathBuf};

pub type JobId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Running,
    Draining,
}

/// A pending input file. `id` is the correlation handle the UI uses for its list row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub id: u64,
    pub path: PathBuf,
}

/// Pending input files in submission order. The running file stays at the head until its
/// exit is processed.
#[derive(Debug, Default)]
pub struct JobQueue {
    entries: VecDeque<QueueEntry>,
    next_id: u64,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: PathBuf) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.entries.push_back(QueueEntry { id, path });
        id
    }

    pub fn front(&self) -> Option<&QueueEntry> {
        self.entries.front()
    }

    /// Removes the first entry whose path equals `path`; position is irrelevant.
    pub fn remove_path(&mut self, path: &Path) -> Option<QueueEntry> {
        let index = self.entries.iter().position(|entry| entry.path == path)?;
        self.entries.remove(index)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|entry| entry.path.clone()).collect()
    }
}

/// The one process currently running, tied to the file it was started for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveJob {
    pub id: JobId,
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removal_is_by_value() {
        let mut queue = JobQueue::new();
        queue.push(PathBuf::from("a.mp4"));
        queue.push(PathBuf::from("b.mp4"));
        queue.push(PathBuf::from("c.mp4"));

        let removed = queue.remove_path(Path::new("b.mp4")).unwrap();
        assert_eq!(removed.path, PathBuf::from("b.mp4"));
        assert_eq!(queue.paths(), vec![PathBuf::from("a.mp4"), PathBuf::from("c.mp4")]);
        assert!(queue.remove_path(Path::new("b.mp4")).is_none());
    }

    #[test]
    fn ids_are_unique_per_push() {
        let mut queue = JobQueue::new();
        let first = queue.push(PathBuf::from("a.mp4"));
        let second = queue.push(PathBuf::from("a.mp4"));
        assert_ne!(first, second);
        queue.remove_path(Path::new("a.mp4"));
        assert_eq!(queue.front().map(|entry| entry.id), Some(second));
    }
}
