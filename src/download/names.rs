use std::collections::{HashMap, HashSet};

/// Hands out unique archive filenames for one bulk download.
///
/// Repeated requests for the same desired name get `-1`, `-2`, ... inserted
/// before the extension. Counters are keyed by the original desired name.
#[derive(Debug, Default)]
pub struct FilenameDeduplicator {
    used: HashSet<String>,
    counters: HashMap<String, u32>,
}

impl FilenameDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve(&mut self, desired: &str) -> String {
        if self.used.insert(desired.to_string()) {
            return desired.to_string();
        }

        let (base, ext) = match desired.rfind('.') {
            Some(dot) => desired.split_at(dot),
            None => (desired, ""),
        };
        let counter = self.counters.entry(desired.to_string()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{base}-{counter}{ext}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_name_gets_counter() {
        let mut names = FilenameDeduplicator::new();
        assert_eq!(names.reserve("a.png"), "a.png");
        assert_eq!(names.reserve("a.png"), "a-1.png");
        assert_eq!(names.reserve("a.png"), "a-2.png");
    }

    #[test]
    fn test_without_extension() {
        let mut names = FilenameDeduplicator::new();
        assert_eq!(names.reserve("clip"), "clip");
        assert_eq!(names.reserve("clip"), "clip-1");
    }

    #[test]
    fn test_extension_is_after_last_dot() {
        let mut names = FilenameDeduplicator::new();
        assert_eq!(names.reserve("archive.tar.gz"), "archive.tar.gz");
        assert_eq!(names.reserve("archive.tar.gz"), "archive.tar-1.gz");
    }

    #[test]
    fn test_skips_names_taken_by_coincidence() {
        let mut names = FilenameDeduplicator::new();
        assert_eq!(names.reserve("a-1.png"), "a-1.png");
        assert_eq!(names.reserve("a.png"), "a.png");
        assert_eq!(names.reserve("a.png"), "a-2.png");
        // a-1.png keeps its own counter
        assert_eq!(names.reserve("a-1.png"), "a-1-1.png");
        assert_eq!(names.reserve("a.png"), "a-3.png");
    }
}
