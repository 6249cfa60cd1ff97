//! Label map — the persisted training-time artifact mapping recognizer
//! integer labels to student names.
//!
//! Plain text, one `<label>,<name>` pair per line. Loaded once at
//! session start and immutable for that session. Malformed lines are
//! skipped with a warning; a missing or entry-less file is fatal.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabelMapError {
    #[error("label map not found: {0}")]
    NotFound(String),
    #[error("failed to read label map {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("label map {0} contains no usable entries")]
    Empty(String),
}

/// Ordered label → name mapping. The mapping is injective: on a
/// duplicate label the first entry wins.
#[derive(Debug, Clone, Default)]
pub struct LabelMap {
    entries: Vec<(i32, String)>,
    by_label: HashMap<i32, usize>,
}

impl LabelMap {
    /// Parse label-map text, skipping blank and malformed lines.
    pub fn parse(text: &str) -> Self {
        let mut map = LabelMap::default();

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let line_no = idx + 1;

            let Some((label_part, name_part)) = line.split_once(',') else {
                tracing::warn!(line = line_no, "label map line has no comma; skipped");
                continue;
            };
            let Ok(label) = label_part.trim().parse::<i32>() else {
                tracing::warn!(line = line_no, text = label_part.trim(), "bad label; skipped");
                continue;
            };
            let name = name_part.trim();
            if name.is_empty() {
                tracing::warn!(line = line_no, label, "empty name; skipped");
                continue;
            }
            if map.by_label.contains_key(&label) {
                tracing::warn!(line = line_no, label, "duplicate label; first entry wins");
                continue;
            }

            map.by_label.insert(label, map.entries.len());
            map.entries.push((label, name.to_string()));
        }

        map
    }

    /// Load the artifact from disk.
    pub fn load(path: &Path) -> Result<Self, LabelMapError> {
        if !path.exists() {
            return Err(LabelMapError::NotFound(path.display().to_string()));
        }

        let text = std::fs::read_to_string(path).map_err(|source| LabelMapError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let map = Self::parse(&text);
        if map.is_empty() {
            return Err(LabelMapError::Empty(path.display().to_string()));
        }

        tracing::info!(path = %path.display(), entries = map.len(), "label map loaded");
        Ok(map)
    }

    pub fn name_for(&self, label: i32) -> Option<&str> {
        self.by_label
            .get(&label)
            .map(|&idx| self.entries[idx].1.as_str())
    }

    /// Entries in file order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, &str)> {
        self.entries.iter().map(|(label, name)| (*label, name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let map = LabelMap::parse("1,aditya\n2,abhishek\n3,chandu\n");
        assert_eq!(map.len(), 3);
        assert_eq!(map.name_for(1), Some("aditya"));
        assert_eq!(map.name_for(3), Some("chandu"));
        assert_eq!(map.name_for(4), None);
    }

    #[test]
    fn test_parse_skips_malformed_lines() {
        let text = "1,asha\n\nnot a pair\nxx,ravi\n2,\n   \n2,ravi\n";
        let map = LabelMap::parse(text);
        assert_eq!(map.len(), 2);
        assert_eq!(map.name_for(1), Some("asha"));
        assert_eq!(map.name_for(2), Some("ravi"));
    }

    #[test]
    fn test_duplicate_label_first_wins() {
        let map = LabelMap::parse("1,asha\n1,ravi\n");
        assert_eq!(map.len(), 1);
        assert_eq!(map.name_for(1), Some("asha"));
    }

    #[test]
    fn test_whitespace_trimmed() {
        let map = LabelMap::parse("  1 ,  asha  \n");
        assert_eq!(map.name_for(1), Some("asha"));
    }

    #[test]
    fn test_iter_preserves_file_order() {
        let map = LabelMap::parse("5,e\n1,a\n3,c\n");
        let labels: Vec<i32> = map.iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec![5, 1, 3]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = LabelMap::load(Path::new("/nonexistent/labels.txt")).unwrap_err();
        assert!(matches!(err, LabelMapError::NotFound(_)));
    }
}
