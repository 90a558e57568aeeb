//! Class label store.
//!
//! Labels are read once from a plain text file, one label per line, where the
//! line index is the class id reported by the accelerator. The loaded set is
//! cached for the lifetime of the store and never reloaded.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Ordered, index-addressable class names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Labels {
    names: Vec<String>,
}

impl Labels {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Read a label file. A trailing newline does not produce an extra label.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read label file {}", path.display()))?;
        Ok(Self::parse(&raw))
    }

    pub fn parse(raw: &str) -> Self {
        Self::new(raw.lines())
    }

    /// Label for a class id, if the id is within the label set.
    pub fn get(&self, class_id: usize) -> Option<&str> {
        self.names.get(class_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Lazily loads a label file and caches the result.
pub struct LabelStore {
    path: PathBuf,
    cache: OnceLock<Arc<Labels>>,
}

impl LabelStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            cache: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the cached labels, loading them on first use.
    ///
    /// A failed load is not cached; the next call retries the read.
    pub fn labels(&self) -> Result<Arc<Labels>> {
        if let Some(labels) = self.cache.get() {
            return Ok(Arc::clone(labels));
        }
        let loaded = Arc::new(Labels::load(&self.path)?);
        if loaded.is_empty() {
            log::warn!("label file {} contains no labels", self.path.display());
        }
        Ok(Arc::clone(self.cache.get_or_init(|| loaded)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_keeps_file_order_and_ignores_trailing_newline() {
        let labels = Labels::parse("pedestrian_on_zebra\npedestrian_off_zebra\ncar\n");
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.get(0), Some("pedestrian_on_zebra"));
        assert_eq!(labels.get(2), Some("car"));
        assert_eq!(labels.get(3), None);
    }

    #[test]
    fn parse_without_trailing_newline_and_with_crlf() {
        let labels = Labels::parse("a\r\nb");
        assert_eq!(labels.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn blank_lines_keep_their_index() {
        let labels = Labels::parse("a\n\nc\n");
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.get(1), Some(""));
        assert_eq!(labels.get(2), Some("c"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Labels::load(dir.path().join("missing.txt")).unwrap_err();
        assert!(err.downcast_ref::<std::io::Error>().is_some());
        assert!(err.to_string().contains("missing.txt"));
    }

    #[test]
    fn store_caches_first_successful_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "pedestrian_on_zebra").unwrap();
        let store = LabelStore::new(file.path());

        let first = store.labels().unwrap();
        std::fs::write(file.path(), "changed\nentirely\n").unwrap();
        let second = store.labels().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.get(0), Some("pedestrian_on_zebra"));
    }
}
