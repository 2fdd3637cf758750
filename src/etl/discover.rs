/// Discovery Module
///
/// Recursive lookup of data files below a root directory.
use crate::error::EtlError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct FileDiscovery {
    suffix: String,
}

impl Default for FileDiscovery {
    fn default() -> Self {
        Self::new("json")
    }
}

impl FileDiscovery {
    /// `suffix` is the file extension to match, with or without a leading dot
    pub fn new(suffix: &str) -> Self {
        Self { suffix: suffix.trim_start_matches('.').to_string() }
    }

    /// Find every matching file below `root`
    ///
    /// Returned paths are absolute and unique. Entries are visited sorted by
    /// file name within each directory, so the order is stable across runs.
    /// Hidden files (leading `.`) are skipped; hidden directories are still walked.
    pub fn discover(&self, root: &Path) -> Result<Vec<PathBuf>, EtlError> {
        let root = root.canonicalize().map_err(|e| EtlError::io(root, e))?;
        if !root.is_dir() {
            return Err(EtlError::NotADirectory(root));
        }

        let mut seen = HashSet::new();
        let mut files = Vec::new();

        let walker = WalkDir::new(&root).follow_links(false).sort_by_file_name();

        for entry in walker {
            let entry = entry?;

            if !entry.file_type().is_file() || !self.matches(entry.path()) {
                continue;
            }

            let path = entry.into_path();
            if seen.insert(path.clone()) {
                files.push(path);
            }
        }

        tracing::debug!("Discovered {} files under {}", files.len(), root.display());
        Ok(files)
    }

    fn matches(&self, path: &Path) -> bool {
        let hidden = path.file_name().and_then(|name| name.to_str()).map(|name| name.starts_with('.')).unwrap_or(true);
        if hidden {
            return false;
        }

        path.extension().and_then(|ext| ext.to_str()).map(|ext| ext == self.suffix).unwrap_or(false)
    }
}
