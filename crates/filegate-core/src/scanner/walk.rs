use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{error, warn};

/// Names never handed to the pipeline: system droppings and dependency
/// caches that are duplicated by construction.
pub const DEFAULT_IGNORES: &[&str] = &[
    ".git",
    "node_modules",
    "vendor",
    "__pycache__",
    ".DS_Store",
    ".venv",
    "venv",
    ".idea",
    ".vscode",
];

/// Deterministic serial directory traversal.
///
/// Entries of each directory are visited in lexicographic name order;
/// in recursive mode a subdirectory is descended the moment it is
/// reached, so a parent's entries always precede its children's.
/// Symlinks and non-regular files are skipped. Unreadable directories
/// are logged and skipped rather than ending the walk.
pub struct Walker {
    stack: Vec<std::vec::IntoIter<(PathBuf, bool)>>,
    recursive: bool,
    ignore_patterns: Vec<Pattern>,
}

impl Walker {
    pub fn new(root: &Path, recursive: bool, ignore_globs: &[String]) -> io::Result<Self> {
        let ignore_patterns = ignore_globs
            .iter()
            .filter_map(|glob| match Pattern::new(glob) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!("Invalid glob pattern '{}': {}", glob, e);
                    None
                }
            })
            .collect();

        let mut walker = Walker {
            stack: Vec::new(),
            recursive,
            ignore_patterns,
        };
        let entries = walker.read_sorted(root)?;
        walker.stack.push(entries.into_iter());
        Ok(walker)
    }

    fn read_sorted(&self, dir: &Path) -> io::Result<Vec<(PathBuf, bool)>> {
        let mut entries: Vec<(PathBuf, bool)> = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if DEFAULT_IGNORES.iter().any(|ig| name == *ig) {
                continue;
            }
            let path = entry.path();
            if self
                .ignore_patterns
                .iter()
                .any(|pattern| pattern.matches_path(&path))
            {
                continue;
            }
            let file_type = entry.file_type()?;
            if file_type.is_symlink() {
                continue;
            }
            if file_type.is_dir() {
                entries.push((path, true));
            } else if file_type.is_file() {
                entries.push((path, false));
            }
        }
        entries.sort_by(|a, b| a.0.file_name().cmp(&b.0.file_name()));
        Ok(entries)
    }
}

impl Iterator for Walker {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        loop {
            let entry = self.stack.last_mut()?.next();
            match entry {
                None => {
                    self.stack.pop();
                }
                Some((path, true)) => {
                    if self.recursive {
                        match self.read_sorted(&path) {
                            Ok(entries) => self.stack.push(entries.into_iter()),
                            Err(e) => {
                                warn!("skipping unreadable directory {}: {}", path.display(), e)
                            }
                        }
                    }
                }
                Some((path, false)) => return Some(path),
            }
        }
    }
}
