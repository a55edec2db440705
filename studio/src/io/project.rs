//! Project directories on disk.
//!
//! The studio works on an in-memory [`ProjectFileSet`]; these helpers load one
//! from a directory and write one back. Paths are always `/`-separated and
//! relative to the project root.

use std::fs;
use std::path::{Component, Path};

use anyhow::{Context, Result, bail};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::core::paths::safe_relative;
use crate::core::types::ProjectFileSet;

const SKIPPED_DIRS: &[&str] = &["node_modules", "target", "dist"];

/// Read every text file under `root` into a file set.
///
/// Hidden entries (`.studio/`, `.git/`, dotfiles) and dependency/build
/// directories are skipped. Files that are not valid UTF-8 are skipped too.
pub fn load_project(root: &Path) -> Result<ProjectFileSet> {
    if !root.is_dir() {
        bail!("project directory {} does not exist", root.display());
    }
    let mut files = ProjectFileSet::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_skipped(entry));
    for entry in walker {
        let entry = entry.with_context(|| format!("walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .with_context(|| format!("relativize {}", entry.path().display()))?;
        let Some(key) = project_key(rel) else {
            continue;
        };
        match fs::read_to_string(entry.path()) {
            Ok(content) => {
                files.upsert(key, content);
            }
            Err(err) if err.kind() == std::io::ErrorKind::InvalidData => {
                debug!(path = %entry.path().display(), "skipping non-UTF-8 file");
            }
            Err(err) => {
                return Err(err).with_context(|| format!("read {}", entry.path().display()));
            }
        }
    }
    Ok(files)
}

/// Write every file of `files` under `root`, creating directories as needed.
/// Returns the number of files written.
pub fn write_project(root: &Path, files: &ProjectFileSet) -> Result<usize> {
    // Every path is validated before the first write.
    let targets = files
        .iter()
        .map(|file| Ok((root.join(safe_relative(&file.path)?), file)))
        .collect::<Result<Vec<_>>>()?;
    for (target, file) in targets {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(&target, &file.content)
            .with_context(|| format!("write file {}", target.display()))?;
    }
    Ok(files.len())
}

fn is_skipped(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || (entry.file_type().is_dir() && SKIPPED_DIRS.contains(&name.as_ref()))
}

fn project_key(rel: &Path) -> Option<String> {
    let parts: Option<Vec<&str>> = rel
        .components()
        .map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();
    parts.map(|parts| parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::seed::starter_project;

    #[test]
    fn write_then_load_reproduces_the_file_set() {
        let temp = tempfile::tempdir().expect("tempdir");
        let files = starter_project();
        let written = write_project(temp.path(), &files).expect("write");
        assert_eq!(written, files.len());

        let loaded = load_project(temp.path()).expect("load");
        assert_eq!(loaded, files);
    }

    #[test]
    fn load_skips_hidden_and_dependency_dirs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join(".studio")).expect("mkdir");
        fs::create_dir_all(root.join("node_modules/react")).expect("mkdir");
        fs::create_dir_all(root.join("src")).expect("mkdir");
        fs::write(root.join(".studio/config.toml"), "").expect("write");
        fs::write(root.join("node_modules/react/index.js"), "x").expect("write");
        fs::write(root.join("src/App.js"), "app").expect("write");
        fs::write(root.join("logo.bin"), [0xff, 0xfe, 0x00]).expect("write");

        let loaded = load_project(root).expect("load");
        assert_eq!(loaded.paths().collect::<Vec<_>>(), vec!["src/App.js"]);
    }

    #[test]
    fn unsafe_path_aborts_before_anything_is_written() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().join("project");
        fs::create_dir_all(&root).expect("mkdir");
        let mut files = starter_project();
        files.upsert("../outside.js", "escaped");

        let err = write_project(&root, &files).unwrap_err();
        assert!(err.to_string().contains("escapes the project root"));
        assert!(!temp.path().join("outside.js").exists());
        assert_eq!(fs::read_dir(&root).expect("read dir").count(), 0);
    }

    #[test]
    fn missing_root_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = load_project(&temp.path().join("nope")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
