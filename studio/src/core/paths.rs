//! Project path validation.

use std::path::{Component, Path, PathBuf};

use anyhow::{Result, bail};

/// Map a project path onto a relative filesystem path, rejecting anything
/// that would escape the project root.
pub fn safe_relative(path: &str) -> Result<PathBuf> {
    let candidate = Path::new(path);
    let mut out = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                bail!("project path '{path}' escapes the project root");
            }
        }
    }
    if out.as_os_str().is_empty() {
        bail!("project path '{path}' is empty");
    }
    Ok(out)
}
