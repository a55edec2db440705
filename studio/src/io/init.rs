//! Initialization helpers for `.studio/` scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use super::config::{StudioConfig, write_config};
use super::project::write_project;
use crate::core::seed::starter_project;

/// Canonical paths within a studio project root.
#[derive(Debug, Clone)]
pub struct StudioPaths {
    pub root: PathBuf,
    pub studio_dir: PathBuf,
    pub config_path: PathBuf,
    pub gitignore_path: PathBuf,
    pub export_dir: PathBuf,
}

impl StudioPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let studio_dir = root.join(".studio");
        Self {
            root: root.clone(),
            studio_dir: studio_dir.clone(),
            config_path: studio_dir.join("config.toml"),
            gitignore_path: studio_dir.join(".gitignore"),
            export_dir: studio_dir.join("export"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite existing studio-owned files.
    pub force: bool,
    /// If true, also write the starter project (`src/index.html`, ...).
    pub starter: bool,
}

/// Create `.studio/` scaffolding in `root`.
///
/// Fails if `.studio/` already exists unless `options.force` is set.
pub fn init_studio(root: &Path, options: &InitOptions) -> Result<StudioPaths> {
    let paths = StudioPaths::new(root);
    if paths.studio_dir.exists() && !options.force {
        return Err(anyhow!(
            "studio init: .studio already exists (use --force to overwrite)"
        ));
    }
    if paths.studio_dir.exists() && !paths.studio_dir.is_dir() {
        return Err(anyhow!("studio init: .studio exists but is not a directory"));
    }

    fs::create_dir_all(&paths.studio_dir)
        .with_context(|| format!("create directory {}", paths.studio_dir.display()))?;
    write_config(&paths.config_path, &StudioConfig::default())?;
    fs::write(&paths.gitignore_path, STUDIO_GITIGNORE)
        .with_context(|| format!("write file {}", paths.gitignore_path.display()))?;

    if options.starter {
        write_project(&paths.root, &starter_project())?;
    }
    Ok(paths)
}

const STUDIO_GITIGNORE: &str = "export/\n";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::config::load_config;
    use crate::io::project::load_project;

    #[test]
    fn init_creates_config_and_starter() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = init_studio(
            temp.path(),
            &InitOptions {
                force: false,
                starter: true,
            },
        )
        .expect("init");

        assert!(paths.studio_dir.is_dir());
        assert_eq!(
            fs::read_to_string(&paths.gitignore_path).expect("gitignore"),
            STUDIO_GITIGNORE
        );
        assert_eq!(
            load_config(&paths.config_path).expect("config"),
            StudioConfig::default()
        );
        assert_eq!(load_project(temp.path()).expect("load"), starter_project());
    }

    #[test]
    fn init_without_force_refuses_existing_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let options = InitOptions {
            force: false,
            starter: false,
        };
        init_studio(temp.path(), &options).expect("init");
        let err = init_studio(temp.path(), &options).unwrap_err();
        assert!(err.to_string().contains("already exists"));

        init_studio(
            temp.path(),
            &InitOptions {
                force: true,
                starter: false,
            },
        )
        .expect("force re-init");
    }
}
