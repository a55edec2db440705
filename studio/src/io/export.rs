//! Export artifacts on disk: one flattened file per project file plus a
//! `manifest.json` mapping artifact names back to project paths.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};

use crate::core::export::{ExportArtifact, ExportManifest, export_artifacts, manifest_for};
use crate::core::types::ProjectFileSet;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Write every artifact of `files` into `dir`. Returns the artifacts written.
pub fn write_export(dir: &Path, files: &ProjectFileSet) -> Result<Vec<ExportArtifact>> {
    fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
    let artifacts = export_artifacts(files);
    for artifact in &artifacts {
        let target = dir.join(&artifact.file_name);
        fs::write(&target, &artifact.content)
            .with_context(|| format!("write artifact {}", target.display()))?;
    }
    let mut manifest = serde_json::to_string_pretty(&manifest_for(&artifacts))?;
    manifest.push('\n');
    let manifest_path = dir.join(MANIFEST_FILE);
    fs::write(&manifest_path, manifest)
        .with_context(|| format!("write manifest {}", manifest_path.display()))?;
    Ok(artifacts)
}

/// Read an export directory back into a file set using its manifest.
pub fn read_export(dir: &Path) -> Result<ProjectFileSet> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let raw = fs::read_to_string(&manifest_path)
        .with_context(|| format!("read manifest {}", manifest_path.display()))?;
    let manifest: ExportManifest = serde_json::from_str(&raw)
        .with_context(|| format!("parse manifest {}", manifest_path.display()))?;

    let mut files = ProjectFileSet::new();
    for (file_name, path) in &manifest.files {
        if file_name.contains(['/', '\\']) || file_name == MANIFEST_FILE {
            return Err(anyhow!("manifest entry '{file_name}' is not an artifact name"));
        }
        let artifact = dir.join(file_name);
        let content = fs::read_to_string(&artifact)
            .with_context(|| format!("read artifact {}", artifact.display()))?;
        files.upsert(path.clone(), content);
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::seed::starter_project;

    #[test]
    fn export_then_import_reproduces_paths_and_contents() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut files = starter_project();
        files.upsert("src/components/Button.jsx", "export const Button = 1;");
        files.upsert("src_components_Button.jsx", "collides when flattened");

        let artifacts = write_export(temp.path(), &files).expect("export");
        assert_eq!(artifacts.len(), files.len());
        assert!(temp.path().join("src_App.js").is_file());
        assert!(temp.path().join(MANIFEST_FILE).is_file());

        let back = read_export(temp.path()).expect("import");
        assert_eq!(back, files);
    }

    #[test]
    fn manifest_entries_with_separators_are_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(
            temp.path().join(MANIFEST_FILE),
            r#"{"files": {"../escape.js": "src/escape.js"}}"#,
        )
        .expect("write");
        let err = read_export(temp.path()).unwrap_err();
        assert!(err.to_string().contains("not an artifact name"));
    }
}
