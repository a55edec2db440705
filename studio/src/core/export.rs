//! Flattened export artifacts, one per project file.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::types::ProjectFileSet;

/// A downloadable file produced from one project file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportArtifact {
    pub file_name: String,
    pub path: String,
    pub content: String,
}

/// Maps artifact file names back to project paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportManifest {
    pub files: BTreeMap<String, String>,
}

/// Flatten path separators into an artifact name: `src/components/A.js` is
/// `src_components_A.js`.
pub fn flatten_path(path: &str) -> String {
    path.replace(['/', '\\'], "_")
}

/// Build one artifact per file. Paths that flatten to the same name get a
/// numeric suffix before the extension so no artifact overwrites another.
pub fn export_artifacts(files: &ProjectFileSet) -> Vec<ExportArtifact> {
    let mut taken = BTreeSet::new();
    files
        .iter()
        .map(|file| {
            let base = flatten_path(&file.path);
            let mut file_name = base.clone();
            let mut n = 2;
            while !taken.insert(file_name.clone()) {
                file_name = numbered(&base, n);
                n += 1;
            }
            ExportArtifact {
                file_name,
                path: file.path.clone(),
                content: file.content.clone(),
            }
        })
        .collect()
}

pub fn manifest_for(artifacts: &[ExportArtifact]) -> ExportManifest {
    ExportManifest {
        files: artifacts
            .iter()
            .map(|a| (a.file_name.clone(), a.path.clone()))
            .collect(),
    }
}

/// Rebuild a file set from exported artifacts.
pub fn import_artifacts<'a>(artifacts: impl IntoIterator<Item = &'a ExportArtifact>) -> ProjectFileSet {
    artifacts
        .into_iter()
        .map(|a| (a.path.clone(), a.content.clone()))
        .collect()
}

fn numbered(name: &str, n: usize) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{n}.{ext}"),
        _ => format!("{name}-{n}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_separators() {
        assert_eq!(flatten_path("src/components/Button.js"), "src_components_Button.js");
        assert_eq!(flatten_path("Makefile"), "Makefile");
    }

    #[test]
    fn colliding_names_get_suffixes() {
        let files: ProjectFileSet = [("src/a.js", "1"), ("src_a.js", "2")].into_iter().collect();
        let names: Vec<String> = export_artifacts(&files)
            .into_iter()
            .map(|a| a.file_name)
            .collect();
        assert_eq!(names, vec!["src_a.js", "src_a-2.js"]);
    }

    #[test]
    fn export_then_import_reproduces_file_set() {
        let files: ProjectFileSet = [
            ("src/index.html", "<html></html>"),
            ("src/App.js", "export default 1;"),
            ("Makefile", "all:"),
        ]
        .into_iter()
        .collect();

        let artifacts = export_artifacts(&files);
        assert_eq!(artifacts.len(), 3);
        let manifest = manifest_for(&artifacts);
        assert_eq!(manifest.files["src_App.js"], "src/App.js");

        assert_eq!(import_artifacts(&artifacts), files);
    }
}
