//! Import-resolution table for the preview document.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

/// The `{"imports": {...}}` object embedded in `<script type="importmap">`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportMap {
    pub imports: BTreeMap<String, String>,
}

/// A lookup key two sources wanted to map differently; the first one wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub key: String,
    pub kept: String,
    pub ignored: String,
}

impl Collision {
    pub fn describe(&self) -> String {
        format!(
            "Import map: '{}' already maps to {}; ignoring {}",
            self.key, self.kept, self.ignored
        )
    }
}

#[derive(Debug, Default)]
pub struct ImportMapBuilder {
    map: ImportMap,
    owners: BTreeMap<String, String>,
    collisions: Vec<Collision>,
}

impl ImportMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map an external package name to its hosted module URL.
    pub fn external(&mut self, name: &str, url: &str) {
        self.insert(name.to_string(), url.to_string(), name);
    }

    /// Map every referenceable form of `path` to `address`.
    pub fn file(&mut self, path: &str, address: &str, source_root: &str) {
        for key in file_keys(path, source_root) {
            self.insert(key, address.to_string(), path);
        }
    }

    pub fn finish(self) -> (ImportMap, Vec<Collision>) {
        (self.map, self.collisions)
    }

    fn insert(&mut self, key: String, target: String, owner: &str) {
        match self.map.imports.get(&key) {
            Some(existing) if *existing == target => {}
            Some(_) => {
                let kept = self.owners.get(&key).cloned().unwrap_or_default();
                warn!(key = %key, kept = %kept, ignored = %owner, "import map collision");
                self.collisions.push(Collision {
                    key,
                    kept,
                    ignored: owner.to_string(),
                });
            }
            None => {
                self.owners.insert(key.clone(), owner.to_string());
                self.map.imports.insert(key, target);
            }
        }
    }
}

/// Lookup keys for one project file, without duplicates: the full path,
/// `./name`, `./stem`, and when under `source_root` also `./sub`,
/// `./sub-without-extension` and `sub`.
pub fn file_keys(path: &str, source_root: &str) -> Vec<String> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let mut keys = vec![
        path.to_string(),
        format!("./{file_name}"),
        format!("./{}", strip_extension(file_name)),
    ];
    let sub = path
        .strip_prefix(source_root)
        .filter(|sub| !source_root.is_empty() && !sub.is_empty());
    if let Some(sub) = sub {
        keys.push(format!("./{sub}"));
        keys.push(format!("./{}", strip_extension(sub)));
        keys.push(sub.to_string());
    }
    let mut unique = Vec::with_capacity(keys.len());
    for key in keys {
        if !unique.contains(&key) {
            unique.push(key);
        }
    }
    unique
}

fn strip_extension(name: &str) -> &str {
    let base_start = name.rfind('/').map_or(0, |i| i + 1);
    match name[base_start..].rfind('.') {
        Some(dot) if dot > 0 => &name[..base_start + dot],
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_source_file_gets_six_keys() {
        let keys = file_keys("src/components/Button.jsx", "src/");
        assert_eq!(
            keys,
            vec![
                "src/components/Button.jsx",
                "./Button.jsx",
                "./Button",
                "./components/Button.jsx",
                "./components/Button",
                "components/Button.jsx",
            ]
        );
    }

    #[test]
    fn top_level_source_file_dedupes_keys() {
        let keys = file_keys("src/App.js", "src/");
        assert_eq!(keys, vec!["src/App.js", "./App.js", "./App", "App.js"]);
    }

    #[test]
    fn file_outside_source_root_gets_three_keys() {
        assert_eq!(
            file_keys("lib/util.ts", "src/"),
            vec!["lib/util.ts", "./util.ts", "./util"]
        );
        assert_eq!(file_keys("Makefile", "src/"), vec!["Makefile", "./Makefile"]);
    }

    #[test]
    fn first_mapping_wins_and_collision_is_recorded() {
        let mut builder = ImportMapBuilder::new();
        builder.external("react", "https://esm.sh/react@19.0.0");
        builder.file("src/a/Button.js", "/preview/1/src/a/Button.js", "src/");
        builder.file("src/b/Button.js", "/preview/1/src/b/Button.js", "src/");
        let (map, collisions) = builder.finish();

        assert_eq!(map.imports["./Button.js"], "/preview/1/src/a/Button.js");
        assert_eq!(map.imports["./b/Button"], "/preview/1/src/b/Button.js");
        assert_eq!(map.imports["react"], "https://esm.sh/react@19.0.0");
        let keys: Vec<&str> = collisions.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["./Button.js", "./Button"]);
        assert_eq!(collisions[0].kept, "src/a/Button.js");
        assert_eq!(collisions[0].ignored, "src/b/Button.js");
    }
}
