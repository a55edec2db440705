//! Language tags for virtual files.

/// Tag used for paths without an extension.
pub const DEFAULT_LANGUAGE: &str = "text";

/// Derive a file's language tag from the extension of its final path segment.
///
/// `src/Foo.tsx` is `"tsx"`; `Makefile` and `docs.d/README` are `"text"`.
pub fn language_for_path(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext,
        _ => DEFAULT_LANGUAGE,
    }
}

/// Whether the preview engine transpiles this path into a module resource.
pub fn is_script(path: &str) -> bool {
    matches!(language_for_path(path), "js" | "jsx" | "ts" | "tsx")
}

/// Whether the preview engine publishes this path verbatim as a stylesheet.
pub fn is_stylesheet(path: &str) -> bool {
    language_for_path(path) == "css"
}
