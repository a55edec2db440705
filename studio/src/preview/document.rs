//! Entry document rewriting.

use anyhow::{Context, Result};
use regex::{Captures, Regex};

use super::import_map::ImportMap;

/// Forwards uncaught errors, unhandled rejections, `console.log` and
/// `console.error` to the host as `PREVIEW_LOG` / `PREVIEW_ERROR` messages.
pub const INTERCEPT_SCRIPT: &str = include_str!("assets/intercept.js");

/// The two `<script>` blocks placed in the entry document's head.
pub fn head_injection(import_map: &ImportMap) -> Result<String> {
    let json = serde_json::to_string(import_map).context("serialize import map")?;
    Ok(format!(
        "<script>\n{INTERCEPT_SCRIPT}</script>\n<script type=\"importmap\">\n{}\n</script>\n",
        escape_script_text(&json)
    ))
}

/// Insert `injection` right before the first `</head>`, or prepend it when the
/// document has no head section.
pub fn inject_head(html: &str, injection: &str) -> String {
    match html.to_ascii_lowercase().find("</head>") {
        Some(at) => format!("{}{injection}{}", &html[..at], &html[at..]),
        None => format!("{injection}{html}"),
    }
}

/// Point `src=`/`href=` attributes naming a project file (by path or bare file
/// name, optionally `./`-prefixed) at that file's resource address.
pub fn rewrite_references(html: &str, resources: &[(String, String)]) -> Result<String> {
    let mut out = html.to_string();
    for (path, address) in resources {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let pattern = format!(
            r#"\b(src|href)\s*=\s*["'](?:\./|/)?(?:{}|{})["']"#,
            regex::escape(path),
            regex::escape(file_name)
        );
        let re = Regex::new(&pattern).with_context(|| format!("reference pattern for {path}"))?;
        out = re
            .replace_all(&out, |caps: &Captures<'_>| format!("{}=\"{address}\"", &caps[1]))
            .into_owned();
    }
    Ok(out)
}

/// Keep JSON embedded in a `<script>` element from closing it early.
fn escape_script_text(text: &str) -> String {
    text.replace("</", "<\\/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injection_lands_before_head_close() {
        let html = "<html><HEAD><title>x</title></HEAD><body></body></html>";
        let out = inject_head(html, "<!--inj-->");
        assert_eq!(
            out,
            "<html><HEAD><title>x</title><!--inj--></HEAD><body></body></html>"
        );
    }

    #[test]
    fn injection_is_prepended_without_head() {
        let out = inject_head("<div id=\"root\"></div>", "<!--inj-->");
        assert_eq!(out, "<!--inj--><div id=\"root\"></div>");
    }

    #[test]
    fn import_map_block_is_script_safe() {
        let mut map = ImportMap::default();
        map.imports
            .insert("weird".to_string(), "/x</script>".to_string());
        let block = head_injection(&map).expect("injection");
        assert!(block.contains("<script type=\"importmap\">"));
        assert!(block.contains("/x<\\/script>"));
        assert!(block.contains("PREVIEW_ERROR"));
        assert!(block.contains("require is not defined"));
    }

    #[test]
    fn references_are_rewritten_by_path_or_name() {
        let html = concat!(
            "<link rel=\"stylesheet\" href=\"./index.css\">",
            "<script type=\"module\" src='index.js'></script>",
            "<script src=\"src/App.js\"></script>",
            "<img src=\"logo.png\">"
        );
        let resources = vec![
            ("src/index.css".to_string(), "/preview/3/src/index.css".to_string()),
            ("src/index.js".to_string(), "/preview/3/src/index.js".to_string()),
            ("src/App.js".to_string(), "/preview/3/src/App.js".to_string()),
        ];
        let out = rewrite_references(html, &resources).expect("rewrite");
        assert!(out.contains("href=\"/preview/3/src/index.css\""));
        assert!(out.contains("src=\"/preview/3/src/index.js\""));
        assert!(out.contains("src=\"/preview/3/src/App.js\""));
        assert!(out.contains("src=\"logo.png\""));
    }
}
