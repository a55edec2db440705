//! Script transforms applied before a file becomes a preview resource.
//!
//! Whatever a [`Transpiler`] produces must still be an ES module: import and
//! export statements pass through untouched and no CommonJS interop is ever
//! introduced.

use std::fmt::Display;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Result, bail};
use oxc::allocator::Allocator;
use oxc::codegen::Codegen;
use oxc::parser::Parser;
use oxc::semantic::SemanticBuilder;
use oxc::span::SourceType;
use oxc::transformer::{TransformOptions, Transformer};
use regex::Regex;

use crate::core::language::language_for_path;

pub trait Transpiler: Send + Sync {
    /// Turn `source` (the contents of `path`) into browser-executable module code.
    fn transpile(&self, path: &str, source: &str) -> Result<String>;
}

static REQUIRE_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)(?:^|[^.\w$])require\s*\(\s*['"`]"#).expect("valid require regex")
});
static MODULE_EXPORTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(?:^|[^.\w$])(?:module\.exports|exports\.[A-Za-z_$][\w$]*)\s*=")
        .expect("valid exports regex")
});

/// JSX and TypeScript compiler that keeps module syntax intact.
///
/// JSX compiles against the automatic React runtime, so output imports
/// `react/jsx-runtime`; type annotations and type-only imports are erased.
/// CommonJS input is rejected and the output is tagged with a `sourceURL` so
/// runtime errors name the project path.
#[derive(Default)]
pub struct EsmTranspiler {
    options: TransformOptions,
}

impl EsmTranspiler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transpiler for EsmTranspiler {
    fn transpile(&self, path: &str, source: &str) -> Result<String> {
        let code = strip_comments(source);
        if REQUIRE_CALL.is_match(&code) {
            bail!("require() is CommonJS; use `import` instead");
        }
        if MODULE_EXPORTS.is_match(&code) {
            bail!("module.exports is CommonJS; use `export` instead");
        }

        let allocator = Allocator::default();
        let parsed = Parser::new(&allocator, source, source_type_for(path)).parse();
        if parsed.panicked || !parsed.errors.is_empty() {
            bail!("syntax error: {}", join_diagnostics(&parsed.errors));
        }
        let mut program = parsed.program;

        let semantic = SemanticBuilder::new().build(&program);
        if !semantic.errors.is_empty() {
            bail!("syntax error: {}", join_diagnostics(&semantic.errors));
        }
        let scoping = semantic.semantic.into_scoping();

        let transformed = Transformer::new(&allocator, Path::new(path), &self.options)
            .build_with_scoping(scoping, &mut program);
        if !transformed.errors.is_empty() {
            bail!("transform failed: {}", join_diagnostics(&transformed.errors));
        }

        let mut out = Codegen::new().build(&program).code;
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("//# sourceURL=");
        out.push_str(path);
        out.push('\n');
        Ok(out)
    }
}

fn source_type_for(path: &str) -> SourceType {
    match language_for_path(path) {
        "ts" => SourceType::ts(),
        "tsx" => SourceType::tsx(),
        _ => SourceType::jsx(),
    }
}

fn join_diagnostics<D: Display>(diagnostics: &[D]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Drop comments and the contents of string literals (quotes are kept) so
/// commented-out or quoted CommonJS is not mistaken for live code.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut quote: Option<char> = None;
    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            if c == '\\' {
                chars.next();
            } else if c == q {
                out.push(c);
                quote = None;
            }
            continue;
        }
        match (c, chars.peek()) {
            ('/', Some('/')) => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    prev = skipped;
                }
            }
            ('"' | '\'' | '`', _) => {
                quote = Some(c);
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transpile(path: &str, source: &str) -> Result<String> {
        EsmTranspiler::new().transpile(path, source)
    }

    #[test]
    fn module_syntax_is_preserved() {
        let source = "import React from 'react';\nimport { Button } from './Button';\nexport default function App() {}\n";
        let out = transpile("src/App.js", source).expect("transpile");
        assert!(out.contains("from \"react\""));
        assert!(out.contains("from \"./Button\""));
        assert!(out.contains("export default function App()"));
        assert!(out.ends_with("//# sourceURL=src/App.js\n"));
        assert!(!out.contains("require"));
    }

    #[test]
    fn jsx_compiles_to_runtime_calls() {
        let source = "export default function App() {\n  return <button className=\"x\">Hi</button>;\n}\n";
        let out = transpile("src/App.jsx", source).expect("transpile");
        assert!(!out.contains("<button"));
        assert!(out.contains("react/jsx-runtime"));
        assert!(out.contains("export default function App()"));
    }

    #[test]
    fn jsx_in_plain_js_files_compiles() {
        let source = "import { createRoot } from 'react-dom/client';\nimport App from './App';\ncreateRoot(document.getElementById('root')).render(<App />);\n";
        let out = transpile("src/index.js", source).expect("transpile");
        assert!(!out.contains("<App"));
        assert!(out.contains("from \"react-dom/client\""));
    }

    #[test]
    fn typescript_annotations_are_erased() {
        let source = "import type { Props } from './types';\nexport type Id = string;\ninterface Point { x: number }\nexport const double = (n: number): number => n * 2;\n";
        let out = transpile("src/math.ts", source).expect("transpile");
        assert!(!out.contains("import type"));
        assert!(!out.contains("export type"));
        assert!(!out.contains("interface"));
        assert!(!out.contains(": number"));
        assert!(out.contains("export const double"));
    }

    #[test]
    fn tsx_compiles_both_layers() {
        let source = "type P = { label: string };\nexport function Tag({ label }: P) {\n  return <span>{label}</span>;\n}\n";
        let out = transpile("src/Tag.tsx", source).expect("transpile");
        assert!(!out.contains("<span"));
        assert!(!out.contains(": P"));
        assert!(out.contains("export function Tag"));
    }

    #[test]
    fn syntax_errors_are_reported() {
        let err = transpile("src/bad.js", "export default function ( {\n").unwrap_err();
        assert!(err.to_string().starts_with("syntax error:"));
    }

    #[test]
    fn commonjs_is_rejected() {
        let err = transpile("src/a.js", "const React = require('react');\n").unwrap_err();
        assert!(err.to_string().contains("CommonJS"));

        let err = transpile("src/b.js", "function f() {}\nmodule.exports = f;\n").unwrap_err();
        assert!(err.to_string().contains("module.exports"));
    }

    #[test]
    fn commented_or_quoted_require_is_fine() {
        let source = "// const x = require('x');\n/* module.exports = 1; */\nconst s = \"require('y')\";\nexport default s;\n";
        transpile("src/c.js", source).expect("transpile");
    }
}
