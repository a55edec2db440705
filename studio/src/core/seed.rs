//! The starter project every new studio session opens with.

use crate::core::types::ProjectFileSet;

pub const STARTER_FOCUS: &str = "src/App.js";

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <script src="https://cdn.tailwindcss.com"></script>
</head>
<body class="bg-slate-950 text-white font-sans">
  <div id="root"></div>
  <script type="module" src="./index.js"></script>
</body>
</html>
"#;

const INDEX_JS: &str = r#"import React from 'react';
import { createRoot } from 'react-dom/client';
import App from './App.js';

const root = createRoot(document.getElementById('root'));
root.render(<App />);
"#;

const APP_JS: &str = r#"import React, { useState } from 'react';

export default function App() {
  const [count, setCount] = useState(0);

  return (
    <main className="min-h-screen flex flex-col items-center justify-center gap-6">
      <h1 className="text-3xl font-bold">Studio is ready</h1>
      <button
        className="px-6 py-3 rounded-xl bg-blue-600 hover:bg-blue-500"
        onClick={() => setCount((c) => c + 1)}
      >
        Clicked {count} times
      </button>
    </main>
  );
}
"#;

pub fn starter_project() -> ProjectFileSet {
    [
        ("src/index.html", INDEX_HTML),
        ("src/index.js", INDEX_JS),
        ("src/App.js", APP_JS),
    ]
    .into_iter()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starter_project_has_entry_and_focus() {
        let files = starter_project();
        assert_eq!(files.len(), 3);
        assert!(files.contains("src/index.html"));
        assert!(files.contains(STARTER_FOCUS));
        assert_eq!(files.get("src/index.js").expect("file").language, "js");
    }
}
