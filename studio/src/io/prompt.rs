//! Prompt rendering for backend rounds.

use anyhow::Result;
use minijinja::{Environment, context};

use crate::core::types::{HistoryLine, ProjectFileSet};

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");
const ROUND_TEMPLATE: &str = include_str!("prompts/round.md");

/// Everything a single round prompt is built from.
#[derive(Debug, Clone, Copy)]
pub struct RoundInputs<'a> {
    pub task: &'a str,
    pub files: &'a ProjectFileSet,
    pub history: &'a [HistoryLine],
    pub review_phase: bool,
}

/// A rendered system instruction plus round prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub prompt: String,
}

/// Renders the behaviour contract and per-round prompt.
pub struct PromptBuilder {
    env: Environment<'static>,
    history_lines: usize,
}

impl PromptBuilder {
    /// `history_lines` caps how many trailing history entries reach the prompt text.
    pub fn new(history_lines: usize) -> Self {
        let mut env = Environment::new();
        env.add_template("system", SYSTEM_TEMPLATE)
            .expect("system template should be valid");
        env.add_template("round", ROUND_TEMPLATE)
            .expect("round template should be valid");
        Self { env, history_lines }
    }

    pub fn render(&self, input: &RoundInputs<'_>) -> Result<RenderedPrompt> {
        let system = self.env.get_template("system")?.render(context! {})?;
        let start = input.history.len().saturating_sub(self.history_lines);
        let files: Vec<_> = input.files.iter().collect();
        let prompt = self.env.get_template("round")?.render(context! {
            task => input.task.trim(),
            review => input.review_phase,
            files => files,
            history => &input.history[start..],
        })?;
        Ok(RenderedPrompt {
            system: system.trim().to_string(),
            prompt: prompt.trim().to_string(),
        })
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::seed::starter_project;
    use crate::core::types::Role;

    fn history(n: usize) -> Vec<HistoryLine> {
        (0..n)
            .map(|i| HistoryLine {
                role: if i % 2 == 0 { Role::User } else { Role::Assistant },
                content: format!("line {i}"),
            })
            .collect()
    }

    #[test]
    fn task_prompt_embeds_files_and_recent_history() {
        let files = starter_project();
        let history = history(5);
        let rendered = PromptBuilder::new(3)
            .render(&RoundInputs {
                task: "add a reset button",
                files: &files,
                history: &history,
                review_phase: false,
            })
            .expect("render");

        assert!(rendered.system.contains("Surgical edits"));
        assert!(rendered.system.contains("\"finishReason\""));
        assert!(rendered.prompt.starts_with("Task: add a reset button"));
        assert!(rendered.prompt.contains("TASK: add a reset button."));
        assert!(!rendered.prompt.contains("STABILITY CHECK"));
        assert!(rendered.prompt.contains("File: src/App.js\n```js\n"));
        assert!(rendered.prompt.contains("File: src/index.html\n```html\n"));

        assert!(!rendered.prompt.contains("line 1"));
        assert!(rendered.prompt.contains("user: line 2"));
        assert!(rendered.prompt.contains("assistant: line 3"));
        assert!(rendered.prompt.contains("user: line 4"));
    }

    #[test]
    fn review_prompt_uses_stability_check() {
        let files = starter_project();
        let rendered = PromptBuilder::default()
            .render(&RoundInputs {
                task: "anything",
                files: &files,
                history: &[],
                review_phase: true,
            })
            .expect("render");

        assert!(rendered.prompt.contains("STABILITY CHECK"));
        assert!(!rendered.prompt.contains("TASK: anything"));
    }

    #[test]
    fn file_content_is_not_html_escaped() {
        let files: ProjectFileSet = [("src/index.html", "<div id=\"root\"></div>")]
            .into_iter()
            .collect();
        let rendered = PromptBuilder::default()
            .render(&RoundInputs {
                task: "t",
                files: &files,
                history: &[],
                review_phase: false,
            })
            .expect("render");
        assert!(rendered.prompt.contains("<div id=\"root\"></div>"));
    }
}
