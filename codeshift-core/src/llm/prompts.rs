//! Prompt templates
//!
//! Templates use `{{VARIABLE}}` placeholders. A template per task type can
//! be dropped into the configured prompts directory as `<task_type>.md`;
//! the embedded template is used otherwise.

use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

use crate::Result;

const DEFAULT_PROMPT: &str = include_str!("prompts/default.md");

/// Context for rendering a prompt template
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    variables: HashMap<String, String>,
}

impl PromptContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Set a variable value (builder pattern)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn with_task_type(self, task_type: impl Into<String>) -> Self {
        self.with("TASK_TYPE", task_type)
    }

    /// Empty instructions leave the placeholder unset
    pub fn with_instructions(self, instructions: &str) -> Self {
        if instructions.trim().is_empty() {
            self
        } else {
            self.with("EXTRA_INSTRUCTIONS", instructions)
        }
    }
}

/// Render a template string with variable substitution
pub fn render_template(template: &str, context: &PromptContext) -> String {
    let mut result = template.to_string();

    for (key, value) in &context.variables {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }

    // Unset {{UPPERCASE_NAME}} placeholders become "(not specified)"
    let mut search_from = 0;
    while let Some(start) = result[search_from..].find("{{").map(|i| i + search_from) {
        let Some(end) = result[start..].find("}}").map(|i| i + start) else {
            break;
        };
        let inside = &result[start + 2..end];
        if !inside.is_empty() && inside.chars().all(|c| c.is_ascii_uppercase() || c == '_') {
            result.replace_range(start..end + 2, "(not specified)");
            search_from = start;
        } else {
            search_from = end + 2;
        }
    }

    result
}

/// Source of system prompt templates
#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    dir: Option<PathBuf>,
}

impl PromptLibrary {
    /// Only the embedded template
    pub fn embedded() -> Self {
        Self { dir: None }
    }

    /// Templates from `dir`, falling back to the embedded one
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// Template text for a task type
    pub async fn template(&self, task_type: &str) -> Result<String> {
        if let Some(dir) = &self.dir {
            let path = dir.join(format!("{}.md", task_type));
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => {
                    debug!(path = %path.display(), "Loaded prompt template");
                    return Ok(text);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(DEFAULT_PROMPT.to_string())
    }

    /// Render the system prompt for a task
    pub async fn system_prompt(&self, task_type: &str, instructions: &str) -> Result<String> {
        let template = self.template(task_type).await?;
        let context = PromptContext::new()
            .with_task_type(task_type)
            .with_instructions(instructions);
        Ok(render_template(&template, &context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_render_with_variables() {
        let context = PromptContext::new()
            .with_task_type("refatoracao")
            .with_instructions("Keep public APIs");

        let rendered = render_template(DEFAULT_PROMPT, &context);
        assert!(rendered.contains("refatoracao"));
        assert!(rendered.contains("Keep public APIs"));
        assert!(!rendered.contains("{{"));
    }

    #[test]
    fn test_unset_placeholders() {
        let rendered = render_template("a {{MISSING}} b {{lower}} c", &PromptContext::new());
        assert_eq!(rendered, "a (not specified) b {{lower}} c");
    }

    #[test]
    fn test_blank_instructions_not_specified() {
        let context = PromptContext::new().with_instructions("   ");
        let rendered = render_template("{{EXTRA_INSTRUCTIONS}}", &context);
        assert_eq!(rendered, "(not specified)");
    }

    #[tokio::test]
    async fn test_library_prefers_directory_template() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("seguranca.md"), "Security: {{TASK_TYPE}}").unwrap();
        let library = PromptLibrary::from_dir(dir.path());

        let custom = library.system_prompt("seguranca", "").await.unwrap();
        assert_eq!(custom, "Security: seguranca");

        let fallback = library.system_prompt("other", "").await.unwrap();
        assert!(fallback.contains("other"));
    }
}
