//! Prompt Renderer - Render stage templates with context variables using Handlebars
//!
//! Templates are registered under their stage name and rendered with any
//! serializable context.

use handlebars::Handlebars;
use serde::Serialize;

use crate::domain::StageName;
use crate::error::{RefinrError, Result};

use super::loader::PromptLoader;

const STAGES: [StageName; 4] = [
    StageName::Decompose,
    StageName::Plan,
    StageName::Apply,
    StageName::Evaluate,
];

/// Renders prompt templates using Handlebars templating
pub struct PromptRenderer {
    handlebars: Handlebars<'static>,
}

impl Default for PromptRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptRenderer {
    /// Create a new PromptRenderer with no templates registered
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        // Missing variables render as empty strings
        handlebars.set_strict_mode(false);
        // Artifacts are plain text, never HTML
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }

    /// Create a renderer with every stage template resolved through `loader`
    pub fn from_loader(loader: &PromptLoader) -> Result<Self> {
        let mut renderer = Self::new();
        for stage in STAGES {
            let template = loader.load(stage)?;
            renderer.register_template(stage.as_str(), &template)?;
        }
        Ok(renderer)
    }

    /// Create a renderer with the built-in stage templates
    pub fn builtin() -> Result<Self> {
        Self::from_loader(&PromptLoader::builtin())
    }

    /// Render a template string with any serializable context
    pub fn render_with<T: Serialize>(&self, template: &str, context: &T) -> Result<String> {
        self.handlebars
            .render_template(template, context)
            .map_err(|e| RefinrError::Template(format!("Failed to render template: {}", e)))
    }

    /// Register a named template for later use
    pub fn register_template(&mut self, name: &str, template: &str) -> Result<()> {
        self.handlebars
            .register_template_string(name, template)
            .map_err(|e| {
                RefinrError::Template(format!("Failed to register template '{}': {}", name, e))
            })
    }

    /// Render the template registered for a stage
    pub fn render_stage<T: Serialize>(&self, stage: StageName, context: &T) -> Result<String> {
        self.handlebars
            .render(stage.as_str(), context)
            .map_err(|e| {
                RefinrError::Template(format!("Failed to render {} template: {}", stage, e))
            })
    }

    /// Check if a named template is registered
    pub fn has_template(&self, name: &str) -> bool {
        self.handlebars.get_template(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_renderer_is_empty() {
        let renderer = PromptRenderer::new();
        assert!(!renderer.has_template("plan"));
    }

    #[test]
    fn test_builtin_registers_all_stages() {
        let renderer = PromptRenderer::builtin().unwrap();
        for stage in STAGES {
            assert!(renderer.has_template(stage.as_str()), "{}", stage);
        }
    }

    #[test]
    fn test_render_missing_variable_empty_string() {
        let renderer = PromptRenderer::new();
        let result = renderer.render_with("Hello, {{name}}!", &json!({})).unwrap();
        assert_eq!(result, "Hello, !");
    }

    #[test]
    fn test_render_no_escape_html() {
        let renderer = PromptRenderer::new();
        let result = renderer
            .render_with(
                "Artifact: {{artifact}}",
                &json!({ "artifact": "<b>bold</b> & \"quoted\"" }),
            )
            .unwrap();
        assert_eq!(result, "Artifact: <b>bold</b> & \"quoted\"");
    }

    #[test]
    fn test_render_each_list() {
        let renderer = PromptRenderer::new();
        let result = renderer
            .render_with("{{#each items}}[{{this}}]{{/each}}", &json!({ "items": ["a", "b"] }))
            .unwrap();
        assert_eq!(result, "[a][b]");
    }

    #[test]
    fn test_render_stage_unregistered() {
        let renderer = PromptRenderer::new();
        assert!(renderer.render_stage(StageName::Apply, &json!({})).is_err());
    }

    #[test]
    fn test_register_invalid_template() {
        let mut renderer = PromptRenderer::new();
        let result = renderer.register_template("broken", "{{#if x}}never closed");
        assert!(matches!(result, Err(RefinrError::Template(_))));
    }

    #[test]
    fn test_render_plan_with_feedback_foregrounds_it() {
        let renderer = PromptRenderer::builtin().unwrap();
        let rendered = renderer
            .render_stage(
                StageName::Plan,
                &json!({
                    "artifact": "Write an analysis.",
                    "criteria": ["Name the company"],
                    "feedback": "Cash flow statement is missing",
                    "has_feedback": true,
                    "format_instructions": "JSON please",
                }),
            )
            .unwrap();

        let feedback_at = rendered.find("Cash flow statement is missing").unwrap();
        let artifact_at = rendered.find("Write an analysis.").unwrap();
        assert!(feedback_at < artifact_at);
        assert!(rendered.contains("address this first"));
        assert!(rendered.contains("- Name the company"));
    }
}
