//! Prompt System - stage templates, loading and rendering
//!
//! This module provides the built-in templates for the four stages, a loader
//! that lets a directory override them, and a Handlebars renderer.

mod loader;
mod render;
pub mod templates;

pub use loader::PromptLoader;
pub use render::PromptRenderer;
