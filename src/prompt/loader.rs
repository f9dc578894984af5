//! Prompt Loader - resolve stage templates from an override directory
//!
//! A template directory may hold `<stage>.md` files (`decompose.md`,
//! `plan.md`, `apply.md`, `evaluate.md`). Any stage without a file falls back
//! to its built-in template. Loaded templates are cached.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::domain::StageName;
use crate::error::{RefinrError, Result};

use super::templates;

/// Loads and caches stage templates
pub struct PromptLoader {
    /// Directory containing override templates, if any
    templates_dir: Option<PathBuf>,
    /// In-memory cache of resolved templates
    cache: RwLock<HashMap<StageName, String>>,
}

impl Default for PromptLoader {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptLoader {
    /// A loader that only serves the built-in templates
    pub fn builtin() -> Self {
        Self {
            templates_dir: None,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// A loader that prefers templates from the given directory
    pub fn new(templates_dir: impl AsRef<Path>) -> Self {
        Self {
            templates_dir: Some(templates_dir.as_ref().to_path_buf()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the template for a stage
    pub fn load(&self, stage: StageName) -> Result<String> {
        {
            let cache = self
                .cache
                .read()
                .map_err(|e| RefinrError::Template(format!("Failed to acquire read lock: {}", e)))?;
            if let Some(content) = cache.get(&stage) {
                return Ok(content.clone());
            }
        }

        let content = match self.override_path(stage) {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    RefinrError::Io(std::io::Error::new(
                        e.kind(),
                        format!("Failed to load template '{}' from {:?}: {}", stage, path, e),
                    ))
                })?;
                log::debug!("Loaded {} template from {}", stage, path.display());
                content
            }
            _ => templates::builtin(stage).to_string(),
        };

        {
            let mut cache = self.cache.write().map_err(|e| {
                RefinrError::Template(format!("Failed to acquire write lock: {}", e))
            })?;
            cache.insert(stage, content.clone());
        }

        Ok(content)
    }

    /// Whether the stage's template comes from the override directory
    pub fn is_overridden(&self, stage: StageName) -> bool {
        self.override_path(stage).is_some_and(|p| p.exists())
    }

    /// Get the templates directory path
    pub fn templates_dir(&self) -> Option<&Path> {
        self.templates_dir.as_deref()
    }

    fn override_path(&self, stage: StageName) -> Option<PathBuf> {
        self.templates_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.md", stage)))
    }
}
