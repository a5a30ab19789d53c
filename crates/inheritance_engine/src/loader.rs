//! JSON ingestion and persistence of template records.
//!
//! Templates travel as JSON documents using the `$cond`/`$eval`/`$custom`
//! aliases (see [`crate::template`]). This module converts between those
//! documents and [`Template`] records; it performs no validation beyond
//! structural deserialization.

use std::fs;
use std::path::Path;

use crate::errors::{EngineError, EngineResult};
use crate::template::Template;

/// Parses a template from a JSON string.
pub fn template_from_json(raw: &str) -> EngineResult<Template> {
    serde_json::from_str(raw).map_err(|error| EngineError::Parse {
        reason: error.to_string(),
    })
}

/// Serializes a template to pretty-printed JSON.
pub fn template_to_json(template: &Template) -> EngineResult<String> {
    serde_json::to_string_pretty(template).map_err(|error| EngineError::Parse {
        reason: error.to_string(),
    })
}

/// Loads a template from a JSON file.
pub fn load_template(path: &Path) -> EngineResult<Template> {
    let raw = fs::read_to_string(path).map_err(|error| EngineError::Parse {
        reason: format!("failed to read '{}': {error}", path.display()),
    })?;
    template_from_json(&raw)
}

/// Writes a template to a JSON file.
pub fn save_template(template: &Template, path: &Path) -> EngineResult<()> {
    let rendered = template_to_json(template)?;
    fs::write(path, rendered).map_err(|error| EngineError::Parse {
        reason: format!("failed to write '{}': {error}", path.display()),
    })
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
