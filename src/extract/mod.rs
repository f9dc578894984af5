//! Structured extraction of generated text into typed shapes.
//!
//! `extract` is a pure validating parser: it locates a JSON object in the raw
//! text, deserializes it into the requested [`Shape`] and runs the shape's
//! range and emptiness checks. It never retries or repairs; that policy
//! belongs to the caller.

mod shapes;

pub use shapes::{DecomposedGoal, EvaluationReport, RevisedArtifact, RevisionPlan};

use serde::de::{DeserializeOwned, IgnoredAny};
use thiserror::Error;

/// Extraction failures. All of them are the malformed-output kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("no JSON object found in generated text")]
    NoJson,

    #[error("{shape} could not be parsed: {message}")]
    Invalid { shape: &'static str, message: String },

    #[error("{shape} violates a constraint: {message}")]
    Constraint { shape: &'static str, message: String },
}

impl ExtractError {
    pub fn constraint(shape: &'static str, message: impl Into<String>) -> Self {
        ExtractError::Constraint {
            shape,
            message: message.into(),
        }
    }
}

/// Description of one field of a shape, used for format instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: &'static str,
    pub description: &'static str,
    pub required: bool,
}

/// A fixed set of named, typed fields that generated text must parse into
pub trait Shape: DeserializeOwned {
    /// Name used in errors and instructions
    const NAME: &'static str;

    /// Fields in the order they should be described to the model
    fn fields() -> &'static [FieldSpec];

    /// Range and emptiness checks beyond what deserialization enforces
    fn validate(&self) -> Result<(), ExtractError> {
        Ok(())
    }
}

/// Parse `raw` into shape `S`
pub fn extract<S: Shape>(raw: &str) -> Result<S, ExtractError> {
    let json = locate_json(raw).ok_or(ExtractError::NoJson)?;
    let value: S = serde_json::from_str(json).map_err(|e| ExtractError::Invalid {
        shape: S::NAME,
        message: e.to_string(),
    })?;
    value.validate()?;
    Ok(value)
}

/// Instructions telling the model which JSON object to emit for shape `S`
pub fn format_instructions<S: Shape>() -> String {
    let mut out = String::from(
        "Respond with a single JSON object and nothing else. It must have these fields:\n",
    );
    for field in S::fields() {
        out.push_str(&format!(
            "- \"{}\" ({}{}): {}\n",
            field.name,
            field.kind,
            if field.required { ", required" } else { ", optional" },
            field.description
        ));
    }
    out
}

/// Find the JSON object in generated text.
///
/// Accepts a bare object, an object inside a fenced code block, or an object
/// surrounded by prose. The first complete object wins; anything after it,
/// braces included, is ignored.
fn locate_json(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if let Some(object) = object_at(trimmed) {
        return Some(object);
    }

    if let Some(object) = fenced_block(trimmed).and_then(|block| first_object(block.trim())) {
        return Some(object);
    }

    first_object(trimmed)
}

/// The complete JSON object starting at the first byte of `text`
fn object_at(text: &str) -> Option<&str> {
    if !text.starts_with('{') {
        return None;
    }
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<IgnoredAny>();
    match stream.next() {
        Some(Ok(_)) => Some(&text[..stream.byte_offset()]),
        _ => None,
    }
}

/// The first `{` in `text` that opens a complete JSON object
fn first_object(text: &str) -> Option<&str> {
    text.match_indices('{').find_map(|(start, _)| object_at(&text[start..]))
}

/// Body of the first fenced code block, skipping an optional language tag
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let close = body.find("```")?;
    Some(&body[..close])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_bare_object() {
        assert_eq!(locate_json("  {\"a\": 1}\n"), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_locate_fenced_object() {
        let raw = "Here you go:\n```json\n{\"a\": 1}\n```\nDone.";
        assert_eq!(locate_json(raw), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_locate_untagged_fence() {
        let raw = "```\n{\"a\": [1, 2]}\n```";
        assert_eq!(locate_json(raw), Some("{\"a\": [1, 2]}"));
    }

    #[test]
    fn test_locate_object_in_prose() {
        let raw = "Sure! {\"a\": {\"b\": 2}} Hope that helps.";
        assert_eq!(locate_json(raw), Some("{\"a\": {\"b\": 2}}"));
    }

    #[test]
    fn test_locate_ignores_braces_after_object() {
        let raw = r#"{"plan": ["a"]} Note: fill {name} in later"#;
        assert_eq!(locate_json(raw), Some(r#"{"plan": ["a"]}"#));

        let plan = extract::<RevisionPlan>(raw).unwrap();
        assert_eq!(plan.plan, vec!["a".to_string()]);
    }

    #[test]
    fn test_locate_skips_stray_brace_before_object() {
        let raw = "Use {name} placeholders:\n{\"a\": \"}\"}\nThanks {you}";
        assert_eq!(locate_json(raw), Some("{\"a\": \"}\"}"));
    }

    #[test]
    fn test_locate_nothing() {
        assert_eq!(locate_json("I cannot help with that."), None);
        assert_eq!(locate_json("} backwards {"), None);
        assert_eq!(locate_json(""), None);
    }

    #[test]
    fn test_extract_no_json() {
        let result = extract::<DecomposedGoal>("just prose");
        assert_eq!(result.unwrap_err(), ExtractError::NoJson);
    }

    #[test]
    fn test_extract_missing_required_field() {
        let result = extract::<DecomposedGoal>(r#"{"items": ["a"]}"#);
        assert!(matches!(result, Err(ExtractError::Invalid { shape: "DecomposedGoal", .. })));
    }

    #[test]
    fn test_extract_wrong_type() {
        let result = extract::<RevisionPlan>(r#"{"plan": "do everything"}"#);
        assert!(matches!(result, Err(ExtractError::Invalid { .. })));
    }

    #[test]
    fn test_extract_is_idempotent() {
        let inputs = [
            r#"{"score": 7, "rationale": "close"}"#,
            r#"{"score": 11, "rationale": "too high"}"#,
            "no json here",
            concat!(
                "```json\n",
                "{\"score\": 9, \"rationale\": \"great\", \"is_improvement_sufficient\": true}\n",
                "```"
            ),
        ];
        for raw in inputs {
            let first = extract::<EvaluationReport>(raw);
            let second = extract::<EvaluationReport>(raw);
            assert_eq!(first, second, "input {:?}", raw);
        }
    }

    #[test]
    fn test_format_instructions_lists_fields() {
        let text = format_instructions::<EvaluationReport>();
        assert!(text.contains("\"score\" (integer, required)"));
        assert!(text.contains("\"rationale\""));
        assert!(text.contains("\"is_improvement_sufficient\" (boolean, optional)"));
    }
}
