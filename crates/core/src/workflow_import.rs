//! Exported workflow import.
//!
//! A workflow saved from the engine in API format is already a
//! [`JobGraph`] on the wire. Its text fields may carry `{KEY}` placeholders
//! (e.g. `"text": "{PROMPT}, cinematic"`) that are filled in before the
//! graph is parsed.

use std::collections::BTreeMap;

use crate::error::CoreError;
use crate::graph::JobGraph;

/// Placeholder filled by the prompt text.
pub const PROMPT_KEY: &str = "PROMPT";

/// Placeholder key to replacement text.
pub type Replacements = BTreeMap<String, String>;

/// Replace every `{KEY}` in `text` with its value.
///
/// Values are JSON-string escaped, so quotes or newlines in a prompt keep
/// the document well formed. Placeholders without a replacement are left
/// as they are.
pub fn fill_placeholders(text: &str, replacements: &Replacements) -> String {
    let mut filled = text.to_string();
    for (key, value) in replacements {
        let quoted = serde_json::Value::String(value.clone()).to_string();
        let escaped = &quoted[1..quoted.len() - 1];
        filled = filled.replace(&format!("{{{key}}}"), escaped);
    }
    filled
}

/// Fill placeholders in an exported workflow and parse it as a graph.
///
/// The graph is not validated here; submission does that.
pub fn import_workflow(text: &str, replacements: &Replacements) -> Result<JobGraph, CoreError> {
    let filled = fill_placeholders(text, replacements);
    serde_json::from_str(&filled).map_err(|e| CoreError::InvalidWorkflow(e.to_string()))
}

#[cfg(test)]
mod tests {
    use crate::graph::InputValue;

    use super::*;

    const WORKFLOW: &str = r#"{
        "4": {"class_type": "CheckpointLoaderSimple", "inputs": {"ckpt_name": "sdxl.safetensors"}},
        "6": {"class_type": "CLIPTextEncode", "inputs": {"text": "{PROMPT}, golden hour", "clip": ["4", 1]},
              "_meta": {"title": "Positive"}}
    }"#;

    fn prompt(text: &str) -> Replacements {
        Replacements::from([(PROMPT_KEY.to_string(), text.to_string())])
    }

    #[test]
    fn fills_prompt_placeholder() {
        let graph = import_workflow(WORKFLOW, &prompt("a red fox")).unwrap();
        assert_eq!(
            graph.get("6").unwrap().inputs["text"],
            InputValue::Literal("a red fox, golden hour".into())
        );
        assert_eq!(graph.validate(), Ok(()));
    }

    #[test]
    fn quotes_in_values_are_escaped() {
        let graph = import_workflow(WORKFLOW, &prompt("a \"quoted\"\nfox")).unwrap();
        assert_eq!(
            graph.get("6").unwrap().inputs["text"],
            InputValue::Literal("a \"quoted\"\nfox, golden hour".into())
        );
    }

    #[test]
    fn unknown_placeholders_are_kept() {
        let filled = fill_placeholders(r#"{"text": "{STYLE} {PROMPT}"}"#, &prompt("x"));
        assert_eq!(filled, r#"{"text": "{STYLE} x"}"#);

        let untouched = import_workflow(WORKFLOW, &Replacements::new()).unwrap();
        assert_eq!(
            untouched.get("6").unwrap().inputs["text"],
            InputValue::Literal("{PROMPT}, golden hour".into())
        );
    }

    #[test]
    fn non_graph_document_is_rejected() {
        let err = import_workflow(r#"{"last_node_id": 9, "nodes": []}"#, &Replacements::new()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidWorkflow(_)));
    }
}
