//! Recovery of structured data from free-form model output.
//!
//! Models asked for "ONLY JSON" still wrap objects in prose, markdown fences,
//! or both. [`extract_json`] is a pure scan over the known input shapes
//! (raw / fenced-tagged / fenced-untagged / noise-surrounded / unrecoverable)
//! and [`repair_cycle`] drives the bounded one-shot repair conversation when
//! the extracted candidate still fails to parse.

use model_gateway::{ChatBackend, ChatMessage};
use serde::de::DeserializeOwned;

use crate::error::{ForgeError, Result};

// ---------------------------------------------------------------------------
// extract_json
// ---------------------------------------------------------------------------

/// Extract the JSON-object candidate from a model response.
///
/// Handles raw objects, fenced blocks (with or without a `json` language
/// tag), and objects surrounded by prose. Unrecoverable input is returned
/// unchanged so the caller's parse fails with the real payload in hand.
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();

    // Case 1: already a complete object.
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return trimmed;
    }

    // Case 2: inside ```json ... ``` or ``` ... ``` fences.
    if trimmed.contains("```") {
        for part in trimmed.split("```") {
            let mut candidate = part.trim();
            if candidate
                .get(..4)
                .is_some_and(|tag| tag.eq_ignore_ascii_case("json"))
            {
                candidate = candidate[4..].trim_start();
            }
            if let Some(span) = object_span(candidate) {
                return span;
            }
        }
    }

    // Case 3: no fences, but an object lives somewhere in the text.
    if let Some(span) = object_span(trimmed) {
        return span;
    }

    // Fallback: hand back the original and let the parser complain.
    trimmed
}

/// The substring from the first `{` to the last `}`, when correctly ordered.
fn object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

// ---------------------------------------------------------------------------
// strip_code_fences
// ---------------------------------------------------------------------------

/// Return the body of the first fenced block, dropping a leading language
/// tag line. Text without fences (or with a lone stray fence) is returned
/// as-is.
pub fn strip_code_fences(text: &str) -> &str {
    if !text.contains("```") {
        return text;
    }

    let parts: Vec<&str> = text.split("```").collect();
    if parts.len() < 3 {
        return text;
    }

    let block = parts[1];
    if let Some((first_line, rest)) = block.split_once('\n') {
        if is_language_tag(first_line.trim()) {
            return rest;
        }
    }
    block
}

/// A fence info string like `python`, `json`, or `py3` — one short token of
/// identifier-ish characters.
fn is_language_tag(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 16
        && s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '_' | '.'))
}

// ---------------------------------------------------------------------------
// repair_cycle
// ---------------------------------------------------------------------------

/// Call the model for a JSON object and parse it, with exactly one repair
/// round on failure.
///
/// The repair prompt embeds the invalid payload and the parser diagnostic
/// alongside `schema_hint`. If the second attempt also fails the error
/// carries both — a default value is never substituted.
pub async fn repair_cycle<T: DeserializeOwned>(
    backend: &dyn ChatBackend,
    system_role: &str,
    prompt: &str,
    schema_hint: &str,
) -> Result<T> {
    let raw = backend
        .chat(&[
            ChatMessage::system(system_role),
            ChatMessage::user(prompt),
        ])
        .await?;
    let candidate = extract_json(&raw).to_string();

    let first_err = match serde_json::from_str::<T>(&candidate) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    tracing::warn!(error = %first_err, "model returned invalid JSON, attempting repair");

    let repair_prompt = format!(
        "You previously tried to return a JSON object, but it was invalid JSON.\n\
         Here is what you returned:\n\
         ----- INVALID JSON START -----\n\
         {candidate}\n\
         ----- INVALID JSON END -----\n\n\
         The JSON decoder error was:\n{first_err}\n\n\
         Please return a CORRECTED JSON object that strictly follows the schema:\n\
         {schema_hint}\n\n\
         Respond with ONLY valid JSON. No markdown, no comments, no extra keys, no extra text."
    );

    let raw = backend
        .chat(&[
            ChatMessage::system(system_role),
            ChatMessage::user(repair_prompt),
        ])
        .await?;
    let candidate = extract_json(&raw).to_string();

    serde_json::from_str::<T>(&candidate).map_err(|source| ForgeError::Protocol {
        invalid: candidate,
        source,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use model_gateway::scripted::ScriptedBackend;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Probe {
        key: String,
    }

    // One test per input-shape row.

    #[test]
    fn extract_raw_object() {
        assert_eq!(extract_json(r#"{"key": "v"}"#), r#"{"key": "v"}"#);
    }

    #[test]
    fn extract_raw_object_with_surrounding_whitespace() {
        assert_eq!(extract_json("\n  {\"key\": \"v\"}  \n"), "{\"key\": \"v\"}");
    }

    #[test]
    fn extract_fenced_with_language_tag() {
        let text = "Here you go:\n```json\n{\"key\": \"v\"}\n```\nEnjoy!";
        assert_eq!(extract_json(text), "{\"key\": \"v\"}");
    }

    #[test]
    fn extract_fenced_without_language_tag() {
        let text = "```\n{\"key\": \"v\"}\n```";
        assert_eq!(extract_json(text), "{\"key\": \"v\"}");
    }

    #[test]
    fn extract_noise_surrounded_object() {
        let text = "Sure! The plan is {\"key\": \"v\"} — hope that helps.";
        assert_eq!(extract_json(text), "{\"key\": \"v\"}");
    }

    #[test]
    fn extract_unrecoverable_returns_input() {
        assert_eq!(extract_json("no braces here"), "no braces here");
    }

    #[test]
    fn extract_parses_identically_across_forms() {
        let forms = [
            r#"{"key": "v"}"#.to_string(),
            "```json\n{\"key\": \"v\"}\n```".to_string(),
            "```\n{\"key\": \"v\"}\n```".to_string(),
            "prose before {\"key\": \"v\"} prose after".to_string(),
        ];
        for form in &forms {
            let parsed: Probe = serde_json::from_str(extract_json(form)).unwrap();
            assert_eq!(parsed, Probe { key: "v".into() }, "form: {form}");
        }
    }

    #[test]
    fn strip_fences_plain_text_unchanged() {
        assert_eq!(strip_code_fences("print('hi')"), "print('hi')");
    }

    #[test]
    fn strip_fences_drops_language_tag() {
        let text = "```python\nprint('hi')\n```";
        assert_eq!(strip_code_fences(text), "print('hi')\n");
    }

    #[test]
    fn strip_fences_keeps_first_code_line_without_tag() {
        let text = "```\nx = 1\ny = 2\n```";
        assert_eq!(strip_code_fences(text).trim(), "x = 1\ny = 2");
    }

    #[test]
    fn strip_fences_lone_fence_is_left_alone() {
        let text = "broken ``` output";
        assert_eq!(strip_code_fences(text), text);
    }

    #[tokio::test]
    async fn repair_cycle_accepts_first_valid_response() {
        let backend = ScriptedBackend::new([r#"{"key": "direct"}"#]);
        let probe: Probe = repair_cycle(&backend, "planner role", "plan it", "{schema}")
            .await
            .unwrap();
        assert_eq!(probe.key, "direct");
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn repair_cycle_recovers_after_one_repair() {
        let backend = ScriptedBackend::new([
            "this is not json",
            r#"{"key": "repaired"}"#,
        ]);
        let probe: Probe = repair_cycle(&backend, "planner role", "plan it", "{schema}")
            .await
            .unwrap();
        assert_eq!(probe.key, "repaired");
        assert_eq!(backend.call_count(), 2);

        let repair_prompt = backend.user_prompt(1);
        assert!(repair_prompt.contains("INVALID JSON START"));
        assert!(repair_prompt.contains("this is not json"));
    }

    #[tokio::test]
    async fn repair_cycle_fails_after_second_bad_response() {
        let backend = ScriptedBackend::new(["still not json", "also { not json"]);
        let err = repair_cycle::<Probe>(&backend, "planner role", "plan it", "{schema}")
            .await
            .unwrap_err();
        assert_eq!(backend.call_count(), 2);
        match err {
            ForgeError::Protocol { invalid, .. } => {
                assert!(invalid.contains("also"), "invalid payload: {invalid}");
            }
            other => panic!("expected Protocol error, got {other}"),
        }
    }
}
