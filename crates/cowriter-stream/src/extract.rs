//! Locates a JSON object inside generated text.
//!
//! Generated text is frequently wrapped in a markdown code fence and, while a
//! stream is in flight, truncated. Extraction is pure and cheap, so callers
//! run it on every token update; only the result for a `done` buffer is
//! authoritative.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static JSON_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)```json[ \t]*\r?\n?(.*?)```").expect("json fence pattern is valid")
});

static PLAIN_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[ \t]*\r?\n(.*?)```").expect("plain fence pattern is valid")
});

/// Result of one extraction attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum Extraction {
    /// A complete JSON object was found.
    Ready(Value),
    /// No parseable object yet. Expected while streaming.
    NotYetAvailable,
}

impl Extraction {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Ready(value) => Some(value),
            Self::NotYetAvailable => None,
        }
    }
}

/// Returns the text that extraction will try to parse, trimmed.
///
/// The first ```` ```json ```` block wins, even when other fences come before
/// it. Without one, the first untagged fence is used, then the whole text.
pub fn candidate(text: &str) -> &str {
    [&*JSON_FENCE, &*PLAIN_FENCE]
        .into_iter()
        .find_map(|fence| fence.captures(text).and_then(|caps| caps.get(1)))
        .map_or(text, |m| m.as_str())
        .trim()
}

/// Attempts to parse a JSON object out of `text`.
pub fn extract_json(text: &str) -> Extraction {
    match serde_json::from_str::<Value>(candidate(text)) {
        Ok(value) if value.is_object() => Extraction::Ready(value),
        _ => Extraction::NotYetAvailable,
    }
}

/// Pretty-printed object for optimistic display, when one is parseable.
pub fn preview(text: &str) -> Option<String> {
    extract_json(text)
        .into_value()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_from_fenced_block_with_surrounding_prose() {
        let text = "Here you go:\n```json\n{\"title\":\"X\",\"description\":\"Y\"}\n```\nEnjoy!";
        assert_eq!(
            extract_json(text),
            Extraction::Ready(json!({"title":"X","description":"Y"}))
        );
    }

    #[test]
    fn extracts_from_untagged_fence_and_bare_text() {
        assert!(extract_json("```\n{\"a\":1}\n```").is_ready());
        assert!(extract_json("  {\"a\":1}\n").is_ready());
        assert!(extract_json("```JSON {\"a\":1}```").is_ready());
    }

    #[test]
    fn json_tagged_fence_wins_over_earlier_plain_fences() {
        let text = "Example:\n```\nname: value\n```\nResult:\n```json\n{\"title\":\"X\"}\n```";
        assert_eq!(extract_json(text), Extraction::Ready(json!({"title":"X"})));

        let text = "```python\nprint(1)\n```\n```Json\n{\"a\":2}\n```";
        assert_eq!(candidate(text), "{\"a\":2}");
    }

    #[test]
    fn other_language_fences_are_not_untagged_fences() {
        assert_eq!(candidate("```python\nprint(1)\n```"), "```python\nprint(1)\n```");
        assert_eq!(
            extract_json("```yaml\na: 1\n```"),
            Extraction::NotYetAvailable
        );
    }

    #[test]
    fn truncated_or_prose_text_is_not_yet_available() {
        assert_eq!(
            extract_json("```json\n{\"title\":\"X\",\"descr"),
            Extraction::NotYetAvailable
        );
        assert_eq!(
            extract_json("Some preamble text without any JSON"),
            Extraction::NotYetAvailable
        );
        assert_eq!(extract_json(""), Extraction::NotYetAvailable);
    }

    #[test]
    fn non_object_json_is_not_a_badge_candidate() {
        assert_eq!(extract_json("[1,2]"), Extraction::NotYetAvailable);
        assert_eq!(extract_json("42"), Extraction::NotYetAvailable);
    }

    #[test]
    fn extraction_is_idempotent() {
        for text in [
            "```json\n{\"a\":1}\n```",
            "{\"a\":",
            "no json here",
        ] {
            assert_eq!(extract_json(text), extract_json(text));
        }
    }

    #[test]
    fn preview_pretty_prints_parseable_objects_only() {
        assert_eq!(preview("{\"a\":1}").as_deref(), Some("{\n  \"a\": 1\n}"));
        assert_eq!(preview("{\"a\":"), None);
    }
}
