//! Maps backend badge payloads onto [`BadgeSuggestion`].
//!
//! The backend schema changed several times. Each known schema is a
//! [`ShapeMatcher`]: a predicate plus a mapping, tried in priority order. Add
//! new schemas by appending a matcher.

use serde_json::Value;
use tracing::debug;

use crate::suggestion::{BadgeSuggestion, Skill, TokenMetrics};

/// One recognized payload schema.
pub struct ShapeMatcher {
    pub name: &'static str,
    pub matches: fn(&Value) -> bool,
    pub map: fn(&Value) -> BadgeSuggestion,
}

/// Known schemas in priority order.
pub const SHAPES: &[ShapeMatcher] = &[
    ShapeMatcher {
        name: "open_badges_credential",
        matches: is_credential,
        map: map_credential,
    },
    ShapeMatcher {
        name: "legacy_badge",
        matches: is_legacy_badge,
        map: map_legacy_badge,
    },
    ShapeMatcher {
        name: "legacy_response",
        matches: is_legacy_response,
        map: map_legacy_response,
    },
    ShapeMatcher {
        name: "flat",
        matches: is_flat,
        map: map_flat,
    },
];

/// Name of the first schema that recognizes `value`.
pub fn matched_shape(value: &Value) -> Option<&'static str> {
    SHAPES
        .iter()
        .find(|shape| (shape.matches)(value))
        .map(|shape| shape.name)
}

/// Maps any payload to a suggestion. Unrecognized input yields empty fields.
pub fn map_suggestion(value: &Value) -> BadgeSuggestion {
    let suggestion = match SHAPES.iter().find(|shape| (shape.matches)(value)) {
        Some(shape) => {
            debug!(shape = shape.name, "mapping badge payload");
            (shape.map)(value)
        }
        None => {
            debug!("badge payload matched no known shape");
            BadgeSuggestion::default()
        }
    };
    suggestion.with_metrics(read_metrics(value))
}

fn is_credential(value: &Value) -> bool {
    achievement(value).is_some()
}

fn achievement(value: &Value) -> Option<&Value> {
    value
        .get("credentialSubject")?
        .get("achievement")
        .filter(|a| a.is_object())
}

fn map_credential(value: &Value) -> BadgeSuggestion {
    let Some(achievement) = achievement(value) else {
        return BadgeSuggestion::default();
    };
    let description = text(achievement, "description");
    let criteria = narrative(achievement.get("criteria")).unwrap_or_else(|| description.clone());
    let skills = first_skill_list([
        value.get("skills"),
        value.get("credentialSubject").and_then(|s| s.get("skills")),
        achievement.get("skills"),
    ]);
    BadgeSuggestion::new(text(achievement, "name"), description, criteria)
        .with_image(image(achievement.get("image")))
        .with_skills(skills)
}

fn is_legacy_badge(value: &Value) -> bool {
    value.get("badge_name").is_some() || value.get("badge_description").is_some()
}

fn map_legacy_badge(value: &Value) -> BadgeSuggestion {
    let description = text(value, "badge_description");
    let criteria = narrative(value.get("criteria")).unwrap_or_else(|| description.clone());
    BadgeSuggestion::new(text(value, "badge_name"), description, criteria)
        .with_skills(first_skill_list([value.get("skills")]))
}

fn is_legacy_response(value: &Value) -> bool {
    value
        .get("response")
        .is_some_and(|response| response.get("badge_name").is_some())
}

fn map_legacy_response(value: &Value) -> BadgeSuggestion {
    value
        .get("response")
        .map(map_legacy_badge)
        .unwrap_or_default()
}

fn is_flat(value: &Value) -> bool {
    ["title", "description", "criteria"]
        .iter()
        .any(|key| value.get(*key).is_some())
}

fn map_flat(value: &Value) -> BadgeSuggestion {
    let description = text(value, "description");
    let criteria = narrative(value.get("criteria")).unwrap_or_default();
    BadgeSuggestion::new(text(value, "title"), description, criteria)
        .with_image(image(value.get("image")))
        .with_skills(first_skill_list([value.get("skills")]))
}

fn text(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// `criteria.narrative`, or `criteria` itself when it is a plain string.
fn narrative(criteria: Option<&Value>) -> Option<String> {
    let criteria = criteria?;
    criteria
        .as_str()
        .or_else(|| criteria.get("narrative").and_then(Value::as_str))
        .map(ToOwned::to_owned)
}

/// `image.id`, or `image` itself when it is a plain string.
fn image(image: Option<&Value>) -> Option<String> {
    let image = image?;
    image
        .as_str()
        .or_else(|| image.get("id").and_then(Value::as_str))
        .filter(|uri| !uri.is_empty())
        .map(ToOwned::to_owned)
}

/// The first candidate array holding at least one object entry.
fn first_skill_list<'a>(candidates: impl IntoIterator<Item = Option<&'a Value>>) -> Vec<Skill> {
    candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_array)
        .find(|items| items.iter().any(Value::is_object))
        .map(|items| items.iter().filter_map(Skill::from_value).collect())
        .unwrap_or_default()
}

fn read_metrics(value: &Value) -> Option<TokenMetrics> {
    let scopes = [Some(value), value.get("response")];
    scopes.into_iter().flatten().find_map(|scope| {
        ["metrics", "usage", "token_counts", "tokenCounts"]
            .iter()
            .filter_map(|key| scope.get(*key))
            .find_map(TokenMetrics::from_object)
    })
}
