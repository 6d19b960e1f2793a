//! Structured moderation decisions and the tolerant parser for model output.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const PARSE_FAILURE_REASON: &str = "Failed to parse AI response";
pub const INVALID_STRUCTURE_REASON: &str = "Invalid response structure from AI model";
pub const UNAVAILABLE_REASON: &str = "AI moderation unavailable";

const MIN_SEVERITY: u8 = 1;
const MAX_SEVERITY: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Enumerates supported `ActionKind` values.
pub enum ActionKind {
    Comment,
    Hide,
    Lock,
    Suggest,
    None,
}

impl ActionKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "comment" => Some(Self::Comment),
            "hide" => Some(Self::Hide),
            "lock" => Some(Self::Lock),
            "suggest" => Some(Self::Suggest),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::Hide => "hide",
            Self::Lock => "lock",
            Self::Suggest => "suggest",
            Self::None => "none",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Validated and normalized outcome of one policy evaluation.
pub struct ModerationDecision {
    pub should_act: bool,
    pub action_kind: ActionKind,
    /// Always within `1..=10`.
    pub severity: u8,
    pub reason: String,
    /// Absent when the model suggested no text; kept distinct from `Some("")`.
    pub response: Option<String>,
}

impl ModerationDecision {
    pub fn no_action(reason: impl Into<String>) -> Self {
        Self {
            should_act: false,
            action_kind: ActionKind::None,
            severity: MIN_SEVERITY,
            reason: reason.into(),
            response: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Enumerates supported `DecisionParseError` values.
pub enum DecisionParseError {
    #[error("model response did not contain a JSON object")]
    NoJson,
    #[error("model returned JSON with an invalid shape: {0}")]
    InvalidStructure(String),
}

impl DecisionParseError {
    /// Reason carried by the fallback decision for this failure class.
    pub fn fallback_reason(&self) -> &'static str {
        match self {
            Self::NoJson => PARSE_FAILURE_REASON,
            Self::InvalidStructure(_) => INVALID_STRUCTURE_REASON,
        }
    }

    pub fn into_fallback(self) -> ModerationDecision {
        ModerationDecision::no_action(self.fallback_reason())
    }
}

/// Parses raw model text into a validated decision.
///
/// Candidates are tried in order: every balanced `{...}` object found by a
/// string-aware depth scan, then the greedy first-to-last brace span, then the
/// whole trimmed text. The first candidate that decodes to a JSON object is
/// validated; later candidates are not consulted.
pub fn parse_decision(raw: &str) -> Result<ModerationDecision, DecisionParseError> {
    let object = first_json_object(raw).ok_or(DecisionParseError::NoJson)?;
    validate_decision(&object)
}

pub fn normalize_severity(raw: f64) -> u8 {
    let clamped = raw.clamp(f64::from(MIN_SEVERITY), f64::from(MAX_SEVERITY));
    clamped.round() as u8
}

fn first_json_object(raw: &str) -> Option<Map<String, Value>> {
    let text = strip_code_fences(raw);
    json_candidates(text).into_iter().find_map(|candidate| {
        match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(object)) => Some(object),
            _ => None,
        }
    })
}

/// A reply wrapped as a whole in one fenced block, with any language tag.
fn fence_regex() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| {
            Regex::new(r"(?s)\A\s*```[A-Za-z0-9_+.-]*[ \t]*\r?\n?(?P<body>.*?)\s*```\s*\z").ok()
        })
        .as_ref()
}

fn greedy_object_regex() -> Option<&'static Regex> {
    static GREEDY: OnceLock<Option<Regex>> = OnceLock::new();
    GREEDY
        .get_or_init(|| Regex::new(r"(?s)\{.*\}").ok())
        .as_ref()
}

/// Unwraps the outer fence only; fences inside the JSON are content.
fn strip_code_fences(raw: &str) -> &str {
    fence_regex()
        .and_then(|fence| fence.captures(raw))
        .and_then(|captures| captures.name("body"))
        .map_or(raw, |body| body.as_str())
}

fn json_candidates(text: &str) -> Vec<&str> {
    let mut candidates = text
        .char_indices()
        .filter(|(_, ch)| *ch == '{')
        .filter_map(|(start, _)| balanced_object_at(text, start))
        .collect::<Vec<_>>();
    if let Some(found) = greedy_object_regex().and_then(|greedy| greedy.find(text)) {
        candidates.push(found.as_str());
    }
    candidates.push(text.trim().trim_matches('`').trim());
    candidates
}

/// Returns the `{...}` span starting at `start` whose braces balance, ignoring
/// braces inside JSON string literals.
fn balanced_object_at(text: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

fn field<'a>(object: &'a Map<String, Value>, name: &str, alias: &str) -> Option<&'a Value> {
    object.get(name).or_else(|| object.get(alias))
}

fn validate_decision(object: &Map<String, Value>) -> Result<ModerationDecision, DecisionParseError> {
    let invalid = |message: &str| DecisionParseError::InvalidStructure(message.to_string());

    let should_act = field(object, "shouldAct", "shouldTakeAction")
        .and_then(Value::as_bool)
        .ok_or_else(|| invalid("shouldAct must be a boolean"))?;
    let severity = object
        .get("severity")
        .and_then(Value::as_f64)
        .ok_or_else(|| invalid("severity must be a number"))?;
    let reason = object
        .get("reason")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("reason must be a string"))?;
    let action_kind = field(object, "actionKind", "actionType")
        .and_then(Value::as_str)
        .and_then(ActionKind::parse)
        .ok_or_else(|| invalid("actionKind must be one of comment, hide, lock, suggest, none"))?;
    let response = object
        .get("response")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned);

    Ok(ModerationDecision {
        should_act,
        action_kind,
        severity: normalize_severity(severity),
        reason: reason.to_string(),
        response,
    })
}
