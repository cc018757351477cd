//! Parser for the twin's delimited reply format.
//!
//! The model is instructed to answer in four ordered sections:
//!
//! ```text
//! [[PRIMARY]] instinctive reaction
//! [[META]] reflective commentary
//! [[RESPONSE]] the reply actually shown to the user
//! [[SKETCH]] optional visual description [[/SKETCH]]
//! ```
//!
//! Each field is extracted by an independent first-match boundary pair; a
//! missing pair degrades that field to its placeholder rather than failing
//! the parse. Marker order is deliberately not validated: out-of-sequence
//! output produces whatever the independent matches yield.

pub const PRIMARY_MARKER: &str = "[[PRIMARY]]";
pub const META_MARKER: &str = "[[META]]";
pub const RESPONSE_MARKER: &str = "[[RESPONSE]]";
pub const SKETCH_OPEN: &str = "[[SKETCH]]";
pub const SKETCH_CLOSE: &str = "[[/SKETCH]]";

/// Placeholder shown when the primary stream could not be isolated.
pub const FALLBACK_PRIMARY: &str = "Synthesizing...";
/// Placeholder shown when the meta stream could not be isolated.
pub const FALLBACK_META: &str = "Analyzing perception...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    pub primary_thought: String,
    pub meta_thought: String,
    pub final_response: String,
    pub sketch_directive: Option<String>,
}

/// Extracts the four protocol fields from raw completion text. Never fails:
/// every field is either a trimmed substring or its named fallback. If the
/// RESPONSE marker is absent the entire raw text becomes the reply, so the
/// user always sees something.
pub fn parse(raw: &str) -> ParsedReply {
    let primary_thought = between(raw, PRIMARY_MARKER, META_MARKER)
        .map(str::to_string)
        .unwrap_or_else(|| FALLBACK_PRIMARY.to_string());

    let meta_thought = between(raw, META_MARKER, RESPONSE_MARKER)
        .map(str::to_string)
        .unwrap_or_else(|| FALLBACK_META.to_string());

    let final_response = match after(raw, RESPONSE_MARKER) {
        Some(rest) => {
            let body = match rest.find(SKETCH_OPEN) {
                Some(cut) => &rest[..cut],
                None => rest,
            };
            body.trim().to_string()
        }
        None => raw.trim().to_string(),
    };

    let sketch_directive = between(raw, SKETCH_OPEN, SKETCH_CLOSE)
        .filter(|directive| !directive.is_empty())
        .map(str::to_string);

    ParsedReply {
        primary_thought,
        meta_thought,
        final_response,
        sketch_directive,
    }
}

/// Trimmed text between the first `open` and the first `close` after it.
fn between<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    let rest = &text[start..];
    let end = rest.find(close)?;
    Some(rest[..end].trim())
}

/// Trimmed-at-caller text after the first occurrence of `open`.
fn after<'a>(text: &'a str, open: &str) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    Some(&text[start..])
}
