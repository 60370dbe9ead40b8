//! Response decoding and best-effort JSON repair.
//!
//! The backend's object mapper serializes entity graphs that contain
//! back-references (user -> station -> users -> ...) until it gives up,
//! leaving a well-formed prefix followed by runs of stray `]}`. Until the
//! mapper excludes those back-references, responses are read as text and
//! repaired here before use:
//!
//! 1. strict parse;
//! 2. strip the excess closers at the tail, keeping exactly the ones that
//!    close what the prefix opened;
//! 3. take the leading array/object, cut at its first balanced end or close
//!    whatever is still open.
//!
//! The repairs are heuristics tuned to that one defect. They can return a
//! truncated payload for other malformed input, and every repair is logged.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use super::graph;
use super::{ApiEnvelope, GatewayError};

/// A run of two or more closing brackets/braces at the very end.
fn trailing_closers() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:\s*[\]}]){2,}\s*$").expect("valid trailing closers regex"))
}

/// From the first opener to the last closer, greedily.
fn leading_container() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^\s*([\[{].*[\]}]|[\[{].*)").expect("valid leading container regex")
    })
}

/// Decode an HTTP response into an envelope. Never panics on any input.
pub fn decode_response(status: u16, content_type: Option<&str>, body: &str) -> ApiEnvelope<Value> {
    decode(status, content_type, body).into()
}

pub fn decode(status: u16, content_type: Option<&str>, body: &str) -> Result<Value, GatewayError> {
    let success = (200..300).contains(&status);

    if !is_json_content_type(content_type) {
        return if success {
            Ok(Value::String(body.to_string()))
        } else {
            Err(GatewayError::from_text_status(status, body))
        };
    }

    let parsed = match parse_lenient(body) {
        Ok(value) => value,
        // An unparseable error page still carries its status
        Err(e) if !success => {
            debug!(status, error = %e, "Error response body is not JSON");
            return Err(GatewayError::from_text_status(status, body));
        }
        Err(e) => return Err(e),
    };
    let cleaned = graph::strip_circular(parsed);

    if success {
        Ok(cleaned)
    } else {
        Err(GatewayError::from_json_status(status, &cleaned))
    }
}

fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.to_ascii_lowercase().contains("json"))
        .unwrap_or(false)
}

/// Parse JSON text, attempting the known repairs before giving up with
/// [`GatewayError::CircularReference`]. Blank text is `null`.
pub fn parse_lenient(text: &str) -> Result<Value, GatewayError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    let strict_error = match serde_json::from_str(text) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    debug!(error = %strict_error, bytes = text.len(), "Strict JSON parse failed, attempting repair");

    if let Some(value) = repair_trailing_closers(text) {
        warn!(bytes = text.len(), "Recovered JSON by stripping excess trailing brackets");
        return Ok(value);
    }
    if let Some(value) = repair_leading_container(text) {
        warn!(bytes = text.len(), "Recovered JSON from leading well-formed prefix");
        return Ok(value);
    }

    warn!(error = %strict_error, "JSON repair failed");
    Err(GatewayError::CircularReference)
}

fn repair_trailing_closers(text: &str) -> Option<Value> {
    let run = trailing_closers().find(text)?;
    let prefix = &text[..run.start()];
    let Scan::Open(open) = scan(prefix.trim_start()) else {
        return None;
    };
    if open.is_empty() {
        return None;
    }

    let needed: String = open.iter().rev().map(|&b| closer_for(b)).collect();
    let available: String = run.as_str().chars().filter(|c| !c.is_whitespace()).collect();
    if !available.starts_with(&needed) {
        return None;
    }

    serde_json::from_str(&format!("{}{}", prefix, needed)).ok()
}

fn repair_leading_container(text: &str) -> Option<Value> {
    let captures = leading_container().captures(text)?;
    let candidate = captures.get(1)?.as_str();

    let repaired = match scan(candidate) {
        Scan::Complete(end) => candidate[..=end].to_string(),
        Scan::Open(open) => {
            let body = candidate.trim_end().trim_end_matches(',');
            let closers: String = open.iter().rev().map(|&b| closer_for(b)).collect();
            format!("{}{}", body, closers)
        }
        Scan::Broken => return None,
    };

    serde_json::from_str(&repaired).ok()
}

fn closer_for(opener: u8) -> char {
    if opener == b'[' {
        ']'
    } else {
        '}'
    }
}

/// Bracket structure of a JSON-ish text, string literals skipped.
#[derive(Debug, PartialEq)]
enum Scan {
    /// The first top-level container closes at this byte index.
    Complete(usize),
    /// The text ends with these containers open, outermost first.
    Open(Vec<u8>),
    /// A closer does not match its opener, or the text ends inside a string.
    Broken,
}

fn scan(text: &str) -> Scan {
    let mut open = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in text.bytes().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' | b'{' => open.push(b),
            b']' | b'}' => {
                let expected = if b == b']' { b'[' } else { b'{' };
                if open.pop() != Some(expected) {
                    return Scan::Broken;
                }
                if open.is_empty() {
                    return Scan::Complete(i);
                }
            }
            _ => {}
        }
    }

    if in_string {
        Scan::Broken
    } else {
        Scan::Open(open)
    }
}
