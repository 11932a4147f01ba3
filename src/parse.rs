//! # Response Sanitizer
//!
//! Models do not reliably answer with bare JSON. Common deviations handled:
//! - markdown fences, with or without a `json` tag
//! - prose before or after the object
//! - trailing fragments that also contain braces
//!
//! Anything else is a [`ParseError`] carrying both the raw and cleaned text.
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::models::Solution;

static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json)?").expect("fence pattern is valid"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub raw: String,
    pub cleaned: String,
}

pub fn parse_solution(raw: &str) -> Result<Solution, ParseError> {
    let cleaned = clean(raw);

    serde_json::from_str(&cleaned).map_err(|e| ParseError {
        message: e.to_string(),
        raw: raw.to_string(),
        cleaned,
    })
}

pub fn clean(raw: &str) -> String {
    let stripped = FENCE.replace_all(raw.trim(), "");
    let stripped = stripped.trim();

    first_object(stripped).unwrap_or(stripped).to_string()
}

/// First balanced `{...}` span. Braces inside JSON strings are ignored.
pub fn first_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }

        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + i]);
                }
            }
            _ => {}
        }
    }

    None
}
