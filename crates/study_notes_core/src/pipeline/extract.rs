//! crates/study_notes_core/src/pipeline/extract.rs
//!
//! Pulls the JSON payload out of a free-text model reply and repairs the
//! textual damage models commonly introduce:
//! - prose or markdown fences around the payload
//! - raw newlines, tabs and other control characters inside strings
//! - LaTeX commands written with a single backslash (`\frac`, `\sqrt`)
//! - doubled quote characters
//!
//! The output is only a candidate for a strict parse; nothing here checks meaning.
//! Running `extract` on its own output returns the same text.

use crate::error::GenerationError;

/// The top-level JSON shape expected for a content kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeHint {
    Object,
    Array,
}

impl ShapeHint {
    fn delimiters(self) -> (char, char) {
        match self {
            ShapeHint::Object => ('{', '}'),
            ShapeHint::Array => ('[', ']'),
        }
    }
}

/// Extracts and cleans the payload embedded in `raw`.
pub fn extract(raw: &str, shape: ShapeHint) -> Result<String, GenerationError> {
    let span = payload_span(raw, shape).ok_or(GenerationError::NoPayloadFound)?;
    let normalized = normalize_whitespace(span);
    let escaped = repair_backslashes(&normalized);
    Ok(collapse_quotes(&escaped))
}

/// First opening delimiter through last closing delimiter, inclusive.
fn payload_span(raw: &str, shape: ShapeHint) -> Option<&str> {
    let (open, close) = shape.delimiters();
    let start = raw.find(open)?;
    let end = raw.rfind(close)?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

/// C0 and C1 control characters.
fn is_stripped_control(ch: char) -> bool {
    matches!(ch, '\u{0000}'..='\u{001F}' | '\u{007F}'..='\u{009F}')
}

/// Drops carriage returns and control characters, turns tabs and newlines into
/// spaces, and collapses every whitespace run to a single space.
fn normalize_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;

    for ch in s.chars() {
        let ch = match ch {
            '\r' => continue,
            '\t' | '\n' => ' ',
            c if is_stripped_control(c) => continue,
            c => c,
        };

        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(ch);
    }

    out
}

/// Keeps valid JSON escapes and doubles every other backslash, so LaTeX
/// commands survive the parse as literal backslashes.
///
/// `\b \f \n \r \t` followed by a lowercase letter are read as LaTeX
/// (`\beta`, `\frac`, `\nabla`, `\rho`, `\theta`), not as escapes.
fn repair_backslashes(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '\\' {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        match chars.get(i + 1).copied() {
            Some(next @ ('\\' | '"' | '/')) => {
                out.push('\\');
                out.push(next);
                i += 2;
            }
            Some('u') if is_unicode_escape(&chars[i + 2..]) => {
                out.push_str("\\u");
                i += 2;
            }
            Some(next @ ('b' | 'f' | 'n' | 'r' | 't'))
                if !chars.get(i + 2).is_some_and(|c| c.is_ascii_lowercase()) =>
            {
                out.push('\\');
                out.push(next);
                i += 2;
            }
            _ => {
                out.push_str("\\\\");
                i += 1;
            }
        }
    }

    out
}

fn is_unicode_escape(rest: &[char]) -> bool {
    rest.len() >= 4 && rest[..4].iter().all(|c| c.is_ascii_hexdigit())
}

/// Collapses runs of `"` to one, leaving complete empty string literals alone.
fn collapse_quotes(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '\\' => {
                // Escapes are always two characters after repair.
                out.push('\\');
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                }
                i += 2;
            }
            '"' => {
                let run_end = chars[i..]
                    .iter()
                    .position(|&c| c != '"')
                    .map_or(chars.len(), |p| i + p);

                if run_end - i == 2 && is_empty_literal(&out, &chars[run_end..]) {
                    out.push_str("\"\"");
                } else {
                    out.push('"');
                }
                i = run_end;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

fn is_empty_literal(before: &str, after: &[char]) -> bool {
    let prev = before.chars().rev().find(|c| !c.is_whitespace());
    let next = after.iter().find(|c| !c.is_whitespace());
    matches!(prev, Some(':' | ',' | '[' | '{')) && matches!(next, Some(',' | '}' | ']' | ':'))
}
