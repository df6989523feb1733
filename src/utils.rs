use regex::Regex;
use std::sync::LazyLock;

/// First line written by JabRef into the files it saves.
pub(crate) const SIGNATURE: &str = "This file was created with JabRef";

static ENTRY_START_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@[a-zA-Z]*\s*\{").unwrap());

/// A `#label#` string reference; the label uses text token characters.
static STRING_REFERENCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([\p{Alphabetic}\p{N}:\-_*+./']+)#").unwrap());

/// A piece of a stored field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    Text(&'a str),
    /// The label of a `#label#` reference, without the `#`s.
    Label(&'a str),
}

/// Split a stored value into literal text and string references. Empty text
/// between references is left out.
pub(crate) fn string_segments(value: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut last = 0;
    for caps in STRING_REFERENCE_REGEX.captures_iter(value) {
        let (Some(whole), Some(label)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            out.push(Segment::Text(&value[last..whole.start()]));
        }
        out.push(Segment::Label(label.as_str()));
        last = whole.end();
    }
    if last < value.len() {
        out.push(Segment::Text(&value[last..]));
    }
    out
}

/// Characters that may appear in a plain text token (type names, field names,
/// string labels).
pub(crate) fn is_text_token_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, ':' | '-' | '_' | '*' | '+' | '.' | '/' | '\'')
}

/// Characters that abort citation key parsing.
pub(crate) fn is_forbidden_key_char(c: char) -> bool {
    matches!(c, '#' | '{' | '}' | '¤' | '~' | '¨' | ',' | '=')
}

/// Normalises an all-digit token by dropping leading zeros.
///
/// Returns `None` if the token contains anything but ASCII digits. Tokens of
/// any length are accepted.
pub(crate) fn normalize_number(token: &str) -> Option<String> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let trimmed = token.trim_start_matches('0');
    Some(if trimmed.is_empty() { "0" } else { trimmed }.to_string())
}

/// Whether a line looks like the start of a BibTeX block or a JabRef signature.
pub(crate) fn is_entry_start_line(line: &str) -> bool {
    line.starts_with(SIGNATURE) || ENTRY_START_REGEX.is_match(line)
}
