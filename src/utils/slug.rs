//! Identifier slugification.
//!
//! Section titles become HTML ids: transliterated to ASCII, lowercased,
//! runs of anything else collapsed to a single `-`.

use deunicode::deunicode;

/// Characters forbidden in file paths and fragments
const FORBIDDEN_CHARS: &[char] = &[
    '<', '>', ':', '|', '?', '*', '#', '\\', '(', ')', '[', ']', '\t', '\r', '\n',
];

/// Make an id from free text. Empty input yields `section`.
pub fn slugify(text: &str) -> String {
    let ascii = deunicode(text);
    let mut out = String::with_capacity(ascii.len());
    let mut pending_dash = false;

    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
            pending_dash = false;
        } else {
            pending_dash = true;
        }
    }

    if out.is_empty() { "section".to_owned() } else { out }
}

/// Whether `segment` is safe to use as a single output path component.
pub fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(FORBIDDEN_CHARS)
        && !segment.contains('/')
}
