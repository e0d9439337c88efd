//! Batch splitting.
//!
//! A batch separator is a line holding only the separator keyword (matched
//! ASCII case-insensitively, surrounding whitespace allowed). Segments are
//! trimmed and empty ones dropped; order is preserved.

/// Split `text` into statements at separator lines.
pub fn split_statements<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let separator = separator.trim();
    let mut statements = Vec::new();
    let mut start = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        if line.trim().eq_ignore_ascii_case(separator) {
            push_segment(&mut statements, &text[start..line_start]);
            start = offset;
        }
    }
    push_segment(&mut statements, &text[start..]);
    statements
}

fn push_segment<'a>(statements: &mut Vec<&'a str>, segment: &'a str) {
    let trimmed = segment.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed);
    }
}
