/// Characters that render as nothing but survive `split_whitespace`
const ZERO_WIDTH: [char; 5] = ['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}'];

/// Normalizes extracted page text:
/// - strips zero-width characters
/// - collapses runs of spaces and tabs within a line to a single space
/// - trims every line
/// - collapses any run of blank lines into exactly one blank line
/// - trims the result
pub fn clean_text(text: &str) -> String {
    let stripped = strip_zero_width(text);
    let mut cleaned = String::with_capacity(stripped.len());
    let mut pending_blank = false;

    for line in stripped.lines() {
        let line = collapse_inline_whitespace(line);
        if line.is_empty() {
            pending_blank = !cleaned.is_empty();
            continue;
        }

        if !cleaned.is_empty() {
            cleaned.push_str(if pending_blank { "\n\n" } else { "\n" });
        }
        cleaned.push_str(&line);
        pending_blank = false;
    }

    cleaned
}

/// Remove zero-width spaces, joiners and byte-order marks
pub fn strip_zero_width(text: &str) -> String {
    text.chars().filter(|c| !ZERO_WIDTH.contains(c)).collect()
}

/// Collapse all whitespace in a single line into single spaces and trim it
pub fn collapse_inline_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Length of the cleaned text in characters
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
