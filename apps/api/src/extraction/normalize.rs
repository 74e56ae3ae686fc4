/// Normalizes decoder output into the text handed to prompt building.
///
/// - CRLF / CR line endings become LF
/// - control characters other than `\n` and `\t` are dropped
/// - runs of spaces and tabs collapse to a single space
/// - trailing whitespace is trimmed on every line
/// - consecutive blank lines collapse to one
/// - the result is trimmed
pub fn normalize_text(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");

    let mut lines: Vec<String> = Vec::new();
    let mut previous_blank = true;

    for line in unified.split('\n') {
        let cleaned = collapse_inline_whitespace(line);
        let is_blank = cleaned.is_empty();
        if is_blank && previous_blank {
            continue;
        }
        lines.push(cleaned);
        previous_blank = is_blank;
    }

    lines.join("\n").trim().to_string()
}

fn collapse_inline_whitespace(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut pending_space = false;

    for c in line.chars() {
        if c == ' ' || c == '\t' || c == '\u{a0}' {
            pending_space = true;
        } else if c.is_control() {
            continue;
        } else {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        }
    }

    out
}
