//! Locate the JSON object inside an oracle reply.
//!
//! Models sometimes wrap the object in prose or markdown fences even when told
//! not to. This is the one place that tolerance lives; the classifier parses
//! whatever slice comes back and nothing else trims oracle text.

/// Return the first complete JSON object in `text`, after stripping fences.
///
/// Brace matching skips braces inside JSON strings. If no balanced object is
/// found the slice runs to the last `}` so the caller still gets a precise
/// parse error. `None` means there is no object to parse at all.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let body = strip_code_fence(text.trim());

    let start = body.find('{')?;
    let mut depth: i64 = 0;
    let mut in_string = false;
    let mut escape = false;

    for (idx, ch) in body.char_indices().skip_while(|(i, _)| *i < start) {
        if in_string {
            if escape {
                escape = false;
                continue;
            }
            match ch {
                '\\' => escape = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&body[start..=idx]);
                }
            }
            _ => {}
        }
    }

    let end = body.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&body[start..=end])
}

/// Inner text of the first fenced block, or `text` unchanged when unfenced.
fn strip_code_fence(text: &str) -> &str {
    let Some(open) = text.find("```") else {
        return text;
    };
    let after_open = &text[open + 3..];
    // Skip the info string (`json`, `JSON`, ...) up to the end of the line.
    let inner = match after_open.find('\n') {
        Some(nl) => &after_open[nl + 1..],
        None => after_open.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    match inner.find("```") {
        Some(close) => inner[..close].trim(),
        None => inner.trim(),
    }
}
