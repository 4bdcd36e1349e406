/// Truncate a string to `max` characters, appending "…" if truncated.
/// Handles multi-byte text correctly via char boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{truncated}…")
    }
}

/// First `max` characters without any marker, trimmed. Used for titles.
pub fn clip_chars(s: &str, max: usize) -> String {
    s.trim().chars().take(max).collect::<String>().trim().to_string()
}

/// Everything up to and including the first sentence terminator that is
/// followed by whitespace (or ends the text). Falls back to the first line.
pub fn first_sentence(s: &str) -> &str {
    let s = s.trim();
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            match chars.peek() {
                None => return s,
                Some((_, next)) if next.is_whitespace() => return &s[..i + c.len_utf8()],
                _ => {}
            }
        }
    }
    s.lines().next().unwrap_or("").trim_end()
}

pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
