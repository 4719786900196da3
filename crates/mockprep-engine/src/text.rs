//! Char-boundary-safe string shortening for logs and prompts.

/// First `max_chars` characters of `s`, borrowed.
pub(crate) fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

/// Keep the head and tail of `content` around a marker when it exceeds
/// `max_chars`. Long answers usually carry the point at either end.
pub(crate) fn truncate_middle(content: &str, max_chars: usize) -> String {
    let total = content.chars().count();
    if total <= max_chars {
        return content.to_string();
    }
    let half = max_chars / 2;
    let head: String = content.chars().take(half).collect();
    let tail: String = content.chars().skip(total - half).collect();
    format!("{} [...] {}", head.trim_end(), tail.trim_start())
}
