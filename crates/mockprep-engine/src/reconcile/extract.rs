//! Locating JSON inside free-form model output.

use regex::Regex;
use std::sync::OnceLock;

/// Greedy object-array span: first `[` that opens an object list, through the
/// last `}` followed by `]`. Not a tokenizer; see `balanced_fragment_from`.
const QUESTION_ARRAY_PATTERN: &str = r"\[\s*\{[\s\S]*\}\s*\]";

/// Fence markers removed anywhere in the text, not only at the edges.
const FENCE_PATTERN: &str = r"```json\s*|\s*```";

static QUESTION_ARRAY_RE: OnceLock<Regex> = OnceLock::new();
static FENCE_RE: OnceLock<Regex> = OnceLock::new();

fn question_array_re() -> &'static Regex {
    QUESTION_ARRAY_RE.get_or_init(|| {
        Regex::new(QUESTION_ARRAY_PATTERN).expect("question array pattern is a valid regex")
    })
}

fn fence_re() -> &'static Regex {
    FENCE_RE.get_or_init(|| Regex::new(FENCE_PATTERN).expect("fence pattern is a valid regex"))
}

/// Span of an object array found in `text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ArraySpan<'a> {
    pub start: usize,
    pub text: &'a str,
}

/// Find the greedy object-array candidate, if any.
pub(crate) fn find_object_array(text: &str) -> Option<ArraySpan<'_>> {
    question_array_re().find(text).map(|m| ArraySpan {
        start: m.start(),
        text: m.as_str(),
    })
}

/// Remove Markdown code-fence markers and trim.
pub(crate) fn strip_markdown_fences(text: &str) -> String {
    fence_re().replace_all(text, "").trim().to_string()
}

/// Slice from the first `{` to the last `}` (inclusive).
pub(crate) fn outer_brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Lexical position of the balanced scan.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Lex {
    Code,
    Str,
    Escape,
}

/// Extract the balanced JSON value that opens at byte `start`.
///
/// `start` must sit on `{` or `[`. Brackets inside string literals do not
/// count. Returns `None` on a mismatched closer or an unterminated value.
pub(crate) fn balanced_fragment_from(text: &str, start: usize) -> Option<&str> {
    let bytes = text.as_bytes();
    if !matches!(bytes.get(start), Some(b'{' | b'[')) {
        return None;
    }

    // Structural bytes are ASCII, so every cut lands on a char boundary.
    let mut open: Vec<u8> = Vec::new();
    let mut lex = Lex::Code;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        lex = match (lex, b) {
            (Lex::Escape, _) => Lex::Str,
            (Lex::Str, b'\\') => Lex::Escape,
            (Lex::Str, b'"') => Lex::Code,
            (Lex::Str, _) => Lex::Str,
            (Lex::Code, b'"') => Lex::Str,
            (Lex::Code, b'{' | b'[') => {
                open.push(b);
                Lex::Code
            }
            (Lex::Code, b'}' | b']') => {
                let expected = if b == b'}' { b'{' } else { b'[' };
                if open.pop() != Some(expected) {
                    return None;
                }
                if open.is_empty() {
                    return text.get(start..=i);
                }
                Lex::Code
            }
            (Lex::Code, _) => Lex::Code,
        };
    }
    None
}
