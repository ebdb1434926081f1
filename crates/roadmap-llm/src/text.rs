//! Cleanup helpers for raw LLM completions.

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// Remove `<think>...</think>` reasoning sections emitted by some models.
///
/// An unclosed section swallows the rest of the text.
pub fn strip_think_blocks(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(THINK_OPEN) {
        out.push_str(&rest[..start]);
        let Some(len) = rest[start..].find(THINK_CLOSE) else {
            return out;
        };
        rest = &rest[start + len + THINK_CLOSE.len()..];
    }
    out.push_str(rest);
    out
}
