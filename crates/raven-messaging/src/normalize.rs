use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::ports::TextNormalizer;

static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid line break pattern"));
static BLOCK_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</(p|div|li|h[1-6]|blockquote|pre|tr)\s*>").expect("valid block pattern")
});
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));
static NUMERIC_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#([xX])?([0-9a-fA-F]+);").expect("valid numeric entity pattern"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid blank line pattern"));

/// HTML to plain text: block ends and `<br>` become newlines, other tags are
/// dropped and the common entities decoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlNormalizer;

impl TextNormalizer for HtmlNormalizer {
    fn normalize(&self, html: &str) -> anyhow::Result<String> {
        let text = LINE_BREAK.replace_all(html, "\n");
        let text = BLOCK_END.replace_all(&text, "\n");
        let text = TAG.replace_all(&text, "");
        let text = decode_entities(&text);
        Ok(BLANK_LINES.replace_all(&text, "\n\n").into_owned())
    }
}

fn decode_entities(text: &str) -> String {
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"");
    let text = NUMERIC_ENTITY.replace_all(&text, decode_numeric);
    // &amp; last so "&amp;lt;" stays "&lt;"
    text.replace("&amp;", "&")
}

/// `&#8217;` and `&#x27;`. Anything that is not a valid code point is kept as written.
fn decode_numeric(caps: &Captures<'_>) -> String {
    let radix = if caps.get(1).is_some() { 16 } else { 10 };
    u32::from_str_radix(&caps[2], radix)
        .ok()
        .and_then(char::from_u32)
        .map(String::from)
        .unwrap_or_else(|| caps[0].to_string())
}
