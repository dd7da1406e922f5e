// src/analyze/extract.rs
//! Best-effort recovery of a `ParsedResponse` from text that should hold one
//! JSON object but may be fenced, wrapped in prose, truncated or sloppy.
//!
//! Strategies run in order and the first success wins:
//! 1. direct parse
//! 2. fenced ```` ```json ```` block, whose closing fence must start a line;
//!    its body is accepted only if it parses as is or by span
//! 3. greedy span from the first `{` to the last `}`
//! 4. syntactic repair (trailing commas, truncation, missing closers) of the
//!    fenced body, then everything from the first `{`, then the span
//! 5. field salvage of `content` and `sources`
//! 6. fallback: the cleaned raw text as `content`
//!
//! `extract` is total: any input yields a `ParsedResponse`.

use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::response::{sources_from_value, ParsedResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseTier {
    Direct,
    Fenced,
    Span,
    Repaired,
}

/// How the response was obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// A whole JSON object parsed, possibly after repair.
    Parsed { response: ParsedResponse, tier: ParseTier },
    /// Only individual fields could be lifted out.
    Salvaged(ParsedResponse),
    /// Nothing structured; `content` is the cleaned input text.
    Fallback(ParsedResponse),
}

impl Extraction {
    pub fn response(&self) -> &ParsedResponse {
        match self {
            Extraction::Parsed { response, .. } => response,
            Extraction::Salvaged(r) | Extraction::Fallback(r) => r,
        }
    }

    pub fn into_response(self) -> ParsedResponse {
        match self {
            Extraction::Parsed { response, .. } => response,
            Extraction::Salvaged(r) | Extraction::Fallback(r) => r,
        }
    }

    pub fn tier_label(&self) -> &'static str {
        match self {
            Extraction::Parsed { tier, .. } => match tier {
                ParseTier::Direct => "direct",
                ParseTier::Fenced => "fenced",
                ParseTier::Span => "span",
                ParseTier::Repaired => "repaired",
            },
            Extraction::Salvaged(_) => "salvaged",
            Extraction::Fallback(_) => "fallback",
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Extraction::Fallback(_))
    }
}

// A fence inside a JSON string sits after an escaped `\n`, never at a line start.
static RE_FENCE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\r?\n[ \t]*```[ \t]*(?:\r?\n|$)").unwrap()
});
static RE_FENCE_MARK: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json|JSON)?\n?").unwrap());
static RE_CONTENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)"content"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap());
static RE_CONTENT_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)"content"\s*:\s*"((?:[^"\\]|\\.)*\\?)$"#).unwrap());
static RE_SOURCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)"sources"\s*:\s*(\[.*?\])\s*[,}]"#).unwrap());

/// Run the recovery cascade over `text`.
pub fn extract(text: &str) -> Extraction {
    let out = cascade(text);
    counter!("extract_tier_total", "tier" => out.tier_label()).increment(1);
    if !matches!(out, Extraction::Parsed { tier: ParseTier::Direct, .. }) {
        tracing::debug!(tier = out.tier_label(), len = text.len(), "response needed recovery");
    }
    out
}

fn cascade(text: &str) -> Extraction {
    if let Some(response) = parse_object(text) {
        return Extraction::Parsed {
            response,
            tier: ParseTier::Direct,
        };
    }

    let fenced = fenced_body(text);
    if let Some(response) = fenced.and_then(|inner| {
        parse_object(inner).or_else(|| greedy_span(inner).and_then(parse_object))
    }) {
        return Extraction::Parsed {
            response,
            tier: ParseTier::Fenced,
        };
    }

    let span = greedy_span(text);
    if let Some(response) = span.and_then(parse_object) {
        return Extraction::Parsed {
            response,
            tier: ParseTier::Span,
        };
    }

    let fenced_tail = fenced.and_then(from_first_brace);
    let tail = from_first_brace(text);
    for candidate in [fenced_tail, tail, span].into_iter().flatten() {
        if let Some(response) = parse_object(&repair(candidate)) {
            return Extraction::Parsed {
                response,
                tier: ParseTier::Repaired,
            };
        }
    }

    if let Some(r) = salvage(text) {
        return Extraction::Salvaged(r);
    }

    Extraction::Fallback(ParsedResponse::text(clean_text(text)))
}

fn from_first_brace(text: &str) -> Option<&str> {
    text.find('{').map(|i| &text[i..])
}

/// Parse `s` as JSON and accept it only if it is an object.
fn parse_object(s: &str) -> Option<ParsedResponse> {
    let v: Value = serde_json::from_str(s.trim()).ok()?;
    v.is_object().then(|| ParsedResponse::from_value(&v))
}

fn fenced_body(text: &str) -> Option<&str> {
    RE_FENCE_BLOCK
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn greedy_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

// ------------------------------------------------------------
// Syntactic repair
// ------------------------------------------------------------

/// Drop commas that directly precede `}` or `]` (ignoring whitespace).
/// Commas inside string literals are left alone.
pub(crate) fn strip_trailing_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut in_str = false;
    let mut escaped = false;
    for (i, &c) in chars.iter().enumerate() {
        if in_str {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_str = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_str = true;
                out.push(c);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, Default, PartialEq)]
struct Depth {
    braces: i32,
    brackets: i32,
    /// Byte offset just past the last `}` that brought both depths back to zero.
    last_balanced: Option<usize>,
    open_string: bool,
    dangling_escape: bool,
}

fn scan_depth(s: &str) -> Depth {
    let mut d = Depth::default();
    let mut in_str = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if in_str {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_str = false;
            }
            continue;
        }
        match c {
            '"' => in_str = true,
            '{' => d.braces += 1,
            '}' => {
                d.braces -= 1;
                if d.braces == 0 && d.brackets == 0 {
                    d.last_balanced = Some(i + 1);
                }
            }
            '[' => d.brackets += 1,
            ']' => d.brackets -= 1,
            _ => {}
        }
    }
    d.open_string = in_str;
    d.dangling_escape = in_str && escaped;
    d
}

/// Trailing-comma strip, then balance: cut back to the last balanced object
/// if one closed before the end, otherwise close an open string and append
/// the missing `]` and `}` by count (all brackets first).
pub(crate) fn repair(s: &str) -> String {
    let mut fixed = strip_trailing_commas(s.trim());
    let d = scan_depth(&fixed);
    if d.braces == 0 && d.brackets == 0 && !d.open_string {
        return fixed;
    }
    if let Some(end) = d.last_balanced.filter(|&e| e < fixed.len()) {
        fixed.truncate(end);
        return fixed;
    }
    if d.dangling_escape {
        fixed.pop();
    }
    if d.open_string {
        fixed.push('"');
    }
    for _ in 0..d.brackets.max(0) {
        fixed.push(']');
    }
    for _ in 0..d.braces.max(0) {
        fixed.push('}');
    }
    fixed
}

// ------------------------------------------------------------
// Field salvage and fallback
// ------------------------------------------------------------

fn salvage(text: &str) -> Option<ParsedResponse> {
    let content = salvage_content(text);
    let sources = RE_SOURCES
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| serde_json::from_str::<Value>(m.as_str()).ok())
        .map(|v| sources_from_value(Some(&v)))
        .unwrap_or_default();

    if content.is_none() && sources.is_empty() {
        return None;
    }
    Some(ParsedResponse {
        content: content.unwrap_or_default(),
        sources,
        visualization: None,
    })
}

/// Lift the `content` string out by its quote boundaries. A value cut off
/// before its closing quote runs to the end of the input.
fn salvage_content(text: &str) -> Option<String> {
    let raw = RE_CONTENT
        .captures(text)
        .or_else(|| RE_CONTENT_OPEN.captures(text))
        .and_then(|c| c.get(1))?
        .as_str();
    let raw = raw.strip_suffix('\\').filter(|r| !r.ends_with('\\')).unwrap_or(raw);
    Some(unescape(raw))
}

/// Decode JSON string escapes; on malformed escapes fall back to the common ones.
pub(crate) fn unescape(raw: &str) -> String {
    if let Ok(s) = serde_json::from_str::<String>(&format!("\"{raw}\"")) {
        return s;
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Raw text with code-fence markers removed.
pub fn clean_text(text: &str) -> String {
    RE_FENCE_MARK.replace_all(text, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content_of(e: &Extraction) -> &str {
        &e.response().content
    }

    #[test]
    fn direct_parse_wins_for_valid_objects() {
        let e = extract(r#"{"content":"ok","sources":[],"visualization":null}"#);
        assert!(matches!(e, Extraction::Parsed { tier: ParseTier::Direct, .. }));
        assert_eq!(content_of(&e), "ok");
    }

    #[test]
    fn fenced_block_is_unwrapped() {
        let text = "Here you go:\n```json\n{\"content\": \"fenced\"}\n```\nthanks";
        let e = extract(text);
        assert!(matches!(e, Extraction::Parsed { tier: ParseTier::Fenced, .. }));
        assert_eq!(content_of(&e), "fenced");
    }

    #[test]
    fn fence_inside_content_does_not_end_the_block() {
        let text = "```json\n{\"content\":\"Run:\\n```bash\\nls\\n```\\nThen check AQI.\",\"sources\":[]}\n```";
        let e = extract(text);
        assert!(matches!(e, Extraction::Parsed { tier: ParseTier::Fenced, .. }), "{e:?}");
        assert_eq!(content_of(&e), "Run:\n```bash\nls\n```\nThen check AQI.");
    }

    #[test]
    fn fenced_body_with_trailing_comma_is_repaired() {
        let e = extract("```json\n{\"content\": \"x\", \"sources\": [],}\n```");
        assert!(matches!(e, Extraction::Parsed { tier: ParseTier::Repaired, .. }), "{e:?}");
        assert_eq!(content_of(&e), "x");
    }

    #[test]
    fn prose_around_object_uses_span() {
        let e = extract("Sure! {\"content\": \"x\", \"sources\": []} Hope that helps.");
        assert!(matches!(e, Extraction::Parsed { tier: ParseTier::Span, .. }));
        assert_eq!(content_of(&e), "x");
    }

    #[test]
    fn trailing_commas_are_repaired() {
        let e = extract(r#"{"content": "a, b,", "sources": [{"title": "t", "url": "u",},],}"#);
        assert!(matches!(e, Extraction::Parsed { tier: ParseTier::Repaired, .. }));
        assert_eq!(content_of(&e), "a, b,");
        assert_eq!(e.response().sources.len(), 1);
    }

    #[test]
    fn truncated_object_gets_closers() {
        let e = extract(r#"{"content": "Mumbai", "sources": [{"title": "a", "url": "u"}"#);
        assert!(matches!(e, Extraction::Parsed { tier: ParseTier::Repaired, .. }));
        assert_eq!(e.response().sources.len(), 1);
    }

    #[test]
    fn truncated_mid_string_is_closed() {
        let e = extract(r#"{"content": "Air quality is poo"#);
        assert!(matches!(e, Extraction::Parsed { tier: ParseTier::Repaired, .. }));
        assert_eq!(content_of(&e), "Air quality is poo");
    }

    #[test]
    fn unterminated_nested_source_falls_to_salvage() {
        let e = extract(r#"{"content":"abc","sources":[{"title":"x""#);
        assert!(matches!(e, Extraction::Salvaged(_)), "{e:?}");
        assert_eq!(content_of(&e), "abc");
        assert!(e.response().sources.is_empty());
        assert!(e.response().visualization.is_none());
    }

    #[test]
    fn salvage_unescapes_markdown() {
        let text = r###"noise {"content": "## Title\nLine with \"quote\"", "sources": [{"title":"t","url":"u"}], "visualization": {"###;
        let e = extract(text);
        let r = e.response();
        assert_eq!(r.content, "## Title\nLine with \"quote\"");
        assert_eq!(r.sources.len(), 1);
    }

    #[test]
    fn plain_text_falls_back_cleaned() {
        let e = extract("```\nJust some words\n```");
        assert!(e.is_fallback());
        assert_eq!(content_of(&e), "Just some words");

        let e = extract("");
        assert!(e.is_fallback());
        assert_eq!(content_of(&e), "");
    }

    #[test]
    fn non_object_json_is_not_a_response() {
        let e = extract("[1, 2, 3]");
        assert!(e.is_fallback());
        assert_eq!(content_of(&e), "[1, 2, 3]");
    }

    #[test]
    fn repair_cuts_back_to_last_balanced_object() {
        assert_eq!(repair(r#"{"a":1} {"b":"#), r#"{"a":1}"#);
        assert_eq!(repair(r#"{"a":[1,2"#), r#"{"a":[1,2]}"#);
        // braces inside strings do not count
        assert_eq!(repair(r#"{"a":"}{"#), r#"{"a":"}{"}"#);
    }

    #[test]
    fn trailing_comma_strip_respects_strings() {
        assert_eq!(strip_trailing_commas(r#"{"a":",]", "b":[1,2,],}"#), r#"{"a":",]", "b":[1,2]}"#);
    }

    #[test]
    fn unescape_tolerates_bad_escapes() {
        assert_eq!(unescape(r"a\nb"), "a\nb");
        assert_eq!(unescape(r#"bad \q and \"ok\""#), "bad \\q and \"ok\"");
    }
}
