//! Markup, text and URL sanitizers applied to every string taken from a feed.
//!
//! Each function is total and idempotent. The markup and text passes are iterated until the
//! output stops changing, so a payload split around a removed fragment
//! (`<scr<script></script>ipt>`) cannot reassemble into live markup.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Tags removed together with their content, or on their own when unpaired.
const DANGEROUS_TAGS: &[&str] = &[
    "iframe", "object", "embed", "form", "base", "meta", "link", "style", "svg", "math",
];

/// Attributes whose values are checked for script-capable URI schemes.
const URI_ATTRIBUTES: &str = "href|src|action|formaction|poster|background";

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("sanitizer pattern is valid")
}

static COMMENT: Lazy<Regex> = Lazy::new(|| compile(r"(?s)<!--.*?-->"));
static UNTERMINATED_COMMENT: Lazy<Regex> = Lazy::new(|| compile(r"(?s)<!--.*$"));
static SCRIPT_BLOCK: Lazy<Regex> = Lazy::new(|| compile(r"(?is)<script\b[^>]*>.*?</script\s*>"));
static SCRIPT_TAG: Lazy<Regex> = Lazy::new(|| compile(r"(?i)</?script\b[^>]*(?:>|$)"));

static DANGEROUS: Lazy<Vec<(Regex, Regex)>> = Lazy::new(|| {
    DANGEROUS_TAGS
        .iter()
        .map(|tag| {
            (
                compile(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")),
                compile(&format!(r"(?i)</?{tag}\b[^>]*(?:>|$)")),
            )
        })
        .collect()
});

/// A closed tag, or a tag opened and never closed before the end of input.
static TAG: Lazy<Regex> = Lazy::new(|| compile(r"(?s)<[^>]*>|<[A-Za-z/!?][^>]*$"));
static EVENT_HANDLER: Lazy<Regex> = Lazy::new(|| {
    compile(r#"(?i)([\s/"'])on\w+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]*)"#)
});
static DANGEROUS_URI: Lazy<Regex> = Lazy::new(|| {
    let scheme = r"(?:javascript|vbscript|data)\s*:";
    compile(&format!(
        r#"(?i)\b({URI_ATTRIBUTES})\s*=\s*(?:"\s*{scheme}[^"]*"|'\s*{scheme}[^']*'|{scheme}[^\s>]*)"#
    ))
});
static CSS_EXPRESSION: Lazy<Regex> = Lazy::new(|| compile(r"(?i)expression\s*\([^)]*\)?"));
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| compile(r"\s{10,}"));

/// Removes comments, script blocks, dangerous tags, event handlers, script-capable URIs in
/// URI attributes and CSS `expression()` calls. Everything else is left in place.
pub fn sanitize_markup(text: &str) -> String {
    fixpoint(text, markup_pass)
}

/// Strips remaining tags and null bytes, collapses runs of 10+ whitespace and trims.
pub fn sanitize_text(text: &str) -> String {
    fixpoint(text, text_pass)
}

/// Returns the trimmed URL when it is http(s), protocol-relative or relative, and an empty
/// string when it carries a script-capable or unknown scheme.
pub fn sanitize_url(url: &str) -> String {
    let trimmed = url.trim();
    let normalized: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    if normalized.starts_with("javascript:")
        || normalized.starts_with("vbscript:")
        || normalized.starts_with("data:text/html")
    {
        return String::new();
    }

    let lower = trimmed.to_lowercase();
    if lower.starts_with("http://")
        || lower.starts_with("https://")
        || trimmed.starts_with('/')
        || trimmed.starts_with("./")
        || trimmed.starts_with("../")
    {
        return trimmed.to_string();
    }

    // Anything else with a colon is treated as a disguised scheme
    if trimmed.contains(':') {
        return String::new();
    }

    trimmed.to_string()
}

/// Decodes the five XML entities. `&amp;` goes last so `&amp;lt;` decodes to the literal
/// text `&lt;` rather than to `<`.
pub fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn markup_pass(input: &str) -> String {
    let mut out = COMMENT.replace_all(input, "").into_owned();
    out = UNTERMINATED_COMMENT.replace_all(&out, "").into_owned();
    out = SCRIPT_BLOCK.replace_all(&out, "").into_owned();
    out = SCRIPT_TAG.replace_all(&out, "").into_owned();

    for (block, tag) in DANGEROUS.iter() {
        out = block.replace_all(&out, "").into_owned();
        out = tag.replace_all(&out, "").into_owned();
    }

    out = TAG
        .replace_all(&out, |caps: &Captures| {
            EVENT_HANDLER.replace_all(&caps[0], "${1}").into_owned()
        })
        .into_owned();
    out = DANGEROUS_URI.replace_all(&out, "${1}=\"\"").into_owned();
    TAG.replace_all(&out, |caps: &Captures| {
        CSS_EXPRESSION.replace_all(&caps[0], "").into_owned()
    })
    .into_owned()
}

fn text_pass(input: &str) -> String {
    let stripped = TAG.replace_all(input, "");
    let without_nulls = stripped.replace('\0', "");
    WHITESPACE_RUN
        .replace_all(&without_nulls, " ")
        .trim()
        .to_string()
}

/// Reapplies `pass` until the output is stable. A pass only ever removes text, so any pass
/// that changes its input shrinks it and the loop ends after at most `input.len()` rounds.
fn fixpoint(input: &str, pass: fn(&str) -> String) -> String {
    let mut current = pass(input);
    loop {
        let next = pass(&current);
        if next.len() >= current.len() {
            debug_assert_eq!(next, current);
            return current;
        }
        current = next;
    }
}
