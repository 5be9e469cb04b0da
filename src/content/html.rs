use std::sync::LazyLock;

use regex::Regex;

/// The detection pair: a plausible tag, or a character entity. Comparison
/// operators with spaces around them match neither.
static HTML_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[a-zA-Z][a-zA-Z0-9]*(\s[^<>]*)?/?>").unwrap());
static HTML_ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&[a-zA-Z0-9#]+;").unwrap());

static PRE_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<pre><code(?: class="language-([^"]*)")?>(.*?)</code></pre>"#).unwrap()
});
static BR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<br\s*/?>").unwrap());
static STRONG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<(?:strong|b)>(.*?)</(?:strong|b)>").unwrap());
static EM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<(?:em|i)>(.*?)</(?:em|i)>").unwrap());
static DEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<(?:del|s|strike)>(.*?)</(?:del|s|strike)>").unwrap());
static CODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<code>(.*?)</code>").unwrap());
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<h([1-6])[^>]*>(.*?)</h[1-6]>").unwrap());
static ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<a\s[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#).unwrap());
static TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<table[^>]*>(.*?)</table>").unwrap());
static TR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<tr[^>]*>(.*?)</tr>").unwrap());
static CELL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<t([hd])[^>]*>(.*?)</t[hd]>").unwrap());
static PARAGRAPH_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<p[^>]*>").unwrap());
static ANY_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?[a-zA-Z][^>]*>").unwrap());

/// Whether a plain body is actually HTML that slipped through without the
/// `org.matrix.custom.html` format marker.
pub fn looks_like_html(text: &str) -> bool {
    HTML_TAG_RE.is_match(text) || HTML_ENTITY_RE.is_match(text)
}

pub fn unescape_html(input: &str) -> String {
    input
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Matrix HTML back to Mattermost markdown; the inverse of
/// [`markdown_to_html`](super::markdown_to_html) over the grammar the bridge
/// emits, tolerant of the usual client variations (`<b>`, `<i>`, `<p>`).
pub fn html_to_markdown(html: &str) -> String {
    let mut text = html.replace("\r\n", "\n");

    text = PRE_CODE_RE
        .replace_all(&text, |caps: &regex::Captures<'_>| {
            let lang = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let code = caps[2].trim_end_matches('\n');
            format!("```{lang}\n{code}\n```")
        })
        .into_owned();

    text = TABLE_RE
        .replace_all(&text, |caps: &regex::Captures<'_>| table_to_markdown(&caps[1]))
        .into_owned();

    text = BR_RE.replace_all(&text, "\n").into_owned();
    text = STRONG_RE.replace_all(&text, "**$1**").into_owned();
    text = EM_RE.replace_all(&text, "*$1*").into_owned();
    text = DEL_RE.replace_all(&text, "~~$1~~").into_owned();
    text = CODE_RE.replace_all(&text, "`$1`").into_owned();

    text = HEADING_RE
        .replace_all(&text, |caps: &regex::Captures<'_>| {
            let level: usize = caps[1].parse().unwrap_or(1);
            format!("{} {}\n", "#".repeat(level), &caps[2])
        })
        .into_owned();

    text = ANCHOR_RE.replace_all(&text, "[$2]($1)").into_owned();

    text = PARAGRAPH_OPEN_RE.replace_all(&text, "").into_owned();
    text = text.replace("</p>", "\n\n");
    text = ANY_TAG_RE.replace_all(&text, "").into_owned();

    unescape_html(&text).trim().to_owned()
}

fn table_to_markdown(inner: &str) -> String {
    let mut lines: Vec<String> = vec![];
    let mut column_count = 0;
    let mut header_done = false;
    for row in TR_RE.captures_iter(inner) {
        let mut cells: Vec<String> = vec![];
        let mut is_header = false;
        for cell in CELL_RE.captures_iter(&row[1]) {
            if &cell[1] == "h" {
                is_header = true;
            }
            cells.push(cell[2].trim().to_owned());
        }
        if cells.is_empty() {
            continue;
        }
        column_count = column_count.max(cells.len());
        lines.push(format!("| {} |", cells.join(" | ")));
        if (is_header || lines.len() == 1) && !header_done {
            lines.push(format!("|{}", "---|".repeat(column_count)));
            header_done = true;
        }
    }
    lines.join("\n")
}

/// Picks the text of an inbound message event: the formatted body when the
/// event is marked as HTML or the formatted body meaningfully differs,
/// otherwise the plain body with a regex fallback for unmarked HTML.
pub fn event_text_to_markdown(
    body: &str,
    formatted_body: Option<&str>,
    format: Option<&str>,
) -> String {
    if let Some(formatted) = formatted_body {
        if format == Some("org.matrix.custom.html") || formatted != body {
            return html_to_markdown(formatted);
        }
    }
    if looks_like_html(body) {
        html_to_markdown(body)
    } else {
        body.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::super::markdown_to_html;
    use super::*;

    #[test]
    fn detector_ignores_comparisons_but_sees_tags() {
        assert!(!looks_like_html("2 < 3 and 5 > 4"));
        assert!(looks_like_html("<div data-x=\"v\">"));
        assert!(looks_like_html("a &amp; b"));
        assert!(looks_like_html("<br/>"));
        assert!(!looks_like_html("plain text"));
    }

    #[test]
    fn inline_styles_invert() {
        assert_eq!(html_to_markdown("<strong>bold</strong>"), "**bold**");
        assert_eq!(html_to_markdown("<b>bold</b>"), "**bold**");
        assert_eq!(html_to_markdown("<em>italic</em>"), "*italic*");
        assert_eq!(html_to_markdown("<del>gone</del>"), "~~gone~~");
        assert_eq!(html_to_markdown("<code>x = 1</code>"), "`x = 1`");
        assert_eq!(html_to_markdown("one<br>two"), "one\ntwo");
    }

    #[test]
    fn anchors_invert_to_links() {
        assert_eq!(
            html_to_markdown("<a href=\"https://example.com\">site</a>"),
            "[site](https://example.com)"
        );
    }

    #[test]
    fn unknown_tags_are_stripped() {
        assert_eq!(html_to_markdown("<p>para</p><span>x</span>"), "para\n\nx");
    }

    #[test]
    fn entities_unescape_last() {
        assert_eq!(html_to_markdown("a &amp;&amp; b &lt; c"), "a && b < c");
    }

    fn canon(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn markdown_roundtrips_through_html() {
        for source in [
            "**bold** and *italic* and ~~struck~~",
            "`inline code` stays",
            "# Heading\nbody line",
            "[site](https://example.com) trailing",
            "line one\nline two",
            "| a | b |\n|---|---|\n| 1 | 2 |",
            "```rust\nfn main() {}\n```",
        ] {
            let roundtrip = html_to_markdown(&markdown_to_html(source));
            assert_eq!(canon(&roundtrip), canon(source), "source: {source:?}");
        }
    }

    #[test]
    fn formatted_body_preferred_for_html_events() {
        assert_eq!(
            event_text_to_markdown("bold", Some("<strong>bold</strong>"), Some("org.matrix.custom.html")),
            "**bold**"
        );
        assert_eq!(event_text_to_markdown("plain", None, None), "plain");
        // Unmarked HTML in the plain body still converts.
        assert_eq!(event_text_to_markdown("<em>x</em>", None, None), "*x*");
        // Identical formatted body without the format marker adds nothing.
        assert_eq!(event_text_to_markdown("same", Some("same"), None), "same");
    }
}
