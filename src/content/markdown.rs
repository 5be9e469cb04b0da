use std::sync::LazyLock;

use regex::Regex;

static FENCED_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```([a-zA-Z0-9+#._-]*)\n?(.*?)```").unwrap());
static INLINE_CODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`\n]+)`").unwrap());
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(#{1,6})[ \t]+(.+?)[ \t]*$").unwrap());
static BOLD_STAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static BOLD_UNDER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"__([^_]+)__").unwrap());
static ITALIC_STAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*([^*\n]+)\*").unwrap());
static ITALIC_UNDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b_([^_\n]+)_\b").unwrap());
static STRIKE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"~~([^~\n]+)~~").unwrap());
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").unwrap());
static TRAILING_BLOCK_BR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</(h[1-6]|table|pre)>\s*<br>").unwrap());

/// Schemes a translated link may carry. Everything else (javascript:,
/// data:, vbscript:, file:, ...) is left as plain text.
const SAFE_LINK_PREFIXES: [&str; 4] = ["http://", "https://", "mailto:", "ftp://"];

const PLACEHOLDER: char = '\u{E000}';

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn stash(stashed: &mut Vec<String>, rendered: String) -> String {
    stashed.push(rendered);
    format!("{PLACEHOLDER}{}{PLACEHOLDER}", stashed.len() - 1)
}

fn unstash(mut text: String, stashed: &[String]) -> String {
    for (index, rendered) in stashed.iter().enumerate().rev() {
        text = text.replace(&format!("{PLACEHOLDER}{index}{PLACEHOLDER}"), rendered);
    }
    text
}

/// Mattermost-flavored markdown to Matrix HTML. The input is HTML-escaped
/// first, and code spans are pulled out before any other substitution so
/// their contents survive both the inline rules and the newline pass.
pub fn markdown_to_html(input: &str) -> String {
    let mut stashed: Vec<String> = vec![];
    let mut text = escape_html(input);

    text = FENCED_CODE_RE
        .replace_all(&text, |caps: &regex::Captures<'_>| {
            let lang = &caps[1];
            let code = caps[2].trim_end_matches('\n');
            let rendered = if lang.is_empty() {
                format!("<pre><code>{code}</code></pre>")
            } else {
                format!("<pre><code class=\"language-{lang}\">{code}</code></pre>")
            };
            stash(&mut stashed, rendered)
        })
        .into_owned();

    text = INLINE_CODE_RE
        .replace_all(&text, |caps: &regex::Captures<'_>| {
            stash(&mut stashed, format!("<code>{}</code>", &caps[1]))
        })
        .into_owned();

    text = render_tables(&text, &mut stashed);

    text = HEADING_RE
        .replace_all(&text, |caps: &regex::Captures<'_>| {
            let level = caps[1].len();
            format!("<h{level}>{}</h{level}>", &caps[2])
        })
        .into_owned();

    text = BOLD_STAR_RE.replace_all(&text, "<strong>$1</strong>").into_owned();
    text = BOLD_UNDER_RE.replace_all(&text, "<strong>$1</strong>").into_owned();
    text = ITALIC_STAR_RE.replace_all(&text, "<em>$1</em>").into_owned();
    text = ITALIC_UNDER_RE.replace_all(&text, "<em>$1</em>").into_owned();
    text = STRIKE_RE.replace_all(&text, "<del>$1</del>").into_owned();

    text = LINK_RE
        .replace_all(&text, |caps: &regex::Captures<'_>| {
            let label = &caps[1];
            let url = &caps[2];
            if SAFE_LINK_PREFIXES.iter().any(|p| url.to_lowercase().starts_with(p)) {
                format!("<a href=\"{url}\">{label}</a>")
            } else {
                caps[0].to_owned()
            }
        })
        .into_owned();

    text = text.replace('\n', "<br>");
    text = TRAILING_BLOCK_BR_RE.replace_all(&text, "</$1>").into_owned();

    unstash(text, &stashed)
}

fn is_table_row(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.contains('|')
}

fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.contains('-')
        && !trimmed.is_empty()
        && trimmed.chars().all(|c| matches!(c, '|' | '-' | ':' | ' ' | '\t'))
}

fn split_row(line: &str) -> Vec<String> {
    let trimmed = line.trim().trim_start_matches('|').trim_end_matches('|');
    trimmed.split('|').map(|cell| cell.trim().to_owned()).collect()
}

/// Converts pipe tables (header row + `---` separator row) into `<table>`
/// blocks, stashed away so the newline pass cannot mangle them.
fn render_tables(text: &str, stashed: &mut Vec<String>) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        if i + 1 < lines.len() && is_table_row(lines[i]) && is_separator_row(lines[i + 1]) {
            let header = split_row(lines[i]);
            let mut rows = vec![];
            let mut j = i + 2;
            while j < lines.len() && is_table_row(lines[j]) && !is_separator_row(lines[j]) {
                rows.push(split_row(lines[j]));
                j += 1;
            }
            let mut html = String::from("<table><thead><tr>");
            for cell in &header {
                html.push_str(&format!("<th>{cell}</th>"));
            }
            html.push_str("</tr></thead><tbody>");
            for row in &rows {
                html.push_str("<tr>");
                for cell in row {
                    html.push_str(&format!("<td>{cell}</td>"));
                }
                html.push_str("</tr>");
            }
            html.push_str("</tbody></table>");
            out.push(stash(stashed, html));
            i = j;
        } else {
            out.push(lines[i].to_owned());
            i += 1;
        }
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html_before_substitution() {
        assert_eq!(
            markdown_to_html("<script>alert('x')</script>"),
            "&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"
        );
    }

    #[test]
    fn inline_styles() {
        assert_eq!(markdown_to_html("**bold**"), "<strong>bold</strong>");
        assert_eq!(markdown_to_html("__bold__"), "<strong>bold</strong>");
        assert_eq!(markdown_to_html("*italic*"), "<em>italic</em>");
        assert_eq!(markdown_to_html("_italic_"), "<em>italic</em>");
        assert_eq!(markdown_to_html("~~gone~~"), "<del>gone</del>");
        assert_eq!(
            markdown_to_html("**bold** and *italic*"),
            "<strong>bold</strong> and <em>italic</em>"
        );
    }

    #[test]
    fn code_spans_escape_inner_markup() {
        assert_eq!(markdown_to_html("`let x = 1;`"), "<code>let x = 1;</code>");
        assert_eq!(
            markdown_to_html("`**not bold**`"),
            "<code>**not bold**</code>"
        );
    }

    #[test]
    fn fenced_code_blocks_keep_newlines() {
        let html = markdown_to_html("```rust\nfn main() {}\nlet y = 2;\n```");
        assert_eq!(
            html,
            "<pre><code class=\"language-rust\">fn main() {}\nlet y = 2;</code></pre>"
        );
        // No <br> inside the block even though it spans lines.
        assert!(!html.contains("<br>"));
    }

    #[test]
    fn headings_by_level() {
        assert_eq!(markdown_to_html("# Title"), "<h1>Title</h1>");
        assert_eq!(markdown_to_html("### Sub"), "<h3>Sub</h3>");
        assert_eq!(
            markdown_to_html("# Title\nbody"),
            "<h1>Title</h1>body"
        );
    }

    #[test]
    fn safe_links_become_anchors() {
        assert_eq!(
            markdown_to_html("[site](https://example.com)"),
            "<a href=\"https://example.com\">site</a>"
        );
        assert_eq!(
            markdown_to_html("[mail](mailto:a@b.c)"),
            "<a href=\"mailto:a@b.c\">mail</a>"
        );
    }

    #[test]
    fn dangerous_links_stay_text() {
        for url in [
            "javascript:alert(1)",
            "data:text/html,x",
            "vbscript:x",
            "file:///etc/passwd",
        ] {
            let input = format!("[x]({url})");
            assert!(!markdown_to_html(&input).contains("<a "), "{url} linked");
        }
    }

    #[test]
    fn newlines_become_breaks() {
        assert_eq!(markdown_to_html("one\ntwo"), "one<br>two");
    }

    #[test]
    fn tables_render_with_header_and_body() {
        let html = markdown_to_html("| a | b |\n|---|---|\n| 1 | 2 |");
        assert_eq!(
            html,
            "<table><thead><tr><th>a</th><th>b</th></tr></thead>\
             <tbody><tr><td>1</td><td>2</td></tr></tbody></table>"
        );
    }
}
