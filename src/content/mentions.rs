use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

/// `\B@` keeps email-like `user@host` from producing a mention.
static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\B@[a-zA-Z0-9._:-]+\b").unwrap());

static PILL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a href="https://matrix\.to/#/([^"]+)"[^>]*>(.*?)</a>"#).unwrap()
});

/// Mattermost's channel-wide mention keywords.
const CHANNEL_MENTIONS: [&str; 3] = ["here", "channel", "all"];

pub fn is_channel_mention(name: &str) -> bool {
    CHANNEL_MENTIONS.contains(&name)
}

/// Mention tokens in a post, without the `@`, in order of first appearance.
pub fn extract_mentions(text: &str) -> Vec<String> {
    let mut seen = vec![];
    for m in MENTION_RE.find_iter(text) {
        let name = m.as_str().trim_start_matches('@').to_owned();
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

/// The matrix.to pill for one resolved user mention.
pub fn mention_pill(mx_user_id: &str, display: &str) -> String {
    format!("<a href=\"https://matrix.to/#/{mx_user_id}\">@{display}</a>")
}

/// Rewrites `@name` tokens in an already-HTML body into pills, using the
/// resolutions collected beforehand. Unresolved tokens stay plain text.
pub fn replace_mentions_with_pills(
    html: &str,
    resolved: &HashMap<String, (String, String)>,
) -> String {
    MENTION_RE
        .replace_all(html, |caps: &regex::Captures<'_>| {
            let name = caps[0].trim_start_matches('@');
            match resolved.get(name) {
                Some((mx_user_id, display)) => mention_pill(mx_user_id, display),
                None => caps[0].to_owned(),
            }
        })
        .into_owned()
}

/// Matrix user ids referenced by pills in an HTML body, for resolution
/// ahead of [`rewrite_pills_to_usernames`].
pub fn extract_pill_user_ids(html: &str) -> Vec<String> {
    let mut seen = vec![];
    for caps in PILL_RE.captures_iter(html) {
        let id = caps[1].to_owned();
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen
}

/// Inbound: turns matrix.to pills back into `@username` when the Matrix id
/// resolves to a known Mattermost user, otherwise keeps the pill's text.
pub fn rewrite_pills_to_usernames(
    html: &str,
    resolve: impl Fn(&str) -> Option<String>,
) -> String {
    PILL_RE
        .replace_all(html, |caps: &regex::Captures<'_>| {
            let mx_user_id = &caps[1];
            let inner = &caps[2];
            match resolve(mx_user_id) {
                Some(username) => format!("@{username}"),
                None => inner.to_owned(),
            }
        })
        .into_owned()
}
