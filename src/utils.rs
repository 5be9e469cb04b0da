use std::time::{SystemTime, UNIX_EPOCH};

use rand::distr::Alphanumeric;
use rand::prelude::*;

pub fn random_string(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

pub fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Compares two secrets without leaking their common prefix length.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    ring::constant_time::verify_slices_are_equal(a.as_bytes(), b.as_bytes()).is_ok()
}

/// Turns a hostname into a string usable inside a post property key.
/// `chat.example.com:8448` becomes `chat_example_com_8448`.
pub fn sanitize_server_name(host: &str) -> String {
    host.replace(['.', ':'], "_")
}

/// Derives a room alias localpart from a channel name: lowercased, with
/// spaces and underscores collapsed to dashes.
pub fn sanitize_room_alias(name: &str) -> String {
    name.to_lowercase().replace(['_', ' '], "-")
}

/// Splits a display name into a (first, last) pair at the first whitespace.
pub fn split_display_name(display: &str) -> (String, String) {
    let display = display.trim();
    match display.split_once(char::is_whitespace) {
        Some((first, rest)) => (first.to_owned(), rest.trim().to_owned()),
        None => (display.to_owned(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_server_name_replaces_dots_and_colons() {
        assert_eq!(sanitize_server_name("chat.example.com"), "chat_example_com");
        assert_eq!(sanitize_server_name("example.com:8448"), "example_com_8448");
    }

    #[test]
    fn sanitize_room_alias_lowers_and_dashes() {
        assert_eq!(sanitize_room_alias("Town Square"), "town-square");
        assert_eq!(sanitize_room_alias("dev_backend"), "dev-backend");
    }

    #[test]
    fn split_display_name_on_first_space() {
        assert_eq!(
            split_display_name("John Ronald Reuel"),
            ("John".to_owned(), "Ronald Reuel".to_owned())
        );
        assert_eq!(split_display_name("mononym"), ("mononym".to_owned(), String::new()));
        assert_eq!(split_display_name(""), (String::new(), String::new()));
    }

    #[test]
    fn constant_time_eq_basic() {
        assert!(constant_time_eq("secret", "secret"));
        assert!(!constant_time_eq("secret", "secret2"));
        assert!(!constant_time_eq("", "x"));
    }
}
