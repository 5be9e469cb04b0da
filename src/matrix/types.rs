use serde::{Deserialize, Serialize};

use crate::trackers::PendingFile;
use crate::{AppResult, JsonValue, MatrixError};

use super::{REL_REPLACE, REL_THREAD};

/// A client-server API event, with its payload kept as an untyped tree.
/// Field probes below guard against missing or wrong-typed fields.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MatrixEvent {
    #[serde(default)]
    pub event_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub room_id: String,
    #[serde(default)]
    pub origin_server_ts: i64,
    #[serde(default)]
    pub content: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redacts: Option<String>,
}

impl MatrixEvent {
    pub fn content_str(&self, key: &str) -> Option<&str> {
        self.content.get(key)?.as_str()
    }

    pub fn msgtype(&self) -> Option<&str> {
        self.content_str("msgtype")
    }

    pub fn body(&self) -> Option<&str> {
        self.content_str("body")
    }

    pub fn format(&self) -> Option<&str> {
        self.content_str("format")
    }

    pub fn formatted_body(&self) -> Option<&str> {
        self.content_str("formatted_body")
    }

    pub fn relates_to(&self) -> Option<&JsonValue> {
        self.content.get("m.relates_to")
    }

    pub fn rel_type(&self) -> Option<&str> {
        self.relates_to()?.get("rel_type")?.as_str()
    }

    pub fn relates_to_event_id(&self) -> Option<&str> {
        self.relates_to()?.get("event_id")?.as_str()
    }

    pub fn is_edit(&self) -> bool {
        self.rel_type() == Some(REL_REPLACE)
    }

    /// The replacement content of an edit event.
    pub fn new_content(&self) -> Option<&JsonValue> {
        self.content.get("m.new_content")
    }

    /// The event this one replies to, from either the reply or thread shape.
    pub fn reply_to_event_id(&self) -> Option<&str> {
        if let Some(id) = self
            .relates_to()?
            .get("m.in_reply_to")
            .and_then(|r| r.get("event_id"))
            .and_then(|v| v.as_str())
        {
            return Some(id);
        }
        if self.rel_type() == Some(REL_THREAD) {
            return self.relates_to_event_id();
        }
        None
    }

    /// The `mattermost_post_id` loop-prevention marker, if stamped.
    pub fn mattermost_post_id(&self) -> Option<&str> {
        self.content_str(super::KEY_MATTERMOST_POST_ID)
    }

    pub fn mattermost_remote_id(&self) -> Option<&str> {
        self.content_str(super::KEY_MATTERMOST_REMOTE_ID)
    }

    pub fn membership(&self) -> Option<&str> {
        self.content_str("membership")
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct CreateRoomRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_alias_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub invite: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    pub is_direct: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub initial_state: Vec<JsonValue>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CreateRoomResponse {
    pub room_id: String,
}

/// What `create_room` hands back to the mapping layer: the alias when the
/// room is publicly addressable, the raw id otherwise.
#[derive(Clone, Debug)]
pub struct CreatedRoom {
    pub room_id: String,
    pub alias: Option<String>,
}

impl CreatedRoom {
    /// The identifier stored in the channel mapping.
    pub fn identifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.room_id)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ResolveAliasResponse {
    pub room_id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct JoinRoomResponse {
    pub room_id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SendEventResponse {
    pub event_id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UploadResponse {
    pub content_uri: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RegisterResponse {
    pub user_id: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProfileResponse {
    #[serde(default)]
    pub displayname: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct WhoamiResponse {
    pub user_id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RelationsResponse {
    #[serde(default)]
    pub chunk: Vec<MatrixEvent>,
    #[serde(default)]
    pub next_batch: Option<String>,
}

/// A registered (or already existing) ghost account.
#[derive(Clone, Debug)]
pub struct GhostUser {
    pub user_id: String,
    pub display_name: Option<String>,
}

/// Everything `send_message` needs to emit one post, files included.
#[derive(Clone, Debug, Default)]
pub struct SendMessageRequest {
    pub room_id: String,
    pub ghost_user_id: String,
    pub message: String,
    pub html_message: Option<String>,
    /// Thread root on the Matrix side, when the post is a reply.
    pub root_event_id: Option<String>,
    pub post_id: Option<String>,
    pub files: Vec<PendingFile>,
    /// Matrix user ids to surface in `m.mentions`.
    pub mention_user_ids: Vec<String>,
}

/// Validates `mxc://<server>/<media id>` and splits it.
pub fn parse_mxc_uri(uri: &str) -> AppResult<(String, String)> {
    let rest = uri
        .strip_prefix("mxc://")
        .ok_or_else(|| MatrixError::invalid_param(format!("not an mxc uri: {uri}")))?;
    let (server, media_id) = rest
        .split_once('/')
        .ok_or_else(|| MatrixError::invalid_param(format!("mxc uri missing media id: {uri}")))?;
    if server.is_empty() || media_id.is_empty() || media_id.contains('/') {
        return Err(MatrixError::invalid_param(format!("malformed mxc uri: {uri}")).into());
    }
    Ok((server.to_owned(), media_id.to_owned()))
}

/// Message type chosen from the attachment's MIME prefix.
pub fn msgtype_for_mime(mime_type: &str) -> &'static str {
    if mime_type.starts_with("image/") {
        "m.image"
    } else if mime_type.starts_with("video/") {
        "m.video"
    } else if mime_type.starts_with("audio/") {
        "m.audio"
    } else {
        "m.file"
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn probes_tolerate_missing_fields() {
        let event = MatrixEvent {
            content: json!({"msgtype": 5}),
            ..Default::default()
        };
        assert_eq!(event.msgtype(), None);
        assert_eq!(event.body(), None);
        assert_eq!(event.rel_type(), None);
        assert_eq!(event.reply_to_event_id(), None);
    }

    #[test]
    fn edit_shape_is_detected() {
        let event = MatrixEvent {
            content: json!({
                "msgtype": "m.text",
                "body": " * new",
                "m.relates_to": {"rel_type": "m.replace", "event_id": "$orig"},
                "m.new_content": {"body": "new"},
            }),
            ..Default::default()
        };
        assert!(event.is_edit());
        assert_eq!(event.relates_to_event_id(), Some("$orig"));
        assert_eq!(
            event.new_content().and_then(|c| c.get("body")).and_then(|v| v.as_str()),
            Some("new")
        );
    }

    #[test]
    fn reply_shapes_resolve_to_parent() {
        let reply = MatrixEvent {
            content: json!({"m.relates_to": {"m.in_reply_to": {"event_id": "$parent"}}}),
            ..Default::default()
        };
        assert_eq!(reply.reply_to_event_id(), Some("$parent"));

        let thread = MatrixEvent {
            content: json!({"m.relates_to": {"rel_type": "m.thread", "event_id": "$root"}}),
            ..Default::default()
        };
        assert_eq!(thread.reply_to_event_id(), Some("$root"));
    }

    #[test]
    fn mxc_uri_validation() {
        assert_eq!(
            parse_mxc_uri("mxc://example.com/abc123").unwrap(),
            ("example.com".to_owned(), "abc123".to_owned())
        );
        assert!(parse_mxc_uri("https://example.com/abc").is_err());
        assert!(parse_mxc_uri("mxc://example.com/").is_err());
        assert!(parse_mxc_uri("mxc://example.com").is_err());
        assert!(parse_mxc_uri("mxc://example.com/a/b").is_err());
    }

    #[test]
    fn msgtype_follows_mime_prefix() {
        assert_eq!(msgtype_for_mime("image/png"), "m.image");
        assert_eq!(msgtype_for_mime("video/mp4"), "m.video");
        assert_eq!(msgtype_for_mime("audio/ogg"), "m.audio");
        assert_eq!(msgtype_for_mime("application/pdf"), "m.file");
    }
}
