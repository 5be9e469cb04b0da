use std::sync::Arc;
use std::time::Duration;

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::de::DeserializeOwned;
use serde_json::json;
use uuid::Uuid;

use crate::config::BridgeConfig;
use crate::trackers::PendingFile;
use crate::{AppError, AppResult, JsonValue, MatrixError, utils};

use super::rate_limit::{RateLimitCategory, RateLimiter};
use super::types::*;
use super::{
    EVENT_TYPE_FILE_METADATA, KEY_MATTERMOST_POST_ID, KEY_MATTERMOST_REMOTE_ID, REL_ANNOTATION,
    REL_MATTERMOST_POST, REL_REPLACE, REL_THREAD, STATE_TYPE_CHANNEL,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF_MS: u64 = 1000;

/// Typed client for the homeserver's client-server and media APIs.
///
/// Every call is authenticated with the application-service token and
/// throttled through the per-category rate limiter; impersonation appends
/// the acted-for user as a `user_id` query parameter.
pub struct MatrixClient {
    http: reqwest::Client,
    config: Arc<BridgeConfig>,
    limiter: RateLimiter,
}

impl MatrixClient {
    pub fn new(config: Arc<BridgeConfig>) -> AppResult<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let limiter = RateLimiter::new(config.rate_limit_mode);
        Ok(Self { http, config, limiter })
    }

    pub fn server_name(&self) -> String {
        self.config.server_name()
    }

    fn base(&self) -> String {
        self.config.matrix.server_url.as_str().trim_end_matches('/').to_owned()
    }

    fn client_url(&self, path: &str) -> String {
        format!("{}/_matrix/client/v3/{path}", self.base())
    }

    fn client_v1_url(&self, path: &str) -> String {
        format!("{}/_matrix/client/v1/{path}", self.base())
    }

    fn media_url(&self, path: &str) -> String {
        format!("{}/_matrix/media/v3/{path}", self.base())
    }

    fn esc(segment: &str) -> String {
        utf8_percent_encode(segment, NON_ALPHANUMERIC).to_string()
    }

    /// Sends one request, retrying transient and rate-limit failures with
    /// the server-advised backoff, and classifying everything else into
    /// [`MatrixError`].
    async fn execute<F>(&self, category: RateLimitCategory, build: F) -> AppResult<reqwest::Response>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.limiter.wait(category).await;
            let response = build(&self.http)
                .bearer_auth(&self.config.matrix.as_token)
                .send()
                .await;
            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    if attempt < MAX_ATTEMPTS {
                        debug!(error = %e, attempt, "matrix request failed to send, retrying");
                        tokio::time::sleep(Duration::from_millis(DEFAULT_BACKOFF_MS)).await;
                        continue;
                    }
                    return Err(e.into());
                }
            };
            if response.status().is_success() {
                return Ok(response);
            }

            let status = response.status().as_u16();
            let body = response.bytes().await.unwrap_or_default();
            let mut err: MatrixError = serde_json::from_slice(&body).unwrap_or_else(|_| {
                MatrixError::new("M_UNKNOWN", String::from_utf8_lossy(&body).into_owned())
            });
            err.status_code = Some(status);

            let transient = err.is_rate_limit() || status >= 500;
            if transient && attempt < MAX_ATTEMPTS {
                let backoff = err.retry_after_ms.unwrap_or(DEFAULT_BACKOFF_MS);
                debug!(status, backoff, attempt, "matrix request throttled, backing off");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
                continue;
            }
            warn!(status, errcode = %err.errcode, error = %err.error, "matrix request failed");
            return Err(err.into());
        }
    }

    async fn execute_json<T, F>(&self, category: RateLimitCategory, build: F) -> AppResult<T>
    where
        T: DeserializeOwned,
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let response = self.execute(category, build).await?;
        Ok(response.json().await?)
    }

    /// Creates the room bridging a Mattermost channel. Public channels get a
    /// directory-listed room with an alias derived from the name; the room
    /// state records the channel id for reverse lookups by other instances.
    /// Fails when the alias is already taken.
    pub async fn create_room(
        &self,
        name: &str,
        topic: Option<&str>,
        is_public: bool,
        mm_channel_id: &str,
    ) -> AppResult<CreatedRoom> {
        let alias_localpart = utils::sanitize_room_alias(name);
        let request = CreateRoomRequest {
            visibility: Some(if is_public { "public" } else { "private" }.to_owned()),
            room_alias_name: is_public.then(|| alias_localpart.clone()),
            name: Some(name.to_owned()),
            topic: topic.map(ToOwned::to_owned),
            invite: vec![],
            preset: Some(if is_public { "public_chat" } else { "private_chat" }.to_owned()),
            is_direct: false,
            initial_state: vec![json!({
                "type": STATE_TYPE_CHANNEL,
                "state_key": "",
                "content": {"mattermost_channel_id": mm_channel_id},
            })],
        };
        let url = self.client_url("createRoom");
        let response: CreateRoomResponse = self
            .execute_json(RateLimitCategory::RoomCreation, |http| {
                http.post(&url).json(&request)
            })
            .await?;
        let alias = is_public.then(|| format!("#{alias_localpart}:{}", self.server_name()));
        info!(room_id = %response.room_id, channel_id = mm_channel_id, "created matrix room");
        Ok(CreatedRoom {
            room_id: response.room_id,
            alias,
        })
    }

    /// Creates a DM room between the given users. At least two participants
    /// are required.
    pub async fn create_direct_room(
        &self,
        user_ids: &[String],
        display_name: &str,
    ) -> AppResult<String> {
        if user_ids.len() < 2 {
            return Err(MatrixError::invalid_param(format!(
                "direct room needs at least 2 users, got {}",
                user_ids.len()
            ))
            .into());
        }
        let request = CreateRoomRequest {
            visibility: Some("private".to_owned()),
            room_alias_name: None,
            name: Some(display_name.to_owned()),
            topic: None,
            invite: user_ids.to_vec(),
            preset: Some("trusted_private_chat".to_owned()),
            is_direct: true,
            initial_state: vec![],
        };
        let url = self.client_url("createRoom");
        let response: CreateRoomResponse = self
            .execute_json(RateLimitCategory::RoomCreation, |http| {
                http.post(&url).json(&request)
            })
            .await?;
        Ok(response.room_id)
    }

    /// Resolves a room alias to a room id; ids pass through unchanged.
    pub async fn resolve_room_alias(&self, identifier: &str) -> AppResult<String> {
        if identifier.starts_with('!') {
            return Ok(identifier.to_owned());
        }
        let url = self.client_url(&format!("directory/room/{}", Self::esc(identifier)));
        let response: ResolveAliasResponse = self
            .execute_json(RateLimitCategory::Join, |http| http.get(&url))
            .await?;
        Ok(response.room_id)
    }

    pub async fn join_room(&self, identifier: &str) -> AppResult<String> {
        let url = self.client_url(&format!("join/{}", Self::esc(identifier)));
        let response: JoinRoomResponse = self
            .execute_json(RateLimitCategory::Join, |http| http.post(&url).json(&json!({})))
            .await?;
        Ok(response.room_id)
    }

    pub async fn join_room_as_user(&self, identifier: &str, user_id: &str) -> AppResult<String> {
        let url = self.client_url(&format!("join/{}", Self::esc(identifier)));
        let response: JoinRoomResponse = self
            .execute_json(RateLimitCategory::Join, |http| {
                http.post(&url).query(&[("user_id", user_id)]).json(&json!({}))
            })
            .await?;
        Ok(response.room_id)
    }

    pub async fn invite_user_to_room(&self, room_id: &str, user_id: &str) -> AppResult<()> {
        let url = self.client_url(&format!("rooms/{}/invite", Self::esc(room_id)));
        self.execute(RateLimitCategory::Invite, |http| {
            http.post(&url).json(&json!({"user_id": user_id}))
        })
        .await?;
        Ok(())
    }

    /// Gets a ghost into a room it cannot join on its own: invite as the
    /// application service, then join impersonating the ghost. The invite is
    /// best-effort since the ghost may already be invited or joined.
    pub async fn invite_and_join_ghost_user(&self, room_id: &str, ghost_id: &str) -> AppResult<String> {
        if let Err(e) = self.invite_user_to_room(room_id, ghost_id).await {
            debug!(room_id, ghost_id, error = %e, "ghost invite failed, trying join anyway");
        }
        self.join_room_as_user(room_id, ghost_id).await
    }

    async fn send_event(
        &self,
        room_id: &str,
        event_type: &str,
        content: &JsonValue,
        impersonate: Option<&str>,
    ) -> AppResult<SendEventResponse> {
        let txn_id = Uuid::new_v4().to_string();
        let url = self.client_url(&format!(
            "rooms/{}/send/{}/{txn_id}",
            Self::esc(room_id),
            Self::esc(event_type),
        ));
        self.execute_json(RateLimitCategory::Message, |http| {
            let mut builder = http.put(&url).json(content);
            if let Some(user_id) = impersonate {
                builder = builder.query(&[("user_id", user_id)]);
            }
            builder
        })
        .await
    }

    /// Emits a post as its ghost: the text message first, then one file
    /// message per attachment related to it via [`REL_MATTERMOST_POST`],
    /// then the file-metadata event tying them together.
    pub async fn send_message(&self, request: &SendMessageRequest) -> AppResult<SendEventResponse> {
        if request.message.is_empty() && request.files.is_empty() {
            return Err(MatrixError::invalid_param("message has no content and no files").into());
        }
        let remote_id = &self.config.mattermost.remote_id;
        let ghost = request.ghost_user_id.as_str();

        let mut primary: Option<SendEventResponse> = None;
        let mut file_entries: Vec<(String, &PendingFile)> = vec![];

        if !request.message.is_empty() {
            let content = text_message_content(request, remote_id);
            primary = Some(
                self.send_event(&request.room_id, "m.room.message", &content, Some(ghost))
                    .await?,
            );
        }

        for file in &request.files {
            let relates_to = primary.as_ref().map(|p| p.event_id.as_str());
            let content = file_message_content(
                file,
                request.post_id.as_deref(),
                remote_id,
                relates_to,
                request.root_event_id.as_deref(),
            );
            let response = self
                .send_event(&request.room_id, "m.room.message", &content, Some(ghost))
                .await?;
            if primary.is_none() {
                primary = Some(response);
            } else {
                file_entries.push((response.event_id, file));
            }
        }

        let primary = primary.expect("at least one event was sent");
        if !file_entries.is_empty() {
            let content = file_metadata_content(&primary.event_id, &file_entries);
            self.send_event(&request.room_id, EVENT_TYPE_FILE_METADATA, &content, Some(ghost))
                .await?;
        }
        Ok(primary)
    }

    /// Emits an `m.replace` edit with the `" * "` fallback body for clients
    /// that do not render replacements.
    pub async fn edit_message_as_ghost(
        &self,
        room_id: &str,
        event_id: &str,
        body: &str,
        html_body: Option<&str>,
        ghost_id: &str,
    ) -> AppResult<SendEventResponse> {
        let content = edit_content(event_id, body, html_body);
        self.send_event(room_id, "m.room.message", &content, Some(ghost_id))
            .await
    }

    pub async fn send_reaction_as_ghost(
        &self,
        room_id: &str,
        target_event_id: &str,
        emoji_key: &str,
        ghost_id: &str,
    ) -> AppResult<SendEventResponse> {
        let content = reaction_content(target_event_id, emoji_key);
        self.send_event(room_id, "m.reaction", &content, Some(ghost_id))
            .await
    }

    pub async fn redact_event_as_ghost(
        &self,
        room_id: &str,
        event_id: &str,
        ghost_id: &str,
    ) -> AppResult<()> {
        let txn_id = Uuid::new_v4().to_string();
        let url = self.client_url(&format!(
            "rooms/{}/redact/{}/{txn_id}",
            Self::esc(room_id),
            Self::esc(event_id),
        ));
        self.execute(RateLimitCategory::Message, |http| {
            http.put(&url).query(&[("user_id", ghost_id)]).json(&json!({}))
        })
        .await?;
        Ok(())
    }

    pub async fn get_event(&self, room_id: &str, event_id: &str) -> AppResult<MatrixEvent> {
        let url = self.client_url(&format!(
            "rooms/{}/event/{}",
            Self::esc(room_id),
            Self::esc(event_id),
        ));
        self.execute_json(RateLimitCategory::Message, |http| http.get(&url))
            .await
    }

    /// All events relating to `event_id`, following server pagination.
    pub async fn get_event_relations_as_user(
        &self,
        room_id: &str,
        event_id: &str,
        user_id: &str,
    ) -> AppResult<Vec<MatrixEvent>> {
        let url = self.client_v1_url(&format!(
            "rooms/{}/relations/{}",
            Self::esc(room_id),
            Self::esc(event_id),
        ));
        let mut events = vec![];
        let mut from: Option<String> = None;
        loop {
            let response: RelationsResponse = self
                .execute_json(RateLimitCategory::Message, |http| {
                    let mut builder = http.get(&url).query(&[("user_id", user_id)]);
                    if let Some(from) = &from {
                        builder = builder.query(&[("from", from.as_str())]);
                    }
                    builder
                })
                .await?;
            events.extend(response.chunk);
            match response.next_batch {
                Some(next) if !next.is_empty() => from = Some(next),
                _ => break,
            }
        }
        Ok(events)
    }

    /// Uploads bytes to the media repository, returning the MXC URI.
    pub async fn upload_media(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        mime_type: &str,
    ) -> AppResult<String> {
        let url = self.media_url("upload");
        let mime_type = mime_type.to_owned();
        let response: UploadResponse = self
            .execute_json(RateLimitCategory::Message, move |http| {
                http.post(&url)
                    .query(&[("filename", filename)])
                    .header(reqwest::header::CONTENT_TYPE, mime_type.as_str())
                    .body(bytes.clone())
            })
            .await?;
        Ok(response.content_uri)
    }

    /// Downloads media, validating the URI shape, the size cap, and the
    /// returned MIME type (empty `required_mime_prefix` accepts anything).
    pub async fn download_file(
        &self,
        mxc_uri: &str,
        max_bytes: u64,
        required_mime_prefix: &str,
    ) -> AppResult<Vec<u8>> {
        let (server, media_id) = parse_mxc_uri(mxc_uri)?;
        let url = self.media_url(&format!(
            "download/{}/{}",
            Self::esc(&server),
            Self::esc(&media_id),
        ));
        let response = self
            .execute(RateLimitCategory::Message, |http| http.get(&url))
            .await?;

        if let Some(length) = response.content_length() {
            if length > max_bytes {
                return Err(MatrixError::invalid_param(format!(
                    "media {mxc_uri} is {length} bytes, cap is {max_bytes}"
                ))
                .into());
            }
        }
        if !required_mime_prefix.is_empty() {
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            if !content_type.starts_with(required_mime_prefix) {
                return Err(MatrixError::invalid_param(format!(
                    "media {mxc_uri} has type {content_type}, wanted {required_mime_prefix}*"
                ))
                .into());
            }
        }
        let bytes = response.bytes().await?;
        if bytes.len() as u64 > max_bytes {
            return Err(MatrixError::invalid_param(format!(
                "media {mxc_uri} exceeded the {max_bytes} byte cap"
            ))
            .into());
        }
        Ok(bytes.to_vec())
    }

    /// Registers the ghost for a Mattermost user under the reserved
    /// localpart prefix. Registration racing an existing account counts as
    /// success; display-name and avatar sub-steps are applied best-effort so
    /// a usable ghost is returned whenever the account exists.
    pub async fn create_ghost_user(
        &self,
        mm_user_id: &str,
        display_name: Option<&str>,
        avatar: Option<(Vec<u8>, String)>,
    ) -> AppResult<GhostUser> {
        let localpart = self.config.ghost_localpart(mm_user_id);
        let user_id = self.config.ghost_user_id(mm_user_id);
        let url = self.client_url("register");
        let body = json!({
            "type": "m.login.application_service",
            "username": localpart,
        });
        let result = self
            .execute(RateLimitCategory::Registration, |http| http.post(&url).json(&body))
            .await;
        match result {
            Ok(_) => info!(user_id = %user_id, "registered ghost user"),
            Err(AppError::Matrix(e)) if e.is_user_in_use() => {
                debug!(user_id = %user_id, "ghost user already registered");
            }
            Err(e) => return Err(e),
        }

        let ghost = GhostUser {
            user_id,
            display_name: display_name.map(ToOwned::to_owned),
        };
        if let Some(name) = display_name {
            if let Err(e) = self.set_display_name(&ghost.user_id, name).await {
                warn!(user_id = %ghost.user_id, error = %e, "setting ghost display name failed");
            }
        }
        if let Some((bytes, mime_type)) = avatar {
            if let Err(e) = self
                .update_ghost_user_avatar(&ghost.user_id, bytes, &mime_type)
                .await
            {
                warn!(user_id = %ghost.user_id, error = %e, "setting ghost avatar failed");
            }
        }
        Ok(ghost)
    }

    pub async fn set_display_name(&self, user_id: &str, display_name: &str) -> AppResult<()> {
        let url = self.client_url(&format!("profile/{}/displayname", Self::esc(user_id)));
        self.execute(RateLimitCategory::Registration, |http| {
            http.put(&url)
                .query(&[("user_id", user_id)])
                .json(&json!({"displayname": display_name}))
        })
        .await?;
        Ok(())
    }

    pub async fn set_avatar_url(&self, user_id: &str, avatar_url: &str) -> AppResult<()> {
        let url = self.client_url(&format!("profile/{}/avatar_url", Self::esc(user_id)));
        self.execute(RateLimitCategory::Registration, |http| {
            http.put(&url)
                .query(&[("user_id", user_id)])
                .json(&json!({"avatar_url": avatar_url}))
        })
        .await?;
        Ok(())
    }

    pub async fn update_ghost_user_avatar(
        &self,
        user_id: &str,
        image: Vec<u8>,
        mime_type: &str,
    ) -> AppResult<()> {
        let mxc_uri = self.upload_media(image, "avatar", mime_type).await?;
        self.set_avatar_url(user_id, &mxc_uri).await
    }

    pub async fn get_profile(&self, user_id: &str) -> AppResult<ProfileResponse> {
        let url = self.client_url(&format!("profile/{}", Self::esc(user_id)));
        self.execute_json(RateLimitCategory::Registration, |http| http.get(&url))
            .await
    }

    /// `whoami` as the application service; backs the health ping.
    pub async fn test_connection(&self) -> AppResult<String> {
        let url = self.client_url("account/whoami");
        let response: WhoamiResponse = self
            .execute_json(RateLimitCategory::Registration, |http| http.get(&url))
            .await?;
        Ok(response.user_id)
    }
}

fn text_message_content(request: &SendMessageRequest, remote_id: &str) -> JsonValue {
    let mut content = json!({
        "msgtype": "m.text",
        "body": request.message,
        KEY_MATTERMOST_REMOTE_ID: remote_id,
    });
    if let Some(post_id) = &request.post_id {
        content[KEY_MATTERMOST_POST_ID] = json!(post_id);
    }
    if let Some(html) = &request.html_message {
        content["format"] = json!("org.matrix.custom.html");
        content["formatted_body"] = json!(html);
    }
    if !request.mention_user_ids.is_empty() {
        content["m.mentions"] = json!({"user_ids": request.mention_user_ids});
    }
    if let Some(root) = &request.root_event_id {
        content["m.relates_to"] = json!({"rel_type": REL_THREAD, "event_id": root});
    }
    content
}

fn file_message_content(
    file: &PendingFile,
    post_id: Option<&str>,
    remote_id: &str,
    primary_event_id: Option<&str>,
    root_event_id: Option<&str>,
) -> JsonValue {
    let mut content = json!({
        "msgtype": msgtype_for_mime(&file.mime_type),
        "body": file.filename,
        "url": file.mxc_uri,
        "info": {"mimetype": file.mime_type, "size": file.size},
        KEY_MATTERMOST_REMOTE_ID: remote_id,
    });
    if let Some(post_id) = post_id {
        content[KEY_MATTERMOST_POST_ID] = json!(post_id);
    }
    if let Some(primary) = primary_event_id {
        content["m.relates_to"] = json!({"rel_type": REL_MATTERMOST_POST, "event_id": primary});
    } else if let Some(root) = root_event_id {
        content["m.relates_to"] = json!({"rel_type": REL_THREAD, "event_id": root});
    }
    content
}

fn file_metadata_content(primary_event_id: &str, files: &[(String, &PendingFile)]) -> JsonValue {
    json!({
        "m.relates_to": {"rel_type": REL_MATTERMOST_POST, "event_id": primary_event_id},
        "file_event_ids": files.iter().map(|(id, _)| id.as_str()).collect::<Vec<_>>(),
        "files": files
            .iter()
            .map(|(id, f)| json!({"event_id": id, "file_id": f.file_id, "filename": f.filename}))
            .collect::<Vec<_>>(),
    })
}

fn edit_content(target_event_id: &str, body: &str, html_body: Option<&str>) -> JsonValue {
    let mut new_content = json!({"msgtype": "m.text", "body": body});
    let mut content = json!({
        "msgtype": "m.text",
        "body": format!(" * {body}"),
        "m.relates_to": {"rel_type": REL_REPLACE, "event_id": target_event_id},
    });
    if let Some(html) = html_body {
        new_content["format"] = json!("org.matrix.custom.html");
        new_content["formatted_body"] = json!(html);
        content["format"] = json!("org.matrix.custom.html");
        content["formatted_body"] = json!(format!(" * {html}"));
    }
    content["m.new_content"] = new_content;
    content
}

fn reaction_content(target_event_id: &str, emoji_key: &str) -> JsonValue {
    json!({
        "m.relates_to": {
            "rel_type": REL_ANNOTATION,
            "event_id": target_event_id,
            "key": emoji_key,
        },
    })
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use serde_json::json;

    use super::*;

    fn pending_file() -> PendingFile {
        PendingFile {
            file_id: "f1".into(),
            filename: "cat.png".into(),
            mxc_uri: "mxc://example.com/abc".into(),
            mime_type: "image/png".into(),
            size: 512,
            uploaded_at: Instant::now(),
        }
    }

    #[test]
    fn text_content_carries_loop_prevention_keys() {
        let request = SendMessageRequest {
            room_id: "!r:example.com".into(),
            ghost_user_id: "@_mattermost_u1:example.com".into(),
            message: "hello".into(),
            post_id: Some("p1".into()),
            ..Default::default()
        };
        let content = text_message_content(&request, "remote-1");
        assert_eq!(content["body"], json!("hello"));
        assert_eq!(content["mattermost_post_id"], json!("p1"));
        assert_eq!(content["mattermost_remote_id"], json!("remote-1"));
        assert!(content.get("format").is_none());
        assert!(content.get("m.relates_to").is_none());
    }

    #[test]
    fn text_content_attaches_mentions_and_thread() {
        let request = SendMessageRequest {
            message: "hi @alice".into(),
            html_message: Some("hi <a href=\"https://matrix.to/#/@alice:x\">@alice</a>".into()),
            root_event_id: Some("$root".into()),
            mention_user_ids: vec!["@alice:x".into()],
            ..Default::default()
        };
        let content = text_message_content(&request, "remote-1");
        assert_eq!(content["format"], json!("org.matrix.custom.html"));
        assert_eq!(content["m.mentions"]["user_ids"], json!(["@alice:x"]));
        assert_eq!(
            content["m.relates_to"],
            json!({"rel_type": "m.thread", "event_id": "$root"})
        );
    }

    #[test]
    fn file_content_relates_to_primary_event() {
        let file = pending_file();
        let content = file_message_content(&file, Some("p1"), "remote-1", Some("$text"), None);
        assert_eq!(content["msgtype"], json!("m.image"));
        assert_eq!(content["body"], json!("cat.png"));
        assert_eq!(
            content["m.relates_to"],
            json!({"rel_type": "m.mattermost.post", "event_id": "$text"})
        );
    }

    #[test]
    fn lone_file_joins_thread_directly() {
        let file = pending_file();
        let content = file_message_content(&file, None, "remote-1", None, Some("$root"));
        assert_eq!(
            content["m.relates_to"],
            json!({"rel_type": "m.thread", "event_id": "$root"})
        );
    }

    #[test]
    fn metadata_event_lists_file_events() {
        let file = pending_file();
        let entries = vec![("$file1".to_owned(), &file)];
        let content = file_metadata_content("$text", &entries);
        assert_eq!(content["file_event_ids"], json!(["$file1"]));
        assert_eq!(content["files"][0]["file_id"], json!("f1"));
        assert_eq!(
            content["m.relates_to"]["rel_type"],
            json!("m.mattermost.post")
        );
    }

    #[test]
    fn edit_content_uses_fallback_star_body() {
        let content = edit_content("$orig", "new text", Some("<b>new text</b>"));
        assert_eq!(content["body"], json!(" * new text"));
        assert_eq!(content["m.new_content"]["body"], json!("new text"));
        assert_eq!(
            content["m.new_content"]["formatted_body"],
            json!("<b>new text</b>")
        );
        assert_eq!(
            content["m.relates_to"],
            json!({"rel_type": "m.replace", "event_id": "$orig"})
        );
    }

    #[test]
    fn reaction_content_is_an_annotation() {
        let content = reaction_content("$target", "👍");
        assert_eq!(
            content["m.relates_to"],
            json!({"rel_type": "m.annotation", "event_id": "$target", "key": "👍"})
        );
    }
}
