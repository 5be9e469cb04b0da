use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use crate::config::BridgeConfig;
use crate::matrix::{MatrixClient, MatrixEvent, REL_MATTERMOST_POST};
use crate::mattermost::{MmApi, Post, Reaction, User};
use crate::store::{MappingStore, ReactionLink};
use crate::{AppResult, content, utils};

/// The MX→MM pipeline: consumes application-service transaction events one
/// at a time and mirrors them into Mattermost as remote users.
pub struct MatrixToMmBridge {
    pub(crate) matrix: Arc<MatrixClient>,
    pub(crate) mm: Arc<dyn MmApi>,
    pub(crate) store: Arc<dyn MappingStore>,
    pub(crate) config: Arc<BridgeConfig>,
}

impl MatrixToMmBridge {
    pub fn new(
        matrix: Arc<MatrixClient>,
        mm: Arc<dyn MmApi>,
        store: Arc<dyn MappingStore>,
        config: Arc<BridgeConfig>,
    ) -> Self {
        Self {
            matrix,
            mm,
            store,
            config,
        }
    }

    fn remote_id(&self) -> &str {
        &self.config.mattermost.remote_id
    }

    /// Dispatch with layered loop prevention: unmapped rooms, ghost
    /// senders, our own remote-id stamp, and already-existing posts are all
    /// dropped before any Mattermost write.
    pub async fn handle_event(&self, event: &MatrixEvent) -> AppResult<()> {
        let Some(channel_id) = self.store.channel_for_room(&event.room_id).await? else {
            debug!(room_id = %event.room_id, "event for unmapped room dropped");
            return Ok(());
        };
        if self.config.is_ghost_user(&event.sender) {
            debug!(sender = %event.sender, "ghost event dropped");
            return Ok(());
        }
        if event.mattermost_remote_id() == Some(self.remote_id()) {
            debug!(event_id = %event.event_id, "own remote event dropped");
            return Ok(());
        }
        if let Some(post_id) = event.mattermost_post_id() {
            if self.mm.get_post(post_id).await?.is_some() {
                debug!(post_id, "event for existing post dropped");
                return Ok(());
            }
        }

        match event.event_type.as_str() {
            "m.room.message" => {
                if event.is_edit() {
                    self.handle_edit(event).await
                } else if matches!(
                    event.msgtype(),
                    Some("m.image" | "m.file" | "m.video" | "m.audio")
                ) {
                    self.handle_file(&channel_id, event).await
                } else {
                    self.handle_message(&channel_id, event).await
                }
            }
            "m.reaction" => self.handle_reaction(&channel_id, event).await,
            "m.room.member" => self.handle_membership(&channel_id, event).await,
            "m.room.redaction" => self.handle_redaction(event).await,
            other => {
                trace!(event_type = other, "ignoring event type");
                Ok(())
            }
        }
    }

    /// Resolve the replaced event to its post and swap the message. An
    /// empty `m.new_content` body clears the message.
    async fn handle_edit(&self, event: &MatrixEvent) -> AppResult<()> {
        let Some(target_event_id) = event.relates_to_event_id() else {
            debug!(event_id = %event.event_id, "edit without target dropped");
            return Ok(());
        };
        let Some(post_id) = self.post_for_event_deep(&event.room_id, target_event_id).await?
        else {
            debug!(target_event_id, "edit target has no post, dropped");
            return Ok(());
        };
        let Some(mut post) = self.mm.get_post(&post_id).await? else {
            debug!(post_id = %post_id, "edited post no longer exists");
            return Ok(());
        };

        let new_content = event.new_content().cloned().unwrap_or(json!({}));
        let body = new_content.get("body").and_then(|v| v.as_str()).unwrap_or_default();
        let formatted = new_content
            .get("formatted_body")
            .and_then(|v| v.as_str());
        let format = new_content.get("format").and_then(|v| v.as_str());

        post.message = self.translate_inbound(body, formatted, format).await?;
        post.edit_at = event.origin_server_ts;
        self.mm.update_post(&post).await?;
        Ok(())
    }

    async fn handle_message(&self, channel_id: &str, event: &MatrixEvent) -> AppResult<()> {
        let body = event.body().unwrap_or_default();
        let message = self
            .translate_inbound(body, event.formatted_body(), event.format())
            .await?;
        let user = self.ensure_mm_user(channel_id, &event.sender).await?;
        let root_id = self.resolve_thread_root(event).await?;

        let post = self.build_post(channel_id, &user.id, message, root_id, event);
        let created = self.mm.create_post(&post).await?;
        if let Err(e) = self.store.set_post_for_event(&event.event_id, &created.id).await {
            warn!(event_id = %event.event_id, error = %e, "reverse post index write failed");
        }
        Ok(())
    }

    /// File messages become an empty post carrying one uploaded file.
    async fn handle_file(&self, channel_id: &str, event: &MatrixEvent) -> AppResult<()> {
        let Some(mxc_uri) = event.content_str("url") else {
            debug!(event_id = %event.event_id, "file message without url dropped");
            return Ok(());
        };
        let filename = event.body().unwrap_or("file");
        let data = self
            .matrix
            .download_file(mxc_uri, self.config.max_file_size, "")
            .await?;
        let user = self.ensure_mm_user(channel_id, &event.sender).await?;
        let file_info = self.mm.upload_file(channel_id, filename, data).await?;
        let root_id = self.resolve_thread_root(event).await?;

        let mut post = self.build_post(channel_id, &user.id, String::new(), root_id, event);
        post.file_ids = vec![file_info.id];
        let created = self.mm.create_post(&post).await?;
        if let Err(e) = self.store.set_post_for_event(&event.event_id, &created.id).await {
            warn!(event_id = %event.event_id, error = %e, "reverse post index write failed");
        }
        Ok(())
    }

    fn build_post(
        &self,
        channel_id: &str,
        user_id: &str,
        message: String,
        root_id: Option<String>,
        event: &MatrixEvent,
    ) -> Post {
        let mut post = Post {
            channel_id: channel_id.to_owned(),
            user_id: user_id.to_owned(),
            message,
            create_at: event.origin_server_ts,
            root_id: root_id.unwrap_or_default(),
            remote_id: Some(self.remote_id().to_owned()),
            ..Default::default()
        };
        post.set_prop(&self.config.event_id_prop_key(), json!(event.event_id));
        post.set_prop("from_matrix", json!(true));
        post
    }

    async fn handle_reaction(&self, channel_id: &str, event: &MatrixEvent) -> AppResult<()> {
        let Some(target_event_id) = event.relates_to_event_id() else {
            return Ok(());
        };
        let Some(key) = event
            .relates_to()
            .and_then(|r| r.get("key"))
            .and_then(|v| v.as_str())
        else {
            return Ok(());
        };
        let Some(post_id) = self.post_for_event_deep(&event.room_id, target_event_id).await?
        else {
            debug!(target_event_id, "reaction target has no post, dropped");
            return Ok(());
        };
        let user = self.ensure_mm_user(channel_id, &event.sender).await?;
        let emoji_name = content::matrix_emoji_to_mm(key);

        let reaction = Reaction {
            user_id: user.id.clone(),
            post_id: post_id.clone(),
            emoji_name: emoji_name.clone(),
            create_at: event.origin_server_ts,
            delete_at: 0,
            remote_id: Some(self.remote_id().to_owned()),
        };
        self.mm.add_reaction(&reaction).await?;

        let link = ReactionLink {
            post_id,
            user_id: user.id,
            emoji_name,
        };
        if let Err(e) = self.store.set_reaction_link(&event.event_id, &link).await {
            warn!(event_id = %event.event_id, error = %e, "reaction link write failed");
        }
        Ok(())
    }

    /// Joins ensure membership and opportunistically refresh the profile;
    /// leaves and bans remove the member.
    async fn handle_membership(&self, channel_id: &str, event: &MatrixEvent) -> AppResult<()> {
        let Some(membership) = event.membership() else {
            return Ok(());
        };
        let target = event.state_key.as_deref().unwrap_or(&event.sender);
        if self.config.is_ghost_user(target) {
            return Ok(());
        }
        match membership {
            "join" => match self.store.mm_user_for_matrix(target).await? {
                Some(mm_user_id) => {
                    self.ensure_memberships(channel_id, &mm_user_id).await?;
                    self.apply_profile_update(&mm_user_id, event).await?;
                    Ok(())
                }
                None => {
                    self.ensure_mm_user(channel_id, target).await?;
                    Ok(())
                }
            },
            "leave" | "ban" => {
                if let Some(mm_user_id) = self.store.mm_user_for_matrix(target).await? {
                    if let Err(e) = self.mm.delete_channel_member(channel_id, &mm_user_id).await {
                        if !e.is_mm_not_found() {
                            return Err(e);
                        }
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn apply_profile_update(&self, mm_user_id: &str, event: &MatrixEvent) -> AppResult<()> {
        let Ok(mut user) = self.mm.get_user(mm_user_id).await else {
            return Ok(());
        };
        let mut changed = false;
        if let Some(displayname) = event.content_str("displayname") {
            if !displayname.is_empty() && user.nickname != displayname {
                let (first, last) = utils::split_display_name(displayname);
                user.nickname = displayname.to_owned();
                user.first_name = first;
                user.last_name = last;
                changed = true;
            }
        }
        if changed {
            self.mm.update_user(&user).await?;
        }
        if let Some(avatar_url) = event.content_str("avatar_url") {
            if let Ok(bytes) = self
                .matrix
                .download_file(avatar_url, self.config.max_profile_image_size, "image/")
                .await
            {
                let current = self.mm.get_profile_image(mm_user_id).await.unwrap_or_default();
                if bytes != current {
                    if let Err(e) = self.mm.set_profile_image(mm_user_id, &bytes).await {
                        warn!(mm_user_id, error = %e, "updating profile image failed");
                    }
                }
            }
        }
        Ok(())
    }

    /// Redactions: learn the redacted event's type, then undo the reaction
    /// or delete the post. When the fetch fails (the event may be gone),
    /// probe the stores directly.
    async fn handle_redaction(&self, event: &MatrixEvent) -> AppResult<()> {
        let Some(redacted_id) = event
            .redacts
            .as_deref()
            .or_else(|| event.content_str("redacts"))
        else {
            return Ok(());
        };
        match self.matrix.get_event(&event.room_id, redacted_id).await {
            Ok(redacted) => match redacted.event_type.as_str() {
                "m.reaction" => self.undo_reaction(redacted_id).await,
                "m.room.message" => self.delete_post_of_event(redacted_id).await,
                other => {
                    trace!(event_type = other, "redaction of unhandled type ignored");
                    Ok(())
                }
            },
            Err(e) => {
                debug!(redacted_id, error = %e, "fetching redacted event failed, probing stores");
                if self.store.reaction_link(redacted_id).await?.is_some() {
                    return self.undo_reaction(redacted_id).await;
                }
                self.delete_post_of_event(redacted_id).await
            }
        }
    }

    async fn undo_reaction(&self, reaction_event_id: &str) -> AppResult<()> {
        let Some(link) = self.store.reaction_link(reaction_event_id).await? else {
            debug!(reaction_event_id, "redacted reaction has no stored link");
            return Ok(());
        };
        let reaction = Reaction {
            user_id: link.user_id,
            post_id: link.post_id,
            emoji_name: link.emoji_name,
            create_at: 0,
            delete_at: 0,
            remote_id: Some(self.remote_id().to_owned()),
        };
        self.mm.remove_reaction(&reaction).await?;
        if let Err(e) = self.store.delete_reaction_link(reaction_event_id).await {
            warn!(reaction_event_id, error = %e, "dropping reaction link failed");
        }
        Ok(())
    }

    async fn delete_post_of_event(&self, event_id: &str) -> AppResult<()> {
        let Some(post_id) = self.store.post_for_event(event_id).await? else {
            debug!(event_id, "redacted message has no mapped post");
            return Ok(());
        };
        self.mm.delete_post(&post_id).await?;
        if let Err(e) = self.store.delete_post_for_event(event_id).await {
            warn!(event_id, error = %e, "dropping reverse post index failed");
        }
        Ok(())
    }

    /// Event id → post id, following the file→primary indirection and the
    /// loop-prevention metadata on the event itself when the reverse index
    /// has no entry.
    async fn post_for_event_deep(
        &self,
        room_id: &str,
        event_id: &str,
    ) -> AppResult<Option<String>> {
        if let Some(post_id) = self.store.post_for_event(event_id).await? {
            return Ok(Some(post_id));
        }
        let Ok(event) = self.matrix.get_event(room_id, event_id).await else {
            return Ok(None);
        };
        if let Some(post_id) = event.mattermost_post_id() {
            return Ok(Some(post_id.to_owned()));
        }
        if event.rel_type() == Some(REL_MATTERMOST_POST) {
            if let Some(primary_event_id) = event.relates_to_event_id() {
                if let Some(post_id) = self.store.post_for_event(primary_event_id).await? {
                    return Ok(Some(post_id));
                }
                if let Ok(primary) = self.matrix.get_event(room_id, primary_event_id).await {
                    if let Some(post_id) = primary.mattermost_post_id() {
                        return Ok(Some(post_id.to_owned()));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Reply/thread target → Mattermost root post id, via the reverse index
    /// (or file→primary indirection), then the true-root resolver.
    async fn resolve_thread_root(&self, event: &MatrixEvent) -> AppResult<Option<String>> {
        let Some(parent_event_id) = event.reply_to_event_id() else {
            return Ok(None);
        };
        let Some(candidate) = self.post_for_event_deep(&event.room_id, parent_event_id).await?
        else {
            debug!(parent_event_id, "reply parent has no post, sending unthreaded");
            return Ok(None);
        };
        Ok(Some(self.true_root(&candidate).await?))
    }

    /// A reply to a mid-thread post threads under that post's own root.
    async fn true_root(&self, candidate_post_id: &str) -> AppResult<String> {
        match self.mm.get_post(candidate_post_id).await? {
            Some(post) if !post.root_id.is_empty() => Ok(post.root_id),
            _ => Ok(candidate_post_id.to_owned()),
        }
    }

    /// Pill rewriting needs store lookups, so ids are collected first and
    /// resolved before the synchronous rewrite.
    async fn translate_inbound(
        &self,
        body: &str,
        formatted_body: Option<&str>,
        format: Option<&str>,
    ) -> AppResult<String> {
        let rewritten = match formatted_body {
            Some(formatted) => {
                let mut usernames: HashMap<String, String> = HashMap::new();
                for mx_user_id in content::extract_pill_user_ids(formatted) {
                    if let Some(username) = self.mm_username_for(&mx_user_id).await? {
                        usernames.insert(mx_user_id, username);
                    }
                }
                Some(content::rewrite_pills_to_usernames(formatted, |id| {
                    usernames.get(id).cloned()
                }))
            }
            None => None,
        };
        Ok(content::event_text_to_markdown(
            body,
            rewritten.as_deref(),
            format,
        ))
    }

    /// Pill target → Mattermost username, directly or by decoding the ghost
    /// pattern.
    async fn mm_username_for(&self, mx_user_id: &str) -> AppResult<Option<String>> {
        if let Some(mm_user_id) = self.store.mm_user_for_matrix(mx_user_id).await? {
            if let Ok(user) = self.mm.get_user(&mm_user_id).await {
                return Ok(Some(user.username));
            }
        }
        if let Some(mm_user_id) = self.config.decode_ghost_user_id(mx_user_id) {
            if let Ok(user) = self.mm.get_user(&mm_user_id).await {
                return Ok(Some(user.username));
            }
        }
        Ok(None)
    }

    /// The remote user for a Matrix sender, created on first contact with
    /// profile, avatar, mapping, and team/channel membership.
    pub(crate) async fn ensure_mm_user(
        &self,
        channel_id: &str,
        mx_user_id: &str,
    ) -> AppResult<User> {
        if let Some(mm_user_id) = self.store.mm_user_for_matrix(mx_user_id).await? {
            let user = self.mm.get_user(&mm_user_id).await?;
            self.ensure_memberships(channel_id, &user.id).await?;
            return Ok(user);
        }

        let profile = self.matrix.get_profile(mx_user_id).await.unwrap_or_default();
        let localpart = mx_user_id
            .trim_start_matches('@')
            .split(':')
            .next()
            .unwrap_or_default();
        let display = profile
            .displayname
            .clone()
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| localpart.to_owned());
        let (first_name, last_name) = utils::split_display_name(&display);
        let username = self.unique_username(&self.config.mm_username(localpart)).await?;

        let user = User {
            id: String::new(),
            username: username.clone(),
            email: format!(
                "{}@{}",
                username.replace(':', "_"),
                self.config.server_name()
            ),
            nickname: display,
            first_name,
            last_name,
            remote_id: Some(self.remote_id().to_owned()),
            delete_at: 0,
        };
        let created = self.mm.create_user(&user).await?;
        info!(mx_user_id, mm_user_id = %created.id, username, "created remote user");

        if let Some(avatar_url) = &profile.avatar_url {
            match self
                .matrix
                .download_file(avatar_url, self.config.max_profile_image_size, "image/")
                .await
            {
                Ok(bytes) => {
                    if let Err(e) = self.mm.set_profile_image(&created.id, &bytes).await {
                        warn!(mm_user_id = %created.id, error = %e, "setting avatar failed");
                    }
                }
                Err(e) => debug!(mx_user_id, error = %e, "avatar download failed"),
            }
        }

        self.store.set_user_pair(&created.id, mx_user_id).await?;
        self.ensure_memberships(channel_id, &created.id).await?;
        Ok(created)
    }

    async fn ensure_memberships(&self, channel_id: &str, mm_user_id: &str) -> AppResult<()> {
        let channel = self.mm.get_channel(channel_id).await?;
        if !channel.team_id.is_empty()
            && self
                .mm
                .get_team_member(&channel.team_id, mm_user_id)
                .await?
                .is_none()
        {
            self.mm.create_team_member(&channel.team_id, mm_user_id).await?;
        }
        if self
            .mm
            .get_channel_member(channel_id, mm_user_id)
            .await?
            .is_none()
        {
            self.mm.add_channel_member(channel_id, mm_user_id).await?;
        }
        Ok(())
    }

    /// Suffixes `-1`, `-2`, ... until the username is free.
    async fn unique_username(&self, base: &str) -> AppResult<String> {
        if self.mm.get_user_by_username(base).await?.is_none() {
            return Ok(base.to_owned());
        }
        for suffix in 1..100 {
            let candidate = format!("{base}-{suffix}");
            if self.mm.get_user_by_username(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
        Ok(format!("{base}-{}", utils::random_string(6).to_lowercase()))
    }
}
