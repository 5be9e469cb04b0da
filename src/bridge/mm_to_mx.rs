use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::json;

use crate::config::BridgeConfig;
use crate::matrix::{
    GhostUser, MatrixClient, MatrixEvent, REL_MATTERMOST_POST, SendMessageRequest,
};
use crate::mattermost::{FileInfo, MmApi, Post, Reaction, SyncBatch, User};
use crate::store::MappingStore;
use crate::trackers::{PendingFile, PendingFileTracker, RecentPostTracker};
use crate::{AppResult, MatrixError, content};

/// The MM→MX pipeline: consumes host-pushed sync batches and mirrors them
/// onto the homeserver through ghost users.
pub struct MmToMatrixBridge {
    pub(crate) matrix: Arc<MatrixClient>,
    pub(crate) mm: Arc<dyn MmApi>,
    pub(crate) store: Arc<dyn MappingStore>,
    pub(crate) recent_posts: Arc<RecentPostTracker>,
    pub(crate) pending_files: Arc<PendingFileTracker>,
    pub(crate) config: Arc<BridgeConfig>,
}

impl MmToMatrixBridge {
    pub fn new(
        matrix: Arc<MatrixClient>,
        mm: Arc<dyn MmApi>,
        store: Arc<dyn MappingStore>,
        recent_posts: Arc<RecentPostTracker>,
        pending_files: Arc<PendingFileTracker>,
        config: Arc<BridgeConfig>,
    ) -> Self {
        Self {
            matrix,
            mm,
            store,
            recent_posts,
            pending_files,
            config,
        }
    }

    fn remote_id(&self) -> &str {
        &self.config.mattermost.remote_id
    }

    /// One host delivery: users, then posts, then reactions. Per-item errors
    /// are logged and the batch continues.
    pub async fn on_sync_batch(&self, batch: &SyncBatch) -> AppResult<()> {
        if !self.config.enable_sync {
            return Ok(());
        }
        for user in &batch.users {
            if let Err(e) = self.handle_user(&batch.channel_id, user).await {
                error!(user_id = %user.id, error = %e, "syncing user failed");
            }
        }
        for post in &batch.posts {
            if let Err(e) = self.handle_post(&batch.channel_id, post).await {
                error!(post_id = %post.id, error = %e, "syncing post failed");
            }
        }
        for reaction in &batch.reactions {
            if let Err(e) = self.handle_reaction(reaction).await {
                error!(post_id = %reaction.post_id, error = %e, "syncing reaction failed");
            }
        }
        Ok(())
    }

    /// Shared-channel users carrying our own remote id are Matrix users
    /// represented locally; their original identity gets invited instead of
    /// a ghost. Local users get their ghost display name refreshed.
    async fn handle_user(&self, channel_id: &str, user: &User) -> AppResult<()> {
        if user.remote_id.as_deref() == Some(self.remote_id()) {
            let Some(mx_user_id) = self.store.matrix_user_for_mm(&user.id).await? else {
                debug!(user_id = %user.id, "remote user has no matrix identity");
                return Ok(());
            };
            let Some(room_identifier) = self.store.room_for_channel(channel_id).await? else {
                return Ok(());
            };
            let room_id = self.resolve_room(channel_id, &room_identifier).await?;
            if let Err(e) = self.matrix.invite_user_to_room(&room_id, &mx_user_id).await {
                debug!(user_id = %mx_user_id, room_id, error = %e, "inviting remote user failed");
            }
            return Ok(());
        }
        if let Some(ghost_id) = self.store.ghost_for_user(&user.id).await? {
            if let Err(e) = self
                .matrix
                .set_display_name(&ghost_id, &user.display_name())
                .await
            {
                warn!(ghost_id, error = %e, "refreshing ghost display name failed");
            }
        }
        Ok(())
    }

    pub async fn handle_post(&self, channel_id: &str, post: &Post) -> AppResult<()> {
        // Posts we wrote ourselves come straight back through the host.
        if post.remote_id.as_deref() == Some(self.remote_id()) && post.delete_at == 0 {
            debug!(post_id = %post.id, "skipping own remote post");
            return Ok(());
        }
        if post.delete_at != 0 {
            return self.delete_post_event(post).await;
        }

        let Some(room_identifier) = self.room_for_channel_or_create_dm(channel_id, post).await?
        else {
            return Ok(());
        };
        let room_id = self.resolve_room(channel_id, &room_identifier).await?;

        let prop_key = self.config.event_id_prop_key();
        if let Some(event_id) = post.prop_str(&prop_key) {
            if self.recent_posts.matches_and_remove(&post.id, post.update_at) {
                debug!(post_id = %post.id, "dropping self-edit from event id write-back");
                return Ok(());
            }
            let event_id = event_id.to_owned();
            return self.edit_post_event(&room_id, &event_id, post).await;
        }
        self.create_post_event(&room_id, post).await
    }

    /// Resolves the stored identifier to a room id and, when the mapping is
    /// alias-keyed, notes the id-keyed reverse entry for the inbound side.
    async fn resolve_room(&self, channel_id: &str, room_identifier: &str) -> AppResult<String> {
        let room_id = self.matrix.resolve_room_alias(room_identifier).await?;
        if room_id != room_identifier {
            if let Err(e) = self.store.note_room_for_channel(&room_id, channel_id).await {
                warn!(room_id, channel_id, error = %e, "noting room id mapping failed");
            }
        }
        Ok(room_id)
    }

    async fn room_for_channel_or_create_dm(
        &self,
        channel_id: &str,
        post: &Post,
    ) -> AppResult<Option<String>> {
        if let Some(identifier) = self.store.room_for_channel(channel_id).await? {
            return Ok(Some(identifier));
        }
        let Some(member_ids) = super::dm::direct_channel_members(self.mm.as_ref(), channel_id).await?
        else {
            info!(channel_id, "channel is not mapped to any matrix room, skipping");
            return Ok(None);
        };
        let room_id = self.create_dm_room(channel_id, post, &member_ids).await?;
        Ok(Some(room_id))
    }

    async fn create_post_event(&self, room_id: &str, post: &Post) -> AppResult<()> {
        let ghost = self.ensure_ghost(&post.user_id).await?;
        self.ensure_ghost_joined(&post.user_id, &ghost.user_id, room_id)
            .await?;

        let (message, html_message, mention_user_ids) =
            self.translate_outbound(&post.message).await;
        let files = self.pending_files.take_files(&post.id);
        let root_event_id = self.root_event_for(post).await?;

        let request = SendMessageRequest {
            room_id: room_id.to_owned(),
            ghost_user_id: ghost.user_id.clone(),
            message,
            html_message,
            root_event_id,
            post_id: Some(post.id.clone()),
            files,
            mention_user_ids,
        };
        let response = self.matrix.send_message(&request).await?;

        // Forward index: the event id lands on the post property. The write
        // back triggers a host edit event, which the tracker entry absorbs.
        let prop_key = self.config.event_id_prop_key();
        let mut updated = post.clone();
        updated.set_prop(&prop_key, json!(response.event_id));
        match self.mm.update_post(&updated).await {
            Ok(saved) => {
                if let Err(e) = self.recent_posts.put(&post.id, saved.update_at) {
                    warn!(post_id = %post.id, error = %e, "recent post tracker rejected entry");
                }
            }
            Err(e) => warn!(post_id = %post.id, error = %e, "writing event id back failed"),
        }
        if let Err(e) = self.store.set_post_for_event(&response.event_id, &post.id).await {
            warn!(event_id = %response.event_id, error = %e, "reverse post index write failed");
        }
        Ok(())
    }

    /// Thread root: the Matrix event id stored on the MM root post, when
    /// that post has been bridged. An unknown root degrades to an unthreaded
    /// message.
    async fn root_event_for(&self, post: &Post) -> AppResult<Option<String>> {
        if post.root_id.is_empty() {
            return Ok(None);
        }
        let prop_key = self.config.event_id_prop_key();
        match self.mm.get_post(&post.root_id).await? {
            Some(root_post) => Ok(root_post.prop_str(&prop_key).map(ToOwned::to_owned)),
            None => Ok(None),
        }
    }

    async fn edit_post_event(&self, room_id: &str, event_id: &str, post: &Post) -> AppResult<()> {
        let ghost = self.ensure_ghost(&post.user_id).await?;
        self.ensure_ghost_joined(&post.user_id, &ghost.user_id, room_id)
            .await?;

        let (message, html_message, _) = self.translate_outbound(&post.message).await;

        let mut filenames: Vec<String> = self
            .pending_files
            .take_files(&post.id)
            .into_iter()
            .map(|f| f.filename)
            .collect();
        if filenames.is_empty() {
            for file_id in &post.file_ids {
                match self.mm.get_file_info(file_id).await {
                    Ok(info) => filenames.push(info.name),
                    Err(e) => debug!(file_id, error = %e, "file info lookup failed"),
                }
            }
        }

        match self.matrix.get_event(room_id, event_id).await {
            Ok(current) => {
                if edit_is_redundant(&current, &message, html_message.as_deref(), &filenames) {
                    debug!(post_id = %post.id, "edit matches current event, skipping");
                    return Ok(());
                }
            }
            Err(e) => debug!(event_id, error = %e, "fetching current event failed, editing anyway"),
        }

        self.matrix
            .edit_message_as_ghost(room_id, event_id, &message, html_message.as_deref(), &ghost.user_id)
            .await?;
        Ok(())
    }

    /// Deletion: redact the file replies hanging off the main event, then
    /// the main event itself.
    async fn delete_post_event(&self, post: &Post) -> AppResult<()> {
        let prop_key = self.config.event_id_prop_key();
        let Some(event_id) = post.prop_str(&prop_key) else {
            debug!(post_id = %post.id, "deleted post was never bridged");
            return Ok(());
        };
        let Some(ghost_id) = self.store.ghost_for_user(&post.user_id).await? else {
            debug!(post_id = %post.id, "deleted post's sender has no ghost");
            return Ok(());
        };
        let Some(room_identifier) = self.store.room_for_channel(&post.channel_id).await? else {
            debug!(post_id = %post.id, "deleted post's channel is not mapped");
            return Ok(());
        };
        let room_id = self.resolve_room(&post.channel_id, &room_identifier).await?;

        match self
            .matrix
            .get_event_relations_as_user(&room_id, event_id, &ghost_id)
            .await
        {
            Ok(related) => {
                for rel in related {
                    if rel.event_type == "m.room.message"
                        && rel.rel_type() == Some(REL_MATTERMOST_POST)
                    {
                        if let Err(e) = self
                            .matrix
                            .redact_event_as_ghost(&room_id, &rel.event_id, &ghost_id)
                            .await
                        {
                            warn!(event_id = %rel.event_id, error = %e, "redacting file reply failed");
                        }
                    }
                }
            }
            Err(e) => debug!(event_id, error = %e, "listing relations for delete failed"),
        }

        self.matrix
            .redact_event_as_ghost(&room_id, event_id, &ghost_id)
            .await?;
        if let Err(e) = self.store.delete_post_for_event(event_id).await {
            warn!(event_id, error = %e, "dropping reverse post index failed");
        }
        Ok(())
    }

    async fn handle_reaction(&self, reaction: &Reaction) -> AppResult<()> {
        if reaction.remote_id.as_deref() == Some(self.remote_id()) {
            debug!(post_id = %reaction.post_id, "skipping own remote reaction");
            return Ok(());
        }
        let Some(post) = self.mm.get_post(&reaction.post_id).await? else {
            debug!(post_id = %reaction.post_id, "reaction target post not found");
            return Ok(());
        };
        let prop_key = self.config.event_id_prop_key();
        let Some(event_id) = post.prop_str(&prop_key).map(ToOwned::to_owned) else {
            debug!(post_id = %post.id, "reaction target was never bridged");
            return Ok(());
        };
        let Some(room_identifier) = self.store.room_for_channel(&post.channel_id).await? else {
            return Ok(());
        };
        let room_id = self.resolve_room(&post.channel_id, &room_identifier).await?;

        let ghost = self.ensure_ghost(&reaction.user_id).await?;
        self.ensure_ghost_joined(&reaction.user_id, &ghost.user_id, &room_id)
            .await?;
        let emoji_key = content::mm_emoji_to_matrix(&reaction.emoji_name);

        if reaction.delete_at != 0 {
            return self
                .remove_reaction_event(&room_id, &event_id, &emoji_key, &ghost.user_id)
                .await;
        }
        self.matrix
            .send_reaction_as_ghost(&room_id, &event_id, &emoji_key, &ghost.user_id)
            .await?;
        Ok(())
    }

    /// Removal scans the target's relations for this ghost's annotation with
    /// the same key and redacts the first match.
    async fn remove_reaction_event(
        &self,
        room_id: &str,
        target_event_id: &str,
        emoji_key: &str,
        ghost_id: &str,
    ) -> AppResult<()> {
        let relations = self
            .matrix
            .get_event_relations_as_user(room_id, target_event_id, ghost_id)
            .await?;
        let reaction_event = relations.iter().find(|rel| {
            rel.event_type == "m.reaction"
                && rel.sender == ghost_id
                && rel
                    .relates_to()
                    .and_then(|r| r.get("key"))
                    .and_then(|v| v.as_str())
                    == Some(emoji_key)
        });
        match reaction_event {
            Some(rel) => {
                self.matrix
                    .redact_event_as_ghost(room_id, &rel.event_id, ghost_id)
                    .await
            }
            None => {
                debug!(target_event_id, emoji_key, "no matching reaction event to remove");
                Ok(())
            }
        }
    }

    /// Attachment upload or deletion ahead of (or after) its post.
    pub async fn on_attachment(&self, file_info: &FileInfo, post: &Post) -> AppResult<()> {
        if !self.config.enable_sync {
            return Ok(());
        }
        if file_info.delete_at != 0 {
            return self.remove_attachment(file_info, post).await;
        }
        let data = self.mm.get_file(&file_info.id).await?;
        if data.len() as u64 > self.config.max_file_size {
            return Err(MatrixError::invalid_param(format!(
                "attachment {} is {} bytes, cap is {}",
                file_info.id,
                data.len(),
                self.config.max_file_size
            ))
            .into());
        }
        let mxc_uri = self
            .matrix
            .upload_media(data, &file_info.name, &file_info.mime_type)
            .await?;
        self.pending_files.add_file(
            &post.id,
            PendingFile {
                file_id: file_info.id.clone(),
                filename: file_info.name.clone(),
                mxc_uri,
                mime_type: file_info.mime_type.clone(),
                size: file_info.size,
                uploaded_at: Instant::now(),
            },
        );
        Ok(())
    }

    async fn remove_attachment(&self, file_info: &FileInfo, post: &Post) -> AppResult<()> {
        // Not yet attached: forgetting the pending entry is the whole job.
        if self.pending_files.remove_file(&post.id, &file_info.id) {
            return Ok(());
        }
        let prop_key = self.config.event_id_prop_key();
        let Some(event_id) = post.prop_str(&prop_key) else {
            debug!(file_id = %file_info.id, "deleted file's post was never bridged");
            return Ok(());
        };
        let Some(ghost_id) = self.store.ghost_for_user(&post.user_id).await? else {
            return Ok(());
        };
        let Some(room_identifier) = self.store.room_for_channel(&post.channel_id).await? else {
            return Ok(());
        };
        let room_id = self.resolve_room(&post.channel_id, &room_identifier).await?;

        let relations = self
            .matrix
            .get_event_relations_as_user(&room_id, event_id, &ghost_id)
            .await?;
        for rel in relations {
            if rel.event_type != crate::matrix::EVENT_TYPE_FILE_METADATA {
                continue;
            }
            let Some(entries) = rel.content.get("files").and_then(|v| v.as_array()) else {
                continue;
            };
            for entry in entries {
                let entry_file_id = entry.get("file_id").and_then(|v| v.as_str());
                let entry_event_id = entry.get("event_id").and_then(|v| v.as_str());
                if entry_file_id == Some(file_info.id.as_str()) {
                    if let Some(file_event_id) = entry_event_id {
                        return self
                            .matrix
                            .redact_event_as_ghost(&room_id, file_event_id, &ghost_id)
                            .await;
                    }
                }
            }
        }
        debug!(file_id = %file_info.id, "no file event found for deleted attachment");
        Ok(())
    }

    pub async fn on_profile_image(&self, user: &User) -> AppResult<()> {
        if !self.config.enable_sync {
            return Ok(());
        }
        let ghost = self.ensure_ghost(&user.id).await?;
        let image = self.mm.get_profile_image(&user.id).await?;
        if image.is_empty() {
            return Ok(());
        }
        self.matrix
            .update_ghost_user_avatar(&ghost.user_id, image, "image/png")
            .await
    }

    pub async fn on_health_ping(&self) -> bool {
        self.matrix.test_connection().await.is_ok()
    }

    pub(crate) async fn ensure_ghost(&self, mm_user_id: &str) -> AppResult<GhostUser> {
        if let Some(ghost_id) = self.store.ghost_for_user(mm_user_id).await? {
            return Ok(GhostUser {
                user_id: ghost_id,
                display_name: None,
            });
        }
        let user = self.mm.get_user(mm_user_id).await?;
        let avatar = match self.mm.get_profile_image(mm_user_id).await {
            Ok(bytes) if !bytes.is_empty() => Some((bytes, "image/png".to_owned())),
            _ => None,
        };
        let ghost = self
            .matrix
            .create_ghost_user(mm_user_id, Some(&user.display_name()), avatar)
            .await?;
        self.store.set_ghost_user(mm_user_id, &ghost.user_id).await?;
        if let Err(e) = self.store.set_user_pair(mm_user_id, &ghost.user_id).await {
            warn!(mm_user_id, error = %e, "ghost user pair write failed");
        }
        Ok(ghost)
    }

    async fn ensure_ghost_joined(
        &self,
        mm_user_id: &str,
        ghost_id: &str,
        room_id: &str,
    ) -> AppResult<()> {
        if self.store.is_ghost_in_room(mm_user_id, room_id).await? {
            return Ok(());
        }
        self.matrix.invite_and_join_ghost_user(room_id, ghost_id).await?;
        self.store.mark_ghost_in_room(mm_user_id, room_id).await?;
        Ok(())
    }

    /// Markdown → HTML plus mention handling. Mention resolution failures
    /// leave the token as plain text, so this never fails the post.
    async fn translate_outbound(&self, message: &str) -> (String, Option<String>, Vec<String>) {
        let mut html = content::markdown_to_html(message);
        let mut resolved: HashMap<String, (String, String)> = HashMap::new();
        let mut mention_user_ids = vec![];
        for name in content::extract_mentions(message) {
            if content::is_channel_mention(&name) {
                continue;
            }
            if let Some((mx_user_id, display)) = self.resolve_mention(&name).await {
                mention_user_ids.push(mx_user_id.clone());
                resolved.insert(name, (mx_user_id, display));
            }
        }
        if !resolved.is_empty() {
            html = content::replace_mentions_with_pills(&html, &resolved);
        }
        let html_message = (html != content::escape_html(message)).then_some(html);
        (message.to_owned(), html_message, mention_user_ids)
    }

    /// `@name` → Matrix id: an existing ghost, a remote user's original
    /// identity, or a freshly created ghost.
    async fn resolve_mention(&self, name: &str) -> Option<(String, String)> {
        let user = self.mm.get_user_by_username(name).await.ok().flatten()?;
        let display = user.display_name();
        if let Ok(Some(ghost_id)) = self.store.ghost_for_user(&user.id).await {
            return Some((ghost_id, display));
        }
        if user.remote_id.is_some() {
            if let Ok(Some(mx_user_id)) = self.store.matrix_user_for_mm(&user.id).await {
                return Some((mx_user_id, display));
            }
        }
        match self.ensure_ghost(&user.id).await {
            Ok(ghost) => Some((ghost.user_id, display)),
            Err(e) => {
                warn!(username = name, error = %e, "creating ghost for mention failed");
                None
            }
        }
    }
}

/// An edit whose text and attachments match the current event is the echo
/// of our own write-back (or a no-op) and must not go out again.
pub(crate) fn edit_is_redundant(
    current: &MatrixEvent,
    body: &str,
    html: Option<&str>,
    filenames: &[String],
) -> bool {
    let current_body = current.body().unwrap_or_default();
    if body.is_empty() && filenames.iter().any(|f| f == current_body) {
        return true;
    }
    current_body == body && current.formatted_body() == html
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::test_config;
    use crate::matrix::RateLimitMode;
    use crate::mattermost::testing::TestMmApi;
    use crate::mattermost::{Channel, ChannelType};
    use crate::store::MemoryStore;

    fn bridge_with(mm: Arc<TestMmApi>, store: Arc<MemoryStore>) -> MmToMatrixBridge {
        let mut config = test_config();
        config.rate_limit_mode = RateLimitMode::Disabled;
        let config = Arc::new(config);
        MmToMatrixBridge::new(
            Arc::new(MatrixClient::new(config.clone()).unwrap()),
            mm,
            store,
            Arc::new(RecentPostTracker::new(100)),
            Arc::new(PendingFileTracker::new()),
            config,
        )
    }

    fn post(id: &str, channel: &str, user: &str, message: &str) -> Post {
        Post {
            id: id.into(),
            channel_id: channel.into(),
            user_id: user.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn unmapped_public_channel_is_skipped() {
        let mm = Arc::new(TestMmApi::new());
        mm.insert_channel(Channel {
            id: "c1".into(),
            channel_type: ChannelType::Open,
            ..Default::default()
        });
        let bridge = bridge_with(mm.clone(), Arc::new(MemoryStore::new()));

        bridge
            .handle_post("c1", &post("p1", "c1", "u1", "hello"))
            .await
            .unwrap();
        assert!(mm.recorded_calls().is_empty());
    }

    #[tokio::test]
    async fn own_remote_posts_are_dropped_early() {
        let mm = Arc::new(TestMmApi::new());
        let bridge = bridge_with(mm.clone(), Arc::new(MemoryStore::new()));

        let mut p = post("p1", "c1", "u1", "hello");
        p.remote_id = Some("bridge-remote-id".into());
        bridge.handle_post("c1", &p).await.unwrap();
        assert!(mm.recorded_calls().is_empty());
    }

    #[tokio::test]
    async fn write_back_edit_is_absorbed_by_tracker() {
        let mm = Arc::new(TestMmApi::new());
        let store = Arc::new(MemoryStore::new());
        store.set_channel_room("c1", "!room:matrix.example.com").await.unwrap();
        let bridge = bridge_with(mm.clone(), store);

        let mut p = post("p2", "c1", "u1", "hello");
        p.set_prop("matrix_event_id_matrix_example_com", json!("$e2"));
        p.update_at = 5000;
        bridge.recent_posts.put("p2", 5000).unwrap();

        bridge.handle_post("c1", &p).await.unwrap();
        // Exactly zero Mattermost writes and the tracker entry is consumed.
        assert!(mm.recorded_calls().is_empty());
        assert!(bridge.recent_posts.is_empty());
    }

    #[tokio::test]
    async fn deleting_an_unbridged_post_is_a_noop() {
        let mm = Arc::new(TestMmApi::new());
        let bridge = bridge_with(mm.clone(), Arc::new(MemoryStore::new()));

        let mut p = post("p3", "c1", "u1", "gone");
        p.delete_at = 123;
        bridge.handle_post("c1", &p).await.unwrap();
        assert!(mm.recorded_calls().is_empty());
    }

    #[tokio::test]
    async fn deleted_pending_attachment_is_forgotten_locally() {
        let mm = Arc::new(TestMmApi::new());
        let bridge = bridge_with(mm.clone(), Arc::new(MemoryStore::new()));

        bridge.pending_files.add_file(
            "p4",
            PendingFile {
                file_id: "f1".into(),
                filename: "cat.png".into(),
                mxc_uri: "mxc://x/y".into(),
                mime_type: "image/png".into(),
                size: 1,
                uploaded_at: Instant::now(),
            },
        );
        let info = FileInfo {
            id: "f1".into(),
            delete_at: 99,
            ..Default::default()
        };
        bridge
            .on_attachment(&info, &post("p4", "c1", "u1", ""))
            .await
            .unwrap();
        assert!(bridge.pending_files.is_empty());
    }

    #[tokio::test]
    async fn outbound_mentions_resolve_remote_users_to_pills() {
        let mm = Arc::new(TestMmApi::new());
        mm.insert_user(User {
            id: "u2".into(),
            username: "bob".into(),
            nickname: "Bob".into(),
            remote_id: Some("bridge-remote-id".into()),
            ..Default::default()
        });
        let store = Arc::new(MemoryStore::new());
        store.set_user_pair("u2", "@bob:elsewhere.org").await.unwrap();
        let bridge = bridge_with(mm, store);

        let (message, html, mentions) = bridge.translate_outbound("hi @bob").await;
        assert_eq!(message, "hi @bob");
        assert_eq!(mentions, vec!["@bob:elsewhere.org".to_owned()]);
        assert_eq!(
            html.as_deref(),
            Some("hi <a href=\"https://matrix.to/#/@bob:elsewhere.org\">@Bob</a>")
        );

        // Channel-wide mentions never become user pills.
        let (_, html, mentions) = bridge.translate_outbound("notice @here please").await;
        assert!(mentions.is_empty());
        assert_eq!(html, None);
    }

    #[tokio::test]
    async fn sync_batch_continues_after_item_errors() {
        let mm = Arc::new(TestMmApi::new());
        let bridge = bridge_with(mm.clone(), Arc::new(MemoryStore::new()));
        let batch = SyncBatch {
            channel_id: "missing".into(),
            users: vec![User {
                id: "u9".into(),
                ..Default::default()
            }],
            // The channel lookup fails, so this post errors and is logged.
            posts: vec![post("p1", "missing", "u1", "boom")],
            reactions: vec![Reaction {
                post_id: "p1".into(),
                remote_id: Some("bridge-remote-id".into()),
                ..Default::default()
            }],
        };
        bridge.on_sync_batch(&batch).await.unwrap();
        assert!(mm.recorded_calls().is_empty());
    }

    #[test]
    fn redundant_edit_detection() {
        let current = MatrixEvent {
            content: json!({"msgtype": "m.text", "body": "hello"}),
            ..Default::default()
        };
        assert!(edit_is_redundant(&current, "hello", None, &[]));
        assert!(!edit_is_redundant(&current, "hello!", None, &[]));
        assert!(!edit_is_redundant(&current, "hello", Some("<b>hello</b>"), &[]));

        // File-only post: the event body is the filename.
        let file_event = MatrixEvent {
            content: json!({"msgtype": "m.image", "body": "cat.png"}),
            ..Default::default()
        };
        assert!(edit_is_redundant(&file_event, "", None, &["cat.png".to_owned()]));
        assert!(!edit_is_redundant(&file_event, "", None, &["dog.png".to_owned()]));
    }
}
