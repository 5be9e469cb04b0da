//! Direct and group channel handling: detection, member collection, and
//! lazy DM room creation on the first post.

use crate::mattermost::{ChannelType, MmApi, Post, User};
use crate::{AppResult, MatrixError};

use super::MmToMatrixBridge;

/// Page size for the two-member probe of direct channels.
const DIRECT_PAGE_SIZE: u32 = 10;
/// Group channels page until an empty page comes back.
const GROUP_PAGE_SIZE: u32 = 100;

/// `Some(member ids)` when the channel is a direct or group channel,
/// `None` for everything else.
pub(crate) async fn direct_channel_members(
    mm: &dyn MmApi,
    channel_id: &str,
) -> AppResult<Option<Vec<String>>> {
    let channel = mm.get_channel(channel_id).await?;
    match channel.channel_type {
        ChannelType::Direct => {
            let members = mm
                .get_channel_members(channel_id, 0, DIRECT_PAGE_SIZE)
                .await?;
            Ok(Some(members.into_iter().map(|m| m.user_id).collect()))
        }
        ChannelType::Group => {
            let mut member_ids = vec![];
            let mut page = 0;
            loop {
                let batch = mm
                    .get_channel_members(channel_id, page, GROUP_PAGE_SIZE)
                    .await?;
                if batch.is_empty() {
                    break;
                }
                member_ids.extend(batch.into_iter().map(|m| m.user_id));
                page += 1;
            }
            Ok(Some(member_ids))
        }
        _ => Ok(None),
    }
}

/// `"DM with <initiator>"`, falling back through the usual display-name
/// preference order down to the bare username.
pub(crate) fn dm_room_name(initiator: &User) -> String {
    format!("DM with {}", initiator.display_name())
}

impl MmToMatrixBridge {
    /// First post in an unmapped direct/group channel: collect a Matrix
    /// identity for every member (ghosts for local users, original ids for
    /// remote ones), create the room, and store the mapping.
    pub(crate) async fn create_dm_room(
        &self,
        channel_id: &str,
        post: &Post,
        member_ids: &[String],
    ) -> AppResult<String> {
        let mut mx_user_ids = vec![];
        for mm_user_id in member_ids {
            match self.matrix_identity_for_member(mm_user_id).await {
                Some(mx_user_id) => mx_user_ids.push(mx_user_id),
                None => warn!(mm_user_id, "no matrix identity for DM member"),
            }
        }
        if mx_user_ids.len() < 2 {
            return Err(MatrixError::invalid_param(format!(
                "only {} of {} DM members resolve to matrix users",
                mx_user_ids.len(),
                member_ids.len()
            ))
            .into());
        }

        let initiator = self.mm.get_user(&post.user_id).await?;
        let room_id = self
            .matrix
            .create_direct_room(&mx_user_ids, &dm_room_name(&initiator))
            .await?;
        self.store.set_channel_room(channel_id, &room_id).await?;
        info!(channel_id, room_id, "created direct room");
        Ok(room_id)
    }

    async fn matrix_identity_for_member(&self, mm_user_id: &str) -> Option<String> {
        let user = self.mm.get_user(mm_user_id).await.ok()?;
        if user.remote_id.as_deref() == Some(&self.config.mattermost.remote_id) {
            return self.store.matrix_user_for_mm(mm_user_id).await.ok().flatten();
        }
        match self.ensure_ghost(mm_user_id).await {
            Ok(ghost) => Some(ghost.user_id),
            Err(e) => {
                warn!(mm_user_id, error = %e, "creating ghost for DM member failed");
                None
            }
        }
    }
}
