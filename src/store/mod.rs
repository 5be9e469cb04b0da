mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::AppResult;

/// Key prefixes. Every cross-system correlation lives under one of these.
pub const CHANNEL_MAPPING_PREFIX: &str = "channel_mapping_";
pub const ROOM_MAPPING_PREFIX: &str = "room_mapping_";
pub const GHOST_USER_PREFIX: &str = "ghost_user_";
pub const MATRIX_USER_PREFIX: &str = "matrix_user_";
pub const MATTERMOST_USER_PREFIX: &str = "mattermost_user_";
pub const GHOST_ROOM_PREFIX: &str = "ghost_room_";
pub const MATRIX_EVENT_POST_PREFIX: &str = "matrix_event_post_";
pub const MATRIX_REACTION_PREFIX: &str = "matrix_reaction_";

/// Descriptor persisted per inbound Matrix reaction so a later redaction can
/// undo the Mattermost reaction it produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionLink {
    pub post_id: String,
    pub user_id: String,
    pub emoji_name: String,
}

/// A durable, ordered string-keyed byte store. The typed accessors keep the
/// key scheme in one place; callers never format keys themselves.
#[async_trait]
pub trait MappingStore: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: &[u8]) -> AppResult<()>;
    async fn delete(&self, key: &str) -> AppResult<()>;
    async fn list_keys(&self, offset: i64, limit: i64) -> AppResult<Vec<String>>;

    async fn get_string(&self, key: &str) -> AppResult<Option<String>> {
        match self.get(key).await? {
            Some(bytes) => Ok(Some(String::from_utf8(bytes).map_err(crate::AppError::from)?)),
            None => Ok(None),
        }
    }

    async fn set_string(&self, key: &str, value: &str) -> AppResult<()> {
        self.set(key, value.as_bytes()).await
    }

    /// Stores both directions of a channel↔room association in one logical
    /// step; a failed reverse write is logged, not fatal.
    async fn set_channel_room(&self, channel_id: &str, room_identifier: &str) -> AppResult<()> {
        self.set_string(&format!("{CHANNEL_MAPPING_PREFIX}{channel_id}"), room_identifier)
            .await?;
        if let Err(e) = self
            .set_string(&format!("{ROOM_MAPPING_PREFIX}{room_identifier}"), channel_id)
            .await
        {
            warn!(channel_id, room_identifier, error = %e, "reverse room mapping write failed");
        }
        Ok(())
    }

    async fn room_for_channel(&self, channel_id: &str) -> AppResult<Option<String>> {
        self.get_string(&format!("{CHANNEL_MAPPING_PREFIX}{channel_id}"))
            .await
    }

    async fn channel_for_room(&self, room_identifier: &str) -> AppResult<Option<String>> {
        self.get_string(&format!("{ROOM_MAPPING_PREFIX}{room_identifier}"))
            .await
    }

    /// Records a resolved room id for a channel whose forward mapping is
    /// stored under an alias, so inbound events (which carry ids) resolve.
    async fn note_room_for_channel(&self, room_id: &str, channel_id: &str) -> AppResult<()> {
        self.set_string(&format!("{ROOM_MAPPING_PREFIX}{room_id}"), channel_id)
            .await
    }

    async fn set_ghost_user(&self, mm_user_id: &str, mx_user_id: &str) -> AppResult<()> {
        self.set_string(&format!("{GHOST_USER_PREFIX}{mm_user_id}"), mx_user_id)
            .await
    }

    async fn ghost_for_user(&self, mm_user_id: &str) -> AppResult<Option<String>> {
        self.get_string(&format!("{GHOST_USER_PREFIX}{mm_user_id}")).await
    }

    /// The append-only user pair: Mattermost user ↔ (original) Matrix user.
    async fn set_user_pair(&self, mm_user_id: &str, mx_user_id: &str) -> AppResult<()> {
        self.set_string(&format!("{MATTERMOST_USER_PREFIX}{mm_user_id}"), mx_user_id)
            .await?;
        if let Err(e) = self
            .set_string(&format!("{MATRIX_USER_PREFIX}{mx_user_id}"), mm_user_id)
            .await
        {
            warn!(mm_user_id, mx_user_id, error = %e, "reverse user mapping write failed");
        }
        Ok(())
    }

    async fn mm_user_for_matrix(&self, mx_user_id: &str) -> AppResult<Option<String>> {
        self.get_string(&format!("{MATRIX_USER_PREFIX}{mx_user_id}")).await
    }

    async fn matrix_user_for_mm(&self, mm_user_id: &str) -> AppResult<Option<String>> {
        self.get_string(&format!("{MATTERMOST_USER_PREFIX}{mm_user_id}"))
            .await
    }

    async fn mark_ghost_in_room(&self, mm_user_id: &str, room_id: &str) -> AppResult<()> {
        self.set_string(&format!("{GHOST_ROOM_PREFIX}{mm_user_id}_{room_id}"), "joined")
            .await
    }

    async fn is_ghost_in_room(&self, mm_user_id: &str, room_id: &str) -> AppResult<bool> {
        Ok(self
            .get(&format!("{GHOST_ROOM_PREFIX}{mm_user_id}_{room_id}"))
            .await?
            .is_some())
    }

    /// Reverse index: Matrix event id → Mattermost post id.
    async fn set_post_for_event(&self, event_id: &str, post_id: &str) -> AppResult<()> {
        self.set_string(&format!("{MATRIX_EVENT_POST_PREFIX}{event_id}"), post_id)
            .await
    }

    async fn post_for_event(&self, event_id: &str) -> AppResult<Option<String>> {
        self.get_string(&format!("{MATRIX_EVENT_POST_PREFIX}{event_id}"))
            .await
    }

    async fn delete_post_for_event(&self, event_id: &str) -> AppResult<()> {
        self.delete(&format!("{MATRIX_EVENT_POST_PREFIX}{event_id}")).await
    }

    async fn set_reaction_link(&self, event_id: &str, link: &ReactionLink) -> AppResult<()> {
        let bytes = serde_json::to_vec(link)?;
        self.set(&format!("{MATRIX_REACTION_PREFIX}{event_id}"), &bytes).await
    }

    async fn reaction_link(&self, event_id: &str) -> AppResult<Option<ReactionLink>> {
        match self.get(&format!("{MATRIX_REACTION_PREFIX}{event_id}")).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn delete_reaction_link(&self, event_id: &str) -> AppResult<()> {
        self.delete(&format!("{MATRIX_REACTION_PREFIX}{event_id}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn typed_accessors_roundtrip() {
        let store = MemoryStore::new();
        store.set_channel_room("c1", "#chan:example.com").await.unwrap();
        assert_eq!(
            store.room_for_channel("c1").await.unwrap().as_deref(),
            Some("#chan:example.com")
        );
        assert_eq!(
            store.channel_for_room("#chan:example.com").await.unwrap().as_deref(),
            Some("c1")
        );
        assert_eq!(store.room_for_channel("c2").await.unwrap(), None);

        store.set_user_pair("u1", "@alice:example.com").await.unwrap();
        assert_eq!(
            store.mm_user_for_matrix("@alice:example.com").await.unwrap().as_deref(),
            Some("u1")
        );
        assert_eq!(
            store.matrix_user_for_mm("u1").await.unwrap().as_deref(),
            Some("@alice:example.com")
        );

        assert!(!store.is_ghost_in_room("u1", "!r").await.unwrap());
        store.mark_ghost_in_room("u1", "!r").await.unwrap();
        assert!(store.is_ghost_in_room("u1", "!r").await.unwrap());
    }

    #[tokio::test]
    async fn reaction_links_roundtrip() {
        let store = MemoryStore::new();
        let link = ReactionLink {
            post_id: "p1".into(),
            user_id: "u1".into(),
            emoji_name: "thumbsup".into(),
        };
        store.set_reaction_link("$e1", &link).await.unwrap();
        assert_eq!(store.reaction_link("$e1").await.unwrap(), Some(link));
        store.delete_reaction_link("$e1").await.unwrap();
        assert_eq!(store.reaction_link("$e1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_keys_pages_in_order() {
        let store = MemoryStore::new();
        for key in ["b", "a", "d", "c"] {
            store.set(key, b"x").await.unwrap();
        }
        assert_eq!(store.list_keys(0, 10).await.unwrap(), ["a", "b", "c", "d"]);
        assert_eq!(store.list_keys(1, 2).await.unwrap(), ["b", "c"]);
        assert!(store.list_keys(4, 2).await.unwrap().is_empty());
    }
}
