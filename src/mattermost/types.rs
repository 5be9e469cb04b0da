use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    /// Remote-cluster attribution; set for users this bridge created.
    #[serde(default)]
    pub remote_id: Option<String>,
    #[serde(default)]
    pub delete_at: i64,
}

impl User {
    /// Preference order mirrors the Mattermost UI: nickname, full name,
    /// username.
    pub fn display_name(&self) -> String {
        if !self.nickname.is_empty() {
            return self.nickname.clone();
        }
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if !full.is_empty() {
            return full.to_owned();
        }
        self.username.clone()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub create_at: i64,
    #[serde(default)]
    pub update_at: i64,
    #[serde(default)]
    pub edit_at: i64,
    #[serde(default)]
    pub delete_at: i64,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub channel_id: String,
    /// Thread root; empty for top-level posts.
    #[serde(default)]
    pub root_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub file_ids: Vec<String>,
    #[serde(default)]
    pub props: JsonMap<String, JsonValue>,
    #[serde(default)]
    pub remote_id: Option<String>,
}

impl Post {
    pub fn prop_str(&self, key: &str) -> Option<&str> {
        self.props.get(key)?.as_str()
    }

    pub fn set_prop(&mut self, key: &str, value: JsonValue) {
        self.props.insert(key.to_owned(), value);
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelType {
    #[default]
    #[serde(rename = "O")]
    Open,
    #[serde(rename = "P")]
    Private,
    #[serde(rename = "D")]
    Direct,
    #[serde(rename = "G")]
    Group,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Channel {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(rename = "type", default)]
    pub channel_type: ChannelType,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    /// The channel header doubles as the room topic.
    #[serde(default)]
    pub header: String,
}

impl Channel {
    pub fn is_direct(&self) -> bool {
        matches!(self.channel_type, ChannelType::Direct | ChannelType::Group)
    }

    pub fn is_public(&self) -> bool {
        self.channel_type == ChannelType::Open
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChannelMember {
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub user_id: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TeamMember {
    #[serde(default)]
    pub team_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub delete_at: i64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub post_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub delete_at: i64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Reaction {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub post_id: String,
    #[serde(default)]
    pub emoji_name: String,
    #[serde(default)]
    pub create_at: i64,
    #[serde(default)]
    pub delete_at: i64,
    #[serde(default)]
    pub remote_id: Option<String>,
}

/// One host-pushed sync delivery: everything that changed in a channel.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SyncBatch {
    pub channel_id: String,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttachmentNotice {
    pub file_info: FileInfo,
    pub post: Post,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProfileImageNotice {
    pub user: User,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_preference_order() {
        let mut user = User {
            username: "jdoe".into(),
            ..Default::default()
        };
        assert_eq!(user.display_name(), "jdoe");
        user.first_name = "John".into();
        user.last_name = "Doe".into();
        assert_eq!(user.display_name(), "John Doe");
        user.nickname = "Johnny".into();
        assert_eq!(user.display_name(), "Johnny");
    }

    #[test]
    fn channel_type_codes_roundtrip() {
        let channel: Channel =
            serde_json::from_str(r#"{"id":"c1","type":"D","name":"x__y"}"#).unwrap();
        assert_eq!(channel.channel_type, ChannelType::Direct);
        assert!(channel.is_direct());
        assert!(!channel.is_public());
    }
}
