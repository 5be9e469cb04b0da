mod rest;
mod types;

pub use rest::RestMmApi;
pub use types::*;

use async_trait::async_trait;

use crate::AppResult;

/// The slice of the Mattermost platform API the bridge consumes. Kept as a
/// trait so bridge logic runs against an in-memory double in tests.
#[async_trait]
pub trait MmApi: Send + Sync {
    async fn get_user(&self, user_id: &str) -> AppResult<User>;
    async fn get_user_by_username(&self, username: &str) -> AppResult<Option<User>>;
    async fn create_user(&self, user: &User) -> AppResult<User>;
    async fn update_user(&self, user: &User) -> AppResult<User>;
    async fn set_profile_image(&self, user_id: &str, image: &[u8]) -> AppResult<()>;
    async fn get_profile_image(&self, user_id: &str) -> AppResult<Vec<u8>>;

    async fn get_channel(&self, channel_id: &str) -> AppResult<Channel>;
    async fn get_channel_members(
        &self,
        channel_id: &str,
        page: u32,
        per_page: u32,
    ) -> AppResult<Vec<ChannelMember>>;
    async fn get_channel_member(
        &self,
        channel_id: &str,
        user_id: &str,
    ) -> AppResult<Option<ChannelMember>>;
    async fn add_channel_member(&self, channel_id: &str, user_id: &str) -> AppResult<()>;
    async fn delete_channel_member(&self, channel_id: &str, user_id: &str) -> AppResult<()>;
    async fn get_team_member(&self, team_id: &str, user_id: &str)
    -> AppResult<Option<TeamMember>>;
    async fn create_team_member(&self, team_id: &str, user_id: &str) -> AppResult<()>;

    async fn get_post(&self, post_id: &str) -> AppResult<Option<Post>>;
    async fn create_post(&self, post: &Post) -> AppResult<Post>;
    async fn update_post(&self, post: &Post) -> AppResult<Post>;
    async fn delete_post(&self, post_id: &str) -> AppResult<()>;

    async fn add_reaction(&self, reaction: &Reaction) -> AppResult<()>;
    async fn remove_reaction(&self, reaction: &Reaction) -> AppResult<()>;

    async fn get_file(&self, file_id: &str) -> AppResult<Vec<u8>>;
    async fn get_file_info(&self, file_id: &str) -> AppResult<FileInfo>;
    async fn upload_file(
        &self,
        channel_id: &str,
        filename: &str,
        data: Vec<u8>,
    ) -> AppResult<FileInfo>;
}

#[cfg(test)]
pub mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::AppError;

    /// In-memory Mattermost double. Every mutating call is recorded in
    /// `calls` so tests can assert what the bridge did (and did not) do.
    #[derive(Default)]
    pub struct TestMmApi {
        pub users: Mutex<HashMap<String, User>>,
        pub channels: Mutex<HashMap<String, Channel>>,
        pub channel_members: Mutex<Vec<ChannelMember>>,
        pub team_members: Mutex<Vec<TeamMember>>,
        pub posts: Mutex<HashMap<String, Post>>,
        pub reactions: Mutex<Vec<Reaction>>,
        pub files: Mutex<HashMap<String, (FileInfo, Vec<u8>)>>,
        pub profile_images: Mutex<HashMap<String, Vec<u8>>>,
        pub calls: Mutex<Vec<String>>,
        next_id: Mutex<u64>,
    }

    impl TestMmApi {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert_user(&self, user: User) {
            self.users.lock().unwrap().insert(user.id.clone(), user);
        }

        pub fn insert_channel(&self, channel: Channel) {
            self.channels.lock().unwrap().insert(channel.id.clone(), channel);
        }

        pub fn insert_post(&self, post: Post) {
            self.posts.lock().unwrap().insert(post.id.clone(), post);
        }

        pub fn recorded_calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn fresh_id(&self, prefix: &str) -> String {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            format!("{prefix}{next}")
        }

        fn not_found(what: &str) -> AppError {
            AppError::Mattermost {
                status: 404,
                body: format!("{what} not found"),
            }
        }
    }

    #[async_trait]
    impl MmApi for TestMmApi {
        async fn get_user(&self, user_id: &str) -> AppResult<User> {
            self.users
                .lock()
                .unwrap()
                .get(user_id)
                .cloned()
                .ok_or_else(|| Self::not_found("user"))
        }

        async fn get_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .values()
                .find(|u| u.username == username)
                .cloned())
        }

        async fn create_user(&self, user: &User) -> AppResult<User> {
            self.record(format!("create_user:{}", user.username));
            let mut created = user.clone();
            if created.id.is_empty() {
                created.id = self.fresh_id("u");
            }
            self.insert_user(created.clone());
            Ok(created)
        }

        async fn update_user(&self, user: &User) -> AppResult<User> {
            self.record(format!("update_user:{}", user.id));
            self.insert_user(user.clone());
            Ok(user.clone())
        }

        async fn set_profile_image(&self, user_id: &str, image: &[u8]) -> AppResult<()> {
            self.record(format!("set_profile_image:{user_id}"));
            self.profile_images
                .lock()
                .unwrap()
                .insert(user_id.to_owned(), image.to_vec());
            Ok(())
        }

        async fn get_profile_image(&self, user_id: &str) -> AppResult<Vec<u8>> {
            Ok(self
                .profile_images
                .lock()
                .unwrap()
                .get(user_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn get_channel(&self, channel_id: &str) -> AppResult<Channel> {
            self.channels
                .lock()
                .unwrap()
                .get(channel_id)
                .cloned()
                .ok_or_else(|| Self::not_found("channel"))
        }

        async fn get_channel_members(
            &self,
            channel_id: &str,
            page: u32,
            per_page: u32,
        ) -> AppResult<Vec<ChannelMember>> {
            let members: Vec<ChannelMember> = self
                .channel_members
                .lock()
                .unwrap()
                .iter()
                .filter(|m| m.channel_id == channel_id)
                .cloned()
                .collect();
            let start = (page * per_page) as usize;
            Ok(members
                .into_iter()
                .skip(start)
                .take(per_page as usize)
                .collect())
        }

        async fn get_channel_member(
            &self,
            channel_id: &str,
            user_id: &str,
        ) -> AppResult<Option<ChannelMember>> {
            Ok(self
                .channel_members
                .lock()
                .unwrap()
                .iter()
                .find(|m| m.channel_id == channel_id && m.user_id == user_id)
                .cloned())
        }

        async fn add_channel_member(&self, channel_id: &str, user_id: &str) -> AppResult<()> {
            self.record(format!("add_channel_member:{channel_id}:{user_id}"));
            self.channel_members.lock().unwrap().push(ChannelMember {
                channel_id: channel_id.to_owned(),
                user_id: user_id.to_owned(),
            });
            Ok(())
        }

        async fn delete_channel_member(&self, channel_id: &str, user_id: &str) -> AppResult<()> {
            self.record(format!("delete_channel_member:{channel_id}:{user_id}"));
            self.channel_members
                .lock()
                .unwrap()
                .retain(|m| !(m.channel_id == channel_id && m.user_id == user_id));
            Ok(())
        }

        async fn get_team_member(
            &self,
            team_id: &str,
            user_id: &str,
        ) -> AppResult<Option<TeamMember>> {
            Ok(self
                .team_members
                .lock()
                .unwrap()
                .iter()
                .find(|m| m.team_id == team_id && m.user_id == user_id)
                .cloned())
        }

        async fn create_team_member(&self, team_id: &str, user_id: &str) -> AppResult<()> {
            self.record(format!("create_team_member:{team_id}:{user_id}"));
            self.team_members.lock().unwrap().push(TeamMember {
                team_id: team_id.to_owned(),
                user_id: user_id.to_owned(),
                delete_at: 0,
            });
            Ok(())
        }

        async fn get_post(&self, post_id: &str) -> AppResult<Option<Post>> {
            Ok(self.posts.lock().unwrap().get(post_id).cloned())
        }

        async fn create_post(&self, post: &Post) -> AppResult<Post> {
            self.record(format!("create_post:{}", post.channel_id));
            let mut created = post.clone();
            if created.id.is_empty() {
                created.id = self.fresh_id("p");
            }
            if created.update_at == 0 {
                created.update_at = created.create_at;
            }
            self.insert_post(created.clone());
            Ok(created)
        }

        async fn update_post(&self, post: &Post) -> AppResult<Post> {
            self.record(format!("update_post:{}", post.id));
            let mut updated = post.clone();
            updated.update_at += 1;
            self.insert_post(updated.clone());
            Ok(updated)
        }

        async fn delete_post(&self, post_id: &str) -> AppResult<()> {
            self.record(format!("delete_post:{post_id}"));
            self.posts.lock().unwrap().remove(post_id);
            Ok(())
        }

        async fn add_reaction(&self, reaction: &Reaction) -> AppResult<()> {
            self.record(format!(
                "add_reaction:{}:{}",
                reaction.post_id, reaction.emoji_name
            ));
            self.reactions.lock().unwrap().push(reaction.clone());
            Ok(())
        }

        async fn remove_reaction(&self, reaction: &Reaction) -> AppResult<()> {
            self.record(format!(
                "remove_reaction:{}:{}",
                reaction.post_id, reaction.emoji_name
            ));
            self.reactions.lock().unwrap().retain(|r| {
                !(r.post_id == reaction.post_id
                    && r.user_id == reaction.user_id
                    && r.emoji_name == reaction.emoji_name)
            });
            Ok(())
        }

        async fn get_file(&self, file_id: &str) -> AppResult<Vec<u8>> {
            self.files
                .lock()
                .unwrap()
                .get(file_id)
                .map(|(_, data)| data.clone())
                .ok_or_else(|| Self::not_found("file"))
        }

        async fn get_file_info(&self, file_id: &str) -> AppResult<FileInfo> {
            self.files
                .lock()
                .unwrap()
                .get(file_id)
                .map(|(info, _)| info.clone())
                .ok_or_else(|| Self::not_found("file"))
        }

        async fn upload_file(
            &self,
            channel_id: &str,
            filename: &str,
            data: Vec<u8>,
        ) -> AppResult<FileInfo> {
            self.record(format!("upload_file:{channel_id}:{filename}"));
            let info = FileInfo {
                id: self.fresh_id("f"),
                post_id: String::new(),
                name: filename.to_owned(),
                mime_type: mime_infer::from_path(filename)
                    .first_or_octet_stream()
                    .to_string(),
                size: data.len() as i64,
                delete_at: 0,
            };
            self.files
                .lock()
                .unwrap()
                .insert(info.id.clone(), (info.clone(), data));
            Ok(info)
        }
    }
}
