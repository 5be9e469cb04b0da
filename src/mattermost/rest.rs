use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::{AppError, AppResult};

use super::*;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// [`MmApi`] over the Mattermost REST API (`/api/v4`), authenticated with a
/// personal or bot access token.
pub struct RestMmApi {
    http: reqwest::Client,
    base_url: Url,
    access_token: String,
}

impl RestMmApi {
    pub fn new(base_url: Url, access_token: String) -> AppResult<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url,
            access_token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/api/v4/{path}",
            self.base_url.as_str().trim_end_matches('/')
        )
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> AppResult<reqwest::Response> {
        let response = builder.bearer_auth(&self.access_token).send().await?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(AppError::Mattermost { status, body })
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&impl Serialize>,
    ) -> AppResult<T> {
        let mut builder = self.http.request(method, self.url(path));
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = self.send(builder).await?;
        Ok(response.json().await?)
    }

    async fn request_empty(
        &self,
        method: Method,
        path: &str,
        body: Option<&impl Serialize>,
    ) -> AppResult<()> {
        let mut builder = self.http.request(method, self.url(path));
        if let Some(body) = body {
            builder = builder.json(body);
        }
        self.send(builder).await?;
        Ok(())
    }

    /// Collapses 404 into `None` for lookups where absence is expected.
    fn optional<T>(result: AppResult<T>) -> AppResult<Option<T>> {
        match result {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.is_mm_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait::async_trait]
impl MmApi for RestMmApi {
    async fn get_user(&self, user_id: &str) -> AppResult<User> {
        self.request_json(Method::GET, &format!("users/{user_id}"), None::<&()>)
            .await
    }

    async fn get_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        Self::optional(
            self.request_json(Method::GET, &format!("users/username/{username}"), None::<&()>)
                .await,
        )
    }

    async fn create_user(&self, user: &User) -> AppResult<User> {
        self.request_json(Method::POST, "users", Some(user)).await
    }

    async fn update_user(&self, user: &User) -> AppResult<User> {
        self.request_json(Method::PUT, &format!("users/{}", user.id), Some(user))
            .await
    }

    async fn set_profile_image(&self, user_id: &str, image: &[u8]) -> AppResult<()> {
        let part = reqwest::multipart::Part::bytes(image.to_vec()).file_name("profile.png");
        let form = reqwest::multipart::Form::new().part("image", part);
        let builder = self
            .http
            .post(self.url(&format!("users/{user_id}/image")))
            .multipart(form);
        self.send(builder).await?;
        Ok(())
    }

    async fn get_profile_image(&self, user_id: &str) -> AppResult<Vec<u8>> {
        let builder = self.http.get(self.url(&format!("users/{user_id}/image")));
        let response = self.send(builder).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn get_channel(&self, channel_id: &str) -> AppResult<Channel> {
        self.request_json(Method::GET, &format!("channels/{channel_id}"), None::<&()>)
            .await
    }

    async fn get_channel_members(
        &self,
        channel_id: &str,
        page: u32,
        per_page: u32,
    ) -> AppResult<Vec<ChannelMember>> {
        self.request_json(
            Method::GET,
            &format!("channels/{channel_id}/members?page={page}&per_page={per_page}"),
            None::<&()>,
        )
        .await
    }

    async fn get_channel_member(
        &self,
        channel_id: &str,
        user_id: &str,
    ) -> AppResult<Option<ChannelMember>> {
        Self::optional(
            self.request_json(
                Method::GET,
                &format!("channels/{channel_id}/members/{user_id}"),
                None::<&()>,
            )
            .await,
        )
    }

    async fn add_channel_member(&self, channel_id: &str, user_id: &str) -> AppResult<()> {
        self.request_empty(
            Method::POST,
            &format!("channels/{channel_id}/members"),
            Some(&serde_json::json!({"user_id": user_id})),
        )
        .await
    }

    async fn delete_channel_member(&self, channel_id: &str, user_id: &str) -> AppResult<()> {
        self.request_empty(
            Method::DELETE,
            &format!("channels/{channel_id}/members/{user_id}"),
            None::<&()>,
        )
        .await
    }

    async fn get_team_member(
        &self,
        team_id: &str,
        user_id: &str,
    ) -> AppResult<Option<TeamMember>> {
        Self::optional(
            self.request_json(
                Method::GET,
                &format!("teams/{team_id}/members/{user_id}"),
                None::<&()>,
            )
            .await,
        )
    }

    async fn create_team_member(&self, team_id: &str, user_id: &str) -> AppResult<()> {
        self.request_empty(
            Method::POST,
            &format!("teams/{team_id}/members"),
            Some(&serde_json::json!({"team_id": team_id, "user_id": user_id})),
        )
        .await
    }

    async fn get_post(&self, post_id: &str) -> AppResult<Option<Post>> {
        Self::optional(
            self.request_json(Method::GET, &format!("posts/{post_id}"), None::<&()>)
                .await,
        )
    }

    async fn create_post(&self, post: &Post) -> AppResult<Post> {
        self.request_json(Method::POST, "posts", Some(post)).await
    }

    async fn update_post(&self, post: &Post) -> AppResult<Post> {
        self.request_json(Method::PUT, &format!("posts/{}", post.id), Some(post))
            .await
    }

    async fn delete_post(&self, post_id: &str) -> AppResult<()> {
        self.request_empty(Method::DELETE, &format!("posts/{post_id}"), None::<&()>)
            .await
    }

    async fn add_reaction(&self, reaction: &Reaction) -> AppResult<()> {
        self.request_empty(Method::POST, "reactions", Some(reaction))
            .await
    }

    async fn remove_reaction(&self, reaction: &Reaction) -> AppResult<()> {
        self.request_empty(
            Method::DELETE,
            &format!(
                "users/{}/posts/{}/reactions/{}",
                reaction.user_id, reaction.post_id, reaction.emoji_name
            ),
            None::<&()>,
        )
        .await
    }

    async fn get_file(&self, file_id: &str) -> AppResult<Vec<u8>> {
        let builder = self.http.get(self.url(&format!("files/{file_id}")));
        let response = self.send(builder).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn get_file_info(&self, file_id: &str) -> AppResult<FileInfo> {
        self.request_json(Method::GET, &format!("files/{file_id}/info"), None::<&()>)
            .await
    }

    async fn upload_file(
        &self,
        channel_id: &str,
        filename: &str,
        data: Vec<u8>,
    ) -> AppResult<FileInfo> {
        #[derive(serde::Deserialize)]
        struct UploadResponse {
            file_infos: Vec<FileInfo>,
        }
        let builder = self
            .http
            .post(self.url(&format!(
                "files?channel_id={channel_id}&filename={}",
                percent_encoding::utf8_percent_encode(filename, percent_encoding::NON_ALPHANUMERIC)
            )))
            .body(data);
        let response = self.send(builder).await?;
        let mut upload: UploadResponse = response.json().await?;
        upload
            .file_infos
            .pop()
            .ok_or_else(|| AppError::public("file upload returned no file info"))
    }
}
