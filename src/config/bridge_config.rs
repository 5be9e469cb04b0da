use serde::Deserialize;
use url::Url;

use crate::matrix::RateLimitMode;
use crate::utils;

#[derive(Clone, Debug, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Master switch for all traffic in both directions.
    #[serde(default = "default_true")]
    pub enable_sync: bool,
    pub db: DbConfig,
    pub matrix: MatrixConfig,
    pub mattermost: MattermostConfig,
    #[serde(default)]
    pub rate_limit_mode: RateLimitMode,
    #[serde(default = "default_post_tracker_max_entries")]
    pub post_tracker_max_entries: usize,
    /// Byte cap applied when downloading attachments from either side.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Byte cap applied when downloading avatars.
    #[serde(default = "default_max_profile_image_size")]
    pub max_profile_image_size: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DbConfig {
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MatrixConfig {
    /// Base URL of the homeserver's client-server API.
    pub server_url: Url,
    /// Application-service token sent on every outbound call.
    #[serde(default)]
    pub as_token: String,
    /// Homeserver token expected on inbound transactions.
    #[serde(default)]
    pub hs_token: String,
    /// Server name used in ghost user ids. Derived from `server_url` when
    /// not set explicitly (needed when the two differ, e.g. behind a proxy).
    pub server_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MattermostConfig {
    /// Base URL of the Mattermost server, without `/api/v4`.
    pub base_url: Url,
    pub access_token: String,
    /// Remote-cluster id this bridge stamps on everything it writes.
    pub remote_id: String,
    /// Prefix of Mattermost usernames generated for Matrix users.
    #[serde(default = "default_username_prefix")]
    pub username_prefix: String,
    /// Prefix embedded in ghost user localparts.
    #[serde(default = "default_ghost_prefix")]
    pub ghost_user_prefix: String,
}

impl BridgeConfig {
    /// Hard configuration problems, checked once at boot. Missing tokens
    /// are soft (the webhook answers 503 until they are set), but a bridge
    /// without a remote id or with an unusable URL cannot run at all.
    pub fn validate(&self) -> Result<(), String> {
        if self.mattermost.remote_id.is_empty() {
            return Err("mattermost.remote_id must not be empty".into());
        }
        if self.mattermost.access_token.is_empty() {
            return Err("mattermost.access_token must not be empty".into());
        }
        if self.matrix.server_url.host_str().is_none() && self.matrix.server_name.is_none() {
            return Err("matrix.server_url has no host and no server_name is set".into());
        }
        if self.mattermost.ghost_user_prefix.is_empty() {
            return Err("mattermost.ghost_user_prefix must not be empty".into());
        }
        if self.enable_sync && self.matrix.as_token.is_empty() {
            warn!("matrix.as_token is empty, outbound matrix calls will fail");
        }
        if self.enable_sync && self.matrix.hs_token.is_empty() {
            warn!("matrix.hs_token is empty, the transaction webhook will answer 503");
        }
        Ok(())
    }

    /// The homeserver's server name as it appears in user ids.
    pub fn server_name(&self) -> String {
        if let Some(name) = &self.matrix.server_name {
            return name.clone();
        }
        let host = self.matrix.server_url.host_str().unwrap_or_default();
        match self.matrix.server_url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        }
    }

    pub fn sanitized_server_name(&self) -> String {
        utils::sanitize_server_name(&self.server_name())
    }

    /// Post property key carrying the Matrix event id, scoped per server so
    /// correlation survives server moves.
    pub fn event_id_prop_key(&self) -> String {
        format!("matrix_event_id_{}", self.sanitized_server_name())
    }

    pub fn ghost_localpart(&self, mm_user_id: &str) -> String {
        format!("_{}_{}", self.mattermost.ghost_user_prefix, mm_user_id)
    }

    pub fn ghost_user_id(&self, mm_user_id: &str) -> String {
        format!("@{}:{}", self.ghost_localpart(mm_user_id), self.server_name())
    }

    /// Whether a Matrix user id matches our ghost pattern
    /// `@_<prefix>_<mm user id>:<server name>`.
    pub fn is_ghost_user(&self, mx_user_id: &str) -> bool {
        self.decode_ghost_user_id(mx_user_id).is_some()
    }

    /// Recovers the Mattermost user id embedded in a ghost user id.
    pub fn decode_ghost_user_id(&self, mx_user_id: &str) -> Option<String> {
        let prefix = format!("@_{}_", self.mattermost.ghost_user_prefix);
        let rest = mx_user_id.strip_prefix(&prefix)?;
        let (localpart, server) = rest.split_once(':')?;
        if server != self.server_name() || localpart.is_empty() {
            return None;
        }
        Some(localpart.to_owned())
    }

    /// Mattermost username generated for a Matrix user's localpart.
    pub fn mm_username(&self, mx_localpart: &str) -> String {
        let sanitized: String = mx_localpart
            .to_lowercase()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}:{}", self.mattermost.username_prefix, sanitized)
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8280".into()
}
fn default_true() -> bool {
    true
}
fn default_pool_size() -> u32 {
    8
}
fn default_post_tracker_max_entries() -> usize {
    10_000
}
fn default_max_file_size() -> u64 {
    100 * 1024 * 1024
}
fn default_max_profile_image_size() -> u64 {
    10 * 1024 * 1024
}
fn default_username_prefix() -> String {
    "matrix".into()
}
fn default_ghost_prefix() -> String {
    "mattermost".into()
}

#[cfg(test)]
pub(crate) fn test_config() -> BridgeConfig {
    BridgeConfig {
        listen_addr: default_listen_addr(),
        enable_sync: true,
        db: DbConfig {
            url: "postgres://localhost/bridge_test".into(),
            pool_size: 1,
        },
        matrix: MatrixConfig {
            // An unroutable address: tests must never reach a live server.
            server_url: Url::parse("http://127.0.0.1:9").unwrap(),
            as_token: "as-token".into(),
            hs_token: "hs-token".into(),
            server_name: Some("matrix.example.com".into()),
        },
        mattermost: MattermostConfig {
            base_url: Url::parse("https://mm.example.com").unwrap(),
            access_token: "mm-token".into(),
            remote_id: "bridge-remote-id".into(),
            username_prefix: default_username_prefix(),
            ghost_user_prefix: default_ghost_prefix(),
        },
        rate_limit_mode: RateLimitMode::Disabled,
        post_tracker_max_entries: default_post_tracker_max_entries(),
        max_file_size: default_max_file_size(),
        max_profile_image_size: default_max_profile_image_size(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ghost_ids_embed_the_mattermost_user_id() {
        let conf = test_config();
        let ghost = conf.ghost_user_id("abc123");
        assert_eq!(ghost, "@_mattermost_abc123:matrix.example.com");
        assert!(conf.is_ghost_user(&ghost));
        assert_eq!(conf.decode_ghost_user_id(&ghost).as_deref(), Some("abc123"));
    }

    #[test]
    fn foreign_users_are_not_ghosts() {
        let conf = test_config();
        assert!(!conf.is_ghost_user("@alice:matrix.example.com"));
        assert!(!conf.is_ghost_user("@_mattermost_abc:other.example.org"));
        assert!(!conf.is_ghost_user("@_other_abc:matrix.example.com"));
    }

    #[test]
    fn event_id_prop_key_uses_sanitized_host() {
        let conf = test_config();
        assert_eq!(conf.event_id_prop_key(), "matrix_event_id_matrix_example_com");
    }

    #[test]
    fn validate_flags_hard_problems() {
        let conf = test_config();
        assert!(conf.validate().is_ok());

        let mut no_remote = test_config();
        no_remote.mattermost.remote_id.clear();
        assert!(no_remote.validate().is_err());

        let mut no_token = test_config();
        no_token.mattermost.access_token.clear();
        assert!(no_token.validate().is_err());
    }

    #[test]
    fn mm_username_sanitizes_localpart() {
        let conf = test_config();
        assert_eq!(conf.mm_username("Alice"), "matrix:alice");
        assert_eq!(conf.mm_username("bob!x"), "matrix:bob_x");
    }
}
