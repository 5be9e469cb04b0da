mod client;
mod error;
mod rate_limit;
mod types;

pub use client::MatrixClient;
pub use error::MatrixError;
pub use rate_limit::{Bucket, BucketConfig, RateLimitCategory, RateLimitMode, RateLimiter};
pub use types::*;

/// Relation types understood by the bridge.
pub const REL_REPLACE: &str = "m.replace";
pub const REL_ANNOTATION: &str = "m.annotation";
pub const REL_THREAD: &str = "m.thread";
/// Custom relation attached to file messages, pointing at the text message
/// they were posted with. Distinguishes attachment replies from user replies.
pub const REL_MATTERMOST_POST: &str = "m.mattermost.post";

/// Custom event carrying the file event ids belonging to one post.
pub const EVENT_TYPE_FILE_METADATA: &str = "m.mattermost.file_metadata";
/// Room state event recording the bridged Mattermost channel.
pub const STATE_TYPE_CHANNEL: &str = "m.mattermost.channel";

/// Content keys stamped on every outbound message for loop prevention.
pub const KEY_MATTERMOST_POST_ID: &str = "mattermost_post_id";
pub const KEY_MATTERMOST_REMOTE_ID: &str = "mattermost_remote_id";
