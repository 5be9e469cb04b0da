use salvo::prelude::*;
use serde_json::json;

use crate::mattermost::{AttachmentNotice, ProfileImageNotice, SyncBatch};
use crate::{EmptyResult, JsonResult, JsonValue, MatrixError, empty_ok, hoops, json_ok, state, webhook};

pub fn router() -> Router {
    Router::new()
        .push(
            Router::with_path("_matrix/app/v1/transactions/{txn_id}")
                .hoop(hoops::auth_homeserver_token)
                .goal(webhook::receive_transaction),
        )
        .push(
            Router::with_path("api/v1")
                .hoop(hoops::auth_mattermost_user)
                .push(Router::with_path("sync").post(sync_batch))
                .push(Router::with_path("attachment").post(attachment))
                .push(Router::with_path("profile_image").post(profile_image))
                .push(Router::with_path("ping").get(ping)),
        )
}

#[handler]
async fn sync_batch(req: &mut Request) -> EmptyResult {
    let batch: SyncBatch = req
        .parse_json()
        .await
        .map_err(|e| MatrixError::bad_json(format!("malformed sync batch: {e}")))?;
    state::get().mm_to_mx.on_sync_batch(&batch).await?;
    empty_ok()
}

#[handler]
async fn attachment(req: &mut Request) -> EmptyResult {
    let notice: AttachmentNotice = req
        .parse_json()
        .await
        .map_err(|e| MatrixError::bad_json(format!("malformed attachment notice: {e}")))?;
    state::get()
        .mm_to_mx
        .on_attachment(&notice.file_info, &notice.post)
        .await?;
    empty_ok()
}

#[handler]
async fn profile_image(req: &mut Request) -> EmptyResult {
    let notice: ProfileImageNotice = req
        .parse_json()
        .await
        .map_err(|e| MatrixError::bad_json(format!("malformed profile image notice: {e}")))?;
    state::get().mm_to_mx.on_profile_image(&notice.user).await?;
    empty_ok()
}

#[handler]
async fn ping() -> JsonResult<JsonValue> {
    if !state::get().mm_to_mx.on_health_ping().await {
        return Err(MatrixError::unavailable("matrix connection test failed").into());
    }
    json_ok(json!({"status": "ok"}))
}
