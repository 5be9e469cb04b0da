use salvo::http::header::AUTHORIZATION;
use salvo::prelude::*;

use crate::{AppResult, MatrixError, config, utils};

/// Application-service ingress auth: the homeserver's `hs_token` as a
/// bearer, compared in constant time. Unconfigured or disabled bridges
/// answer 503 so the homeserver backs off instead of dropping transactions.
#[handler]
pub async fn auth_homeserver_token(req: &mut Request) -> AppResult<()> {
    let conf = config::get();
    if !conf.enable_sync {
        return Err(MatrixError::unavailable("sync is disabled").into());
    }
    if conf.matrix.hs_token.is_empty() {
        return Err(MatrixError::unavailable("homeserver token is not configured").into());
    }
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let Some(token) = header.strip_prefix("Bearer ") else {
        return Err(MatrixError::missing_token("missing bearer token").into());
    };
    if !utils::constant_time_eq(token, &conf.matrix.hs_token) {
        return Err(MatrixError::unknown_token("bad homeserver token").into());
    }
    Ok(())
}

/// Host-side ingress auth: requests must carry the platform user id header.
#[handler]
pub async fn auth_mattermost_user(req: &mut Request) -> AppResult<()> {
    let user_id = req
        .headers()
        .get("Mattermost-User-ID")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if user_id.is_empty() {
        return Err(MatrixError::unauthorized("missing Mattermost-User-ID header").into());
    }
    Ok(())
}
