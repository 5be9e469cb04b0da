#![allow(dead_code)]

#[macro_use]
extern crate tracing;

pub mod bridge;
pub mod config;
pub mod content;
pub mod error;
pub mod hoops;
pub mod matrix;
pub mod mattermost;
pub mod routing;
pub mod state;
pub mod store;
pub mod trackers;
pub mod utils;
pub mod webhook;

pub use error::AppError;
pub use matrix::MatrixError;

use std::sync::Arc;
use std::time::Duration;

use dotenvy::dotenv;
use salvo::logging::Logger;
use salvo::prelude::*;
use serde::{Deserialize, Serialize};

pub(crate) use serde_json::Value as JsonValue;

pub type AppResult<T> = Result<T, crate::AppError>;
pub type JsonResult<T> = Result<Json<T>, crate::AppError>;
pub type EmptyResult = Result<Json<EmptyObject>, crate::AppError>;

/// An empty JSON object, `{}`.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct EmptyObject {}

pub fn json_ok<T>(data: T) -> JsonResult<T> {
    Ok(Json(data))
}
pub fn empty_ok() -> EmptyResult {
    Ok(Json(EmptyObject {}))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Err(e) = dotenv() {
        println!("dotenv error: {e:?}");
    }
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "matrix_bridge_mattermost=info,salvo=warn".to_owned());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    config::init();
    let conf = config::get();
    if let Err(e) = conf.validate() {
        eprintln!("invalid bridge config: {e}");
        std::process::exit(1);
    }

    let store = store::PostgresStore::new(&conf.db)?;
    store.migrate()?;

    let state = state::BridgeState::new(Arc::new(conf.clone()), Arc::new(store))?;
    let pending_files = state.pending_files.clone();
    state::init(state);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(300));
        loop {
            ticker.tick().await;
            pending_files.cleanup(trackers::PENDING_FILE_MAX_AGE);
        }
    });

    let acceptor = TcpListener::new(&conf.listen_addr).bind().await;
    let service = Service::new(routing::router()).hoop(Logger::new());
    info!(listen_addr = %conf.listen_addr, "bridge is listening");
    Server::new(acceptor).serve(service).await;
    Ok(())
}
