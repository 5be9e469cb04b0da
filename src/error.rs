use std::io;
use std::string::FromUtf8Error;

use async_trait::async_trait;
use salvo::http::StatusCode;
use salvo::prelude::{Depot, Json, Request, Response, Writer};
use thiserror::Error;

use crate::MatrixError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("public: `{0}`")]
    Public(String),
    #[error("internal: `{0}`")]
    Internal(String),
    #[error("matrix: `{0}`")]
    Matrix(#[from] MatrixError),
    #[error("mattermost api: `{status}`: `{body}`")]
    Mattermost { status: u16, body: String },
    #[error("salvo internal error: `{0}`")]
    Salvo(#[from] ::salvo::Error),
    #[error("http parse: `{0}`")]
    HttpParse(#[from] salvo::http::ParseError),
    #[error("io: `{0}`")]
    Io(#[from] io::Error),
    #[error("utf8: `{0}`")]
    FromUtf8(#[from] FromUtf8Error),
    #[error("url parse: `{0}`")]
    UrlParse(#[from] url::ParseError),
    #[error("serde json: `{0}`")]
    SerdeJson(#[from] serde_json::error::Error),
    #[error("diesel: `{0}`")]
    Diesel(#[from] diesel::result::Error),
    #[error("pool: `{0}`")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("reqwest: `{0}`")]
    Reqwest(#[from] reqwest::Error),
}

impl AppError {
    pub fn public<S: Into<String>>(msg: S) -> Self {
        Self::Public(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// The Mattermost REST API answered 404 for the referenced resource.
    pub fn is_mm_not_found(&self) -> bool {
        matches!(self, Self::Mattermost { status: 404, .. })
    }
}

#[async_trait]
impl Writer for AppError {
    async fn write(mut self, _req: &mut Request, _depot: &mut Depot, res: &mut Response) {
        let matrix = match self {
            Self::Matrix(e) => e,
            Self::Public(msg) => MatrixError::unknown(msg),
            Self::HttpParse(e) => MatrixError::bad_json(e.to_string()),
            e => {
                error!(error = ?e, "request failed");
                MatrixError::unknown("internal error")
            }
        };
        res.status_code(
            matrix
                .status_code
                .and_then(|c| StatusCode::from_u16(c).ok())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        );
        res.render(Json(&matrix));
    }
}
