use std::str::FromStr;

use anyhow::{anyhow, Context};
use serde_json::json;
use uuid::Uuid;

use crate::CommentId;

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("empty content")]
    EmptyContent,

    #[error("parent not found")]
    ParentNotFound(CommentId),

    #[error("comment not found")]
    CommentNotFound(CommentId),

    #[error("max reply depth exceeded")]
    MaxDepthExceeded,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    DepthExceeded,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::EmptyContent => ErrorKind::Validation,
            Error::ParentNotFound(_) => ErrorKind::NotFound,
            Error::CommentNotFound(_) => ErrorKind::NotFound,
            Error::MaxDepthExceeded => ErrorKind::DepthExceeded,
        }
    }

    pub fn status_code(&self) -> http::StatusCode {
        use http::StatusCode;
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::DepthExceeded => StatusCode::BAD_REQUEST,
        }
    }

    pub fn contents(&self) -> Vec<u8> {
        let msg = self.to_string();
        serde_json::to_vec(&match self {
            Error::ParentNotFound(id) | Error::CommentNotFound(id) => json!({
                "error": msg,
                "id": id,
            }),
            Error::EmptyContent | Error::MaxDepthExceeded => json!({ "error": msg }),
        })
        .expect("serializing error")
    }

    pub fn parse(body: &[u8]) -> anyhow::Result<Error> {
        let data: serde_json::Value =
            serde_json::from_slice(body).context("parsing error contents")?;
        let msg = data
            .get("error")
            .and_then(|e| e.as_str())
            .ok_or_else(|| anyhow!("error message is not a string"))?;
        let id = || {
            data.get("id")
                .and_then(|id| id.as_str())
                .and_then(|id| Uuid::from_str(id).ok())
                .map(CommentId)
                .ok_or_else(|| anyhow!("error is {msg:?} without a proper comment id"))
        };
        Ok(match msg {
            "empty content" => Error::EmptyContent,
            "parent not found" => Error::ParentNotFound(id()?),
            "comment not found" => Error::CommentNotFound(id()?),
            "max reply depth exceeded" => Error::MaxDepthExceeded,
            _ => return Err(anyhow!("server returned an unknown error: {msg}")),
        })
    }
}
