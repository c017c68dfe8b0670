use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{header, StatusCode},
};
use serde_json::json;
use threadline_api::Error as ApiError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Json(#[from] JsonRejection),

    #[error(transparent)]
    Query(#[from] QueryRejection),
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Api(err) => err.status_code(),
            Error::Json(rej) => rej.status(),
            Error::Query(rej) => rej.status(),
        }
    }

    fn contents(&self) -> Vec<u8> {
        match self {
            Error::Api(err) => err.contents(),
            Error::Json(rej) => malformed(rej.body_text()),
            Error::Query(rej) => malformed(rej.body_text()),
        }
    }
}

fn malformed(msg: String) -> Vec<u8> {
    serde_json::to_vec(&json!({ "error": msg })).expect("serializing rejection")
}

impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        match &self {
            Error::Api(err) => tracing::info!("returning error to client: {err}"),
            rej => tracing::info!("rejecting malformed request: {rej}"),
        }
        (
            self.status_code(),
            [(header::CONTENT_TYPE, "application/json")],
            self.contents(),
        )
            .into_response()
    }
}
