use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use threadline_api::{
    CommentQuery, CreatedComment, FlatView, NewComment, NewVote, TreeView, View, VoteTally,
    AUTO_COLLAPSE_THRESHOLD,
};

use crate::{CommentStore, Error};

pub async fn list_comments(
    State(store): State<CommentStore>,
    query: Result<Query<CommentQuery>, QueryRejection>,
) -> Result<Response, Error> {
    let Query(query) = query?;
    Ok(match query.view {
        View::Flat => Json(FlatView {
            comments: store.flat(),
        })
        .into_response(),
        View::Tree => Json(TreeView {
            comments: store.tree(&query.post_id.unwrap_or_default()),
            auto_collapse_threshold: AUTO_COLLAPSE_THRESHOLD,
        })
        .into_response(),
    })
}

pub async fn add_comment(
    State(store): State<CommentStore>,
    data: Result<Json<NewComment>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedComment>), Error> {
    let Json(data) = data?;
    let comment = store.add_comment(data)?;
    Ok((StatusCode::CREATED, Json(CreatedComment { comment })))
}

pub async fn vote(
    State(store): State<CommentStore>,
    data: Result<Json<NewVote>, JsonRejection>,
) -> Result<Json<VoteTally>, Error> {
    let Json(data) = data?;
    Ok(Json(VoteTally {
        votes: store.vote(data.comment_id, data.delta)?,
    }))
}
