//! Read-side views over the store's parent-linked comments

use std::collections::HashMap;

use threadline_api::{Comment, CommentId, CommentNode};

/// All comments, oldest first
///
/// `created` is the insertion order, used to break timestamp ties.
pub fn flat(comments: &HashMap<CommentId, Comment>, created: &[CommentId]) -> Vec<Comment> {
    let mut res = created
        .iter()
        .filter_map(|id| lookup(comments, id))
        .cloned()
        .collect::<Vec<_>>();
    // stable, so equal timestamps keep insertion order
    res.sort_by_key(|c| c.timestamp);
    res
}

/// The reply trees rooted at `roots`, children in reply order
pub fn tree(comments: &HashMap<CommentId, Comment>, roots: &[CommentId]) -> Vec<CommentNode> {
    roots
        .iter()
        .filter_map(|id| lookup(comments, id))
        .map(|c| node(comments, c))
        .collect()
}

fn node(comments: &HashMap<CommentId, Comment>, c: &Comment) -> CommentNode {
    CommentNode {
        id: c.id,
        author: c.author.clone(),
        timestamp: c.timestamp,
        content: c.content.clone(),
        parent_id: c.parent_id,
        replies: tree(comments, &c.replies),
        votes: c.votes,
    }
}

fn lookup<'a>(comments: &'a HashMap<CommentId, Comment>, id: &CommentId) -> Option<&'a Comment> {
    let res = comments.get(id);
    if res.is_none() {
        tracing::error!(%id, "dangling comment reference in store");
    }
    res
}
