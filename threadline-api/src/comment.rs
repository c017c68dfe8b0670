use std::fmt;

use crate::{Time, DEFAULT_POST, STUB_UUID};

use uuid::Uuid;

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[serde(transparent)]
pub struct CommentId(pub Uuid);

impl CommentId {
    pub fn new() -> CommentId {
        CommentId(Uuid::new_v4())
    }

    pub fn stub() -> CommentId {
        CommentId(STUB_UUID)
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct PostId(pub String);

impl Default for PostId {
    fn default() -> PostId {
        PostId(String::from(DEFAULT_POST))
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A comment as stored, with its replies referenced by id
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: CommentId,

    #[serde(rename = "user")]
    pub author: String,

    pub timestamp: Time,

    pub content: String,

    #[serde(rename = "parent_comment_id")]
    pub parent_id: Option<CommentId>,

    /// Direct replies, in the order they were posted
    pub replies: Vec<CommentId>,

    pub votes: i64,
}

/// A comment with its replies materialized, as returned by the tree view
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CommentNode {
    pub id: CommentId,

    #[serde(rename = "user")]
    pub author: String,

    pub timestamp: Time,

    pub content: String,

    #[serde(rename = "parent_comment_id")]
    pub parent_id: Option<CommentId>,

    pub replies: Vec<CommentNode>,

    pub votes: i64,
}

impl CommentNode {
    /// Number of replies in the whole subtree, excluding this node
    pub fn descendant_count(&self) -> usize {
        self.replies
            .iter()
            .map(|r| 1 + r.descendant_count())
            .sum()
    }

    pub fn should_collapse(&self, threshold: usize) -> bool {
        self.descendant_count() >= threshold
    }

    pub fn find<'a>(forest: &'a [CommentNode], id: &CommentId) -> Option<&'a CommentNode> {
        for n in forest {
            if n.id == *id {
                return Some(n);
            }
            if let Some(res) = CommentNode::find(&n.replies, id) {
                return Some(res);
            }
        }
        None
    }
}
