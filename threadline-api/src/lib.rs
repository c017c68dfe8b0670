use chrono::Utc;

mod comment;
mod error;

pub use comment::{Comment, CommentId, CommentNode, PostId};
pub use error::{Error, ErrorKind};
pub use uuid::{uuid, Uuid};

pub type Time = chrono::DateTime<Utc>;

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

/// Deepest allowed nesting level, top-level comments being at depth 1
pub const MAX_DEPTH: usize = 5;

/// Number of descendant replies from which clients should render a subtree collapsed
pub const AUTO_COLLAPSE_THRESHOLD: usize = 10;

pub const DEFAULT_POST: &str = "post1";

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewComment {
    #[serde(default)]
    pub user: Option<String>,
    /// Missing or null content is kept as `None` and rejected as empty by the store
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub parent_comment_id: Option<CommentId>,
    #[serde(default)]
    pub post_id: Option<PostId>,
}

impl NewComment {
    pub fn new(content: impl Into<String>) -> NewComment {
        NewComment {
            user: None,
            content: Some(content.into()),
            parent_comment_id: None,
            post_id: None,
        }
    }

    pub fn by(mut self, user: impl Into<String>) -> NewComment {
        self.user = Some(user.into());
        self
    }

    pub fn replying_to(mut self, parent: CommentId) -> NewComment {
        self.parent_comment_id = Some(parent);
        self
    }

    pub fn on_post(mut self, post: PostId) -> NewComment {
        self.post_id = Some(post);
        self
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewVote {
    pub comment_id: CommentId,
    #[serde(default)]
    pub delta: i64,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Flat,
    #[default]
    Tree,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CommentQuery {
    #[serde(default)]
    pub view: View,
    #[serde(default)]
    pub post_id: Option<PostId>,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CreatedComment {
    pub comment: Comment,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct VoteTally {
    pub votes: i64,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct FlatView {
    pub comments: Vec<Comment>,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct TreeView {
    pub comments: Vec<CommentNode>,
    pub auto_collapse_threshold: usize,
}
