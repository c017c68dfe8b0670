use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use parking_lot::Mutex;
use threadline_api::{
    Comment, CommentId, CommentNode, Error, NewComment, PostId, Time, DEFAULT_POST, MAX_DEPTH,
};

use crate::projector;

const ANONYMOUS: &str = "Anonymous";

/// Shared comment store
///
/// Every operation, reads included, runs under the one store-wide lock: the
/// depth and placement checks span several comments and must see a frozen store.
#[derive(Clone, Debug, Default)]
pub struct CommentStore(Arc<Mutex<State>>);

#[derive(Debug, Default)]
struct State {
    /// Top-level comment ids of each post, in posting order
    posts: HashMap<PostId, Vec<CommentId>>,
    comments: HashMap<CommentId, Comment>,
    /// All comment ids in creation order
    created: Vec<CommentId>,
    last_timestamp: Option<Time>,
}

impl CommentStore {
    pub fn new() -> CommentStore {
        CommentStore::default()
    }

    pub fn add_comment(&self, new: NewComment) -> Result<Comment, Error> {
        self.0.lock().add_comment(new)
    }

    pub fn vote(&self, id: CommentId, delta: i64) -> Result<i64, Error> {
        self.0.lock().vote(id, delta)
    }

    pub fn flat(&self) -> Vec<Comment> {
        let state = self.0.lock();
        projector::flat(&state.comments, &state.created)
    }

    pub fn tree(&self, post: &PostId) -> Vec<CommentNode> {
        let state = self.0.lock();
        let roots = state.posts.get(post).map(|r| &r[..]).unwrap_or(&[]);
        projector::tree(&state.comments, roots)
    }

    /// Reset the store to the sample dataset: one post with a three-comment chain
    pub fn seed(&self) -> Result<(), Error> {
        let mut state = self.0.lock();
        *state = State::default();
        let post = PostId::default();
        state.posts.insert(post.clone(), Vec::new());
        let alice = state.insert("Alice", "This is a great post!", None, &post)?.id;
        let bob = state.insert("Bob", "I agree with Alice", Some(alice), &post)?.id;
        state.insert("Carol", "Replying to Bob", Some(bob), &post)?;
        tracing::info!(post = DEFAULT_POST, "seeded comment store with sample thread");
        Ok(())
    }

    #[cfg(test)]
    pub fn test_num_comments(&self) -> usize {
        self.0.lock().comments.len()
    }

    #[cfg(test)]
    pub fn test_get(&self, id: CommentId) -> Option<Comment> {
        self.0.lock().comments.get(&id).cloned()
    }
}

impl State {
    fn add_comment(&mut self, new: NewComment) -> Result<Comment, Error> {
        let content = new.content.as_deref().unwrap_or_default().trim();
        if content.is_empty() {
            return Err(Error::EmptyContent);
        }
        let author = match new.user {
            Some(u) if !u.trim().is_empty() => u,
            _ => String::from(ANONYMOUS),
        };
        if let Some(parent) = new.parent_comment_id {
            if !self.comments.contains_key(&parent) {
                return Err(Error::ParentNotFound(parent));
            }
            if self.depth(parent) + 1 > MAX_DEPTH {
                return Err(Error::MaxDepthExceeded);
            }
        }
        let post = new.post_id.unwrap_or_default();
        self.insert(&author, content, new.parent_comment_id, &post)
    }

    fn vote(&mut self, id: CommentId, delta: i64) -> Result<i64, Error> {
        let comment = self
            .comments
            .get_mut(&id)
            .ok_or(Error::CommentNotFound(id))?;
        comment.votes = comment.votes.saturating_add(delta);
        tracing::debug!(%id, delta, votes = comment.votes, "vote recorded");
        Ok(comment.votes)
    }

    /// Depth of an existing comment, walking parent links up to its root
    fn depth(&self, id: CommentId) -> usize {
        let mut depth = 1;
        let mut cur = self.comments.get(&id);
        while let Some(parent) = cur.and_then(|c| c.parent_id) {
            depth += 1;
            cur = self.comments.get(&parent);
        }
        depth
    }

    /// Insert without content or depth validation
    ///
    /// Fails before any write if the parent does not exist.
    fn insert(
        &mut self,
        author: &str,
        content: &str,
        parent_id: Option<CommentId>,
        post: &PostId,
    ) -> Result<Comment, Error> {
        let siblings = match parent_id {
            Some(p) => {
                &mut self
                    .comments
                    .get_mut(&p)
                    .ok_or(Error::ParentNotFound(p))?
                    .replies
            }
            None => self.posts.entry(post.clone()).or_default(),
        };
        let id = CommentId::new();
        siblings.push(id);
        let comment = Comment {
            id,
            author: String::from(author),
            timestamp: self.next_timestamp(),
            content: String::from(content),
            parent_id,
            replies: Vec::new(),
            votes: 0,
        };
        self.comments.insert(id, comment.clone());
        self.created.push(id);
        tracing::debug!(%id, ?parent_id, %post, "comment added");
        Ok(comment)
    }

    /// Current time, never earlier than the previously assigned timestamp
    fn next_timestamp(&mut self) -> Time {
        let now = Utc::now();
        let ts = match self.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use threadline_api::AUTO_COLLAPSE_THRESHOLD;

    use super::*;

    fn post(store: &CommentStore, user: &str, content: &str) -> Comment {
        store
            .add_comment(NewComment::new(content).by(user))
            .expect("adding top-level comment")
    }

    fn reply(store: &CommentStore, parent: CommentId, content: &str) -> Result<Comment, Error> {
        store.add_comment(NewComment::new(content).by("replier").replying_to(parent))
    }

    /// Build a chain of `len` comments, each replying to the previous one
    fn chain(store: &CommentStore, len: usize) -> Vec<CommentId> {
        let mut ids = vec![post(store, "root", "root").id];
        for i in 1..len {
            let parent = *ids.last().unwrap();
            ids.push(reply(store, parent, &format!("level {}", i + 1)).unwrap().id);
        }
        ids
    }

    #[test]
    fn top_level_comments_become_roots_in_order() {
        let store = CommentStore::new();
        let ids = (0..4)
            .map(|i| post(&store, "a", &format!("comment {i}")).id)
            .collect::<Vec<_>>();
        let tree = store.tree(&PostId::default());
        assert_eq!(tree.iter().map(|n| n.id).collect::<Vec<_>>(), ids);
        assert!(tree.iter().all(|n| n.replies.is_empty()));
    }

    #[test]
    fn content_is_trimmed_and_blank_rejected() {
        let store = CommentStore::new();
        let c = post(&store, "a", "  hello \n");
        assert_eq!(c.content, "hello");
        assert_eq!(
            store.add_comment(NewComment::new(" \t\n ")),
            Err(Error::EmptyContent)
        );
        assert_eq!(store.test_num_comments(), 1);
    }

    #[test]
    fn blank_author_becomes_anonymous() {
        let store = CommentStore::new();
        assert_eq!(
            store.add_comment(NewComment::new("x")).unwrap().author,
            "Anonymous"
        );
        assert_eq!(
            store.add_comment(NewComment::new("x").by("   ")).unwrap().author,
            "Anonymous"
        );
        assert_eq!(
            store.add_comment(NewComment::new("x").by("Dan")).unwrap().author,
            "Dan"
        );
    }

    #[test]
    fn reply_is_placed_once_under_its_parent() {
        let store = CommentStore::new();
        let root = post(&store, "Alice", "root");
        let other = post(&store, "Alice", "other");
        let child = reply(&store, root.id, "child").unwrap();
        assert_eq!(child.parent_id, Some(root.id));

        assert_eq!(store.test_get(root.id).unwrap().replies, vec![child.id]);
        assert!(store.test_get(other.id).unwrap().replies.is_empty());
        let tree = store.tree(&PostId::default());
        assert_eq!(
            tree.iter().map(|n| n.id).collect::<Vec<_>>(),
            vec![root.id, other.id]
        );
        assert_eq!(tree[0].replies.len(), 1);
        assert_eq!(tree[0].replies[0].id, child.id);
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let store = CommentStore::new();
        post(&store, "a", "root");
        let missing = CommentId::new();
        assert_eq!(
            reply(&store, missing, "orphan"),
            Err(Error::ParentNotFound(missing))
        );
        assert_eq!(store.test_num_comments(), 1);
    }

    #[test]
    fn missing_content_is_empty_content() {
        let store = CommentStore::new();
        let mut new = NewComment::new("ignored").by("x");
        new.content = None;
        assert_eq!(store.add_comment(new), Err(Error::EmptyContent));
        assert_eq!(store.test_num_comments(), 0);
    }

    #[test]
    fn insert_under_missing_parent_writes_nothing() {
        let store = CommentStore::new();
        let root = post(&store, "a", "root");
        let missing = CommentId::new();
        let res = store
            .0
            .lock()
            .insert("b", "stray", Some(missing), &PostId::default());
        assert_eq!(res, Err(Error::ParentNotFound(missing)));
        assert_eq!(store.test_num_comments(), 1);
        assert_eq!(store.flat().len(), 1);
        let tree = store.tree(&PostId::default());
        assert_eq!(tree.iter().map(|n| n.id).collect::<Vec<_>>(), vec![root.id]);
        assert!(tree[0].replies.is_empty());
    }

    #[test]
    fn depth_limit_allows_exactly_max_depth() {
        let store = CommentStore::new();
        let ids = chain(&store, MAX_DEPTH);
        assert_eq!(store.test_num_comments(), MAX_DEPTH);

        let deepest = *ids.last().unwrap();
        assert_eq!(reply(&store, deepest, "too deep"), Err(Error::MaxDepthExceeded));
        assert_eq!(store.test_num_comments(), MAX_DEPTH);
        assert!(store.test_get(deepest).unwrap().replies.is_empty());

        // siblings at an allowed depth are still accepted
        assert!(reply(&store, ids[MAX_DEPTH - 2], "sibling").is_ok());
    }

    #[test]
    fn votes_accumulate_and_revert() {
        let store = CommentStore::new();
        let a = post(&store, "a", "a");
        let b = post(&store, "b", "b");
        assert_eq!(store.vote(a.id, 1), Ok(1));
        assert_eq!(store.vote(a.id, -1), Ok(0));
        assert_eq!(store.vote(a.id, -1), Ok(-1));
        assert_eq!(store.vote(a.id, 1), Ok(0));
        assert_eq!(store.vote(b.id, 7), Ok(7));
        assert_eq!(store.vote(b.id, 0), Ok(7));

        let missing = CommentId::new();
        assert_eq!(store.vote(missing, 1), Err(Error::CommentNotFound(missing)));
        assert_eq!(store.test_get(a.id).unwrap().votes, 0);
        assert_eq!(store.test_get(b.id).unwrap().votes, 7);
    }

    #[test]
    fn vote_saturates() {
        let store = CommentStore::new();
        let a = post(&store, "a", "a");
        assert_eq!(store.vote(a.id, i64::MAX), Ok(i64::MAX));
        assert_eq!(store.vote(a.id, 1), Ok(i64::MAX));
    }

    #[test]
    fn flat_is_in_creation_order_across_threads() {
        let store = CommentStore::new();
        let first = post(&store, "a", "first");
        let second = post(&store, "b", "second");
        let third = reply(&store, first.id, "third").unwrap();
        let fourth = reply(&store, third.id, "fourth").unwrap();
        let flat = store.flat();
        assert_eq!(
            flat.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![first.id, second.id, third.id, fourth.id]
        );
        assert!(flat.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn posts_are_separate_namespaces() {
        let store = CommentStore::new();
        let other = PostId(String::from("post2"));
        let a = post(&store, "a", "on post1");
        let b = store
            .add_comment(NewComment::new("on post2").on_post(other.clone()))
            .unwrap();
        assert_eq!(
            store.tree(&PostId::default()).iter().map(|n| n.id).collect::<Vec<_>>(),
            vec![a.id]
        );
        assert_eq!(
            store.tree(&other).iter().map(|n| n.id).collect::<Vec<_>>(),
            vec![b.id]
        );
        assert!(store.tree(&PostId(String::from("nope"))).is_empty());
        assert_eq!(store.flat().len(), 2);
    }

    #[test]
    fn seed_resets_to_three_deep_chain() {
        let store = CommentStore::new();
        post(&store, "x", "gone after seed");
        store.seed().unwrap();
        store.seed().unwrap();
        assert_eq!(store.test_num_comments(), 3);
        let tree = store.tree(&PostId::default());
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].author, "Alice");
        assert_eq!(tree[0].replies[0].author, "Bob");
        assert_eq!(tree[0].replies[0].replies[0].author, "Carol");
        assert!(tree[0].replies[0].replies[0].replies.is_empty());
        assert_eq!(tree[0].descendant_count(), 2);
        assert!(!tree[0].should_collapse(AUTO_COLLAPSE_THRESHOLD));
    }

    #[test]
    fn concurrent_writers_keep_placement_unique() {
        let store = CommentStore::new();
        let root = post(&store, "a", "root");
        let handles = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let c = store
                            .add_comment(
                                NewComment::new(format!("{t}-{i}")).replying_to(root.id),
                            )
                            .unwrap();
                        store.vote(c.id, 1).unwrap();
                        store.vote(root.id, 1).unwrap();
                    }
                })
            })
            .collect::<Vec<_>>();
        for h in handles {
            h.join().unwrap();
        }

        let root = store.test_get(root.id).unwrap();
        assert_eq!(root.replies.len(), 400);
        assert_eq!(root.votes, 400);
        assert_eq!(root.replies.iter().collect::<HashSet<_>>().len(), 400);
        let flat = store.flat();
        assert_eq!(flat.len(), 401);
        assert!(flat.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }
}
