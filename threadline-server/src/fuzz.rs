#![cfg(test)]

use axum::{
    http::{self, request},
    Router,
};
use std::{
    cmp,
    collections::{HashMap, HashSet},
    fmt::Debug,
    ops::RangeTo,
    panic::AssertUnwindSafe,
};
use threadline_api::{
    CommentId, CommentNode, CreatedComment, Error as ApiError, FlatView, NewComment, NewVote,
    PostId, TreeView, VoteTally, MAX_DEPTH,
};
use bolero::generator::TypeGenerator;
use tower::{Service, ServiceExt};

use crate::*;

macro_rules! do_tokio_test {
    ( $name:ident, $gen:expr, $fn:expr ) => {
        #[test]
        fn $name() {
            let runtime = AssertUnwindSafe(
                tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed initializing tokio runtime"),
            );
            bolero::check!()
                .with_generator($gen)
                .cloned()
                .for_each(move |v| {
                    let () = runtime.block_on($fn(v));
                })
        }
    };
}

async fn call<Req, Resp>(
    app: &mut Router,
    req: request::Request<axum::body::Body>,
    req_body: &Req,
) -> Result<Resp, ApiError>
where
    Req: Debug,
    Resp: for<'de> serde::Deserialize<'de>,
{
    app.ready().await.expect("waiting for app to be ready");
    let resp = app.call(req).await.expect("running request");
    let status = resp.status();
    let body = hyper::body::to_bytes(resp.into_body())
        .await
        .expect("recovering resp bytes");
    if status.is_success() {
        return Ok(serde_json::from_slice(&body).unwrap_or_else(|err| {
            panic!(
                r#"
                    Failed parsing resp body!

                    The error is the following:
                    ---
                    {err}
                    ---

                    Response body is:
                    ---
                    {body:?}
                    ---

                    Request was:
                    ---
                    {req_body:?}
                    ---
                "#
            )
        }));
    }
    Err(ApiError::parse(&body)
        .unwrap_or_else(|err| panic!("parsing error response body {err}, body is {body:?}")))
}

async fn run_on_app<Req, Resp>(
    app: &mut Router,
    method: &str,
    uri: &str,
    body: &Req,
) -> Result<Resp, ApiError>
where
    Req: Debug + serde::Serialize,
    Resp: for<'de> serde::Deserialize<'de>,
{
    let req = request::Builder::new()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from(
            serde_json::to_vec(body).expect("serializing request body to json"),
        ))
        .expect("building request");
    call(app, req, body).await
}

fn resize_int(fuzz_id: usize, RangeTo { end }: RangeTo<usize>) -> Option<usize> {
    if end == 0 {
        return None;
    }
    let bucket_size = cmp::max(1, usize::MAX / end); // in case we rounded to 0
    let id = fuzz_id / bucket_size;
    Some(cmp::min(id, end - 1)) // in case id was actually over end - 1 due to rounding
}

#[derive(Clone, Debug, bolero::generator::TypeGenerator)]
enum FuzzOp {
    AddComment {
        #[generator(bolero::generator::gen_with::<String>().len(0..12usize))]
        user: String,
        #[generator(bolero::generator::gen_with::<String>().len(0..40usize))]
        content: String,
        parent: Option<usize>,
        other_post: bool,
    },
    ReplyToMissing,
    Vote {
        cid: usize,
        delta: i8,
    },
    VoteMissing {
        delta: i8,
    },
}

/// What the fuzzer expects the server to hold for one comment
struct Known {
    id: CommentId,
    depth: usize,
    votes: i64,
}

struct Fuzzer {
    app: Router,
    /// In creation order
    known: Vec<Known>,
}

impl Fuzzer {
    fn new() -> Fuzzer {
        Fuzzer {
            app: app(CommentStore::new()),
            known: Vec::new(),
        }
    }

    async fn execute_fuzz_op(&mut self, op: FuzzOp) {
        match op {
            FuzzOp::AddComment {
                user,
                content,
                parent,
                other_post,
            } => {
                let parent = parent
                    .and_then(|p| resize_int(p, ..self.known.len()))
                    .map(|p| (self.known[p].id, self.known[p].depth));
                let post = match other_post {
                    true => PostId(String::from("post2")),
                    false => PostId::default(),
                };
                let mut new = NewComment::new(content.clone())
                    .by(user.clone())
                    .on_post(post);
                new.parent_comment_id = parent.map(|(id, _)| id);
                let expected = if content.trim().is_empty() {
                    Err(ApiError::EmptyContent)
                } else if parent.map_or(false, |(_, d)| d + 1 > MAX_DEPTH) {
                    Err(ApiError::MaxDepthExceeded)
                } else {
                    Ok(())
                };
                let res: Result<CreatedComment, ApiError> =
                    run_on_app(&mut self.app, "POST", "/api/comments", &new).await;
                match (res, expected) {
                    (Ok(CreatedComment { comment }), Ok(())) => {
                        let author = match user.trim().is_empty() {
                            true => "Anonymous",
                            false => user.as_str(),
                        };
                        assert_eq!(comment.author, author);
                        assert_eq!(comment.content, content.trim());
                        assert_eq!(comment.parent_id, new.parent_comment_id);
                        assert_eq!(comment.votes, 0);
                        assert!(comment.replies.is_empty());
                        self.known.push(Known {
                            id: comment.id,
                            depth: parent.map_or(1, |(_, d)| d + 1),
                            votes: 0,
                        });
                    }
                    (res, expected) => {
                        assert_eq!(res.map(|_| ()), expected, "adding {new:?}")
                    }
                }
            }
            FuzzOp::ReplyToMissing => {
                let missing = CommentId::new();
                let new = NewComment::new("orphan").replying_to(missing);
                let res: Result<CreatedComment, ApiError> =
                    run_on_app(&mut self.app, "POST", "/api/comments", &new).await;
                assert_eq!(res.map(|_| ()), Err(ApiError::ParentNotFound(missing)));
            }
            FuzzOp::Vote { cid, delta } => {
                if let Some(cid) = resize_int(cid, ..self.known.len()) {
                    let k = &mut self.known[cid];
                    let vote = NewVote {
                        comment_id: k.id,
                        delta: i64::from(delta),
                    };
                    k.votes = k.votes.saturating_add(vote.delta);
                    let expected = k.votes;
                    let res: Result<VoteTally, ApiError> =
                        run_on_app(&mut self.app, "POST", "/api/vote", &vote).await;
                    assert_eq!(res, Ok(VoteTally { votes: expected }));
                }
            }
            FuzzOp::VoteMissing { delta } => {
                let missing = CommentId::new();
                let vote = NewVote {
                    comment_id: missing,
                    delta: i64::from(delta),
                };
                let res: Result<VoteTally, ApiError> =
                    run_on_app(&mut self.app, "POST", "/api/vote", &vote).await;
                assert_eq!(res, Err(ApiError::CommentNotFound(missing)));
            }
        }
    }

    async fn check_invariants(&mut self) {
        let flat: FlatView = run_on_app(&mut self.app, "GET", "/api/comments?view=flat", &())
            .await
            .expect("fetching flat view");
        assert_eq!(
            flat.comments.iter().map(|c| c.id).collect::<Vec<_>>(),
            self.known.iter().map(|k| k.id).collect::<Vec<_>>(),
            "flat view is not in creation order"
        );
        assert!(flat
            .comments
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp));
        for (c, k) in flat.comments.iter().zip(self.known.iter()) {
            assert_eq!(c.votes, k.votes);
        }

        let by_id = flat
            .comments
            .iter()
            .map(|c| (c.id, c))
            .collect::<HashMap<_, _>>();
        let depths = self
            .known
            .iter()
            .map(|k| (k.id, k.depth))
            .collect::<HashMap<_, _>>();
        let mut seen = HashSet::new();
        for post in ["post1", "post2"] {
            let tree: TreeView = run_on_app(
                &mut self.app,
                "GET",
                &format!("/api/comments?view=tree&post_id={post}"),
                &(),
            )
            .await
            .expect("fetching tree view");
            check_nodes(&tree.comments, None, 1, &by_id, &depths, &mut seen);
        }
        assert_eq!(seen.len(), flat.comments.len(), "some comments are in no tree");
    }
}

fn check_nodes(
    nodes: &[CommentNode],
    parent: Option<CommentId>,
    depth: usize,
    by_id: &HashMap<CommentId, &threadline_api::Comment>,
    depths: &HashMap<CommentId, usize>,
    seen: &mut HashSet<CommentId>,
) {
    for n in nodes {
        assert!(depth <= MAX_DEPTH, "comment {} is deeper than {MAX_DEPTH}", n.id);
        assert!(seen.insert(n.id), "comment {} placed twice", n.id);
        let stored = by_id
            .get(&n.id)
            .unwrap_or_else(|| panic!("tree references unknown comment {}", n.id));
        assert_eq!(n.parent_id, parent);
        assert_eq!(stored.parent_id, parent);
        assert_eq!(depths.get(&n.id), Some(&depth));
        assert_eq!(n.votes, stored.votes);
        assert_eq!(
            n.replies.iter().map(|r| r.id).collect::<Vec<_>>(),
            stored.replies,
        );
        check_nodes(&n.replies, Some(n.id), depth + 1, by_id, depths, seen);
    }
}

do_tokio_test!(
    random_operations_keep_store_consistent,
    bolero::generator::gen_with::<Vec<FuzzOp>>().len(1..60usize),
    |test: Vec<FuzzOp>| async move {
        let mut fuzzer = Fuzzer::new();
        for op in test {
            fuzzer.execute_fuzz_op(op).await;
            fuzzer.check_invariants().await;
        }
    }
);
