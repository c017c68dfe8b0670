use anyhow::{anyhow, Context};
use rand::{seq::SliceRandom, Rng};
use threadline_api::{
    Comment, CommentId, CommentNode, CreatedComment, Error as ApiError, FlatView, NewComment,
    NewVote, PostId, TreeView, Uuid, VoteTally, MAX_DEPTH,
};

const AUTHORS: &[&str] = &["Alice", "Bob", "Carol", "Dave", "Erin", "Frank"];
const MAX_REPLIES_PER_THREAD: usize = 15;
const MAX_VOTES_PER_THREAD: usize = 20;
const MAX_WORDS: usize = 40;

#[derive(structopt::StructOpt)]
struct Opt {
    #[structopt(long, env = "THREADLINE_HOST", default_value = "http://127.0.0.1:5000")]
    host: String,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Post a comment, or a reply when a parent is given
    Post {
        content: String,

        /// Author name
        #[structopt(short, long)]
        user: Option<String>,

        #[structopt(short, long)]
        post: Option<String>,

        /// Comment to reply to
        #[structopt(long)]
        parent: Option<Uuid>,
    },

    /// Vote on a comment and print its new tally
    Vote {
        id: Uuid,

        #[structopt(allow_hyphen_values = true)]
        delta: i64,
    },

    /// Print comments, as a tree by default
    Show {
        /// List every comment by date instead
        #[structopt(long)]
        flat: bool,

        /// Do not collapse large threads
        #[structopt(long)]
        expand: bool,

        /// Only print the thread under this comment, expanded
        #[structopt(long)]
        thread: Option<Uuid>,

        #[structopt(short, long)]
        post: Option<String>,
    },

    /// Fill a post with random threads
    Populate {
        #[structopt(short, long, default_value = "5")]
        threads: usize,

        #[structopt(short, long)]
        post: Option<String>,
    },
}

struct Client {
    http: reqwest::Client,
    host: String,
}

impl Client {
    async fn add_comment(&self, new: &NewComment) -> anyhow::Result<Comment> {
        let resp = self
            .http
            .post(format!("{}/api/comments", self.host))
            .json(new)
            .send()
            .await
            .context("sending comment")?;
        Ok(parse_response::<CreatedComment>(resp).await?.comment)
    }

    async fn vote(&self, comment_id: CommentId, delta: i64) -> anyhow::Result<i64> {
        let resp = self
            .http
            .post(format!("{}/api/vote", self.host))
            .json(&NewVote { comment_id, delta })
            .send()
            .await
            .context("sending vote")?;
        Ok(parse_response::<VoteTally>(resp).await?.votes)
    }

    async fn flat(&self) -> anyhow::Result<Vec<Comment>> {
        let resp = self
            .http
            .get(format!("{}/api/comments", self.host))
            .query(&[("view", "flat")])
            .send()
            .await
            .context("fetching flat comment list")?;
        Ok(parse_response::<FlatView>(resp).await?.comments)
    }

    async fn tree(&self, post: &PostId) -> anyhow::Result<TreeView> {
        let resp = self
            .http
            .get(format!("{}/api/comments", self.host))
            .query(&[("view", "tree"), ("post_id", post.0.as_str())])
            .send()
            .await
            .with_context(|| format!("fetching comment tree of {post}"))?;
        parse_response(resp).await
    }
}

async fn parse_response<T>(resp: reqwest::Response) -> anyhow::Result<T>
where
    T: for<'de> serde::Deserialize<'de>,
{
    if resp.status().is_success() {
        return resp.json().await.context("parsing server response");
    }
    let status = resp.status();
    let body = resp.bytes().await.context("reading error response")?;
    let err = ApiError::parse(&body)
        .with_context(|| format!("server answered {status}: {body:?}"))?;
    Err(err.into())
}

fn print_tree(nodes: &[CommentNode], level: usize, collapse_threshold: Option<usize>) {
    let indent = "    ".repeat(level);
    for n in nodes {
        println!(
            "{indent}[{:+}] {} at {} ({})",
            n.votes,
            n.author,
            n.timestamp.format("%Y-%m-%d %H:%M:%S"),
            n.id
        );
        for line in n.content.lines() {
            println!("{indent}  {line}");
        }
        match collapse_threshold {
            Some(t) if n.should_collapse(t) => {
                println!(
                    "{indent}  [thread collapsed, {} replies]",
                    n.descendant_count()
                )
            }
            _ => print_tree(&n.replies, level + 1, collapse_threshold),
        }
    }
}

fn random_text(rng: &mut impl Rng) -> String {
    lipsum::lipsum_words(rng.gen_range(1..=MAX_WORDS))
}

fn random_author(rng: &mut impl Rng) -> String {
    String::from(*AUTHORS.choose(rng).unwrap_or(&"Anonymous"))
}

async fn populate(client: &Client, post: PostId, threads: usize) -> anyhow::Result<()> {
    let mut rng = rand::thread_rng();
    for _ in 0..threads {
        let root = client
            .add_comment(
                &NewComment::new(random_text(&mut rng))
                    .by(random_author(&mut rng))
                    .on_post(post.clone()),
            )
            .await?;
        // (id, depth) of every comment in this thread
        let mut thread = vec![(root.id, 1)];
        for _ in 0..rng.gen_range(0..=MAX_REPLIES_PER_THREAD) {
            let candidates = thread
                .iter()
                .filter(|(_, depth)| *depth < MAX_DEPTH)
                .copied()
                .collect::<Vec<_>>();
            let Some(&(parent, depth)) = candidates.choose(&mut rng) else {
                break;
            };
            let reply = client
                .add_comment(
                    &NewComment::new(random_text(&mut rng))
                        .by(random_author(&mut rng))
                        .replying_to(parent),
                )
                .await?;
            thread.push((reply.id, depth + 1));
        }
        for _ in 0..rng.gen_range(0..=MAX_VOTES_PER_THREAD) {
            if let Some(&(id, _)) = thread.choose(&mut rng) {
                let delta = if rng.gen_bool(0.7) { 1 } else { -1 };
                client.vote(id, delta).await?;
            }
        }
        tracing::info!(root = %root.id, comments = thread.len(), "created thread");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let opt = <Opt as structopt::StructOpt>::from_args();

    let client = Client {
        http: reqwest::Client::new(),
        host: opt.host,
    };

    match opt.cmd {
        Command::Post {
            content,
            user,
            post,
            parent,
        } => {
            let new = NewComment {
                user,
                content: Some(content),
                parent_comment_id: parent.map(CommentId),
                post_id: post.map(PostId),
            };
            let comment = client.add_comment(&new).await?;
            println!("{}", comment.id);
        }
        Command::Vote { id, delta } => {
            println!("{}", client.vote(CommentId(id), delta).await?);
        }
        Command::Show {
            flat: true,
            ..
        } => {
            for c in client.flat().await? {
                let parent = c.parent_id.map(|p| p.to_string()).unwrap_or_default();
                println!(
                    "{} [{:+}] {}: {} {}",
                    c.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    c.votes,
                    c.author,
                    c.content,
                    parent
                );
            }
        }
        Command::Show {
            flat: false,
            post,
            expand,
            thread,
        } => {
            let tree = client.tree(&post.map(PostId).unwrap_or_default()).await?;
            if let Some(id) = thread {
                let node = CommentNode::find(&tree.comments, &CommentId(id))
                    .ok_or_else(|| anyhow!("comment {id} is not in this post"))?;
                print_tree(std::slice::from_ref(node), 0, None);
                return Ok(());
            }
            if tree.comments.is_empty() {
                println!("No comments yet.");
            }
            let threshold = (!expand).then_some(tree.auto_collapse_threshold);
            print_tree(&tree.comments, 0, threshold);
        }
        Command::Populate { threads, post } => {
            populate(&client, post.map(PostId).unwrap_or_default(), threads).await?;
        }
    }

    Ok(())
}
