use std::net::SocketAddr;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

mod error;
mod fuzz;
mod handlers;
mod projector;
mod store;

pub use error::Error;
pub use store::CommentStore;

#[derive(structopt::StructOpt)]
struct Opt {
    /// Address to listen on
    #[structopt(long, env = "THREADLINE_LISTEN", default_value = "127.0.0.1:5000")]
    listen: SocketAddr,

    /// Start with an empty store instead of the sample thread
    #[structopt(long)]
    no_seed: bool,
}

pub fn app(store: CommentStore) -> Router {
    Router::new()
        .route(
            "/api/comments",
            get(handlers::list_comments).post(handlers::add_comment),
        )
        .route("/api/vote", post(handlers::vote))
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let opt = <Opt as structopt::StructOpt>::from_args();

    let store = CommentStore::new();
    if !opt.no_seed {
        store.seed().context("seeding comment store")?;
    }

    tracing::info!("listening on {}", opt.listen);
    axum::Server::bind(&opt.listen)
        .serve(app(store).into_make_service())
        .await
        .context("serving axum webserver")
}
