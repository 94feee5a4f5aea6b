use std::{
    env,
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};

use axum::{routing::get, Router};
use log::info;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use jamroom_collab::Collab;

mod context;
mod docs;
mod errors;
mod gateway;
mod logging;
mod rooms;
mod schemas;
mod serialized;
mod sse;

pub use context::ServerContext;
pub use logging::init_logger;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9150;

/// Starts the jamroom server
pub async fn run_server(collab: Arc<Collab>) {
    let port = env::var("JAMROOM_SERVER_PORT")
        .map(|x| x.parse::<u16>().expect("Port must be a number"))
        .unwrap_or(DEFAULT_PORT);

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let context = ServerContext { collab };

    let version_one_router = Router::new()
        .merge(rooms::router())
        .merge(gateway::router())
        .merge(sse::router());

    let root_router = Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(context);

    let listener = TcpListener::bind(&addr).await.expect("listens on address");

    info!("jamroom server listening on port {}", port);

    axum::serve(listener, root_router.into_make_service())
        .await
        .expect("server runs");
}
