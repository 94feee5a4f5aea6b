use std::sync::Arc;

use jamroom_collab::Collab;
use jamroom_server::{init_logger, run_server};

#[tokio::main]
async fn main() {
    init_logger();

    let collab = Arc::new(Collab::new_in_memory());

    run_server(collab).await
}
