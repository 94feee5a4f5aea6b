use std::sync::Arc;

use jamroom_collab::Collab;

#[derive(Clone)]
pub struct ServerContext {
    pub collab: Arc<Collab>,
}
