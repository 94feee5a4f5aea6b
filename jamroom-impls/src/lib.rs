mod connectors;
mod players;
mod signaling;
mod stores;

pub use connectors::*;
pub use players::*;
pub use signaling::*;
pub use stores::*;
