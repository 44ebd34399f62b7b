//! saltree-server: verified record retrieval over HTTP
//!
//! Holds one authenticated tree in memory, serves the published root,
//! sender responses and query responses for it, and accepts appends and
//! tombstones from a single writer at a time.

pub mod error;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ServerError;
pub use routes::create_router;
pub use server::{RetrievalServer, ServerBuilder};
pub use state::{create_shared_state, load_tree, ServerState, SharedState, TreeStats};
