//! Retrieval server implementation

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusHandle;
use saltree_core::{AuthenticatedTree, HashAlgorithm, RetrievalConfig};
use tokio::net::TcpListener;

use crate::error::{Result, ServerError};
use crate::routes::create_router;
use crate::state::{load_tree, ServerState, SharedState};

/// HTTP front end over one authenticated tree
pub struct RetrievalServer {
    state: SharedState,
    addr: SocketAddr,
}

impl RetrievalServer {
    pub fn new(state: ServerState, addr: SocketAddr) -> Self {
        Self {
            state: SharedState::new(state),
            addr,
        }
    }

    /// Run until ctrl-c
    pub async fn run(self) -> Result<()> {
        let router = create_router(self.state.clone());

        tracing::info!(addr = %self.addr, "Starting retrieval server");

        let listener = TcpListener::bind(self.addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        if self.state.config().snapshot_path.is_some() {
            self.state.save_snapshot().await?;
        }
        tracing::info!("Server stopped");
        Ok(())
    }

    /// Get the server state for testing
    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Builder for RetrievalServer
pub struct ServerBuilder {
    config: RetrievalConfig,
    addr: SocketAddr,
    tree: Option<AuthenticatedTree<HashAlgorithm>>,
    metrics_handle: Option<PrometheusHandle>,
}

impl ServerBuilder {
    pub fn new(config: RetrievalConfig) -> Self {
        Self {
            config,
            addr: ([127, 0, 0, 1], 3000).into(),
            tree: None,
            metrics_handle: None,
        }
    }

    pub fn addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.addr = ([0, 0, 0, 0], port).into();
        self
    }

    /// Serve this tree instead of loading one from disk
    pub fn tree(mut self, tree: AuthenticatedTree<HashAlgorithm>) -> Self {
        self.tree = Some(tree);
        self
    }

    pub fn metrics_handle(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    pub fn build(self) -> Result<RetrievalServer> {
        let tree = match self.tree {
            Some(tree) => tree,
            None => load_tree(&self.config)?,
        };

        if *tree.hasher() != self.config.hash_algorithm {
            return Err(ServerError::InvalidRequest(format!(
                "tree uses {}, config expects {}",
                tree.hasher(),
                self.config.hash_algorithm
            )));
        }

        let mut state = ServerState::new(self.config, tree);
        if let Some(handle) = self.metrics_handle {
            state = state.with_metrics_handle(handle);
        }

        Ok(RetrievalServer::new(state, self.addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_with_tree() {
        let tree = AuthenticatedTree::build(HashAlgorithm::Blake3, vec![b"x".to_vec()]).unwrap();
        let root = tree.root();
        let server = ServerBuilder::new(RetrievalConfig::default().without_snapshot())
            .port(4000)
            .tree(tree)
            .build()
            .unwrap();
        assert_eq!(server.addr().port(), 4000);
        assert_eq!(server.state().commitment().root, root);
    }

    #[test]
    fn test_builder_rejects_algorithm_mismatch() {
        let tree = AuthenticatedTree::build(HashAlgorithm::Keccak256, vec![b"x".to_vec()]).unwrap();
        let result = ServerBuilder::new(RetrievalConfig::default().without_snapshot())
            .tree(tree)
            .build();
        assert!(matches!(result, Err(ServerError::InvalidRequest(_))));
    }
}
