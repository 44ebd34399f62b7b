//! Server state: the tree behind a single-writer lock and the published commitment

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use saltree_core::ot::{self, RecordDisclosure, SenderResponse};
use saltree_core::pir::{self, QueryResponse};
use saltree_core::{
    parse_seed_records, snapshot, AuthenticatedTree, Commitment, HashAlgorithm, RetrievalConfig,
};

use crate::error::{Result, ServerError};
use crate::metrics;

/// Tree shape for monitoring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeStats {
    pub leaves: u64,
    pub tombstones: u64,
    pub height: u64,
    pub epoch: u64,
    pub algorithm: HashAlgorithm,
    pub max_leaves: Option<u64>,
}

/// Shared server state
///
/// Readers take the tree lock shared; `insert` and `tombstone` take it
/// exclusively, so at most one mutation is in flight and every proof is
/// served against a consistent tree. The commitment is swapped while the
/// write lock is still held. Snapshot saves run one at a time since they
/// share a temp file.
pub struct ServerState {
    tree: RwLock<AuthenticatedTree<HashAlgorithm>>,
    commitment: ArcSwap<Commitment>,
    snapshot_lock: Mutex<()>,
    config: RetrievalConfig,
    metrics_handle: Option<PrometheusHandle>,
}

impl ServerState {
    pub fn new(config: RetrievalConfig, tree: AuthenticatedTree<HashAlgorithm>) -> Self {
        let commitment = Commitment::of(&tree, 0);
        publish_shape(&tree, 0);
        Self {
            tree: RwLock::new(tree),
            commitment: ArcSwap::from_pointee(commitment),
            snapshot_lock: Mutex::new(()),
            config,
            metrics_handle: None,
        }
    }

    pub fn with_metrics_handle(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    pub fn metrics_handle(&self) -> Option<&PrometheusHandle> {
        self.metrics_handle.as_ref()
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Current commitment, lock-free
    pub fn commitment(&self) -> Commitment {
        **self.commitment.load()
    }

    pub async fn sender_response(&self, index: u64) -> Result<SenderResponse> {
        let tree = self.tree.read().await;
        Ok(ot::sender_response(&*tree, index)?)
    }

    pub async fn record_disclosure(&self, index: u64) -> Result<RecordDisclosure> {
        let tree = self.tree.read().await;
        Ok(ot::record_disclosure(&*tree, index)?)
    }

    pub async fn query(&self, index: u64) -> Result<QueryResponse> {
        let tree = self.tree.read().await;
        Ok(pir::query(&*tree, index)?)
    }

    /// Append a record and publish the new root
    pub async fn insert(&self, record: Vec<u8>) -> Result<(u64, Commitment)> {
        let mut tree = self.tree.write().await;

        let current = tree.len() as u64;
        if !self.config.allows_insert(current) {
            let max = self.config.max_leaves.unwrap_or(current);
            tracing::warn!(leaves = current, max, "Insert rejected: tree is full");
            return Err(ServerError::CapacityExceeded { max });
        }

        let index = tree.insert(record)?;
        let commitment = self.publish(&tree);
        metrics::record_mutation("insert");

        tracing::info!(
            index,
            leaves = commitment.leaf_count,
            epoch = commitment.epoch,
            root = %commitment.root,
            "Record inserted"
        );
        Ok((index, commitment))
    }

    /// Tombstone a record and publish the new root
    pub async fn tombstone(&self, index: u64) -> Result<Commitment> {
        let mut tree = self.tree.write().await;

        if tree.is_tombstoned(index)? {
            tracing::debug!(index, "Record already tombstoned");
            return Ok(self.commitment());
        }

        tree.tombstone(index)?;
        let commitment = self.publish(&tree);
        metrics::record_mutation("tombstone");

        tracing::info!(
            index,
            epoch = commitment.epoch,
            root = %commitment.root,
            "Record tombstoned"
        );
        Ok(commitment)
    }

    pub async fn stats(&self) -> TreeStats {
        let tree = self.tree.read().await;
        TreeStats {
            leaves: tree.len() as u64,
            tombstones: tree.tombstone_count() as u64,
            height: tree.height() as u64,
            epoch: self.commitment.load().epoch,
            algorithm: *tree.hasher(),
            max_leaves: self.config.max_leaves,
        }
    }

    /// Write the current tree to the configured snapshot path
    pub async fn save_snapshot(&self) -> Result<PathBuf> {
        let path = self
            .config
            .snapshot_path
            .clone()
            .ok_or(ServerError::SnapshotNotConfigured)?;

        let _saving = self.snapshot_lock.lock().await;
        let start = Instant::now();
        let bytes = {
            let tree = self.tree.read().await;
            snapshot::encode(&*tree)
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        metrics::record_snapshot(start.elapsed(), bytes.len());
        tracing::info!(
            path = %path.display(),
            bytes = bytes.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Snapshot written"
        );
        Ok(path)
    }

    fn publish(&self, tree: &AuthenticatedTree<HashAlgorithm>) -> Commitment {
        let epoch = self.commitment.load().epoch + 1;
        let commitment = Commitment::of(tree, epoch);
        self.commitment.store(Arc::new(commitment));
        publish_shape(tree, epoch);
        commitment
    }
}

fn publish_shape(tree: &AuthenticatedTree<HashAlgorithm>, epoch: u64) {
    metrics::set_tree_shape(
        tree.len() as u64,
        tree.tombstone_count() as u64,
        tree.height() as u64,
    );
    metrics::set_epoch(epoch);
}

/// Shared server state type
pub type SharedState = Arc<ServerState>;

/// Create shared state from config and an initial tree
pub fn create_shared_state(
    config: RetrievalConfig,
    tree: AuthenticatedTree<HashAlgorithm>,
) -> SharedState {
    Arc::new(ServerState::new(config, tree))
}

/// Load the tree from the snapshot if one exists, otherwise build it from seed records
pub fn load_tree(config: &RetrievalConfig) -> Result<AuthenticatedTree<HashAlgorithm>> {
    if let Some(path) = config.snapshot_path.as_ref().filter(|p| p.exists()) {
        let start = Instant::now();
        let tree = snapshot::load(config.hash_algorithm, path)?;
        tracing::info!(
            path = %path.display(),
            leaves = tree.len(),
            root = %tree.root(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Tree loaded from snapshot"
        );
        return Ok(tree);
    }

    if let Some(path) = config.seed_records_path.as_ref().filter(|p| p.exists()) {
        let content = std::fs::read_to_string(path)?;
        let records = parse_seed_records(&content)?;
        let tree = AuthenticatedTree::build(config.hash_algorithm, records)?;
        tracing::info!(
            path = %path.display(),
            leaves = tree.len(),
            root = %tree.root(),
            "Tree built from seed records"
        );
        return Ok(tree);
    }

    Err(ServerError::NoInitialRecords)
}
