// ── Mode detection ──
//
// Classifies the target from each topology snapshot. Only the node count
// matters; whether the cluster endpoints answer is irrelevant.

use tokio::sync::watch;
use tracing::info;

use crate::model::{Mode, ScopeKind, Topology};

/// Holds the latest topology and the mode derived from it.
pub struct ModeDetector {
    mode: watch::Sender<Option<Mode>>,
    topology: watch::Sender<Option<Topology>>,
}

impl Default for ModeDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeDetector {
    pub fn new() -> Self {
        let (mode, _) = watch::channel(None);
        let (topology, _) = watch::channel(None);
        Self { mode, topology }
    }

    /// Record a fresh topology snapshot and re-classify.
    pub fn observe(&self, topology: Topology) -> Mode {
        let mode = Mode::from_node_count(topology.nodes.len());
        let nodes = topology.nodes.len();
        self.topology.send_replace(Some(topology));
        let previous = self.mode.send_replace(Some(mode));
        if previous != Some(mode) {
            info!(%mode, nodes, "target mode detected");
        }
        mode
    }

    /// Forget everything; used when the connection changes.
    pub fn reset(&self) {
        self.topology.send_replace(None);
        self.mode.send_replace(None);
    }

    /// `None` until the first topology snapshot.
    pub fn mode(&self) -> Option<Mode> {
        *self.mode.borrow()
    }

    pub fn topology(&self) -> Option<Topology> {
        self.topology.borrow().clone()
    }

    /// Without a topology the cluster scope is unavailable; the other
    /// kinds are.
    pub fn is_available(&self, kind: ScopeKind) -> bool {
        match self.mode() {
            Some(mode) => mode.is_available(kind),
            None => kind != ScopeKind::Cluster,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Mode>> {
        self.mode.subscribe()
    }
}
