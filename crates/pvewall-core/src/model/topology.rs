// ── Topology and mode ──

use serde::{Deserialize, Serialize};
use strum::Display;

use super::scope::{GuestType, ScopeId, ScopeKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub name: String,
    pub online: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestInfo {
    pub node: String,
    pub guest_type: GuestType,
    pub vmid: u32,
    pub name: Option<String>,
    pub running: bool,
}

impl GuestInfo {
    pub fn scope(&self) -> ScopeId {
        ScopeId::vm(self.node.clone(), self.guest_type, self.vmid)
    }
}

/// One discovery pass over the remote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub nodes: Vec<NodeInfo>,
    pub guests: Vec<GuestInfo>,
}

impl Topology {
    pub fn host_scopes(&self) -> Vec<ScopeId> {
        self.nodes.iter().map(|n| ScopeId::host(n.name.clone())).collect()
    }

    /// The only node, when there is exactly one.
    pub fn sole_node(&self) -> Option<&str> {
        match self.nodes.as_slice() {
            [only] => Some(only.name.as_str()),
            _ => None,
        }
    }
}

/// Whether the target is a multi-node cluster or a single host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    Cluster,
    Standalone,
}

impl Mode {
    /// Node count alone decides the mode.
    pub fn from_node_count(nodes: usize) -> Self {
        if nodes > 1 {
            Self::Cluster
        } else {
            Self::Standalone
        }
    }

    pub fn available_kinds(self) -> &'static [ScopeKind] {
        match self {
            Self::Cluster => &[
                ScopeKind::Cluster,
                ScopeKind::Host,
                ScopeKind::Vm,
                ScopeKind::SecurityGroup,
            ],
            Self::Standalone => &[ScopeKind::Host, ScopeKind::Vm, ScopeKind::SecurityGroup],
        }
    }

    pub fn is_available(self, kind: ScopeKind) -> bool {
        self.available_kinds().contains(&kind)
    }
}
