// ── Scope identity ──
//
// A scope is one independently-ordered rule list. `ScopeId` is the key
// for every store, batch result and drag controller in the engine, and
// has a stable textual form used by the CLI and in logs:
//
//   cluster | host/<node> | vm/<node>/<qemu|lxc>/<vmid> | group/<name>

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// The four kinds of rule list.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScopeKind {
    Cluster,
    Host,
    Vm,
    #[serde(rename = "group")]
    #[strum(serialize = "group")]
    SecurityGroup,
}

/// Guest flavour: full VM or container.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GuestType {
    Qemu,
    Lxc,
}

/// Identifies one rule list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ScopeId {
    Cluster,
    Host {
        node: String,
    },
    Vm {
        node: String,
        guest_type: GuestType,
        vmid: u32,
    },
    SecurityGroup {
        name: String,
    },
}

impl ScopeId {
    pub fn host(node: impl Into<String>) -> Self {
        Self::Host { node: node.into() }
    }

    pub fn vm(node: impl Into<String>, guest_type: GuestType, vmid: u32) -> Self {
        Self::Vm {
            node: node.into(),
            guest_type,
            vmid,
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::SecurityGroup { name: name.into() }
    }

    pub fn kind(&self) -> ScopeKind {
        match self {
            Self::Cluster => ScopeKind::Cluster,
            Self::Host { .. } => ScopeKind::Host,
            Self::Vm { .. } => ScopeKind::Vm,
            Self::SecurityGroup { .. } => ScopeKind::SecurityGroup,
        }
    }

    /// Whether this scope carries an options document.
    pub fn has_options(&self) -> bool {
        !matches!(self, Self::SecurityGroup { .. })
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cluster => f.write_str("cluster"),
            Self::Host { node } => write!(f, "host/{node}"),
            Self::Vm {
                node,
                guest_type,
                vmid,
            } => write!(f, "vm/{node}/{guest_type}/{vmid}"),
            Self::SecurityGroup { name } => write!(f, "group/{name}"),
        }
    }
}

/// Returned when a textual scope does not match any known shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid scope '{input}': expected cluster, host/<node>, vm/<node>/<qemu|lxc>/<vmid> or group/<name>")]
pub struct ParseScopeError {
    input: String,
}

impl FromStr for ScopeId {
    type Err = ParseScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseScopeError {
            input: s.to_owned(),
        };
        let parts: Vec<&str> = s.trim().split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(err());
        }

        match parts.as_slice() {
            ["cluster"] => Ok(Self::Cluster),
            ["host", node] => Ok(Self::host(*node)),
            ["vm", node, guest_type, vmid] => {
                let guest_type = guest_type.parse().map_err(|_| err())?;
                let vmid = vmid.parse().map_err(|_| err())?;
                Ok(Self::vm(*node, guest_type, vmid))
            }
            ["group", name] => Ok(Self::group(*name)),
            _ => Err(err()),
        }
    }
}

impl From<ScopeId> for String {
    fn from(id: ScopeId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ScopeId {
    type Error = ParseScopeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn textual_form_roundtrips() {
        for text in ["cluster", "host/pve1", "vm/pve2/lxc/201", "group/webservers"] {
            let id: ScopeId = text.parse().unwrap();
            assert_eq!(id.to_string(), text);
        }
    }

    #[test]
    fn kind_follows_variant() {
        assert_eq!(ScopeId::Cluster.kind(), ScopeKind::Cluster);
        assert_eq!(
            "vm/pve1/qemu/100".parse::<ScopeId>().unwrap().kind(),
            ScopeKind::Vm
        );
        assert_eq!(ScopeKind::SecurityGroup.to_string(), "group");
    }

    #[test]
    fn rejects_malformed_scopes() {
        for text in ["", "host", "host/", "vm/pve1/kvm/100", "vm/pve1/qemu/abc", "node/pve1"] {
            assert!(text.parse::<ScopeId>().is_err(), "{text} should not parse");
        }
    }

    #[test]
    fn serializes_as_string() {
        let id = ScopeId::vm("pve1", GuestType::Qemu, 100);
        assert_eq!(
            serde_json::to_value(&id).unwrap(),
            serde_json::json!("vm/pve1/qemu/100")
        );
    }
}
