// Wire types for the PVE firewall API.
//
// Field names follow the remote JSON exactly (`pos`, `type`, `dport`, ...).
// Domain-level naming lives in pvewall-core; these structs only exist to
// get bytes on and off the wire.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

// ── Envelope ────────────────────────────────────────────────────────

/// Every response is wrapped as `{ "data": ... }`.
#[derive(Debug, Deserialize)]
pub struct PveResponse<T> {
    pub data: T,
}

/// Error responses carry a free-form `message` and, for HTTP 400, a
/// per-parameter `errors` map.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PveErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Option<BTreeMap<String, String>>,
}

// ── Rules ───────────────────────────────────────────────────────────

/// One rule as returned by `GET .../firewall/rules` or `GET .../rules/{pos}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRule {
    pub pos: u32,
    #[serde(rename = "type")]
    pub rule_type: String,
    pub action: String,
    #[serde(default, deserialize_with = "de::flag")]
    pub enable: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proto: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_string", skip_serializing_if = "Option::is_none")]
    pub sport: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_string", skip_serializing_if = "Option::is_none")]
    pub dport: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,
    #[serde(rename = "macro", default, skip_serializing_if = "Option::is_none")]
    pub macro_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iface: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Body for `POST .../rules` and `PUT .../rules/{pos}`.
///
/// `delete` lists optional fields to clear on update, which turns the
/// remote's merge-on-PUT into a full-record replace. `digest` makes the
/// remote refuse the write if the rule list changed since it was read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleParams {
    #[serde(rename = "type")]
    pub rule_type: String,
    pub action: String,
    pub enable: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proto: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sport: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dport: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,
    #[serde(rename = "macro", skip_serializing_if = "Option::is_none")]
    pub macro_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iface: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Body for the move intent: `PUT .../rules/{pos}` with `{ "moveto": n }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MoveParams {
    pub moveto: u32,
}

// ── Options ─────────────────────────────────────────────────────────

/// Scope-level firewall options (`GET .../firewall/options`).
///
/// Only the fields the engine reads are typed; the rest is kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FirewallOptions {
    #[serde(default, deserialize_with = "de::opt_flag", skip_serializing_if = "Option::is_none")]
    pub enable: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_in: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_out: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level_in: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level_out: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Body for `PUT .../firewall/options`. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OptionsParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_in: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_out: Option<String>,
}

// ── Security groups ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateGroupParams {
    pub group: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

// ── Topology ────────────────────────────────────────────────────────

/// Entry from `GET /nodes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub node: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// The type of a guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuestKind {
    Qemu,
    Lxc,
}

impl GuestKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Qemu => "qemu",
            Self::Lxc => "lxc",
        }
    }
}

/// Raw entry from `GET /cluster/resources?type=vm`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ClusterResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub node: Option<String>,
    #[serde(default)]
    pub vmid: Option<u32>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// A guest (VM or container) discovered through cluster resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestResource {
    pub node: String,
    pub vmid: u32,
    #[serde(rename = "type")]
    pub kind: GuestKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ClusterResource {
    /// Keep only qemu/lxc entries that carry both a node and a vmid.
    pub(crate) fn into_guest(self) -> Option<GuestResource> {
        let kind = match self.resource_type.as_str() {
            "qemu" => GuestKind::Qemu,
            "lxc" => GuestKind::Lxc,
            _ => return None,
        };
        Some(GuestResource {
            node: self.node?,
            vmid: self.vmid?,
            kind,
            name: self.name,
            status: self.status,
        })
    }
}

/// Raw guest configuration (`GET /nodes/{node}/{type}/{vmid}/config`).
pub type GuestConfig = BTreeMap<String, serde_json::Value>;

/// Ticket login response data.
#[derive(Debug, Deserialize)]
pub(crate) struct TicketData {
    pub ticket: String,
    #[serde(rename = "CSRFPreventionToken")]
    pub csrf_prevention_token: String,
}

// ── Lenient deserializers ───────────────────────────────────────────
//
// PVE is loose about scalar types: flags arrive as 0/1, "0"/"1" or
// booleans, and ports sometimes arrive as bare numbers.

mod de {
    use super::{Deserialize, Deserializer};
    use serde::de::Error as _;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Bool(bool),
        Int(i64),
        Str(String),
    }

    fn scalar_to_flag<E: serde::de::Error>(s: Scalar) -> Result<u8, E> {
        match s {
            Scalar::Bool(b) => Ok(u8::from(b)),
            Scalar::Int(0) => Ok(0),
            Scalar::Int(1) => Ok(1),
            Scalar::Str(ref v) if v == "0" => Ok(0),
            Scalar::Str(ref v) if v == "1" => Ok(1),
            Scalar::Int(n) => Err(E::custom(format!("invalid flag value {n}"))),
            Scalar::Str(v) => Err(E::custom(format!("invalid flag value {v:?}"))),
        }
    }

    pub(super) fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
        scalar_to_flag(Scalar::deserialize(d)?)
    }

    pub(super) fn opt_flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u8>, D::Error> {
        Option::<Scalar>::deserialize(d)?
            .map(scalar_to_flag)
            .transpose()
    }

    pub(super) fn lenient_string<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<String>, D::Error> {
        match Option::<Scalar>::deserialize(d)? {
            None => Ok(None),
            Some(Scalar::Str(s)) => Ok(Some(s)),
            Some(Scalar::Int(n)) => Ok(Some(n.to_string())),
            Some(Scalar::Bool(_)) => Err(D::Error::custom("expected string or number")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rule_accepts_loose_scalars() {
        let rule: FirewallRule = serde_json::from_value(json!({
            "pos": 3,
            "type": "in",
            "action": "ACCEPT",
            "enable": "1",
            "dport": 22,
            "macro": "SSH"
        }))
        .unwrap();
        assert_eq!(rule.enable, 1);
        assert_eq!(rule.dport.as_deref(), Some("22"));
        assert_eq!(rule.macro_name.as_deref(), Some("SSH"));
    }

    #[test]
    fn missing_enable_means_disabled() {
        let rule: FirewallRule = serde_json::from_value(json!({
            "pos": 0, "type": "out", "action": "DROP"
        }))
        .unwrap();
        assert_eq!(rule.enable, 0);
    }

    #[test]
    fn rule_params_skip_unset_fields() {
        let params = RuleParams {
            rule_type: "group".into(),
            action: "webservers".into(),
            enable: 1,
            delete: Some("dport,sport".into()),
            ..RuleParams::default()
        };
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            json!({"type": "group", "action": "webservers", "enable": 1, "delete": "dport,sport"})
        );
    }

    #[test]
    fn options_keep_unknown_keys() {
        let opts: FirewallOptions = serde_json::from_value(json!({
            "enable": 1,
            "policy_in": "DROP",
            "nf_conntrack_max": 262_144
        }))
        .unwrap();
        assert_eq!(opts.enable, Some(1));
        assert!(opts.extra.contains_key("nf_conntrack_max"));
    }

    #[test]
    fn cluster_resource_filters_non_guests() {
        let storage: ClusterResource = serde_json::from_value(json!({
            "type": "storage", "node": "pve1", "id": "storage/pve1/local"
        }))
        .unwrap();
        assert!(storage.into_guest().is_none());

        let ct: ClusterResource = serde_json::from_value(json!({
            "type": "lxc", "node": "pve2", "vmid": 201, "name": "dns"
        }))
        .unwrap();
        let guest = ct.into_guest().unwrap();
        assert_eq!(guest.kind, GuestKind::Lxc);
        assert_eq!(guest.vmid, 201);
    }
}
