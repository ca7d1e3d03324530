// ── API-to-domain type conversions ──
//
// Bridges raw `pvewall_api` wire types into `pvewall_core::model` domain
// types and back. Empty strings from the wire become `None`; unknown
// enum text is dropped rather than failing the whole listing, except for
// direction and action which a rule cannot exist without.

use pvewall_api::models::{
    FirewallOptions as WireOptions, FirewallRule, GuestConfig, GuestKind, GuestResource,
    NodeEntry, OptionsParams, RuleParams, SecurityGroup,
};
use pvewall_api::FirewallPath;

use crate::error::CoreError;
use crate::model::{
    Direction, FirewallOptions, GuestInfo, GuestType, NodeInfo, OptionsPatch, RuleAction,
    RuleInput, RuleRecord, ScopeId, SecurityGroupInfo,
};

// ── Helpers ────────────────────────────────────────────────────────

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

/// Optional wire fields cleared on a full-record replace.
const CLEARABLE_FIELDS: [&str; 9] = [
    "proto", "sport", "dport", "source", "dest", "macro", "iface", "log", "comment",
];

// ── Scope paths ────────────────────────────────────────────────────

impl From<GuestType> for GuestKind {
    fn from(t: GuestType) -> Self {
        match t {
            GuestType::Qemu => GuestKind::Qemu,
            GuestType::Lxc => GuestKind::Lxc,
        }
    }
}

impl From<GuestKind> for GuestType {
    fn from(k: GuestKind) -> Self {
        match k {
            GuestKind::Qemu => GuestType::Qemu,
            GuestKind::Lxc => GuestType::Lxc,
        }
    }
}

pub(crate) fn scope_path(scope: &ScopeId) -> FirewallPath {
    match scope {
        ScopeId::Cluster => FirewallPath::Cluster,
        ScopeId::Host { node } => FirewallPath::Node { node: node.clone() },
        ScopeId::Vm {
            node,
            guest_type,
            vmid,
        } => FirewallPath::Guest {
            node: node.clone(),
            kind: (*guest_type).into(),
            vmid: *vmid,
        },
        ScopeId::SecurityGroup { name } => FirewallPath::Group {
            group: name.clone(),
        },
    }
}

// ── Rules ──────────────────────────────────────────────────────────

impl TryFrom<FirewallRule> for RuleRecord {
    type Error = CoreError;

    fn try_from(r: FirewallRule) -> Result<Self, Self::Error> {
        let direction: Direction = r.rule_type.parse().map_err(|_| {
            CoreError::Internal(format!(
                "rule {} has unknown type '{}'",
                r.pos, r.rule_type
            ))
        })?;
        let action = RuleAction::parse(direction, &r.action).ok_or_else(|| {
            CoreError::Internal(format!(
                "rule {} has action '{}' which does not fit type {direction}",
                r.pos, r.action
            ))
        })?;

        Ok(Self {
            position: r.pos,
            direction,
            action,
            enabled: r.enable == 1,
            protocol: non_empty(r.proto),
            source_port: non_empty(r.sport),
            dest_port: non_empty(r.dport),
            source: non_empty(r.source),
            destination: non_empty(r.dest),
            macro_name: non_empty(r.macro_name),
            iface: non_empty(r.iface),
            log_level: non_empty(r.log).and_then(|l| l.parse().ok()),
            comment: non_empty(r.comment),
            digest: r.digest,
        })
    }
}

/// Body for creating a rule. Unset fields are simply omitted.
pub(crate) fn create_params(input: &RuleInput) -> RuleParams {
    RuleParams {
        rule_type: input.direction.to_string(),
        action: input.action.to_string(),
        enable: u8::from(input.enabled),
        proto: input.protocol.clone(),
        sport: input.source_port.clone(),
        dport: input.dest_port.clone(),
        source: input.source.clone(),
        dest: input.destination.clone(),
        macro_name: input.macro_name.clone(),
        iface: input.iface.clone(),
        log: input.log_level.map(|l| l.to_string()),
        comment: input.comment.clone(),
        delete: None,
        digest: None,
    }
}

/// Body for replacing a rule: unset optional fields are listed in
/// `delete` so the remote clears them instead of keeping old values.
pub(crate) fn replace_params(input: &RuleInput) -> RuleParams {
    let mut params = create_params(input);
    params.digest.clone_from(&input.digest);
    let set = [
        params.proto.is_some(),
        params.sport.is_some(),
        params.dport.is_some(),
        params.source.is_some(),
        params.dest.is_some(),
        params.macro_name.is_some(),
        params.iface.is_some(),
        params.log.is_some(),
        params.comment.is_some(),
    ];
    let cleared: Vec<&str> = CLEARABLE_FIELDS
        .iter()
        .zip(set)
        .filter(|(_, present)| !present)
        .map(|(name, _)| *name)
        .collect();
    if !cleared.is_empty() {
        params.delete = Some(cleared.join(","));
    }
    params
}

// ── Options ────────────────────────────────────────────────────────

impl From<WireOptions> for FirewallOptions {
    fn from(o: WireOptions) -> Self {
        Self {
            enabled: o.enable == Some(1),
            policy_in: o.policy_in.and_then(|p| p.parse().ok()),
            policy_out: o.policy_out.and_then(|p| p.parse().ok()),
            log_level_in: o.log_level_in.and_then(|l| l.parse().ok()),
            log_level_out: o.log_level_out.and_then(|l| l.parse().ok()),
        }
    }
}

pub(crate) fn options_params(patch: &OptionsPatch) -> OptionsParams {
    OptionsParams {
        enable: patch.enabled.map(u8::from),
        policy_in: patch.policy_in.map(|v| v.to_string()),
        policy_out: patch.policy_out.map(|v| v.to_string()),
    }
}

impl From<SecurityGroup> for SecurityGroupInfo {
    fn from(g: SecurityGroup) -> Self {
        Self {
            name: g.group,
            comment: non_empty(g.comment),
        }
    }
}

// ── Topology ───────────────────────────────────────────────────────

impl From<NodeEntry> for NodeInfo {
    fn from(n: NodeEntry) -> Self {
        Self {
            online: n.status.as_deref().is_none_or(|s| s == "online"),
            name: n.node,
        }
    }
}

impl From<GuestResource> for GuestInfo {
    fn from(g: GuestResource) -> Self {
        Self {
            node: g.node,
            guest_type: g.kind.into(),
            vmid: g.vmid,
            name: non_empty(g.name),
            running: g.status.as_deref() == Some("running"),
        }
    }
}

/// True when any `netN` entry carries `firewall=1`.
pub fn nic_firewall_enabled(config: &GuestConfig) -> bool {
    config
        .iter()
        .filter(|(key, _)| {
            key.strip_prefix("net")
                .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
        })
        .filter_map(|(_, value)| value.as_str())
        .any(|nic| nic.split(',').any(|opt| opt.trim() == "firewall=1"))
}
