// ── Firewall rule domain types ──

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::scope::{ScopeId, ScopeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Direction {
    In,
    Out,
    /// The rule jumps into a security group; the action names the group.
    Group,
}

/// Terminal verdict for `in`/`out` rules, and for scope policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Verdict {
    Accept,
    Drop,
    Reject,
}

/// What a rule does when it matches.
///
/// Serialized as the bare wire string: `"ACCEPT"` or the group name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleAction {
    Verdict(Verdict),
    Group(String),
}

impl RuleAction {
    /// Interpret raw action text in the context of a direction.
    pub fn parse(direction: Direction, raw: &str) -> Option<Self> {
        match direction {
            Direction::Group => Some(Self::Group(raw.to_owned())),
            Direction::In | Direction::Out => raw.parse().ok().map(Self::Verdict),
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verdict(v) => write!(f, "{v}"),
            Self::Group(name) => f.write_str(name),
        }
    }
}

/// Syslog level attached to matching packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogLevel {
    Emerg,
    Alert,
    Crit,
    Err,
    Warning,
    Notice,
    Info,
    Debug,
    Nolog,
}

/// One rule as last reported by the remote, at its authoritative position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecord {
    pub position: u32,
    pub direction: Direction,
    pub action: RuleAction,
    pub enabled: bool,
    pub protocol: Option<String>,
    pub source_port: Option<String>,
    pub dest_port: Option<String>,
    pub source: Option<String>,
    pub destination: Option<String>,
    #[serde(rename = "macro")]
    pub macro_name: Option<String>,
    pub iface: Option<String>,
    pub log_level: Option<LogLevel>,
    pub comment: Option<String>,
    /// Remote change marker of the list this record was read from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl RuleRecord {
    /// The editable fields of this record, without its position.
    pub fn to_input(&self) -> RuleInput {
        RuleInput {
            direction: self.direction,
            action: self.action.clone(),
            enabled: self.enabled,
            protocol: self.protocol.clone(),
            source_port: self.source_port.clone(),
            dest_port: self.dest_port.clone(),
            source: self.source.clone(),
            destination: self.destination.clone(),
            macro_name: self.macro_name.clone(),
            iface: self.iface.clone(),
            log_level: self.log_level,
            comment: self.comment.clone(),
            digest: self.digest.clone(),
        }
    }
}

/// Rule fields as supplied by the operator for `add` and `update`.
///
/// `update` is a full-record replace: any optional field left `None` is
/// cleared on the remote. With `digest` set, the remote rejects the
/// replace if the rule list changed after that digest was read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleInput {
    pub direction: Direction,
    pub action: RuleAction,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub source_port: Option<String>,
    #[serde(default)]
    pub dest_port: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default, rename = "macro")]
    pub macro_name: Option<String>,
    #[serde(default)]
    pub iface: Option<String>,
    #[serde(default)]
    pub log_level: Option<LogLevel>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl RuleInput {
    /// Minimal enabled rule; fill in the optional fields as needed.
    pub fn new(direction: Direction, action: RuleAction) -> Self {
        Self {
            direction,
            action,
            enabled: true,
            protocol: None,
            source_port: None,
            dest_port: None,
            source: None,
            destination: None,
            macro_name: None,
            iface: None,
            log_level: None,
            comment: None,
            digest: None,
        }
    }
}

/// The ordered rule list of one scope, exactly as the remote last listed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSet {
    pub scope: ScopeId,
    pub kind: ScopeKind,
    pub rules: Vec<RuleRecord>,
    pub fetched_at: DateTime<Utc>,
    /// Set when this is the empty stand-in for a failed load.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_error: Option<String>,
}

impl RuleSet {
    /// Build from a remote listing. Rules are ordered by position.
    pub fn from_remote(scope: ScopeId, mut rules: Vec<RuleRecord>) -> Self {
        rules.sort_by_key(|r| r.position);
        Self {
            kind: scope.kind(),
            scope,
            rules,
            fetched_at: Utc::now(),
            load_error: None,
        }
    }

    /// The empty list published when a load fails.
    pub fn degraded(scope: ScopeId, error: impl Into<String>) -> Self {
        Self {
            kind: scope.kind(),
            scope,
            rules: Vec::new(),
            fetched_at: Utc::now(),
            load_error: Some(error.into()),
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn is_degraded(&self) -> bool {
        self.load_error.is_some()
    }

    pub fn get(&self, position: u32) -> Option<&RuleRecord> {
        self.rules.iter().find(|r| r.position == position)
    }
}

/// Per-guest result of a guest batch load.
#[derive(Debug, Clone, Serialize)]
pub struct GuestFirewall {
    pub scope: ScopeId,
    pub rules: Arc<RuleSet>,
    pub options: Option<super::FirewallOptions>,
    /// At least one NIC has `firewall=1`.
    pub firewall_enabled: bool,
}
