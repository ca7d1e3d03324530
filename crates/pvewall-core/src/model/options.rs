// ── Scope options and security groups ──

use serde::{Deserialize, Serialize};

use super::rule::{LogLevel, Verdict};

/// Scope-level firewall switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallOptions {
    pub enabled: bool,
    pub policy_in: Option<Verdict>,
    pub policy_out: Option<Verdict>,
    pub log_level_in: Option<LogLevel>,
    pub log_level_out: Option<LogLevel>,
}

/// A partial options write; `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionsPatch {
    pub enabled: Option<bool>,
    pub policy_in: Option<Verdict>,
    pub policy_out: Option<Verdict>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupInfo {
    pub name: String,
    pub comment: Option<String>,
}
