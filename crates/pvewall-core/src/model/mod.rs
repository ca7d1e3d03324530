pub mod options;
pub mod rule;
pub mod scope;
pub mod topology;

pub use options::{FirewallOptions, OptionsPatch, SecurityGroupInfo};
pub use rule::{
    Direction, GuestFirewall, LogLevel, RuleAction, RuleInput, RuleRecord, RuleSet, Verdict,
};
pub use scope::{GuestType, ParseScopeError, ScopeId, ScopeKind};
pub use topology::{GuestInfo, Mode, NodeInfo, Topology};
