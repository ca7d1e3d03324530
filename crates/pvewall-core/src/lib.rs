//! Scoped firewall rule-set engine between `pvewall-api` and front ends.
//!
//! The remote firewall owns rule order. This crate never reorders a list
//! itself: every mutation is sent to the remote and followed by a full
//! reload of the affected scope.
//!
//! - **[`Orchestrator`]**: composition root bound to one connection. Owns
//!   the per-scope stores, the detected [`Mode`], the active [`View`] and
//!   the drag controllers, and exposes every rule, options and security
//!   group operation by [`ScopeId`].
//!
//! - **[`ScopedRuleStore`]**: the rule list of one scope, published as
//!   whole [`RuleSet`] snapshots through a `watch` channel. Loads degrade
//!   to an empty list instead of failing; mutations are serialized per
//!   scope.
//!
//! - **[`BatchLoader`]**: concurrent loads across all hosts or all guests
//!   with a per-item fallback, so one unreachable target never blanks the
//!   rest.
//!
//! - **[`ModeDetector`]** and **[`DragController`]**: cluster/standalone
//!   classification from node count, and drag gestures turned into single
//!   move intents.
//!
//! - **[`RuleAuthority`]**: the seam to the remote, implemented for
//!   [`pvewall_api::PveClient`].

pub mod authority;
pub mod batch;
pub mod config;
pub mod convert;
pub mod drag;
pub mod error;
pub mod mode;
pub mod model;
pub mod orchestrator;
pub mod store;
pub mod stream;
pub mod validate;

#[cfg(test)]
mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use authority::RuleAuthority;
pub use batch::{BatchLoader, MAX_GUEST_BATCH};
pub use config::{AuthCredentials, ConnectionConfig, TlsVerification};
pub use drag::{DragController, DragState, MoveIntent};
pub use error::CoreError;
pub use mode::ModeDetector;
pub use orchestrator::{Orchestrator, View, ViewData};
pub use store::{RuleSetState, ScopedRuleStore};
pub use stream::{RuleSetStream, RuleSetWatchStream};

pub use model::{
    Direction, FirewallOptions, GuestFirewall, GuestInfo, GuestType, LogLevel, Mode, NodeInfo,
    OptionsPatch, ParseScopeError, RuleAction, RuleInput, RuleRecord, RuleSet, ScopeId,
    ScopeKind, SecurityGroupInfo, Topology, Verdict,
};
