// pvewall-api: Async Rust client for the Proxmox VE firewall API

pub mod auth;
pub mod client;
pub mod error;
pub mod firewall;
mod login;
pub mod models;
mod topology;
pub mod transport;

pub use auth::{AuthStrategy, Credentials};
pub use client::PveClient;
pub use error::Error;
pub use firewall::FirewallPath;
pub use models::{
    FirewallOptions, FirewallRule, GuestConfig, GuestKind, GuestResource, MoveParams, NodeEntry,
    OptionsParams, RuleParams, SecurityGroup,
};
pub use transport::{TlsMode, TransportConfig};
