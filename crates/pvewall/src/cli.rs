//! Clap derive structures for the `pvewall` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use pvewall_core::{Direction, LogLevel, ScopeId, Verdict};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// pvewall -- manage Proxmox VE firewall rules from the command line
#[derive(Debug, Parser)]
#[command(
    name = "pvewall",
    version,
    about = "Manage Proxmox VE firewall rules from the command line",
    long_about = "Reorder, toggle, add, update and delete firewall rules on a\n\
        Proxmox VE cluster, its hosts, its guests and its security groups.\n\n\
        Scopes are written as: cluster, host/<node>, vm/<node>/<qemu|lxc>/<vmid>,\n\
        group/<name>.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Connection profile to use
    #[arg(long, short = 'p', env = "PVEWALL_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Endpoint URL, e.g. https://pve1:8006 (overrides profile)
    #[arg(long, short = 'u', env = "PVEWALL_URL", global = true)]
    pub url: Option<String>,

    /// API token id, user@realm!tokenname
    #[arg(long, env = "PVEWALL_TOKEN_ID", global = true, hide_env = true)]
    pub token_id: Option<String>,

    /// API token secret
    #[arg(long, env = "PVEWALL_TOKEN_SECRET", global = true, hide_env = true)]
    pub token_secret: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "PVEWALL_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "PVEWALL_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "PVEWALL_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List and edit the rules of one scope
    #[command(alias = "r")]
    Rules(RulesArgs),

    /// Manage security groups
    #[command(alias = "g")]
    Groups(GroupsArgs),

    /// Read and change scope-level firewall options
    #[command(alias = "opt")]
    Options(OptionsArgs),

    /// Show whether the target is a cluster or a standalone host
    Mode,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Rules ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommand,
}

#[derive(Debug, Subcommand)]
pub enum RulesCommand {
    /// List the rules of a scope in remote order
    #[command(alias = "ls")]
    List {
        /// Scope: cluster, host/<node>, vm/<node>/<type>/<vmid>, group/<name>
        scope: ScopeId,
    },

    /// Show one rule
    Get {
        scope: ScopeId,
        /// Rule position (0-based)
        position: u32,
    },

    /// Add a rule (the remote places it at the top)
    Add {
        scope: ScopeId,

        /// Read the rule as JSON from a file instead of flags
        #[arg(long, short = 'F', conflicts_with_all = ["direction", "action"])]
        from_file: Option<PathBuf>,

        #[command(flatten)]
        fields: RuleFields,
    },

    /// Replace the rule at a position; unset flags keep their current value
    Update {
        scope: ScopeId,
        position: u32,

        /// Read the full rule as JSON from a file instead of flags
        #[arg(long, short = 'F', conflicts_with_all = ["direction", "action"])]
        from_file: Option<PathBuf>,

        #[command(flatten)]
        fields: RuleFields,
    },

    /// Flip a rule between enabled and disabled
    Toggle { scope: ScopeId, position: u32 },

    /// Delete the rule at a position
    #[command(alias = "rm")]
    Delete { scope: ScopeId, position: u32 },

    /// Move a rule; the remote computes the new order
    #[command(alias = "mv")]
    Move {
        scope: ScopeId,
        /// Current position of the rule
        from: u32,
        /// Target position (the rule's length moves it to the end)
        to: u32,
    },

    /// Load every host's or every guest's rules at once
    All(AllArgs),
}

#[derive(Debug, Args)]
pub struct AllArgs {
    #[command(subcommand)]
    pub command: AllCommand,
}

#[derive(Debug, Subcommand)]
pub enum AllCommand {
    /// Rules of every node
    Hosts,
    /// Rules, options and NIC firewall state of every guest
    Guests,
}

/// Rule fields shared by `add` and `update`.
#[derive(Debug, Args, Default)]
pub struct RuleFields {
    /// in, out or group
    #[arg(long, short = 'd')]
    pub direction: Option<Direction>,

    /// ACCEPT, DROP, REJECT, or the security group name for group rules
    #[arg(long, short = 'a')]
    pub action: Option<String>,

    /// Create or leave the rule enabled
    #[arg(long, conflicts_with = "disable")]
    pub enable: bool,

    /// Create or leave the rule disabled
    #[arg(long)]
    pub disable: bool,

    /// Protocol name or number (tcp, udp, icmp, 6, ...)
    #[arg(long)]
    pub proto: Option<String>,

    /// Source port(s): 22, 1024:2048, 80,443
    #[arg(long)]
    pub sport: Option<String>,

    /// Destination port(s)
    #[arg(long)]
    pub dport: Option<String>,

    /// Source address, CIDR, alias or ipset
    #[arg(long)]
    pub source: Option<String>,

    /// Destination address, CIDR, alias or ipset
    #[arg(long)]
    pub dest: Option<String>,

    /// Predefined macro (SSH, HTTP, ...)
    #[arg(long = "macro")]
    pub macro_name: Option<String>,

    /// Network interface, e.g. net0
    #[arg(long)]
    pub iface: Option<String>,

    /// Log level for matching packets; nolog clears it
    #[arg(long)]
    pub log: Option<LogLevel>,

    /// Free-form comment
    #[arg(long, short = 'm')]
    pub comment: Option<String>,
}

// ── Groups ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GroupsArgs {
    #[command(subcommand)]
    pub command: GroupsCommand,
}

#[derive(Debug, Subcommand)]
pub enum GroupsCommand {
    /// List security groups
    #[command(alias = "ls")]
    List,

    /// Create an empty security group
    Create {
        name: String,
        #[arg(long, short = 'm')]
        comment: Option<String>,
    },

    /// Delete a security group
    #[command(alias = "rm")]
    Delete { name: String },
}

// ── Options ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct OptionsArgs {
    #[command(subcommand)]
    pub command: OptionsCommand,
}

#[derive(Debug, Subcommand)]
pub enum OptionsCommand {
    /// Show firewall enable, default policies and log levels
    Get { scope: ScopeId },

    /// Change one or more options
    Set {
        scope: ScopeId,

        /// Enable the firewall for the scope
        #[arg(long, conflicts_with = "disable")]
        enable: bool,

        /// Disable the firewall for the scope
        #[arg(long)]
        disable: bool,

        /// Default inbound policy
        #[arg(long)]
        policy_in: Option<Verdict>,

        /// Default outbound policy
        #[arg(long)]
        policy_out: Option<Verdict>,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration (secrets masked)
    Show,

    /// Print the config file location
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
