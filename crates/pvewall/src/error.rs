//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use pvewall_config::ConfigError;
use pvewall_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Request to the Proxmox VE API failed: {message}")]
    #[diagnostic(
        code(pvewall::network),
        help(
            "Check that the endpoint is reachable and the API is running.\n\
             A self-signed certificate needs --insecure (-k) or ca_cert in your profile."
        )
    )]
    Network { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(pvewall::auth_failed),
        help(
            "Verify the API token or username/password of profile '{profile}'.\n\
             Tokens need the Sys.Audit and Sys.Modify privileges for firewall edits."
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(pvewall::no_credentials),
        help(
            "Configure credentials with: pvewall config init\n\
             Or set PVEWALL_TOKEN_ID and PVEWALL_TOKEN_SECRET."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{what} not found")]
    #[diagnostic(
        code(pvewall::not_found),
        help("Run: pvewall {list_command} to see what exists")
    )]
    NotFound { what: String, list_command: String },

    #[error("{what} changed on the remote since it was read")]
    #[diagnostic(
        code(pvewall::conflict),
        help("Someone else edited this rule list. Run the command again to apply it to the current rules.")
    )]
    Conflict { what: String },

    #[error("Scope {scope} is not available: {reason}")]
    #[diagnostic(
        code(pvewall::scope_unavailable),
        help("Run: pvewall mode to see which scopes this target offers")
    )]
    ScopeUnavailable { scope: String, reason: String },

    #[error("Operation not supported: {operation}")]
    #[diagnostic(code(pvewall::unsupported))]
    Unsupported { operation: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error ({code}): {message}")]
    #[diagnostic(code(pvewall::api_error))]
    ApiError { code: String, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(pvewall::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(pvewall::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: pvewall config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No endpoint configured")]
    #[diagnostic(
        code(pvewall::no_config),
        help(
            "Create a profile with: pvewall config init\n\
             Or pass --url with --token-id and --token-secret.\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(pvewall::config))]
    Config(Box<ConfigError>),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(pvewall::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(pvewall::json), help("Check the JSON file contents and try again."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Network { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. }
            | Self::ScopeUnavailable { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            Self::Unsupported { .. } => exit_code::PERMISSION,
            _ => exit_code::GENERAL,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config(Box::new(other)),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Network { message } => CliError::Network { message },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                profile: "current".into(),
                message,
            },

            CoreError::NotFound { what } => CliError::NotFound {
                what,
                list_command: "rules list <scope>".into(),
            },

            CoreError::Conflict { what } => CliError::Conflict { what },

            CoreError::Validation { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::InvalidMove { from, to, len } => CliError::Validation {
                field: "position".into(),
                reason: format!("cannot move {from} to {to} in a list of {len} rules"),
            },

            CoreError::ScopeUnavailable { scope, reason } => {
                CliError::ScopeUnavailable { scope, reason }
            }

            CoreError::Unsupported { operation } => CliError::Unsupported { operation },

            CoreError::Config { message } => CliError::Validation {
                field: "connection".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::ApiError {
                code: "internal".into(),
                message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        let not_found: CliError = CoreError::NotFound {
            what: "host/pve1 rule 9".into(),
        }
        .into();
        assert_eq!(not_found.exit_code(), exit_code::NOT_FOUND);

        let bad_move: CliError = CoreError::InvalidMove {
            from: 5,
            to: 0,
            len: 2,
        }
        .into();
        assert_eq!(bad_move.exit_code(), exit_code::USAGE);

        let network: CliError = CoreError::Network {
            message: "connection refused".into(),
        }
        .into();
        assert_eq!(network.exit_code(), exit_code::CONNECTION);

        let conflict: CliError = CoreError::Conflict {
            what: "host/pve1 rule 2".into(),
        }
        .into();
        assert!(matches!(conflict, CliError::Conflict { .. }));
        assert_eq!(conflict.exit_code(), exit_code::GENERAL);
    }

    #[test]
    fn missing_credentials_map_to_auth_exit() {
        let err: CliError = ConfigError::NoCredentials {
            profile: "lab".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }
}
