// ── Core error types ──
//
// Engine-facing errors. Callers never see HTTP status codes or JSON
// failures directly; `From<pvewall_api::Error>` folds them into the
// taxonomy below.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Remote errors ────────────────────────────────────────────────
    /// Transport failure or a remote error that is not one of the
    /// more specific cases below.
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Not found: {what}")]
    NotFound { what: String },

    /// The remote changed between the read and the write that depended on it.
    #[error("Conflict: {what} changed on the remote since it was read")]
    Conflict { what: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Input errors ─────────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid move from {from} to {to}: scope has {len} rules")]
    InvalidMove { from: u32, to: u32, len: usize },

    // ── Scope errors ─────────────────────────────────────────────────
    #[error("Scope {scope} is not available: {reason}")]
    ScopeUnavailable { scope: String, reason: String },

    #[error("Operation not supported: {operation}")]
    Unsupported { operation: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<pvewall_api::Error> for CoreError {
    fn from(err: pvewall_api::Error) -> Self {
        use pvewall_api::Error as Api;

        match err {
            Api::Authentication { message } => CoreError::AuthenticationFailed { message },
            Api::Transport(ref e) if e.status().map(|s| s.as_u16()) == Some(404) => {
                CoreError::NotFound {
                    what: e
                        .url()
                        .map(|u| u.path().to_owned())
                        .unwrap_or_else(|| "<unknown>".into()),
                }
            }
            Api::Transport(e) => CoreError::Network {
                message: e.to_string(),
            },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::Tls(msg) => CoreError::Network {
                message: format!("TLS error: {msg}"),
            },
            Api::NotFound { path, message } => CoreError::NotFound {
                what: format!("{path} ({message})"),
            },
            Api::Conflict { path, message: _ } => CoreError::Conflict { what: path },
            Api::Validation { errors } => CoreError::Validation {
                message: errors
                    .iter()
                    .map(|(field, msg)| format!("{field}: {}", msg.trim()))
                    .collect::<Vec<_>>()
                    .join(", "),
            },
            Api::Api { status: 404, message } => CoreError::NotFound { what: message },
            Api::Api { status, message } => CoreError::Network {
                message: format!("HTTP {status}: {message}"),
            },
            Api::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
            Api::UnsupportedOperation(op) => CoreError::Unsupported {
                operation: op.to_owned(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn remote_validation_keeps_field_detail() {
        let mut errors = BTreeMap::new();
        errors.insert("dport".to_owned(), "invalid port".to_owned());
        let core: CoreError = pvewall_api::Error::Validation { errors }.into();
        assert!(matches!(core, CoreError::Validation { ref message } if message == "dport: invalid port"));
    }

    #[test]
    fn missing_rule_is_not_found() {
        let core: CoreError = pvewall_api::Error::NotFound {
            path: "cluster/firewall/rules/4".into(),
            message: "no rule at position 4".into(),
        }
        .into();
        assert!(core.is_not_found());
    }

    #[test]
    fn digest_mismatch_is_conflict() {
        let core: CoreError = pvewall_api::Error::Conflict {
            path: "cluster/firewall/rules/1".into(),
            message: "detected modified configuration".into(),
        }
        .into();
        assert!(matches!(core, CoreError::Conflict { ref what } if what == "cluster/firewall/rules/1"));
    }

    #[test]
    fn server_errors_are_network() {
        let core: CoreError = pvewall_api::Error::Api {
            status: 500,
            message: "boom".into(),
        }
        .into();
        assert!(matches!(core, CoreError::Network { .. }));
    }
}
