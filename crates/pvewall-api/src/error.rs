use std::collections::BTreeMap;

use thiserror::Error;

/// Top-level error type for the `pvewall-api` crate.
///
/// Covers every failure mode of the firewall API surface: authentication,
/// transport, HTTP-level rejections, and payload decoding.
/// `pvewall-core` maps these into the engine's error taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed or the ticket / API token was rejected.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── API ─────────────────────────────────────────────────────────
    /// The addressed scope, rule position, or group does not exist.
    #[error("Not found: {path} ({message})")]
    NotFound { path: String, message: String },

    /// Parameter validation failed on the remote side (HTTP 400).
    ///
    /// `errors` maps the offending field name to the server's message.
    #[error("Parameter validation failed: {}", format_field_errors(errors))]
    Validation { errors: BTreeMap<String, String> },

    /// The write carried a digest that no longer matches the remote.
    #[error("Conflict: {path} ({message})")]
    Conflict { path: String, message: String },

    /// Any other non-success HTTP response.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Scope ───────────────────────────────────────────────────────
    /// Operation has no endpoint for the addressed scope.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(&'static str),
}

impl Error {
    /// Returns `true` if the ticket / token was rejected.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status == 502 || *status == 503 || *status == 504,
            _ => false,
        }
    }

    /// Returns `true` if the remote refused a stale read-modify-write.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Api { status: 404, .. } => true,
            _ => false,
        }
    }
}

fn format_field_errors(errors: &BTreeMap<String, String>) -> String {
    if errors.is_empty() {
        return "no details".into();
    }
    errors
        .iter()
        .map(|(field, msg)| format!("{field}: {}", msg.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_fields() {
        let mut errors = BTreeMap::new();
        errors.insert("dport".into(), "invalid port 'abc'\n".into());
        errors.insert("action".into(), "value does not match".into());
        let err = Error::Validation { errors };
        assert_eq!(
            err.to_string(),
            "Parameter validation failed: action: value does not match, dport: invalid port 'abc'"
        );
    }

    #[test]
    fn not_found_predicates() {
        let err = Error::NotFound {
            path: "cluster/firewall/rules/7".into(),
            message: "no rule at position 7".into(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_transient());

        let api = Error::Api {
            status: 404,
            message: "gone".into(),
        };
        assert!(api.is_not_found());
    }

    #[test]
    fn gateway_errors_are_transient() {
        assert!(
            Error::Api {
                status: 503,
                message: "busy".into()
            }
            .is_transient()
        );
        assert!(
            !Error::Api {
                status: 500,
                message: "boom".into()
            }
            .is_transient()
        );
    }
}
