use secrecy::{ExposeSecret, SecretString};

/// Which authentication strategy a client was built with.
///
/// Marker enum (no data) -- the actual credentials live in [`Credentials`].
/// Useful for branching on auth flow without carrying secret material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /// `Authorization: PVEAPIToken=...` header on every request.
    ApiToken,
    /// `PVEAuthCookie` ticket plus `CSRFPreventionToken` on writes.
    Ticket,
}

/// Credentials for authenticating with a PVE endpoint.
///
/// Each variant carries the secret material needed for its auth flow.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// API token. `token_id` has the form `user@realm!tokenname`.
    /// Created at: Datacenter > Permissions > API Tokens.
    ApiToken {
        token_id: String,
        secret: SecretString,
    },

    /// Username/password exchanged for a ticket via `POST /access/ticket`.
    Ticket {
        username: String,
        password: SecretString,
    },
}

impl Credentials {
    pub fn strategy(&self) -> AuthStrategy {
        match self {
            Self::ApiToken { .. } => AuthStrategy::ApiToken,
            Self::Ticket { .. } => AuthStrategy::Ticket,
        }
    }
}

/// Render the `Authorization` header value for an API token.
pub(crate) fn api_token_header(token_id: &str, secret: &SecretString) -> String {
    format!("PVEAPIToken={token_id}={}", secret.expose_secret())
}

/// A ticket obtained from `POST /access/ticket`.
#[derive(Debug, Clone)]
pub(crate) struct Ticket {
    pub ticket: SecretString,
    pub csrf_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_token_header_format() {
        let secret = SecretString::from("aaaa-bbbb".to_string());
        assert_eq!(
            api_token_header("root@pam!ci", &secret),
            "PVEAPIToken=root@pam!ci=aaaa-bbbb"
        );
    }

    #[test]
    fn strategy_matches_variant() {
        let creds = Credentials::Ticket {
            username: "root@pam".into(),
            password: SecretString::from("pw".to_string()),
        };
        assert_eq!(creds.strategy(), AuthStrategy::Ticket);
    }
}
