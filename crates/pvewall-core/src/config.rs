// ── Runtime connection configuration ──
//
// These types describe *how* to reach a PVE endpoint. They carry
// credential data and connection tuning, but never touch disk.
// The CLI constructs a `ConnectionConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use pvewall_api::transport::{TlsMode, TransportConfig};
use pvewall_api::{Credentials, PveClient};

use crate::error::CoreError;

/// How to authenticate with the endpoint.
///
/// Carries the secret material; `pvewall_api::AuthStrategy` is the
/// data-free marker for the same choice.
#[derive(Debug, Clone)]
pub enum AuthCredentials {
    /// `user@realm!tokenname` plus its secret.
    ApiToken {
        token_id: String,
        secret: SecretString,
    },
    /// Username (with realm) and password, exchanged for a ticket.
    Ticket {
        username: String,
        password: SecretString,
    },
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification. PVE ships a self-signed certificate.
    #[default]
    DangerAcceptInvalid,
}

/// Everything needed to open one connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Endpoint root, e.g. `https://pve1:8006`.
    pub url: Url,
    pub auth: AuthCredentials,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ConnectionConfig {
    pub fn new(url: Url, auth: AuthCredentials) -> Self {
        Self {
            url,
            auth,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: match &self.tls {
                TlsVerification::SystemDefaults => TlsMode::System,
                TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
                TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
            },
            timeout: self.timeout,
        }
    }

    pub(crate) fn credentials(&self) -> Credentials {
        match &self.auth {
            AuthCredentials::ApiToken { token_id, secret } => Credentials::ApiToken {
                token_id: token_id.clone(),
                secret: secret.clone(),
            },
            AuthCredentials::Ticket { username, password } => Credentials::Ticket {
                username: username.clone(),
                password: password.clone(),
            },
        }
    }

    /// Build an authenticated client. Ticket auth logs in here.
    pub async fn connect(&self) -> Result<PveClient, CoreError> {
        let client =
            PveClient::connect(self.url.clone(), &self.credentials(), &self.transport()).await?;
        Ok(client)
    }
}
