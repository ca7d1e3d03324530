// Ticket authentication
//
// `POST /access/ticket` exchanges a username/password for a ticket and a
// CSRF prevention token. The ticket is sent back as the `PVEAuthCookie`
// cookie; the CSRF token is required on every write.

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::debug;

use crate::auth::Ticket;
use crate::client::PveClient;
use crate::error::Error;
use crate::models::{PveResponse, TicketData};

impl PveClient {
    /// Authenticate with username/password.
    ///
    /// `username` includes the realm, e.g. `root@pam`. On success the
    /// ticket is stored and applied to all subsequent requests.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<(), Error> {
        let url = self.api_url("access/ticket")?;
        debug!("logging in at {}", url);

        let body = json!({
            "username": username,
            "password": password.expose_secret(),
        });

        let resp = self
            .http()
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Authentication {
                message: format!("login failed (HTTP {status})"),
            });
        }

        let text = resp.text().await.map_err(Error::Transport)?;
        let envelope: PveResponse<Option<TicketData>> =
            serde_json::from_str(&text).map_err(|e| Error::Deserialization {
                message: format!("unexpected login response: {e}"),
                body: text.clone(),
            })?;

        // PVE answers a bad password with 200 and `data: null`.
        let data = envelope.data.ok_or_else(|| Error::Authentication {
            message: "login rejected".into(),
        })?;

        self.set_ticket(Ticket {
            ticket: SecretString::from(data.ticket),
            csrf_token: data.csrf_prevention_token,
        });

        debug!("login successful");
        Ok(())
    }
}
