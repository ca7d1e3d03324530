// PVE API HTTP client
//
// Wraps `reqwest::Client` with `/api2/json` URL construction, envelope
// unwrapping, and ticket/CSRF handling. Endpoint groups (firewall,
// topology, login) are implemented as inherent methods in separate files
// so this module stays focused on transport mechanics.

use std::sync::{PoisonError, RwLock};

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::auth::{self, Credentials, Ticket};
use crate::error::Error;
use crate::models::{PveErrorBody, PveResponse};
use crate::transport::TransportConfig;

const API_PREFIX: &str = "api2/json";
const CSRF_HEADER: &str = "CSRFPreventionToken";
const BODY_PREVIEW: usize = 200;

/// Raw HTTP client for a PVE endpoint.
///
/// Handles the `{ "data": ... }` envelope and maps HTTP failures into
/// [`Error`]. All methods return the unwrapped `data` payload.
pub struct PveClient {
    http: reqwest::Client,
    base_url: Url,
    /// Present only for ticket auth. Sent as a cookie on every request;
    /// the CSRF half is attached to writes.
    ticket: RwLock<Option<Ticket>>,
}

impl PveClient {
    /// Client for the ticket flow. Call [`login`](Self::login) before use.
    ///
    /// `base_url` is the endpoint root, e.g. `https://pve1:8006`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self::with_client(transport.build_client()?, base_url))
    }

    /// Client that sends `Authorization: PVEAPIToken=...` on every request.
    pub fn from_api_token(
        base_url: Url,
        token_id: &str,
        secret: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut value = HeaderValue::from_str(&auth::api_token_header(token_id, secret))
            .map_err(|e| Error::Authentication {
                message: format!("invalid API token header: {e}"),
            })?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);

        let http = transport.build_client_with_headers(headers)?;
        Ok(Self::with_client(http, base_url))
    }

    /// Build a client from credentials, logging in when the credentials
    /// call for a ticket.
    pub async fn connect(
        base_url: Url,
        credentials: &Credentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        match credentials {
            Credentials::ApiToken { token_id, secret } => {
                Self::from_api_token(base_url, token_id, secret, transport)
            }
            Credentials::Ticket { username, password } => {
                let client = Self::new(base_url, transport)?;
                client.login(username, password).await?;
                Ok(client)
            }
        }
    }

    /// Wrap a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            ticket: RwLock::new(None),
        }
    }

    /// The endpoint base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // ── Ticket management ───────────────────────────────────────────

    pub(crate) fn set_ticket(&self, ticket: Ticket) {
        debug!("storing auth ticket");
        *self.ticket.write().unwrap_or_else(PoisonError::into_inner) = Some(ticket);
    }

    /// Whether a ticket is currently held.
    pub fn has_ticket(&self) -> bool {
        self.ticket
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder, write: bool) -> reqwest::RequestBuilder {
        let guard = self.ticket.read().unwrap_or_else(PoisonError::into_inner);
        let Some(ticket) = guard.as_ref() else {
            return builder;
        };
        let builder = builder.header(
            reqwest::header::COOKIE,
            format!("PVEAuthCookie={}", ticket.ticket.expose_secret()),
        );
        if write {
            builder.header(CSRF_HEADER, ticket.csrf_token.as_str())
        } else {
            builder
        }
    }

    // ── URL builders ────────────────────────────────────────────────

    /// Build `{base}/api2/json/{path}`.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/{API_PREFIX}/{path}"))?)
    }

    // ── Request helpers ─────────────────────────────────────────────

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.get_with_query(path, &[]).await
    }

    pub(crate) async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, Error> {
        let url = self.api_url(path)?;
        debug!("GET {}", url);

        let builder = self.apply_auth(self.http.get(url).query(query), false);
        let resp = builder.send().await.map_err(Error::Transport)?;

        parse_envelope(path, resp).await
    }

    pub(crate) async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        let url = self.api_url(path)?;
        debug!("POST {}", url);

        let builder = self.apply_auth(self.http.post(url).json(body), true);
        let resp = builder.send().await.map_err(Error::Transport)?;

        parse_envelope(path, resp).await
    }

    pub(crate) async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        let url = self.api_url(path)?;
        debug!("PUT {}", url);

        let builder = self.apply_auth(self.http.put(url).json(body), true);
        let resp = builder.send().await.map_err(Error::Transport)?;

        parse_envelope(path, resp).await
    }

    pub(crate) async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.api_url(path)?;
        debug!("DELETE {}", url);

        let builder = self.apply_auth(self.http.delete(url), true);
        let resp = builder.send().await.map_err(Error::Transport)?;

        parse_envelope(path, resp).await
    }
}

/// Unwrap `{ "data": ... }` on success, otherwise map the status and the
/// error body into an [`Error`].
async fn parse_envelope<T: DeserializeOwned>(
    path: &str,
    resp: reqwest::Response,
) -> Result<T, Error> {
    let status = resp.status();
    let body = resp.text().await.map_err(Error::Transport)?;
    trace!(%status, len = body.len(), "response received");

    if !status.is_success() {
        return Err(status_error(path, status, &body));
    }

    let envelope: PveResponse<T> = serde_json::from_str(&body).map_err(|e| {
        let preview = preview(&body);
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body: body.clone(),
        }
    })?;

    Ok(envelope.data)
}

fn status_error(path: &str, status: reqwest::StatusCode, body: &str) -> Error {
    let parsed: PveErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .map(|m| m.trim().to_owned())
        .filter(|m| !m.is_empty())
        .or_else(|| status.canonical_reason().map(String::from))
        .unwrap_or_else(|| preview(body).to_owned());

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Error::Authentication {
            message: "ticket expired or invalid credentials".into(),
        };
    }

    if let Some(errors) = parsed.errors.filter(|e| !e.is_empty()) {
        return Error::Validation { errors };
    }

    if status == reqwest::StatusCode::NOT_FOUND || looks_like_missing(&message) {
        return Error::NotFound {
            path: path.to_owned(),
            message,
        };
    }

    if looks_like_conflict(&message) {
        return Error::Conflict {
            path: path.to_owned(),
            message,
        };
    }

    if status == reqwest::StatusCode::FORBIDDEN {
        return Error::Api {
            status: status.as_u16(),
            message: format!("permission denied: {message}"),
        };
    }

    Error::Api {
        status: status.as_u16(),
        message,
    }
}

/// PVE reports missing rules and groups as HTTP 500 with a textual reason.
fn looks_like_missing(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("no rule at position")
        || lower.contains("does not exist")
        || lower.contains("no such")
}

/// Digest mismatches come back as HTTP 500 as well.
fn looks_like_conflict(message: &str) -> bool {
    message
        .to_ascii_lowercase()
        .contains("detected modified configuration")
}

fn preview(body: &str) -> &str {
    let mut end = body.len().min(BODY_PREVIEW);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> PveClient {
        PveClient::with_client(reqwest::Client::new(), Url::parse(base).unwrap())
    }

    #[test]
    fn api_url_joins_prefix() {
        let c = client("https://pve1:8006/");
        assert_eq!(
            c.api_url("/cluster/firewall/rules").unwrap().as_str(),
            "https://pve1:8006/api2/json/cluster/firewall/rules"
        );
    }

    #[test]
    fn missing_rule_message_maps_to_not_found() {
        let err = status_error(
            "nodes/pve1/firewall/rules/9",
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"data":null,"message":"no rule at position 9\n"}"#,
        );
        assert!(matches!(err, Error::NotFound { ref message, .. } if message == "no rule at position 9"));
    }

    #[test]
    fn digest_mismatch_maps_to_conflict() {
        let err = status_error(
            "cluster/firewall/rules/2",
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"data":null,"message":"detected modified configuration - file changed by other user? Try again.\n"}"#,
        );
        assert!(err.is_conflict());
        assert!(!err.is_not_found());
    }

    #[test]
    fn field_errors_map_to_validation() {
        let err = status_error(
            "cluster/firewall/rules",
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"data":null,"errors":{"dport":"invalid port"}}"#,
        );
        assert!(matches!(err, Error::Validation { ref errors } if errors.contains_key("dport")));
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let body = "é".repeat(150);
        assert!(preview(&body).len() <= BODY_PREVIEW);
    }
}
