//! Configuration for the pvewall CLI.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext), and
//! translation to `pvewall_core::ConnectionConfig`. The CLI layers its
//! flag overrides on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pvewall_core::{AuthCredentials, ConnectionConfig, TlsVerification};

const KEYRING_SERVICE: &str = "pvewall";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named endpoint profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// The profile to use: `requested`, else `default_profile`, else
    /// `"default"`.
    pub fn active_profile_name(&self, requested: Option<&str>) -> String {
        requested
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }

    /// Resolve a profile into a connection, falling back to `[defaults]`
    /// for the timeout.
    pub fn connection_config(&self, name: &str) -> Result<ConnectionConfig, ConfigError> {
        let profile = self.profile(name)?;
        let mut config = profile_to_connection_config(profile, name)?;
        if profile.timeout.is_none() {
            config.timeout = Duration::from_secs(self.defaults.timeout);
        }
        Ok(config)
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}

/// A named endpoint profile.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Endpoint root (e.g., "https://pve1.lan:8006").
    pub url: String,

    /// Auth mode: "token" or "ticket".
    #[serde(default = "default_auth_mode")]
    pub auth_mode: String,

    /// API token id, `user@realm!tokenname`.
    pub token_id: Option<String>,

    /// API token secret (plaintext, prefer keyring or env var).
    pub token_secret: Option<String>,

    /// Environment variable name containing the token secret.
    pub token_secret_env: Option<String>,

    /// Username with realm for ticket auth, e.g. `root@pam`.
    pub username: Option<String>,

    /// Password for ticket auth (plaintext, prefer keyring).
    pub password: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout in seconds.
    pub timeout: Option<u64>,
}

fn default_auth_mode() -> String {
    "token".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "pvewall", "pvewall").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("pvewall");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` (missing file is fine) with `PVEWALL_` env overrides.
///
/// Nested keys use a double underscore:
/// `PVEWALL_DEFAULTS__TIMEOUT=10`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PVEWALL_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if it can't be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

fn keyring_secret(profile_name: &str, item: &str) -> Option<SecretString> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/{item}")).ok()?;
    entry.get_password().ok().map(SecretString::from)
}

/// Resolve an API token (id + secret) from the credential chain.
pub fn resolve_api_token(
    profile: &Profile,
    profile_name: &str,
) -> Result<(String, SecretString), ConfigError> {
    let token_id = profile
        .token_id
        .clone()
        .or_else(|| std::env::var("PVEWALL_TOKEN_ID").ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;

    // 1. Profile's token_secret_env → env var lookup
    if let Some(ref env_name) = profile.token_secret_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok((token_id, SecretString::from(val)));
        }
    }

    // 2. Well-known env var
    if let Ok(val) = std::env::var("PVEWALL_TOKEN_SECRET") {
        return Ok((token_id, SecretString::from(val)));
    }

    // 3. System keyring
    if let Some(secret) = keyring_secret(profile_name, "token-secret") {
        return Ok((token_id, secret));
    }

    // 4. Plaintext in config
    if let Some(ref secret) = profile.token_secret {
        return Ok((token_id, SecretString::from(secret.clone())));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Resolve ticket credentials (username + password) without CLI flags.
pub fn resolve_ticket_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<(String, SecretString), ConfigError> {
    let username = profile
        .username
        .clone()
        .or_else(|| std::env::var("PVEWALL_USERNAME").ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;

    if let Ok(pw) = std::env::var("PVEWALL_PASSWORD") {
        return Ok((username, SecretString::from(pw)));
    }

    if let Some(pw) = keyring_secret(profile_name, "password") {
        return Ok((username, pw));
    }

    if let Some(ref pw) = profile.password {
        return Ok((username, SecretString::from(pw.clone())));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Resolve `AuthCredentials` from a profile's `auth_mode` field.
pub fn resolve_auth(profile: &Profile, profile_name: &str) -> Result<AuthCredentials, ConfigError> {
    match profile.auth_mode.as_str() {
        "token" => {
            let (token_id, secret) = resolve_api_token(profile, profile_name)?;
            Ok(AuthCredentials::ApiToken { token_id, secret })
        }
        "ticket" => {
            let (username, password) = resolve_ticket_credentials(profile, profile_name)?;
            Ok(AuthCredentials::Ticket { username, password })
        }
        other => Err(ConfigError::Validation {
            field: "auth_mode".into(),
            reason: format!("expected 'token' or 'ticket', got '{other}'"),
        }),
    }
}

/// Map the profile's TLS fields. PVE ships a self-signed certificate, so
/// verification is off unless a CA is given or `insecure = false`.
pub fn profile_tls(profile: &Profile) -> TlsVerification {
    match (profile.insecure, &profile.ca_cert) {
        (Some(true), _) => TlsVerification::DangerAcceptInvalid,
        (_, Some(ca_path)) => TlsVerification::CustomCa(ca_path.clone()),
        (Some(false), None) => TlsVerification::SystemDefaults,
        (None, None) => TlsVerification::DangerAcceptInvalid,
    }
}

pub fn parse_url(raw: &str) -> Result<url::Url, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Validation {
        field: "url".into(),
        reason: format!("invalid URL: {raw}"),
    })
}

/// Build a `ConnectionConfig` from a profile, with no CLI flag overrides.
pub fn profile_to_connection_config(
    profile: &Profile,
    profile_name: &str,
) -> Result<ConnectionConfig, ConfigError> {
    let url = parse_url(&profile.url)?;
    let auth = resolve_auth(profile, profile_name)?;

    Ok(ConnectionConfig {
        url,
        auth,
        tls: profile_tls(profile),
        timeout: Duration::from_secs(profile.timeout.unwrap_or_else(default_timeout)),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn token_profile() -> Profile {
        Profile {
            url: "https://pve1.lan:8006".into(),
            auth_mode: "token".into(),
            token_id: Some("root@pam!cli".into()),
            token_secret_env: Some("PVEWALL_TEST_SECRET".into()),
            ..Profile::default()
        }
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.profiles.insert("lab".into(), token_profile());
        cfg.default_profile = Some("lab".into());
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.default_profile.as_deref(), Some("lab"));
        let lab = loaded.profile("lab").unwrap();
        assert_eq!(lab.url, "https://pve1.lan:8006");
        assert_eq!(lab.token_id.as_deref(), Some("root@pam!cli"));
        assert_eq!(loaded.defaults.timeout, 30);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert!(cfg.profiles.is_empty());
        assert_eq!(cfg.active_profile_name(None), "default");
        assert_eq!(cfg.active_profile_name(Some("lab")), "lab");
        assert!(matches!(
            cfg.profile("lab"),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                default_profile = "lab"

                [defaults]
                timeout = 10

                [profiles.lab]
                url = "https://pve1.lan:8006"
                auth_mode = "ticket"
                username = "root@pam"
                "#,
            )?;
            jail.set_env("PVEWALL_DEFAULTS__TIMEOUT", "5");
            jail.set_env("PVEWALL_DEFAULT_PROFILE", "other");

            let cfg = load_config_from(Path::new("config.toml")).map_err(|e| e.to_string())?;
            assert_eq!(cfg.defaults.timeout, 5);
            assert_eq!(cfg.default_profile.as_deref(), Some("other"));
            assert_eq!(cfg.profiles["lab"].auth_mode, "ticket");
            Ok(())
        });
    }

    #[test]
    fn token_secret_comes_from_named_env_var() {
        Jail::expect_with(|jail| {
            jail.set_env("PVEWALL_TEST_SECRET", "s3cret");
            let (id, secret) =
                resolve_api_token(&token_profile(), "lab").map_err(|e| e.to_string())?;
            assert_eq!(id, "root@pam!cli");
            assert_eq!(secret.expose_secret(), "s3cret");
            Ok(())
        });
    }

    #[test]
    fn ticket_password_from_env() {
        Jail::expect_with(|jail| {
            jail.set_env("PVEWALL_PASSWORD", "hunter2");
            let profile = Profile {
                url: "https://pve1.lan:8006".into(),
                auth_mode: "ticket".into(),
                username: Some("root@pam".into()),
                ..Profile::default()
            };
            let config =
                profile_to_connection_config(&profile, "lab").map_err(|e| e.to_string())?;
            let AuthCredentials::Ticket { username, password } = config.auth else {
                return Err("expected ticket credentials".into());
            };
            assert_eq!(username, "root@pam");
            assert_eq!(password.expose_secret(), "hunter2");
            Ok(())
        });
    }

    #[test]
    fn unknown_auth_mode_is_rejected() {
        let profile = Profile {
            url: "https://pve1.lan:8006".into(),
            auth_mode: "kerberos".into(),
            ..Profile::default()
        };
        let err = resolve_auth(&profile, "lab").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "auth_mode"));
    }

    #[test]
    fn bad_url_is_rejected_before_credentials() {
        let profile = Profile {
            url: "not a url".into(),
            ..token_profile()
        };
        let err = profile_to_connection_config(&profile, "lab").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "url"));
    }

    #[test]
    fn tls_mapping() {
        let mut profile = token_profile();
        assert_eq!(profile_tls(&profile), TlsVerification::DangerAcceptInvalid);

        profile.insecure = Some(false);
        assert_eq!(profile_tls(&profile), TlsVerification::SystemDefaults);

        profile.ca_cert = Some(PathBuf::from("/etc/pve/pve-root-ca.pem"));
        assert_eq!(
            profile_tls(&profile),
            TlsVerification::CustomCa(PathBuf::from("/etc/pve/pve-root-ca.pem"))
        );

        profile.insecure = Some(true);
        assert_eq!(profile_tls(&profile), TlsVerification::DangerAcceptInvalid);
    }
}
