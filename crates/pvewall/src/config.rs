//! CLI-side configuration: applies global flags on top of the shared
//! profiles from `pvewall-config`.

use std::time::Duration;

use secrecy::SecretString;

use pvewall_config::{Config, Profile};
use pvewall_core::{AuthCredentials, ConnectionConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use pvewall_config::{config_path, load_config_or_default, save_config};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.active_profile_name(global.profile.as_deref())
}

pub(crate) fn parse_url(raw: &str) -> Result<url::Url, CliError> {
    raw.parse().map_err(|_| CliError::Validation {
        field: "url".into(),
        reason: format!("invalid URL: {raw}"),
    })
}

/// Token credentials given entirely on the command line, if any.
fn flag_token(global: &GlobalOpts, profile: Option<&Profile>) -> Option<AuthCredentials> {
    let secret = global.token_secret.as_ref()?;
    let token_id = global
        .token_id
        .clone()
        .or_else(|| profile.and_then(|p| p.token_id.clone()))?;
    Some(AuthCredentials::ApiToken {
        token_id,
        secret: SecretString::from(secret.clone()),
    })
}

/// Build a `ConnectionConfig` from the config file, profile and CLI flags.
///
/// Flags win over the profile; the profile wins over `[defaults]`.
pub fn build_connection_config(global: &GlobalOpts) -> Result<ConnectionConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    if let Some(profile) = cfg.profiles.get(&profile_name) {
        let url = parse_url(global.url.as_deref().unwrap_or(&profile.url))?;
        let auth = match flag_token(global, Some(profile)) {
            Some(auth) => auth,
            None => pvewall_config::resolve_auth(profile, &profile_name)?,
        };
        let tls = if global.insecure {
            TlsVerification::DangerAcceptInvalid
        } else {
            pvewall_config::profile_tls(profile)
        };
        let timeout = global
            .timeout
            .or(profile.timeout)
            .unwrap_or(cfg.defaults.timeout);

        return Ok(ConnectionConfig {
            url,
            auth,
            tls,
            timeout: Duration::from_secs(timeout),
        });
    }

    if let Some(requested) = global.profile.as_deref() {
        if global.url.is_none() {
            let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
            available.sort_unstable();
            return Err(CliError::ProfileNotFound {
                name: requested.into(),
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            });
        }
    }

    // No profile: flags / env vars alone.
    let url_str = global.url.as_deref().ok_or_else(|| CliError::NoConfig {
        path: config_path().display().to_string(),
    })?;
    let url = parse_url(url_str)?;

    let auth = flag_token(global, None).ok_or(CliError::NoCredentials {
        profile: profile_name,
    })?;

    let tls = if global.insecure || cfg.defaults.insecure {
        TlsVerification::DangerAcceptInvalid
    } else {
        TlsVerification::SystemDefaults
    };

    Ok(ConnectionConfig {
        url,
        auth,
        tls,
        timeout: Duration::from_secs(global.timeout.unwrap_or(cfg.defaults.timeout)),
    })
}
