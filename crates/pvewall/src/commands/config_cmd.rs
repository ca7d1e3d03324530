//! Config subcommand handlers.

use dialoguer::{Input, Password, Select};

use pvewall_config::{Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

const KEYRING_SERVICE: &str = "pvewall";

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "insecure = {}", cfg.defaults.insecure);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    for (name, p) in &cfg.profiles {
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "url = \"{}\"", p.url);
        let _ = writeln!(out, "auth_mode = \"{}\"", p.auth_mode);
        if let Some(ref id) = p.token_id {
            let _ = writeln!(out, "token_id = \"{id}\"");
        }
        if p.token_secret.is_some() {
            let _ = writeln!(out, "token_secret = \"****\"");
        }
        if let Some(ref env) = p.token_secret_env {
            let _ = writeln!(out, "token_secret_env = \"{env}\"");
        }
        if let Some(ref u) = p.username {
            let _ = writeln!(out, "username = \"{u}\"");
        }
        if p.password.is_some() {
            let _ = writeln!(out, "password = \"****\"");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
    }

    out
}

fn profile_list(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        "(none)".into()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_secret(prompt: &str, field: &str) -> Result<String, CliError> {
    let secret = Password::new()
        .with_prompt(prompt)
        .interact()
        .map_err(prompt_err)?;
    if secret.is_empty() {
        return Err(CliError::Validation {
            field: field.into(),
            reason: "value cannot be empty".into(),
        });
    }
    Ok(secret)
}

/// Offer to store a secret in the system keyring or return it for plaintext config.
///
/// Returns `Some(secret)` if the user chose plaintext, `None` if stored in keyring.
fn prompt_keyring_storage(
    secret: &str,
    keyring_key: &str,
    label: &str,
) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt(format!("Where to store the {label}?"))
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection != 0 {
        return Ok(Some(secret.to_owned()));
    }

    let entry =
        keyring::Entry::new(KEYRING_SERVICE, keyring_key).map_err(|e| CliError::Validation {
            field: "keyring".into(),
            reason: format!("failed to access keyring: {e}"),
        })?;
    entry
        .set_password(secret)
        .map_err(|e| CliError::Validation {
            field: "keyring".into(),
            reason: format!("failed to store {label} in keyring: {e}"),
        })?;
    eprintln!("   {label} stored in system keyring");
    Ok(None)
}

fn init_wizard() -> Result<(), CliError> {
    let config_path = config::config_path();
    eprintln!("pvewall configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let url: String = Input::new()
        .with_prompt("Proxmox VE URL")
        .default("https://pve.local:8006".into())
        .interact_text()
        .map_err(prompt_err)?;
    config::parse_url(&url)?;

    let auth_choices = &["API token (recommended)", "Username/Password (ticket)"];
    let auth_selection = Select::new()
        .with_prompt("Authentication method")
        .items(auth_choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    let mut profile = Profile {
        url,
        ..Profile::default()
    };

    if auth_selection == 0 {
        let token_id: String = Input::new()
            .with_prompt("Token ID (user@realm!name)")
            .interact_text()
            .map_err(prompt_err)?;
        let secret = prompt_secret("Token secret", "token_secret")?;
        profile.auth_mode = "token".into();
        profile.token_id = Some(token_id);
        profile.token_secret = prompt_keyring_storage(
            &secret,
            &format!("{profile_name}/token-secret"),
            "token secret",
        )?;
    } else {
        let username: String = Input::new()
            .with_prompt("Username (e.g. root@pam)")
            .interact_text()
            .map_err(prompt_err)?;
        let password = prompt_secret("Password", "password")?;
        profile.auth_mode = "ticket".into();
        profile.username = Some(username);
        profile.password = prompt_keyring_storage(
            &password,
            &format!("{profile_name}/password"),
            "password",
        )?;
    }

    let tls_choices = &[
        "Verify with system roots",
        "Accept the node's self-signed certificate",
    ];
    let tls_selection = Select::new()
        .with_prompt("TLS verification")
        .items(tls_choices)
        .default(1)
        .interact()
        .map_err(prompt_err)?;
    profile.insecure = Some(tls_selection == 1);

    let mut cfg = config::load_config_or_default();
    cfg.profiles.insert(profile_name.clone(), profile);
    cfg.default_profile = Some(profile_name.clone());
    config::save_config(&cfg)?;

    eprintln!("\nConfiguration written to {}", config_path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Test it: pvewall mode");
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init_wizard(),

        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let out = output::render_single(
                &global.output,
                &RedactedConfig(&cfg),
                |c| format_config_redacted(c.0),
                |_| "config".into(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let active = config::active_profile_name(global, &cfg);
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: pvewall config init");
            } else {
                for name in cfg.profiles.keys() {
                    let marker = if *name == active { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: profile_list(&cfg),
                    name,
                });
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("Default profile set to '{name}'");
            Ok(())
        }
    }
}

/// Serializes the config with secrets masked, for `json`/`yaml` output.
struct RedactedConfig<'a>(&'a Config);

impl serde::Serialize for RedactedConfig<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut value = serde_json::to_value(self.0).map_err(serde::ser::Error::custom)?;
        if let Some(profiles) = value
            .get_mut("profiles")
            .and_then(serde_json::Value::as_object_mut)
        {
            for profile in profiles.values_mut() {
                for key in ["token_secret", "password"] {
                    if let Some(field) = profile.get_mut(key) {
                        if !field.is_null() {
                            *field = serde_json::Value::from("****");
                        }
                    }
                }
            }
        }
        value.serialize(serializer)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> Config {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "lab".into(),
            Profile {
                url: "https://pve.lab:8006".into(),
                auth_mode: "token".into(),
                token_id: Some("root@pam!cli".into()),
                token_secret: Some("s3cret".into()),
                ..Profile::default()
            },
        );
        cfg
    }

    #[test]
    fn show_masks_secrets_in_toml_view() {
        let out = format_config_redacted(&sample());
        assert!(out.contains("token_id = \"root@pam!cli\""));
        assert!(out.contains("token_secret = \"****\""));
        assert!(!out.contains("s3cret"));
    }

    #[test]
    fn show_masks_secrets_in_json_view() {
        let cfg = sample();
        let json = serde_json::to_string(&RedactedConfig(&cfg)).unwrap();
        assert!(json.contains("****"));
        assert!(!json.contains("s3cret"));
    }
}
