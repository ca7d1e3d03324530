// ── Local rule validation ──
//
// Catches obviously malformed input before any remote call. The remote
// still has the final say; these checks only cover what can be decided
// without it.

use crate::error::CoreError;
use crate::model::{Direction, RuleAction, RuleInput};

const GROUP_NAME_MIN: usize = 2;
const GROUP_NAME_MAX: usize = 18;
const IFACE_MAX: usize = 20;

/// Validate a rule draft for `add` or `update`.
pub fn validate_rule_input(input: &RuleInput) -> Result<(), CoreError> {
    match (input.direction, &input.action) {
        (Direction::Group, RuleAction::Group(name)) => validate_group_name(name)?,
        (Direction::Group, RuleAction::Verdict(v)) => {
            return Err(CoreError::validation(format!(
                "group rules take a security group name, not {v}"
            )));
        }
        (Direction::In | Direction::Out, RuleAction::Group(name)) => {
            return Err(CoreError::validation(format!(
                "{} rules need ACCEPT, DROP or REJECT, got '{name}'",
                input.direction
            )));
        }
        (Direction::In | Direction::Out, RuleAction::Verdict(_)) => {}
    }

    if let Some(spec) = &input.source_port {
        validate_port_spec("source port", spec)?;
    }
    if let Some(spec) = &input.dest_port {
        validate_port_spec("destination port", spec)?;
    }
    if let Some(iface) = &input.iface {
        validate_iface(iface)?;
    }
    if let Some(name) = &input.macro_name {
        if name.trim().is_empty() {
            return Err(CoreError::validation("macro must not be empty"));
        }
    }
    if let Some(comment) = &input.comment {
        if comment.contains(['\n', '\r']) {
            return Err(CoreError::validation("comment must be a single line"));
        }
    }
    Ok(())
}

/// Ports are comma-separated numbers or `low:high` ranges.
pub fn validate_port_spec(field: &str, spec: &str) -> Result<(), CoreError> {
    if spec.trim().is_empty() {
        return Err(CoreError::validation(format!("{field} must not be empty")));
    }
    for item in spec.split(',') {
        let item = item.trim();
        match item.split_once(':') {
            Some((low, high)) => {
                let low = parse_port(field, low)?;
                let high = parse_port(field, high)?;
                if low > high {
                    return Err(CoreError::validation(format!(
                        "{field}: range {low}:{high} is reversed"
                    )));
                }
            }
            None => {
                parse_port(field, item)?;
            }
        }
    }
    Ok(())
}

fn parse_port(field: &str, raw: &str) -> Result<u16, CoreError> {
    raw.trim()
        .parse::<u16>()
        .map_err(|_| CoreError::validation(format!("{field}: '{raw}' is not a port (0-65535)")))
}

/// Security group names: a letter, then letters, digits, `-` or `_`.
pub fn validate_group_name(name: &str) -> Result<(), CoreError> {
    let len = name.chars().count();
    let mut chars = name.chars();
    let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if !(GROUP_NAME_MIN..=GROUP_NAME_MAX).contains(&len) || !starts_with_letter || !rest_ok {
        return Err(CoreError::validation(format!(
            "invalid security group name '{name}': use {GROUP_NAME_MIN}-{GROUP_NAME_MAX} \
             characters, starting with a letter, then letters, digits, '-' or '_'"
        )));
    }
    Ok(())
}

fn validate_iface(iface: &str) -> Result<(), CoreError> {
    let ok = !iface.is_empty()
        && iface.len() <= IFACE_MAX
        && iface
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(CoreError::validation(format!(
            "invalid interface name '{iface}'"
        )))
    }
}
