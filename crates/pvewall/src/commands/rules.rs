//! Rule command handlers.

use std::sync::Arc;

use tabled::Tabled;

use pvewall_api::PveClient;
use pvewall_core::{
    GuestFirewall, LogLevel, Orchestrator, RuleAction, RuleInput, RuleRecord, RuleSet, ScopeId,
};

use crate::cli::{AllCommand, GlobalOpts, RuleFields, RulesArgs, RulesCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Rule table row ──────────────────────────────────────────────────

#[derive(Tabled)]
struct RuleRow {
    #[tabled(rename = "#")]
    position: u32,
    #[tabled(rename = "On")]
    enabled: String,
    #[tabled(rename = "Dir")]
    direction: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Macro/Proto")]
    matcher: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Dest")]
    dest: String,
    #[tabled(rename = "Ports")]
    ports: String,
    #[tabled(rename = "Iface")]
    iface: String,
    #[tabled(rename = "Comment")]
    comment: String,
}

impl RuleRow {
    fn new(r: &RuleRecord, color: bool) -> Self {
        let matcher = r
            .macro_name
            .clone()
            .or_else(|| r.protocol.clone())
            .unwrap_or_else(|| "-".into());
        let ports = match (r.source_port.as_deref(), r.dest_port.as_deref()) {
            (None, None) => "-".into(),
            (sport, dport) => format!("{} -> {}", sport.unwrap_or("*"), dport.unwrap_or("*")),
        };
        Self {
            position: r.position,
            enabled: output::on_off(r.enabled, color),
            direction: r.direction.to_string(),
            action: output::verdict(&r.action.to_string(), color),
            matcher,
            source: util::or_dash(r.source.as_deref()),
            dest: util::or_dash(r.destination.as_deref()),
            ports,
            iface: util::or_dash(r.iface.as_deref()),
            comment: util::or_dash(r.comment.as_deref()),
        }
    }
}

fn rule_detail(r: &RuleRecord) -> String {
    [
        format!("Position:    {}", r.position),
        format!("Enabled:     {}", r.enabled),
        format!("Direction:   {}", r.direction),
        format!("Action:      {}", r.action),
        format!("Macro:       {}", util::or_dash(r.macro_name.as_deref())),
        format!("Protocol:    {}", util::or_dash(r.protocol.as_deref())),
        format!("Source:      {}", util::or_dash(r.source.as_deref())),
        format!("Src Port:    {}", util::or_dash(r.source_port.as_deref())),
        format!("Dest:        {}", util::or_dash(r.destination.as_deref())),
        format!("Dest Port:   {}", util::or_dash(r.dest_port.as_deref())),
        format!("Iface:       {}", util::or_dash(r.iface.as_deref())),
        format!(
            "Log:         {}",
            r.log_level.map_or_else(|| "-".into(), |l| l.to_string())
        ),
        format!("Comment:     {}", util::or_dash(r.comment.as_deref())),
    ]
    .join("\n")
}

// ── Batch summary rows ──────────────────────────────────────────────

#[derive(Tabled)]
struct HostRow {
    #[tabled(rename = "Scope")]
    scope: String,
    #[tabled(rename = "Rules")]
    rules: usize,
    #[tabled(rename = "Status")]
    status: String,
}

fn host_row(set: &Arc<RuleSet>) -> HostRow {
    HostRow {
        scope: set.scope.to_string(),
        rules: set.len(),
        status: set.load_error.clone().unwrap_or_else(|| "ok".into()),
    }
}

#[derive(Tabled)]
struct GuestRow {
    #[tabled(rename = "Scope")]
    scope: String,
    #[tabled(rename = "Rules")]
    rules: usize,
    #[tabled(rename = "Firewall")]
    firewall: String,
    #[tabled(rename = "NIC")]
    nic: String,
    #[tabled(rename = "Policy In")]
    policy_in: String,
    #[tabled(rename = "Status")]
    status: String,
}

fn guest_row(g: &GuestFirewall, color: bool) -> GuestRow {
    let options = g.options.as_ref();
    GuestRow {
        scope: g.scope.to_string(),
        rules: g.rules.len(),
        firewall: options.map_or_else(|| "?".into(), |o| output::on_off(o.enabled, color)),
        nic: output::on_off(g.firewall_enabled, color),
        policy_in: options
            .and_then(|o| o.policy_in)
            .map_or_else(|| "-".into(), |v| v.to_string()),
        status: g.rules.load_error.clone().unwrap_or_else(|| "ok".into()),
    }
}

// ── Input building ──────────────────────────────────────────────────

fn parse_action(input: &RuleInput, raw: &str) -> Result<RuleAction, CliError> {
    RuleAction::parse(input.direction, raw).ok_or_else(|| CliError::Validation {
        field: "action".into(),
        reason: format!("'{raw}' is not ACCEPT, DROP or REJECT"),
    })
}

/// An empty string clears the field.
fn merge_opt(slot: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value {
        *slot = if value.is_empty() { None } else { Some(value) };
    }
}

/// Overlay the flags that were given onto `input`.
fn apply_fields(mut input: RuleInput, fields: RuleFields) -> Result<RuleInput, CliError> {
    if let Some(direction) = fields.direction {
        input.direction = direction;
    }
    if let Some(ref action) = fields.action {
        input.action = parse_action(&input, action)?;
    }
    if fields.enable {
        input.enabled = true;
    }
    if fields.disable {
        input.enabled = false;
    }
    merge_opt(&mut input.protocol, fields.proto);
    merge_opt(&mut input.source_port, fields.sport);
    merge_opt(&mut input.dest_port, fields.dport);
    merge_opt(&mut input.source, fields.source);
    merge_opt(&mut input.destination, fields.dest);
    merge_opt(&mut input.macro_name, fields.macro_name);
    merge_opt(&mut input.iface, fields.iface);
    merge_opt(&mut input.comment, fields.comment);
    match fields.log {
        Some(LogLevel::Nolog) => input.log_level = None,
        Some(level) => input.log_level = Some(level),
        None => {}
    }
    Ok(input)
}

fn new_input(fields: RuleFields) -> Result<RuleInput, CliError> {
    let direction = fields.direction.ok_or_else(|| CliError::Validation {
        field: "direction".into(),
        reason: "--direction is required (in, out or group)".into(),
    })?;
    let action = fields.action.clone().ok_or_else(|| CliError::Validation {
        field: "action".into(),
        reason: "--action is required".into(),
    })?;
    let base = RuleInput::new(direction, RuleAction::Group(String::new()));
    let action = parse_action(&base, &action)?;
    apply_fields(RuleInput { action, ..base }, fields)
}

fn input_from_file(path: &std::path::Path) -> Result<RuleInput, CliError> {
    Ok(serde_json::from_value(util::read_json_file(path)?)?)
}

// ── Handler ─────────────────────────────────────────────────────────

fn print_rules(set: &RuleSet, global: &GlobalOpts) {
    if let Some(ref error) = set.load_error {
        if !global.quiet {
            eprintln!("warning: could not load rules for {}: {error}", set.scope);
        }
    }
    let color = output::should_color(&global.color);
    let out = output::render_list(
        &global.output,
        &set.rules,
        |r| RuleRow::new(r, color),
        |r| r.position.to_string(),
    );
    output::print_output(&out, global.quiet);
}

#[allow(clippy::too_many_lines)]
pub async fn handle(
    orchestrator: &Orchestrator<PveClient>,
    args: RulesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        RulesCommand::List { scope } => {
            let set = orchestrator.load(&scope).await?;
            print_rules(&set, global);
            Ok(())
        }

        RulesCommand::Get { scope, position } => {
            let rule = orchestrator.get_rule(&scope, position).await?;
            let out = output::render_single(&global.output, &rule, rule_detail, |r| {
                r.position.to_string()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        RulesCommand::Add {
            scope,
            from_file,
            fields,
        } => {
            let input = match from_file {
                Some(ref path) => input_from_file(path)?,
                None => new_input(fields)?,
            };
            orchestrator.add(&scope, &input).await?;
            show_after_mutation(orchestrator, &scope, global);
            Ok(())
        }

        RulesCommand::Update {
            scope,
            position,
            from_file,
            fields,
        } => {
            let input = match from_file {
                Some(ref path) => input_from_file(path)?,
                None => {
                    let current = orchestrator.get_rule(&scope, position).await?;
                    apply_fields(current.to_input(), fields)?
                }
            };
            orchestrator.update(&scope, position, &input).await?;
            show_after_mutation(orchestrator, &scope, global);
            Ok(())
        }

        RulesCommand::Toggle { scope, position } => {
            orchestrator.load(&scope).await?;
            let enabled = orchestrator.toggle(&scope, position).await?;
            if !global.quiet {
                eprintln!(
                    "rule {position} in {scope} is now {}",
                    if enabled { "enabled" } else { "disabled" }
                );
            }
            show_after_mutation(orchestrator, &scope, global);
            Ok(())
        }

        RulesCommand::Delete { scope, position } => {
            if !util::confirm(
                &format!("Delete rule {position} from {scope}?"),
                global.yes,
                "rules delete",
            )? {
                return Ok(());
            }
            orchestrator.remove(&scope, position).await?;
            show_after_mutation(orchestrator, &scope, global);
            Ok(())
        }

        RulesCommand::Move { scope, from, to } => {
            orchestrator.load(&scope).await?;
            orchestrator.move_rule(&scope, from, to).await?;
            show_after_mutation(orchestrator, &scope, global);
            Ok(())
        }

        RulesCommand::All(all) => match all.command {
            AllCommand::Hosts => {
                let bar = util::spinner("loading host rules", global.quiet);
                let hosts = orchestrator.load_all_hosts().await?;
                bar.finish_and_clear();
                let sets: Vec<Arc<RuleSet>> = hosts.into_values().collect();
                let out = output::render_list(&global.output, &sets, host_row, |s| {
                    s.scope.to_string()
                });
                output::print_output(&out, global.quiet);
                Ok(())
            }
            AllCommand::Guests => {
                let bar = util::spinner("loading guest firewalls", global.quiet);
                let guests = orchestrator.load_all_guests().await?;
                bar.finish_and_clear();
                let color = output::should_color(&global.color);
                let list: Vec<GuestFirewall> = guests.values().cloned().collect();
                let out = output::render_list(
                    &global.output,
                    &list,
                    |g| guest_row(g, color),
                    |g| g.scope.to_string(),
                );
                output::print_output(&out, global.quiet);
                Ok(())
            }
        },
    }
}

/// Print the list the remote returned after a mutation.
fn show_after_mutation(orchestrator: &Orchestrator<PveClient>, scope: &ScopeId, global: &GlobalOpts) {
    if let Some(set) = orchestrator.snapshot(scope) {
        print_rules(&set, global);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pvewall_core::{Direction, Verdict};

    use super::*;

    #[test]
    fn add_requires_direction_and_action() {
        let err = new_input(RuleFields::default()).unwrap_err();
        assert!(matches!(err, CliError::Validation { ref field, .. } if field == "direction"));

        let fields = RuleFields {
            direction: Some(Direction::In),
            ..RuleFields::default()
        };
        let err = new_input(fields).unwrap_err();
        assert!(matches!(err, CliError::Validation { ref field, .. } if field == "action"));
    }

    #[test]
    fn new_input_reads_every_flag() {
        let fields = RuleFields {
            direction: Some(Direction::In),
            action: Some("accept".into()),
            disable: true,
            dport: Some("22".into()),
            proto: Some("tcp".into()),
            log: Some(LogLevel::Info),
            comment: Some("ssh".into()),
            ..RuleFields::default()
        };
        let input = new_input(fields).unwrap();
        assert_eq!(input.action, RuleAction::Verdict(Verdict::Accept));
        assert!(!input.enabled);
        assert_eq!(input.dest_port.as_deref(), Some("22"));
        assert_eq!(input.log_level, Some(LogLevel::Info));
    }

    #[test]
    fn update_overlays_only_given_flags() {
        let mut current = RuleInput::new(Direction::In, RuleAction::Verdict(Verdict::Drop));
        current.source = Some("10.0.0.0/8".into());
        current.comment = Some("old".into());

        let fields = RuleFields {
            comment: Some(String::new()),
            dport: Some("443".into()),
            ..RuleFields::default()
        };
        let merged = apply_fields(current, fields).unwrap();
        assert_eq!(merged.source.as_deref(), Some("10.0.0.0/8"));
        assert_eq!(merged.comment, None);
        assert_eq!(merged.dest_port.as_deref(), Some("443"));
        assert_eq!(merged.action, RuleAction::Verdict(Verdict::Drop));
    }

    #[test]
    fn nolog_clears_the_log_level() {
        let mut current = RuleInput::new(Direction::In, RuleAction::Verdict(Verdict::Accept));
        current.log_level = Some(LogLevel::Warning);

        let untouched = apply_fields(current.clone(), RuleFields::default()).unwrap();
        assert_eq!(untouched.log_level, Some(LogLevel::Warning));

        let fields = RuleFields {
            log: Some(LogLevel::Nolog),
            ..RuleFields::default()
        };
        let cleared = apply_fields(current, fields).unwrap();
        assert_eq!(cleared.log_level, None);
    }

    #[test]
    fn group_rules_take_the_group_name() {
        let fields = RuleFields {
            direction: Some(Direction::Group),
            action: Some("webservers".into()),
            ..RuleFields::default()
        };
        let input = new_input(fields).unwrap();
        assert_eq!(input.action, RuleAction::Group("webservers".into()));
    }
}
