//! Scope option command handlers.

use pvewall_api::PveClient;
use pvewall_core::{Direction, FirewallOptions, Orchestrator, ScopeId};

use crate::cli::{GlobalOpts, OptionsArgs, OptionsCommand};
use crate::error::CliError;
use crate::output;

fn options_detail(o: &FirewallOptions, color: bool) -> String {
    let policy = |v: Option<pvewall_core::Verdict>| {
        v.map_or_else(|| "-".into(), |v| output::verdict(&v.to_string(), color))
    };
    let level = |l: Option<pvewall_core::LogLevel>| l.map_or_else(|| "-".into(), |l| l.to_string());
    [
        format!("Firewall:    {}", output::on_off(o.enabled, color)),
        format!("Policy In:   {}", policy(o.policy_in)),
        format!("Policy Out:  {}", policy(o.policy_out)),
        format!("Log In:      {}", level(o.log_level_in)),
        format!("Log Out:     {}", level(o.log_level_out)),
    ]
    .join("\n")
}

async fn show(
    orchestrator: &Orchestrator<PveClient>,
    scope: &ScopeId,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let options = orchestrator.get_options(scope).await?;
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &options,
        |o| options_detail(o, color),
        |o| o.enabled.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn handle(
    orchestrator: &Orchestrator<PveClient>,
    args: OptionsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        OptionsCommand::Get { scope } => show(orchestrator, &scope, global).await,
        OptionsCommand::Set {
            scope,
            enable,
            disable,
            policy_in,
            policy_out,
        } => {
            if !enable && !disable && policy_in.is_none() && policy_out.is_none() {
                return Err(CliError::Validation {
                    field: "options".into(),
                    reason: "nothing to change: pass --enable, --disable, --policy-in or --policy-out"
                        .into(),
                });
            }
            if enable || disable {
                orchestrator.set_enabled(&scope, enable).await?;
            }
            if let Some(verdict) = policy_in {
                orchestrator.set_policy(&scope, Direction::In, verdict).await?;
            }
            if let Some(verdict) = policy_out {
                orchestrator.set_policy(&scope, Direction::Out, verdict).await?;
            }
            show(orchestrator, &scope, global).await
        }
    }
}
