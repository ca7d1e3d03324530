//! `pvewall mode`: what the connected target is and which scopes it offers.

use serde::Serialize;
use tabled::Tabled;

use pvewall_api::PveClient;
use pvewall_core::{Mode, Orchestrator, ScopeKind, Topology};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct ModeReport {
    mode: Mode,
    available: Vec<ScopeKind>,
    #[serde(flatten)]
    topology: Topology,
}

#[derive(Tabled)]
struct GuestRow {
    #[tabled(rename = "Scope")]
    scope: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
}

fn detail(report: &ModeReport, color: bool) -> String {
    let available: Vec<String> = report.available.iter().map(ToString::to_string).collect();
    let nodes: Vec<String> = report
        .topology
        .nodes
        .iter()
        .map(|n| {
            let state = if n.online { "online" } else { "offline" };
            format!("{} ({state})", n.name)
        })
        .collect();

    let mut out = vec![
        format!("Mode:        {}", report.mode),
        format!("Scopes:      {}", available.join(", ")),
        format!("Nodes:       {}", nodes.join(", ")),
    ];
    if !report.topology.guests.is_empty() {
        let rows: Vec<GuestRow> = report
            .topology
            .guests
            .iter()
            .map(|g| GuestRow {
                scope: g.scope().to_string(),
                name: g.name.clone().unwrap_or_else(|| "-".into()),
                state: output::on_off(g.running, color),
            })
            .collect();
        out.push(String::new());
        out.push(output::render_table(&rows));
    }
    out.join("\n")
}

pub async fn handle(
    orchestrator: &Orchestrator<PveClient>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mode = orchestrator.refresh_topology().await?;
    let report = ModeReport {
        mode,
        available: mode.available_kinds().to_vec(),
        topology: orchestrator.topology().unwrap_or_default(),
    };
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &report,
        |r| detail(r, color),
        |r| r.mode.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
