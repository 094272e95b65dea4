use crate::infra::{sample_rules, seed_agents, seed_leads};
use chrono::Local;
use clap::Args;
use realty_crm::error::AppError;
use realty_crm::workflows::assignment::{
    AgentId, AssignmentExecutor, AssignmentResult, AssignmentSettings, AutoAssignmentView,
    Evaluation, InMemoryAgentDirectory, InMemoryLeadStore, InMemoryRuleRepository,
    JsonFileRuleRepository, Lead, LeadId, RuleKind, RuleRepository, RuleSet, WorkloadSnapshot,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Print the batch result and workload as JSON instead of a text summary.
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ValidateRulesArgs {
    /// Path to a rules document (`geolocationRules`, `capacityRules`, `specializationRules`)
    pub(crate) path: PathBuf,
}

/// Everything the demo prints, gathered before any output is written.
struct DemoReport {
    agent_names: BTreeMap<AgentId, String>,
    recommendations: Vec<(Lead, Evaluation)>,
    result: AssignmentResult,
    workload: Vec<WorkloadSnapshot>,
    notices: Vec<String>,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let report = collect_report().await?;
    let stdout = io::stdout();
    let stderr = io::stderr();
    write_report(&report, args.json, &mut stdout.lock(), &mut stderr.lock())
}

async fn collect_report() -> Result<DemoReport, AppError> {
    let agents = seed_agents();
    let leads = seed_leads();
    let agent_names = agents
        .iter()
        .map(|agent| (agent.id.clone(), agent.name.clone()))
        .collect();
    let lead_ids: Vec<LeadId> = leads.iter().map(|lead| lead.id.clone()).collect();

    let repository = InMemoryRuleRepository::default();
    let RuleSet {
        geolocation_rules,
        capacity_rules,
        specialization_rules,
    } = sample_rules();
    repository.replace_all(geolocation_rules, capacity_rules, specialization_rules)?;

    let executor = AssignmentExecutor::new(
        Arc::new(repository),
        Arc::new(InMemoryAgentDirectory::with_agents(agents)),
        Arc::new(InMemoryLeadStore::with_leads(leads.clone())),
        AssignmentSettings::default(),
    );

    let mut notices = Vec::new();
    let mut recommendations = Vec::new();
    for lead in leads {
        match executor.recommend(&lead.id).await {
            Ok(evaluation) => recommendations.push((lead, evaluation)),
            Err(err) => notices.push(format!("Recommendation for {} unavailable: {}", lead.id, err)),
        }
    }

    let result = executor.assign_auto(&lead_ids, false).await;
    let workload = match executor.workload().await {
        Ok(workload) => workload,
        Err(err) => {
            notices.push(format!("Workload unavailable: {}", err));
            Vec::new()
        }
    };

    Ok(DemoReport {
        agent_names,
        recommendations,
        result,
        workload,
        notices,
    })
}

/// JSON mode keeps `out` parseable: notices go to `diagnostics` instead.
fn write_report<W, E>(
    report: &DemoReport,
    json: bool,
    out: &mut W,
    diagnostics: &mut E,
) -> Result<(), AppError>
where
    W: Write,
    E: Write,
{
    if json {
        for notice in &report.notices {
            warn!(notice = %notice, "demo data incomplete");
            writeln!(diagnostics, "{}", notice)?;
        }
        let payload = json!({
            "generatedAt": Local::now().to_rfc3339(),
            "result": AutoAssignmentView::from(report.result.clone()),
            "workload": report.workload,
        });
        match serde_json::to_string_pretty(&payload) {
            Ok(json) => writeln!(out, "{}", json)?,
            Err(err) => writeln!(diagnostics, "Demo payload unavailable: {}", err)?,
        }
        return Ok(());
    }

    writeln!(out, "Lead assignment demo ({})", Local::now().format("%Y-%m-%d %H:%M"))?;
    for notice in &report.notices {
        writeln!(out, "  {}", notice)?;
    }

    writeln!(out, "\nCandidate rankings")?;
    for (lead, evaluation) in &report.recommendations {
        writeln!(
            out,
            "- {} ({}, {} in {})",
            lead.id,
            lead.name,
            lead.property_type.label(),
            lead.preferred_location
        )?;
        if evaluation.candidates.is_empty() {
            writeln!(out, "    no eligible agents")?;
        }
        for candidate in evaluation.candidates.iter().take(3) {
            writeln!(
                out,
                "    {:>3}  {} ({:.0}% loaded)",
                candidate.score,
                candidate.agent_name,
                candidate.ratio * 100.0
            )?;
        }
    }

    writeln!(out, "\nAssignments")?;
    for (lead_id, agent_id) in &report.result.assigned {
        let name = report
            .agent_names
            .get(agent_id)
            .map(String::as_str)
            .unwrap_or("unknown agent");
        writeln!(out, "- {} -> {} ({})", lead_id, name, agent_id)?;
    }
    if report.result.failed.is_empty() {
        writeln!(out, "Failures: none")?;
    } else {
        writeln!(out, "Failures")?;
        for (lead_id, reason) in &report.result.failed {
            writeln!(out, "- {}: {}", lead_id, reason.summary())?;
        }
    }

    writeln!(out, "\nAgent workload")?;
    for snapshot in &report.workload {
        writeln!(
            out,
            "- {}: {}/{} leads ({:?}, {} open slots)",
            snapshot.name,
            snapshot.current_lead_count,
            snapshot.capacity,
            snapshot.band,
            snapshot.remaining
        )?;
    }

    Ok(())
}

pub(crate) fn validate_rules(args: ValidateRulesArgs) -> Result<(), AppError> {
    let rules = JsonFileRuleRepository::read_document(&args.path)?;

    println!("{} is valid", args.path.display());
    for kind in RuleKind::ALL {
        println!(
            "- {}: {} rules ({} active)",
            kind.label(),
            rules.collection(kind).len(),
            rules.active(kind).len()
        );
    }
    Ok(())
}
