use crate::app::App;
use crate::cli::PoliciesCommand;
use crate::output::heading;
use agaudit_types::{Policy, PolicyConfig, Severity};
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct PolicyFile {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    severity: Severity,
    #[serde(default = "default_enabled")]
    enabled: bool,
    config: PolicyConfig,
}

fn default_enabled() -> bool {
    true
}

pub fn run(app: &App, command: PoliciesCommand) -> Result<()> {
    match command {
        PoliciesCommand::List { agent } => list(app, &agent),
        PoliciesCommand::Show { agent, policy_id } => show(app, &agent, policy_id),
        PoliciesCommand::Add { agent, file } => add(app, &agent, &file),
        PoliciesCommand::Enable { agent, policy_id } => set_enabled(app, &agent, policy_id, true),
        PoliciesCommand::Disable { agent, policy_id } => set_enabled(app, &agent, policy_id, false),
        PoliciesCommand::Remove { agent, policy_id } => remove(app, &agent, policy_id),
    }
}

fn print_policy_line(policy: &Policy) {
    let state = if policy.enabled { "enabled" } else { "disabled" };
    println!(
        "  #{:<4} {:<36} {:<8} {}  ({} checks, {})",
        policy.id,
        policy.name,
        policy.severity.as_str(),
        state,
        policy.config.checks.len(),
        policy.config.violation_logic.kind.as_str(),
    );
}

fn list(app: &App, agent: &str) -> Result<()> {
    let handle = app.store.handle()?;
    let policies = handle.list_policies(agent, false)?;
    if policies.is_empty() {
        println!("No policies for agent '{}'", agent);
        return Ok(());
    }

    println!("{}", heading(&format!("Policies for {}", agent)));
    for policy in &policies {
        print_policy_line(policy);
    }
    Ok(())
}

fn show(app: &App, agent: &str, policy_id: i64) -> Result<()> {
    let handle = app.store.handle()?;
    let Some(policy) = handle.get_policy(agent, policy_id)? else {
        bail!("Policy {} not found for agent '{}'", policy_id, agent);
    };

    println!("{}", heading(&policy.name));
    if !policy.description.is_empty() {
        println!("  {}", policy.description);
    }
    println!("  severity: {}", policy.severity.as_str());
    println!("  enabled: {}", policy.enabled);
    println!("  updated: {}", policy.updated_at.to_rfc3339());
    println!("{}", serde_json::to_string_pretty(&policy.config)?);
    Ok(())
}

fn add(app: &App, agent: &str, file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read policy file: {}", file.display()))?;
    let parsed: PolicyFile = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid policy file: {}", file.display()))?;

    let handle = app.store.handle()?;
    let policy = handle.insert_policy(
        agent,
        &parsed.name,
        &parsed.description,
        parsed.severity,
        parsed.enabled,
        &parsed.config,
    )?;
    println!("Created policy #{} '{}'", policy.id, policy.name);
    Ok(())
}

fn set_enabled(app: &App, agent: &str, policy_id: i64, enabled: bool) -> Result<()> {
    let handle = app.store.handle()?;
    if !handle.set_policy_enabled(agent, policy_id, enabled)? {
        bail!("Policy {} not found for agent '{}'", policy_id, agent);
    }
    println!(
        "Policy {} {}",
        policy_id,
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

fn remove(app: &App, agent: &str, policy_id: i64) -> Result<()> {
    let mut handle = app.store.handle()?;
    if !handle.delete_policy(agent, policy_id)? {
        bail!("Policy {} not found for agent '{}'", policy_id, agent);
    }
    println!("Deleted policy {}", policy_id);
    Ok(())
}
