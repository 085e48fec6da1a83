use crate::app::App;
use crate::output::{heading, verdict_label};
use agaudit_runtime::{agent_summary, evaluate_and_store};
use anyhow::Result;

pub async fn evaluate(
    app: &App,
    agent: &str,
    session_id: &str,
    policy_ids: &[i64],
) -> Result<()> {
    let policy_filter = if policy_ids.is_empty() {
        None
    } else {
        Some(policy_ids)
    };

    let evaluations = evaluate_and_store(
        &app.store,
        app.sessions.as_ref(),
        app.validators.clone(),
        agent,
        session_id,
        policy_filter,
    )
    .await?;

    let handle = app.store.handle()?;
    println!("{}", heading(&format!("Evaluations for {}", session_id)));
    for evaluation in &evaluations {
        let policy_name = handle
            .get_policy(agent, evaluation.policy_id)?
            .map(|policy| policy.name)
            .unwrap_or_else(|| format!("policy {}", evaluation.policy_id));
        println!(
            "  {:<36} {}",
            policy_name,
            verdict_label(evaluation.is_compliant)
        );
        if !evaluation.is_compliant {
            for detail in &evaluation.details {
                if let Some(message) = detail.get("violation_message").and_then(|v| v.as_str()) {
                    println!("      {}", message);
                }
            }
        }
    }
    Ok(())
}

pub fn summary(app: &App, agent: &str, json: bool) -> Result<()> {
    let summary = agent_summary(&app.store, app.sessions.as_ref(), agent)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("{}", heading(&format!("Compliance summary for {}", agent)));
    println!(
        "  sessions: {} total, {} fully evaluated",
        summary.total_sessions, summary.processed_sessions
    );
    println!("  enabled policies: {}", summary.total_policies);

    if !summary.by_policy.is_empty() {
        println!("{}", heading("By policy"));
        for rollup in &summary.by_policy {
            println!(
                "  {:<36} {:>3}/{:<3} compliant ({:>5.1}%)",
                rollup.name, rollup.compliant_count, rollup.total_count, rollup.compliance_rate
            );
        }
    }

    let issues: Vec<_> = summary
        .sessions
        .iter()
        .filter(|session| !session.is_compliant)
        .collect();
    if !issues.is_empty() {
        println!("{}", heading("Sessions with issues"));
        for session in issues {
            let marker = match session.compliance_status.as_str() {
                "resolved" => " (resolved)",
                _ => "",
            };
            println!(
                "  {:<28} {:>2} violation(s){}{}",
                session.session_id,
                session.violation_count,
                marker,
                if session.needs_reprocessing {
                    "  [stale]"
                } else {
                    ""
                },
            );
        }
    }

    let usage = &summary.llm_usage_totals;
    if usage.total_calls > 0 {
        println!("{}", heading("LLM usage"));
        println!(
            "  {} call(s), {} tokens, ${:.4}",
            usage.total_calls, usage.total_tokens, usage.cost_usd
        );
    }
    Ok(())
}

pub fn resolve(
    app: &App,
    agent: &str,
    session_id: &str,
    by: Option<&str>,
    notes: Option<&str>,
) -> Result<()> {
    let handle = app.store.handle()?;
    let record = handle.mark_resolved(agent, session_id, by, notes)?;
    println!(
        "Session {} marked resolved{}",
        session_id,
        record
            .resolved_by
            .map(|user| format!(" by {}", user))
            .unwrap_or_default()
    );
    Ok(())
}
