use crate::app::App;
use crate::cli::VariantsCommand;
use crate::output::heading;
use agaudit_runtime::refresh_variants;
use anyhow::Result;

pub fn run(app: &App, command: VariantsCommand) -> Result<()> {
    match command {
        VariantsCommand::Refresh { agent } => refresh(app, &agent),
        VariantsCommand::List { agent } => list(app, &agent),
        VariantsCommand::Transitions {
            agent,
            variant,
            csv,
        } => transitions(app, &agent, variant, csv),
    }
}

fn refresh(app: &App, agent: &str) -> Result<()> {
    let summary = refresh_variants(&app.store, app.sessions.as_ref(), agent)?;
    println!(
        "Rebuilt {} variant(s) from {} evaluated session(s)",
        summary.variants, summary.sessions_processed
    );
    Ok(())
}

fn list(app: &App, agent: &str) -> Result<()> {
    let handle = app.store.handle()?;
    let mut variants = handle.list_variants(agent)?;
    if variants.is_empty() {
        println!(
            "No variants for agent '{}'. Run `agaudit variants refresh --agent {}` after evaluating sessions.",
            agent, agent
        );
        return Ok(());
    }

    variants.sort_by(|a, b| b.session_ids.len().cmp(&a.session_ids.len()));
    let total_sessions: usize = variants.iter().map(|v| v.session_ids.len()).sum();

    println!("{}", heading(&format!("Variants for {}", agent)));
    for variant in &variants {
        let share = if total_sessions > 0 {
            variant.session_ids.len() as f64 / total_sessions as f64 * 100.0
        } else {
            0.0
        };
        println!(
            "  #{:<4} {:<44} {:>3} session(s) ({:>5.1}%)  {} tools",
            variant.id,
            variant.name,
            variant.session_ids.len(),
            share,
            variant.tool_count,
        );
        println!("        {}", variant.sequence_display);
    }
    Ok(())
}

fn transitions(app: &App, agent: &str, variant: Option<i64>, csv_output: bool) -> Result<()> {
    let handle = app.store.handle()?;
    let transitions = handle.list_transitions(agent, variant)?;
    if transitions.is_empty() {
        println!("No transitions recorded for agent '{}'", agent);
        return Ok(());
    }

    if csv_output {
        let mut writer = csv::Writer::from_writer(std::io::stdout());
        writer.write_record(["from_tool", "to_tool", "count"])?;
        for transition in &transitions {
            writer.write_record([
                transition.from_tool.as_str(),
                transition.to_tool.as_str(),
                &transition.count.to_string(),
            ])?;
        }
        writer.flush()?;
        return Ok(());
    }

    println!("{}", heading(&format!("Transitions for {}", agent)));
    for transition in &transitions {
        println!(
            "  {:<28} → {:<28} {:>6}",
            transition.from_tool, transition.to_tool, transition.count
        );
    }
    Ok(())
}
