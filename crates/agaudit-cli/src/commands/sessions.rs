use crate::app::App;
use crate::cli::SessionsCommand;
use crate::output::heading;
use agaudit_engine::extract_tool_sequence;
use agaudit_sessions::SessionStore;
use anyhow::{Result, bail};

pub fn agents(app: &App) -> Result<()> {
    let agents = app.sessions.list_agents()?;
    if agents.is_empty() {
        println!(
            "No agents found under {}",
            app.sessions.root().display()
        );
        return Ok(());
    }
    for agent in agents {
        let count = app.sessions.list_sessions(&agent)?.len();
        println!("{}  ({} sessions)", agent, count);
    }
    Ok(())
}

pub fn run(app: &App, command: SessionsCommand) -> Result<()> {
    match command {
        SessionsCommand::List { agent } => list(app, &agent),
        SessionsCommand::Show { agent, session_id } => show(app, &agent, &session_id),
    }
}

fn list(app: &App, agent: &str) -> Result<()> {
    let sessions = app.sessions.list_sessions(agent)?;
    if sessions.is_empty() {
        println!("No sessions for agent '{}'", agent);
        return Ok(());
    }

    println!("{}", heading(&format!("Sessions for {}", agent)));
    for session in sessions {
        let modified = session
            .modified_at
            .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<28} {:>4} messages  {}",
            session.id, session.message_count, modified
        );
    }
    Ok(())
}

fn show(app: &App, agent: &str, session_id: &str) -> Result<()> {
    let Some(session) = app.sessions.load_session(agent, session_id)? else {
        bail!("Session '{}' not found for agent '{}'", session_id, agent);
    };

    println!("{}", heading(&format!("Session {}", session.id)));
    println!("  messages: {}", session.messages.len());
    if let Some(user_id) = &session.metadata.user_id {
        println!("  user: {}", user_id);
    }
    if let Some(timestamp) = session.metadata.timestamp {
        println!("  recorded: {}", timestamp.to_rfc3339());
    }
    if !session.metadata.tags.is_empty() {
        println!("  tags: {}", session.metadata.tags.join(", "));
    }

    let (raw_sequence, _) = extract_tool_sequence(&session.messages);
    if raw_sequence.is_empty() {
        println!("  tools: (none)");
    } else {
        println!("  tools: {}", raw_sequence.join(" → "));
    }
    Ok(())
}
