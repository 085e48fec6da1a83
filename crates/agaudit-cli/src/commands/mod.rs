mod compliance;
mod jobs;
mod policies;
mod sessions;
mod variants;

use crate::app::App;
use crate::cli::{Cli, Command};
use crate::config::{Config, resolve_data_dir};
use anyhow::Result;

pub async fn run(cli: Cli) -> Result<()> {
    if let Command::Init { sessions_root } = &cli.command {
        let data_dir = resolve_data_dir(cli.data_dir.as_deref())?;
        let config = Config {
            sessions_root: Some(sessions_root.clone()),
        };
        config.save(&data_dir)?;
        println!("Wrote {}", Config::path(&data_dir).display());
        return Ok(());
    }

    let app = App::from_cli(&cli)?;

    match cli.command {
        Command::Init { .. } => unreachable!("handled above"),
        Command::Agents => sessions::agents(&app),
        Command::Sessions { command } => sessions::run(&app, command),
        Command::Policies { command } => policies::run(&app, command),
        Command::Evaluate {
            agent,
            session_id,
            policy_ids,
        } => compliance::evaluate(&app, &agent, &session_id, &policy_ids).await,
        Command::Jobs { command } => jobs::run(&app, command).await,
        Command::Variants { command } => variants::run(&app, command),
        Command::Summary { agent, json } => compliance::summary(&app, &agent, json),
        Command::Resolve {
            agent,
            session_id,
            by,
            notes,
        } => compliance::resolve(&app, &agent, &session_id, by.as_deref(), notes.as_deref()),
    }
}
