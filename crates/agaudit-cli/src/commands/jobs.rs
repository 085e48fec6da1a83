use crate::app::App;
use crate::cli::JobsCommand;
use crate::output::{heading, job_status_label};
use agaudit_runtime::SubmitRequest;
use agaudit_sessions::SessionStore;
use agaudit_types::{JobStatus, ProcessingJob};
use anyhow::{Result, bail};
use std::time::Duration;

pub async fn run(app: &App, command: JobsCommand) -> Result<()> {
    match command {
        JobsCommand::Submit {
            agent,
            session_ids,
            all,
            policy_ids,
            refresh_variants,
        } => submit(app, &agent, session_ids, all, policy_ids, refresh_variants).await,
        JobsCommand::Status { job_id } => status(app, &job_id),
        JobsCommand::Result { job_id } => result(app, &job_id),
        JobsCommand::List {
            agent,
            status,
            limit,
        } => list(app, agent.as_deref(), status.as_deref(), limit),
        JobsCommand::Delete { job_id } => delete(app, &job_id),
    }
}

fn parse_status(raw: &str) -> Result<JobStatus> {
    match raw {
        "pending" => Ok(JobStatus::Pending),
        "running" => Ok(JobStatus::Running),
        "completed" => Ok(JobStatus::Completed),
        "failed" => Ok(JobStatus::Failed),
        other => bail!("Unknown job status '{}'", other),
    }
}

async fn submit(
    app: &App,
    agent: &str,
    session_ids: Vec<String>,
    all: bool,
    policy_ids: Vec<i64>,
    refresh_variants: bool,
) -> Result<()> {
    let session_ids = if all {
        app.sessions
            .list_sessions(agent)?
            .into_iter()
            .map(|summary| summary.id)
            .collect()
    } else {
        session_ids
    };
    if session_ids.is_empty() {
        bail!("No sessions given; pass --session or --all");
    }

    let controller = app.controller();
    let receipt = controller.submit(
        agent,
        SubmitRequest {
            session_ids,
            policy_ids: if policy_ids.is_empty() {
                None
            } else {
                Some(policy_ids)
            },
            refresh_variants,
        },
    )?;
    println!("{}", receipt.message);
    println!("Job {}", receipt.job_id);

    // The worker lives in this process, so wait for it before exiting
    let mut last_completed = -1;
    let job = loop {
        let job = controller.job_status(&receipt.job_id)?;
        if job.completed_items != last_completed {
            last_completed = job.completed_items;
            println!(
                "  {}/{} ({:.0}%)",
                job.completed_items,
                job.total_items,
                job.progress_percent()
            );
        }
        if job.status.is_terminal() {
            break job;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    };

    print_job(&job);
    Ok(())
}

fn print_job(job: &ProcessingJob) {
    println!("{}", heading(&format!("Job {}", job.id)));
    println!("  agent: {}", job.agent_id);
    println!("  status: {}", job_status_label(job.status));
    println!(
        "  progress: {}/{} ({:.1}%), {} failed",
        job.completed_items,
        job.total_items,
        job.progress_percent(),
        job.failed_items
    );
    if let Some(error) = &job.error_message {
        println!("  error: {}", error);
    }
    if let (Some(started), Some(completed)) = (job.started_at, job.completed_at) {
        let elapsed = completed.signed_duration_since(started);
        println!("  took: {}.{:03}s", elapsed.num_seconds(), elapsed.num_milliseconds() % 1000);
    }
}

fn status(app: &App, job_id: &str) -> Result<()> {
    let job = app.controller().job_status(job_id)?;
    print_job(&job);
    Ok(())
}

fn result(app: &App, job_id: &str) -> Result<()> {
    let job = app.controller().job_status(job_id)?;
    print_job(&job);
    for item in &job.results {
        println!("{}", serde_json::to_string(item)?);
    }
    Ok(())
}

fn list(app: &App, agent: Option<&str>, status: Option<&str>, limit: usize) -> Result<()> {
    let status = status.map(parse_status).transpose()?;
    let jobs = app.controller().list_jobs(agent, status, limit)?;
    if jobs.is_empty() {
        println!("No jobs");
        return Ok(());
    }
    for job in jobs {
        println!(
            "{}  {:<10} {:<9} {}/{} items  {}",
            job.id,
            job.agent_id,
            job_status_label(job.status),
            job.completed_items,
            job.total_items,
            job.created_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    Ok(())
}

fn delete(app: &App, job_id: &str) -> Result<()> {
    app.controller().delete_job(job_id)?;
    println!("Deleted job {}", job_id);
    Ok(())
}
