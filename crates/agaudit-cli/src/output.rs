use agaudit_types::JobStatus;
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;

pub fn use_color() -> bool {
    std::io::stdout().is_terminal()
}

pub fn verdict_label(is_compliant: bool) -> String {
    if use_color() {
        if is_compliant {
            "compliant".green().to_string()
        } else {
            "non-compliant".red().to_string()
        }
    } else if is_compliant {
        "compliant".to_string()
    } else {
        "non-compliant".to_string()
    }
}

pub fn job_status_label(status: JobStatus) -> String {
    let raw = status.as_str();
    if !use_color() {
        return raw.to_string();
    }
    match status {
        JobStatus::Completed => raw.green().to_string(),
        JobStatus::Failed => raw.red().to_string(),
        JobStatus::Running => raw.yellow().to_string(),
        JobStatus::Pending => raw.dimmed().to_string(),
    }
}

pub fn heading(text: &str) -> String {
    if use_color() {
        text.bold().to_string()
    } else {
        text.to_string()
    }
}
