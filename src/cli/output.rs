use colored::Colorize;
use serde::Serialize;

use crate::api::profile::{Profile, ProjectStatus};
use crate::error::SwiftyError;
use crate::session::SessionSnapshot;
use crate::types::SessionState;

const BAR_WIDTH: usize = 20;

/// Print any serializable value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

pub fn print_error(err: &SwiftyError, json_mode: bool) {
    if json_mode {
        print_json(&err.to_json());
    } else {
        eprintln!("{}", err);
    }
}

pub fn print_status(snapshot: &SessionSnapshot, is_tty: bool) {
    let state = match snapshot.state {
        SessionState::SignedIn if is_tty => snapshot.state.as_str().green().bold().to_string(),
        SessionState::SignedOut if is_tty => snapshot.state.as_str().yellow().to_string(),
        _ => snapshot.state.to_string(),
    };
    println!("State:   {state}");
    if let Some(ref login) = snapshot.login {
        println!("User:    {login}");
    }
    if let Some(expires_at) = snapshot.expires_at {
        println!("Expires: {}", expires_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if !snapshot.online {
        let msg = "Offline: check your internet connection";
        if is_tty {
            println!("{}", msg.red());
        } else {
            println!("{msg}");
        }
    }
}

/// `[#######.............] 35%`
fn progress_bar(percent: u8) -> String {
    let filled = usize::from(percent.min(100)) * BAR_WIDTH / 100;
    format!(
        "[{}{}] {percent}%",
        "#".repeat(filled),
        ".".repeat(BAR_WIDTH - filled)
    )
}

fn status_label(status: &ProjectStatus) -> String {
    match status {
        ProjectStatus::Other(raw) => raw.replace('_', " "),
        other => serde_json::to_value(other)
            .ok()
            .and_then(|v| v.as_str().map(|s| s.replace('_', " ")))
            .unwrap_or_default(),
    }
}

pub fn print_profile(profile: &Profile, is_tty: bool) {
    let heading = format!("{} ({})", profile.display_name, profile.login);
    if is_tty {
        println!("{}", heading.bold());
    } else {
        println!("{heading}");
    }
    if let Some(ref email) = profile.email {
        println!("  email:      {email}");
    }
    println!(
        "  location:   {}",
        profile.location.as_deref().unwrap_or("unavailable")
    );
    println!("  wallet:     {}", profile.wallet);
    println!("  evaluation: {}", profile.correction_points);
    if let Some(ref pool) = profile.pool {
        println!("  pool:       {pool}");
    }
    println!(
        "  level:      {:.2} {}",
        profile.level,
        progress_bar(profile.progress_percent())
    );

    if !profile.skills.is_empty() {
        println!();
        println!("Skills");
        for skill in &profile.skills {
            println!(
                "  {:<32} {:>5.2} {}",
                skill.name,
                skill.level,
                progress_bar(skill.percent())
            );
        }
    }

    if !profile.projects.is_empty() {
        println!();
        println!("Projects");
        for project in profile.projects_sorted() {
            let mark = match (project.final_mark, project.validated) {
                (Some(mark), Some(true)) if is_tty => mark.to_string().green().to_string(),
                (Some(mark), Some(false)) if is_tty => mark.to_string().red().to_string(),
                (Some(mark), _) => mark.to_string(),
                (None, _) => "-".to_string(),
            };
            let status = status_label(&project.status);
            let status = if is_tty && project.status == ProjectStatus::InProgress {
                status.cyan().to_string()
            } else {
                status
            };
            println!("  {:<32} {:<24} {mark}", project.name, status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_bar_widths() {
        assert_eq!(progress_bar(0), format!("[{}] 0%", ".".repeat(BAR_WIDTH)));
        assert_eq!(progress_bar(100), format!("[{}] 100%", "#".repeat(BAR_WIDTH)));
        assert!(progress_bar(50).starts_with("[##########.........."));
    }

    #[test]
    fn status_labels_are_readable() {
        assert_eq!(status_label(&ProjectStatus::InProgress), "in progress");
        assert_eq!(
            status_label(&ProjectStatus::WaitingForCorrection),
            "waiting for correction"
        );
        assert_eq!(
            status_label(&ProjectStatus::Other("brand_new".into())),
            "brand new"
        );
    }

    #[test]
    fn print_status_does_not_panic() {
        let snapshot = SessionSnapshot {
            state: SessionState::SignedOut,
            online: false,
            expires_at: None,
            login: None,
        };
        print_status(&snapshot, true);
        print_status(&snapshot, false);
    }

    #[test]
    fn print_error_json() {
        print_error(&SwiftyError::NotSignedIn, true);
    }
}
