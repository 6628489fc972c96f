//! Pure formatting functions for UI output.
//!
//! Progress goes to stdout, problems to stderr. Colors come from `console`,
//! which drops them automatically when the stream is not a terminal.

use console::style;

use crate::warning::FlowWarning;
use crate::workflow::WorkflowRun;

/// Format and print an error message in red.
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red().bold(), message);
}

/// Format and print a success message with green checkmark.
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

/// Format and print a status message with yellow arrow.
pub fn display_status(message: &str) {
    println!("{} {}", style("→").yellow(), message);
}

/// Display a workflow warning to the user.
pub fn display_warning(warning: &FlowWarning) {
    eprintln!("{} {}", style("⚠ WARNING:").yellow(), warning);
}

/// Report the step a workflow stopped at and what had already been done,
/// so the repository can be repaired by hand.
pub fn display_step_failure(step: &str, completed: &[String]) {
    eprintln!("{} {}", style("✗ Failed at:").red().bold(), step);
    if completed.is_empty() {
        eprintln!("  No step had completed; nothing was changed.");
        return;
    }
    eprintln!("  Already completed (not rolled back):");
    for done in completed {
        eprintln!("    - {}", done);
    }
}

/// Summary lines for a finished workflow
pub fn format_summary(run: &WorkflowRun) -> Vec<String> {
    let mut lines = vec![format!("{} completed", run.command)];
    if let Some(branch) = &run.branch {
        lines.push(format!("  Branch:  {}", branch));
    }
    if let Some(version) = &run.version {
        lines.push(format!("  Version: {}", version));
    }
    if let Some(tag) = &run.tag {
        lines.push(format!("  Tag:     {}", tag));
    }
    if !run.changed_packages.is_empty() {
        lines.push(format!("  Updated: {}", run.changed_packages.join(", ")));
    }
    lines.push(format!("  Steps:   {}", run.completed.len()));
    lines
}

/// Display the summary of a finished workflow, preceded by its warnings.
pub fn display_summary(run: &WorkflowRun) {
    for warning in &run.warnings {
        display_warning(warning);
    }

    let mut lines = format_summary(run).into_iter();
    if let Some(headline) = lines.next() {
        println!();
        display_success(&style(headline).bold().to_string());
    }
    for line in lines {
        println!("{}", line);
    }
}
