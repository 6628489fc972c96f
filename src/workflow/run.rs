use crate::error::Result;
use crate::ui;
use crate::warning::FlowWarning;

/// What one workflow invocation did
///
/// Values computed by one step and needed by a later one (the branch, the
/// version) are recorded here rather than in shared state. Nothing is
/// persisted: the record lives for one invocation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorkflowRun {
    /// Command name as typed on the command line
    pub command: String,
    /// Branch the workflow created or finished
    pub branch: Option<String>,
    /// Version written by the workflow
    pub version: Option<String>,
    /// Tag created by the workflow
    pub tag: Option<String>,
    /// Packages whose dependency entries or lock-file entries were changed
    pub changed_packages: Vec<String>,
    /// Completed steps, in order
    pub completed: Vec<String>,
    pub warnings: Vec<FlowWarning>,
    quiet: bool,
}

impl WorkflowRun {
    pub fn new(command: impl Into<String>) -> Self {
        WorkflowRun {
            command: command.into(),
            ..WorkflowRun::default()
        }
    }

    /// A run that records steps without printing progress
    pub fn quiet(command: impl Into<String>) -> Self {
        WorkflowRun {
            quiet: true,
            ..WorkflowRun::new(command)
        }
    }

    /// Run one step. On success the step is recorded as completed; on
    /// failure the step and everything completed before it are reported and
    /// the error is returned unchanged.
    pub fn step<T>(&mut self, label: impl Into<String>, action: impl FnOnce() -> Result<T>) -> Result<T> {
        let label = label.into();
        if !self.quiet {
            ui::display_status(&label);
        }

        match action() {
            Ok(value) => {
                tracing::info!(command = %self.command, step = %label, "step completed");
                self.completed.push(label);
                Ok(value)
            }
            Err(e) => {
                tracing::error!(
                    command = %self.command,
                    step = %label,
                    completed = self.completed.len(),
                    error = %e,
                    "step failed"
                );
                if !self.quiet {
                    ui::display_step_failure(&label, &self.completed);
                }
                Err(e)
            }
        }
    }

    pub fn warn(&mut self, warning: FlowWarning) {
        tracing::warn!(command = %self.command, %warning);
        self.warnings.push(warning);
    }
}
