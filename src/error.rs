use thiserror::Error;

/// Unified error type for npm-flow operations
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Working tree has uncommitted changes: commit or stash them first")]
    UncommittedChanges,

    #[error("Wrong branch: expected '{expected}', currently on '{actual}'")]
    WrongBranch { expected: String, actual: String },

    #[error("A '{0}' branch already exists on the remote: finish it before starting another")]
    WorkflowAlreadyInProgress(String),

    #[error("Invalid version format: '{0}'")]
    InvalidVersionFormat(String),

    #[error("Invalid dependencies for {branch} branch: {}", .offenders.join(", "))]
    InvalidDependencies {
        branch: String,
        offenders: Vec<String>,
    },

    #[error("No lock file found (looked for {0})")]
    NoLockFileFound(String),

    #[error("Invalid scope '{0}': must start with '@' and contain no '/'")]
    InvalidScopeFormat(String),

    #[error("Invalid branch name '{0}'")]
    InvalidBranchName(String),

    #[error("Invalid manifest {path}: {reason}")]
    InvalidManifest { path: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("Command `{command}` failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias for Results in npm-flow
pub type Result<T> = std::result::Result<T, FlowError>;

impl FlowError {
    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        FlowError::Config(msg.into())
    }

    /// Create an invalid version error for the offending value
    pub fn version(value: impl Into<String>) -> Self {
        FlowError::InvalidVersionFormat(value.into())
    }

    /// Create an invalid manifest error with context
    pub fn manifest(path: impl Into<String>, reason: impl Into<String>) -> Self {
        FlowError::InvalidManifest {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a failed external command error
    pub fn command(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        FlowError::Command {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Whether this error came from git, the filesystem or the package manager
    /// rather than from a workflow rule.
    pub fn is_tool_failure(&self) -> bool {
        matches!(
            self,
            FlowError::Git(_) | FlowError::Command { .. } | FlowError::Io(_) | FlowError::Json(_)
        )
    }
}
