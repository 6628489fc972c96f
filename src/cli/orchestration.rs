//! Command dispatch
//!
//! Maps a parsed command onto the matching [Workflow] method. Keeping this
//! free of clap lets the commands be run programmatically and tested against
//! the in-memory workspace.

use std::path::Path;

use crate::config::Config;
use crate::domain::{BranchType, ProcessBranch, TopicBranch};
use crate::error::Result;
use crate::git::{Git2Repository, VersionControl};
use crate::manifest::{ManifestStore, NpmStore};
use crate::workflow::{FinishOptions, Workflow, WorkflowRun};

/// One invocation of a workflow command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowCommand {
    StartTopic {
        topic: TopicBranch,
        name: String,
    },
    FinishTopic {
        topic: TopicBranch,
        options: FinishOptions,
    },
    StartRelease {
        version: Option<String>,
        no_version_check: Vec<String>,
    },
    FinishProcess {
        process: ProcessBranch,
        no_version_check: Vec<String>,
    },
    StartHotfix,
    UpdateLockFile {
        scopes: Vec<String>,
    },
    CheckDependencies {
        branch_type: Option<BranchType>,
        no_version_check: Vec<String>,
    },
}

/// Run a command against the given repository and package store
pub fn run_workflow<V, S>(
    command: &WorkflowCommand,
    vcs: &V,
    store: &S,
    config: &Config,
    quiet: bool,
) -> Result<WorkflowRun>
where
    V: VersionControl + ?Sized,
    S: ManifestStore + ?Sized,
{
    let mut flow = Workflow::new(vcs, store, config);
    if quiet {
        flow = flow.quiet();
    }

    match command {
        WorkflowCommand::StartTopic { topic, name } => flow.start_topic(*topic, name),
        WorkflowCommand::FinishTopic { topic, options } => flow.finish_topic(*topic, options),
        WorkflowCommand::StartRelease {
            version,
            no_version_check,
        } => flow.start_release(version.as_deref(), no_version_check),
        WorkflowCommand::FinishProcess {
            process,
            no_version_check,
        } => flow.finish_process(*process, no_version_check),
        WorkflowCommand::StartHotfix => flow.start_hotfix(),
        WorkflowCommand::UpdateLockFile { scopes } => flow.update_lock_file(scopes),
        WorkflowCommand::CheckDependencies {
            branch_type,
            no_version_check,
        } => flow.check_dependencies(*branch_type, no_version_check),
    }
}

/// Run a command in the git repository containing `dir`, with the package
/// root at the repository's working tree
pub fn run_in_directory(command: &WorkflowCommand, dir: &Path, config: &Config) -> Result<WorkflowRun> {
    let repo = Git2Repository::open(dir)?;
    let store = NpmStore::new(repo.workdir(), config.packages.clone());
    tracing::debug!(root = %store.root().display(), "opened workspace");

    run_workflow(command, &repo, &store, config, false)
}
