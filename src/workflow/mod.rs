//! Gitflow workflow state machine
//!
//! Each public method of [Workflow] is one command: a fixed, linear sequence
//! of git and manifest operations run through [WorkflowRun::step]. The first
//! failing step aborts the command. Nothing already done is undone; the
//! failure report lists the completed steps so the repository can be repaired
//! by hand.

pub mod run;

pub use run::WorkflowRun;

use crate::config::Config;
use crate::dependencies::{rewrite_dependencies, validate_dependencies};
use crate::domain::{
    increment_patch, validate_topic_name, version_core, BranchType, ProcessBranch, TopicBranch,
    Version, DEVELOP, MAIN,
};
use crate::error::{FlowError, Result};
use crate::git::{CommitOptions, MergeMode, PushOptions, VersionControl};
use crate::manifest::{Manifest, ManifestStore, MANIFEST_FILE};
use crate::pruner;
use crate::warning::FlowWarning;

/// Options of `feature-finish` / `bugfix-finish`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinishOptions {
    /// Squash the topic branch into a single commit on develop
    pub squash: bool,
    /// Message of the squash commit
    pub message: Option<String>,
}

const ALLOW_EMPTY: CommitOptions = CommitOptions { allow_empty: true };

/// Runs gitflow commands against a repository and its package manifests
pub struct Workflow<'a, V: ?Sized, S: ?Sized> {
    vcs: &'a V,
    store: &'a S,
    config: &'a Config,
    quiet: bool,
}

impl<'a, V, S> Workflow<'a, V, S>
where
    V: VersionControl + ?Sized,
    S: ManifestStore + ?Sized,
{
    pub fn new(vcs: &'a V, store: &'a S, config: &'a Config) -> Self {
        Workflow {
            vcs,
            store,
            config,
            quiet: false,
        }
    }

    /// Do not print step progress
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    fn new_run(&self, command: impl Into<String>) -> WorkflowRun {
        if self.quiet {
            WorkflowRun::quiet(command)
        } else {
            WorkflowRun::new(command)
        }
    }

    fn remote(&self) -> &str {
        &self.config.remote
    }

    fn ensure_clean(&self) -> Result<()> {
        if self.vcs.is_clean()? {
            Ok(())
        } else {
            Err(FlowError::UncommittedChanges)
        }
    }

    /// Advisory check: the singleton branch must not exist on the remote yet.
    /// Another actor can still create it between this check and our push.
    fn ensure_not_in_progress(&self, process: ProcessBranch) -> Result<()> {
        let heads = self.vcs.list_remote_heads(self.remote())?;
        if heads.iter().any(|head| head == process.name()) {
            return Err(FlowError::WorkflowAlreadyInProgress(process.name().to_string()));
        }
        Ok(())
    }

    fn switch_and_update(&self, branch: &str) -> Result<()> {
        self.vcs.checkout(branch)?;
        self.vcs.pull(self.remote(), branch)
    }

    fn root_version(&self) -> Result<String> {
        Ok(self.store.read_root_manifest()?.version)
    }

    fn version_at(&self, revision: &str) -> Result<String> {
        let content = self.vcs.show_file_at_revision(revision, MANIFEST_FILE)?;
        let manifest = Manifest::parse(format!("{}:{}", revision, MANIFEST_FILE), &content)?;
        Ok(manifest.version)
    }

    fn delete_everywhere(&self, run: &mut WorkflowRun, branch: &str) -> Result<()> {
        run.step(format!("delete local branch {}", branch), || {
            self.vcs.delete_local_branch(branch)
        })?;
        run.step(format!("delete remote branch {}", branch), || {
            self.vcs.push(self.remote(), branch, PushOptions::delete())
        })
    }

    /// `feature-start <name>` / `bugfix-start <name>`
    pub fn start_topic(&self, topic: TopicBranch, name: &str) -> Result<WorkflowRun> {
        validate_topic_name(name)?;
        self.ensure_clean()?;

        let branch = topic.branch_name(name);
        let mut run = self.new_run(format!("{}-start", topic.prefix()));
        run.branch = Some(branch.clone());

        run.step("update develop", || self.switch_and_update(DEVELOP))?;
        let develop_version = run.step("read develop version", || self.root_version())?;

        let identifier = topic.prerelease_identifier(name);
        let version = Version::parse(&develop_version)?
            .with_prerelease(&[identifier.as_str(), "0"])?
            .to_string();
        run.version = Some(version.clone());

        run.step(format!("create branch {}", branch), || {
            self.vcs.checkout_local_branch(&branch)
        })?;
        run.step(format!("set version {}", version), || {
            self.store.set_version(&version)
        })?;
        run.step("commit version", || {
            self.vcs
                .commit(&format!("chore: start {} at {}", branch, version), ALLOW_EMPTY)
        })?;
        run.step(format!("push {}", branch), || {
            self.vcs.push(self.remote(), &branch, PushOptions::upstream())
        })?;

        Ok(run)
    }

    /// `feature-finish` / `bugfix-finish`, run from the topic branch
    pub fn finish_topic(&self, topic: TopicBranch, options: &FinishOptions) -> Result<WorkflowRun> {
        self.ensure_clean()?;

        let branch = self.vcs.current_branch()?;
        let prefix = format!("{}/", topic.prefix());
        if !branch.starts_with(&prefix) || branch.len() == prefix.len() {
            return Err(FlowError::WrongBranch {
                expected: format!("{}*", prefix),
                actual: branch,
            });
        }

        let mut run = self.new_run(format!("{}-finish", topic.prefix()));
        run.branch = Some(branch.clone());

        let mode = if options.squash {
            MergeMode::Squash {
                message: options.message.clone().unwrap_or_else(|| {
                    format!("{}: squash merge {} into {}", topic.commit_type(), branch, DEVELOP)
                }),
            }
        } else {
            MergeMode::NoFastForward
        };

        run.step(format!("pull develop into {}", branch), || {
            self.vcs.pull(self.remote(), DEVELOP)
        })?;
        run.step("update develop", || self.switch_and_update(DEVELOP))?;
        run.step(format!("merge {} into develop", branch), || {
            self.vcs.merge(&branch, &mode)
        })?;

        let version = run.step("restore develop version", || {
            let version = self.version_at("HEAD~1")?;
            self.store.set_version(&version)?;
            Ok(version)
        })?;
        run.version = Some(version);

        let changed = run.step("rewrite topic dependencies to dev", || {
            rewrite_dependencies(
                self.store,
                |spec| spec.starts_with("feature") || spec.starts_with("bugfix"),
                "dev",
            )
        })?;
        if changed.is_empty() {
            run.warn(FlowWarning::NoDependenciesRewritten {
                to_tag: "dev".to_string(),
            });
        }
        run.changed_packages = changed.into_iter().collect();

        run.step("commit develop", || {
            self.vcs.commit(&format!("chore: finish {}", branch), ALLOW_EMPTY)
        })?;
        run.step("push develop", || {
            self.vcs.push(self.remote(), DEVELOP, PushOptions::default())
        })?;
        self.delete_everywhere(&mut run, &branch)?;

        Ok(run)
    }

    /// `release-start [version]`
    pub fn start_release(&self, version: Option<&str>, excluded: &[String]) -> Result<WorkflowRun> {
        self.ensure_clean()?;

        let explicit = version
            .map(|value| -> Result<Version> {
                let parsed = Version::parse(value)?;
                if parsed.is_release() {
                    Ok(parsed)
                } else {
                    Err(FlowError::version(value))
                }
            })
            .transpose()?;

        let process = ProcessBranch::Release;
        let mut run = self.new_run("release-start");
        run.branch = Some(process.name().to_string());

        let excluded = self.config.excluded_packages(excluded);
        let warnings = run.step("check dependencies against main policy", || {
            validate_dependencies(self.store, BranchType::Main, &excluded)
        })?;
        for warning in warnings {
            run.warn(warning);
        }

        run.step("check no release in progress", || {
            self.ensure_not_in_progress(process)
        })?;
        run.step("update develop", || self.switch_and_update(DEVELOP))?;
        let develop_version = run.step("read develop version", || self.root_version())?;

        let core = match explicit {
            Some(explicit) => explicit,
            None => Version::parse(&develop_version)?.core(),
        };
        let version = core.with_prerelease(&[process.prerelease_tag(), "0"])?.to_string();
        run.version = Some(version.clone());

        run.step("create branch release from develop", || {
            self.vcs.checkout_branch(process.name(), DEVELOP)
        })?;
        run.step(format!("set version {}", version), || {
            self.store.set_version(&version)
        })?;

        let changed = run.step("rewrite dev dependencies to next", || {
            rewrite_dependencies(self.store, |spec| spec == "dev", "next")
        })?;
        if changed.is_empty() {
            run.warn(FlowWarning::NoDependenciesRewritten {
                to_tag: "next".to_string(),
            });
        }
        run.changed_packages = changed.into_iter().collect();

        run.step("commit release", || {
            self.vcs
                .commit(&format!("chore(release): start {}", version), ALLOW_EMPTY)
        })?;
        run.step("push release", || {
            self.vcs
                .push(self.remote(), process.name(), PushOptions::upstream())
        })?;

        Ok(run)
    }

    /// `hotfix-start`
    pub fn start_hotfix(&self) -> Result<WorkflowRun> {
        self.ensure_clean()?;

        let process = ProcessBranch::Hotfix;
        let mut run = self.new_run("hotfix-start");
        run.branch = Some(process.name().to_string());

        run.step("check no hotfix in progress", || {
            self.ensure_not_in_progress(process)
        })?;
        run.step("update main", || self.switch_and_update(MAIN))?;
        let main_version = run.step("read main version", || self.root_version())?;

        let version = Version::parse(&main_version)?
            .bump_patch()?
            .with_prerelease(&[process.prerelease_tag(), "0"])?
            .to_string();
        run.version = Some(version.clone());

        run.step("create branch hotfix from main", || {
            self.vcs.checkout_branch(process.name(), MAIN)
        })?;
        run.step(format!("set version {}", version), || {
            self.store.set_version(&version)
        })?;
        run.step("commit hotfix", || {
            self.vcs
                .commit(&format!("chore(hotfix): start {}", version), ALLOW_EMPTY)
        })?;
        run.step("push hotfix", || {
            self.vcs
                .push(self.remote(), process.name(), PushOptions::upstream())
        })?;

        Ok(run)
    }

    /// `release-finish` / `hotfix-finish`, run from the process branch
    pub fn finish_process(&self, process: ProcessBranch, excluded: &[String]) -> Result<WorkflowRun> {
        self.ensure_clean()?;

        let branch = process.name();
        let current = self.vcs.current_branch()?;
        if current != branch {
            return Err(FlowError::WrongBranch {
                expected: branch.to_string(),
                actual: current,
            });
        }

        let mut run = self.new_run(format!("{}-finish", branch));
        run.branch = Some(branch.to_string());

        let excluded = self.config.excluded_packages(excluded);
        let warnings = run.step("check dependencies against main policy", || {
            validate_dependencies(self.store, BranchType::Main, &excluded)
        })?;
        for warning in warnings {
            run.warn(warning);
        }

        run.step(format!("update {}", branch), || self.switch_and_update(branch))?;
        let core = run.step(format!("read {} version", branch), || {
            version_core(&self.root_version()?)
        })?;
        run.version = Some(core.clone());

        run.step("update main", || self.switch_and_update(MAIN))?;
        run.step(format!("merge {} into main", branch), || {
            self.vcs.merge(branch, &MergeMode::NoFastForward)
        })?;
        run.step(format!("set version {}", core), || self.store.set_version(&core))?;
        run.step("commit main", || {
            self.vcs
                .commit(&format!("chore({}): {}", branch, core), ALLOW_EMPTY)
        })?;
        run.step(format!("tag {}", core), || {
            self.vcs
                .add_annotated_tag(&core, &format!("{} {}", branch, core))
        })?;
        run.tag = Some(core.clone());
        run.step("push tags", || self.vcs.push_tags(self.remote()))?;
        run.step("push main", || {
            self.vcs.push(self.remote(), MAIN, PushOptions::default())
        })?;

        run.step("update develop", || self.switch_and_update(DEVELOP))?;
        run.step("merge main into develop", || {
            self.vcs.merge(MAIN, &MergeMode::NoFastForward)
        })?;
        let develop_version = run.step("advance develop version", || {
            let version = increment_patch(&self.version_at(MAIN)?)?;
            self.store.set_version(&version)?;
            Ok(version)
        })?;
        run.step("commit develop", || {
            self.vcs.commit(
                &format!("chore: bump develop to {}", develop_version),
                ALLOW_EMPTY,
            )
        })?;
        run.step("push develop", || {
            self.vcs.push(self.remote(), DEVELOP, PushOptions::default())
        })?;
        self.delete_everywhere(&mut run, branch)?;

        Ok(run)
    }

    /// `check-dependencies`: validate the manifests against a branch policy,
    /// by default the policy of the checked-out branch
    pub fn check_dependencies(
        &self,
        branch_type: Option<BranchType>,
        excluded: &[String],
    ) -> Result<WorkflowRun> {
        let branch_type = match branch_type {
            Some(branch_type) => branch_type,
            None => {
                let current = self.vcs.current_branch()?;
                BranchType::from_branch_name(&current)
                    .ok_or(FlowError::InvalidBranchName(current))?
            }
        };

        let mut run = self.new_run("check-dependencies");
        run.branch = Some(branch_type.to_string());

        let excluded = self.config.excluded_packages(excluded);
        let warnings = run.step(format!("check dependencies against {} policy", branch_type), || {
            validate_dependencies(self.store, branch_type, &excluded)
        })?;
        for warning in warnings {
            run.warn(warning);
        }

        Ok(run)
    }

    /// `update-lock-file <scope>...`
    pub fn update_lock_file(&self, scopes: &[String]) -> Result<WorkflowRun> {
        let mut run = self.new_run("update-lock-file");

        let report = run.step(format!("prune {}", scopes.join(", ")), || {
            pruner::prune(self.store, scopes)
        })?;
        for warning in report.warnings {
            run.warn(warning);
        }
        run.changed_packages = report.packages;

        Ok(run)
    }
}
