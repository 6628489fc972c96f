//! In-memory repository and package tree for testing workflows without git or npm
//!
//! [MockWorkspace] keeps a commit history per local branch, a tip per remote
//! branch, tags and a working tree of text files. Merges overlay the incoming
//! branch's files onto the working tree, which is all the workflows need.

use crate::error::{FlowError, Result};
use crate::git::{CommitOptions, MergeMode, PushOptions, VersionControl};
use crate::manifest::{LockFile, Manifest, ManifestStore, MANIFEST_FILE};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

type Files = BTreeMap<String, String>;

const REMOTE: &str = "origin";
const WORKSPACE_MARKER: &str = "lerna.json";
const LOCK_FILES: [&str; 2] = ["package-lock.json", "npm-shrinkwrap.json"];

#[derive(Debug, Clone)]
struct MockCommit {
    message: String,
    files: Files,
}

#[derive(Debug, Clone)]
struct MockTag {
    message: String,
    files: Files,
}

#[derive(Debug, Default)]
struct MockState {
    current: String,
    branches: BTreeMap<String, Vec<MockCommit>>,
    remote: BTreeMap<String, MockCommit>,
    tags: BTreeMap<String, MockTag>,
    pushed_tags: BTreeSet<String>,
    upstreams: BTreeMap<String, String>,
    worktree: Files,
    reinstalled: Vec<Vec<String>>,
    ops: Vec<String>,
    fail_on: Option<String>,
}

impl MockState {
    fn tip(&self, branch: &str) -> Option<&MockCommit> {
        self.branches.get(branch).and_then(|history| history.last())
    }

    fn head_files(&self) -> Files {
        self.tip(&self.current)
            .map(|commit| commit.files.clone())
            .unwrap_or_default()
    }

    fn resolve(&self, revision: &str) -> Option<&Files> {
        let history = self.branches.get(&self.current);
        match revision {
            "HEAD" => self.tip(&self.current).map(|c| &c.files),
            "HEAD~1" | "HEAD^" | "HEAD^1" => history
                .filter(|h| h.len() >= 2)
                .and_then(|h| h.get(h.len() - 2))
                .map(|c| &c.files),
            _ => {
                let remote_branch = revision
                    .strip_prefix("refs/remotes/origin/")
                    .or_else(|| revision.strip_prefix("origin/"));
                if let Some(branch) = remote_branch {
                    return self.remote.get(branch).map(|c| &c.files);
                }
                self.tip(revision)
                    .map(|c| &c.files)
                    .or_else(|| self.tags.get(revision).map(|t| &t.files))
            }
        }
    }
}

/// In-memory implementation of [VersionControl] and [ManifestStore]
#[derive(Debug, Default)]
pub struct MockWorkspace {
    state: RefCell<MockState>,
}

impl MockWorkspace {
    /// A repository whose `main` and `develop` both hold `files` in one
    /// commit, pushed to the remote, with `develop` checked out
    pub fn new(files: &[(&str, &str)]) -> Self {
        let files: Files = files
            .iter()
            .map(|(path, content)| (path.to_string(), content.to_string()))
            .collect();
        let initial = MockCommit {
            message: "initial commit".to_string(),
            files: files.clone(),
        };

        let mut state = MockState {
            current: "develop".to_string(),
            worktree: files,
            ..MockState::default()
        };
        for branch in ["main", "develop"] {
            state.branches.insert(branch.to_string(), vec![initial.clone()]);
            state.remote.insert(branch.to_string(), initial.clone());
        }

        MockWorkspace {
            state: RefCell::new(state),
        }
    }

    /// A repository holding a single `package.json` at `version`
    pub fn with_package(name: &str, version: &str, dependencies: &[(&str, &str)]) -> Self {
        Self::new(&[(MANIFEST_FILE, package_json(name, version, dependencies).as_str())])
    }

    /// Create `name` from `from`, commit `files` on it and push it
    pub fn add_branch(&self, name: &str, from: &str, files: &[(&str, &str)]) {
        let mut state = self.state.borrow_mut();
        let mut history = state.branches.get(from).cloned().unwrap_or_default();
        let mut tree = history.last().map(|c| c.files.clone()).unwrap_or_default();
        for (path, content) in files {
            tree.insert(path.to_string(), content.to_string());
        }

        let commit = MockCommit {
            message: format!("work on {}", name),
            files: tree,
        };
        history.push(commit.clone());
        state.branches.insert(name.to_string(), history);
        state.remote.insert(name.to_string(), commit);
        state.upstreams.insert(name.to_string(), format!("{}/{}", REMOTE, name));
    }

    /// Create a branch that exists only on the remote
    pub fn add_remote_branch(&self, name: &str, from: &str) {
        let mut state = self.state.borrow_mut();
        if let Some(commit) = state.tip(from).cloned() {
            state.remote.insert(name.to_string(), commit);
        }
    }

    /// Check out a branch without recording an operation
    pub fn switch_to(&self, branch: &str) {
        let mut state = self.state.borrow_mut();
        state.current = branch.to_string();
        state.worktree = state.head_files();
    }

    /// Change a working-tree file without committing it
    pub fn write_file(&self, path: &str, content: &str) {
        self.state
            .borrow_mut()
            .worktree
            .insert(path.to_string(), content.to_string());
    }

    /// Make the first operation whose log entry starts with `prefix` fail
    pub fn fail_on(&self, prefix: &str) {
        self.state.borrow_mut().fail_on = Some(prefix.to_string());
    }

    pub fn current(&self) -> String {
        self.state.borrow().current.clone()
    }

    pub fn worktree_file(&self, path: &str) -> Option<String> {
        self.state.borrow().worktree.get(path).cloned()
    }

    /// Content of `path` at the tip of a local branch
    pub fn file_on(&self, branch: &str, path: &str) -> Option<String> {
        let state = self.state.borrow();
        state.tip(branch).and_then(|c| c.files.get(path).cloned())
    }

    /// Content of `path` at the remote tip of a branch
    pub fn remote_file_on(&self, branch: &str, path: &str) -> Option<String> {
        let state = self.state.borrow();
        state.remote.get(branch).and_then(|c| c.files.get(path).cloned())
    }

    /// Root manifest version at the tip of a local branch
    pub fn version_on(&self, branch: &str) -> Option<String> {
        let content = self.file_on(branch, MANIFEST_FILE)?;
        Manifest::parse(MANIFEST_FILE, &content)
            .ok()
            .map(|m| m.version)
    }

    /// Root manifest version at the remote tip of a branch
    pub fn remote_version_on(&self, branch: &str) -> Option<String> {
        let content = self.remote_file_on(branch, MANIFEST_FILE)?;
        Manifest::parse(MANIFEST_FILE, &content)
            .ok()
            .map(|m| m.version)
    }

    pub fn has_local_branch(&self, branch: &str) -> bool {
        self.state.borrow().branches.contains_key(branch)
    }

    pub fn has_remote_branch(&self, branch: &str) -> bool {
        self.state.borrow().remote.contains_key(branch)
    }

    pub fn tags(&self) -> Vec<String> {
        self.state.borrow().tags.keys().cloned().collect()
    }

    pub fn tag_message(&self, tag: &str) -> Option<String> {
        self.state.borrow().tags.get(tag).map(|t| t.message.clone())
    }

    /// Root manifest version recorded by a tag
    pub fn tag_version(&self, tag: &str) -> Option<String> {
        let state = self.state.borrow();
        let content = state.tags.get(tag)?.files.get(MANIFEST_FILE)?;
        Manifest::parse(MANIFEST_FILE, content).ok().map(|m| m.version)
    }

    pub fn pushed_tags(&self) -> Vec<String> {
        self.state.borrow().pushed_tags.iter().cloned().collect()
    }

    pub fn upstream_of(&self, branch: &str) -> Option<String> {
        self.state.borrow().upstreams.get(branch).cloned()
    }

    /// Commit messages of a local branch, oldest first
    pub fn commit_messages(&self, branch: &str) -> Vec<String> {
        self.state
            .borrow()
            .branches
            .get(branch)
            .map(|history| history.iter().map(|c| c.message.clone()).collect())
            .unwrap_or_default()
    }

    /// Every recorded operation, in order
    pub fn ops(&self) -> Vec<String> {
        self.state.borrow().ops.clone()
    }

    /// Package lists handed to [ManifestStore::reinstall]
    pub fn reinstalled(&self) -> Vec<Vec<String>> {
        self.state.borrow().reinstalled.clone()
    }

    fn record(&self, entry: String) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let failing = state
            .fail_on
            .as_deref()
            .map_or(false, |prefix| entry.starts_with(prefix));
        if failing {
            state.fail_on = None;
            return Err(FlowError::command(entry, "injected failure"));
        }
        state.ops.push(entry);
        Ok(())
    }

    fn missing(what: &str, name: &str) -> FlowError {
        FlowError::command(format!("git {}", what), format!("'{}' not found", name))
    }
}

/// Minimal `package.json` text for fixtures
pub fn package_json(name: &str, version: &str, dependencies: &[(&str, &str)]) -> String {
    let deps: Vec<String> = dependencies
        .iter()
        .map(|(dep, spec)| format!("    \"{}\": \"{}\"", dep, spec))
        .collect();
    format!(
        "{{\n  \"name\": \"{}\",\n  \"version\": \"{}\",\n  \"dependencies\": {{\n{}\n  }}\n}}\n",
        name,
        version,
        deps.join(",\n")
    )
}

impl VersionControl for MockWorkspace {
    fn is_clean(&self) -> Result<bool> {
        let state = self.state.borrow();
        Ok(state.worktree == state.head_files())
    }

    fn current_branch(&self) -> Result<String> {
        Ok(self.current())
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        self.record(format!("checkout {}", branch))?;
        let mut state = self.state.borrow_mut();
        if !state.branches.contains_key(branch) {
            let remote_tip = state
                .remote
                .get(branch)
                .cloned()
                .ok_or_else(|| Self::missing("checkout", branch))?;
            state.branches.insert(branch.to_string(), vec![remote_tip]);
            state
                .upstreams
                .insert(branch.to_string(), format!("{}/{}", REMOTE, branch));
        }
        state.current = branch.to_string();
        state.worktree = state.head_files();
        Ok(())
    }

    fn pull(&self, remote: &str, branch: &str) -> Result<()> {
        self.record(format!("pull {} {}", remote, branch))?;
        let state = self.state.borrow();
        if !state.remote.contains_key(branch) {
            return Err(Self::missing("pull", branch));
        }
        Ok(())
    }

    fn checkout_local_branch(&self, name: &str) -> Result<()> {
        let current = self.current();
        self.checkout_branch_inner(name, &current, format!("checkout -b {}", name))
    }

    fn checkout_branch(&self, name: &str, start: &str) -> Result<()> {
        self.checkout_branch_inner(name, start, format!("checkout -b {} {}", name, start))
    }

    fn merge(&self, from: &str, mode: &MergeMode) -> Result<()> {
        let entry = match mode {
            MergeMode::NoFastForward => format!("merge --no-ff {}", from),
            MergeMode::Squash { .. } => format!("merge --squash {}", from),
        };
        self.record(entry)?;

        let mut state = self.state.borrow_mut();
        let incoming = state
            .tip(from)
            .map(|c| c.files.clone())
            .ok_or_else(|| Self::missing("merge", from))?;
        state.worktree.extend(incoming);

        let message = match mode {
            MergeMode::NoFastForward => format!("Merge branch '{}' into {}", from, state.current),
            MergeMode::Squash { message } => message.clone(),
        };
        let commit = MockCommit {
            message,
            files: state.worktree.clone(),
        };
        let current = state.current.clone();
        state.branches.entry(current).or_default().push(commit);
        Ok(())
    }

    fn commit(&self, message: &str, options: CommitOptions) -> Result<()> {
        self.record(format!("commit {}", message))?;
        let mut state = self.state.borrow_mut();
        if !options.allow_empty && state.worktree == state.head_files() {
            return Err(FlowError::command("git commit", "nothing to commit"));
        }

        let commit = MockCommit {
            message: message.to_string(),
            files: state.worktree.clone(),
        };
        let current = state.current.clone();
        state.branches.entry(current).or_default().push(commit);
        Ok(())
    }

    fn push(&self, remote: &str, branch: &str, options: PushOptions) -> Result<()> {
        if options.delete {
            self.record(format!("push --delete {} {}", remote, branch))?;
            let mut state = self.state.borrow_mut();
            return match state.remote.remove(branch) {
                Some(_) => Ok(()),
                None => Err(Self::missing("push --delete", branch)),
            };
        }

        self.record(format!("push {} {}", remote, branch))?;
        let mut state = self.state.borrow_mut();
        let tip = state
            .tip(branch)
            .cloned()
            .ok_or_else(|| Self::missing("push", branch))?;
        state.remote.insert(branch.to_string(), tip);
        if options.set_upstream {
            state
                .upstreams
                .insert(branch.to_string(), format!("{}/{}", remote, branch));
        }
        Ok(())
    }

    fn push_tags(&self, remote: &str) -> Result<()> {
        self.record(format!("push --tags {}", remote))?;
        let mut state = self.state.borrow_mut();
        let tags: Vec<String> = state.tags.keys().cloned().collect();
        state.pushed_tags.extend(tags);
        Ok(())
    }

    fn add_annotated_tag(&self, name: &str, message: &str) -> Result<()> {
        self.record(format!("tag -a {}", name))?;
        let mut state = self.state.borrow_mut();
        if state.tags.contains_key(name) {
            return Err(FlowError::command(
                format!("git tag -a {}", name),
                "tag already exists",
            ));
        }
        let files = state.head_files();
        state.tags.insert(
            name.to_string(),
            MockTag {
                message: message.to_string(),
                files,
            },
        );
        Ok(())
    }

    fn delete_local_branch(&self, branch: &str) -> Result<()> {
        self.record(format!("branch -D {}", branch))?;
        let mut state = self.state.borrow_mut();
        if state.current == branch {
            return Err(FlowError::command(
                format!("git branch -D {}", branch),
                "cannot delete the checked-out branch",
            ));
        }
        state
            .branches
            .remove(branch)
            .map(|_| ())
            .ok_or_else(|| Self::missing("branch -D", branch))?;
        state.upstreams.remove(branch);
        Ok(())
    }

    fn show_file_at_revision(&self, revision: &str, path: &str) -> Result<String> {
        let state = self.state.borrow();
        state
            .resolve(revision)
            .and_then(|files| files.get(path).cloned())
            .ok_or_else(|| Self::missing("show", &format!("{}:{}", revision, path)))
    }

    fn list_remote_heads(&self, remote: &str) -> Result<Vec<String>> {
        self.record(format!("ls-remote {}", remote))?;
        Ok(self.state.borrow().remote.keys().cloned().collect())
    }
}

impl MockWorkspace {
    fn checkout_branch_inner(&self, name: &str, start: &str, entry: String) -> Result<()> {
        self.record(entry)?;
        let mut state = self.state.borrow_mut();
        if state.branches.contains_key(name) {
            return Err(FlowError::command(
                format!("git checkout -b {}", name),
                "branch already exists",
            ));
        }
        let history = state
            .branches
            .get(start)
            .cloned()
            .ok_or_else(|| Self::missing("checkout -b", start))?;
        state.branches.insert(name.to_string(), history);
        state.current = name.to_string();
        Ok(())
    }
}

impl ManifestStore for MockWorkspace {
    fn read_root_manifest(&self) -> Result<Manifest> {
        let content = self
            .worktree_file(MANIFEST_FILE)
            .ok_or_else(|| FlowError::manifest(MANIFEST_FILE, "file not found"))?;
        Manifest::parse(MANIFEST_FILE, &content)
    }

    fn read_sub_package_manifests(&self) -> Result<Vec<Manifest>> {
        if !self.is_multi_package_project() {
            return Ok(Vec::new());
        }

        let state = self.state.borrow();
        state
            .worktree
            .iter()
            .filter(|(path, _)| {
                let parts: Vec<&str> = path.split('/').collect();
                parts.len() == 3 && parts[0] == "packages" && parts[2] == MANIFEST_FILE
            })
            .map(|(path, content)| Manifest::parse(path.as_str(), content))
            .collect()
    }

    fn write_manifest(&self, manifest: &Manifest) -> Result<()> {
        let content = manifest.to_json_string()?;
        let path = manifest.path.to_string_lossy().into_owned();
        self.write_file(&path, &content);
        Ok(())
    }

    fn is_multi_package_project(&self) -> bool {
        self.state.borrow().worktree.contains_key(WORKSPACE_MARKER)
    }

    fn read_lock_file(&self) -> Result<LockFile> {
        for name in LOCK_FILES {
            if let Some(content) = self.worktree_file(name) {
                return LockFile::parse(name, &content);
            }
        }
        Err(FlowError::NoLockFileFound(LOCK_FILES.join(", ")))
    }

    fn write_lock_file(&self, lock_file: &LockFile) -> Result<()> {
        let content = lock_file.to_json_string()?;
        let path = lock_file.path.to_string_lossy().into_owned();
        self.write_file(&path, &content);
        Ok(())
    }

    fn reinstall(&self, packages: &[String]) -> Result<()> {
        if packages.is_empty() {
            return Ok(());
        }
        self.record(format!("reinstall {}", packages.join(" ")))?;
        self.state.borrow_mut().reinstalled.push(packages.to_vec());
        Ok(())
    }
}
