use crate::error::{FlowError, Result};
use crate::git::{CommitOptions, MergeMode, PushOptions, VersionControl};
use git2::{BranchType, Cred, CredentialType, ErrorCode, RemoteCallbacks, Repository as Git2Repo};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Credential attempts before giving up, so a rejected key does not loop forever
const MAX_CREDENTIAL_ATTEMPTS: usize = 4;

/// Wrapper around git2::Repository implementing [VersionControl]
pub struct Git2Repository {
    repo: Git2Repo,
    workdir: PathBuf,
}

impl Git2Repository {
    /// Open or discover a non-bare git repository
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Git2Repo::discover(path)?;
        let workdir = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| git2::Error::from_str("bare repositories have no working tree"))?;

        Ok(Git2Repository { repo, workdir })
    }

    /// Root of the working tree
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Run a git porcelain command in the working tree and return its stdout
    fn run_git(&self, args: &[&str]) -> Result<String> {
        let command_line = format!("git {}", args.join(" "));
        tracing::debug!(command = %command_line, "running git");

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .map_err(|e| FlowError::command(&command_line, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(FlowError::command(command_line, detail.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Callbacks authenticating with SSH keys, the SSH agent, then git's credential helper
    fn remote_callbacks(&self) -> Result<RemoteCallbacks<'static>> {
        let git_config = self.repo.config()?;
        let mut attempts = 0;

        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |url, username_from_url, allowed_types| {
            attempts += 1;
            if attempts > MAX_CREDENTIAL_ATTEMPTS {
                return Err(git2::Error::from_str("authentication failed"));
            }

            let username = username_from_url.unwrap_or("git");

            if allowed_types.contains(CredentialType::SSH_KEY) {
                if let Some(home) = dirs::home_dir() {
                    for key in ["id_ed25519", "id_rsa", "id_ecdsa"] {
                        let path = home.join(".ssh").join(key);
                        if path.exists() {
                            if let Ok(cred) = Cred::ssh_key(username, None, &path, None) {
                                return Ok(cred);
                            }
                        }
                    }
                }

                if let Ok(cred) = Cred::ssh_key_from_agent(username) {
                    return Ok(cred);
                }
            }

            if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
                if let Ok(cred) = Cred::credential_helper(&git_config, url, username_from_url) {
                    return Ok(cred);
                }
            }

            Cred::default()
        });

        callbacks.push_update_reference(|refname, status| match status {
            Some(reason) => Err(git2::Error::from_str(&format!(
                "remote rejected {}: {}",
                refname, reason
            ))),
            None => Ok(()),
        });

        Ok(callbacks)
    }

    fn push_refspecs(&self, remote_name: &str, refspecs: &[String]) -> Result<()> {
        tracing::debug!(remote = remote_name, refspecs = ?refspecs, "pushing");

        let mut remote = self.repo.find_remote(remote_name)?;
        let mut push_options = git2::PushOptions::new();
        push_options.remote_callbacks(self.remote_callbacks()?);

        let refspecs: Vec<&str> = refspecs.iter().map(String::as_str).collect();
        remote.push(&refspecs, Some(&mut push_options))?;
        Ok(())
    }

    fn remote_tracking_ref(remote: &str, branch: &str) -> String {
        format!("refs/remotes/{}/{}", remote, branch)
    }
}

impl VersionControl for Git2Repository {
    fn is_clean(&self) -> Result<bool> {
        let mut options = git2::StatusOptions::new();
        options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);

        let statuses = self.repo.statuses(Some(&mut options))?;
        Ok(statuses.is_empty())
    }

    fn current_branch(&self) -> Result<String> {
        let head = self.repo.head()?;
        if !head.is_branch() {
            return Err(git2::Error::from_str("HEAD is detached").into());
        }

        head.shorthand()
            .map(str::to_string)
            .ok_or_else(|| git2::Error::from_str("branch name is not valid UTF-8").into())
    }

    fn checkout(&self, branch: &str) -> Result<()> {
        self.run_git(&["checkout", branch]).map(|_| ())
    }

    fn pull(&self, remote: &str, branch: &str) -> Result<()> {
        self.run_git(&["pull", "--no-rebase", "--no-edit", remote, branch])
            .map(|_| ())
    }

    fn checkout_local_branch(&self, name: &str) -> Result<()> {
        tracing::debug!(branch = name, "creating branch at HEAD");
        let head = self.repo.head()?.peel_to_commit()?;
        self.repo.branch(name, &head, false)?;
        self.repo.set_head(&format!("refs/heads/{}", name))?;
        Ok(())
    }

    fn checkout_branch(&self, name: &str, start: &str) -> Result<()> {
        tracing::debug!(branch = name, start, "creating branch");
        let commit = self.repo.revparse_single(start)?.peel_to_commit()?;
        self.repo.branch(name, &commit, false)?;

        let mut checkout = git2::build::CheckoutBuilder::new();
        checkout.safe();
        self.repo.checkout_tree(commit.as_object(), Some(&mut checkout))?;
        self.repo.set_head(&format!("refs/heads/{}", name))?;
        Ok(())
    }

    fn merge(&self, from: &str, mode: &MergeMode) -> Result<()> {
        match mode {
            MergeMode::NoFastForward => self.run_git(&["merge", "--no-ff", "--no-edit", from])?,
            MergeMode::Squash { message } => {
                self.run_git(&["merge", "--squash", from])?;
                self.run_git(&["commit", "--allow-empty", "-m", message])?
            }
        };
        Ok(())
    }

    fn commit(&self, message: &str, options: CommitOptions) -> Result<()> {
        self.run_git(&["add", "-A"])?;

        let mut args = vec!["commit", "-m", message];
        if options.allow_empty {
            args.push("--allow-empty");
        }
        self.run_git(&args).map(|_| ())
    }

    fn push(&self, remote: &str, branch: &str, options: PushOptions) -> Result<()> {
        let local_ref = format!("refs/heads/{}", branch);
        let tracking_ref = Self::remote_tracking_ref(remote, branch);

        if options.delete {
            self.push_refspecs(remote, &[format!(":{}", local_ref)])?;
            match self.repo.find_reference(&tracking_ref) {
                Ok(mut reference) => reference.delete()?,
                Err(e) if e.code() == ErrorCode::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            return Ok(());
        }

        self.push_refspecs(remote, &[format!("{}:{}", local_ref, local_ref)])?;

        let oid = self
            .repo
            .refname_to_id(&local_ref)?;
        self.repo
            .reference(&tracking_ref, oid, true, "npm-flow: push")?;

        if options.set_upstream {
            let mut local = self.repo.find_branch(branch, BranchType::Local)?;
            local.set_upstream(Some(&format!("{}/{}", remote, branch)))?;
        }

        Ok(())
    }

    fn push_tags(&self, remote: &str) -> Result<()> {
        let refspecs: Vec<String> = self
            .repo
            .tag_names(None)?
            .iter()
            .flatten()
            .map(|tag| format!("refs/tags/{}:refs/tags/{}", tag, tag))
            .collect();

        if refspecs.is_empty() {
            return Ok(());
        }
        self.push_refspecs(remote, &refspecs)
    }

    fn add_annotated_tag(&self, name: &str, message: &str) -> Result<()> {
        tracing::debug!(tag = name, "creating annotated tag");
        let signature = self.repo.signature()?;
        let target = self.repo.head()?.peel(git2::ObjectType::Commit)?;
        self.repo.tag(name, &target, &signature, message, false)?;
        Ok(())
    }

    fn delete_local_branch(&self, branch: &str) -> Result<()> {
        tracing::debug!(branch, "deleting local branch");
        let mut local = self.repo.find_branch(branch, BranchType::Local)?;
        local.delete()?;
        Ok(())
    }

    fn show_file_at_revision(&self, revision: &str, path: &str) -> Result<String> {
        let tree = self.repo.revparse_single(revision)?.peel_to_tree()?;
        let entry = tree.get_path(Path::new(path))?;
        let blob = entry.to_object(&self.repo)?.peel_to_blob()?;
        Ok(String::from_utf8_lossy(blob.content()).into_owned())
    }

    fn list_remote_heads(&self, remote_name: &str) -> Result<Vec<String>> {
        let mut remote = self.repo.find_remote(remote_name)?;
        let connection =
            remote.connect_auth(git2::Direction::Fetch, Some(self.remote_callbacks()?), None)?;

        let heads = connection
            .list()?
            .iter()
            .filter_map(|head| head.name().strip_prefix("refs/heads/"))
            .map(str::to_string)
            .collect();

        Ok(heads)
    }
}
