//! Git operations abstraction layer
//!
//! This module provides a trait-based abstraction over the git operations the
//! workflows sequence, allowing the workflows to run against a real repository
//! or an in-memory one in tests.
//!
//! # Overview
//!
//! The primary abstraction is the [VersionControl] trait. Implementations:
//!
//! - [repository::Git2Repository]: a real repository, driven through `git2`
//!   and the `git` binary for porcelain operations (merge, pull, commit)
//! - [crate::mock::MockWorkspace]: an in-memory repository for testing
//!
//! # Usage
//!
//! Workflow code depends on the trait rather than a concrete implementation.
//!
//! ```rust
//! # use npm_flow::git::{PushOptions, VersionControl};
//! # fn example<V: VersionControl>(vcs: &V) -> npm_flow::Result<()> {
//! if vcs.is_clean()? {
//!     vcs.checkout_local_branch("feature/login")?;
//!     vcs.push("origin", "feature/login", PushOptions::upstream())?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod repository;

pub use repository::Git2Repository;

use crate::error::Result;

/// How a branch is brought into the checked-out branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeMode {
    /// Always record a merge commit
    NoFastForward,
    /// Collapse the incoming branch into a single commit with this message
    Squash { message: String },
}

/// Options for [VersionControl::commit]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitOptions {
    /// Record a commit even when nothing changed
    pub allow_empty: bool,
}

/// Options for [VersionControl::push]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushOptions {
    /// Track the pushed branch as the local branch's upstream
    pub set_upstream: bool,
    /// Delete the branch on the remote instead of updating it
    pub delete: bool,
}

impl PushOptions {
    /// Push and set upstream tracking
    pub fn upstream() -> Self {
        PushOptions {
            set_upstream: true,
            delete: false,
        }
    }

    /// Delete the remote branch
    pub fn delete() -> Self {
        PushOptions {
            set_upstream: false,
            delete: true,
        }
    }
}

/// Version control capability consumed by the workflows
///
/// Every call blocks until the underlying operation completes. Failures are
/// returned unchanged; nothing is retried or compensated.
pub trait VersionControl {
    /// Whether the working tree has no staged, unstaged or untracked changes
    fn is_clean(&self) -> Result<bool>;

    /// Name of the checked-out branch
    fn current_branch(&self) -> Result<String>;

    /// Switch to an existing branch
    fn checkout(&self, branch: &str) -> Result<()>;

    /// Fetch `branch` from `remote` and merge it into the checked-out branch
    fn pull(&self, remote: &str, branch: &str) -> Result<()>;

    /// Create `name` at HEAD and switch to it
    fn checkout_local_branch(&self, name: &str) -> Result<()>;

    /// Create `name` from `start` and switch to it
    fn checkout_branch(&self, name: &str, start: &str) -> Result<()>;

    /// Merge `from` into the checked-out branch
    fn merge(&self, from: &str, mode: &MergeMode) -> Result<()>;

    /// Stage every change and record a commit
    fn commit(&self, message: &str, options: CommitOptions) -> Result<()>;

    /// Push `branch` to `remote`
    fn push(&self, remote: &str, branch: &str, options: PushOptions) -> Result<()>;

    /// Push every local tag to `remote`
    fn push_tags(&self, remote: &str) -> Result<()>;

    /// Create an annotated tag at HEAD
    fn add_annotated_tag(&self, name: &str, message: &str) -> Result<()>;

    /// Delete a local branch
    fn delete_local_branch(&self, branch: &str) -> Result<()>;

    /// Raw content of `path` as recorded at `revision`
    fn show_file_at_revision(&self, revision: &str, path: &str) -> Result<String>;

    /// Branch names (without `refs/heads/`) that exist on `remote`
    fn list_remote_heads(&self, remote: &str) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_option_constructors() {
        assert!(PushOptions::upstream().set_upstream);
        assert!(!PushOptions::upstream().delete);
        assert!(PushOptions::delete().delete);
        assert_eq!(PushOptions::default(), PushOptions { set_upstream: false, delete: false });
    }
}
