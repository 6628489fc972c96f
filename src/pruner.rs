//! Lock-file scope pruning
//!
//! Drops every resolved entry for the root package's dependencies under the
//! given scopes from the lock file, then asks the package manager to resolve
//! exactly those packages again.

use crate::error::{FlowError, Result};
use crate::manifest::ManifestStore;
use crate::warning::FlowWarning;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Outcome of a pruning run
#[derive(Debug, Clone, PartialEq)]
pub struct PruneReport {
    /// Lock file that was pruned
    pub lock_file: PathBuf,
    /// Lock-file keys that were removed
    pub removed_entries: Vec<String>,
    /// Packages handed to the package manager for re-resolution, sorted
    pub packages: Vec<String>,
    pub warnings: Vec<FlowWarning>,
}

/// Validate a scope such as `@acme`: a leading `@`, then a name without `/`
pub fn validate_scope(scope: &str) -> Result<()> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let valid = PATTERN
        .get_or_init(|| Regex::new(r"^@[A-Za-z0-9][A-Za-z0-9._~-]*$").ok())
        .as_ref()
        .map_or(false, |re| re.is_match(scope));

    if valid {
        Ok(())
    } else {
        Err(FlowError::InvalidScopeFormat(scope.to_string()))
    }
}

/// Remove lock-file entries for the root dependencies under `scopes` and
/// re-resolve them.
pub fn prune<S>(store: &S, scopes: &[String]) -> Result<PruneReport>
where
    S: ManifestStore + ?Sized,
{
    if scopes.is_empty() {
        return Err(FlowError::InvalidScopeFormat(String::new()));
    }
    for scope in scopes {
        validate_scope(scope)?;
    }

    let mut lock = store.read_lock_file()?;
    let root = store.read_root_manifest()?;

    let packages: BTreeSet<String> = root
        .entries()
        .map(|(_, name, _)| name)
        .filter(|name| {
            scopes
                .iter()
                .any(|scope| name.strip_prefix(scope.as_str()).map_or(false, |rest| rest.starts_with('/')))
        })
        .map(str::to_string)
        .collect();

    let mut warnings = Vec::new();
    if packages.is_empty() {
        warnings.push(FlowWarning::NoScopedDependencies {
            scopes: scopes.to_vec(),
        });
    }

    let removed_entries = lock.remove_installations(&packages);
    if !removed_entries.is_empty() {
        store.write_lock_file(&lock)?;
    }
    tracing::info!(
        lock_file = %lock.path.display(),
        removed = removed_entries.len(),
        "pruned lock file"
    );

    let packages: Vec<String> = packages.into_iter().collect();
    store.reinstall(&packages)?;

    Ok(PruneReport {
        lock_file: lock.path.clone(),
        removed_entries,
        packages,
        warnings,
    })
}
