use crate::error::{FlowError, Result};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// npm lock file (`package-lock.json` / `npm-shrinkwrap.json`)
///
/// Only the `packages` section (keys are install paths such as
/// `node_modules/@scope/name`) and the legacy `dependencies` section are
/// interpreted; everything else is written back unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct LockFile {
    /// Location relative to the package root
    pub path: PathBuf,
    document: Map<String, Value>,
}

impl LockFile {
    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Result<Self> {
        let path = path.into();
        let location = path.display().to_string();

        match serde_json::from_str(content) {
            Ok(Value::Object(document)) => Ok(LockFile { path, document }),
            Ok(_) => Err(FlowError::manifest(location, "expected a JSON object")),
            Err(e) => Err(FlowError::manifest(location, e.to_string())),
        }
    }

    pub fn to_json_string(&self) -> Result<String> {
        let mut out = serde_json::to_string_pretty(&self.document)?;
        out.push('\n');
        Ok(out)
    }

    /// Install paths listed in the `packages` section, in file order
    pub fn package_keys(&self) -> Vec<String> {
        self.document
            .get("packages")
            .and_then(Value::as_object)
            .map(|packages| packages.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove every resolved entry installing one of `names`, including
    /// anything installed beneath it. Returns the removed keys.
    pub fn remove_installations(&mut self, names: &BTreeSet<String>) -> Vec<String> {
        let mut removed = Vec::new();

        if let Some(Value::Object(packages)) = self.document.get_mut("packages") {
            let stale: Vec<String> = packages
                .keys()
                .filter(|key| names.iter().any(|name| is_installation_of(key, name)))
                .cloned()
                .collect();
            for key in stale {
                packages.shift_remove(&key);
                removed.push(key);
            }
        }

        if let Some(Value::Object(dependencies)) = self.document.get_mut("dependencies") {
            for name in names {
                if dependencies.shift_remove(name).is_some() {
                    removed.push(name.clone());
                }
            }
        }

        removed
    }
}

/// Whether a lock-file install path belongs to the named package.
///
/// Matches `node_modules/<name>`, nested `…/node_modules/<name>` and any path
/// installed beneath either.
pub fn is_installation_of(key: &str, name: &str) -> bool {
    let install = format!("node_modules/{}", name);
    let nested = format!("/{}", install);

    key == install
        || key.ends_with(&nested)
        || key.starts_with(&format!("{}/", install))
        || key.contains(&format!("{}/", nested))
}
