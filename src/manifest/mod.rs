//! Package manifest abstraction layer
//!
//! A [Manifest] is the typed view of one `package.json`: its name, version and
//! the three dependency maps. Every other field is kept untouched in the
//! underlying JSON document so that writing a manifest back only changes what
//! the workflow changed.
//!
//! The [ManifestStore] trait is how the workflow reads and writes manifests,
//! the lock file and asks the package manager to re-resolve packages:
//!
//! - [npm::NpmStore]: the filesystem implementation for npm / lerna layouts
//! - [crate::mock::MockWorkspace]: an in-memory implementation for tests

pub mod lockfile;
pub mod npm;

pub use lockfile::LockFile;
pub use npm::NpmStore;

use crate::domain::{SpecifierKind, Version};
use crate::error::{FlowError, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::PathBuf;

/// Manifest file name of every package
pub const MANIFEST_FILE: &str = "package.json";

/// Dependency name to version specifier, in file order
pub type DependencyMap = IndexMap<String, String>;

/// The three dependency maps a manifest owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    Runtime,
    Dev,
    Peer,
}

impl DependencyKind {
    pub const ALL: [DependencyKind; 3] = [
        DependencyKind::Runtime,
        DependencyKind::Dev,
        DependencyKind::Peer,
    ];

    /// JSON field holding this map
    pub fn field(&self) -> &'static str {
        match self {
            DependencyKind::Runtime => "dependencies",
            DependencyKind::Dev => "devDependencies",
            DependencyKind::Peer => "peerDependencies",
        }
    }
}

#[derive(Deserialize)]
struct ManifestFields {
    name: String,
    version: String,
    #[serde(default)]
    dependencies: DependencyMap,
    #[serde(default, rename = "devDependencies")]
    dev_dependencies: DependencyMap,
    #[serde(default, rename = "peerDependencies")]
    peer_dependencies: DependencyMap,
}

/// Typed view of a `package.json`
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    /// Location relative to the package root
    pub path: PathBuf,
    pub name: String,
    pub version: String,
    pub dependencies: DependencyMap,
    pub dev_dependencies: DependencyMap,
    pub peer_dependencies: DependencyMap,
    document: Map<String, Value>,
}

impl Manifest {
    /// Parse and validate manifest JSON.
    ///
    /// Rejects documents that are not objects, lack a string `name` or
    /// `version`, or hold non-string dependency specifiers.
    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Result<Self> {
        let path = path.into();
        let location = path.display().to_string();

        let value: Value = serde_json::from_str(content)
            .map_err(|e| FlowError::manifest(&location, e.to_string()))?;
        let document = match value {
            Value::Object(map) => map,
            _ => return Err(FlowError::manifest(&location, "expected a JSON object")),
        };

        let fields: ManifestFields = serde_json::from_value(Value::Object(document.clone()))
            .map_err(|e| FlowError::manifest(&location, e.to_string()))?;

        Ok(Manifest {
            path,
            name: fields.name,
            version: fields.version,
            dependencies: fields.dependencies,
            dev_dependencies: fields.dev_dependencies,
            peer_dependencies: fields.peer_dependencies,
            document,
        })
    }

    /// Serialize back to JSON, keeping unknown fields and their order
    pub fn to_json_string(&self) -> Result<String> {
        let mut document = self.document.clone();
        document.insert("version".to_string(), Value::String(self.version.clone()));

        for kind in DependencyKind::ALL {
            let deps = self.dependencies_of(kind);
            if deps.is_empty() && !document.contains_key(kind.field()) {
                continue;
            }
            let map: Map<String, Value> = deps
                .iter()
                .map(|(name, spec)| (name.clone(), Value::String(spec.clone())))
                .collect();
            document.insert(kind.field().to_string(), Value::Object(map));
        }

        let mut out = serde_json::to_string_pretty(&Value::Object(document))?;
        out.push('\n');
        Ok(out)
    }

    pub fn dependencies_of(&self, kind: DependencyKind) -> &DependencyMap {
        match kind {
            DependencyKind::Runtime => &self.dependencies,
            DependencyKind::Dev => &self.dev_dependencies,
            DependencyKind::Peer => &self.peer_dependencies,
        }
    }

    pub fn dependencies_of_mut(&mut self, kind: DependencyKind) -> &mut DependencyMap {
        match kind {
            DependencyKind::Runtime => &mut self.dependencies,
            DependencyKind::Dev => &mut self.dev_dependencies,
            DependencyKind::Peer => &mut self.peer_dependencies,
        }
    }

    /// Every dependency entry as `(kind, name, specifier)`, runtime first
    pub fn entries(&self) -> impl Iterator<Item = (DependencyKind, &str, &str)> + '_ {
        DependencyKind::ALL.into_iter().flat_map(move |kind| {
            self.dependencies_of(kind)
                .iter()
                .map(move |(name, spec)| (kind, name.as_str(), spec.as_str()))
        })
    }

    /// Whether any dependency map names the package
    pub fn declares(&self, package: &str) -> bool {
        DependencyKind::ALL
            .iter()
            .any(|kind| self.dependencies_of(*kind).contains_key(package))
    }
}

/// Read/write access to package manifests, the lock file and the package manager
pub trait ManifestStore {
    /// The manifest at the package root
    fn read_root_manifest(&self) -> Result<Manifest>;

    /// Sub-package manifests of a monorepo, sorted by path; empty otherwise
    fn read_sub_package_manifests(&self) -> Result<Vec<Manifest>>;

    /// Persist one manifest at its path
    fn write_manifest(&self, manifest: &Manifest) -> Result<()>;

    /// Whether the workspace-root marker file is present
    fn is_multi_package_project(&self) -> bool;

    /// Set the version of the root package and, in a monorepo, every sub-package
    fn set_version(&self, version: &str) -> Result<()> {
        apply_version(self, version)
    }

    /// The active lock file, primary candidate first
    fn read_lock_file(&self) -> Result<LockFile>;

    /// Persist the lock file at the path it was read from
    fn write_lock_file(&self, lock_file: &LockFile) -> Result<()>;

    /// Ask the package manager to re-resolve exactly these packages
    fn reinstall(&self, packages: &[String]) -> Result<()>;

    /// Root manifest followed by any sub-package manifests
    fn read_all_manifests(&self) -> Result<Vec<Manifest>> {
        let mut manifests = vec![self.read_root_manifest()?];
        if self.is_multi_package_project() {
            manifests.extend(self.read_sub_package_manifests()?);
        }
        Ok(manifests)
    }
}

/// Write `version` into the root manifest and every sub-package, pointing
/// version-valued references between sibling packages at the new version.
pub fn apply_version<S: ManifestStore + ?Sized>(store: &S, version: &str) -> Result<()> {
    Version::parse(version)?;

    let mut root = store.read_root_manifest()?;
    root.version = version.to_string();
    store.write_manifest(&root)?;

    if !store.is_multi_package_project() {
        return Ok(());
    }

    let mut packages = store.read_sub_package_manifests()?;
    let siblings: HashSet<String> = packages.iter().map(|p| p.name.clone()).collect();

    for package in &mut packages {
        package.version = version.to_string();
        for kind in DependencyKind::ALL {
            for (name, spec) in package.dependencies_of_mut(kind).iter_mut() {
                if siblings.contains(name) {
                    *spec = sibling_specifier(spec, version);
                }
            }
        }
        store.write_manifest(package)?;
    }

    Ok(())
}

fn sibling_specifier(current: &str, version: &str) -> String {
    match SpecifierKind::classify(current) {
        SpecifierKind::Release | SpecifierKind::Prerelease => {
            let range = current
                .chars()
                .next()
                .filter(|c| *c == '^' || *c == '~')
                .map(String::from)
                .unwrap_or_default();
            format!("{}{}", range, version)
        }
        SpecifierKind::Source | SpecifierKind::Tag => current.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
  "name": "@acme/widget",
  "version": "1.2.0-dev.0",
  "private": false,
  "scripts": { "build": "tsc" },
  "dependencies": { "left-pad": "^1.3.0", "@acme/core": "dev" },
  "devDependencies": { "typescript": "5.4.2" }
}"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::parse("package.json", SAMPLE).unwrap();
        assert_eq!(manifest.name, "@acme/widget");
        assert_eq!(manifest.version, "1.2.0-dev.0");
        assert_eq!(manifest.dependencies.get("@acme/core").unwrap(), "dev");
        assert_eq!(manifest.dev_dependencies.len(), 1);
        assert!(manifest.peer_dependencies.is_empty());
    }

    #[test]
    fn test_parse_rejects_missing_version() {
        let err = Manifest::parse("package.json", r#"{ "name": "x" }"#).unwrap_err();
        assert!(matches!(err, FlowError::InvalidManifest { .. }), "got {:?}", err);
    }

    #[test]
    fn test_parse_rejects_non_string_specifier() {
        let err = Manifest::parse(
            "package.json",
            r#"{ "name": "x", "version": "1.0.0", "dependencies": { "a": 1 } }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("package.json"));
    }

    #[test]
    fn test_parse_rejects_non_object() {
        assert!(Manifest::parse("package.json", "[]").is_err());
        assert!(Manifest::parse("package.json", "not json").is_err());
    }

    #[test]
    fn test_serialize_keeps_field_order_and_unknown_fields() {
        let mut manifest = Manifest::parse("package.json", SAMPLE).unwrap();
        manifest.version = "1.2.0".to_string();
        manifest
            .dependencies
            .insert("@acme/core".to_string(), "next".to_string());

        let out = manifest.to_json_string().unwrap();
        let name_at = out.find("\"name\"").unwrap();
        let scripts_at = out.find("\"scripts\"").unwrap();
        let deps_at = out.find("\"dependencies\"").unwrap();
        assert!(name_at < scripts_at && scripts_at < deps_at, "order changed: {}", out);
        assert!(out.contains("\"version\": \"1.2.0\""));
        assert!(out.contains("\"@acme/core\": \"next\""));
        assert!(out.ends_with("}\n"));
        assert!(!out.contains("peerDependencies"));
    }

    #[test]
    fn test_entries_and_declares() {
        let manifest = Manifest::parse("package.json", SAMPLE).unwrap();
        let entries: Vec<_> = manifest.entries().collect();
        assert_eq!(
            entries,
            vec![
                (DependencyKind::Runtime, "left-pad", "^1.3.0"),
                (DependencyKind::Runtime, "@acme/core", "dev"),
                (DependencyKind::Dev, "typescript", "5.4.2"),
            ]
        );
        assert!(manifest.declares("typescript"));
        assert!(!manifest.declares("react"));
    }

    #[test]
    fn test_sibling_specifier_keeps_range_operator() {
        assert_eq!(sibling_specifier("^1.0.0", "1.1.0"), "^1.1.0");
        assert_eq!(sibling_specifier("~1.0.0-dev.0", "1.1.0"), "~1.1.0");
        assert_eq!(sibling_specifier("1.0.0", "1.1.0"), "1.1.0");
        assert_eq!(sibling_specifier("dev", "1.1.0"), "dev");
        assert_eq!(sibling_specifier("file:../core", "1.1.0"), "file:../core");
    }
}
