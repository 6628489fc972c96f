use crate::config::PackagesConfig;
use crate::error::{FlowError, Result};
use crate::manifest::{apply_version, LockFile, Manifest, ManifestStore, MANIFEST_FILE};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const DEFAULT_PACKAGE_GLOB: &str = "packages/*";

/// Manifest store for npm packages and lerna-style monorepos on disk
pub struct NpmStore {
    root: PathBuf,
    settings: PackagesConfig,
}

impl NpmStore {
    /// Create a store rooted at the directory holding the root `package.json`
    pub fn new(root: impl Into<PathBuf>, settings: PackagesConfig) -> Self {
        NpmStore {
            root: root.into(),
            settings,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_manifest_at(&self, relative: &Path) -> Result<Manifest> {
        let content = fs::read_to_string(self.root.join(relative)).map_err(|e| {
            FlowError::manifest(relative.display().to_string(), e.to_string())
        })?;
        Manifest::parse(relative, &content)
    }

    fn read_json(&self, relative: &str) -> Result<Value> {
        let content = fs::read_to_string(self.root.join(relative))?;
        serde_json::from_str(&content).map_err(|e| FlowError::manifest(relative, e.to_string()))
    }

    /// Sub-package globs from the marker file, then the root `workspaces` field
    fn workspace_patterns(&self) -> Result<Vec<String>> {
        let marker = self.read_json(&self.settings.workspace_marker)?;
        if let Some(patterns) = string_list(marker.get("packages")) {
            return Ok(patterns);
        }

        let root = self.read_json(MANIFEST_FILE)?;
        let workspaces = root.get("workspaces");
        let patterns = string_list(workspaces)
            .or_else(|| string_list(workspaces.and_then(|w| w.get("packages"))))
            .unwrap_or_else(|| vec![DEFAULT_PACKAGE_GLOB.to_string()]);

        Ok(patterns)
    }

    /// Keep the marker file's own `version` field (lerna fixed mode) in step
    fn update_marker_version(&self, version: &str) -> Result<()> {
        let marker_name = &self.settings.workspace_marker;
        let mut marker = self.read_json(marker_name)?;

        if let Some(Value::String(current)) = marker.get_mut("version") {
            if current != "independent" {
                *current = version.to_string();
                let mut content = serde_json::to_string_pretty(&marker)?;
                content.push('\n');
                write_atomically(&self.root.join(marker_name), &content)?;
            }
        }

        Ok(())
    }
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let items = value?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|item| item.as_str().map(|s| s.to_string()))
            .collect(),
    )
}

/// Write through a sibling temporary file and rename it into place
fn write_atomically(path: &Path, content: &str) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{}.npmflow.tmp", file_name));

    fs::write(&temp, content)?;
    fs::rename(&temp, path)?;
    Ok(())
}

impl ManifestStore for NpmStore {
    fn read_root_manifest(&self) -> Result<Manifest> {
        self.read_manifest_at(Path::new(MANIFEST_FILE))
    }

    fn read_sub_package_manifests(&self) -> Result<Vec<Manifest>> {
        if !self.is_multi_package_project() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for pattern in self.workspace_patterns()? {
            let full = self
                .root
                .join(pattern.trim_end_matches('/'))
                .join(MANIFEST_FILE);
            let entries = glob::glob(&full.to_string_lossy())
                .map_err(|e| FlowError::config(format!("invalid package glob '{}': {}", pattern, e)))?;

            for entry in entries {
                let path = entry.map_err(|e| FlowError::Io(e.into_error()))?;
                let relative = path.strip_prefix(&self.root).unwrap_or(&path).to_path_buf();
                let in_node_modules = relative
                    .components()
                    .any(|c| c.as_os_str() == "node_modules");
                if !in_node_modules && relative != Path::new(MANIFEST_FILE) {
                    paths.push(relative);
                }
            }
        }

        paths.sort();
        paths.dedup();

        paths.iter().map(|path| self.read_manifest_at(path)).collect()
    }

    fn write_manifest(&self, manifest: &Manifest) -> Result<()> {
        tracing::debug!(path = %manifest.path.display(), "writing manifest");
        write_atomically(&self.root.join(&manifest.path), &manifest.to_json_string()?)
    }

    fn is_multi_package_project(&self) -> bool {
        self.root.join(&self.settings.workspace_marker).is_file()
    }

    fn set_version(&self, version: &str) -> Result<()> {
        apply_version(self, version)?;
        if self.is_multi_package_project() {
            self.update_marker_version(version)?;
        }
        Ok(())
    }

    fn read_lock_file(&self) -> Result<LockFile> {
        for name in &self.settings.lock_files {
            let path = self.root.join(name);
            if path.is_file() {
                let content = fs::read_to_string(&path)?;
                return LockFile::parse(name, &content);
            }
        }

        Err(FlowError::NoLockFileFound(self.settings.lock_files.join(", ")))
    }

    fn write_lock_file(&self, lock_file: &LockFile) -> Result<()> {
        tracing::debug!(path = %lock_file.path.display(), "writing lock file");
        write_atomically(&self.root.join(&lock_file.path), &lock_file.to_json_string()?)
    }

    fn reinstall(&self, packages: &[String]) -> Result<()> {
        if packages.is_empty() {
            return Ok(());
        }

        let command_line = format!("{} update {}", self.settings.manager, packages.join(" "));
        tracing::debug!(command = %command_line, "re-resolving packages");

        let output = Command::new(&self.settings.manager)
            .arg("update")
            .args(packages)
            .current_dir(&self.root)
            .output()
            .map_err(|e| FlowError::command(&command_line, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FlowError::command(command_line, stderr.trim()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, relative: &str, content: &str) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn package(name: &str, version: &str, deps: &str) -> String {
        format!(
            r#"{{ "name": "{}", "version": "{}", "dependencies": {{ {} }} }}"#,
            name, version, deps
        )
    }

    #[test]
    fn test_single_package_project() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "package.json", &package("app", "1.0.0", ""));

        let store = NpmStore::new(dir.path(), PackagesConfig::default());
        assert!(!store.is_multi_package_project());
        assert!(store.read_sub_package_manifests().unwrap().is_empty());
        assert_eq!(store.read_all_manifests().unwrap().len(), 1);
    }

    #[test]
    fn test_monorepo_discovery_and_version_propagation() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "package.json", &package("root", "1.0.0", ""));
        write(
            dir.path(),
            "lerna.json",
            r#"{ "packages": ["packages/*"], "version": "1.0.0" }"#,
        );
        write(dir.path(), "packages/core/package.json", &package("@acme/core", "1.0.0", ""));
        write(
            dir.path(),
            "packages/ui/package.json",
            &package("@acme/ui", "1.0.0", r#""@acme/core": "^1.0.0", "react": "^18.0.0""#),
        );
        write(
            dir.path(),
            "packages/ui/node_modules/dep/package.json",
            &package("dep", "0.1.0", ""),
        );

        let store = NpmStore::new(dir.path(), PackagesConfig::default());
        assert!(store.is_multi_package_project());

        let packages = store.read_sub_package_manifests().unwrap();
        let names: Vec<_> = packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["@acme/core", "@acme/ui"]);

        store.set_version("1.1.0-next.0").unwrap();

        let ui = store
            .read_sub_package_manifests()
            .unwrap()
            .into_iter()
            .find(|p| p.name == "@acme/ui")
            .unwrap();
        assert_eq!(ui.version, "1.1.0-next.0");
        assert_eq!(ui.dependencies.get("@acme/core").unwrap(), "^1.1.0-next.0");
        assert_eq!(ui.dependencies.get("react").unwrap(), "^18.0.0");
        assert_eq!(store.read_root_manifest().unwrap().version, "1.1.0-next.0");

        let marker = fs::read_to_string(dir.path().join("lerna.json")).unwrap();
        assert!(marker.contains("1.1.0-next.0"), "marker: {}", marker);
    }

    #[test]
    fn test_workspaces_field_fallback() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "package.json",
            r#"{ "name": "root", "version": "2.0.0", "workspaces": ["libs/*"] }"#,
        );
        write(dir.path(), "lerna.json", r#"{ "version": "independent" }"#);
        write(dir.path(), "libs/a/package.json", &package("a", "2.0.0", ""));

        let store = NpmStore::new(dir.path(), PackagesConfig::default());
        let packages = store.read_sub_package_manifests().unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].path, Path::new("libs/a/package.json"));

        store.set_version("2.0.1").unwrap();
        let marker = fs::read_to_string(dir.path().join("lerna.json")).unwrap();
        assert!(marker.contains("independent"));
    }

    #[test]
    fn test_lock_file_detection_prefers_primary() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "package.json", &package("app", "1.0.0", ""));

        let store = NpmStore::new(dir.path(), PackagesConfig::default());
        assert!(matches!(
            store.read_lock_file().unwrap_err(),
            FlowError::NoLockFileFound(_)
        ));

        write(dir.path(), "npm-shrinkwrap.json", r#"{ "packages": {} }"#);
        assert_eq!(
            store.read_lock_file().unwrap().path,
            Path::new("npm-shrinkwrap.json")
        );

        write(dir.path(), "package-lock.json", r#"{ "packages": {} }"#);
        assert_eq!(
            store.read_lock_file().unwrap().path,
            Path::new("package-lock.json")
        );
    }

    #[test]
    fn test_write_manifest_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "package.json", &package("app", "1.0.0", r#""a": "dev""#));

        let store = NpmStore::new(dir.path(), PackagesConfig::default());
        let mut manifest = store.read_root_manifest().unwrap();
        manifest.dependencies.insert("a".to_string(), "next".to_string());
        store.write_manifest(&manifest).unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
        assert_eq!(
            store.read_root_manifest().unwrap().dependencies.get("a").unwrap(),
            "next"
        );
    }

    #[test]
    fn test_reinstall_with_no_packages_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let settings = PackagesConfig {
            manager: "definitely-not-a-package-manager".to_string(),
            ..PackagesConfig::default()
        };
        let store = NpmStore::new(dir.path(), settings);
        assert!(store.reinstall(&[]).is_ok());
        assert!(store.reinstall(&["a".to_string()]).unwrap_err().is_tool_failure());
    }
}
