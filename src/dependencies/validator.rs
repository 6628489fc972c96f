use crate::domain::{BranchType, TagPolicy};
use crate::error::{FlowError, Result};
use crate::manifest::{Manifest, ManifestStore};
use crate::warning::FlowWarning;
use std::collections::HashSet;

/// Check every dependency of the root manifest and any sub-packages against
/// the policy of `branch_type`.
///
/// Packages named in `excluded` are never checked, and in a monorepo neither
/// are references between sibling packages. Fails with every offender at once.
/// On success returns warnings for excluded names no manifest declares.
pub fn validate_dependencies<S>(
    store: &S,
    branch_type: BranchType,
    excluded: &[String],
) -> Result<Vec<FlowWarning>>
where
    S: ManifestStore + ?Sized,
{
    let manifests = store.read_all_manifests()?;

    let mut skip: HashSet<&str> = excluded.iter().map(String::as_str).collect();
    if store.is_multi_package_project() {
        skip.extend(manifests.iter().skip(1).map(|m| m.name.as_str()));
    }

    let offenders = find_offenders(&manifests, branch_type.policy(), &skip);
    if !offenders.is_empty() {
        tracing::debug!(branch = %branch_type, count = offenders.len(), "dependency check failed");
        return Err(FlowError::InvalidDependencies {
            branch: branch_type.to_string(),
            offenders,
        });
    }

    let warnings = excluded
        .iter()
        .filter(|name| !manifests.iter().any(|m| m.declares(name)))
        .map(|name| FlowWarning::ExcludedPackageNotDeclared {
            package: name.clone(),
        })
        .collect();

    Ok(warnings)
}

/// `name@specifier` for every entry the policy rejects, in order of first
/// appearance and without duplicates
pub fn find_offenders(manifests: &[Manifest], policy: TagPolicy, skip: &HashSet<&str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut offenders = Vec::new();

    for manifest in manifests {
        for (_, name, spec) in manifest.entries() {
            if skip.contains(name) || policy.allows(spec) {
                continue;
            }
            let offender = format!("{}@{}", name, spec);
            if seen.insert(offender.clone()) {
                offenders.push(offender);
            }
        }
    }

    offenders
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{package_json, MockWorkspace};

    fn offenders_of(branch_type: BranchType, deps: &[(&str, &str)], skip: &[&str]) -> Vec<String> {
        let manifest = Manifest::parse("package.json", &package_json("app", "1.0.0", deps)).unwrap();
        let skip: HashSet<&str> = skip.iter().copied().collect();
        find_offenders(&[manifest], branch_type.policy(), &skip)
    }

    const MIXED: [(&str, &str); 3] = [("a", "1.0.0"), ("b", "dev"), ("c", "feature-x")];

    #[test]
    fn test_develop_rejects_feature_tags() {
        assert_eq!(offenders_of(BranchType::Develop, &MIXED, &[]), vec!["c@feature-x"]);
    }

    #[test]
    fn test_feature_allows_dev_and_feature_prefix() {
        assert!(offenders_of(BranchType::Feature, &MIXED, &[]).is_empty());
    }

    #[test]
    fn test_main_lists_every_offender() {
        assert_eq!(
            offenders_of(BranchType::Main, &MIXED, &[]),
            vec!["b@dev", "c@feature-x"]
        );
    }

    #[test]
    fn test_exclusion_bypasses_policy() {
        let deps = [("@mui/lab", "alpha-1")];
        assert_eq!(offenders_of(BranchType::Main, &deps, &[]), vec!["@mui/lab@alpha-1"]);
        assert!(offenders_of(BranchType::Main, &deps, &["@mui/lab"]).is_empty());
    }

    #[test]
    fn test_source_references_always_allowed() {
        let deps = [
            ("a", "git+https://github.com/acme/a.git"),
            ("b", "acme/b#v1"),
            ("c", "file:../c"),
        ];
        assert!(offenders_of(BranchType::Main, &deps, &[]).is_empty());
    }

    #[test]
    fn test_validate_reports_error_and_warnings() {
        let ws = MockWorkspace::with_package("app", "1.0.0", &[("a", "dev"), ("b", "next")]);

        let err = validate_dependencies(&ws, BranchType::Release, &[]).unwrap_err();
        match err {
            FlowError::InvalidDependencies { branch, offenders } => {
                assert_eq!(branch, "release");
                assert_eq!(offenders, vec!["a@dev"]);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let warnings =
            validate_dependencies(&ws, BranchType::Release, &["a".to_string(), "zzz".to_string()])
                .unwrap();
        assert_eq!(
            warnings,
            vec![FlowWarning::ExcludedPackageNotDeclared {
                package: "zzz".to_string()
            }]
        );
    }

    #[test]
    fn test_monorepo_siblings_are_skipped() {
        let ws = MockWorkspace::new(&[
            ("package.json", package_json("root", "1.0.0", &[]).as_str()),
            ("lerna.json", "{}"),
            ("packages/core/package.json", package_json("@acme/core", "1.0.0", &[]).as_str()),
            (
                "packages/ui/package.json",
                package_json("@acme/ui", "1.0.0", &[("@acme/core", "dev"), ("x", "dev")]).as_str(),
            ),
        ]);

        let err = validate_dependencies(&ws, BranchType::Main, &[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid dependencies for main branch: x@dev"
        );
    }
}
