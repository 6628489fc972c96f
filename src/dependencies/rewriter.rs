use crate::error::Result;
use crate::manifest::{DependencyKind, Manifest, ManifestStore};
use std::collections::BTreeSet;

/// Rewrite every dependency whose specifier satisfies `matches` to `new_tag`
/// across the root manifest and any sub-packages.
///
/// Each manifest that changed is written back before this returns. Returns
/// the names of the packages that were rewritten; an empty set is a normal
/// outcome.
pub fn rewrite_dependencies<S, P>(store: &S, matches: P, new_tag: &str) -> Result<BTreeSet<String>>
where
    S: ManifestStore + ?Sized,
    P: Fn(&str) -> bool,
{
    let mut manifests = store.read_all_manifests()?;
    let (changed, touched) = rewrite_manifests(&mut manifests, matches, new_tag);

    for index in touched {
        store.write_manifest(&manifests[index])?;
    }

    tracing::debug!(to = new_tag, count = changed.len(), "rewrote dependencies");
    Ok(changed)
}

/// In-memory rewrite. Returns the rewritten package names and the indices of
/// the manifests that changed.
pub fn rewrite_manifests<P>(
    manifests: &mut [Manifest],
    matches: P,
    new_tag: &str,
) -> (BTreeSet<String>, Vec<usize>)
where
    P: Fn(&str) -> bool,
{
    let mut changed = BTreeSet::new();
    let mut touched = Vec::new();

    for (index, manifest) in manifests.iter_mut().enumerate() {
        let mut manifest_changed = false;

        for kind in DependencyKind::ALL {
            for (name, spec) in manifest.dependencies_of_mut(kind).iter_mut() {
                if matches(spec.as_str()) {
                    *spec = new_tag.to_string();
                    changed.insert(name.clone());
                    manifest_changed = true;
                }
            }
        }

        if manifest_changed {
            touched.push(index);
        }
    }

    (changed, touched)
}
