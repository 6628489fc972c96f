//! Dependency tag policy per branch type
//!
//! Each branch type accepts release-grade specifiers and source references,
//! plus a closed set of dist-tags matched either exactly or by prefix.

use crate::domain::branch::BranchType;
use regex::Regex;
use std::sync::OnceLock;

/// What a dependency version specifier denotes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
    /// Exact version or range without prerelease or build identifiers
    Release,
    /// Exact version or range carrying prerelease or build identifiers
    Prerelease,
    /// Direct source location (VCS URL, tarball URL, local path, hosted shorthand)
    Source,
    /// Anything else: a dist-tag such as `dev`, `next` or `feature-login`
    Tag,
}

impl SpecifierKind {
    pub fn classify(specifier: &str) -> Self {
        let spec = alias_target(specifier.trim());

        if is_source_reference(spec) {
            return SpecifierKind::Source;
        }

        match parse_range(spec) {
            Some(true) => SpecifierKind::Release,
            Some(false) => SpecifierKind::Prerelease,
            None => SpecifierKind::Tag,
        }
    }
}

/// The version part of an `npm:<name>@<spec>` alias, or the specifier itself.
/// An alias without a version resolves `latest` and yields an empty string.
fn alias_target(spec: &str) -> &str {
    match spec.strip_prefix("npm:") {
        Some(alias) => match alias.rsplit_once('@') {
            Some((name, target)) if !name.is_empty() => target.trim(),
            _ => "",
        },
        None => spec,
    }
}

fn is_source_reference(spec: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"^(git\+|git://|git@|https?://|file:|link:|workspace:|github:|gitlab:|bitbucket:|gist:|[A-Za-z0-9._-]+/[A-Za-z0-9._-]+(#.*)?$)",
            )
            .ok()
        })
        .as_ref()
        .map_or(false, |re| re.is_match(spec))
}

/// Parse an npm range. Returns `Some(true)` for release-grade ranges,
/// `Some(false)` when any comparator carries prerelease or build identifiers,
/// and `None` when the specifier is not a range at all.
fn parse_range(spec: &str) -> Option<bool> {
    if spec.is_empty() {
        return None;
    }

    let mut release = true;
    for alternative in spec.split("||") {
        let normalized = normalize_comparator_set(alternative.trim())?;
        let req = semver::VersionReq::parse(&normalized).ok()?;
        if alternative.contains('+') || req.comparators.iter().any(|c| !c.pre.is_empty()) {
            release = false;
        }
    }
    Some(release)
}

/// Rewrite npm comparator syntax ("1.0.0 - 2.0.0", ">= 1.0.0 <2") into the
/// comma-separated form the semver crate understands.
fn normalize_comparator_set(set: &str) -> Option<String> {
    if set.is_empty() {
        return None;
    }

    if let Some((low, high)) = set.split_once(" - ") {
        return Some(format!(">={}, <={}", strip_build(low.trim()), strip_build(high.trim())));
    }

    let mut parts: Vec<String> = Vec::new();
    for token in set.split_whitespace() {
        match parts.last_mut() {
            Some(last) if last.chars().all(|c| "<>=~^".contains(c)) => last.push_str(token),
            _ => parts.push(token.to_string()),
        }
    }

    Some(
        parts
            .iter()
            .map(|p| strip_build(p))
            .collect::<Vec<_>>()
            .join(", "),
    )
}

fn strip_build(comparator: &str) -> &str {
    comparator.split('+').next().unwrap_or(comparator)
}

/// Allowed dist-tags for one branch type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagPolicy {
    /// Tags that must match the specifier exactly
    pub exact: &'static [&'static str],
    /// Tags the specifier may start with
    pub prefixes: &'static [&'static str],
}

impl TagPolicy {
    pub fn for_branch(branch_type: BranchType) -> Self {
        match branch_type {
            BranchType::Main => TagPolicy {
                exact: &[],
                prefixes: &[],
            },
            BranchType::Release => TagPolicy {
                exact: &["next"],
                prefixes: &[],
            },
            BranchType::Hotfix => TagPolicy {
                exact: &["hotfix"],
                prefixes: &[],
            },
            BranchType::Develop => TagPolicy {
                exact: &["dev"],
                prefixes: &[],
            },
            BranchType::Feature => TagPolicy {
                exact: &["dev"],
                prefixes: &["feature"],
            },
            BranchType::Bugfix => TagPolicy {
                exact: &["dev"],
                prefixes: &["bugfix"],
            },
        }
    }

    /// Whether a dependency specifier is acceptable under this policy
    pub fn allows(&self, specifier: &str) -> bool {
        match SpecifierKind::classify(specifier) {
            SpecifierKind::Release | SpecifierKind::Source => true,
            SpecifierKind::Prerelease | SpecifierKind::Tag => {
                let target = alias_target(specifier.trim());
                self.exact.contains(&target)
                    || self.prefixes.iter().any(|p| target.starts_with(p))
            }
        }
    }
}
