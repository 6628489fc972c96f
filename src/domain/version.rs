use crate::error::{FlowError, Result};
use std::fmt;

/// Semantic version representation, including prerelease and build identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Vec<String>,
    pub build: Vec<String>,
}

impl Version {
    /// Create a new release version
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version {
            major,
            minor,
            patch,
            prerelease: Vec::new(),
            build: Vec::new(),
        }
    }

    /// Parse a version string (e.g., "1.2.3", "v1.2.3-dev.0", "1.2.3+build.5")
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let clean = trimmed.strip_prefix('v').unwrap_or(trimmed);

        let parsed = semver::Version::parse(clean).map_err(|_| FlowError::version(value))?;

        Ok(Version {
            major: parsed.major,
            minor: parsed.minor,
            patch: parsed.patch,
            prerelease: split_identifiers(parsed.pre.as_str()),
            build: split_identifiers(parsed.build.as_str()),
        })
    }

    /// A release version carries neither prerelease nor build identifiers
    pub fn is_release(&self) -> bool {
        self.prerelease.is_empty() && self.build.is_empty()
    }

    /// The `major.minor.patch` triple with prerelease and build discarded
    pub fn core(&self) -> Version {
        Version::new(self.major, self.minor, self.patch)
    }

    /// Core with the patch component incremented
    pub fn bump_patch(&self) -> Result<Version> {
        let patch = self
            .patch
            .checked_add(1)
            .ok_or_else(|| FlowError::version(self.to_string()))?;
        Ok(Version::new(self.major, self.minor, patch))
    }

    /// Core of this version with the given prerelease identifiers attached.
    ///
    /// Fails when an identifier is not a valid semver prerelease identifier.
    pub fn with_prerelease(&self, identifiers: &[&str]) -> Result<Version> {
        let joined = identifiers.join(".");
        semver::Prerelease::new(&joined)
            .map_err(|_| FlowError::version(format!("{}-{}", self.core(), joined)))?;

        let mut version = self.core();
        version.prerelease = identifiers.iter().map(|s| s.to_string()).collect();
        Ok(version)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.prerelease.is_empty() {
            write!(f, "-{}", self.prerelease.join("."))?;
        }
        if !self.build.is_empty() {
            write!(f, "+{}", self.build.join("."))?;
        }
        Ok(())
    }
}

fn split_identifiers(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        Vec::new()
    } else {
        raw.split('.').map(|s| s.to_string()).collect()
    }
}

/// Extract the version core of a version string ("1.2.3-next.0" -> "1.2.3")
pub fn version_core(value: &str) -> Result<String> {
    Ok(Version::parse(value)?.core().to_string())
}

/// Increment the patch component of a version string's core.
///
/// Prerelease and build identifiers are stripped before incrementing, so
/// "1.2.3-dev.0" becomes "1.2.4".
pub fn increment_patch(value: &str) -> Result<String> {
    Ok(Version::parse(value)?.bump_patch()?.to_string())
}
