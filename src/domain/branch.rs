use crate::domain::policy::TagPolicy;
use crate::error::{FlowError, Result};
use std::fmt;

/// Long-lived integration branch names
pub const MAIN: &str = "main";
pub const DEVELOP: &str = "develop";

/// Position of a branch in the gitflow taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BranchType {
    Main,
    Develop,
    Release,
    Hotfix,
    Feature,
    Bugfix,
}

impl BranchType {
    /// Classify a branch name ("main", "feature/login", ...)
    pub fn from_branch_name(name: &str) -> Option<Self> {
        match name {
            "main" | "master" => Some(BranchType::Main),
            "develop" => Some(BranchType::Develop),
            "release" => Some(BranchType::Release),
            "hotfix" => Some(BranchType::Hotfix),
            _ if name.starts_with("feature/") => Some(BranchType::Feature),
            _ if name.starts_with("bugfix/") => Some(BranchType::Bugfix),
            _ => None,
        }
    }

    /// Parse a branch type name as typed on the command line
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "main" | "master" => Some(BranchType::Main),
            "develop" => Some(BranchType::Develop),
            "release" => Some(BranchType::Release),
            "hotfix" => Some(BranchType::Hotfix),
            "feature" => Some(BranchType::Feature),
            "bugfix" => Some(BranchType::Bugfix),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BranchType::Main => "main",
            BranchType::Develop => "develop",
            BranchType::Release => "release",
            BranchType::Hotfix => "hotfix",
            BranchType::Feature => "feature",
            BranchType::Bugfix => "bugfix",
        }
    }

    /// Dependency tags allowed while working on this branch type
    pub fn policy(&self) -> TagPolicy {
        TagPolicy::for_branch(*self)
    }
}

impl fmt::Display for BranchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Short-lived topic branches created from and merged back into develop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicBranch {
    Feature,
    Bugfix,
}

impl TopicBranch {
    /// Prefix used for branch names and prerelease identifiers
    pub fn prefix(&self) -> &'static str {
        match self {
            TopicBranch::Feature => "feature",
            TopicBranch::Bugfix => "bugfix",
        }
    }

    /// Full branch name for a topic ("feature" + "login" -> "feature/login")
    pub fn branch_name(&self, name: &str) -> String {
        format!("{}/{}", self.prefix(), name)
    }

    /// Conventional commit type used in generated messages
    pub fn commit_type(&self) -> &'static str {
        match self {
            TopicBranch::Feature => "feat",
            TopicBranch::Bugfix => "fix",
        }
    }

    /// Prerelease identifier naming a topic ("login/v2" -> "feature-login-v2")
    pub fn prerelease_identifier(&self, name: &str) -> String {
        let ident: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
            .collect();
        format!("{}-{}", self.prefix(), ident)
    }
}

/// Check a topic name given on the command line
pub fn validate_topic_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('-')
        && !name.starts_with('/')
        && !name.ends_with('/')
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '-'));

    if valid {
        Ok(())
    } else {
        Err(FlowError::InvalidBranchName(name.to_string()))
    }
}

impl From<TopicBranch> for BranchType {
    fn from(topic: TopicBranch) -> Self {
        match topic {
            TopicBranch::Feature => BranchType::Feature,
            TopicBranch::Bugfix => BranchType::Bugfix,
        }
    }
}

/// Singleton process branches cut to ship a version to main
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessBranch {
    Release,
    Hotfix,
}

impl ProcessBranch {
    /// The branch name, which is also the dist-tag used on it
    pub fn name(&self) -> &'static str {
        match self {
            ProcessBranch::Release => "release",
            ProcessBranch::Hotfix => "hotfix",
        }
    }

    /// Prerelease identifier written into the manifest while the branch lives
    pub fn prerelease_tag(&self) -> &'static str {
        match self {
            ProcessBranch::Release => "next",
            ProcessBranch::Hotfix => "hotfix",
        }
    }
}

impl From<ProcessBranch> for BranchType {
    fn from(process: ProcessBranch) -> Self {
        match process {
            ProcessBranch::Release => BranchType::Release,
            ProcessBranch::Hotfix => BranchType::Hotfix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_branch() {
        assert_eq!(BranchType::from_branch_name("main"), Some(BranchType::Main));
        assert_eq!(BranchType::from_branch_name("master"), Some(BranchType::Main));
    }

    #[test]
    fn test_topic_branches() {
        assert_eq!(
            BranchType::from_branch_name("feature/login"),
            Some(BranchType::Feature)
        );
        assert_eq!(
            BranchType::from_branch_name("bugfix/crash-on-start"),
            Some(BranchType::Bugfix)
        );
        assert_eq!(BranchType::from_branch_name("feature"), None);
    }

    #[test]
    fn test_unknown_branch() {
        assert_eq!(BranchType::from_branch_name("experiment"), None);
        assert_eq!(BranchType::from_branch_name("release/1.0"), None);
    }

    #[test]
    fn test_parse_branch_type() {
        assert_eq!(BranchType::parse("Hotfix"), Some(BranchType::Hotfix));
        assert_eq!(BranchType::parse("nope"), None);
    }

    #[test]
    fn test_topic_branch_names() {
        assert_eq!(TopicBranch::Feature.branch_name("login"), "feature/login");
        assert_eq!(TopicBranch::Bugfix.branch_name("typo"), "bugfix/typo");
        assert_eq!(BranchType::from(TopicBranch::Bugfix), BranchType::Bugfix);
    }

    #[test]
    fn test_prerelease_identifier() {
        assert_eq!(
            TopicBranch::Feature.prerelease_identifier("login/v2"),
            "feature-login-v2"
        );
        assert_eq!(TopicBranch::Bugfix.prerelease_identifier("a_b.c"), "bugfix-a-b-c");
    }

    #[test]
    fn test_validate_topic_name() {
        assert!(validate_topic_name("login").is_ok());
        assert!(validate_topic_name("team/login-2.0").is_ok());
        for bad in ["", "-x", "/x", "x/", "a..b", "with space", "tilde~"] {
            assert!(
                matches!(validate_topic_name(bad), Err(FlowError::InvalidBranchName(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_process_branch_tags() {
        assert_eq!(ProcessBranch::Release.prerelease_tag(), "next");
        assert_eq!(ProcessBranch::Hotfix.prerelease_tag(), "hotfix");
        assert_eq!(BranchType::from(ProcessBranch::Release).name(), "release");
    }
}
