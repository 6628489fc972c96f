//! Domain logic - pure branch, version and tag rules independent of git or npm

pub mod branch;
pub mod policy;
pub mod version;

pub use branch::{validate_topic_name, BranchType, ProcessBranch, TopicBranch, DEVELOP, MAIN};
pub use policy::{SpecifierKind, TagPolicy};
pub use version::{increment_patch, version_core, Version};
