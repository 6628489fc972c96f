//! Dependency specifier rewriting and branch-policy validation

pub mod rewriter;
pub mod validator;

pub use rewriter::{rewrite_dependencies, rewrite_manifests};
pub use validator::{find_offenders, validate_dependencies};
