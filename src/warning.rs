use std::fmt;

/// Non-fatal conditions noticed while running a workflow.
/// These are reported to the user but never abort the workflow.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowWarning {
    /// A dependency rewrite found no entry to change
    NoDependenciesRewritten { to_tag: String },
    /// No declared dependency lives under the requested scopes
    NoScopedDependencies { scopes: Vec<String> },
    /// A package excluded from validation is not declared by any manifest
    ExcludedPackageNotDeclared { package: String },
}

impl fmt::Display for FlowWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowWarning::NoDependenciesRewritten { to_tag } => {
                write!(f, "No dependency needed rewriting to '{}'", to_tag)
            }
            FlowWarning::NoScopedDependencies { scopes } => {
                write!(
                    f,
                    "No declared dependency under {}; lock file left as is",
                    scopes.join(", ")
                )
            }
            FlowWarning::ExcludedPackageNotDeclared { package } => {
                write!(
                    f,
                    "Package '{}' is excluded from the version check but no manifest declares it",
                    package
                )
            }
        }
    }
}
