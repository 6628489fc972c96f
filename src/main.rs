use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use npm_flow::cli::{run_in_directory, WorkflowCommand};
use npm_flow::config;
use npm_flow::domain::{BranchType, ProcessBranch, TopicBranch};
use npm_flow::ui;
use npm_flow::workflow::FinishOptions;

const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Parser)]
#[command(
    name = "npm-flow",
    version,
    about = "Gitflow branching and release automation for npm packages and monorepos"
)]
struct Cli {
    #[arg(short, long, global = true, help = "Custom configuration file path")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start feature/<name> from develop
    FeatureStart { name: String },

    /// Merge the current feature branch into develop and delete it
    FeatureFinish {
        #[arg(short, long, help = "Squash the branch into a single commit")]
        squash: bool,

        #[arg(short, long, help = "Message of the squash commit")]
        message: Option<String>,
    },

    /// Start bugfix/<name> from develop
    BugfixStart { name: String },

    /// Merge the current bugfix branch into develop and delete it
    BugfixFinish {
        #[arg(short, long, help = "Squash the branch into a single commit")]
        squash: bool,

        #[arg(short, long, help = "Message of the squash commit")]
        message: Option<String>,
    },

    /// Cut the release branch from develop
    ReleaseStart {
        /// Release version (major.minor.patch); defaults to develop's version
        #[arg(value_name = "VERSION")]
        release_version: Option<String>,

        #[arg(long, num_args = 1.., help = "Packages to skip in the dependency check")]
        no_version_check: Vec<String>,
    },

    /// Ship the release branch to main, tag it and advance develop
    ReleaseFinish {
        #[arg(long, num_args = 1.., help = "Packages to skip in the dependency check")]
        no_version_check: Vec<String>,
    },

    /// Cut the hotfix branch from main
    HotfixStart,

    /// Ship the hotfix branch to main, tag it and advance develop
    HotfixFinish {
        #[arg(long, num_args = 1.., help = "Packages to skip in the dependency check")]
        no_version_check: Vec<String>,
    },

    /// Drop lock-file entries of scoped dependencies and re-resolve them
    UpdateLockFile {
        #[arg(required = true, help = "Scopes such as @acme")]
        scopes: Vec<String>,
    },

    /// Check dependency specifiers against a branch policy
    CheckDependencies {
        #[arg(long, value_parser = parse_branch_type, help = "Branch type whose policy applies (default: current branch)")]
        branch_type: Option<BranchType>,

        #[arg(long, num_args = 1.., help = "Packages to skip in the dependency check")]
        no_version_check: Vec<String>,
    },
}

fn parse_branch_type(value: &str) -> std::result::Result<BranchType, String> {
    BranchType::parse(value).ok_or_else(|| {
        format!(
            "unknown branch type '{}' (expected main, develop, release, hotfix, feature or bugfix)",
            value
        )
    })
}

impl Commands {
    fn into_workflow_command(self) -> WorkflowCommand {
        match self {
            Commands::FeatureStart { name } => WorkflowCommand::StartTopic {
                topic: TopicBranch::Feature,
                name,
            },
            Commands::FeatureFinish { squash, message } => WorkflowCommand::FinishTopic {
                topic: TopicBranch::Feature,
                options: FinishOptions { squash, message },
            },
            Commands::BugfixStart { name } => WorkflowCommand::StartTopic {
                topic: TopicBranch::Bugfix,
                name,
            },
            Commands::BugfixFinish { squash, message } => WorkflowCommand::FinishTopic {
                topic: TopicBranch::Bugfix,
                options: FinishOptions { squash, message },
            },
            Commands::ReleaseStart {
                release_version,
                no_version_check,
            } => WorkflowCommand::StartRelease {
                version: release_version,
                no_version_check,
            },
            Commands::ReleaseFinish { no_version_check } => WorkflowCommand::FinishProcess {
                process: ProcessBranch::Release,
                no_version_check,
            },
            Commands::HotfixStart => WorkflowCommand::StartHotfix,
            Commands::HotfixFinish { no_version_check } => WorkflowCommand::FinishProcess {
                process: ProcessBranch::Hotfix,
                no_version_check,
            },
            Commands::UpdateLockFile { scopes } => WorkflowCommand::UpdateLockFile { scopes },
            Commands::CheckDependencies {
                branch_type,
                no_version_check,
            } => WorkflowCommand::CheckDependencies {
                branch_type,
                no_version_check,
            },
        }
    }
}

/// `RUST_LOG` when set and valid, `warn` otherwise
fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        ui::display_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = config::load_config(cli.config.as_deref())?;
    let command = cli.command.into_workflow_command();
    let cwd = std::env::current_dir()?;

    let run = run_in_directory(&command, &cwd, &config)?;
    ui::display_summary(&run);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_log_filter_honours_rust_log() {
        std::env::set_var("RUST_LOG", "debug");
        let filter = log_filter();
        std::env::remove_var("RUST_LOG");

        assert_eq!(filter.max_level_hint(), Some(tracing::level_filters::LevelFilter::DEBUG));
    }

    #[test]
    #[serial]
    fn test_log_filter_defaults_to_warn() {
        std::env::remove_var("RUST_LOG");
        let filter = log_filter();

        assert_eq!(filter.max_level_hint(), Some(tracing::level_filters::LevelFilter::WARN));
    }

    #[test]
    fn test_cli_parses_release_start() {
        let cli = Cli::try_parse_from(["npm-flow", "release-start", "2.0.0", "--no-version-check", "a", "b"]).unwrap();
        match cli.command.into_workflow_command() {
            WorkflowCommand::StartRelease {
                version,
                no_version_check,
            } => {
                assert_eq!(version.as_deref(), Some("2.0.0"));
                assert_eq!(no_version_check, vec!["a", "b"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
