pub mod cli;
pub mod config;
pub mod dependencies;
pub mod domain;
pub mod error;
pub mod git;
pub mod manifest;
pub mod mock;
pub mod pruner;
pub mod ui;
pub mod warning;
pub mod workflow;

pub use error::{FlowError, Result};
