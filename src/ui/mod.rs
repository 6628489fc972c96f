//! User interface module - console output.
//!
//! Workflows never prompt: every command runs its fixed sequence once started.
//! `formatter` holds the printing functions, re-exported here.

pub mod formatter;

pub use formatter::{
    display_error, display_status, display_step_failure, display_success, display_summary,
    display_warning, format_summary,
};
