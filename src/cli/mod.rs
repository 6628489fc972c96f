pub mod orchestration;

pub use orchestration::{run_in_directory, run_workflow, WorkflowCommand};
