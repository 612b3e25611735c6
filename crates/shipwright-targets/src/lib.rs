//! Directory-backed deployment targets.
//!
//! Each subdirectory of the targets root that contains a `deploy.yaml` is a
//! target. Its pull step is a git sync of the directory and its run step is
//! the shell command from the definition.

pub mod definition;
pub mod git;
pub mod registry;
pub mod script;
pub mod shell;

pub use definition::{DEFINITION_FILE, ScheduleDefinition, TargetDefinition};
pub use git::GitSource;
pub use registry::DirectoryRegistry;
pub use script::ScriptTarget;
pub use shell::ShellRunner;
