//! CLI command definitions.

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the hook server and scheduled deployments
    Serve,

    /// List discovered deployment targets
    Targets,

    /// Ask the running daemon to deploy a target and wait for the result
    Deploy {
        /// Target name, e.g. `app-main`
        name: String,

        /// Return once the daemon has accepted the request
        #[arg(long)]
        detach: bool,
    },
}
