use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};

/// Top-level CLI entry point.
#[derive(Debug, Parser)]
#[command(
    name = "pargen",
    version,
    about = "Psychological assessment report generation service"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(global = true, short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn print_help() {
        let mut cmd = Cli::command();
        let _ = cmd.print_help();
        println!();
    }
}

/// Supported subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP server with an embedded report worker.
    Serve(ServeArgs),
    /// Run a standalone report worker loop.
    Worker(WorkerArgs),
    /// Inspect the report job queue.
    Jobs(JobsArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs;

#[derive(Debug, Args)]
pub struct WorkerArgs;

#[derive(Debug, Args)]
pub struct JobsArgs {
    #[command(subcommand)]
    pub command: JobsCommands,
}

#[derive(Debug, Subcommand)]
pub enum JobsCommands {
    /// Print job counts per lifecycle status.
    Status,
}
