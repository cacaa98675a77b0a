use crate::demo::{run_demo, DemoArgs};
use crate::permits::{run_permit_command, PermitCommand};
use crate::server;
use clap::{Args, Parser, Subcommand};
use ptw::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Permit to Work Tracker",
    about = "Run the permit-to-work service or manage permits from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Submit, review and report on permits against the local database
    Permit {
        #[command(subcommand)]
        command: PermitCommand,
    },
    /// Walk one permit through its full lifecycle on a throwaway database
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override PTW_DATABASE_PATH
    #[arg(long)]
    pub(crate) database: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Permit { command } => run_permit_command(command),
        Command::Demo(args) => run_demo(args),
    }
}
