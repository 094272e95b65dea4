use crate::demo::{run_demo, validate_rules, DemoArgs, ValidateRulesArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use realty_crm::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Realty CRM lead routing",
    about = "Run and demonstrate the realty CRM lead assignment engine",
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
    /// Auto-assign a seeded batch of leads and print the outcome
    Demo(DemoArgs),
    /// Inspect assignment rule documents
    Rules {
        #[command(subcommand)]
        command: RulesCommand,
    },
}

#[derive(Subcommand, Debug)]
enum RulesCommand {
    /// Parse and validate a rules JSON file without installing it
    Validate(ValidateRulesArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args).await,
        Command::Rules {
            command: RulesCommand::Validate(args),
        } => validate_rules(args),
    }
}
