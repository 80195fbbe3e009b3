mod commands;
mod environment;
mod error;
mod logging;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use provision_config::DEFAULT_CONFIG_FILE;

use crate::commands::Commands;
use crate::environment::Environment;
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "site-provision")]
#[command(about = "Provision project workspaces with automatic rollback", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, short = 'c', global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Increase log output (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            print_error(&CliError::Runtime(e));
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async {
        let environment = Environment::load(&cli.config)?;
        cli.command.execute(&environment).await
    });

    if let Err(e) = result {
        print_error(&e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn print_error(error: &CliError) {
    eprintln!("error: {error}");

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("caused by: {cause}");
        source = std::error::Error::source(cause);
    }
}
