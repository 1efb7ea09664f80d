use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use kurz::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl Commands {
    /// Commands that resolve a rate; `None` for local-only commands.
    fn app_command(&self) -> Option<kurz::AppCommand> {
        match *self {
            Commands::Setup => None,
            Commands::Rate => Some(kurz::AppCommand::Rate),
            Commands::ToAsset { amount, precision } => {
                Some(kurz::AppCommand::ToAsset { amount, precision })
            }
            Commands::ToFiat { amount, precision } => {
                Some(kurz::AppCommand::ToFiat { amount, precision })
            }
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration, at --config-path when given
    Setup,
    /// Display the current BTC/CZK rate
    Rate,
    /// Convert an amount of CZK to BTC
    ToAsset {
        amount: f64,
        /// Decimal places in the result
        #[arg(short, long, default_value_t = kurz::DEFAULT_ASSET_PRECISION, allow_negative_numbers = true)]
        precision: i32,
    },
    /// Convert an amount of BTC to CZK
    ToFiat {
        amount: f64,
        /// Decimal places in the result
        #[arg(short, long, default_value_t = kurz::DEFAULT_FIAT_PRECISION, allow_negative_numbers = true)]
        precision: i32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config_path = cli.config_path.as_deref();
    let result = match cli.command.as_ref().map(Commands::app_command) {
        Some(Some(app_command)) => kurz::run_command(app_command, config_path).await,
        Some(None) => match config_path {
            Some(path) => kurz::cli::setup::setup_at_path(path),
            None => kurz::cli::setup::setup(),
        },
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
