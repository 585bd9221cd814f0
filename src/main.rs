use clap::Parser;
use netsweep::cli::{capability_message, Cli, Commands};
use netsweep::output::print_error;
use netsweep::ScanError;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let capability = err
                .chain()
                .find_map(|cause| cause.downcast_ref::<ScanError>())
                .and_then(capability_message);
            match capability {
                Some(msg) => print_error(&msg),
                None => print_error(&format!("{:#}", err)),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let settings = cli.load_settings()?;

    match &cli.command {
        Commands::Scan(cmd) => cmd.execute(&settings, cli.quiet).await,
        Commands::Mac(cmd) => cmd.execute(&settings, cli.quiet).await,
        Commands::Config(cmd) => cmd.execute(&settings, cli.config.as_ref(), cli.quiet),
    }
}
