mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use isapi_api::IsapiClient;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    // Config commands don't need a device connection
    let cmd = match cli.command {
        Command::Config(args) => return commands::config_cmd::handle(&args),
        cmd => cmd,
    };

    let cfg = isapi_config::load_config()?;
    match cmd {
        // The probe reports connection failures instead of failing
        Command::Probe => {
            let client_config = config::resolve_client_config(&cli.global, &cfg)?;
            commands::probe::handle(client_config, interrupt_token(), &cli.global).await
        }

        cmd => {
            let client_config = config::resolve_client_config(&cli.global, &cfg)?;
            let client = IsapiClient::connect_with_cancel(client_config, interrupt_token()).await?;

            tracing::debug!(command = ?cmd, auth = %client.auth_method(), "dispatching command");
            commands::dispatch(cmd, &client, &cli.global).await
        }
    }
}

/// A token cancelled on Ctrl-C, so long stream reads end cleanly.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let on_signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });
    token
}
