mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Logs go to stderr; stdout stays machine-readable
    init_tracing(cli.global.verbose);

    // Dispatch and handle errors with proper exit codes
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
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "btrate", &mut std::io::stdout());
            Ok(())
        }

        Command::Manpage(args) => manpage(args.command.as_deref()),

        // Config commands resolve the file themselves
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        cmd => {
            let cfg = config::load(&cli.global)?;
            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, &cfg, &cli.global).await
        }
    }
}

/// Render `btrate.1`, or `btrate-<command>.1` for a named subcommand.
fn manpage(command: Option<&str>) -> Result<(), CliError> {
    use clap::CommandFactory;

    let root = Cli::command();
    let page = match command {
        None => root,
        Some(name) => root
            .find_subcommand(name)
            .filter(|sub| !sub.is_hide_set())
            .map(|sub| sub.clone().name(format!("btrate-{name}")))
            .ok_or_else(|| CliError::Validation {
                field: "command".into(),
                reason: format!("no subcommand named '{name}'"),
            })?,
    };
    let mut stdout = std::io::stdout().lock();
    clap_mangen::Man::new(page).render(&mut stdout)?;
    Ok(())
}
