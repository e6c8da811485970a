use clap::Parser;
use murk_cli::commands::{Cmd, Command};

/// Murk CLI
///
/// Murk is a source-to-source obfuscator for 1C:Enterprise (BSL) modules: it hides
/// literals, delinearizes control flow, injects dead branches and inflates call
/// graphs while keeping the module's behavior.
#[derive(Parser)]
#[command(name = "murk")]
#[command(about = "Murk: 1C:Enterprise BSL obfuscator")]
struct Cli {
    /// Log every pass step instead of run summaries only.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Cmd,
}

/// Runs the Murk CLI with the provided arguments.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    cli.command.execute().await
}
