//! Entry point: parse arguments, set up logging, run the batch driver.

mod cli;
mod driver;
mod logging;

use clap::Parser;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    logging::init(&cli.log_level);
    if let Err(err) = driver::run(&cli) {
        tracing::error!(error = %err, "batch aborted");
        return Err(err);
    }
    Ok(())
}
