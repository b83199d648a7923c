use clap::Parser;
use smartdiary_deploy::cli::{self, Cli};
use smartdiary_deploy::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log);

    if let Err(e) = cli::run(cli).await {
        tracing::error!(error = format!("{e:#}"), "smartdiary-deploy failed");
        return Err(e);
    }

    Ok(())
}
