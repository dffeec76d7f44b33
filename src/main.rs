use anyhow::Result;
use cistream::cli::Cli;
use clap::Parser;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    info!("Starting cistream");
    cli.execute().await?;

    Ok(())
}
