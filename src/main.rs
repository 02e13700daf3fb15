use anyhow::Result;
use clap::Parser;
use proverbchat::cli::CliArgs;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    proverbchat::run(args).await
}
