#![forbid(unsafe_code)]

mod cli;
mod shutdown;
mod startup;

use anyhow::Result;

use cli::Command;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::parse();

    match cli.command {
        Some(Command::Version) => {
            println!("fabriclb {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(Command::CheckConfig) => startup::check_config(&cli),
        None => startup::run(&cli).await,
    }
}
