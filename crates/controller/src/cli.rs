use clap::{Parser, Subcommand};
use infrastructure::config::{LogFormat, LogLevel};
use infrastructure::constants::DEFAULT_CONFIG_PATH;

#[derive(Parser, Debug)]
#[command(
    name = "fabriclb",
    about = "Shortest-path switching and virtual-IP load balancing controller",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Log level override (takes precedence over the config file)
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Log format: text (development) or json (production)
    #[arg(long)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Display version information
    Version,

    /// Load and validate the configuration file, then print the parsed
    /// VIP instances
    CheckConfig,
}

pub fn parse() -> Cli {
    Cli::parse()
}
