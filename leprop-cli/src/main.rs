//! leprop — property service daemon and command-line client.
//!
//! # Usage
//!
//! ```text
//! leprop service [--config <file>] [--socket <path>] [--persist-props <path>] ...
//! leprop getprop <name> [--socket <path>]
//! leprop setprop <name> <value> [--socket <path>]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    prop::{GetArgs, SetArgs},
    service::ServiceArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "leprop",
    version,
    about = "Process-wide property store for embedded systems",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the property service in the foreground.
    Service(ServiceArgs),

    /// Print the value of a property.
    Getprop(GetArgs),

    /// Set a property.
    Setprop(SetArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Service(args) => args.run(),
        Commands::Getprop(args) => args.run(),
        Commands::Setprop(args) => args.run(),
    }
}
