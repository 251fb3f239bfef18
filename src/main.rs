//! Waveclip CLI - Audio Clip Region Editing and Export
//!
//! Command-line interface for inspecting, trimming, and exporting clips.

use clap::Parser;
use env_logger::Env;
use log::info;

use waveclip::cli::{commands, Cli, Commands};
use waveclip::Result;

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    info!("Waveclip v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("Waveclip v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Inspect { input, json } => commands::inspect(&input, json),
        Commands::Trim {
            input,
            output,
            start,
            end,
        } => commands::trim(&input, &output, start, end),
        Commands::Export {
            input,
            output,
            format,
            regions,
            bitrate,
            no_fallback,
        } => commands::export(&input, &output, &format, &regions, bitrate, no_fallback),
    }
}
