//! Command-line interface definitions

pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "waveclip")]
#[command(about = "Audio clip region editing and export", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a clip and print its properties
    Inspect {
        /// Input audio file
        input: String,

        /// Emit the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Cut a single time span out of a clip
    Trim {
        /// Input audio file
        input: String,

        /// Output WAV file
        output: String,

        /// Span start in seconds
        #[arg(short, long)]
        start: f64,

        /// Span end in seconds
        #[arg(short, long)]
        end: f64,
    },

    /// Splice one or more spans and export them
    Export {
        /// Input audio file
        input: String,

        /// Output file
        output: String,

        /// Output format: wav, mp3, or aac
        #[arg(short, long, default_value = "wav")]
        format: String,

        /// Spans as start:end second pairs; omitted means the whole clip
        #[arg(short = 'r', long = "region")]
        regions: Vec<String>,

        /// Bitrate in kbps for lossy formats
        #[arg(short, long)]
        bitrate: Option<u32>,

        /// Fail instead of falling back to WAV when the lossy encoder fails
        #[arg(long)]
        no_fallback: bool,
    },
}
