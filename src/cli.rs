//! Command-line interface for streambridge
//!
//! Provides argument parsing using clap derive macros.

use crate::synth::transcode::AudioEncoding;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stream blocking token generators and audio decoders into async code
#[derive(Parser, Debug)]
#[command(name = "streambridge", version, about)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug logs, -vv: trace logs)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse an output encoding name.
fn parse_encoding(s: &str) -> Result<AudioEncoding, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "linear16" | "pcm" => Ok(AudioEncoding::Linear16),
        "mulaw" | "ulaw" => Ok(AudioEncoding::Mulaw),
        other => Err(format!(
            "unknown encoding '{}' (expected linear16 or mulaw)",
            other
        )),
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decode WAV files as one chunked stream through the decode pipeline
    Decode {
        /// WAV files, one chunk each, in stream order
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,

        /// Write the encoded stream to this file instead of reporting sizes
        #[arg(long, short = 'o', value_name = "PATH")]
        output: Option<PathBuf>,

        /// Output sample rate override in Hz
        #[arg(long, value_name = "HZ")]
        sampling_rate: Option<u32>,

        /// Output encoding override (linear16, mulaw)
        #[arg(long, value_name = "ENCODING", value_parser = parse_encoding)]
        encoding: Option<AudioEncoding>,
    },

    /// Render the prompt the configured template would send for INPUT
    Prompt {
        /// Human input to render
        input: String,
    },

    /// Stream replies from the mock backend, one line of stdin per turn
    Chat {
        /// Scripted reply the mock backend produces
        #[arg(long, value_name = "TEXT", default_value = "I hear you. Tell me more!")]
        reply: String,

        /// Delay between mock tokens in milliseconds
        #[arg(long, value_name = "MS", default_value = "0")]
        token_delay_ms: u64,

        /// Print whole sentences instead of raw tokens
        #[arg(long)]
        sentences: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}
