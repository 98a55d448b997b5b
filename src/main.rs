//! EpicChain P2P CLI
//!
//! Inspect and build protocol messages from the command line.

use clap::{Parser, Subcommand};
use epicchain_p2p::cli;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "epicchain-p2p")]
#[command(version)]
#[command(about = "EpicChain P2P wire protocol tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default node config file
    Init {
        /// Output file path
        #[arg(short, long, default_value = "epicchain-p2p.json")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Decode a hex encoded message envelope
    Decode {
        /// Envelope bytes as hex
        hex: String,
    },

    /// Build a PING message
    Ping {
        /// Local chain height
        #[arg(long, default_value = "0")]
        height: u32,

        /// Never compress the payload
        #[arg(long)]
        no_compression: bool,
    },

    /// Check addresses against the IP filter of a config file
    Filter {
        /// Node config file (defaults allow everything)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// IPv4 addresses or CIDR networks
        #[arg(required = true)]
        addresses: Vec<String>,
    },

    /// Build a bloom filter and its FILTERLOAD message
    Bloom {
        /// Filter size in bits (a multiple of 8)
        #[arg(short, long, default_value = "512")]
        bits: usize,

        /// Number of hash functions
        #[arg(short = 'k', long, default_value = "3")]
        hashes: u8,

        /// Seed tweak
        #[arg(short, long, default_value = "0")]
        tweak: u32,

        /// Elements to add (UTF-8)
        elements: Vec<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { output, force } => cli::cmd_init(&output, force),
        Commands::Decode { hex } => cli::cmd_decode(&hex),
        Commands::Ping {
            height,
            no_compression,
        } => cli::cmd_ping(height, !no_compression),
        Commands::Filter { config, addresses } => cli::cmd_filter(config.as_deref(), &addresses),
        Commands::Bloom {
            bits,
            hashes,
            tweak,
            elements,
        } => cli::cmd_bloom(bits, hashes, tweak, &elements),
    }
}
