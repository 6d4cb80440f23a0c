// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use code_scanner::backends::camera::FacingMode;
use code_scanner::frame_processor::ScanMode;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "code-scanner")]
#[command(about = "Scan QR codes and barcodes from a camera")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Scan codes from a camera and print them as JSON lines
    Scan {
        /// Kind of code to look for (qr or barcode)
        #[arg(short, long)]
        mode: Option<ScanMode>,

        /// Camera device path (default: picked by facing)
        #[arg(short, long)]
        device: Option<String>,

        /// Preferred camera direction (user or environment)
        #[arg(short, long)]
        facing: Option<FacingMode>,

        /// Ideal capture width
        #[arg(long)]
        width: Option<u32>,

        /// Ideal capture height
        #[arg(long)]
        height: Option<u32>,

        /// Maximum decode attempts per second
        #[arg(short, long)]
        rate: Option<u32>,

        /// Exit after the first code
        #[arg(long)]
        once: bool,

        /// Replay an image file instead of opening a camera
        #[arg(short, long)]
        image: Option<PathBuf>,
    },

    /// Decode a code from an image file
    Decode {
        /// Image file to decode
        file: PathBuf,

        /// Kind of code to look for (qr or barcode)
        #[arg(short, long, default_value = "qr")]
        mode: ScanMode,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=code_scanner=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(version = env!("GIT_VERSION"), "Starting code-scanner");

    let cli = Cli::parse();

    match cli.command {
        Commands::List => cli::list_cameras(),
        Commands::Scan {
            mode,
            device,
            facing,
            width,
            height,
            rate,
            once,
            image,
        } => cli::scan(cli::ScanOptions {
            mode,
            device,
            facing,
            width,
            height,
            rate,
            once,
            image,
        }),
        Commands::Decode { file, mode } => {
            if !cli::decode_file(&file, mode)? {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
