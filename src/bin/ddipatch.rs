//! ddipatch CLI
//!
//! Patches the kernel command line of a discoverable disk image in place.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ddipatch::{Config, DiskImage, RepartReport, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// ddipatch
#[derive(Parser, Debug)]
#[command(name = "ddipatch")]
#[command(about = "Swiss army knife for discoverable disk images")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Finalize an image built with systemd-repart by injecting its
    /// dm-verity hashes into the UKI command line
    Finalize {
        /// Path to the image
        image: PathBuf,

        /// Path to the systemd-repart JSON output
        #[arg(short, long)]
        repart_json: PathBuf,

        /// Block size of the image (0 = autodetect)
        #[arg(short, long, default_value = "0")]
        blocksize: u64,

        /// Path of the UKI inside the EFI partition
        #[arg(short, long, default_value = ddipatch::config::DEFAULT_UKI_PATH)]
        uki_path: String,
    },
}

fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,ddipatch=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Finalize {
            image,
            repart_json,
            blocksize,
            uki_path,
        } => finalize(image, repart_json, blocksize, uki_path),
    }
}

fn finalize(image: PathBuf, repart_json: PathBuf, blocksize: u64, uki_path: String) -> Result<()> {
    let hashes = RepartReport::from_path(&repart_json)?.verity_hashes();
    if hashes.is_empty() {
        tracing::warn!(report = %repart_json.display(), "report carries no verity hashes");
    }

    let config = Config::builder()
        .block_size(blocksize)
        .uki_path(uki_path)
        .build();

    let mut image = DiskImage::open(&image, config)?;
    let text = {
        let mut cmdline = image.cmdline()?;
        for (key, hash) in hashes.pairs() {
            println!("setting {}={}", key, hash);
            cmdline.set_one(key, hash, true)?;
        }
        cmdline.text()?
    };
    image.sync()?;

    println!("{}", text);
    Ok(())
}
