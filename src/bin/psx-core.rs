use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::{error, info};

use psx_core::psx::bios::Bios;
use psx_core::psx::memory_control::RamSize;
use psx_core::{Config, Psx};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// BIOS ROM image
    bios: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// PS-X EXE to run in place of the BIOS shell
    #[arg(short = 'x', long)]
    exe: Option<PathBuf>,

    /// Number of frames to emulate, runs forever if not set
    #[arg(short, long)]
    frames: Option<u32>,

    /// Echo the BIOS TTY output to the log
    #[arg(short, long)]
    tty: bool,

    /// Install 8MB of RAM instead of 2MB
    #[arg(long)]
    ram_8mb: bool,

    /// Log the address of every instruction (needs RUST_LOG=trace)
    #[arg(long)]
    trace_pc: bool,
}

fn run(args: Args) -> psx_core::Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    // Command line options override the file
    if args.exe.is_some() {
        config.side_load = args.exe;
    }
    if args.tty {
        config.bios_tty = true;
    }
    if args.ram_8mb {
        config.ram_size = RamSize::Ram8MB;
    }
    if args.trace_pc {
        config.trace.pc = true;
    }

    let bios = Bios::from_file(&args.bios)?;

    let mut psx = Psx::new(bios, &config)?;

    match args.frames {
        Some(frames) => {
            for _ in 0..frames {
                psx.run_frame()?;
            }
            info!("{} frames emulated", psx.frame());
        }
        None => loop {
            psx.run_frame()?;
        },
    }

    Ok(())
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        error!("{}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
