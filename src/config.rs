//! Emulator configuration, usually loaded from a TOML file by the front end.
//!
//! ```toml
//! ram_size = "2MB"
//! bios_tty = true
//! side_load = "demo.exe"
//!
//! [trace]
//! pc = false
//! instructions = false
//! ```

use crate::error::Result;
use crate::psx::memory_control::RamSize;
use bitflags::bitflags;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

bitflags! {
    /// Pipeline tracing switches. Tracing goes through `trace!` so the log
    /// level must allow it as well.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TraceFlags: u8 {
        /// Log the address of every retired instruction
        const PC = 1 << 0;
        /// Log every decoded instruction
        const INSTRUCTIONS = 1 << 1;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TraceConfig {
    pub pc: bool,
    pub instructions: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Installed RAM, which sets the mirroring period of the RAM region
    pub ram_size: RamSize,
    pub trace: TraceConfig,
    /// Echo the BIOS putchar calls to the log
    pub bios_tty: bool,
    /// PS-X EXE to side-load once the BIOS reaches the shell
    pub side_load: Option<PathBuf>,
}

impl Config {
    pub fn from_toml(source: &str) -> Result<Config> {
        let config = toml::from_str(source)?;

        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
        let source = fs::read_to_string(path)?;

        Config::from_toml(&source)
    }

    pub fn trace_flags(&self) -> TraceFlags {
        let mut flags = TraceFlags::empty();

        flags.set(TraceFlags::PC, self.trace.pc);
        flags.set(TraceFlags::INSTRUCTIONS, self.trace.instructions);

        flags
    }
}
