//! Emulator core for the original PlayStation: R3000A CPU pipeline with
//! COP0, memory interconnect, DMA engine and the lazy event scheduler that
//! keeps the peripherals in step with the CPU.

#[macro_use]
extern crate log;

mod box_array;
pub mod config;
pub mod error;
pub mod psx;

pub use config::{Config, TraceFlags};
pub use error::{PsxError, Result};
pub use psx::Psx;

#[cfg(test)]
mod tests;
