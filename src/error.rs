use crate::psx::dma::Port;
use crate::psx::AccessWidth;
use std::io;
use thiserror::Error;

pub type Result<T> = ::std::result::Result<T, PsxError>;

#[derive(Error, Debug)]
pub enum PsxError {
    #[error("Input output error: {0}")]
    IoError(#[from] io::Error),
    #[error("Invalid BIOS file `{0}`")]
    BadBios(String),
    #[error("Invalid PS-X EXE: {0}")]
    BadExe(String),
    #[error("Configuration error: {0}")]
    BadConfig(#[from] toml::de::Error),
    #[error("Unaligned {width:?} access at 0x{addr:08x}")]
    UnalignedAccess { addr: u32, width: AccessWidth },
    #[error("Unhandled {width:?} load from 0x{addr:08x}")]
    UnhandledLoad { addr: u32, width: AccessWidth },
    #[error("Unhandled {width:?} store to 0x{addr:08x} (value 0x{value:08x})")]
    UnhandledStore {
        addr: u32,
        width: AccessWidth,
        value: u32,
    },
    #[error("Invalid DMA sync mode for {port:?}: control 0x{control:08x}")]
    BadDmaSync { port: Port, control: u32 },
    #[error("DMA linked list on {port:?} never terminates (last node 0x{addr:06x})")]
    DmaLinkedListLoop { port: Port, addr: u32 },
    #[error("DMA linked list on {port:?} can't run towards RAM")]
    BadDmaDirection { port: Port },
}
