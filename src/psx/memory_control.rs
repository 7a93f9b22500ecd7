//! PlayStation Memory Control
//!
//! Expansion region mappings, the delay/size registers that set the bus
//! timings of the external memory regions, and the RAM size register.

use super::memory_map::{RAM_SIZE_2MB, RAM_SIZE_8MB};
use super::{AccessWidth, CycleCount};
use serde::Deserialize;

/// Only supported base address for expansion 1
const EXPANSION_1_BASE: u32 = 0x1f00_0000;
/// Only supported base address for expansion 2
const EXPANSION_2_BASE: u32 = 0x1f80_2000;

/// Delay/size register of an external memory region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryTiming(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusWidth {
    Width8,
    Width16,
}

impl MemoryTiming {
    pub fn from_u32(value: u32) -> MemoryTiming {
        MemoryTiming(value)
    }

    pub fn to_u32(self) -> u32 {
        self.0
    }

    fn write_delay(self) -> CycleCount {
        (self.0 & 0xf) as CycleCount
    }

    fn read_delay(self) -> CycleCount {
        ((self.0 >> 4) & 0xf) as CycleCount
    }

    /// Recovery period uses COM0
    fn use_com0(self) -> bool {
        self.0 & (1 << 8) != 0
    }

    /// Strobe period uses COM3
    fn use_com3(self) -> bool {
        self.0 & (1 << 11) != 0
    }

    pub fn bus_width(self) -> BusWidth {
        if self.0 & (1 << 12) != 0 {
            BusWidth::Width16
        } else {
            BusWidth::Width8
        }
    }

    /// Size of the mapped window in bytes
    pub fn window_size(self) -> u32 {
        1u32.checked_shl((self.0 >> 16) & 0x1f).unwrap_or(0)
    }

    /// Number of CPU cycles taken by an access of `width` to the region.
    /// Wide accesses are split in several bus cycles on narrow buses.
    pub fn access_time(self, width: AccessWidth, write: bool, common_delay: u32) -> CycleCount {
        let delay = if write {
            self.write_delay()
        } else {
            self.read_delay()
        };

        let mut per_transfer = delay + 2;

        if self.use_com0() {
            per_transfer += (common_delay & 0xf) as CycleCount;
        }

        if self.use_com3() {
            per_transfer += ((common_delay >> 12) & 0xf) as CycleCount;
        }

        let transfers = match (width, self.bus_width()) {
            (AccessWidth::Word, BusWidth::Width8) => 4,
            (AccessWidth::Word, BusWidth::Width16) => 2,
            (AccessWidth::HalfWord, BusWidth::Width8) => 2,
            _ => 1,
        };

        per_transfer * transfers
    }
}

/// Amount of RAM installed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum RamSize {
    /// Retail consoles
    #[default]
    #[serde(rename = "2MB")]
    Ram2MB,
    /// Development kits
    #[serde(rename = "8MB")]
    Ram8MB,
}

impl RamSize {
    pub fn bytes(self) -> usize {
        match self {
            RamSize::Ram2MB => RAM_SIZE_2MB,
            RamSize::Ram8MB => RAM_SIZE_8MB,
        }
    }
}

/// External memory region whose timings are configurable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Expansion1 = 2,
    Expansion3 = 3,
    Bios = 4,
    Spu = 5,
    CdRom = 6,
    Expansion2 = 7,
}

pub struct MemoryControl {
    /// Raw values of the 9 registers at 0x1f801000
    registers: [u32; 9],
    /// RAM size register at 0x1f801060
    ram_size_reg: u32,
    ram_size: RamSize,
}

impl MemoryControl {
    pub fn new(ram_size: RamSize) -> MemoryControl {
        MemoryControl {
            // Values set by the BIOS during boot
            registers: [
                EXPANSION_1_BASE,
                EXPANSION_2_BASE,
                0x0013_243f,
                0x0000_3022,
                0x0013_243f,
                0x2009_31e1,
                0x0002_0843,
                0x0007_0777,
                0x0003_1125,
            ],
            ram_size_reg: 0x0000_0b88,
            ram_size,
        }
    }

    pub fn load(&self, offset: u32) -> u32 {
        self.registers[(offset >> 2) as usize]
    }

    pub fn store(&mut self, offset: u32, val: u32) {
        let index = (offset >> 2) as usize;

        match index {
            0 if val != EXPANSION_1_BASE => {
                warn!("Unsupported expansion 1 base address 0x{:08x}", val);
            }
            1 if val != EXPANSION_2_BASE => {
                warn!("Unsupported expansion 2 base address 0x{:08x}", val);
            }
            _ => self.registers[index] = val,
        }
    }

    pub fn timing(&self, region: Region) -> MemoryTiming {
        MemoryTiming::from_u32(self.registers[region as usize])
    }

    pub fn common_delay(&self) -> u32 {
        self.registers[8]
    }

    /// Cycles taken by an access of `width` to `region`
    pub fn access_time(&self, region: Region, width: AccessWidth, write: bool) -> CycleCount {
        self.timing(region)
            .access_time(width, write, self.common_delay())
    }

    pub fn ram_size_reg(&self) -> u32 {
        self.ram_size_reg
    }

    pub fn set_ram_size_reg(&mut self, val: u32) {
        debug!("RAM_SIZE set to 0x{:08x}", val);
        self.ram_size_reg = val;
    }

    pub fn ram_size(&self) -> RamSize {
        self.ram_size
    }
}
