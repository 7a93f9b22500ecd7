//! PSX Memory Map
//!
//! Segment masks, the physical region table used by the interconnect for
//! address decoding, and the handful of fixed addresses the CPU and the
//! debug hooks care about.

// ============================================================================
// Memory Segments
// ============================================================================

/// Mask for each 512MB segment, indexed by the top three address bits.
/// KSEG0 and KSEG1 are folded onto the physical range, KUSEG is already
/// physical and KSEG2 is passed through untouched.
const REGION_MASK: [u32; 8] = [
    // KUSEG: 2048MB
    0xffff_ffff,
    0xffff_ffff,
    0xffff_ffff,
    0xffff_ffff,
    // KSEG0: 512MB
    0x7fff_ffff,
    // KSEG1: 512MB
    0x1fff_ffff,
    // KSEG2: 1024MB
    0xffff_ffff,
    0xffff_ffff,
];

/// Collapse the kernel segment mirrors onto the physical address space
pub const fn mask_region(addr: u32) -> u32 {
    addr & REGION_MASK[(addr >> 29) as usize]
}

/// True if `addr` lives in a segment that goes through the instruction cache
pub const fn is_cached(addr: u32) -> bool {
    // KUSEG and KSEG0
    (addr >> 29) <= 4
}

// ============================================================================
// Region Table
// ============================================================================

/// A physical address range: base and length in bytes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Range(pub u32, pub u32);

impl Range {
    /// Return `Some(offset)` if `addr` is contained in `self`
    pub const fn contains(self, addr: u32) -> Option<u32> {
        let Range(start, length) = self;

        if addr >= start && addr - start < length {
            Some(addr - start)
        } else {
            None
        }
    }
}

/// Main RAM. The window is 8MB, actual storage is mirrored inside it.
pub const RAM: Range = Range(0x0000_0000, 8 * 1024 * 1024);
/// Expansion region 1, the parallel port. Nothing is ever connected.
pub const EXPANSION_1: Range = Range(0x1f00_0000, 8 * 1024 * 1024);
/// Data cache used as fast RAM
pub const SCRATCH_PAD: Range = Range(0x1f80_0000, 1024);
/// Expansion bases and access timings
pub const MEM_CONTROL: Range = Range(0x1f80_1000, 36);
pub const PAD_MEMCARD: Range = Range(0x1f80_1040, 16);
pub const SIO: Range = Range(0x1f80_1050, 16);
/// Register that the BIOS sets to configure the RAM size
pub const RAM_SIZE: Range = Range(0x1f80_1060, 4);
pub const IRQ_CONTROL: Range = Range(0x1f80_1070, 8);
pub const DMA: Range = Range(0x1f80_1080, 0x80);
pub const TIMERS: Range = Range(0x1f80_1100, 0x30);
pub const CDROM: Range = Range(0x1f80_1800, 4);
pub const GPU: Range = Range(0x1f80_1810, 8);
pub const MDEC: Range = Range(0x1f80_1820, 8);
pub const SPU: Range = Range(0x1f80_1c00, 640);
/// Expansion region 2, holds the debug UART on dev units
pub const EXPANSION_2: Range = Range(0x1f80_2000, 66);
pub const EXPANSION_3: Range = Range(0x1fa0_0000, 2 * 1024 * 1024);
pub const BIOS: Range = Range(0x1fc0_0000, 512 * 1024);
/// Cache control register, the only thing living in KSEG2
pub const CACHE_CONTROL: Range = Range(0xfffe_0130, 4);

// ============================================================================
// Sizes
// ============================================================================

pub const BIOS_SIZE: usize = 512 * 1024;
pub const SCRATCH_PAD_SIZE: usize = 1024;
pub const RAM_SIZE_2MB: usize = 2 * 1024 * 1024;
pub const RAM_SIZE_8MB: usize = 8 * 1024 * 1024;

/// Value RAM and scratchpad hold on power up
pub const MEMORY_FILL: u8 = 0xca;

// ============================================================================
// Fixed Addresses
// ============================================================================

/// The CPU starts executing the BIOS from here
pub const RESET_VECTOR: u32 = 0xbfc0_0000;
/// Exception handler in RAM (BEV = 0)
pub const EXCEPTION_VECTOR_RAM: u32 = 0x8000_0080;
/// Exception handler in ROM (BEV = 1)
pub const EXCEPTION_VECTOR_ROM: u32 = 0xbfc0_0180;
/// BIOS function tables
pub const BIOS_A_FUNCTIONS: u32 = 0x0000_00a0;
pub const BIOS_B_FUNCTIONS: u32 = 0x0000_00b0;
/// Where the BIOS jumps once the kernel is initialized and the shell is
/// about to start
pub const SHELL_ENTRY: u32 = 0x8003_0000;
