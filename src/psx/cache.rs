//! R3000A instruction cache and the cache control register.
//!
//! The I-cache is 4KB direct mapped: 256 lines of 4 words. On a miss the
//! line is refilled from the missing word up to the end of the line, so each
//! line also tracks the index of its first valid word.

use super::memory_map::{self, mask_region};
use super::{CycleCount, Psx};
use crate::error::Result;

/// Fixed cost of an instruction cache refill
const ICACHE_REFILL_CYCLES: CycleCount = 3;

/// Cache control register at 0xfffe0130
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheControl(u32);

impl CacheControl {
    pub fn new() -> CacheControl {
        CacheControl(0)
    }

    pub fn from_u32(value: u32) -> CacheControl {
        CacheControl(value)
    }

    pub fn to_u32(self) -> u32 {
        self.0
    }

    /// Isolated stores invalidate whole lines instead of writing data
    pub fn tag_test_mode(self) -> bool {
        self.0 & (1 << 2) != 0
    }

    pub fn icache_enabled(self) -> bool {
        self.0 & (1 << 11) != 0
    }
}

/// Instruction cache line
#[derive(Clone, Copy)]
struct CacheLine {
    /// Tag in bits [30:12], index of the first valid word in bits [4:2]. A
    /// value of 4 in the index means the whole line is invalid.
    tag_valid: u32,
    words: [u32; 4],
}

impl CacheLine {
    fn new() -> CacheLine {
        CacheLine {
            tag_valid: 0x10,
            // BREAK instructions, in case something bypasses the valid bits
            words: [0x00ba_d0cd; 4],
        }
    }

    fn tag(&self) -> u32 {
        self.tag_valid & 0x7fff_f000
    }

    fn valid_index(&self) -> u32 {
        (self.tag_valid >> 2) & 0x7
    }

    /// Mark the line as holding the words from `pc` to the end of the line
    fn set_tag_valid(&mut self, pc: u32) {
        self.tag_valid = pc & 0x7fff_f00c;
    }

    fn invalidate(&mut self) {
        self.tag_valid |= 0x10;
    }
}

pub struct InstructionCache {
    lines: Vec<CacheLine>,
}

impl InstructionCache {
    pub fn new() -> InstructionCache {
        InstructionCache {
            lines: vec![CacheLine::new(); 256],
        }
    }

    fn line_mut(&mut self, addr: u32) -> &mut CacheLine {
        &mut self.lines[((addr >> 4) & 0xff) as usize]
    }

    pub fn invalidate_all(&mut self) {
        for line in &mut self.lines {
            line.invalidate();
        }

        debug!("Instruction cache invalidated");
    }
}

/// Fetch the instruction at `pc`, going through the instruction cache when
/// it's enabled and `pc` is in a cached segment.
pub fn fetch_instruction(psx: &mut Psx, pc: u32) -> Result<u32> {
    if !memory_map::is_cached(pc) || !psx.cache_control.icache_enabled() {
        return psx.load::<u32>(pc);
    }

    let tag = pc & 0x7fff_f000;
    let index = (pc >> 2) & 3;

    let line = psx.icache.line_mut(pc);
    if line.tag() == tag && line.valid_index() <= index {
        return Ok(line.words[index as usize]);
    }

    // Miss: refill from `pc` to the end of the line
    let mut cycles = ICACHE_REFILL_CYCLES;
    let mut words = [0; 4];
    let mut addr = pc;

    for word in words.iter_mut().skip(index as usize) {
        *word = psx.fetch_word(addr)?;
        addr = addr.wrapping_add(4);
        cycles += 1;
    }

    psx.tick(cycles);

    let line = psx.icache.line_mut(pc);
    for i in index as usize..4 {
        line.words[i] = words[i];
    }
    line.set_tag_valid(pc);

    Ok(line.words[index as usize])
}

/// Handle a CPU store while the cache is isolated from memory. Nothing
/// reaches the bus.
pub fn isolated_store(psx: &mut Psx, addr: u32, val: u32) {
    let tag_test = psx.cache_control.tag_test_mode();
    let line = psx.icache.line_mut(addr);

    if tag_test {
        line.invalidate();
    } else {
        let index = ((addr >> 2) & 3) as usize;
        line.words[index] = val;
    }

    trace!(
        "Isolated store 0x{:08x} to 0x{:08x} (physical 0x{:08x})",
        val,
        addr,
        mask_region(addr)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_valid_index() {
        let mut line = CacheLine::new();

        assert_eq!(line.valid_index(), 4);

        line.set_tag_valid(0x8001_2348);
        assert_eq!(line.tag(), 0x0001_2000);
        assert_eq!(line.valid_index(), 2);

        line.invalidate();
        assert!(line.valid_index() > 3);
    }

    #[test]
    fn control_bits() {
        let ctrl = CacheControl::from_u32(0x0001_e988);

        assert!(ctrl.icache_enabled());
        assert!(!ctrl.tag_test_mode());
        assert_eq!(ctrl.to_u32(), 0x0001_e988);

        assert!(CacheControl::from_u32(0x804).tag_test_mode());
        assert!(!CacheControl::new().icache_enabled());
    }
}
