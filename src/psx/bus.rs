//! The interconnect: address decoding and access costs for every load and
//! store made by the CPU and the DMA.

use super::memory_control::Region;
use super::memory_map::{self, mask_region, Range};
use super::{cache, dma, gpu, timers, AccessWidth, Addressable, CycleCount, Psx};
use crate::error::{PsxError, Result};

/// Cycles taken by a CPU load from main RAM
const RAM_LOAD_CYCLES: CycleCount = 5;
/// RAM stores go through the write queue
const RAM_STORE_CYCLES: CycleCount = 1;
/// Memory mapped peripheral registers
const DEVICE_ACCESS_CYCLES: CycleCount = 2;

/// A register block that isn't emulated. Loads return `default` and stores
/// are ignored; both are logged.
struct Stub {
    range: Range,
    name: &'static str,
    default: u32,
    /// Region whose delay register gives the access time, if any
    timing: Option<Region>,
}

static STUBS: [Stub; 9] = [
    Stub {
        range: memory_map::EXPANSION_1,
        name: "expansion 1",
        // Nothing connected, the bus floats high
        default: !0,
        timing: Some(Region::Expansion1),
    },
    Stub {
        range: memory_map::PAD_MEMCARD,
        name: "pad/memory card",
        default: 0,
        timing: None,
    },
    Stub {
        range: memory_map::SIO,
        name: "serial port",
        default: 0,
        timing: None,
    },
    Stub {
        range: memory_map::CDROM,
        name: "CD-ROM",
        default: 0,
        timing: Some(Region::CdRom),
    },
    Stub {
        range: memory_map::MDEC,
        name: "MDEC",
        default: 0,
        timing: None,
    },
    Stub {
        range: memory_map::SPU,
        name: "SPU",
        default: 0,
        timing: Some(Region::Spu),
    },
    Stub {
        range: memory_map::EXPANSION_2,
        name: "expansion 2",
        default: !0,
        timing: Some(Region::Expansion2),
    },
    Stub {
        range: memory_map::EXPANSION_3,
        name: "expansion 3",
        default: !0,
        timing: Some(Region::Expansion3),
    },
    Stub {
        range: memory_map::BIOS,
        name: "BIOS",
        default: 0,
        timing: Some(Region::Bios),
    },
];

fn check_alignment<T: Addressable>(addr: u32) -> Result<()> {
    let width = T::width();

    if addr % width.bytes() == 0 {
        Ok(())
    } else {
        Err(PsxError::UnalignedAccess { addr, width })
    }
}

/// Extract the part of the 32bit register `reg` addressed by a narrow load
/// at `offset`
fn narrow_load<T: Addressable>(reg: u32, offset: u32) -> T {
    T::from_u32(reg >> ((offset & 3) * 8))
}

/// Register blocks are word oriented: place a narrow store at its position
/// in the word
fn widen_store<T: Addressable>(offset: u32, val: T) -> (u32, u32) {
    let shift = (offset & 3) * 8;

    (offset & !3, val.as_u32() << shift)
}

impl Psx {
    /// Load a value of type `T` from `addr`. The access cost is charged to
    /// the cycle counter.
    pub fn load<T: Addressable>(&mut self, addr: u32) -> Result<T> {
        check_alignment::<T>(addr)?;

        let abs_addr = mask_region(addr);

        if let Some(offset) = memory_map::RAM.contains(abs_addr) {
            self.tick(RAM_LOAD_CYCLES);
            return Ok(self.ram.load(offset));
        }

        if let Some(offset) = memory_map::SCRATCH_PAD.contains(abs_addr) {
            return Ok(self.scratch_pad.load(offset));
        }

        if let Some(offset) = memory_map::BIOS.contains(abs_addr) {
            let cycles = self.mem_control.access_time(Region::Bios, T::width(), false);
            self.tick(cycles);
            return Ok(self.bios.load(offset));
        }

        let device = if let Some(offset) = memory_map::IRQ_CONTROL.contains(abs_addr) {
            Some((offset, self.irq.load(offset & !3)))
        } else if let Some(offset) = memory_map::DMA.contains(abs_addr) {
            Some((offset, dma::load(self, offset & !3)))
        } else if let Some(offset) = memory_map::TIMERS.contains(abs_addr) {
            Some((offset, timers::load(self, offset & !3)))
        } else if let Some(offset) = memory_map::GPU.contains(abs_addr) {
            Some((offset, gpu::load(self, offset & !3)))
        } else if let Some(offset) = memory_map::MEM_CONTROL.contains(abs_addr) {
            Some((offset, self.mem_control.load(offset & !3)))
        } else if let Some(offset) = memory_map::RAM_SIZE.contains(abs_addr) {
            Some((offset, self.mem_control.ram_size_reg()))
        } else if let Some(offset) = memory_map::CACHE_CONTROL.contains(abs_addr) {
            Some((offset, self.cache_control.to_u32()))
        } else {
            None
        };

        if let Some((offset, reg)) = device {
            self.tick(DEVICE_ACCESS_CYCLES);
            return Ok(narrow_load(reg, offset));
        }

        if let Some((stub, offset)) = find_stub(abs_addr) {
            self.tick(self.stub_access_time::<T>(stub, false));
            debug!(
                "Unhandled {:?} load from {} register +0x{:x}",
                T::width(),
                stub.name,
                offset
            );
            return Ok(T::from_u32(stub.default));
        }

        Err(PsxError::UnhandledLoad {
            addr,
            width: T::width(),
        })
    }

    /// Store `val` at `addr`. The access cost is charged before any side
    /// effect of the store (DMA transfers in particular) takes place.
    pub fn store<T: Addressable>(&mut self, addr: u32, val: T) -> Result<()> {
        check_alignment::<T>(addr)?;

        let abs_addr = mask_region(addr);

        if let Some(offset) = memory_map::RAM.contains(abs_addr) {
            self.tick(RAM_STORE_CYCLES);
            self.ram.store(offset, val);
            return Ok(());
        }

        if let Some(offset) = memory_map::SCRATCH_PAD.contains(abs_addr) {
            self.scratch_pad.store(offset, val);
            return Ok(());
        }

        if let Some(offset) = memory_map::IRQ_CONTROL.contains(abs_addr) {
            self.tick(DEVICE_ACCESS_CYCLES);
            let (offset, v) = widen_store(offset, val);
            self.irq.store(offset, v);
            return Ok(());
        }

        if let Some(offset) = memory_map::DMA.contains(abs_addr) {
            self.tick(DEVICE_ACCESS_CYCLES);
            let (offset, v) = widen_store(offset, val);
            return dma::store(self, offset, v);
        }

        if let Some(offset) = memory_map::TIMERS.contains(abs_addr) {
            self.tick(DEVICE_ACCESS_CYCLES);
            let (offset, v) = widen_store(offset, val);
            timers::store(self, offset, v);
            return Ok(());
        }

        if let Some(offset) = memory_map::GPU.contains(abs_addr) {
            self.tick(DEVICE_ACCESS_CYCLES);
            let (offset, v) = widen_store(offset, val);
            gpu::store(self, offset, v);
            return Ok(());
        }

        if let Some(offset) = memory_map::MEM_CONTROL.contains(abs_addr) {
            self.tick(DEVICE_ACCESS_CYCLES);
            let (offset, v) = widen_store(offset, val);
            self.mem_control.store(offset, v);
            return Ok(());
        }

        if memory_map::RAM_SIZE.contains(abs_addr).is_some() {
            self.tick(DEVICE_ACCESS_CYCLES);
            self.mem_control.set_ram_size_reg(val.as_u32());
            return Ok(());
        }

        if memory_map::CACHE_CONTROL.contains(abs_addr).is_some() {
            self.tick(DEVICE_ACCESS_CYCLES);
            self.cache_control = cache::CacheControl::from_u32(val.as_u32());
            return Ok(());
        }

        if let Some((stub, offset)) = find_stub(abs_addr) {
            self.tick(self.stub_access_time::<T>(stub, true));
            debug!(
                "Unhandled {:?} store to {} register +0x{:x}: 0x{:x}",
                T::width(),
                stub.name,
                offset,
                val.as_u32()
            );
            return Ok(());
        }

        Err(PsxError::UnhandledStore {
            addr,
            width: T::width(),
            value: val.as_u32(),
        })
    }

    /// Raw word read used to refill the instruction cache. No cycles are
    /// charged, the cache accounts for the refill itself.
    pub(crate) fn fetch_word(&self, addr: u32) -> Result<u32> {
        let abs_addr = mask_region(addr);

        if let Some(offset) = memory_map::RAM.contains(abs_addr) {
            return Ok(self.ram.load(offset));
        }

        if let Some(offset) = memory_map::BIOS.contains(abs_addr) {
            return Ok(self.bios.load(offset));
        }

        Err(PsxError::UnhandledLoad {
            addr,
            width: AccessWidth::Word,
        })
    }

    fn stub_access_time<T: Addressable>(&self, stub: &Stub, write: bool) -> CycleCount {
        match stub.timing {
            Some(region) => self.mem_control.access_time(region, T::width(), write),
            None => DEVICE_ACCESS_CYCLES,
        }
    }
}

fn find_stub(abs_addr: u32) -> Option<(&'static Stub, u32)> {
    STUBS
        .iter()
        .find_map(|stub| stub.range.contains(abs_addr).map(|offset| (stub, offset)))
}
