//! Main RAM and the scratchpad

use super::memory_control::RamSize;
use super::memory_map::{MEMORY_FILL, SCRATCH_PAD_SIZE};
use super::Addressable;
use crate::box_array::BoxArray;

/// Main RAM. Only `ram_size` bytes are installed, the rest of the 8MB window
/// mirrors them.
pub struct Ram {
    data: Box<[u8]>,
    mask: u32,
}

impl Ram {
    pub fn new(size: RamSize) -> Ram {
        let len = size.bytes();

        Ram {
            data: vec![MEMORY_FILL; len].into_boxed_slice(),
            mask: (len - 1) as u32,
        }
    }

    /// Fetch the little endian value at `offset`. `offset` is relative to the
    /// start of the RAM window and gets mirrored.
    pub fn load<T: Addressable>(&self, offset: u32) -> T {
        let offset = (offset & self.mask) as usize;

        T::load(&self.data[offset..])
    }

    /// Store the 32bit little endian word `val` into `offset`
    pub fn store<T: Addressable>(&mut self, offset: u32, val: T) {
        let offset = (offset & self.mask) as usize;

        val.store(&mut self.data[offset..]);
    }

    /// Copy `bytes` starting at `offset`, wrapping around the mirror
    pub fn write_bytes(&mut self, offset: u32, bytes: &[u8]) {
        for (i, &b) in bytes.iter().enumerate() {
            let o = (offset.wrapping_add(i as u32) & self.mask) as usize;

            self.data[o] = b;
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Mask wrapping an offset around the installed RAM
    pub fn offset_mask(&self) -> u32 {
        self.mask
    }
}

/// Data cache used as fast, uncached RAM
pub struct ScratchPad {
    data: BoxArray<u8, SCRATCH_PAD_SIZE>,
}

impl ScratchPad {
    pub fn new() -> ScratchPad {
        ScratchPad {
            data: BoxArray::from_elem(MEMORY_FILL),
        }
    }

    pub fn load<T: Addressable>(&self, offset: u32) -> T {
        let offset = (offset as usize) & (SCRATCH_PAD_SIZE - 1);

        T::load(&self.data[offset..])
    }

    pub fn store<T: Addressable>(&mut self, offset: u32, val: T) {
        let offset = (offset as usize) & (SCRATCH_PAD_SIZE - 1);

        val.store(&mut self.data[offset..]);
    }
}
