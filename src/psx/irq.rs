//! Interrupt controller

/// Interrupt sources, the value is the bit index in the status and mask
/// registers
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Interrupt {
    /// Display in vertical blanking
    VBlank = 0,
    /// Interrupt command from GP0 0x1f
    Gpu = 1,
    CdRom = 2,
    /// DMA transfer done
    Dma = 3,
    Timer0 = 4,
    Timer1 = 5,
    Timer2 = 6,
    /// Gamepad and memory card controller
    PadMemCard = 7,
    Sio = 8,
    Spu = 9,
    Lightpen = 10,
}

pub struct InterruptState {
    /// Interrupt status
    status: u16,
    /// Interrupt mask
    mask: u16,
}

impl InterruptState {
    pub fn new() -> InterruptState {
        InterruptState { status: 0, mask: 0 }
    }

    /// True if at least one interrupt is asserted and not masked
    pub fn active(&self) -> bool {
        (self.status & self.mask) != 0
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Acknowledge interrupts: every bit cleared in `ack` is cleared in the
    /// status register
    pub fn ack(&mut self, ack: u16) {
        self.status &= ack;
    }

    pub fn mask(&self) -> u16 {
        self.mask
    }

    pub fn set_mask(&mut self, mask: u16) {
        // Catch software relying on sources that are never raised
        let supported = [
            Interrupt::VBlank,
            Interrupt::Gpu,
            Interrupt::Dma,
            Interrupt::Timer0,
            Interrupt::Timer1,
            Interrupt::Timer2,
        ];

        let unsupported = supported
            .iter()
            .fold(mask, |m, &it| m & !(1 << it as u16));

        if unsupported != 0 {
            warn!("Unsupported interrupt(s) unmasked: {:04x}", unsupported);
        }

        self.mask = mask;
    }

    /// Trigger the interrupt `which`, must be called on the rising edge of
    /// the interrupt signal
    pub fn trigger(&mut self, which: Interrupt) {
        self.status |= 1 << (which as u16);
    }

    /// Register block read, `offset` is word aligned
    pub fn load(&self, offset: u32) -> u32 {
        match offset {
            0 => u32::from(self.status),
            4 => u32::from(self.mask),
            _ => {
                warn!("Unhandled IRQ load at offset 0x{:x}", offset);
                0
            }
        }
    }

    pub fn store(&mut self, offset: u32, val: u32) {
        match offset {
            0 => self.ack(val as u16),
            4 => self.set_mask(val as u16),
            _ => warn!("Unhandled IRQ store at offset 0x{:x}: 0x{:x}", offset, val),
        }
    }
}
