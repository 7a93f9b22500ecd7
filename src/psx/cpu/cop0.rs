//! Coprocessor 0: system control. Only the exception handling registers are
//! emulated, the PSX has no MMU.

use crate::psx::memory_map::{EXCEPTION_VECTOR_RAM, EXCEPTION_VECTOR_ROM};

/// Exception types, the value is the code stored in the CAUSE register
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Exception {
    /// Interrupt request
    Interrupt = 0x0,
    /// Address error on load or instruction fetch
    LoadAddressError = 0x4,
    /// Address error on store
    StoreAddressError = 0x5,
    /// System call (caused by the SYSCALL opcode)
    SysCall = 0x8,
    /// Breakpoint (caused by the BREAK opcode)
    Break = 0x9,
    /// CPU encountered an unknown instruction
    IllegalInstruction = 0xa,
    /// Unsupported or disabled coprocessor
    CoprocessorError = 0xb,
    /// Arithmetic overflow
    Overflow = 0xc,
}

/// Isolate cache bit in the status register
const SR_ISOLATE_CACHE: u32 = 1 << 16;
/// Boot exception vectors: use the handler in ROM
const SR_BEV: u32 = 1 << 22;
/// Coprocessor 2 usable
const SR_CU2: u32 = 1 << 30;

pub struct Cop0 {
    /// Status register
    sr: u32,
    /// Cause register, without the hardware interrupt bit which is computed
    /// from the interrupt controller
    cause: u32,
    /// Exception PC
    epc: u32,
    /// Address that caused the last address error
    bad_vaddr: u32,
}

impl Cop0 {
    pub fn new() -> Cop0 {
        Cop0 {
            sr: 0,
            cause: 0,
            epc: 0,
            bad_vaddr: 0,
        }
    }

    pub fn sr(&self) -> u32 {
        self.sr
    }

    pub fn epc(&self) -> u32 {
        self.epc
    }

    /// CAUSE with bit 10 reflecting the state of the interrupt controller
    pub fn cause(&self, irq_active: bool) -> u32 {
        self.cause | (u32::from(irq_active) << 10)
    }

    pub fn cache_isolated(&self) -> bool {
        self.sr & SR_ISOLATE_CACHE != 0
    }

    pub fn cop2_enabled(&self) -> bool {
        self.sr & SR_CU2 != 0
    }

    /// True if the CPU must take an interrupt exception
    pub fn irq_pending(&self, irq_active: bool) -> bool {
        let cause = self.cause(irq_active);

        // Bits [8:9] are the software interrupts, bit 10 the hardware one
        (self.sr & 1 != 0) && (self.sr & cause & 0x700 != 0)
    }

    pub fn set_bad_vaddr(&mut self, addr: u32) {
        self.bad_vaddr = addr;
    }

    /// MTC0
    pub fn mtc0(&mut self, reg: u32, val: u32) {
        match reg {
            // Breakpoint registers
            3 | 5 | 6 | 7 | 9 | 11 => {
                if val != 0 {
                    warn!("Unhandled write to cop0r{}: 0x{:08x}", reg, val);
                }
            }
            12 => self.sr = val,
            // Only the software interrupt bits are writeable
            13 => self.cause = (self.cause & !0x300) | (val & 0x300),
            _ => warn!("Unhandled cop0 register {}: 0x{:08x}", reg, val),
        }
    }

    /// MFC0. `irq_active` is the state of the interrupt controller.
    pub fn mfc0(&self, reg: u32, irq_active: bool) -> u32 {
        match reg {
            6 | 7 => {
                debug!("Unhandled read from cop0r{}", reg);
                0
            }
            8 => self.bad_vaddr,
            12 => self.sr,
            13 => self.cause(irq_active),
            14 => self.epc,
            // Processor ID
            15 => 2,
            _ => {
                warn!("Unhandled read from cop0r{}", reg);
                0
            }
        }
    }

    /// Update the registers to enter an exception and return the address of
    /// the handler. `current_pc` is the address of the instruction that
    /// caused the exception.
    pub fn enter_exception(&mut self, cause: Exception, current_pc: u32, delay_slot: bool) -> u32 {
        // Shift the interrupt enable/user mode stack
        let mode = self.sr & 0x3f;
        self.sr &= !0x3f;
        self.sr |= (mode << 2) & 0x3f;

        self.cause &= !0x7c;
        self.cause |= (cause as u32) << 2;

        if delay_slot {
            // EPC points at the branch so that it's re-executed when
            // returning from the handler
            self.epc = current_pc.wrapping_sub(4);
            self.cause |= 1 << 31;
        } else {
            self.epc = current_pc;
            self.cause &= !(1 << 31);
        }

        if self.sr & SR_BEV != 0 {
            EXCEPTION_VECTOR_ROM
        } else {
            EXCEPTION_VECTOR_RAM
        }
    }

    /// RFE: pop the interrupt enable/user mode stack
    pub fn return_from_exception(&mut self) {
        let mode = self.sr & 0x3f;
        self.sr &= !0xf;
        self.sr |= mode >> 2;
    }
}
