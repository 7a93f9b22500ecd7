// Machine level tests: small programs assembled with `asm` and run out of RAM

#[cfg(test)]
mod asm;


#[cfg(test)]
mod cpu_tests;


#[cfg(test)]
mod hook_tests;


use crate::psx::bios::Bios;
use crate::{Config, Psx};

/// Where the test programs are loaded
pub const PROGRAM_BASE: u32 = 0x8000_1000;

/// Scratch data area used by the programs
pub const DATA_BASE: u32 = 0x8000_2000;

/// Address of the general exception handler with BEV cleared
pub const EXCEPTION_HANDLER: u32 = 0x8000_0080;

pub fn test_psx() -> Psx {
    Psx::new(Bios::new_dummy(), &Config::default()).unwrap()
}

/// Copy `program` to PROGRAM_BASE and point the CPU at it
pub fn load_program(psx: &mut Psx, program: &[u32]) {
    for (i, &word) in program.iter().enumerate() {
        let offset = (PROGRAM_BASE & 0x1f_ffff) + (i as u32) * 4;
        psx.ram.store(offset, word);
    }

    psx.cpu.force_pc(PROGRAM_BASE);
}

/// Store `words` in RAM at `addr`, mirrored like the CPU sees it
pub fn poke(psx: &mut Psx, addr: u32, words: &[u32]) {
    for (i, &word) in words.iter().enumerate() {
        psx.ram.store((addr & 0x7f_ffff) + (i as u32) * 4, word);
    }
}

pub fn peek(psx: &Psx, addr: u32) -> u32 {
    psx.ram.load(addr & 0x7f_ffff)
}

pub fn step(psx: &mut Psx, instructions: usize) {
    for _ in 0..instructions {
        psx.run_next_instruction().unwrap();
    }
}

/// Exception code in the CAUSE register
pub fn exception_code(psx: &Psx) -> u32 {
    (psx.cop0.cause(false) >> 2) & 0x1f
}
