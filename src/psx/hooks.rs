//! Hooks run before every instruction fetch. They're debugging helpers and
//! are only installed on request.

use super::exe::Exe;
use super::memory_map::{BIOS_A_FUNCTIONS, BIOS_B_FUNCTIONS, SHELL_ENTRY};
use super::Psx;
use crate::error::Result;

pub trait PcHook {
    fn on_pc(&mut self, psx: &mut Psx) -> Result<()>;
}

/// Echo the characters the BIOS prints through its putchar functions
/// (A(0x3c) and B(0x3d)) to the log, one line at a time
pub struct BiosTty {
    line: String,
    /// Every completed line, kept for the front end and the tests
    output: String,
}

impl BiosTty {
    pub fn new() -> BiosTty {
        BiosTty {
            line: String::new(),
            output: String::new(),
        }
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    fn putchar(&mut self, c: char) {
        if c == '\n' {
            info!("TTY: {}", self.line);
            self.output.push_str(&self.line);
            self.output.push('\n');
            self.line.clear();
        } else {
            self.line.push(c);
        }
    }
}

impl PcHook for BiosTty {
    fn on_pc(&mut self, psx: &mut Psx) -> Result<()> {
        let pc = psx.cpu.pc() & 0x1fff_ffff;
        let function = psx.cpu.reg(9);

        let putchar = (pc == BIOS_A_FUNCTIONS && function == 0x3c)
            || (pc == BIOS_B_FUNCTIONS && function == 0x3d);

        if putchar {
            let c = psx.cpu.reg(4) as u8;

            self.putchar(char::from(c));
        }

        Ok(())
    }
}

/// Replace the BIOS shell with an executable
pub struct ExeSideLoader {
    exe: Option<Exe>,
}

impl ExeSideLoader {
    pub fn new(exe: Exe) -> ExeSideLoader {
        ExeSideLoader { exe: Some(exe) }
    }

    /// True once the executable has been loaded
    pub fn done(&self) -> bool {
        self.exe.is_none()
    }
}

impl PcHook for ExeSideLoader {
    fn on_pc(&mut self, psx: &mut Psx) -> Result<()> {
        if psx.cpu.pc() != SHELL_ENTRY {
            return Ok(());
        }

        let exe = match self.exe.take() {
            Some(e) => e,
            None => return Ok(()),
        };

        info!(
            "Side-loading executable: {} bytes at 0x{:08x}, entry 0x{:08x}",
            exe.text().len(),
            exe.load_addr(),
            exe.pc()
        );

        let offset = exe.load_addr() & psx.ram.offset_mask();

        psx.ram.write_bytes(offset, exe.text());

        // Whatever the cache held is stale now
        psx.icache.invalidate_all();

        psx.cpu.set_reg(28, exe.gp());

        if let Some(sp) = exe.stack() {
            psx.cpu.set_reg(29, sp);
            psx.cpu.set_reg(30, sp);
        }

        psx.cpu.force_pc(exe.pc());

        Ok(())
    }
}
