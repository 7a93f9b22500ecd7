//! Coprocessor 2 register files. Commands are decoded and logged but the
//! geometry engine itself isn't emulated.

pub struct Gte {
    data: [u32; 32],
    control: [u32; 32],
}

impl Gte {
    pub fn new() -> Gte {
        Gte {
            data: [0; 32],
            control: [0; 32],
        }
    }

    pub fn data(&self, reg: u32) -> u32 {
        self.data[(reg & 0x1f) as usize]
    }

    pub fn set_data(&mut self, reg: u32, val: u32) {
        self.data[(reg & 0x1f) as usize] = val;
    }

    pub fn control(&self, reg: u32) -> u32 {
        self.control[(reg & 0x1f) as usize]
    }

    pub fn set_control(&mut self, reg: u32, val: u32) {
        self.control[(reg & 0x1f) as usize] = val;
    }

    /// Execute a GTE command, `command` is the low 25 bits of the COP2
    /// instruction
    pub fn command(&mut self, command: u32) {
        debug!(
            "GTE command 0x{:02x} (0x{:07x}) not emulated",
            command & 0x3f,
            command
        );
    }
}
