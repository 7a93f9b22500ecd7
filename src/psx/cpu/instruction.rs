use std::fmt;

/// Index of a general purpose register
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RegisterIndex(pub u32);

impl RegisterIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Raw instruction word
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Instruction(pub u32);

impl Instruction {
    /// Primary opcode in bits [31:26]
    pub fn function(self) -> u32 {
        self.0 >> 26
    }

    /// Secondary opcode of the 0x00 family in bits [5:0]
    pub fn subfunction(self) -> u32 {
        self.0 & 0x3f
    }

    /// Register index in bits [25:21]
    pub fn s(self) -> RegisterIndex {
        RegisterIndex((self.0 >> 21) & 0x1f)
    }

    /// Register index in bits [20:16]
    pub fn t(self) -> RegisterIndex {
        RegisterIndex((self.0 >> 16) & 0x1f)
    }

    /// Register index in bits [15:11]
    pub fn d(self) -> RegisterIndex {
        RegisterIndex((self.0 >> 11) & 0x1f)
    }

    /// Immediate value in bits [16:0]
    pub fn imm(self) -> u32 {
        self.0 & 0xffff
    }

    /// Immediate value in bits [16:0] as a sign-extended 32bit value
    pub fn imm_se(self) -> u32 {
        (self.0 & 0xffff) as i16 as u32
    }

    /// Shift immediate value in bits [10:6]
    pub fn shift(self) -> u32 {
        (self.0 >> 6) & 0x1f
    }

    /// Jump target stored in bits [25:0]
    pub fn imm_jump(self) -> u32 {
        self.0 & 0x3ff_ffff
    }

    /// Coprocessor opcode in bits [25:21]
    pub fn cop_opcode(self) -> u32 {
        (self.0 >> 21) & 0x1f
    }

    /// Decode the three levels of opcode fields
    pub fn decode(self) -> Opcode {
        match self.function() {
            0x00 => match self.subfunction() {
                0x00 => Opcode::Sll,
                0x02 => Opcode::Srl,
                0x03 => Opcode::Sra,
                0x04 => Opcode::Sllv,
                0x06 => Opcode::Srlv,
                0x07 => Opcode::Srav,
                0x08 => Opcode::Jr,
                0x09 => Opcode::Jalr,
                0x0c => Opcode::Syscall,
                0x0d => Opcode::Break,
                0x10 => Opcode::Mfhi,
                0x11 => Opcode::Mthi,
                0x12 => Opcode::Mflo,
                0x13 => Opcode::Mtlo,
                0x18 => Opcode::Mult,
                0x19 => Opcode::Multu,
                0x1a => Opcode::Div,
                0x1b => Opcode::Divu,
                0x20 => Opcode::Add,
                0x21 => Opcode::Addu,
                0x22 => Opcode::Sub,
                0x23 => Opcode::Subu,
                0x24 => Opcode::And,
                0x25 => Opcode::Or,
                0x26 => Opcode::Xor,
                0x27 => Opcode::Nor,
                0x2a => Opcode::Slt,
                0x2b => Opcode::Sltu,
                _ => Opcode::Illegal,
            },
            0x01 => Opcode::Bxx,
            0x02 => Opcode::J,
            0x03 => Opcode::Jal,
            0x04 => Opcode::Beq,
            0x05 => Opcode::Bne,
            0x06 => Opcode::Blez,
            0x07 => Opcode::Bgtz,
            0x08 => Opcode::Addi,
            0x09 => Opcode::Addiu,
            0x0a => Opcode::Slti,
            0x0b => Opcode::Sltiu,
            0x0c => Opcode::Andi,
            0x0d => Opcode::Ori,
            0x0e => Opcode::Xori,
            0x0f => Opcode::Lui,
            0x10 => match self.cop_opcode() {
                0x00 => Opcode::Mfc0,
                0x04 => Opcode::Mtc0,
                0x10 if self.subfunction() == 0x10 => Opcode::Rfe,
                _ => Opcode::Illegal,
            },
            0x12 => match self.cop_opcode() {
                0x00 => Opcode::Mfc2,
                0x02 => Opcode::Cfc2,
                0x04 => Opcode::Mtc2,
                0x06 => Opcode::Ctc2,
                n if n & 0x10 != 0 => Opcode::GteCommand,
                _ => Opcode::Illegal,
            },
            0x11 | 0x13 => Opcode::CopUnusable,
            0x20 => Opcode::Lb,
            0x21 => Opcode::Lh,
            0x22 => Opcode::Lwl,
            0x23 => Opcode::Lw,
            0x24 => Opcode::Lbu,
            0x25 => Opcode::Lhu,
            0x26 => Opcode::Lwr,
            0x28 => Opcode::Sb,
            0x29 => Opcode::Sh,
            0x2a => Opcode::Swl,
            0x2b => Opcode::Sw,
            0x2e => Opcode::Swr,
            0x32 => Opcode::Lwc2,
            0x3a => Opcode::Swc2,
            // LWC0, LWC1, LWC3, SWC0, SWC1, SWC3
            0x30 | 0x31 | 0x33 | 0x38 | 0x39 | 0x3b => Opcode::CopUnusable,
            _ => Opcode::Illegal,
        }
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:08x} ({:?})", self.0, self.decode())
    }
}

/// Every operation the CPU knows about
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Opcode {
    Sll,
    Srl,
    Sra,
    Sllv,
    Srlv,
    Srav,
    Jr,
    Jalr,
    Syscall,
    Break,
    Mfhi,
    Mthi,
    Mflo,
    Mtlo,
    Mult,
    Multu,
    Div,
    Divu,
    Add,
    Addu,
    Sub,
    Subu,
    And,
    Or,
    Xor,
    Nor,
    Slt,
    Sltu,
    /// BLTZ, BGEZ, BLTZAL and BGEZAL
    Bxx,
    J,
    Jal,
    Beq,
    Bne,
    Blez,
    Bgtz,
    Addi,
    Addiu,
    Slti,
    Sltiu,
    Andi,
    Ori,
    Xori,
    Lui,
    Mfc0,
    Mtc0,
    Rfe,
    Mfc2,
    Cfc2,
    Mtc2,
    Ctc2,
    GteCommand,
    Lb,
    Lh,
    Lwl,
    Lw,
    Lbu,
    Lhu,
    Lwr,
    Sb,
    Sh,
    Swl,
    Sw,
    Swr,
    Lwc2,
    Swc2,
    /// Access to coprocessors 1 and 3, which don't exist
    CopUnusable,
    Illegal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields() {
        // addiu $8, $9, -4
        let i = Instruction(0x2528_fffc);

        assert_eq!(i.function(), 0x09);
        assert_eq!(i.s(), RegisterIndex(9));
        assert_eq!(i.t(), RegisterIndex(8));
        assert_eq!(i.imm(), 0xfffc);
        assert_eq!(i.imm_se(), 0xffff_fffc);
        assert_eq!(i.decode(), Opcode::Addiu);
    }

    #[test]
    fn three_level_decode() {
        // sra $2, $3, 4
        assert_eq!(Instruction(0x0003_1103).decode(), Opcode::Sra);
        // mfc0 $12, $12 (sr)
        assert_eq!(Instruction(0x400c_6000).decode(), Opcode::Mfc0);
        // rfe
        assert_eq!(Instruction(0x4200_0010).decode(), Opcode::Rfe);
        // cop0 0x10 with a bad subfunction
        assert_eq!(Instruction(0x4200_0011).decode(), Opcode::Illegal);
        // GTE RTPS
        assert_eq!(Instruction(0x4a18_0001).decode(), Opcode::GteCommand);
        assert_eq!(Instruction(0x4400_0000).decode(), Opcode::CopUnusable);
        // Unused subfunction 0x01
        assert_eq!(Instruction(0x0000_0001).decode(), Opcode::Illegal);
        // Unused primary opcode 0x3f
        assert_eq!(Instruction(0xfc00_0000).decode(), Opcode::Illegal);
    }
}
