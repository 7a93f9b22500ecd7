//! Tiny MIPS encoder for the test programs. Register arguments are indices,
//! immediates are raw 16bit values.

fn r_type(s: u32, t: u32, d: u32, shift: u32, function: u32) -> u32 {
    (s << 21) | (t << 16) | (d << 11) | (shift << 6) | function
}

fn i_type(op: u32, s: u32, t: u32, imm: i16) -> u32 {
    (op << 26) | (s << 21) | (t << 16) | u32::from(imm as u16)
}

pub fn nop() -> u32 {
    0
}

pub fn sll(d: u32, t: u32, shift: u32) -> u32 {
    r_type(0, t, d, shift, 0x00)
}

pub fn jr(s: u32) -> u32 {
    r_type(s, 0, 0, 0, 0x08)
}

pub fn syscall() -> u32 {
    0x0000_000c
}

pub fn mfhi(d: u32) -> u32 {
    r_type(0, 0, d, 0, 0x10)
}

pub fn mflo(d: u32) -> u32 {
    r_type(0, 0, d, 0, 0x12)
}

pub fn mult(s: u32, t: u32) -> u32 {
    r_type(s, t, 0, 0, 0x18)
}

pub fn multu(s: u32, t: u32) -> u32 {
    r_type(s, t, 0, 0, 0x19)
}

pub fn div(s: u32, t: u32) -> u32 {
    r_type(s, t, 0, 0, 0x1a)
}

pub fn divu(s: u32, t: u32) -> u32 {
    r_type(s, t, 0, 0, 0x1b)
}

pub fn add(d: u32, s: u32, t: u32) -> u32 {
    r_type(s, t, d, 0, 0x20)
}

pub fn addu(d: u32, s: u32, t: u32) -> u32 {
    r_type(s, t, d, 0, 0x21)
}

pub fn sub(d: u32, s: u32, t: u32) -> u32 {
    r_type(s, t, d, 0, 0x22)
}

pub fn or(d: u32, s: u32, t: u32) -> u32 {
    r_type(s, t, d, 0, 0x25)
}

pub fn slt(d: u32, s: u32, t: u32) -> u32 {
    r_type(s, t, d, 0, 0x2a)
}

pub fn sltu(d: u32, s: u32, t: u32) -> u32 {
    r_type(s, t, d, 0, 0x2b)
}

pub fn bltzal(s: u32, offset: i16) -> u32 {
    i_type(0x01, s, 0x10, offset)
}

pub fn bgez(s: u32, offset: i16) -> u32 {
    i_type(0x01, s, 0x01, offset)
}

/// `target` is the absolute address, only bits [27:2] are encoded
pub fn j(target: u32) -> u32 {
    (0x02 << 26) | ((target >> 2) & 0x3ff_ffff)
}

pub fn jal(target: u32) -> u32 {
    (0x03 << 26) | ((target >> 2) & 0x3ff_ffff)
}

pub fn beq(s: u32, t: u32, offset: i16) -> u32 {
    i_type(0x04, s, t, offset)
}

pub fn bne(s: u32, t: u32, offset: i16) -> u32 {
    i_type(0x05, s, t, offset)
}

pub fn addi(t: u32, s: u32, imm: i16) -> u32 {
    i_type(0x08, s, t, imm)
}

pub fn addiu(t: u32, s: u32, imm: i16) -> u32 {
    i_type(0x09, s, t, imm)
}

pub fn slti(t: u32, s: u32, imm: i16) -> u32 {
    i_type(0x0a, s, t, imm)
}

pub fn sltiu(t: u32, s: u32, imm: i16) -> u32 {
    i_type(0x0b, s, t, imm)
}

pub fn ori(t: u32, s: u32, imm: u16) -> u32 {
    i_type(0x0d, s, t, imm as i16)
}

pub fn lui(t: u32, imm: u16) -> u32 {
    i_type(0x0f, 0, t, imm as i16)
}

pub fn mfc0(t: u32, cop_r: u32) -> u32 {
    (0x10 << 26) | (t << 16) | (cop_r << 11)
}

pub fn mtc0(t: u32, cop_r: u32) -> u32 {
    (0x10 << 26) | (0x04 << 21) | (t << 16) | (cop_r << 11)
}

pub fn rfe() -> u32 {
    0x4200_0010
}

pub fn mfc2(t: u32, cop_r: u32) -> u32 {
    (0x12 << 26) | (t << 16) | (cop_r << 11)
}

pub fn mtc2(t: u32, cop_r: u32) -> u32 {
    (0x12 << 26) | (0x04 << 21) | (t << 16) | (cop_r << 11)
}

pub fn lb(t: u32, s: u32, offset: i16) -> u32 {
    i_type(0x20, s, t, offset)
}

pub fn lwl(t: u32, s: u32, offset: i16) -> u32 {
    i_type(0x22, s, t, offset)
}

pub fn lw(t: u32, s: u32, offset: i16) -> u32 {
    i_type(0x23, s, t, offset)
}

pub fn lbu(t: u32, s: u32, offset: i16) -> u32 {
    i_type(0x24, s, t, offset)
}

pub fn lhu(t: u32, s: u32, offset: i16) -> u32 {
    i_type(0x25, s, t, offset)
}

pub fn lwr(t: u32, s: u32, offset: i16) -> u32 {
    i_type(0x26, s, t, offset)
}

pub fn sb(t: u32, s: u32, offset: i16) -> u32 {
    i_type(0x28, s, t, offset)
}

pub fn sh(t: u32, s: u32, offset: i16) -> u32 {
    i_type(0x29, s, t, offset)
}

pub fn swl(t: u32, s: u32, offset: i16) -> u32 {
    i_type(0x2a, s, t, offset)
}

pub fn sw(t: u32, s: u32, offset: i16) -> u32 {
    i_type(0x2b, s, t, offset)
}

pub fn swr(t: u32, s: u32, offset: i16) -> u32 {
    i_type(0x2e, s, t, offset)
}
