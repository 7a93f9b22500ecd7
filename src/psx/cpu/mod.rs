//! MIPS R3000A pipeline.
//!
//! The instruction following a jump or branch always executes: jumps only
//! write `next_pc` and the delay slot, already latched in `pc`, runs first.
//! Loads have a one instruction delay: the loaded value sits in `load` until
//! the next instruction has read its operands, then it's committed.

pub mod cop0;
pub mod gte;
mod instruction;

pub use self::instruction::{Instruction, Opcode, RegisterIndex};

use self::cop0::Exception;
use super::memory_map::RESET_VECTOR;
use super::{cache, Addressable, CycleCount, Psx};
use crate::config::TraceFlags;
use crate::error::Result;

pub struct Cpu {
    /// Address of the instruction to be executed next
    pc: u32,
    /// Address of the instruction after `pc`, jumps and branches write it
    next_pc: u32,
    /// Address of the instruction currently being executed, used to set EPC
    /// when an exception is raised
    current_pc: u32,
    /// General purpose registers. Index 0 always contains 0.
    regs: [u32; 32],
    /// HI register for division remainder and multiplication MSBs
    hi: u32,
    /// LO register for division quotient and multiplication LSBs
    lo: u32,
    /// Date at which the result of the last MULT/DIV becomes available
    mult_div_end: CycleCount,
    /// Load initiated by the previous instruction: target register and value
    load: (RegisterIndex, u32),
    /// Set by the current instruction if it's a jump or branch
    branch: bool,
    /// Set if the current instruction executes in a delay slot
    delay_slot: bool,
}

impl Cpu {
    pub fn new() -> Cpu {
        Cpu {
            pc: RESET_VECTOR,
            next_pc: RESET_VECTOR.wrapping_add(4),
            current_pc: RESET_VECTOR,
            regs: [0; 32],
            hi: 0,
            lo: 0,
            mult_div_end: 0,
            load: (RegisterIndex(0), 0),
            branch: false,
            delay_slot: false,
        }
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn next_pc(&self) -> u32 {
        self.next_pc
    }

    pub fn current_pc(&self) -> u32 {
        self.current_pc
    }

    /// Jump to `pc` outside of the normal instruction flow (side-loading,
    /// debugger)
    pub fn force_pc(&mut self, pc: u32) {
        self.pc = pc;
        self.next_pc = pc.wrapping_add(4);
        self.branch = false;
        self.delay_slot = false;
    }

    pub fn reg(&self, index: u32) -> u32 {
        self.regs[(index & 0x1f) as usize]
    }

    /// Write a general purpose register. Writes to R0 are discarded.
    pub fn set_reg(&mut self, index: u32, val: u32) {
        self.regs[(index & 0x1f) as usize] = val;
        self.regs[0] = 0;
    }

    pub fn hi(&self) -> u32 {
        self.hi
    }

    pub fn lo(&self) -> u32 {
        self.lo
    }

    /// True if the instruction being executed is in a delay slot
    pub fn in_delay_slot(&self) -> bool {
        self.delay_slot
    }

    pub(crate) fn rebase_counters(&mut self, now: CycleCount) {
        self.mult_div_end -= now;
    }
}

/// Fetch, decode and execute a single instruction
pub fn run_next_instruction(psx: &mut Psx) -> Result<()> {
    if psx.has_hooks() {
        psx.run_hooks()?;
    }

    let pc = psx.cpu.pc;
    psx.cpu.current_pc = pc;

    psx.cpu.delay_slot = psx.cpu.branch;
    psx.cpu.branch = false;

    if pc % 4 != 0 {
        psx.cop0.set_bad_vaddr(pc);
        exception(psx, Exception::LoadAddressError);
        return Ok(());
    }

    psx.cpu.pc = psx.cpu.next_pc;
    psx.cpu.next_pc = psx.cpu.pc.wrapping_add(4);

    let instruction = Instruction(cache::fetch_instruction(psx, pc)?);

    if psx.trace.contains(TraceFlags::PC) {
        trace!("PC 0x{:08x}", pc);
    }

    if psx.trace.contains(TraceFlags::INSTRUCTIONS) {
        trace!("0x{:08x}: {:?}", pc, instruction);
    }

    if psx.cop0.irq_pending(psx.irq.active()) {
        // The instruction isn't executed, EPC points at it
        exception(psx, Exception::Interrupt);
        return Ok(());
    }

    psx.tick(1);

    decode_and_execute(psx, instruction)
}

fn decode_and_execute(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    match instruction.decode() {
        Opcode::Sll => op_sll(psx, instruction),
        Opcode::Srl => op_srl(psx, instruction),
        Opcode::Sra => op_sra(psx, instruction),
        Opcode::Sllv => op_sllv(psx, instruction),
        Opcode::Srlv => op_srlv(psx, instruction),
        Opcode::Srav => op_srav(psx, instruction),
        Opcode::Jr => op_jr(psx, instruction),
        Opcode::Jalr => op_jalr(psx, instruction),
        Opcode::Syscall => op_syscall(psx),
        Opcode::Break => op_break(psx),
        Opcode::Mfhi => op_mfhi(psx, instruction),
        Opcode::Mthi => op_mthi(psx, instruction),
        Opcode::Mflo => op_mflo(psx, instruction),
        Opcode::Mtlo => op_mtlo(psx, instruction),
        Opcode::Mult => op_mult(psx, instruction),
        Opcode::Multu => op_multu(psx, instruction),
        Opcode::Div => op_div(psx, instruction),
        Opcode::Divu => op_divu(psx, instruction),
        Opcode::Add => op_add(psx, instruction),
        Opcode::Addu => op_addu(psx, instruction),
        Opcode::Sub => op_sub(psx, instruction),
        Opcode::Subu => op_subu(psx, instruction),
        Opcode::And => op_and(psx, instruction),
        Opcode::Or => op_or(psx, instruction),
        Opcode::Xor => op_xor(psx, instruction),
        Opcode::Nor => op_nor(psx, instruction),
        Opcode::Slt => op_slt(psx, instruction),
        Opcode::Sltu => op_sltu(psx, instruction),
        Opcode::Bxx => op_bxx(psx, instruction),
        Opcode::J => op_j(psx, instruction),
        Opcode::Jal => op_jal(psx, instruction),
        Opcode::Beq => op_beq(psx, instruction),
        Opcode::Bne => op_bne(psx, instruction),
        Opcode::Blez => op_blez(psx, instruction),
        Opcode::Bgtz => op_bgtz(psx, instruction),
        Opcode::Addi => op_addi(psx, instruction),
        Opcode::Addiu => op_addiu(psx, instruction),
        Opcode::Slti => op_slti(psx, instruction),
        Opcode::Sltiu => op_sltiu(psx, instruction),
        Opcode::Andi => op_andi(psx, instruction),
        Opcode::Ori => op_ori(psx, instruction),
        Opcode::Xori => op_xori(psx, instruction),
        Opcode::Lui => op_lui(psx, instruction),
        Opcode::Mfc0 => op_mfc0(psx, instruction),
        Opcode::Mtc0 => op_mtc0(psx, instruction),
        Opcode::Rfe => op_rfe(psx),
        Opcode::Mfc2 => op_mfc2(psx, instruction),
        Opcode::Cfc2 => op_cfc2(psx, instruction),
        Opcode::Mtc2 => op_mtc2(psx, instruction),
        Opcode::Ctc2 => op_ctc2(psx, instruction),
        Opcode::GteCommand => op_gte_command(psx, instruction),
        Opcode::Lb => op_lb(psx, instruction),
        Opcode::Lh => op_lh(psx, instruction),
        Opcode::Lwl => op_lwl(psx, instruction),
        Opcode::Lw => op_lw(psx, instruction),
        Opcode::Lbu => op_lbu(psx, instruction),
        Opcode::Lhu => op_lhu(psx, instruction),
        Opcode::Lwr => op_lwr(psx, instruction),
        Opcode::Sb => op_sb(psx, instruction),
        Opcode::Sh => op_sh(psx, instruction),
        Opcode::Swl => op_swl(psx, instruction),
        Opcode::Sw => op_sw(psx, instruction),
        Opcode::Swr => op_swr(psx, instruction),
        Opcode::Lwc2 => op_lwc2(psx, instruction),
        Opcode::Swc2 => op_swc2(psx, instruction),
        Opcode::CopUnusable => op_cop_unusable(psx, instruction),
        Opcode::Illegal => op_illegal(psx, instruction),
    }
}

/// Enter an exception: the pending load completes, then COP0 gives us the
/// handler address
fn exception(psx: &mut Psx, cause: Exception) {
    delayed_load(psx);

    let handler = psx
        .cop0
        .enter_exception(cause, psx.cpu.current_pc, psx.cpu.delay_slot);

    psx.cpu.pc = handler;
    psx.cpu.next_pc = handler.wrapping_add(4);
}

fn reg(psx: &Psx, index: RegisterIndex) -> u32 {
    psx.cpu.regs[index.index()]
}

fn set_reg(psx: &mut Psx, index: RegisterIndex, val: u32) {
    psx.cpu.set_reg(index.0, val);
}

/// Commit the pending load, if any
fn delayed_load(psx: &mut Psx) {
    let (reg, val) = psx.cpu.load;

    set_reg(psx, reg, val);

    psx.cpu.load = (RegisterIndex(0), 0);
}

/// Commit the pending load and schedule a new one. If both target the same
/// register the old value is never visible.
fn delayed_load_chain(psx: &mut Psx, reg: RegisterIndex, val: u32) {
    let (pending_reg, pending_val) = psx.cpu.load;

    if pending_reg != reg {
        set_reg(psx, pending_reg, pending_val);
    }

    psx.cpu.load = (reg, val);
}

/// Value of `reg` as seen by LWL/LWR, which merge with a pending load of the
/// same register instead of waiting for it
fn reg_bypass_load(psx: &Psx, index: RegisterIndex) -> u32 {
    let (pending_reg, pending_val) = psx.cpu.load;

    if pending_reg == index {
        pending_val
    } else {
        reg(psx, index)
    }
}

/// Branch to immediate value `offset`
fn branch(psx: &mut Psx, offset: u32) {
    // Offset immediates are always shifted two places to the right since
    // instructions are word aligned
    let offset = offset << 2;

    psx.cpu.next_pc = psx.cpu.pc.wrapping_add(offset);
}

/// Data load
fn load<T: Addressable>(psx: &mut Psx, addr: u32) -> Result<T> {
    psx.load(addr)
}

/// Data store. While the cache is isolated the store never reaches the bus.
fn store<T: Addressable>(psx: &mut Psx, addr: u32, val: T) -> Result<()> {
    if psx.cop0.cache_isolated() {
        cache::isolated_store(psx, addr, val.as_u32());
        Ok(())
    } else {
        psx.store(addr, val)
    }
}

/// Stall until the result of the last MULT/DIV is available
fn wait_mult_div(psx: &mut Psx) {
    let remaining = psx.cpu.mult_div_end - psx.cycle_counter;

    if remaining > 0 {
        psx.tick(remaining);
    }
}

/// Raise an address error for `addr`
fn address_error(psx: &mut Psx, cause: Exception, addr: u32) -> Result<()> {
    psx.cop0.set_bad_vaddr(addr);
    exception(psx, cause);
    Ok(())
}

/// Signed addition overflows if both operands have the same sign and the
/// result has a different one
fn add_overflows(a: u32, b: u32, v: u32) -> bool {
    (a ^ v) & (b ^ v) & 0x8000_0000 != 0
}

/// Signed substraction overflows if the operands have different signs and
/// the result's sign differs from the first operand
fn sub_overflows(a: u32, b: u32, v: u32) -> bool {
    (a ^ b) & (a ^ v) & 0x8000_0000 != 0
}

/// Shift Left Logical
fn op_sll(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.shift();
    let t = instruction.t();
    let d = instruction.d();

    let v = reg(psx, t) << i;

    delayed_load(psx);

    set_reg(psx, d, v);
    Ok(())
}

/// Shift Right Logical
fn op_srl(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.shift();
    let t = instruction.t();
    let d = instruction.d();

    let v = reg(psx, t) >> i;

    delayed_load(psx);

    set_reg(psx, d, v);
    Ok(())
}

/// Shift Right Arithmetic
fn op_sra(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.shift();
    let t = instruction.t();
    let d = instruction.d();

    let v = (reg(psx, t) as i32) >> i;

    delayed_load(psx);

    set_reg(psx, d, v as u32);
    Ok(())
}

/// Shift Left Logical Variable
fn op_sllv(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let d = instruction.d();
    let s = instruction.s();
    let t = instruction.t();

    // Shift amount is truncated to 5 bits
    let v = reg(psx, t) << (reg(psx, s) & 0x1f);

    delayed_load(psx);

    set_reg(psx, d, v);
    Ok(())
}

/// Shift Right Logical Variable
fn op_srlv(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let d = instruction.d();
    let s = instruction.s();
    let t = instruction.t();

    let v = reg(psx, t) >> (reg(psx, s) & 0x1f);

    delayed_load(psx);

    set_reg(psx, d, v);
    Ok(())
}

/// Shift Right Arithmetic Variable
fn op_srav(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let d = instruction.d();
    let s = instruction.s();
    let t = instruction.t();

    let v = (reg(psx, t) as i32) >> (reg(psx, s) & 0x1f);

    delayed_load(psx);

    set_reg(psx, d, v as u32);
    Ok(())
}

/// Jump Register
fn op_jr(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let s = instruction.s();

    psx.cpu.next_pc = reg(psx, s);
    psx.cpu.branch = true;

    delayed_load(psx);
    Ok(())
}

/// Jump And Link Register
fn op_jalr(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let d = instruction.d();
    let s = instruction.s();

    let ra = psx.cpu.next_pc;

    psx.cpu.next_pc = reg(psx, s);
    psx.cpu.branch = true;

    delayed_load(psx);

    // Store return address in `d`, after reading `s` in case both are the
    // same register
    set_reg(psx, d, ra);
    Ok(())
}

/// System Call
fn op_syscall(psx: &mut Psx) -> Result<()> {
    exception(psx, Exception::SysCall);
    Ok(())
}

/// Break
fn op_break(psx: &mut Psx) -> Result<()> {
    exception(psx, Exception::Break);
    Ok(())
}

/// Move From HI
fn op_mfhi(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let d = instruction.d();

    wait_mult_div(psx);

    let hi = psx.cpu.hi;

    delayed_load(psx);

    set_reg(psx, d, hi);
    Ok(())
}

/// Move To HI
fn op_mthi(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let s = instruction.s();

    psx.cpu.hi = reg(psx, s);

    delayed_load(psx);
    Ok(())
}

/// Move From LO
fn op_mflo(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let d = instruction.d();

    wait_mult_div(psx);

    let lo = psx.cpu.lo;

    delayed_load(psx);

    set_reg(psx, d, lo);
    Ok(())
}

/// Move To LO
fn op_mtlo(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let s = instruction.s();

    psx.cpu.lo = reg(psx, s);

    delayed_load(psx);
    Ok(())
}

/// Multiplier latency depends on the magnitude of the first operand
fn mult_cycles(v: u32, signed: bool) -> CycleCount {
    let v = if signed && (v as i32) < 0 { !v } else { v };

    if v < 0x800 {
        6
    } else if v < 0x10_0000 {
        9
    } else {
        13
    }
}

/// Divisions always take the same time
const DIV_CYCLES: CycleCount = 36;

/// Multiply (signed)
fn op_mult(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let s = instruction.s();
    let t = instruction.t();

    let a = reg(psx, s);
    let b = reg(psx, t);

    delayed_load(psx);

    let v = (i64::from(a as i32) * i64::from(b as i32)) as u64;

    psx.cpu.hi = (v >> 32) as u32;
    psx.cpu.lo = v as u32;
    psx.cpu.mult_div_end = psx.cycle_counter + mult_cycles(a, true);
    Ok(())
}

/// Multiply Unsigned
fn op_multu(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let s = instruction.s();
    let t = instruction.t();

    let a = reg(psx, s);
    let b = reg(psx, t);

    delayed_load(psx);

    let v = u64::from(a) * u64::from(b);

    psx.cpu.hi = (v >> 32) as u32;
    psx.cpu.lo = v as u32;
    psx.cpu.mult_div_end = psx.cycle_counter + mult_cycles(a, false);
    Ok(())
}

/// Divide (signed)
fn op_div(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let s = instruction.s();
    let t = instruction.t();

    let n = reg(psx, s) as i32;
    let d = reg(psx, t) as i32;

    delayed_load(psx);

    if d == 0 {
        // Division by zero, results are bogus
        psx.cpu.hi = n as u32;

        psx.cpu.lo = if n >= 0 { 0xffff_ffff } else { 1 };
    } else if n as u32 == 0x8000_0000 && d == -1 {
        // Result is not representable in a 32bit signed integer
        psx.cpu.hi = 0;
        psx.cpu.lo = 0x8000_0000;
    } else {
        psx.cpu.hi = (n % d) as u32;
        psx.cpu.lo = (n / d) as u32;
    }

    psx.cpu.mult_div_end = psx.cycle_counter + DIV_CYCLES;
    Ok(())
}

/// Divide Unsigned
fn op_divu(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let s = instruction.s();
    let t = instruction.t();

    let n = reg(psx, s);
    let d = reg(psx, t);

    delayed_load(psx);

    if d == 0 {
        psx.cpu.hi = n;
        psx.cpu.lo = 0xffff_ffff;
    } else {
        psx.cpu.hi = n % d;
        psx.cpu.lo = n / d;
    }

    psx.cpu.mult_div_end = psx.cycle_counter + DIV_CYCLES;
    Ok(())
}

/// Add and check for signed overflow
fn op_add(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let s = instruction.s();
    let t = instruction.t();
    let d = instruction.d();

    let a = reg(psx, s);
    let b = reg(psx, t);
    let v = a.wrapping_add(b);

    if add_overflows(a, b, v) {
        exception(psx, Exception::Overflow);
    } else {
        delayed_load(psx);
        set_reg(psx, d, v);
    }

    Ok(())
}

/// Add Unsigned
fn op_addu(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let s = instruction.s();
    let t = instruction.t();
    let d = instruction.d();

    let v = reg(psx, s).wrapping_add(reg(psx, t));

    delayed_load(psx);

    set_reg(psx, d, v);
    Ok(())
}

/// Substract and check for signed overflow
fn op_sub(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let s = instruction.s();
    let t = instruction.t();
    let d = instruction.d();

    let a = reg(psx, s);
    let b = reg(psx, t);
    let v = a.wrapping_sub(b);

    if sub_overflows(a, b, v) {
        exception(psx, Exception::Overflow);
    } else {
        delayed_load(psx);
        set_reg(psx, d, v);
    }

    Ok(())
}

/// Substract Unsigned
fn op_subu(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let s = instruction.s();
    let t = instruction.t();
    let d = instruction.d();

    let v = reg(psx, s).wrapping_sub(reg(psx, t));

    delayed_load(psx);

    set_reg(psx, d, v);
    Ok(())
}

/// Bitwise And
fn op_and(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let d = instruction.d();
    let s = instruction.s();
    let t = instruction.t();

    let v = reg(psx, s) & reg(psx, t);

    delayed_load(psx);

    set_reg(psx, d, v);
    Ok(())
}

/// Bitwise Or
fn op_or(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let d = instruction.d();
    let s = instruction.s();
    let t = instruction.t();

    let v = reg(psx, s) | reg(psx, t);

    delayed_load(psx);

    set_reg(psx, d, v);
    Ok(())
}

/// Bitwise Exclusive Or
fn op_xor(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let d = instruction.d();
    let s = instruction.s();
    let t = instruction.t();

    let v = reg(psx, s) ^ reg(psx, t);

    delayed_load(psx);

    set_reg(psx, d, v);
    Ok(())
}

/// Bitwise Not Or
fn op_nor(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let d = instruction.d();
    let s = instruction.s();
    let t = instruction.t();

    let v = !(reg(psx, s) | reg(psx, t));

    delayed_load(psx);

    set_reg(psx, d, v);
    Ok(())
}

/// Set on Less Than (signed)
fn op_slt(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let d = instruction.d();
    let s = instruction.s();
    let t = instruction.t();

    let s = reg(psx, s) as i32;
    let t = reg(psx, t) as i32;

    delayed_load(psx);

    set_reg(psx, d, (s < t) as u32);
    Ok(())
}

/// Set on Less Than Unsigned
fn op_sltu(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let d = instruction.d();
    let s = instruction.s();
    let t = instruction.t();

    let v = reg(psx, s) < reg(psx, t);

    delayed_load(psx);

    set_reg(psx, d, v as u32);
    Ok(())
}

/// Various branch instructions: BGEZ, BLTZ, BGEZAL, BLTZAL. Bits [20:16]
/// are used to figure out which one to use
fn op_bxx(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.imm_se();
    let s = instruction.s();

    let op = instruction.0;

    let is_bgez = (op >> 16) & 1;
    // It's not enough to test for bit 20 to see if we're supposed to link,
    // if any bit in the range [19:17] is set the link doesn't take place
    let is_link = (op >> 17) & 0xf == 8;

    let v = reg(psx, s) as i32;

    // Test "less than zero"
    let test = (v < 0) as u32;

    // If the test is "greater than or equal to zero" we need to negate the
    // comparison above
    let test = test ^ is_bgez;

    delayed_load(psx);

    // The return address is stored even if the branch isn't taken
    if is_link {
        let ra = psx.cpu.next_pc;
        set_reg(psx, RegisterIndex(31), ra);
    }

    psx.cpu.branch = true;

    if test != 0 {
        branch(psx, i);
    }

    Ok(())
}

/// Jump
fn op_j(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.imm_jump();

    psx.cpu.next_pc = (psx.cpu.pc & 0xf000_0000) | (i << 2);
    psx.cpu.branch = true;

    delayed_load(psx);
    Ok(())
}

/// Jump And Link
fn op_jal(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let ra = psx.cpu.next_pc;

    op_j(psx, instruction)?;

    // Store return address in $31 ($ra)
    set_reg(psx, RegisterIndex(31), ra);
    Ok(())
}

/// Branch if Equal
fn op_beq(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.imm_se();
    let s = instruction.s();
    let t = instruction.t();

    let taken = reg(psx, s) == reg(psx, t);

    delayed_load(psx);

    psx.cpu.branch = true;
    if taken {
        branch(psx, i);
    }

    Ok(())
}

/// Branch if Not Equal
fn op_bne(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.imm_se();
    let s = instruction.s();
    let t = instruction.t();

    let taken = reg(psx, s) != reg(psx, t);

    delayed_load(psx);

    psx.cpu.branch = true;
    if taken {
        branch(psx, i);
    }

    Ok(())
}

/// Branch if Less than or Equal to Zero
fn op_blez(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.imm_se();
    let s = instruction.s();

    let taken = (reg(psx, s) as i32) <= 0;

    delayed_load(psx);

    psx.cpu.branch = true;
    if taken {
        branch(psx, i);
    }

    Ok(())
}

/// Branch if Greater Than Zero
fn op_bgtz(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.imm_se();
    let s = instruction.s();

    let taken = (reg(psx, s) as i32) > 0;

    delayed_load(psx);

    psx.cpu.branch = true;
    if taken {
        branch(psx, i);
    }

    Ok(())
}

/// Add Immediate and check for signed overflow
fn op_addi(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.imm_se();
    let t = instruction.t();
    let s = instruction.s();

    let a = reg(psx, s);
    let v = a.wrapping_add(i);

    if add_overflows(a, i, v) {
        exception(psx, Exception::Overflow);
    } else {
        delayed_load(psx);
        set_reg(psx, t, v);
    }

    Ok(())
}

/// Add Immediate Unsigned
fn op_addiu(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.imm_se();
    let t = instruction.t();
    let s = instruction.s();

    let v = reg(psx, s).wrapping_add(i);

    delayed_load(psx);

    set_reg(psx, t, v);
    Ok(())
}

/// Set if Less Than Immediate (signed)
fn op_slti(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.imm_se() as i32;
    let s = instruction.s();
    let t = instruction.t();

    let v = (reg(psx, s) as i32) < i;

    delayed_load(psx);

    set_reg(psx, t, v as u32);
    Ok(())
}

/// Set if Less Than Immediate Unsigned
fn op_sltiu(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.imm_se();
    let s = instruction.s();
    let t = instruction.t();

    let v = reg(psx, s) < i;

    delayed_load(psx);

    set_reg(psx, t, v as u32);
    Ok(())
}

/// Bitwise And Immediate
fn op_andi(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.imm();
    let t = instruction.t();
    let s = instruction.s();

    let v = reg(psx, s) & i;

    delayed_load(psx);

    set_reg(psx, t, v);
    Ok(())
}

/// Bitwise Or Immediate
fn op_ori(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.imm();
    let t = instruction.t();
    let s = instruction.s();

    let v = reg(psx, s) | i;

    delayed_load(psx);

    set_reg(psx, t, v);
    Ok(())
}

/// Bitwise eXclusive Or Immediate
fn op_xori(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.imm();
    let t = instruction.t();
    let s = instruction.s();

    let v = reg(psx, s) ^ i;

    delayed_load(psx);

    set_reg(psx, t, v);
    Ok(())
}

/// Load Upper Immediate
fn op_lui(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.imm();
    let t = instruction.t();

    // Low 16bits are set to 0
    let v = i << 16;

    delayed_load(psx);

    set_reg(psx, t, v);
    Ok(())
}

/// Move From Coprocessor 0
fn op_mfc0(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let cpu_r = instruction.t();
    let cop_r = instruction.d().0;

    let v = psx.cop0.mfc0(cop_r, psx.irq.active());

    delayed_load_chain(psx, cpu_r, v);
    Ok(())
}

/// Move To Coprocessor 0
fn op_mtc0(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let cpu_r = instruction.t();
    let cop_r = instruction.d().0;

    let v = reg(psx, cpu_r);

    delayed_load(psx);

    psx.cop0.mtc0(cop_r, v);
    Ok(())
}

/// Return From Exception
fn op_rfe(psx: &mut Psx) -> Result<()> {
    delayed_load(psx);

    psx.cop0.return_from_exception();
    Ok(())
}

/// COP2 instructions need the coprocessor to be enabled in SR. Returns false
/// after raising the exception if it isn't.
fn check_cop2(psx: &mut Psx) -> bool {
    if psx.cop0.cop2_enabled() {
        true
    } else {
        exception(psx, Exception::CoprocessorError);
        false
    }
}

/// Move From Coprocessor 2 Data register
fn op_mfc2(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    if !check_cop2(psx) {
        return Ok(());
    }

    let cpu_r = instruction.t();
    let cop_r = instruction.d().0;

    let v = psx.gte.data(cop_r);

    delayed_load_chain(psx, cpu_r, v);
    Ok(())
}

/// Move From Coprocessor 2 Control register
fn op_cfc2(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    if !check_cop2(psx) {
        return Ok(());
    }

    let cpu_r = instruction.t();
    let cop_r = instruction.d().0;

    let v = psx.gte.control(cop_r);

    delayed_load_chain(psx, cpu_r, v);
    Ok(())
}

/// Move To Coprocessor 2 Data register
fn op_mtc2(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    if !check_cop2(psx) {
        return Ok(());
    }

    let cpu_r = instruction.t();
    let cop_r = instruction.d().0;

    let v = reg(psx, cpu_r);

    delayed_load(psx);

    psx.gte.set_data(cop_r, v);
    Ok(())
}

/// Move To Coprocessor 2 Control register
fn op_ctc2(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    if !check_cop2(psx) {
        return Ok(());
    }

    let cpu_r = instruction.t();
    let cop_r = instruction.d().0;

    let v = reg(psx, cpu_r);

    delayed_load(psx);

    psx.gte.set_control(cop_r, v);
    Ok(())
}

fn op_gte_command(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    if !check_cop2(psx) {
        return Ok(());
    }

    delayed_load(psx);

    psx.gte.command(instruction.0 & 0x1ff_ffff);
    Ok(())
}

/// Load Byte (signed)
fn op_lb(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.imm_se();
    let t = instruction.t();
    let s = instruction.s();

    let addr = reg(psx, s).wrapping_add(i);

    // Cast as i8 to force sign extension
    let v = load::<u8>(psx, addr)? as i8;

    delayed_load_chain(psx, t, v as u32);
    Ok(())
}

/// Load Halfword (signed)
fn op_lh(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.imm_se();
    let t = instruction.t();
    let s = instruction.s();

    let addr = reg(psx, s).wrapping_add(i);

    if addr % 2 != 0 {
        return address_error(psx, Exception::LoadAddressError, addr);
    }

    // Cast as i16 to force sign extension
    let v = load::<u16>(psx, addr)? as i16;

    delayed_load_chain(psx, t, v as u32);
    Ok(())
}

/// Load Word Left (little-endian only implementation)
fn op_lwl(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.imm_se();
    let t = instruction.t();
    let s = instruction.s();

    let addr = reg(psx, s).wrapping_add(i);

    // This instruction bypasses the load delay restriction: it merges its
    // contents with the pending load
    let cur_v = reg_bypass_load(psx, t);

    // Next we load the *aligned* word containing the first addressed byte
    let aligned_addr = addr & !3;
    let aligned_word = load::<u32>(psx, aligned_addr)?;

    // Depending on the address alignment we fetch the 1, 2, 3 or 4 *most*
    // significant bytes and put them in the target register.
    let v = match addr & 3 {
        0 => (cur_v & 0x00ff_ffff) | (aligned_word << 24),
        1 => (cur_v & 0x0000_ffff) | (aligned_word << 16),
        2 => (cur_v & 0x0000_00ff) | (aligned_word << 8),
        _ => aligned_word,
    };

    delayed_load_chain(psx, t, v);
    Ok(())
}

/// Load Word
fn op_lw(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.imm_se();
    let t = instruction.t();
    let s = instruction.s();

    let addr = reg(psx, s).wrapping_add(i);

    if addr % 4 != 0 {
        return address_error(psx, Exception::LoadAddressError, addr);
    }

    let v = load::<u32>(psx, addr)?;

    delayed_load_chain(psx, t, v);
    Ok(())
}

/// Load Byte Unsigned
fn op_lbu(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.imm_se();
    let t = instruction.t();
    let s = instruction.s();

    let addr = reg(psx, s).wrapping_add(i);

    let v = load::<u8>(psx, addr)?;

    delayed_load_chain(psx, t, u32::from(v));
    Ok(())
}

/// Load Halfword Unsigned
fn op_lhu(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.imm_se();
    let t = instruction.t();
    let s = instruction.s();

    let addr = reg(psx, s).wrapping_add(i);

    if addr % 2 != 0 {
        return address_error(psx, Exception::LoadAddressError, addr);
    }

    let v = load::<u16>(psx, addr)?;

    delayed_load_chain(psx, t, u32::from(v));
    Ok(())
}

/// Load Word Right (little-endian only implementation)
fn op_lwr(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.imm_se();
    let t = instruction.t();
    let s = instruction.s();

    let addr = reg(psx, s).wrapping_add(i);

    let cur_v = reg_bypass_load(psx, t);

    let aligned_addr = addr & !3;
    let aligned_word = load::<u32>(psx, aligned_addr)?;

    // Depending on the address alignment we fetch the 1, 2, 3 or 4 *least*
    // significant bytes and put them in the target register.
    let v = match addr & 3 {
        0 => aligned_word,
        1 => (cur_v & 0xff00_0000) | (aligned_word >> 8),
        2 => (cur_v & 0xffff_0000) | (aligned_word >> 16),
        _ => (cur_v & 0xffff_ff00) | (aligned_word >> 24),
    };

    delayed_load_chain(psx, t, v);
    Ok(())
}

/// Store Byte
fn op_sb(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.imm_se();
    let t = instruction.t();
    let s = instruction.s();

    let addr = reg(psx, s).wrapping_add(i);
    let v = reg(psx, t);

    delayed_load(psx);

    store::<u8>(psx, addr, v as u8)
}

/// Store Halfword
fn op_sh(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.imm_se();
    let t = instruction.t();
    let s = instruction.s();

    let addr = reg(psx, s).wrapping_add(i);
    let v = reg(psx, t);

    delayed_load(psx);

    if addr % 2 != 0 {
        return address_error(psx, Exception::StoreAddressError, addr);
    }

    store::<u16>(psx, addr, v as u16)
}

/// Store Word Left (little-endian only implementation)
fn op_swl(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.imm_se();
    let t = instruction.t();
    let s = instruction.s();

    let addr = reg(psx, s).wrapping_add(i);
    let v = reg(psx, t);

    delayed_load(psx);

    let aligned_addr = addr & !3;
    // Load the current value for the aligned word at the target address
    let cur_mem = load::<u32>(psx, aligned_addr)?;

    let mem = match addr & 3 {
        0 => (cur_mem & 0xffff_ff00) | (v >> 24),
        1 => (cur_mem & 0xffff_0000) | (v >> 16),
        2 => (cur_mem & 0xff00_0000) | (v >> 8),
        _ => v,
    };

    store::<u32>(psx, aligned_addr, mem)
}

/// Store Word
fn op_sw(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.imm_se();
    let t = instruction.t();
    let s = instruction.s();

    let addr = reg(psx, s).wrapping_add(i);
    let v = reg(psx, t);

    delayed_load(psx);

    if addr % 4 != 0 {
        return address_error(psx, Exception::StoreAddressError, addr);
    }

    store::<u32>(psx, addr, v)
}

/// Store Word Right (little-endian only implementation)
fn op_swr(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    let i = instruction.imm_se();
    let t = instruction.t();
    let s = instruction.s();

    let addr = reg(psx, s).wrapping_add(i);
    let v = reg(psx, t);

    delayed_load(psx);

    let aligned_addr = addr & !3;
    let cur_mem = load::<u32>(psx, aligned_addr)?;

    let mem = match addr & 3 {
        0 => v,
        1 => (cur_mem & 0x0000_00ff) | (v << 8),
        2 => (cur_mem & 0x0000_ffff) | (v << 16),
        _ => (cur_mem & 0x00ff_ffff) | (v << 24),
    };

    store::<u32>(psx, aligned_addr, mem)
}

/// Load Word in Coprocessor 2
fn op_lwc2(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    if !check_cop2(psx) {
        return Ok(());
    }

    let i = instruction.imm_se();
    let cop_r = instruction.t().0;
    let s = instruction.s();

    let addr = reg(psx, s).wrapping_add(i);

    delayed_load(psx);

    if addr % 4 != 0 {
        return address_error(psx, Exception::LoadAddressError, addr);
    }

    let v = load::<u32>(psx, addr)?;

    psx.gte.set_data(cop_r, v);
    Ok(())
}

/// Store Word in Coprocessor 2
fn op_swc2(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    if !check_cop2(psx) {
        return Ok(());
    }

    let i = instruction.imm_se();
    let cop_r = instruction.t().0;
    let s = instruction.s();

    let addr = reg(psx, s).wrapping_add(i);
    let v = psx.gte.data(cop_r);

    delayed_load(psx);

    if addr % 4 != 0 {
        return address_error(psx, Exception::StoreAddressError, addr);
    }

    store::<u32>(psx, addr, v)
}

/// Coprocessors 1 and 3 don't exist
fn op_cop_unusable(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    debug!(
        "Unusable coprocessor instruction {:?} at 0x{:08x}",
        instruction, psx.cpu.current_pc
    );

    exception(psx, Exception::CoprocessorError);
    Ok(())
}

fn op_illegal(psx: &mut Psx, instruction: Instruction) -> Result<()> {
    warn!(
        "Illegal instruction {:?} at 0x{:08x}",
        instruction, psx.cpu.current_pc
    );

    exception(psx, Exception::IllegalInstruction);
    Ok(())
}
