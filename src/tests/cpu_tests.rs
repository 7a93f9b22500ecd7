// CPU pipeline tests

use super::asm::*;
use super::{
    exception_code, load_program, peek, poke, step, test_psx, DATA_BASE, EXCEPTION_HANDLER,
    PROGRAM_BASE,
};
use crate::psx::irq::Interrupt;
use quickcheck::{quickcheck, TestResult};

const CAUSE_BD: u32 = 1 << 31;

#[test]
fn test_reset_state() {
    let psx = test_psx();

    assert_eq!(psx.cpu.pc(), 0xbfc0_0000);
    assert_eq!(psx.cpu.next_pc(), 0xbfc0_0004);
    for r in 0..32 {
        assert_eq!(psx.cpu.reg(r), 0);
    }
}

#[test]
fn test_load_delay_slot() {
    let mut psx = test_psx();

    poke(&mut psx, DATA_BASE, &[0xdead_beef]);
    psx.cpu.set_reg(1, 0x11);
    psx.cpu.set_reg(3, DATA_BASE);

    load_program(&mut psx, &[lw(1, 3, 0), addu(2, 1, 0), addu(4, 1, 0)]);

    step(&mut psx, 1);
    // Not visible yet
    assert_eq!(psx.cpu.reg(1), 0x11);

    step(&mut psx, 1);
    // The delay slot saw the old value
    assert_eq!(psx.cpu.reg(2), 0x11);
    assert_eq!(psx.cpu.reg(1), 0xdead_beef);

    step(&mut psx, 1);
    assert_eq!(psx.cpu.reg(4), 0xdead_beef);
}

#[test]
fn test_load_delay_chaining() {
    let mut psx = test_psx();

    poke(&mut psx, DATA_BASE, &[0xaaaa, 0xbbbb]);
    psx.cpu.set_reg(1, 0x11);
    psx.cpu.set_reg(3, DATA_BASE);

    load_program(&mut psx, &[lw(1, 3, 0), lw(1, 3, 4), nop()]);

    step(&mut psx, 2);
    // The first load to the same register is never visible
    assert_eq!(psx.cpu.reg(1), 0x11);

    step(&mut psx, 1);
    assert_eq!(psx.cpu.reg(1), 0xbbbb);
}

#[test]
fn test_load_delay_different_registers() {
    let mut psx = test_psx();

    poke(&mut psx, DATA_BASE, &[0xaaaa, 0xbbbb]);
    psx.cpu.set_reg(3, DATA_BASE);

    load_program(&mut psx, &[lw(1, 3, 0), lw(2, 3, 4), nop()]);

    step(&mut psx, 2);
    assert_eq!(psx.cpu.reg(1), 0xaaaa);
    assert_eq!(psx.cpu.reg(2), 0);

    step(&mut psx, 1);
    assert_eq!(psx.cpu.reg(2), 0xbbbb);
}

#[test]
fn test_narrow_loads_extend() {
    let mut psx = test_psx();

    poke(&mut psx, DATA_BASE, &[0x8081_f0ff]);
    psx.cpu.set_reg(3, DATA_BASE);

    load_program(
        &mut psx,
        &[lb(1, 3, 0), lbu(2, 3, 0), lhu(4, 3, 2), nop()],
    );

    step(&mut psx, 4);

    assert_eq!(psx.cpu.reg(1), 0xffff_ffff);
    assert_eq!(psx.cpu.reg(2), 0xff);
    assert_eq!(psx.cpu.reg(4), 0x8081);
}

#[test]
fn test_narrow_stores() {
    let mut psx = test_psx();

    poke(&mut psx, DATA_BASE, &[0]);
    psx.cpu.set_reg(1, 0x1234_5678);
    psx.cpu.set_reg(3, DATA_BASE);

    load_program(&mut psx, &[sb(1, 3, 3), sh(1, 3, 0)]);

    step(&mut psx, 2);

    assert_eq!(peek(&psx, DATA_BASE), 0x7800_5678);
}

#[test]
fn test_branch_delay_slot() {
    let mut psx = test_psx();

    load_program(
        &mut psx,
        &[
            beq(0, 0, 2),
            addiu(1, 0, 1),
            addiu(2, 0, 1),
            addiu(3, 0, 1),
        ],
    );

    step(&mut psx, 3);

    assert_eq!(psx.cpu.reg(1), 1);
    assert_eq!(psx.cpu.reg(2), 0);
    assert_eq!(psx.cpu.reg(3), 1);
    assert_eq!(psx.cpu.pc(), PROGRAM_BASE + 16);
}

#[test]
fn test_branch_not_taken() {
    let mut psx = test_psx();

    psx.cpu.set_reg(1, 1);

    load_program(&mut psx, &[bne(1, 1, 8), nop(), addiu(2, 0, 3)]);

    step(&mut psx, 3);

    assert_eq!(psx.cpu.reg(2), 3);
}

#[test]
fn test_jal_links() {
    let target = PROGRAM_BASE + 0x20;

    let mut psx = test_psx();

    let mut program = vec![nop(); 9];
    program[0] = jal(target);
    program[8] = addiu(1, 0, 5);

    load_program(&mut psx, &program);

    step(&mut psx, 3);

    assert_eq!(psx.cpu.reg(31), PROGRAM_BASE + 8);
    assert_eq!(psx.cpu.reg(1), 5);
}

#[test]
fn test_jr_returns() {
    let mut psx = test_psx();

    psx.cpu.set_reg(31, PROGRAM_BASE + 12);

    load_program(
        &mut psx,
        &[jr(31), addiu(1, 0, 1), addiu(2, 0, 1), addiu(3, 0, 1)],
    );

    step(&mut psx, 3);

    assert_eq!(psx.cpu.reg(1), 1);
    assert_eq!(psx.cpu.reg(2), 0);
    assert_eq!(psx.cpu.reg(3), 1);
}

#[test]
fn test_bltzal_links_when_not_taken() {
    let mut psx = test_psx();

    psx.cpu.set_reg(5, 1);

    load_program(&mut psx, &[bltzal(5, 4), nop(), addiu(1, 0, 7)]);

    step(&mut psx, 3);

    assert_eq!(psx.cpu.reg(31), PROGRAM_BASE + 8);
    assert_eq!(psx.cpu.reg(1), 7);
}

#[test]
fn test_bgez_taken_on_zero() {
    let mut psx = test_psx();

    load_program(
        &mut psx,
        &[bgez(0, 2), nop(), addiu(1, 0, 1), addiu(2, 0, 1)],
    );

    step(&mut psx, 3);

    assert_eq!(psx.cpu.reg(1), 0);
    assert_eq!(psx.cpu.reg(2), 1);
}

#[test]
fn test_add_overflow_raises_exception() {
    let mut psx = test_psx();

    psx.cpu.set_reg(2, 0x55);

    load_program(&mut psx, &[lui(1, 0x7fff), ori(1, 1, 0xffff), addi(2, 1, 1)]);

    step(&mut psx, 3);

    // Destination untouched
    assert_eq!(psx.cpu.reg(2), 0x55);
    assert_eq!(exception_code(&psx), 0xc);
    assert_eq!(psx.cop0.epc(), PROGRAM_BASE + 8);
    assert_eq!(psx.cop0.cause(false) & CAUSE_BD, 0);
    assert_eq!(psx.cpu.pc(), EXCEPTION_HANDLER);
}

#[test]
fn test_sub_overflow_and_unsigned_wrap() {
    let mut psx = test_psx();

    psx.cpu.set_reg(1, 0x8000_0000);
    psx.cpu.set_reg(2, 1);

    load_program(&mut psx, &[addu(3, 1, 1), sub(4, 1, 2)]);

    step(&mut psx, 1);
    assert_eq!(psx.cpu.reg(3), 0);

    step(&mut psx, 1);
    assert_eq!(psx.cpu.reg(4), 0);
    assert_eq!(exception_code(&psx), 0xc);
}

#[test]
fn test_signed_add_without_overflow() {
    let mut psx = test_psx();

    psx.cpu.set_reg(1, -5i32 as u32);
    psx.cpu.set_reg(2, 3);

    load_program(&mut psx, &[add(3, 1, 2), addi(4, 1, -1)]);

    step(&mut psx, 2);

    assert_eq!(psx.cpu.reg(3), -2i32 as u32);
    assert_eq!(psx.cpu.reg(4), -6i32 as u32);
}

#[test]
fn test_comparisons() {
    let mut psx = test_psx();

    psx.cpu.set_reg(1, -1i32 as u32);
    psx.cpu.set_reg(2, 1);

    load_program(
        &mut psx,
        &[slt(3, 1, 2), sltu(4, 1, 2), slti(5, 1, 0), sltiu(6, 2, -1)],
    );

    step(&mut psx, 4);

    assert_eq!(psx.cpu.reg(3), 1);
    assert_eq!(psx.cpu.reg(4), 0);
    assert_eq!(psx.cpu.reg(5), 1);
    // The immediate is sign extended then compared unsigned
    assert_eq!(psx.cpu.reg(6), 1);
}

#[test]
fn test_exception_in_delay_slot() {
    let mut psx = test_psx();

    load_program(&mut psx, &[j(PROGRAM_BASE + 0x40), syscall()]);

    step(&mut psx, 2);

    assert_eq!(exception_code(&psx), 0x8);
    // EPC points at the jump so that it's executed again
    assert_eq!(psx.cop0.epc(), PROGRAM_BASE);
    assert_eq!(psx.cop0.cause(false) & CAUSE_BD, CAUSE_BD);
    assert_eq!(psx.cpu.pc(), EXCEPTION_HANDLER);
}

#[test]
fn test_bev_selects_rom_handler() {
    let mut psx = test_psx();

    psx.cop0.mtc0(12, 1 << 22);

    load_program(&mut psx, &[syscall()]);

    step(&mut psx, 1);

    assert_eq!(psx.cpu.pc(), 0xbfc0_0180);
    assert_eq!(psx.cpu.next_pc(), 0xbfc0_0184);
}

#[test]
fn test_division_special_cases() {
    let cases = [
        // n, d, hi, lo
        (7u32, 0u32, 7u32, 0xffff_ffffu32),
        (-7i32 as u32, 0, -7i32 as u32, 1),
        (0x8000_0000, 0xffff_ffff, 0, 0x8000_0000),
        (-7i32 as u32, 2, -1i32 as u32, -3i32 as u32),
    ];

    for &(n, d, hi, lo) in cases.iter() {
        let mut psx = test_psx();

        psx.cpu.set_reg(1, n);
        psx.cpu.set_reg(2, d);

        load_program(&mut psx, &[div(1, 2), mflo(3), mfhi(4)]);

        step(&mut psx, 3);

        assert_eq!(psx.cpu.reg(3), lo, "{} / {}", n, d);
        assert_eq!(psx.cpu.reg(4), hi, "{} % {}", n, d);
    }
}

#[test]
fn test_divu_by_zero() {
    let mut psx = test_psx();

    psx.cpu.set_reg(1, 0x1234);

    load_program(&mut psx, &[divu(1, 0)]);

    step(&mut psx, 1);

    assert_eq!(psx.cpu.hi(), 0x1234);
    assert_eq!(psx.cpu.lo(), 0xffff_ffff);
}

#[test]
fn test_mflo_waits_for_divider() {
    let mut psx = test_psx();

    psx.cpu.set_reg(1, 100);
    psx.cpu.set_reg(2, 7);

    load_program(&mut psx, &[div(1, 2), mflo(3)]);

    let start = psx.cycle_counter;

    step(&mut psx, 2);

    // The division result is only available 36 cycles after the DIV, the
    // 6 cycles of the first instruction (RAM fetch and execution) included
    assert_eq!(psx.cycle_counter - start, 6 + 36);
    assert_eq!(psx.cpu.reg(3), 14);
}

#[test]
fn test_multiplications() {
    let mut psx = test_psx();

    psx.cpu.set_reg(1, 0xffff_ffff);
    psx.cpu.set_reg(2, 2);

    load_program(&mut psx, &[mult(1, 2), mfhi(3), mflo(4), multu(1, 2), mfhi(5)]);

    step(&mut psx, 5);

    assert_eq!(psx.cpu.reg(3), 0xffff_ffff);
    assert_eq!(psx.cpu.reg(4), 0xffff_fffe);
    assert_eq!(psx.cpu.reg(5), 1);
}

#[test]
fn test_unaligned_load_and_store() {
    let mut psx = test_psx();

    psx.cpu.set_reg(3, DATA_BASE + 1);

    load_program(&mut psx, &[lw(1, 3, 0)]);
    step(&mut psx, 1);

    assert_eq!(exception_code(&psx), 0x4);
    assert_eq!(psx.cop0.epc(), PROGRAM_BASE);
    assert_eq!(psx.cop0.mfc0(8, false), DATA_BASE + 1);

    load_program(&mut psx, &[sh(1, 3, 0)]);
    step(&mut psx, 1);

    assert_eq!(exception_code(&psx), 0x5);
}

#[test]
fn test_misaligned_pc() {
    let mut psx = test_psx();

    let target = PROGRAM_BASE + 0x22;

    psx.cpu.set_reg(1, target);

    load_program(&mut psx, &[jr(1), nop()]);

    step(&mut psx, 3);

    assert_eq!(exception_code(&psx), 0x4);
    assert_eq!(psx.cop0.epc(), target);
    assert_eq!(psx.cop0.mfc0(8, false), target);
    assert_eq!(psx.cop0.cause(false) & CAUSE_BD, 0);
}

#[test]
fn test_unaligned_word_load() {
    let mut psx = test_psx();

    poke(&mut psx, DATA_BASE, &[0x3322_1100, 0x7766_5544]);
    psx.cpu.set_reg(3, DATA_BASE);

    // Load the word at DATA_BASE + 1
    load_program(&mut psx, &[lwr(1, 3, 1), lwl(1, 3, 4), nop()]);

    step(&mut psx, 3);

    assert_eq!(psx.cpu.reg(1), 0x4433_2211);
}

#[test]
fn test_unaligned_word_store() {
    let mut psx = test_psx();

    poke(&mut psx, DATA_BASE, &[0, 0]);
    psx.cpu.set_reg(1, 0xaabb_ccdd);
    psx.cpu.set_reg(3, DATA_BASE);

    // Store at DATA_BASE + 1
    load_program(&mut psx, &[swr(1, 3, 1), swl(1, 3, 4)]);

    step(&mut psx, 2);

    assert_eq!(peek(&psx, DATA_BASE), 0xbbcc_dd00);
    assert_eq!(peek(&psx, DATA_BASE + 4), 0x0000_00aa);
}

#[test]
fn test_cop2_needs_enable() {
    let mut psx = test_psx();

    psx.cpu.set_reg(1, 0x1234);

    load_program(&mut psx, &[mtc2(1, 5)]);
    step(&mut psx, 1);

    assert_eq!(exception_code(&psx), 0xb);

    psx.cop0.mtc0(12, 1 << 30);

    load_program(&mut psx, &[mtc2(1, 5), mfc2(2, 5), addu(3, 2, 0), nop()]);
    step(&mut psx, 3);

    assert_eq!(psx.gte.data(5), 0x1234);
    // MFC2 has a load delay
    assert_eq!(psx.cpu.reg(3), 0);
    assert_eq!(psx.cpu.reg(2), 0x1234);
}

#[test]
fn test_illegal_instruction() {
    let mut psx = test_psx();

    load_program(&mut psx, &[0xfc00_0000]);
    step(&mut psx, 1);

    assert_eq!(exception_code(&psx), 0xa);
    assert_eq!(psx.cop0.epc(), PROGRAM_BASE);
}

#[test]
fn test_missing_coprocessor() {
    let mut psx = test_psx();

    // COP1 instruction
    load_program(&mut psx, &[0x4400_0000]);
    step(&mut psx, 1);

    assert_eq!(exception_code(&psx), 0xb);
}

#[test]
fn test_cop0_moves() {
    let mut psx = test_psx();

    psx.cpu.set_reg(1, 0x0000_0401);

    load_program(&mut psx, &[mtc0(1, 12), mfc0(2, 12), mfc0(3, 15), nop()]);

    step(&mut psx, 4);

    assert_eq!(psx.cop0.sr(), 0x401);
    assert_eq!(psx.cpu.reg(2), 0x401);
    assert_eq!(psx.cpu.reg(3), 2);
}

#[test]
fn test_interrupt_taken_before_execution() {
    let mut psx = test_psx();

    psx.irq.set_mask(1 << Interrupt::VBlank as u16);
    psx.irq.trigger(Interrupt::VBlank);
    // Interrupts enabled, hardware interrupt unmasked
    psx.cop0.mtc0(12, 0x401);

    load_program(&mut psx, &[addiu(1, 0, 1)]);
    step(&mut psx, 1);

    assert_eq!(psx.cpu.reg(1), 0);
    assert_eq!(exception_code(&psx), 0);
    assert_eq!(psx.cop0.epc(), PROGRAM_BASE);
    assert_eq!(psx.cpu.pc(), EXCEPTION_HANDLER);
    // Interrupts disabled by the exception
    assert_eq!(psx.cop0.sr() & 1, 0);
}

#[test]
fn test_rfe_pops_mode_stack() {
    let mut psx = test_psx();

    psx.cop0.mtc0(12, 0x0c);

    load_program(&mut psx, &[rfe()]);
    step(&mut psx, 1);

    assert_eq!(psx.cop0.sr() & 0x3f, 0x03);
}

#[test]
fn test_isolated_cache_stores_skip_ram() {
    let mut psx = test_psx();

    poke(&mut psx, DATA_BASE, &[0]);
    psx.cpu.set_reg(1, 0x1234_5678);
    psx.cpu.set_reg(3, DATA_BASE);
    psx.cop0.mtc0(12, 1 << 16);

    load_program(&mut psx, &[sw(1, 3, 0), sll(0, 0, 0)]);
    step(&mut psx, 1);

    assert_eq!(peek(&psx, DATA_BASE), 0);

    psx.cop0.mtc0(12, 0);
    load_program(&mut psx, &[sw(1, 3, 0)]);
    step(&mut psx, 1);

    assert_eq!(peek(&psx, DATA_BASE), 0x1234_5678);
}

#[test]
fn test_icache_hits_are_free() {
    let mut psx = test_psx();

    // Enable the instruction cache
    psx.store::<u32>(0xfffe_0130, 1 << 11).unwrap();

    load_program(&mut psx, &[j(PROGRAM_BASE), nop()]);

    // First pass: refill of the whole line (3 + 4 cycles) then one cycle
    // per instruction
    let start = psx.cycle_counter;
    step(&mut psx, 2);
    assert_eq!(psx.cycle_counter - start, 7 + 2);

    let start = psx.cycle_counter;
    step(&mut psx, 2);
    assert_eq!(psx.cycle_counter - start, 2);
}

#[test]
fn test_zero_register_is_constant() {
    fn prop(v: u32, imm: u16) -> TestResult {
        let mut psx = test_psx();

        psx.cpu.set_reg(0, v);
        psx.cpu.set_reg(1, v);
        poke(&mut psx, DATA_BASE, &[v]);
        psx.cpu.set_reg(3, DATA_BASE);

        load_program(
            &mut psx,
            &[
                addiu(0, 1, imm as i16),
                lui(0, imm),
                or(0, 1, 1),
                lw(0, 3, 0),
                nop(),
            ],
        );

        step(&mut psx, 5);

        TestResult::from_bool(psx.cpu.reg(0) == 0)
    }

    quickcheck(prop as fn(u32, u16) -> TestResult);
}
