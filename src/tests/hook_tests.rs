// Debug hooks and whole frame runs

use std::io::Write;

use crate::psx::bios::Bios;
use crate::psx::exe::build_exe;
use crate::psx::gpu::FRAME_CYCLES;
use crate::psx::hooks::{BiosTty, PcHook};
use crate::psx::irq::Interrupt;
use crate::psx::memory_map::SHELL_ENTRY;
use crate::psx::sync::REBASE_THRESHOLD;
use crate::{Config, Psx};

use super::asm::*;
use super::{load_program, step, test_psx, PROGRAM_BASE};

fn putchar(tty: &mut BiosTty, psx: &mut Psx, table: u32, function: u32, c: char) {
    psx.cpu.force_pc(table);
    psx.cpu.set_reg(9, function);
    psx.cpu.set_reg(4, c as u32);

    tty.on_pc(psx).unwrap();
}

#[test]
fn test_bios_tty() {
    let mut psx = test_psx();
    let mut tty = BiosTty::new();

    putchar(&mut tty, &mut psx, 0xa0, 0x3c, 'o');
    putchar(&mut tty, &mut psx, 0xb0, 0x3d, 'k');
    // Not a putchar call
    putchar(&mut tty, &mut psx, 0xa0, 0x3d, 'x');
    assert_eq!(tty.output(), "");

    putchar(&mut tty, &mut psx, 0x8000_00a0, 0x3c, '\n');
    assert_eq!(tty.output(), "ok\n");
}

#[test]
fn test_exe_side_load() {
    let text: Vec<u8> = [addiu(1, 0, 0x42), addiu(2, 0, 0x43)]
        .iter()
        .flat_map(|w| w.to_le_bytes())
        .collect();

    let image = build_exe(0x8001_0000, 0x8001_0000, 0x801f_ff00, &text);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&image).unwrap();

    let config = Config {
        side_load: Some(file.path().to_path_buf()),
        ..Config::default()
    };

    let mut psx = Psx::new(Bios::new_dummy(), &config).unwrap();

    // Pretend the BIOS reached the shell
    psx.cpu.force_pc(SHELL_ENTRY);

    step(&mut psx, 2);

    assert_eq!(psx.cpu.reg(1), 0x42);
    assert_eq!(psx.cpu.reg(2), 0x43);
    assert_eq!(psx.cpu.reg(28), 0x8001_0000);
    assert_eq!(psx.cpu.reg(29), 0x801f_ff00);
    assert_eq!(psx.cpu.reg(30), 0x801f_ff00);
    assert_eq!(psx.cpu.pc(), 0x8001_0008);

    // Only done once
    psx.cpu.force_pc(SHELL_ENTRY);
    psx.ram.store(SHELL_ENTRY & 0x1f_ffff, addiu(3, 0, 1));
    step(&mut psx, 1);

    assert_eq!(psx.cpu.reg(3), 1);
}

#[test]
fn test_missing_side_load_file() {
    let config = Config {
        side_load: Some("/nonexistent/demo.exe".into()),
        ..Config::default()
    };

    assert!(Psx::new(Bios::new_dummy(), &config).is_err());
}

#[test]
fn test_run_frame() {
    let mut psx = test_psx();

    // Infinite loop
    load_program(&mut psx, &[j(PROGRAM_BASE), nop()]);

    psx.run_frame().unwrap();

    assert_eq!(psx.frame(), 1);
    assert_ne!(psx.irq.status() & (1 << Interrupt::VBlank as u16), 0);

    psx.run_frame().unwrap();
    assert_eq!(psx.frame(), 2);
}

#[test]
fn test_counters_rebased_between_events() {
    let mut psx = test_psx();

    load_program(&mut psx, &[j(PROGRAM_BASE), nop()]);

    psx.tick(REBASE_THRESHOLD - 100);

    let mut rebased = false;
    for _ in 0..16 {
        psx.run_until_next_event().unwrap();

        if psx.cycle_counter < FRAME_CYCLES {
            rebased = true;
            break;
        }
    }

    assert!(rebased);

    // Dates are still consistent afterwards
    let frame = psx.frame();
    psx.run_frame().unwrap();
    assert_eq!(psx.frame(), frame + 1);
}
