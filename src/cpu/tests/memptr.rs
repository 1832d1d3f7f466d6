//! MEMPTR (WZ) tests
//!
//! MEMPTR is only observable through the bits-5/3 results of CCF/SCF and
//! BIT n,(HL) / BIT n,(IX+d), but ZEXALL exercises those paths hard, so the
//! register is pinned here for every instruction class that loads it.

use super::*;

const SENTINEL: u16 = 0xABCD;

fn with_sentinel(program: &[u8]) -> (Cpu, FlatBus) {
    let mut cpu = flat_cpu();
    cpu.memptr = SENTINEL;
    (cpu, setup(program))
}

#[test]
fn jp_hl_leaves_memptr() {
    let (mut cpu, mut bus) = with_sentinel(&[0xE9]);
    cpu.hl = 0x0100;
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.memptr, SENTINEL);
}

#[test]
fn jp_nn_loads_target_even_when_not_taken() {
    let (mut cpu, mut bus) = with_sentinel(&[0xCA, 0x34, 0x12]);
    // JP Z with Z clear
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.pc, 0x0003);
    assert_eq!(cpu.memptr, 0x1234);
}

#[test]
fn jr_cc_taken_loads_target() {
    let (mut cpu, mut bus) = with_sentinel(&[0x20, 0x05]);
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.pc, 0x0007);
    assert_eq!(cpu.memptr, 0x0007);
}

#[test]
fn jr_cc_not_taken_leaves_memptr() {
    let (mut cpu, mut bus) = with_sentinel(&[0x28, 0x05]);
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.pc, 0x0002);
    assert_eq!(cpu.memptr, SENTINEL);
}

#[test]
fn djnz_taken_loads_target() {
    let (mut cpu, mut bus) = with_sentinel(&[0x10, 0x10]);
    cpu.set_b(2);
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.memptr, 0x0012);
}

#[test]
fn call_and_ret_track_the_flow() {
    let (mut cpu, mut bus) = with_sentinel(&[0xCD, 0x10, 0x00]);
    bus.write_ram(0x0010, 0xC9);
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.memptr, 0x0010);
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.memptr, 0x0003, "RET leaves the popped address");
}

#[test]
fn rst_loads_vector() {
    let (mut cpu, mut bus) = with_sentinel(&[0xEF]);
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.memptr, 0x0028);
}

#[test]
fn ld_a_nn_points_past_the_operand() {
    let (mut cpu, mut bus) = with_sentinel(&[0x3A, 0x00, 0x20]);
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.memptr, 0x2001);
}

#[test]
fn ld_nn_a_mixes_a_into_the_high_byte() {
    let (mut cpu, mut bus) = with_sentinel(&[0x32, 0xFF, 0x20]);
    cpu.a = 0x7F;
    run(&mut cpu, &mut bus, 1);
    // high byte is A, low byte wraps within the page
    assert_eq!(cpu.memptr, 0x7F00);
}

#[test]
fn ld_bc_a_unmasked_sum() {
    let (mut cpu, mut bus) = with_sentinel(&[0x02]);
    cpu.a = 0x12;
    cpu.bc = 0x10FF;
    run(&mut cpu, &mut bus, 1);
    // C + 1 overflows into bit 8 unmasked on this silicon
    assert_eq!(cpu.memptr, 0x1300);
}

#[test]
fn ld_word_indirect_points_past_the_address() {
    let (mut cpu, mut bus) = with_sentinel(&[0x2A, 0x00, 0x20, 0x22, 0x10, 0x20]);
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.memptr, 0x2001, "LD HL,(nn)");
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.memptr, 0x2011, "LD (nn),HL");
}

#[test]
fn ex_sp_hl_takes_the_new_value() {
    let (mut cpu, mut bus) = with_sentinel(&[0xE3]);
    cpu.hl = 0x1234;
    bus.write_ram(0x4000, 0x78);
    bus.write_ram(0x4001, 0x56);
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.memptr, 0x5678);
}

#[test]
fn io_forms() {
    let (mut cpu, mut bus) = with_sentinel(&[0xDB, 0x10]);
    cpu.a = 0x3C;
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.memptr, 0x3C11, "IN A,(n): port + 1");

    let (mut cpu, mut bus) = with_sentinel(&[0xD3, 0x10]);
    cpu.a = 0x3C;
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.memptr, 0x3C11, "OUT (n),A: A on top of n + 1");

    let (mut cpu, mut bus) = with_sentinel(&[0xED, 0x40]);
    cpu.bc = 0x1234;
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.memptr, 0x1235, "IN r,(C): BC + 1");

    let (mut cpu, mut bus) = with_sentinel(&[0xED, 0x41]);
    cpu.bc = 0x1234;
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.memptr, 0x1235, "OUT (C),r: BC + 1");
}

#[test]
fn add16_takes_source_plus_one() {
    let (mut cpu, mut bus) = with_sentinel(&[0x09]);
    cpu.hl = 0x1000;
    cpu.bc = 0x0234;
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.memptr, 0x1001, "ADD HL,rr: HL before the add, plus one");

    let (mut cpu, mut bus) = with_sentinel(&[0xDD, 0x09]);
    cpu.ix = 0x4000;
    cpu.bc = 0x0001;
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.memptr, 0x4001, "ADD IX,rr");
}

#[test]
fn adc16_sbc16_take_hl_plus_one() {
    let (mut cpu, mut bus) = with_sentinel(&[0xED, 0x4A]);
    cpu.hl = 0x2000;
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.memptr, 0x2001);
}

#[test]
fn ldi_leaves_memptr_but_cpi_steps_it() {
    let (mut cpu, mut bus) = with_sentinel(&[0xED, 0xA0, 0xED, 0xA1, 0xED, 0xA9]);
    cpu.hl = 0x0100;
    cpu.de = 0x0200;
    cpu.bc = 0x0008;
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.memptr, SENTINEL, "LDI does not touch MEMPTR");
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.memptr, SENTINEL.wrapping_add(1), "CPI increments it");
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.memptr, SENTINEL, "CPD decrements it");
}

#[test]
fn repeating_blocks_hold_pc_plus_one() {
    let (mut cpu, mut bus) = with_sentinel(&[0xED, 0xB0]);
    cpu.hl = 0x0100;
    cpu.de = 0x0200;
    cpu.bc = 0x0002;
    run(&mut cpu, &mut bus, 1);
    // the repeat pass rewound PC to the prefix; MEMPTR is PC + 1
    assert_eq!(cpu.pc, 0x0000);
    assert_eq!(cpu.memptr, 0x0001);
}

#[test]
fn block_io_takes_bc() {
    let (mut cpu, mut bus) = with_sentinel(&[0xED, 0xA2]);
    cpu.bc = 0x0305;
    cpu.hl = 0x2000;
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.memptr, 0x0306, "INI: BC before the decrement, plus one");

    let (mut cpu, mut bus) = with_sentinel(&[0xED, 0xA3]);
    cpu.bc = 0x0305;
    cpu.hl = 0x2000;
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.memptr, 0x0206, "OUTI: BC after the decrement, plus one");
}

#[test]
fn bit_hl_reads_bits53_from_memptr() {
    let (mut cpu, mut bus) = with_sentinel(&[0xCB, 0x46]);
    cpu.memptr = 0x2800;
    cpu.hl = 0x0100;
    bus.write_ram(0x0100, 0x01);
    run(&mut cpu, &mut bus, 1);
    assert!(cpu.flag_5(), "bit 5 leaks from MEMPTR's high byte");
    assert!(cpu.flag_3());
    assert!(!cpu.flag_z());
}

#[test]
fn indexed_ops_leave_the_effective_address() {
    let (mut cpu, mut bus) = with_sentinel(&[0xDD, 0x7E, 0x10]);
    cpu.ix = 0x27F0;
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.memptr, 0x2800, "LD A,(IX+d) leaves IX+d");

    // BIT over DD CB takes bits 5/3 from that address's high byte
    let (mut cpu, mut bus) = with_sentinel(&[0xDD, 0xCB, 0x10, 0x46]);
    cpu.ix = 0x27F0;
    run(&mut cpu, &mut bus, 1);
    assert_eq!(cpu.memptr, 0x2800);
    assert!(cpu.flag_5());
    assert!(cpu.flag_3());
}

#[test]
fn interrupts_load_the_vector() {
    let mut cpu = flat_cpu();
    let mut bus = FlatBus::new();
    cpu.memptr = SENTINEL;
    cpu.iff1 = true;
    cpu.iff2 = true;
    cpu.im = InterruptMode::Mode1;
    cpu.set_int_line(true);
    cpu.step(&mut bus);
    assert_eq!(cpu.memptr, 0x0038);

    let mut cpu = flat_cpu();
    cpu.memptr = SENTINEL;
    cpu.trigger_nmi();
    cpu.step(&mut bus);
    assert_eq!(cpu.memptr, 0x0066);
}
