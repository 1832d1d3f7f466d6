//! Z80 CPU tests
//!
//! Test suite for the CPU core, organized into:
//! - instructions.rs: instruction and flag semantics per family
//! - interrupts.rs: NMI/INT acceptance, EI shadow, HALT, reset paths
//! - memptr.rs: the hidden MEMPTR/WZ register across its boundary cases
//! - timing.rs: T-state accounting and refresh-counter increments
//!
//! Everything runs against [`FlatBus`], so the expected T-state counts are
//! the canonical ones (4 per M1, 3 per memory byte, 4 per port access).

use super::Cpu;
use super::InterruptMode;
use crate::bus::Bus;
use crate::memory::FlatBus;

mod memptr;

// ========== Test Helpers ==========

/// CPU with every register zeroed and SP parked at 0x4000, the baseline the
/// end-to-end scenarios start from.
fn flat_cpu() -> Cpu {
    let mut cpu = Cpu::new();
    cpu.a = 0;
    cpu.set_f(0);
    cpu.bc = 0;
    cpu.de = 0;
    cpu.hl = 0;
    cpu.set_af_prime(0);
    cpu.bc_prime = 0;
    cpu.de_prime = 0;
    cpu.hl_prime = 0;
    cpu.ix = 0;
    cpu.iy = 0;
    cpu.sp = 0x4000;
    cpu.memptr = 0;
    cpu
}

/// Flat bus with `program` loaded at 0x0000.
fn setup(program: &[u8]) -> FlatBus {
    let mut bus = FlatBus::new();
    bus.load(0x0000, program);
    bus
}

/// Execute `steps` instructions.
fn run(cpu: &mut Cpu, bus: &mut impl Bus, steps: usize) {
    for _ in 0..steps {
        cpu.step(bus);
    }
}

/// Assert F matches `expected`, with a bit-by-bit breakdown on mismatch.
fn assert_flags(cpu: &Cpu, expected: u8, context: &str) {
    assert_eq!(
        cpu.f(),
        expected,
        "{}: flags mismatch. Expected {:08b}, got {:08b} (S={} Z={} F5={} H={} F3={} PV={} N={} C={})",
        context,
        expected,
        cpu.f(),
        u8::from(cpu.flag_s()),
        u8::from(cpu.flag_z()),
        u8::from(cpu.flag_5()),
        u8::from(cpu.flag_h()),
        u8::from(cpu.flag_3()),
        u8::from(cpu.flag_pv()),
        u8::from(cpu.flag_n()),
        u8::from(cpu.flag_c()),
    );
}
