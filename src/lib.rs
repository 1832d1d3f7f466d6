//! Cycle-accurate Zilog Z80 CPU core
//!
//! This crate provides a platform-agnostic Z80 interpreter intended as a
//! drop-in CPU core for retro-computer emulators and as a deterministic
//! harness for Z80 software (it passes the ZEXALL/ZEXDOC conformance suites
//! bit for bit). The crate is a library only: memory, I/O ports, video, tape
//! and every other machine concern live on the host side of the [`Bus`]
//! trait.
//!
//! # Architecture
//!
//! - `bus`: the [`Bus`] trait the CPU drives for every memory, port and
//!   idle-bus cycle. The host owns the T-state counter and advances it from
//!   these callbacks, which is what makes contended-memory models possible.
//! - `memory`: [`FlatBus`], a 64 KiB flat-RAM implementation of [`Bus`] with
//!   canonical Z80 timings, used by the test suites and handy as a starting
//!   point for hosts.
//! - `cpu`: the [`Cpu`] itself - architectural state, decode/execute for the
//!   unprefixed, CB, ED, DD/FD and DD/FD-CB opcode tables, interrupt
//!   acceptance and the reset paths.
//!
//! # Compatibility
//!
//! Opcode semantics, documented and undocumented flag results (bits 3/5,
//! CCF/SCF interaction with the previous instruction, MEMPTR-derived flags of
//! `BIT n,(HL)`), and T-state counts match the Zilog Z8400APS as documented
//! by Sean Young. Two behaviours vary between Z80 revisions and are fixed
//! here: IM0 is serviced like IM1 (the bus is not asked to supply an opcode),
//! and the undocumented `OUT (C),0` writes 0x00 (NMOS behaviour).
//!
//! # Driving the CPU
//!
//! ```
//! use z80_core::{Bus, Cpu, FlatBus};
//!
//! let mut bus = FlatBus::new();
//! bus.load(0x0000, &[0x3E, 0x2A, 0x76]); // LD A,0x2A; HALT
//! let mut cpu = Cpu::new();
//! while !cpu.halted {
//!     cpu.step(&mut bus);
//! }
//! assert_eq!(cpu.a, 0x2A);
//! assert_eq!(bus.tstates(), 11);
//! ```

pub mod bus;
pub mod cpu;
pub mod memory;

pub use bus::Bus;
pub use cpu::{Cpu, InterruptMode};
pub use memory::FlatBus;
