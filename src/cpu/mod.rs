//! Zilog Z80 CPU implementation
//!
//! # Module Organization
//!
//! - `flags`: Flag bit constants and the precomputed flag tables
//! - `helpers`: Register access, fetch, push/pop, ALU and block-op primitives
//! - `execute`: Instruction decode and execution for all five opcode tables
//!
//! # Register Set
//!
//! The main file (AF, BC, DE, HL) has a full shadow file reachable with
//! `EX AF,AF'` and `EXX`. IX and IY split into undocumented 8-bit halves. F
//! is stored as a byte holding everything but carry plus a separate carry
//! flag; the composed register is available through [`Cpu::f`]. R is a 7-bit
//! counter whose top bit is preserved separately, composed by
//! [`Cpu::reg_r`]. MEMPTR (WZ) is modelled because a handful of undocumented
//! flag results depend on it.
//!
//! # References
//! - Zilog Z80 CPU User Manual (UM0080)
//! - Sean Young, "The Undocumented Z80 Documented"

use crate::bus::Bus;

// Module declarations
mod execute;
pub mod flags;
mod helpers;

#[cfg(test)]
mod tests;

/// Maskable interrupt response modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterruptMode {
    /// Mode 0: execute an instruction supplied on the data bus. Serviced
    /// identically to mode 1 here; emulated buses rarely supply a vector.
    #[default]
    Mode0,
    /// Mode 1: call to 0x0038
    Mode1,
    /// Mode 2: vectored through `(I << 8) | 0xFF`
    Mode2,
}

/// Z80 CPU state
pub struct Cpu {
    /// Accumulator
    pub a: u8,
    // F minus the carry bit; bit 0 is always clear here. Carry lives apart
    // because nearly every arithmetic path touches it separately.
    sz5h3pn: u8,
    carry: bool,

    /// BC register pair
    pub bc: u16,
    /// DE register pair
    pub de: u16,
    /// HL register pair
    pub hl: u16,

    /// Shadow accumulator
    pub a_prime: u8,
    /// Shadow flags (stored composed; only EX AF,AF' touches it)
    pub f_prime: u8,
    /// Shadow BC
    pub bc_prime: u16,
    /// Shadow DE
    pub de_prime: u16,
    /// Shadow HL
    pub hl_prime: u16,

    /// IX index register
    pub ix: u16,
    /// IY index register
    pub iy: u16,

    /// Program counter
    pub pc: u16,
    /// Stack pointer
    pub sp: u16,
    /// Interrupt vector base
    pub i: u8,
    // R is a 7-bit refresh counter; bit 7 is only changed by LD R,A and is
    // reattached on read.
    r: u8,
    r7: bool,

    /// Hidden MEMPTR/WZ register. Observable only through the bits-5/3
    /// behaviour of CCF/SCF and BIT n,(HL).
    pub memptr: u16,

    /// Interrupt enable flip-flop 1 (gates INT)
    pub iff1: bool,
    /// Interrupt enable flip-flop 2 (survives NMI service for RETN)
    pub iff2: bool,
    /// Interrupt mode
    pub im: InterruptMode,
    /// CPU is executing HALT; PC was rewound onto the HALT opcode
    pub halted: bool,

    // Edge-triggered NMI latch and level-sensitive INT line
    active_nmi: bool,
    active_int: bool,
    // EI enables interrupts only after the next instruction completes
    pending_ei: bool,
    // Next reset came from /RESET rather than power-on
    pin_reset: bool,

    // Whether the current / previous instruction wrote F. CCF/SCF need this
    // for their bits-5/3 result.
    flag_q: bool,
    last_flag_q: bool,

    breakpoints: Box<[bool; 0x10000]>,
    armed_breakpoints: u32,
    notify_exec_done: bool,
}

impl Cpu {
    /// Create a CPU in the power-on state: PC, I, R and the interrupt state
    /// cleared, everything else 0xFF (Zilog Z8400APS behaviour).
    pub fn new() -> Self {
        Self {
            a: 0xFF,
            sz5h3pn: 0xFE,
            carry: true,

            bc: 0xFFFF,
            de: 0xFFFF,
            hl: 0xFFFF,

            a_prime: 0xFF,
            f_prime: 0xFF,
            bc_prime: 0xFFFF,
            de_prime: 0xFFFF,
            hl_prime: 0xFFFF,

            ix: 0xFFFF,
            iy: 0xFFFF,

            pc: 0,
            sp: 0xFFFF,
            i: 0,
            r: 0,
            r7: false,

            memptr: 0xFFFF,

            iff1: false,
            iff2: false,
            im: InterruptMode::Mode0,
            halted: false,

            active_nmi: false,
            active_int: false,
            pending_ei: false,
            pin_reset: false,

            flag_q: false,
            last_flag_q: false,

            breakpoints: vec![false; 0x10000]
                .into_boxed_slice()
                .try_into()
                .unwrap(),
            armed_breakpoints: 0,
            notify_exec_done: false,
        }
    }

    /// Reset the CPU.
    ///
    /// After [`set_pin_reset`](Self::set_pin_reset) this behaves like the
    /// /RESET pin: PC, I, R, the interrupt flip-flops and IM are cleared and
    /// every other register is preserved. Otherwise it is a power-on reset
    /// and the main, shadow and index registers come up as 0xFFFF.
    pub fn reset(&mut self) {
        if self.pin_reset {
            self.pin_reset = false;
        } else {
            self.a = 0xFF;
            self.set_f(0xFF);
            self.a_prime = 0xFF;
            self.f_prime = 0xFF;

            self.bc = 0xFFFF;
            self.bc_prime = 0xFFFF;
            self.de = 0xFFFF;
            self.de_prime = 0xFFFF;
            self.hl = 0xFFFF;
            self.hl_prime = 0xFFFF;

            self.ix = 0xFFFF;
            self.iy = 0xFFFF;

            self.sp = 0xFFFF;
            self.memptr = 0xFFFF;
        }

        self.pc = 0;
        self.i = 0;
        self.r = 0;
        self.r7 = false;
        self.iff1 = false;
        self.iff2 = false;
        self.pending_ei = false;
        self.active_nmi = false;
        self.active_int = false;
        self.halted = false;
        self.im = InterruptMode::Mode0;
        self.flag_q = false;
        self.last_flag_q = false;
    }

    // ========== Instruction Execution ==========

    /// Execute one instruction, or accept one pending interrupt.
    ///
    /// Checks the NMI latch first, then the INT line (gated by IFF1 and the
    /// EI shadow). Accepting either consumes the whole call; the first ISR
    /// instruction runs on the next one. Otherwise this notifies an armed
    /// breakpoint, fetches at PC, dispatches, and handles the EI-shadow and
    /// flag-modification bookkeeping.
    ///
    /// Returns the T-states consumed, measured as the delta of the bus
    /// counter across the call.
    pub fn step(&mut self, bus: &mut impl Bus) -> u32 {
        let start = bus.tstates();

        if self.active_nmi {
            self.active_nmi = false;
            self.last_flag_q = false;
            self.nmi(bus);
            return (bus.tstates() - start) as u32;
        }

        if self.active_int && self.iff1 && !self.pending_ei {
            self.last_flag_q = false;
            self.interruption(bus);
            return (bus.tstates() - start) as u32;
        }

        if self.armed_breakpoints > 0 && self.breakpoints[self.pc as usize] {
            bus.breakpoint(self.pc);
        }

        let opcode = self.fetch_opcode(bus);
        self.flag_q = false;
        self.decode(bus, opcode);
        self.last_flag_q = self.flag_q;

        // EI enables interrupts only after the following instruction, and a
        // chain of EIs keeps the shadow alive.
        if self.pending_ei && opcode != 0xFB {
            self.pending_ei = false;
        }

        if self.notify_exec_done {
            bus.exec_done();
        }

        (bus.tstates() - start) as u32
    }

    /// Repeat [`step`](Self::step) while the bus T-state counter is below
    /// `limit_tstates`.
    pub fn run_until(&mut self, bus: &mut impl Bus, limit_tstates: u64) {
        while bus.tstates() < limit_tstates {
            self.step(bus);
        }
    }

    /// Service a maskable interrupt.
    ///
    /// 7 T-states to acknowledge, then the push; IM2 adds the vector read.
    /// IM0 is serviced like IM1.
    fn interruption(&mut self, bus: &mut impl Bus) {
        log::trace!("INT accepted at pc={:04X} im={:?}", self.pc, self.im);

        // A CPU waiting in HALT resumes past the HALT opcode
        if self.halted {
            self.halted = false;
            self.pc = self.pc.wrapping_add(1);
        }

        bus.address_on_bus(self.pc, 7);
        self.r = self.r.wrapping_add(1) & 0x7F;
        self.iff1 = false;
        self.iff2 = false;
        self.push(bus, self.pc);
        self.pc = match self.im {
            InterruptMode::Mode2 => bus.peek16((u16::from(self.i) << 8) | 0x00FF),
            _ => 0x0038,
        };
        self.memptr = self.pc;
    }

    /// Service a non-maskable interrupt: discarded M1 fetch, one internal
    /// cycle, push, jump to 0x0066. IFF1 is cleared, IFF2 keeps the pre-NMI
    /// state for RETN.
    fn nmi(&mut self, bus: &mut impl Bus) {
        log::trace!("NMI accepted at pc={:04X}", self.pc);

        // The discarded fetch is also what pulls a halted CPU off the bus
        bus.fetch_opcode(self.pc);
        bus.address_on_bus(self.pc, 1);
        if self.halted {
            self.halted = false;
            self.pc = self.pc.wrapping_add(1);
        }
        self.r = self.r.wrapping_add(1) & 0x7F;
        self.iff1 = false;
        self.push(bus, self.pc);
        self.pc = 0x0066;
        self.memptr = 0x0066;
    }

    // ========== Interrupt Lines ==========

    /// Latch an NMI edge. Consumed by the next [`step`](Self::step).
    pub fn trigger_nmi(&mut self) {
        self.active_nmi = true;
    }

    pub fn is_nmi(&self) -> bool {
        self.active_nmi
    }

    /// Force the NMI latch state (host convenience; the pin itself is edge
    /// triggered, see [`trigger_nmi`](Self::trigger_nmi)).
    pub fn set_nmi(&mut self, nmi: bool) {
        self.active_nmi = nmi;
    }

    /// Drive the level-sensitive INT line. The peripheral holds it high
    /// until serviced; the CPU samples it at the top of each step.
    pub fn set_int_line(&mut self, int_line: bool) {
        self.active_int = int_line;
    }

    pub fn is_int_line(&self) -> bool {
        self.active_int
    }

    /// True for exactly one instruction after EI.
    pub fn is_pending_ei(&self) -> bool {
        self.pending_ei
    }

    pub fn set_pending_ei(&mut self, state: bool) {
        self.pending_ei = state;
    }

    /// Make the next [`reset`](Self::reset) behave as a /RESET pin reset.
    pub fn set_pin_reset(&mut self) {
        self.pin_reset = true;
    }

    // ========== Breakpoints ==========

    /// Arm or disarm the breakpoint notification for `address`.
    pub fn set_breakpoint(&mut self, address: u16, state: bool) {
        let slot = &mut self.breakpoints[address as usize];
        if *slot != state {
            *slot = state;
            if state {
                self.armed_breakpoints += 1;
            } else {
                self.armed_breakpoints -= 1;
            }
        }
    }

    pub fn is_breakpoint(&self, address: u16) -> bool {
        self.breakpoints[address as usize]
    }

    /// Disarm every breakpoint.
    pub fn reset_breakpoints(&mut self) {
        self.breakpoints.fill(false);
        self.armed_breakpoints = 0;
    }

    /// Enable or disable the per-instruction `exec_done` bus notification.
    pub fn set_exec_done_notify(&mut self, state: bool) {
        self.notify_exec_done = state;
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}
