//! Bus contract between the CPU and its host
//!
//! The CPU calls back into the host for every memory access, port access and
//! idle-bus cycle, in the exact order the hardware performs them. The host
//! bills T-states from these callbacks into a counter it owns; the CPU never
//! reads that counter to make timing decisions, it only deposits increments.
//! That split is what lets a host model contended memory: it sees every
//! address the CPU puts on the bus, including the addresses of internal
//! cycles.
//!
//! All methods are synchronous and infallible. A host whose backing store can
//! fail must resolve or panic at its own layer; the CPU takes every returned
//! byte at face value.

/// Capabilities a host must provide to drive the CPU.
///
/// `breakpoint` and `exec_done` are optional notifications with no-op
/// defaults, so a bus that does not care simply omits them. `peek16` and
/// `poke16` default to two 8-bit accesses in hardware order (low byte first)
/// and only need overriding when a host wants to bill them differently.
pub trait Bus {
    /// Read an opcode byte during an M1 cycle. Costs 4 T-states on real
    /// hardware; the host bills them here.
    fn fetch_opcode(&mut self, address: u16) -> u8;

    /// Read a byte from memory. 3 T-states.
    fn peek8(&mut self, address: u16) -> u8;

    /// Write a byte to memory. 3 T-states.
    fn poke8(&mut self, address: u16, value: u8);

    /// Read a little-endian word. Order matters: first the low byte, then
    /// the high byte, each a separate 3 T-state access.
    fn peek16(&mut self, address: u16) -> u16 {
        let lsb = self.peek8(address);
        let msb = self.peek8(address.wrapping_add(1));
        u16::from_le_bytes([lsb, msb])
    }

    /// Write a little-endian word. Order matters: first the low byte, then
    /// the high byte.
    fn poke16(&mut self, address: u16, word: u16) {
        let [lsb, msb] = word.to_le_bytes();
        self.poke8(address, lsb);
        self.poke8(address.wrapping_add(1), msb);
    }

    /// Read a byte from the 16-bit I/O port space. At least 4 T-states; the
    /// exact count is the host's I/O cycle model.
    fn in_port(&mut self, port: u16) -> u8;

    /// Write a byte to the I/O port space. At least 4 T-states.
    fn out_port(&mut self, port: u16, value: u8);

    /// `address` is held on the bus for `tstates` idle cycles while the CPU
    /// does internal work. Contention models hook here.
    fn address_on_bus(&mut self, address: u16, tstates: u32);

    /// The host's running T-state counter. Read by [`Cpu::run_until`] and to
    /// compute the per-instruction delta [`Cpu::step`] returns, never inside
    /// an instruction.
    ///
    /// [`Cpu::run_until`]: crate::Cpu::run_until
    /// [`Cpu::step`]: crate::Cpu::step
    fn tstates(&self) -> u64;

    /// Notification that the CPU is about to execute the instruction at
    /// `address`, fired when the address is armed in the CPU's breakpoint
    /// map.
    fn breakpoint(&mut self, _address: u16) {}

    /// Notification that an instruction just retired, fired when enabled via
    /// [`Cpu::set_exec_done_notify`].
    ///
    /// [`Cpu::set_exec_done_notify`]: crate::Cpu::set_exec_done_notify
    fn exec_done(&mut self) {}
}
