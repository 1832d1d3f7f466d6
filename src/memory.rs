//! Flat 64 KiB reference bus
//!
//! [`FlatBus`] wires the whole address space to RAM and the whole port space
//! to a latch array, and bills the canonical Z80 timings: 4 T-states per
//! opcode fetch, 3 per memory byte, 4 per port access, plus whatever idle
//! cycles the CPU asks for. There is no contention and no memory map - this
//! is the environment the ZEXALL suite and the crate's own tests run in, and
//! a reasonable starting point for a host.

use crate::bus::Bus;

/// 64 KiB of flat RAM, 64 KiB of port latches, and an owned T-state clock.
pub struct FlatBus {
    ram: Box<[u8; 0x10000]>,
    ports: Box<[u8; 0x10000]>,
    tstates: u64,
}

impl FlatBus {
    pub fn new() -> Self {
        Self {
            ram: vec![0u8; 0x10000].into_boxed_slice().try_into().unwrap(),
            ports: vec![0u8; 0x10000].into_boxed_slice().try_into().unwrap(),
            tstates: 0,
        }
    }

    /// Copy `bytes` into RAM starting at `address`, wrapping at 64 KiB.
    pub fn load(&mut self, address: u16, bytes: &[u8]) {
        for (i, &byte) in bytes.iter().enumerate() {
            self.ram[address.wrapping_add(i as u16) as usize] = byte;
        }
    }

    /// Direct RAM read without billing T-states (host/debugger use).
    pub fn read_ram(&self, address: u16) -> u8 {
        self.ram[address as usize]
    }

    /// Direct RAM write without billing T-states.
    pub fn write_ram(&mut self, address: u16, value: u8) {
        self.ram[address as usize] = value;
    }

    /// Preload the value a port will return on `IN`.
    pub fn set_port(&mut self, port: u16, value: u8) {
        self.ports[port as usize] = value;
    }

    /// The last value written to `port`, or the preloaded input value.
    pub fn port(&self, port: u16) -> u8 {
        self.ports[port as usize]
    }

    pub fn reset_clock(&mut self) {
        self.tstates = 0;
    }
}

impl Default for FlatBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for FlatBus {
    fn fetch_opcode(&mut self, address: u16) -> u8 {
        // 3 clocks to read the byte plus 1 refresh clock
        self.tstates += 4;
        self.ram[address as usize]
    }

    fn peek8(&mut self, address: u16) -> u8 {
        self.tstates += 3;
        self.ram[address as usize]
    }

    fn poke8(&mut self, address: u16, value: u8) {
        self.tstates += 3;
        self.ram[address as usize] = value;
    }

    fn in_port(&mut self, port: u16) -> u8 {
        self.tstates += 4;
        self.ports[port as usize]
    }

    fn out_port(&mut self, port: u16, value: u8) {
        self.tstates += 4;
        self.ports[port as usize] = value;
    }

    fn address_on_bus(&mut self, _address: u16, tstates: u32) {
        self.tstates += u64::from(tstates);
    }

    fn tstates(&self) -> u64 {
        self.tstates
    }
}
