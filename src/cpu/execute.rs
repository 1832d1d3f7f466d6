//! Z80 instruction decode and execution
//!
//! Opcodes are decomposed into the x-y-z (and p-q) bit fields of the Z80
//! opcode grid rather than enumerated case by case:
//! - `decode`: top-level dispatch of an already-fetched opcode
//! - `execute_x0` / `execute_x3`: the unprefixed x=0 and x=3 quadrants
//! - `execute_alu`: the eight accumulator operations (x=2 and the immediates)
//! - `execute_cb` / `execute_rot`: CB prefix (rotates, shifts, BIT/RES/SET)
//! - `execute_ed` / `execute_bli`: ED prefix and the block instructions
//! - `execute_index` (+ `_x0`, `_x3`, `_cb`): DD/FD prefixes with the IX/IY
//!   and IXh/IXl substitutions, including the undocumented dual-write
//!   DD/FD CB forms
//!
//! Handlers perform their bus calls (including the idle `address_on_bus`
//! cycles of internal CPU work) in the exact order the silicon does; hosts
//! modelling contention depend on that order.

use super::flags;
use super::flags::{SZ53N_ADD, SZ53PN_ADD};
use super::Cpu;
use super::InterruptMode;
use crate::bus::Bus;

impl Cpu {
    /// Dispatch one fetched opcode byte.
    pub(super) fn decode(&mut self, bus: &mut impl Bus, opcode: u8) {
        let x = opcode >> 6;
        let y = (opcode >> 3) & 0x07;
        let z = opcode & 0x07;

        match x {
            0 => self.execute_x0(bus, y, z),
            1 => {
                if opcode == 0x76 {
                    // HALT: rewind PC so the opcode re-executes until an
                    // interrupt is accepted
                    self.pc = self.pc.wrapping_sub(1);
                    self.halted = true;
                } else {
                    // LD r,r'
                    let value = self.get_reg8(z, bus);
                    self.set_reg8(y, value, bus);
                }
            }
            2 => {
                // ALU A,r
                let value = self.get_reg8(z, bus);
                self.execute_alu(y, value);
            }
            _ => self.execute_x3(bus, y, z),
        }
    }

    /// Execute x=0 opcodes: relative jumps, 16-bit loads/arithmetic,
    /// indirect accumulator loads, INC/DEC, and the accumulator/flag group.
    fn execute_x0(&mut self, bus: &mut impl Bus, y: u8, z: u8) {
        match z {
            0 => match y {
                0 => {} // NOP
                1 => self.ex_af_af(),
                2 => {
                    // DJNZ e
                    bus.address_on_bus(self.pair_ir(), 1);
                    let offset = bus.peek8(self.pc) as i8;
                    self.set_b(self.b().wrapping_sub(1));
                    if self.b() != 0 {
                        bus.address_on_bus(self.pc, 5);
                        self.pc = self.pc.wrapping_add(1).wrapping_add(offset as u16);
                        self.memptr = self.pc;
                    } else {
                        self.pc = self.pc.wrapping_add(1);
                    }
                }
                3 => {
                    // JR e
                    let offset = bus.peek8(self.pc) as i8;
                    bus.address_on_bus(self.pc, 5);
                    self.pc = self.pc.wrapping_add(1).wrapping_add(offset as u16);
                    self.memptr = self.pc;
                }
                _ => {
                    // JR cc,e: the displacement is read even when not taken
                    let offset = bus.peek8(self.pc) as i8;
                    if self.check_cc(y - 4) {
                        bus.address_on_bus(self.pc, 5);
                        self.pc = self.pc.wrapping_add(offset as u16);
                        self.memptr = self.pc.wrapping_add(1);
                    }
                    self.pc = self.pc.wrapping_add(1);
                }
            },
            1 => {
                let p = y >> 1;
                if y & 0x01 == 0 {
                    // LD rp,nn
                    let word = self.fetch16(bus);
                    self.set_rp(p, word);
                } else {
                    // ADD HL,rp
                    bus.address_on_bus(self.pair_ir(), 7);
                    let oper = self.get_rp(p);
                    self.hl = self.add16(self.hl, oper);
                }
            }
            2 => match y {
                0 => {
                    // LD (BC),A. MEMPTR: A on top of the incremented low byte
                    bus.poke8(self.bc, self.a);
                    self.memptr = (u16::from(self.a) << 8) | (u16::from(self.c()) + 1);
                }
                1 => {
                    // LD A,(BC)
                    self.memptr = self.bc;
                    self.a = bus.peek8(self.memptr);
                    self.memptr = self.memptr.wrapping_add(1);
                }
                2 => {
                    // LD (DE),A
                    bus.poke8(self.de, self.a);
                    self.memptr = (u16::from(self.a) << 8) | (u16::from(self.e()) + 1);
                }
                3 => {
                    // LD A,(DE)
                    self.memptr = self.de;
                    self.a = bus.peek8(self.memptr);
                    self.memptr = self.memptr.wrapping_add(1);
                }
                4 => {
                    // LD (nn),HL
                    self.memptr = self.fetch16(bus);
                    bus.poke16(self.memptr, self.hl);
                    self.memptr = self.memptr.wrapping_add(1);
                }
                5 => {
                    // LD HL,(nn)
                    self.memptr = self.fetch16(bus);
                    self.hl = bus.peek16(self.memptr);
                    self.memptr = self.memptr.wrapping_add(1);
                }
                6 => {
                    // LD (nn),A
                    let addr = self.fetch16(bus);
                    bus.poke8(addr, self.a);
                    self.memptr = (u16::from(self.a) << 8) | (addr.wrapping_add(1) & 0xFF);
                }
                _ => {
                    // LD A,(nn)
                    self.memptr = self.fetch16(bus);
                    self.a = bus.peek8(self.memptr);
                    self.memptr = self.memptr.wrapping_add(1);
                }
            },
            3 => {
                // INC/DEC rp: pure internal work
                bus.address_on_bus(self.pair_ir(), 2);
                let p = y >> 1;
                let word = if y & 0x01 == 0 {
                    self.get_rp(p).wrapping_add(1)
                } else {
                    self.get_rp(p).wrapping_sub(1)
                };
                self.set_rp(p, word);
            }
            4 => {
                // INC r
                if y == 6 {
                    let value = self.alu_inc(bus.peek8(self.hl));
                    bus.address_on_bus(self.hl, 1);
                    bus.poke8(self.hl, value);
                } else {
                    let value = self.get_reg8(y, bus);
                    let res = self.alu_inc(value);
                    self.set_reg8(y, res, bus);
                }
            }
            5 => {
                // DEC r
                if y == 6 {
                    let value = self.alu_dec(bus.peek8(self.hl));
                    bus.address_on_bus(self.hl, 1);
                    bus.poke8(self.hl, value);
                } else {
                    let value = self.get_reg8(y, bus);
                    let res = self.alu_dec(value);
                    self.set_reg8(y, res, bus);
                }
            }
            6 => {
                // LD r,n
                let value = self.fetch8(bus);
                self.set_reg8(y, value, bus);
            }
            _ => match y {
                0 => {
                    // RLCA: only C and bits 5/3 change
                    self.carry = self.a > 0x7F;
                    self.a <<= 1;
                    if self.carry {
                        self.a |= 0x01;
                    }
                    self.sz5h3pn =
                        (self.sz5h3pn & flags::MASK_SZP) | (self.a & flags::MASK_53);
                    self.flag_q = true;
                }
                1 => {
                    // RRCA
                    self.carry = self.a & 0x01 != 0;
                    self.a >>= 1;
                    if self.carry {
                        self.a |= 0x80;
                    }
                    self.sz5h3pn =
                        (self.sz5h3pn & flags::MASK_SZP) | (self.a & flags::MASK_53);
                    self.flag_q = true;
                }
                2 => {
                    // RLA
                    let old_carry = self.carry;
                    self.carry = self.a > 0x7F;
                    self.a <<= 1;
                    if old_carry {
                        self.a |= 0x01;
                    }
                    self.sz5h3pn =
                        (self.sz5h3pn & flags::MASK_SZP) | (self.a & flags::MASK_53);
                    self.flag_q = true;
                }
                3 => {
                    // RRA
                    let old_carry = self.carry;
                    self.carry = self.a & 0x01 != 0;
                    self.a >>= 1;
                    if old_carry {
                        self.a |= 0x80;
                    }
                    self.sz5h3pn =
                        (self.sz5h3pn & flags::MASK_SZP) | (self.a & flags::MASK_53);
                    self.flag_q = true;
                }
                4 => self.daa(),
                5 => {
                    // CPL
                    self.a = !self.a;
                    self.sz5h3pn = (self.sz5h3pn & flags::MASK_SZP)
                        | flags::H
                        | (self.a & flags::MASK_53)
                        | flags::N;
                    self.flag_q = true;
                }
                6 => {
                    // SCF. Bits 5/3: F of the previous instruction if it
                    // wrote flags, else 0, XORed with F, ORed with A.
                    let reg_q = if self.last_flag_q { self.sz5h3pn } else { 0 };
                    self.carry = true;
                    self.sz5h3pn = (self.sz5h3pn & flags::MASK_SZP)
                        | (((reg_q ^ self.sz5h3pn) | self.a) & flags::MASK_53);
                    self.flag_q = true;
                }
                _ => {
                    // CCF: same bits-5/3 rule as SCF; H takes the old carry
                    let reg_q = if self.last_flag_q { self.sz5h3pn } else { 0 };
                    self.sz5h3pn = (self.sz5h3pn & flags::MASK_SZP)
                        | (((reg_q ^ self.sz5h3pn) | self.a) & flags::MASK_53);
                    if self.carry {
                        self.sz5h3pn |= flags::H;
                    }
                    self.carry = !self.carry;
                    self.flag_q = true;
                }
            },
        }
    }

    /// The eight accumulator operations, selected by y.
    fn execute_alu(&mut self, y: u8, value: u8) {
        match y {
            0 => self.alu_add(value),
            1 => self.alu_adc(value),
            2 => self.alu_sub(value),
            3 => self.alu_sbc(value),
            4 => self.alu_and(value),
            5 => self.alu_xor(value),
            6 => self.alu_or(value),
            _ => self.alu_cp(value),
        }
    }

    /// Execute x=3 opcodes: conditional flow, stack, I/O, exchanges and the
    /// prefix escapes.
    fn execute_x3(&mut self, bus: &mut impl Bus, y: u8, z: u8) {
        match z {
            0 => {
                // RET cc: the internal cycle is paid even when not taken
                bus.address_on_bus(self.pair_ir(), 1);
                if self.check_cc(y) {
                    self.pc = self.pop(bus);
                    self.memptr = self.pc;
                }
            }
            1 => {
                if y & 0x01 == 0 {
                    // POP rp2
                    let word = self.pop(bus);
                    self.set_rp2(y >> 1, word);
                } else {
                    match y >> 1 {
                        0 => {
                            // RET
                            self.pc = self.pop(bus);
                            self.memptr = self.pc;
                        }
                        1 => self.exx(),
                        2 => self.pc = self.hl, // JP (HL); MEMPTR untouched
                        _ => {
                            // LD SP,HL
                            bus.address_on_bus(self.pair_ir(), 2);
                            self.sp = self.hl;
                        }
                    }
                }
            }
            2 => {
                // JP cc,nn: the target lands in MEMPTR either way
                self.memptr = bus.peek16(self.pc);
                if self.check_cc(y) {
                    self.pc = self.memptr;
                } else {
                    self.pc = self.pc.wrapping_add(2);
                }
            }
            3 => match y {
                0 => {
                    // JP nn
                    self.memptr = bus.peek16(self.pc);
                    self.pc = self.memptr;
                }
                1 => self.execute_cb(bus),
                2 => {
                    // OUT (n),A
                    let n = self.fetch8(bus);
                    self.memptr = u16::from(self.a) << 8;
                    bus.out_port(self.memptr | u16::from(n), self.a);
                    self.memptr |= u16::from(n) + 1;
                }
                3 => {
                    // IN A,(n)
                    let n = self.fetch8(bus);
                    self.memptr = (u16::from(self.a) << 8) | u16::from(n);
                    self.a = bus.in_port(self.memptr);
                    self.memptr = self.memptr.wrapping_add(1);
                }
                4 => {
                    // EX (SP),HL. The write-back goes high byte first, the
                    // reverse of poke16; observers must see that order.
                    let hl = self.hl;
                    self.hl = bus.peek16(self.sp);
                    bus.address_on_bus(self.sp.wrapping_add(1), 1);
                    bus.poke8(self.sp.wrapping_add(1), (hl >> 8) as u8);
                    bus.poke8(self.sp, hl as u8);
                    bus.address_on_bus(self.sp, 2);
                    self.memptr = self.hl;
                }
                5 => self.ex_de_hl(),
                6 => {
                    // DI
                    self.iff1 = false;
                    self.iff2 = false;
                }
                _ => {
                    // EI: interrupts stay masked for one more instruction
                    self.iff1 = true;
                    self.iff2 = true;
                    self.pending_ei = true;
                }
            },
            4 => {
                // CALL cc,nn: both immediate bytes are consumed either way
                self.memptr = bus.peek16(self.pc);
                if self.check_cc(y) {
                    bus.address_on_bus(self.pc.wrapping_add(1), 1);
                    self.push(bus, self.pc.wrapping_add(2));
                    self.pc = self.memptr;
                } else {
                    self.pc = self.pc.wrapping_add(2);
                }
            }
            5 => {
                if y & 0x01 == 0 {
                    // PUSH rp2
                    bus.address_on_bus(self.pair_ir(), 1);
                    let word = self.get_rp2(y >> 1);
                    self.push(bus, word);
                } else {
                    match y >> 1 {
                        0 => {
                            // CALL nn
                            self.memptr = bus.peek16(self.pc);
                            bus.address_on_bus(self.pc.wrapping_add(1), 1);
                            self.push(bus, self.pc.wrapping_add(2));
                            self.pc = self.memptr;
                        }
                        1 => self.execute_index(bus, true),
                        2 => self.execute_ed(bus),
                        _ => self.execute_index(bus, false),
                    }
                }
            }
            6 => {
                // ALU A,n
                let value = self.fetch8(bus);
                self.execute_alu(y, value);
            }
            _ => {
                // RST y*8
                bus.address_on_bus(self.pair_ir(), 1);
                self.push(bus, self.pc);
                self.pc = u16::from(y) * 8;
                self.memptr = self.pc;
            }
        }
    }

    // ========== CB Prefix (Rotates, Shifts, Bit Operations) ==========

    /// Execute a CB-prefixed instruction. The sub-opcode is a second M1
    /// fetch, so R is incremented again.
    fn execute_cb(&mut self, bus: &mut impl Bus) {
        let opcode = self.fetch_opcode(bus);
        let x = opcode >> 6;
        let y = (opcode >> 3) & 0x07;
        let z = opcode & 0x07;

        match x {
            0 => {
                // Rotate/shift
                if z == 6 {
                    let value = bus.peek8(self.hl);
                    let res = self.execute_rot(y, value);
                    bus.address_on_bus(self.hl, 1);
                    bus.poke8(self.hl, res);
                } else {
                    let value = self.get_reg8(z, bus);
                    let res = self.execute_rot(y, value);
                    self.set_reg8(z, res, bus);
                }
            }
            1 => {
                // BIT y,r. The memory form takes bits 5/3 from MEMPTR's
                // high byte instead of the operand.
                let value = self.get_reg8(z, bus);
                self.bit_test(1 << y, value);
                if z == 6 {
                    self.sz5h3pn = (self.sz5h3pn & flags::MASK_SZHP)
                        | ((self.memptr >> 8) as u8 & flags::MASK_53);
                    bus.address_on_bus(self.hl, 1);
                }
            }
            2 => {
                // RES y,r: flags untouched
                if z == 6 {
                    let value = bus.peek8(self.hl) & !(1 << y);
                    bus.address_on_bus(self.hl, 1);
                    bus.poke8(self.hl, value);
                } else {
                    let value = self.get_reg8(z, bus) & !(1 << y);
                    self.set_reg8(z, value, bus);
                }
            }
            _ => {
                // SET y,r
                if z == 6 {
                    let value = bus.peek8(self.hl) | (1 << y);
                    bus.address_on_bus(self.hl, 1);
                    bus.poke8(self.hl, value);
                } else {
                    let value = self.get_reg8(z, bus) | (1 << y);
                    self.set_reg8(z, value, bus);
                }
            }
        }
    }

    /// The eight CB rotate/shift operations, selected by y.
    fn execute_rot(&mut self, y: u8, value: u8) -> u8 {
        match y {
            0 => self.rlc(value),
            1 => self.rrc(value),
            2 => self.rl(value),
            3 => self.rr(value),
            4 => self.sla(value),
            5 => self.sra(value),
            6 => self.sll(value),
            _ => self.srl(value),
        }
    }

    // ========== ED Prefix (Extended Instructions) ==========

    /// Execute an ED-prefixed instruction. Undefined slots execute as
    /// no-ops, costing only the two fetches.
    fn execute_ed(&mut self, bus: &mut impl Bus) {
        let opcode = self.fetch_opcode(bus);
        let x = opcode >> 6;
        let y = (opcode >> 3) & 0x07;
        let z = opcode & 0x07;

        match x {
            1 => match z {
                0 => {
                    // IN r,(C); IN (C) for y=6 sets flags only
                    self.memptr = self.bc;
                    let value = bus.in_port(self.memptr);
                    self.memptr = self.memptr.wrapping_add(1);
                    if y != 6 {
                        self.set_reg8(y, value, bus);
                    }
                    self.sz5h3pn = SZ53PN_ADD[value as usize];
                    self.flag_q = true;
                }
                1 => {
                    // OUT (C),r; OUT (C),0 for y=6 (NMOS: writes 0x00)
                    self.memptr = self.bc;
                    let value = if y == 6 { 0x00 } else { self.get_reg8(y, bus) };
                    bus.out_port(self.memptr, value);
                    self.memptr = self.memptr.wrapping_add(1);
                }
                2 => {
                    // SBC/ADC HL,rp
                    bus.address_on_bus(self.pair_ir(), 7);
                    let oper = self.get_rp(y >> 1);
                    if y & 0x01 == 0 {
                        self.sbc16(oper);
                    } else {
                        self.adc16(oper);
                    }
                }
                3 => {
                    // LD (nn),rp / LD rp,(nn)
                    self.memptr = self.fetch16(bus);
                    if y & 0x01 == 0 {
                        bus.poke16(self.memptr, self.get_rp(y >> 1));
                    } else {
                        let word = bus.peek16(self.memptr);
                        self.set_rp(y >> 1, word);
                    }
                    self.memptr = self.memptr.wrapping_add(1);
                }
                4 => {
                    // NEG (every y)
                    let value = self.a;
                    self.a = 0;
                    self.carry = false;
                    self.alu_sbc(value);
                }
                5 => {
                    // RETN, and RETI which behaves identically: IFF1 is
                    // restored from IFF2
                    self.iff1 = self.iff2;
                    self.pc = self.pop(bus);
                    self.memptr = self.pc;
                }
                6 => {
                    // IM 0/1/2 (0x4E/0x6E select IM0 as well)
                    self.im = match y & 0x03 {
                        0 | 1 => InterruptMode::Mode0,
                        2 => InterruptMode::Mode1,
                        _ => InterruptMode::Mode2,
                    };
                }
                _ => match y {
                    0 => {
                        // LD I,A: IR goes on the bus before I changes
                        bus.address_on_bus(self.pair_ir(), 1);
                        self.i = self.a;
                    }
                    1 => {
                        // LD R,A
                        bus.address_on_bus(self.pair_ir(), 1);
                        let value = self.a;
                        self.set_reg_r(value);
                    }
                    2 => {
                        // LD A,I: P/V reports IFF2
                        bus.address_on_bus(self.pair_ir(), 1);
                        self.a = self.i;
                        self.sz5h3pn = SZ53N_ADD[self.a as usize];
                        if self.iff2 {
                            self.sz5h3pn |= flags::PV;
                        }
                        self.flag_q = true;
                    }
                    3 => {
                        // LD A,R
                        bus.address_on_bus(self.pair_ir(), 1);
                        self.a = self.reg_r();
                        self.sz5h3pn = SZ53N_ADD[self.a as usize];
                        if self.iff2 {
                            self.sz5h3pn |= flags::PV;
                        }
                        self.flag_q = true;
                    }
                    4 => {
                        // RRD: low nibble of (HL) into A, A's low nibble
                        // into the high nibble of (HL)
                        let aux = self.a << 4;
                        self.memptr = self.hl;
                        let value = bus.peek8(self.memptr);
                        self.a = (self.a & 0xF0) | (value & 0x0F);
                        bus.address_on_bus(self.memptr, 4);
                        bus.poke8(self.memptr, (value >> 4) | aux);
                        self.memptr = self.memptr.wrapping_add(1);
                        self.sz5h3pn = SZ53PN_ADD[self.a as usize];
                        self.flag_q = true;
                    }
                    5 => {
                        // RLD
                        let aux = self.a & 0x0F;
                        self.memptr = self.hl;
                        let value = bus.peek8(self.memptr);
                        self.a = (self.a & 0xF0) | (value >> 4);
                        bus.address_on_bus(self.memptr, 4);
                        bus.poke8(self.memptr, (value << 4) | aux);
                        self.memptr = self.memptr.wrapping_add(1);
                        self.sz5h3pn = SZ53PN_ADD[self.a as usize];
                        self.flag_q = true;
                    }
                    _ => {} // ED 77 / ED 7F
                },
            },
            2 if z <= 3 && y >= 4 => self.execute_bli(bus, y, z),
            _ => {
                log::trace!("undefined ED opcode {opcode:02X}");
            }
        }
    }

    /// Block transfer/search/IO. The repeating forms rewind PC by two and
    /// bill five internal cycles on the relevant address while the transfer
    /// count keeps them going.
    fn execute_bli(&mut self, bus: &mut impl Bus, y: u8, z: u8) {
        match (z, y) {
            (0, 4) => self.ldi(bus),
            (0, 5) => self.ldd(bus),
            (0, 6) => {
                // LDIR
                self.ldi(bus);
                if self.bc != 0 {
                    self.pc = self.pc.wrapping_sub(2);
                    self.memptr = self.pc.wrapping_add(1);
                    bus.address_on_bus(self.de.wrapping_sub(1), 5);
                }
            }
            (0, _) => {
                // LDDR
                self.ldd(bus);
                if self.bc != 0 {
                    self.pc = self.pc.wrapping_sub(2);
                    self.memptr = self.pc.wrapping_add(1);
                    bus.address_on_bus(self.de.wrapping_add(1), 5);
                }
            }
            (1, 4) => self.cpi(bus),
            (1, 5) => self.cpd(bus),
            (1, 6) => {
                // CPIR: repeats while BC != 0 (P/V) and the search missed
                self.cpi(bus);
                if self.sz5h3pn & flags::PV != 0 && self.sz5h3pn & flags::Z == 0 {
                    self.pc = self.pc.wrapping_sub(2);
                    self.memptr = self.pc.wrapping_add(1);
                    bus.address_on_bus(self.hl.wrapping_sub(1), 5);
                }
            }
            (1, _) => {
                // CPDR
                self.cpd(bus);
                if self.sz5h3pn & flags::PV != 0 && self.sz5h3pn & flags::Z == 0 {
                    self.pc = self.pc.wrapping_sub(2);
                    self.memptr = self.pc.wrapping_add(1);
                    bus.address_on_bus(self.hl.wrapping_add(1), 5);
                }
            }
            (2, 4) => self.ini(bus),
            (2, 5) => self.ind(bus),
            (2, 6) => {
                // INIR
                self.ini(bus);
                if self.b() != 0 {
                    self.pc = self.pc.wrapping_sub(2);
                    bus.address_on_bus(self.hl.wrapping_sub(1), 5);
                }
            }
            (2, _) => {
                // INDR
                self.ind(bus);
                if self.b() != 0 {
                    self.pc = self.pc.wrapping_sub(2);
                    bus.address_on_bus(self.hl.wrapping_add(1), 5);
                }
            }
            (3, 4) => self.outi(bus),
            (3, 5) => self.outd(bus),
            (3, 6) => {
                // OTIR
                self.outi(bus);
                if self.b() != 0 {
                    self.pc = self.pc.wrapping_sub(2);
                    bus.address_on_bus(self.bc, 5);
                }
            }
            _ => {
                // OTDR
                self.outd(bus);
                if self.b() != 0 {
                    self.pc = self.pc.wrapping_sub(2);
                    bus.address_on_bus(self.bc, 5);
                }
            }
        }
    }

    // ========== DD/FD Prefix (IX/IY Instructions) ==========

    #[inline]
    fn index(&self, use_ix: bool) -> u16 {
        if use_ix {
            self.ix
        } else {
            self.iy
        }
    }

    #[inline]
    fn set_index(&mut self, use_ix: bool, word: u16) {
        if use_ix {
            self.ix = word;
        } else {
            self.iy = word;
        }
    }

    /// Resolve (IX+d)/(IY+d): signed displacement added to the index
    /// register, five internal cycles billed on the displacement byte's
    /// address, effective address left in MEMPTR.
    fn index_addr(&mut self, bus: &mut impl Bus, use_ix: bool) -> u16 {
        let d = bus.peek8(self.pc) as i8;
        self.memptr = self.index(use_ix).wrapping_add(d as u16);
        bus.address_on_bus(self.pc, 5);
        self.pc = self.pc.wrapping_add(1);
        self.memptr
    }

    /// Get 8-bit register with the IXh/IXl (IYh/IYl) substitution. Never
    /// used for the memory operand, so no bus access.
    fn get_index_reg8(&self, idx: u8, use_ix: bool) -> u8 {
        match idx {
            0 => self.b(),
            1 => self.c(),
            2 => self.d(),
            3 => self.e(),
            4 => {
                if use_ix {
                    self.ixh()
                } else {
                    self.iyh()
                }
            }
            5 => {
                if use_ix {
                    self.ixl()
                } else {
                    self.iyl()
                }
            }
            _ => self.a,
        }
    }

    /// Set 8-bit register with the IXh/IXl (IYh/IYl) substitution.
    fn set_index_reg8(&mut self, idx: u8, value: u8, use_ix: bool) {
        match idx {
            0 => self.set_b(value),
            1 => self.set_c(value),
            2 => self.set_d(value),
            3 => self.set_e(value),
            4 => {
                if use_ix {
                    self.set_ixh(value)
                } else {
                    self.set_iyh(value)
                }
            }
            5 => {
                if use_ix {
                    self.set_ixl(value)
                } else {
                    self.set_iyl(value)
                }
            }
            _ => self.a = value,
        }
    }

    /// Execute a DD/FD-prefixed instruction. Chained prefixes honour only
    /// the last one, each paying its own M1; opcodes with no IX/IY
    /// involvement fall through to their unprefixed handlers.
    fn execute_index(&mut self, bus: &mut impl Bus, use_ix: bool) {
        let opcode = self.fetch_opcode(bus);

        match opcode {
            0xCB => return self.execute_index_cb(bus, use_ix),
            0xDD => return self.execute_index(bus, true),
            0xED => return self.execute_ed(bus),
            0xFD => return self.execute_index(bus, false),
            _ => {}
        }

        let x = opcode >> 6;
        let y = (opcode >> 3) & 0x07;
        let z = opcode & 0x07;

        match x {
            0 => self.execute_index_x0(bus, y, z, use_ix),
            1 => {
                if opcode == 0x76 {
                    // HALT is not affected by the prefix
                    self.pc = self.pc.wrapping_sub(1);
                    self.halted = true;
                } else if y == 6 {
                    // LD (IX+d),r: the source register is NOT substituted
                    let addr = self.index_addr(bus, use_ix);
                    let value = self.get_reg8(z, bus);
                    bus.poke8(addr, value);
                } else if z == 6 {
                    // LD r,(IX+d): the destination is NOT substituted
                    let addr = self.index_addr(bus, use_ix);
                    let value = bus.peek8(addr);
                    self.set_reg8(y, value, bus);
                } else {
                    // LD r,r' with the H/L -> IXh/IXl substitution
                    let value = self.get_index_reg8(z, use_ix);
                    self.set_index_reg8(y, value, use_ix);
                }
            }
            2 => {
                // ALU A,r with substitution
                let value = if z == 6 {
                    let addr = self.index_addr(bus, use_ix);
                    bus.peek8(addr)
                } else {
                    self.get_index_reg8(z, use_ix)
                };
                self.execute_alu(y, value);
            }
            _ => self.execute_index_x3(bus, y, z, use_ix),
        }
    }

    /// Indexed x=0 opcodes; anything not touching IX/IY falls through.
    fn execute_index_x0(&mut self, bus: &mut impl Bus, y: u8, z: u8, use_ix: bool) {
        match z {
            1 => {
                let p = y >> 1;
                if y & 0x01 == 1 {
                    // ADD IX,rp with rp[2] = IX itself
                    bus.address_on_bus(self.pair_ir(), 7);
                    let xy = self.index(use_ix);
                    let oper = if p == 2 { xy } else { self.get_rp(p) };
                    let res = self.add16(xy, oper);
                    self.set_index(use_ix, res);
                } else if p == 2 {
                    // LD IX,nn
                    let word = self.fetch16(bus);
                    self.set_index(use_ix, word);
                } else {
                    self.execute_x0(bus, y, z);
                }
            }
            2 if y == 4 => {
                // LD (nn),IX
                self.memptr = self.fetch16(bus);
                bus.poke16(self.memptr, self.index(use_ix));
                self.memptr = self.memptr.wrapping_add(1);
            }
            2 if y == 5 => {
                // LD IX,(nn)
                self.memptr = self.fetch16(bus);
                let word = bus.peek16(self.memptr);
                self.set_index(use_ix, word);
                self.memptr = self.memptr.wrapping_add(1);
            }
            3 if y >> 1 == 2 => {
                // INC/DEC IX
                bus.address_on_bus(self.pair_ir(), 2);
                let xy = self.index(use_ix);
                let res = if y & 0x01 == 0 {
                    xy.wrapping_add(1)
                } else {
                    xy.wrapping_sub(1)
                };
                self.set_index(use_ix, res);
            }
            4 | 5 if (4..=6).contains(&y) => {
                // INC/DEC on IXh, IXl or (IX+d)
                if y == 6 {
                    let addr = self.index_addr(bus, use_ix);
                    let value = bus.peek8(addr);
                    bus.address_on_bus(addr, 1);
                    let res = if z == 4 {
                        self.alu_inc(value)
                    } else {
                        self.alu_dec(value)
                    };
                    bus.poke8(addr, res);
                } else {
                    let value = self.get_index_reg8(y, use_ix);
                    let res = if z == 4 {
                        self.alu_inc(value)
                    } else {
                        self.alu_dec(value)
                    };
                    self.set_index_reg8(y, res, use_ix);
                }
            }
            6 if (4..=6).contains(&y) => {
                // LD IXh,n / LD IXl,n / LD (IX+d),n
                if y == 6 {
                    // operands arrive d first, then n; only two idle cycles
                    let d = bus.peek8(self.pc) as i8;
                    self.memptr = self.index(use_ix).wrapping_add(d as u16);
                    self.pc = self.pc.wrapping_add(1);
                    let value = bus.peek8(self.pc);
                    bus.address_on_bus(self.pc, 2);
                    self.pc = self.pc.wrapping_add(1);
                    bus.poke8(self.memptr, value);
                } else {
                    let value = self.fetch8(bus);
                    self.set_index_reg8(y, value, use_ix);
                }
            }
            _ => self.execute_x0(bus, y, z),
        }
    }

    /// Indexed x=3 opcodes: POP/PUSH IX, EX (SP),IX, JP (IX), LD SP,IX;
    /// the rest fall through.
    fn execute_index_x3(&mut self, bus: &mut impl Bus, y: u8, z: u8, use_ix: bool) {
        match z {
            1 if y == 4 => {
                // POP IX
                let word = self.pop(bus);
                self.set_index(use_ix, word);
            }
            1 if y == 5 => {
                // JP (IX)
                self.pc = self.index(use_ix);
            }
            1 if y == 7 => {
                // LD SP,IX
                bus.address_on_bus(self.pair_ir(), 2);
                self.sp = self.index(use_ix);
            }
            3 if y == 4 => {
                // EX (SP),IX: same inverted write order as EX (SP),HL
                let xy = self.index(use_ix);
                let word = bus.peek16(self.sp);
                self.set_index(use_ix, word);
                bus.address_on_bus(self.sp.wrapping_add(1), 1);
                bus.poke8(self.sp.wrapping_add(1), (xy >> 8) as u8);
                bus.poke8(self.sp, xy as u8);
                bus.address_on_bus(self.sp, 2);
                self.memptr = word;
            }
            5 if y == 4 => {
                // PUSH IX
                bus.address_on_bus(self.pair_ir(), 1);
                let word = self.index(use_ix);
                self.push(bus, word);
            }
            _ => self.execute_x3(bus, y, z),
        }
    }

    /// DD/FD CB instructions. Operand order is `DD CB d op`; the sub-opcode
    /// is read as data (no R increment). Every operation works on (IX+d),
    /// and the undocumented z != 6 forms also copy the result into a
    /// register.
    fn execute_index_cb(&mut self, bus: &mut impl Bus, use_ix: bool) {
        let d = bus.peek8(self.pc) as i8;
        self.memptr = self.index(use_ix).wrapping_add(d as u16);
        self.pc = self.pc.wrapping_add(1);
        let opcode = bus.peek8(self.pc);
        bus.address_on_bus(self.pc, 2);
        self.pc = self.pc.wrapping_add(1);

        let x = opcode >> 6;
        let y = (opcode >> 3) & 0x07;
        let z = opcode & 0x07;
        let addr = self.memptr;

        match x {
            0 => {
                // Rotate/shift (IX+d), dual-written to a register for z != 6
                let value = bus.peek8(addr);
                let res = self.execute_rot(y, value);
                bus.address_on_bus(addr, 1);
                if z != 6 {
                    self.set_reg8(z, res, bus);
                }
                bus.poke8(addr, res);
            }
            1 => {
                // BIT y,(IX+d): bits 5/3 from the effective address's high
                // byte, for every z
                let value = bus.peek8(addr);
                self.bit_test(1 << y, value);
                self.sz5h3pn = (self.sz5h3pn & flags::MASK_SZHP)
                    | ((addr >> 8) as u8 & flags::MASK_53);
                bus.address_on_bus(addr, 1);
            }
            2 => {
                // RES y,(IX+d)
                let res = bus.peek8(addr) & !(1 << y);
                bus.address_on_bus(addr, 1);
                if z != 6 {
                    self.set_reg8(z, res, bus);
                }
                bus.poke8(addr, res);
            }
            _ => {
                // SET y,(IX+d)
                let res = bus.peek8(addr) | (1 << y);
                bus.address_on_bus(addr, 1);
                if z != 6 {
                    self.set_reg8(z, res, bus);
                }
                bus.poke8(addr, res);
            }
        }
    }
}
