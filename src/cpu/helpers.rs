//! Z80 CPU helper functions
//!
//! This module contains the building blocks the opcode handlers are composed
//! from:
//! - Register accessors (b, c, d, e, h, l, ixh, ixl, iyh, iyl, af, f, r)
//! - Flag helpers over the split F storage
//! - Instruction fetch (fetch_opcode, fetch8, fetch16)
//! - Stack operations (push, pop)
//! - ALU primitives (alu_add .. alu_dec, add16/adc16/sbc16, rotates, daa,
//!   bit_test)
//! - Block transfer/search/IO bodies (ldi .. outd)
//! - Register access by decode index (get_reg8, set_reg8, get_rp, get_rp2)
//!   and condition codes (check_cc)
//!
//! Every primitive writes flags exactly as the hardware does, including the
//! undocumented bits 3/5, and records the write in `flag_q` for the CCF/SCF
//! rule.

use super::flags;
use super::flags::{SZ53N_ADD, SZ53N_SUB, SZ53PN_ADD, SZ53PN_SUB};
use super::Cpu;
use crate::bus::Bus;

impl Cpu {
    // ========== Register Accessors ==========

    /// Get B register (high byte of BC)
    #[inline]
    pub fn b(&self) -> u8 {
        (self.bc >> 8) as u8
    }

    /// Set B register
    #[inline]
    pub fn set_b(&mut self, value: u8) {
        self.bc = (self.bc & 0x00FF) | (u16::from(value) << 8);
    }

    /// Get C register (low byte of BC)
    #[inline]
    pub fn c(&self) -> u8 {
        self.bc as u8
    }

    /// Set C register
    #[inline]
    pub fn set_c(&mut self, value: u8) {
        self.bc = (self.bc & 0xFF00) | u16::from(value);
    }

    /// Get D register
    #[inline]
    pub fn d(&self) -> u8 {
        (self.de >> 8) as u8
    }

    /// Set D register
    #[inline]
    pub fn set_d(&mut self, value: u8) {
        self.de = (self.de & 0x00FF) | (u16::from(value) << 8);
    }

    /// Get E register
    #[inline]
    pub fn e(&self) -> u8 {
        self.de as u8
    }

    /// Set E register
    #[inline]
    pub fn set_e(&mut self, value: u8) {
        self.de = (self.de & 0xFF00) | u16::from(value);
    }

    /// Get H register
    #[inline]
    pub fn h(&self) -> u8 {
        (self.hl >> 8) as u8
    }

    /// Set H register
    #[inline]
    pub fn set_h(&mut self, value: u8) {
        self.hl = (self.hl & 0x00FF) | (u16::from(value) << 8);
    }

    /// Get L register
    #[inline]
    pub fn l(&self) -> u8 {
        self.hl as u8
    }

    /// Set L register
    #[inline]
    pub fn set_l(&mut self, value: u8) {
        self.hl = (self.hl & 0xFF00) | u16::from(value);
    }

    /// Get IXh (undocumented high half of IX)
    #[inline]
    pub fn ixh(&self) -> u8 {
        (self.ix >> 8) as u8
    }

    /// Set IXh
    #[inline]
    pub fn set_ixh(&mut self, value: u8) {
        self.ix = (self.ix & 0x00FF) | (u16::from(value) << 8);
    }

    /// Get IXl
    #[inline]
    pub fn ixl(&self) -> u8 {
        self.ix as u8
    }

    /// Set IXl
    #[inline]
    pub fn set_ixl(&mut self, value: u8) {
        self.ix = (self.ix & 0xFF00) | u16::from(value);
    }

    /// Get IYh
    #[inline]
    pub fn iyh(&self) -> u8 {
        (self.iy >> 8) as u8
    }

    /// Set IYh
    #[inline]
    pub fn set_iyh(&mut self, value: u8) {
        self.iy = (self.iy & 0x00FF) | (u16::from(value) << 8);
    }

    /// Get IYl
    #[inline]
    pub fn iyl(&self) -> u8 {
        self.iy as u8
    }

    /// Set IYl
    #[inline]
    pub fn set_iyl(&mut self, value: u8) {
        self.iy = (self.iy & 0xFF00) | u16::from(value);
    }

    /// Compose the F register from its stored parts.
    #[inline]
    pub fn f(&self) -> u8 {
        if self.carry {
            self.sz5h3pn | flags::C
        } else {
            self.sz5h3pn
        }
    }

    /// Set the F register, splitting it into the stored parts.
    #[inline]
    pub fn set_f(&mut self, value: u8) {
        self.sz5h3pn = value & 0xFE;
        self.carry = value & flags::C != 0;
    }

    /// Composed AF pair
    #[inline]
    pub fn af(&self) -> u16 {
        (u16::from(self.a) << 8) | u16::from(self.f())
    }

    #[inline]
    pub fn set_af(&mut self, word: u16) {
        self.a = (word >> 8) as u8;
        self.set_f(word as u8);
    }

    /// Shadow AF pair
    #[inline]
    pub fn af_prime(&self) -> u16 {
        (u16::from(self.a_prime) << 8) | u16::from(self.f_prime)
    }

    #[inline]
    pub fn set_af_prime(&mut self, word: u16) {
        self.a_prime = (word >> 8) as u8;
        self.f_prime = word as u8;
    }

    /// R with its preserved top bit reattached.
    #[inline]
    pub fn reg_r(&self) -> u8 {
        if self.r7 {
            (self.r & 0x7F) | 0x80
        } else {
            self.r & 0x7F
        }
    }

    /// Set R: the low 7 bits feed the counter, bit 7 is kept aside and
    /// survives refresh increments.
    #[inline]
    pub fn set_reg_r(&mut self, value: u8) {
        self.r = value & 0x7F;
        self.r7 = value > 0x7F;
    }

    /// The IR pair as it appears on the address bus during internal cycles.
    #[inline]
    pub(super) fn pair_ir(&self) -> u16 {
        (u16::from(self.i) << 8) | u16::from(self.reg_r())
    }

    // ========== Flag Helpers ==========

    /// Check if carry flag is set
    #[inline]
    pub fn flag_c(&self) -> bool {
        self.carry
    }

    /// Set or clear carry flag
    #[inline]
    pub fn set_flag_c(&mut self, state: bool) {
        self.carry = state;
    }

    /// Check if zero flag is set
    #[inline]
    pub fn flag_z(&self) -> bool {
        self.sz5h3pn & flags::Z != 0
    }

    /// Set or clear zero flag
    #[inline]
    pub fn set_flag_z(&mut self, state: bool) {
        if state {
            self.sz5h3pn |= flags::Z;
        } else {
            self.sz5h3pn &= !flags::Z;
        }
    }

    /// Check if sign flag is set
    #[inline]
    pub fn flag_s(&self) -> bool {
        self.sz5h3pn & flags::S != 0
    }

    /// Set or clear sign flag
    #[inline]
    pub fn set_flag_s(&mut self, state: bool) {
        if state {
            self.sz5h3pn |= flags::S;
        } else {
            self.sz5h3pn &= !flags::S;
        }
    }

    /// Check if half-carry flag is set
    #[inline]
    pub fn flag_h(&self) -> bool {
        self.sz5h3pn & flags::H != 0
    }

    /// Set or clear half-carry flag
    #[inline]
    pub fn set_flag_h(&mut self, state: bool) {
        if state {
            self.sz5h3pn |= flags::H;
        } else {
            self.sz5h3pn &= !flags::H;
        }
    }

    /// Check if parity/overflow flag is set
    #[inline]
    pub fn flag_pv(&self) -> bool {
        self.sz5h3pn & flags::PV != 0
    }

    /// Set or clear parity/overflow flag
    #[inline]
    pub fn set_flag_pv(&mut self, state: bool) {
        if state {
            self.sz5h3pn |= flags::PV;
        } else {
            self.sz5h3pn &= !flags::PV;
        }
    }

    /// Check if add/subtract flag is set
    #[inline]
    pub fn flag_n(&self) -> bool {
        self.sz5h3pn & flags::N != 0
    }

    /// Set or clear add/subtract flag
    #[inline]
    pub fn set_flag_n(&mut self, state: bool) {
        if state {
            self.sz5h3pn |= flags::N;
        } else {
            self.sz5h3pn &= !flags::N;
        }
    }

    /// Check undocumented bit 3 of F
    #[inline]
    pub fn flag_3(&self) -> bool {
        self.sz5h3pn & flags::F3 != 0
    }

    /// Check undocumented bit 5 of F
    #[inline]
    pub fn flag_5(&self) -> bool {
        self.sz5h3pn & flags::F5 != 0
    }

    // ========== Register Pair Exchange ==========

    /// EX AF,AF'
    pub(super) fn ex_af_af(&mut self) {
        std::mem::swap(&mut self.a, &mut self.a_prime);
        let f = self.f();
        self.set_f(self.f_prime);
        self.f_prime = f;
    }

    /// EXX: swap BC, DE, HL with the shadow file
    pub(super) fn exx(&mut self) {
        std::mem::swap(&mut self.bc, &mut self.bc_prime);
        std::mem::swap(&mut self.de, &mut self.de_prime);
        std::mem::swap(&mut self.hl, &mut self.hl_prime);
    }

    /// EX DE,HL
    pub(super) fn ex_de_hl(&mut self) {
        std::mem::swap(&mut self.de, &mut self.hl);
    }

    // ========== Instruction Fetch ==========

    /// M1 fetch at PC: increments the refresh counter and PC.
    #[inline]
    pub(super) fn fetch_opcode(&mut self, bus: &mut impl Bus) -> u8 {
        self.r = self.r.wrapping_add(1) & 0x7F;
        let opcode = bus.fetch_opcode(self.pc);
        self.pc = self.pc.wrapping_add(1);
        opcode
    }

    /// Read the byte at PC and advance
    #[inline]
    pub(super) fn fetch8(&mut self, bus: &mut impl Bus) -> u8 {
        let value = bus.peek8(self.pc);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    /// Read the word at PC and advance
    #[inline]
    pub(super) fn fetch16(&mut self, bus: &mut impl Bus) -> u16 {
        let word = bus.peek16(self.pc);
        self.pc = self.pc.wrapping_add(2);
        word
    }

    // ========== Stack Operations ==========

    /// Push a word: SP pre-decremented per byte, high byte first.
    #[inline]
    pub(super) fn push(&mut self, bus: &mut impl Bus, word: u16) {
        self.sp = self.sp.wrapping_sub(1);
        bus.poke8(self.sp, (word >> 8) as u8);
        self.sp = self.sp.wrapping_sub(1);
        bus.poke8(self.sp, word as u8);
    }

    /// Pop a word: low byte read first.
    #[inline]
    pub(super) fn pop(&mut self, bus: &mut impl Bus) -> u16 {
        let word = bus.peek16(self.sp);
        self.sp = self.sp.wrapping_add(2);
        word
    }

    // ========== 8-bit ALU ==========

    /// ADD A,oper
    pub(super) fn alu_add(&mut self, oper: u8) {
        let res16 = u16::from(self.a) + u16::from(oper);
        self.carry = res16 > 0xFF;
        let res = res16 as u8;
        self.sz5h3pn = SZ53N_ADD[res as usize];

        // The low nibble of the result is smaller than A's iff bit 3 carried
        if (res & 0x0F) < (self.a & 0x0F) {
            self.sz5h3pn |= flags::H;
        }

        if (self.a ^ !oper) & (self.a ^ res) & 0x80 != 0 {
            self.sz5h3pn |= flags::PV;
        }

        self.a = res;
        self.flag_q = true;
    }

    /// ADC A,oper
    pub(super) fn alu_adc(&mut self, oper: u8) {
        let mut res16 = u16::from(self.a) + u16::from(oper);
        if self.carry {
            res16 += 1;
        }
        self.carry = res16 > 0xFF;
        let res = res16 as u8;
        self.sz5h3pn = SZ53N_ADD[res as usize];

        if (self.a ^ oper ^ res) & 0x10 != 0 {
            self.sz5h3pn |= flags::H;
        }

        if (self.a ^ !oper) & (self.a ^ res) & 0x80 != 0 {
            self.sz5h3pn |= flags::PV;
        }

        self.a = res;
        self.flag_q = true;
    }

    /// SUB oper
    pub(super) fn alu_sub(&mut self, oper: u8) {
        let res32 = i32::from(self.a) - i32::from(oper);
        self.carry = res32 < 0;
        let res = res32 as u8;
        self.sz5h3pn = SZ53N_SUB[res as usize];

        if (res & 0x0F) > (self.a & 0x0F) {
            self.sz5h3pn |= flags::H;
        }

        if (self.a ^ oper) & (self.a ^ res) & 0x80 != 0 {
            self.sz5h3pn |= flags::PV;
        }

        self.a = res;
        self.flag_q = true;
    }

    /// SBC A,oper
    pub(super) fn alu_sbc(&mut self, oper: u8) {
        let mut res32 = i32::from(self.a) - i32::from(oper);
        if self.carry {
            res32 -= 1;
        }
        self.carry = res32 < 0;
        let res = res32 as u8;
        self.sz5h3pn = SZ53N_SUB[res as usize];

        if (self.a ^ oper ^ res) & 0x10 != 0 {
            self.sz5h3pn |= flags::H;
        }

        if (self.a ^ oper) & (self.a ^ res) & 0x80 != 0 {
            self.sz5h3pn |= flags::PV;
        }

        self.a = res;
        self.flag_q = true;
    }

    /// CP oper: like SUB but A is untouched and bits 5/3 come from the
    /// operand, not the result.
    pub(super) fn alu_cp(&mut self, oper: u8) {
        let res32 = i32::from(self.a) - i32::from(oper);
        self.carry = res32 < 0;
        let res = res32 as u8;

        self.sz5h3pn =
            (SZ53N_ADD[oper as usize] & flags::MASK_53) | (SZ53N_SUB[res as usize] & flags::MASK_SZHN);

        if (res & 0x0F) > (self.a & 0x0F) {
            self.sz5h3pn |= flags::H;
        }

        if (self.a ^ oper) & (self.a ^ res) & 0x80 != 0 {
            self.sz5h3pn |= flags::PV;
        }

        self.flag_q = true;
    }

    /// AND oper
    pub(super) fn alu_and(&mut self, oper: u8) {
        self.a &= oper;
        self.carry = false;
        self.sz5h3pn = SZ53PN_ADD[self.a as usize] | flags::H;
        self.flag_q = true;
    }

    /// XOR oper
    pub(super) fn alu_xor(&mut self, oper: u8) {
        self.a ^= oper;
        self.carry = false;
        self.sz5h3pn = SZ53PN_ADD[self.a as usize];
        self.flag_q = true;
    }

    /// OR oper
    pub(super) fn alu_or(&mut self, oper: u8) {
        self.a |= oper;
        self.carry = false;
        self.sz5h3pn = SZ53PN_ADD[self.a as usize];
        self.flag_q = true;
    }

    /// Increment with flags; carry untouched
    pub(super) fn alu_inc(&mut self, value: u8) -> u8 {
        let res = value.wrapping_add(1);
        self.sz5h3pn = SZ53N_ADD[res as usize];

        if res & 0x0F == 0 {
            self.sz5h3pn |= flags::H;
        }

        if res == 0x80 {
            self.sz5h3pn |= flags::PV;
        }

        self.flag_q = true;
        res
    }

    /// Decrement with flags; carry untouched
    pub(super) fn alu_dec(&mut self, value: u8) -> u8 {
        let res = value.wrapping_sub(1);
        self.sz5h3pn = SZ53N_SUB[res as usize];

        if res & 0x0F == 0x0F {
            self.sz5h3pn |= flags::H;
        }

        if res == 0x7F {
            self.sz5h3pn |= flags::PV;
        }

        self.flag_q = true;
        res
    }

    // ========== 16-bit ALU ==========

    /// ADD reg,oper: only C, H (bit 11), N and bits 5/3 (from the high byte
    /// of the result) change. MEMPTR takes reg + 1.
    pub(super) fn add16(&mut self, reg: u16, oper: u16) -> u16 {
        let tmp = u32::from(reg) + u32::from(oper);
        self.carry = tmp > 0xFFFF;
        let res = tmp as u16;
        self.sz5h3pn = (self.sz5h3pn & flags::MASK_SZP) | ((res >> 8) as u8 & flags::MASK_53);

        if (res & 0x0FFF) < (reg & 0x0FFF) {
            self.sz5h3pn |= flags::H;
        }

        self.memptr = reg.wrapping_add(1);
        self.flag_q = true;
        res
    }

    /// ADC HL,oper with the full flag set; bits 5/3 from the high byte.
    pub(super) fn adc16(&mut self, oper: u16) {
        let hl = self.hl;
        self.memptr = hl.wrapping_add(1);

        let mut tmp = u32::from(hl) + u32::from(oper);
        if self.carry {
            tmp += 1;
        }
        self.carry = tmp > 0xFFFF;
        let res = tmp as u16;
        self.hl = res;

        self.sz5h3pn = SZ53N_ADD[(res >> 8) as usize];
        if res != 0 {
            self.sz5h3pn &= !flags::Z;
        }

        if (res ^ hl ^ oper) & 0x1000 != 0 {
            self.sz5h3pn |= flags::H;
        }

        if (hl ^ !oper) & (hl ^ res) & 0x8000 != 0 {
            self.sz5h3pn |= flags::PV;
        }

        self.flag_q = true;
    }

    /// SBC HL,oper
    pub(super) fn sbc16(&mut self, oper: u16) {
        let hl = self.hl;
        self.memptr = hl.wrapping_add(1);

        let mut tmp = i32::from(hl) - i32::from(oper);
        if self.carry {
            tmp -= 1;
        }
        self.carry = tmp < 0;
        let res = tmp as u16;
        self.hl = res;

        self.sz5h3pn = SZ53N_SUB[(res >> 8) as usize];
        if res != 0 {
            self.sz5h3pn &= !flags::Z;
        }

        if (res ^ hl ^ oper) & 0x1000 != 0 {
            self.sz5h3pn |= flags::H;
        }

        if (hl ^ oper) & (hl ^ res) & 0x8000 != 0 {
            self.sz5h3pn |= flags::PV;
        }

        self.flag_q = true;
    }

    // ========== Rotates and Shifts ==========
    // CB-table semantics: S, Z, parity, bits 5/3 from the result, H = N = 0,
    // carry from the shifted-out bit.

    /// Rotate left circular
    pub(super) fn rlc(&mut self, value: u8) -> u8 {
        self.carry = value > 0x7F;
        let mut res = value << 1;
        if self.carry {
            res |= 0x01;
        }
        self.sz5h3pn = SZ53PN_ADD[res as usize];
        self.flag_q = true;
        res
    }

    /// Rotate left through carry
    pub(super) fn rl(&mut self, value: u8) -> u8 {
        let old_carry = self.carry;
        self.carry = value > 0x7F;
        let mut res = value << 1;
        if old_carry {
            res |= 0x01;
        }
        self.sz5h3pn = SZ53PN_ADD[res as usize];
        self.flag_q = true;
        res
    }

    /// Shift left arithmetic
    pub(super) fn sla(&mut self, value: u8) -> u8 {
        self.carry = value > 0x7F;
        let res = value << 1;
        self.sz5h3pn = SZ53PN_ADD[res as usize];
        self.flag_q = true;
        res
    }

    /// Undocumented SLL: like SLA but bit 0 comes out set
    pub(super) fn sll(&mut self, value: u8) -> u8 {
        self.carry = value > 0x7F;
        let res = (value << 1) | 0x01;
        self.sz5h3pn = SZ53PN_ADD[res as usize];
        self.flag_q = true;
        res
    }

    /// Rotate right circular
    pub(super) fn rrc(&mut self, value: u8) -> u8 {
        self.carry = value & 0x01 != 0;
        let mut res = value >> 1;
        if self.carry {
            res |= 0x80;
        }
        self.sz5h3pn = SZ53PN_ADD[res as usize];
        self.flag_q = true;
        res
    }

    /// Rotate right through carry
    pub(super) fn rr(&mut self, value: u8) -> u8 {
        let old_carry = self.carry;
        self.carry = value & 0x01 != 0;
        let mut res = value >> 1;
        if old_carry {
            res |= 0x80;
        }
        self.sz5h3pn = SZ53PN_ADD[res as usize];
        self.flag_q = true;
        res
    }

    /// Shift right arithmetic: bit 7 keeps its value
    pub(super) fn sra(&mut self, value: u8) -> u8 {
        let sign = value & 0x80;
        self.carry = value & 0x01 != 0;
        let res = (value >> 1) | sign;
        self.sz5h3pn = SZ53PN_ADD[res as usize];
        self.flag_q = true;
        res
    }

    /// Shift right logical
    pub(super) fn srl(&mut self, value: u8) -> u8 {
        self.carry = value & 0x01 != 0;
        let res = value >> 1;
        self.sz5h3pn = SZ53PN_ADD[res as usize];
        self.flag_q = true;
        res
    }

    // ========== DAA / BIT ==========

    /// Decimal adjust after an add or subtract, direction given by N.
    pub(super) fn daa(&mut self) {
        let mut correction = 0u8;
        let mut carry = self.carry;

        if self.sz5h3pn & flags::H != 0 || self.a & 0x0F > 0x09 {
            correction = 0x06;
        }

        if carry || self.a > 0x99 {
            correction |= 0x60;
        }

        if self.a > 0x99 {
            carry = true;
        }

        if self.sz5h3pn & flags::N != 0 {
            self.alu_sub(correction);
            self.sz5h3pn = (self.sz5h3pn & flags::H) | SZ53PN_SUB[self.a as usize];
        } else {
            self.alu_add(correction);
            self.sz5h3pn = (self.sz5h3pn & flags::H) | SZ53PN_ADD[self.a as usize];
        }

        self.carry = carry;
        self.flag_q = true;
    }

    /// BIT mask,value: Z (and P/V) report the tested bit, H set, N clear,
    /// S only for a set bit 7. Bits 5/3 come from `value`; the memory forms
    /// overwrite them from MEMPTR afterwards.
    pub(super) fn bit_test(&mut self, mask: u8, value: u8) {
        let zero = value & mask == 0;

        self.sz5h3pn = (SZ53N_ADD[value as usize] & !flags::MASK_SZP) | flags::H;

        if zero {
            self.sz5h3pn |= flags::PV | flags::Z;
        }

        if mask == flags::S && !zero {
            self.sz5h3pn |= flags::S;
        }

        self.flag_q = true;
    }

    // ========== Block Transfer / Search / IO ==========
    // One iteration each; the repeating forms rewind PC around these.

    /// LDI: (DE) <- (HL), HL++, DE++, BC--. Bit 3 of F from bit 3 and bit 5
    /// from bit 1 of A + the transferred byte; P/V = BC != 0.
    pub(super) fn ldi(&mut self, bus: &mut impl Bus) {
        let value = bus.peek8(self.hl);
        bus.poke8(self.de, value);
        bus.address_on_bus(self.de, 2);
        self.hl = self.hl.wrapping_add(1);
        self.de = self.de.wrapping_add(1);
        self.bc = self.bc.wrapping_sub(1);

        let sum = value.wrapping_add(self.a);
        self.sz5h3pn = (self.sz5h3pn & flags::MASK_SZ) | (sum & flags::F3);
        if sum & 0x02 != 0 {
            self.sz5h3pn |= flags::F5;
        }
        if self.bc != 0 {
            self.sz5h3pn |= flags::PV;
        }
        self.flag_q = true;
    }

    /// LDD: as LDI with HL and DE decrementing
    pub(super) fn ldd(&mut self, bus: &mut impl Bus) {
        let value = bus.peek8(self.hl);
        bus.poke8(self.de, value);
        bus.address_on_bus(self.de, 2);
        self.hl = self.hl.wrapping_sub(1);
        self.de = self.de.wrapping_sub(1);
        self.bc = self.bc.wrapping_sub(1);

        let sum = value.wrapping_add(self.a);
        self.sz5h3pn = (self.sz5h3pn & flags::MASK_SZ) | (sum & flags::F3);
        if sum & 0x02 != 0 {
            self.sz5h3pn |= flags::F5;
        }
        if self.bc != 0 {
            self.sz5h3pn |= flags::PV;
        }
        self.flag_q = true;
    }

    /// CPI: compare A with (HL), HL++, BC--. Carry survives; bits 5/3 come
    /// from A - (HL) - H after the compare.
    pub(super) fn cpi(&mut self, bus: &mut impl Bus) {
        let value = bus.peek8(self.hl);
        let carry = self.carry;
        self.alu_cp(value);
        self.carry = carry;
        bus.address_on_bus(self.hl, 5);
        self.hl = self.hl.wrapping_add(1);
        self.bc = self.bc.wrapping_sub(1);

        let half = u8::from(self.sz5h3pn & flags::H != 0);
        let diff = self.a.wrapping_sub(value).wrapping_sub(half);
        self.sz5h3pn = (self.sz5h3pn & flags::MASK_SZHN) | (diff & flags::F3);
        if diff & 0x02 != 0 {
            self.sz5h3pn |= flags::F5;
        }
        if self.bc != 0 {
            self.sz5h3pn |= flags::PV;
        }

        self.memptr = self.memptr.wrapping_add(1);
        self.flag_q = true;
    }

    /// CPD: as CPI with HL (and MEMPTR) decrementing
    pub(super) fn cpd(&mut self, bus: &mut impl Bus) {
        let value = bus.peek8(self.hl);
        let carry = self.carry;
        self.alu_cp(value);
        self.carry = carry;
        bus.address_on_bus(self.hl, 5);
        self.hl = self.hl.wrapping_sub(1);
        self.bc = self.bc.wrapping_sub(1);

        let half = u8::from(self.sz5h3pn & flags::H != 0);
        let diff = self.a.wrapping_sub(value).wrapping_sub(half);
        self.sz5h3pn = (self.sz5h3pn & flags::MASK_SZHN) | (diff & flags::F3);
        if diff & 0x02 != 0 {
            self.sz5h3pn |= flags::F5;
        }
        if self.bc != 0 {
            self.sz5h3pn |= flags::PV;
        }

        self.memptr = self.memptr.wrapping_sub(1);
        self.flag_q = true;
    }

    /// INI: (HL) <- port(BC), B--, HL++. The undocumented flags mix the
    /// input byte with C + 1.
    pub(super) fn ini(&mut self, bus: &mut impl Bus) {
        self.memptr = self.bc;
        bus.address_on_bus(self.pair_ir(), 1);
        let value = bus.in_port(self.memptr);
        self.memptr = self.memptr.wrapping_add(1);
        bus.poke8(self.hl, value);

        self.set_b(self.b().wrapping_sub(1));
        self.hl = self.hl.wrapping_add(1);

        self.sz5h3pn = SZ53PN_ADD[self.b() as usize];
        if value > 0x7F {
            self.sz5h3pn |= flags::N;
        }

        self.carry = false;
        let tmp = u16::from(value) + (u16::from(self.c()).wrapping_add(1) & 0xFF);
        if tmp > 0xFF {
            self.sz5h3pn |= flags::H;
            self.carry = true;
        }

        if SZ53PN_ADD[((tmp & 0x07) as u8 ^ self.b()) as usize] & flags::PV != 0 {
            self.sz5h3pn |= flags::PV;
        } else {
            self.sz5h3pn &= !flags::PV;
        }
        self.flag_q = true;
    }

    /// IND: as INI with HL (and MEMPTR) decrementing and C - 1 in the sum
    pub(super) fn ind(&mut self, bus: &mut impl Bus) {
        self.memptr = self.bc;
        bus.address_on_bus(self.pair_ir(), 1);
        let value = bus.in_port(self.memptr);
        self.memptr = self.memptr.wrapping_sub(1);
        bus.poke8(self.hl, value);

        self.set_b(self.b().wrapping_sub(1));
        self.hl = self.hl.wrapping_sub(1);

        self.sz5h3pn = SZ53PN_ADD[self.b() as usize];
        if value > 0x7F {
            self.sz5h3pn |= flags::N;
        }

        self.carry = false;
        let tmp = u16::from(value).wrapping_add(u16::from(self.c()).wrapping_sub(1));
        if tmp > 0xFF {
            self.sz5h3pn |= flags::H;
            self.carry = true;
        }

        if SZ53PN_ADD[((tmp & 0x07) as u8 ^ self.b()) as usize] & flags::PV != 0 {
            self.sz5h3pn |= flags::PV;
        } else {
            self.sz5h3pn &= !flags::PV;
        }
        self.flag_q = true;
    }

    /// OUTI: port(BC after B--) <- (HL), HL++. N tracks bit 7 of the byte;
    /// H/C come from L + value after the increment.
    pub(super) fn outi(&mut self, bus: &mut impl Bus) {
        bus.address_on_bus(self.pair_ir(), 1);

        self.set_b(self.b().wrapping_sub(1));
        self.memptr = self.bc;

        let value = bus.peek8(self.hl);
        bus.out_port(self.memptr, value);
        self.memptr = self.memptr.wrapping_add(1);

        self.hl = self.hl.wrapping_add(1);

        self.carry = false;
        self.sz5h3pn = if value > 0x7F {
            SZ53N_SUB[self.b() as usize]
        } else {
            SZ53N_ADD[self.b() as usize]
        };

        let sum = u16::from(self.l()) + u16::from(value);
        if sum > 0xFF {
            self.sz5h3pn |= flags::H;
            self.carry = true;
        }

        if SZ53PN_ADD[((sum & 0x07) as u8 ^ self.b()) as usize] & flags::PV != 0 {
            self.sz5h3pn |= flags::PV;
        }
        self.flag_q = true;
    }

    /// OUTD: as OUTI with HL (and MEMPTR) decrementing
    pub(super) fn outd(&mut self, bus: &mut impl Bus) {
        bus.address_on_bus(self.pair_ir(), 1);

        self.set_b(self.b().wrapping_sub(1));
        self.memptr = self.bc;

        let value = bus.peek8(self.hl);
        bus.out_port(self.memptr, value);
        self.memptr = self.memptr.wrapping_sub(1);

        self.hl = self.hl.wrapping_sub(1);

        self.carry = false;
        self.sz5h3pn = if value > 0x7F {
            SZ53N_SUB[self.b() as usize]
        } else {
            SZ53N_ADD[self.b() as usize]
        };

        let sum = u16::from(self.l()) + u16::from(value);
        if sum > 0xFF {
            self.sz5h3pn |= flags::H;
            self.carry = true;
        }

        if SZ53PN_ADD[((sum & 0x07) as u8 ^ self.b()) as usize] & flags::PV != 0 {
            self.sz5h3pn |= flags::PV;
        }
        self.flag_q = true;
    }

    // ========== Register Access by Decode Index ==========

    /// Get 8-bit register by decode index (0=B 1=C 2=D 3=E 4=H 5=L 6=(HL)
    /// 7=A); index 6 reads memory through the bus.
    pub(super) fn get_reg8(&mut self, idx: u8, bus: &mut impl Bus) -> u8 {
        match idx {
            0 => self.b(),
            1 => self.c(),
            2 => self.d(),
            3 => self.e(),
            4 => self.h(),
            5 => self.l(),
            6 => bus.peek8(self.hl),
            _ => self.a,
        }
    }

    /// Set 8-bit register by decode index
    pub(super) fn set_reg8(&mut self, idx: u8, value: u8, bus: &mut impl Bus) {
        match idx {
            0 => self.set_b(value),
            1 => self.set_c(value),
            2 => self.set_d(value),
            3 => self.set_e(value),
            4 => self.set_h(value),
            5 => self.set_l(value),
            6 => bus.poke8(self.hl, value),
            _ => self.a = value,
        }
    }

    /// Get 16-bit pair by decode index (0=BC 1=DE 2=HL 3=SP)
    pub(super) fn get_rp(&self, idx: u8) -> u16 {
        match idx {
            0 => self.bc,
            1 => self.de,
            2 => self.hl,
            _ => self.sp,
        }
    }

    /// Set 16-bit pair by decode index
    pub(super) fn set_rp(&mut self, idx: u8, word: u16) {
        match idx {
            0 => self.bc = word,
            1 => self.de = word,
            2 => self.hl = word,
            _ => self.sp = word,
        }
    }

    /// Get 16-bit pair for PUSH/POP (0=BC 1=DE 2=HL 3=AF)
    pub(super) fn get_rp2(&self, idx: u8) -> u16 {
        match idx {
            0 => self.bc,
            1 => self.de,
            2 => self.hl,
            _ => self.af(),
        }
    }

    /// Set 16-bit pair for PUSH/POP
    pub(super) fn set_rp2(&mut self, idx: u8, word: u16) {
        match idx {
            0 => self.bc = word,
            1 => self.de = word,
            2 => self.hl = word,
            _ => self.set_af(word),
        }
    }

    /// Check condition code (0=NZ 1=Z 2=NC 3=C 4=PO 5=PE 6=P 7=M)
    pub(super) fn check_cc(&self, cc: u8) -> bool {
        match cc {
            0 => self.sz5h3pn & flags::Z == 0,
            1 => self.sz5h3pn & flags::Z != 0,
            2 => !self.carry,
            3 => self.carry,
            4 => self.sz5h3pn & flags::PV == 0,
            5 => self.sz5h3pn & flags::PV != 0,
            6 => self.sz5h3pn & flags::S == 0,
            _ => self.sz5h3pn & flags::S != 0,
        }
    }
}
