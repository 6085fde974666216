use log::{Level, log_enabled, trace};

use crate::{
    bus::Bus,
    cpu::{
        flags::Status,
        opcodes::{Instruction, Mode, Op, decode},
    },
    error::{EmuError, Result},
};

pub const NMI_VECTOR: u16 = 0xFFFA;
pub const RESET_VECTOR: u16 = 0xFFFC;
/// Shared by BRK and IRQ.
pub const IRQ_VECTOR: u16 = 0xFFFE;

/// Cycles spent pushing state and jumping through a vector.
const INTERRUPT_CYCLES: usize = 7;

/// Interrupt request latched for the next instruction boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interrupt {
    Nmi,
    Irq,
}

pub struct Cpu<B: Bus> {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub status: Status,
    /// Total CPU cycles since power-on, stall cycles included.
    pub cycles: usize,
    pub bus: B,
    pub pending: Option<Interrupt>,
}

impl<B: Bus> Cpu<B> {
    pub fn new(bus: B) -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0,
            pc: 0,
            status: Status::POWER_ON,
            cycles: 0,
            bus,
            pending: None,
        }
    }

    pub fn reset(&mut self) {
        self.pc = self.read_word(RESET_VECTOR);

        self.sp = 0xFD; // resets at 0xFD instead of 0xFF for some reason
        self.status = Status::POWER_ON;

        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.pending = None;

        self.cycles = 7;
    }

    /// Latch an interrupt for the next boundary. A pending NMI is never displaced by an IRQ.
    pub fn request(&mut self, interrupt: Interrupt) {
        if self.pending != Some(Interrupt::Nmi) {
            self.pending = Some(interrupt);
        }
    }

    /// Run one instruction, or service one pending interrupt, and return the elapsed cycles.
    ///
    /// An opcode with no decode entry is fatal: nothing after it could be trusted.
    pub fn step(&mut self) -> Result<usize> {
        match self.pending.take() {
            Some(Interrupt::Nmi) => return Ok(self.service_interrupt(NMI_VECTOR)),
            Some(Interrupt::Irq) if !self.status.interrupts_disabled() => {
                return Ok(self.service_interrupt(IRQ_VECTOR));
            }
            // Masked IRQ: dropped. The board keeps its line high and is polled again.
            _ => {}
        }

        let pc = self.pc;
        let opcode = self.fetch_byte();
        let instruction = decode(opcode).ok_or(EmuError::UnknownOpcode { opcode, pc })?;
        if log_enabled!(Level::Trace) {
            self.trace(pc, instruction.mode);
        }

        let (addr, page_crossed) = self.operand_address(instruction.mode);
        let mut elapsed = instruction.cycles as usize + self.execute(instruction, addr, page_crossed);
        if page_crossed && instruction.op.page_cross_penalty() {
            elapsed += 1;
        }

        self.cycles += elapsed;
        let stall = self.bus.take_stall(self.cycles);
        self.cycles += stall;
        Ok(elapsed + stall)
    }

    fn service_interrupt(&mut self, vector: u16) -> usize {
        self.push16(self.pc);
        self.push(((self.status - Status::BREAK) | Status::UNUSED).bits());
        self.status.insert(Status::INTERRUPT_DISABLE);
        self.pc = self.read_word(vector);
        self.cycles += INTERRUPT_CYCLES;
        INTERRUPT_CYCLES
    }

    fn fetch_byte(&mut self) -> u8 {
        let byte = self.bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        byte
    }

    fn fetch_word(&mut self) -> u16 {
        let lo = self.fetch_byte() as u16;
        let hi = self.fetch_byte() as u16;
        (hi << 8) | lo
    }

    fn read_word(&mut self, addr: u16) -> u16 {
        let lo = self.bus.read(addr) as u16;
        let hi = self.bus.read(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    /// Little-endian pointer in page zero; the high byte wraps to $00 instead of reaching $0100.
    fn read_zero_page_word(&mut self, ptr: u8) -> u16 {
        let lo = self.bus.read(ptr as u16) as u16;
        let hi = self.bus.read(ptr.wrapping_add(1) as u16) as u16;
        (hi << 8) | lo
    }

    /// Opcode and operand bytes of the instruction at `pc` in hex, e.g. `"AD 34 12"`.
    /// Reads through the bus, so only call it where a second fetch is harmless.
    pub fn instruction_bytes(&mut self, pc: u16, mode: Mode) -> String {
        (0..=mode.operand_len())
            .map(|i| format!("{:02X}", self.bus.read(pc.wrapping_add(i))))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn trace(&mut self, pc: u16, mode: Mode) {
        let bytes = self.instruction_bytes(pc, mode);
        trace!(
            "{:04X}  {:<8}  A:{:02X} X:{:02X} Y:{:02X} P:{:02X} SP:{:02X} CYC:{}",
            pc,
            bytes,
            self.a,
            self.x,
            self.y,
            self.status.bits(),
            self.sp,
            self.cycles
        );
    }

    /// Effective address of the operand and whether indexing crossed a page.
    /// For relative mode the address is the branch target.
    fn operand_address(&mut self, mode: Mode) -> (u16, bool) {
        match mode {
            Mode::Implied | Mode::Accumulator => (0, false),
            Mode::Immediate => {
                let addr = self.pc;
                self.pc = self.pc.wrapping_add(1);
                (addr, false)
            }
            Mode::ZeroPage => (self.fetch_byte() as u16, false),
            Mode::ZeroPageX => (self.fetch_byte().wrapping_add(self.x) as u16, false),
            Mode::ZeroPageY => (self.fetch_byte().wrapping_add(self.y) as u16, false),
            Mode::Absolute => (self.fetch_word(), false),
            Mode::AbsoluteX => {
                let base = self.fetch_word();
                let addr = base.wrapping_add(self.x as u16);
                (addr, crosses_page(base, addr))
            }
            Mode::AbsoluteY => {
                let base = self.fetch_word();
                let addr = base.wrapping_add(self.y as u16);
                (addr, crosses_page(base, addr))
            }
            Mode::Relative => {
                let offset = self.fetch_byte() as i8;
                let target = self.pc.wrapping_add(offset as u16);
                (target, crosses_page(self.pc, target))
            }
            Mode::Indirect => {
                let ptr = self.fetch_word();
                // JMP ($xxFF) fetches the high byte from $xx00, not the next page.
                let lo = self.bus.read(ptr) as u16;
                let hi = self.bus.read((ptr & 0xFF00) | (ptr.wrapping_add(1) & 0x00FF)) as u16;
                ((hi << 8) | lo, false)
            }
            Mode::IndirectX => {
                let ptr = self.fetch_byte().wrapping_add(self.x);
                (self.read_zero_page_word(ptr), false)
            }
            Mode::IndirectY => {
                let ptr = self.fetch_byte();
                let base = self.read_zero_page_word(ptr);
                let addr = base.wrapping_add(self.y as u16);
                (addr, crosses_page(base, addr))
            }
        }
    }

    /// Execute a decoded instruction. Returns extra cycles beyond the base count (taken branches).
    fn execute(&mut self, instruction: Instruction, addr: u16, page_crossed: bool) -> usize {
        let mode = instruction.mode;
        match instruction.op {
            Op::Lda => {
                self.a = self.bus.read(addr);
                self.status.set_zn(self.a);
            }
            Op::Ldx => {
                self.x = self.bus.read(addr);
                self.status.set_zn(self.x);
            }
            Op::Ldy => {
                self.y = self.bus.read(addr);
                self.status.set_zn(self.y);
            }
            Op::Lax => {
                let value = self.bus.read(addr);
                self.a = value;
                self.x = value;
                self.status.set_zn(value);
            }
            Op::Sta => self.bus.write(addr, self.a),
            Op::Stx => self.bus.write(addr, self.x),
            Op::Sty => self.bus.write(addr, self.y),
            Op::Sax => self.bus.write(addr, self.a & self.x),

            Op::Tax => {
                self.x = self.a;
                self.status.set_zn(self.x);
            }
            Op::Tay => {
                self.y = self.a;
                self.status.set_zn(self.y);
            }
            Op::Tsx => {
                self.x = self.sp;
                self.status.set_zn(self.x);
            }
            Op::Txa => {
                self.a = self.x;
                self.status.set_zn(self.a);
            }
            Op::Txs => self.sp = self.x,
            Op::Tya => {
                self.a = self.y;
                self.status.set_zn(self.a);
            }

            Op::Adc => {
                let value = self.bus.read(addr);
                self.add_with_carry(value);
            }
            // SBC is ADC of the one's complement.
            Op::Sbc => {
                let value = self.bus.read(addr);
                self.add_with_carry(!value);
            }
            Op::And => {
                self.a &= self.bus.read(addr);
                self.status.set_zn(self.a);
            }
            Op::Ora => {
                self.a |= self.bus.read(addr);
                self.status.set_zn(self.a);
            }
            Op::Eor => {
                self.a ^= self.bus.read(addr);
                self.status.set_zn(self.a);
            }
            Op::Cmp => {
                let value = self.bus.read(addr);
                self.compare(self.a, value);
            }
            Op::Cpx => {
                let value = self.bus.read(addr);
                self.compare(self.x, value);
            }
            Op::Cpy => {
                let value = self.bus.read(addr);
                self.compare(self.y, value);
            }
            Op::Bit => {
                let value = self.bus.read(addr);
                self.status.set(Status::ZERO, self.a & value == 0);
                self.status.set(Status::OVERFLOW, value & 0x40 != 0);
                self.status.set(Status::NEGATIVE, value & 0x80 != 0);
            }

            Op::Asl => {
                self.modify(mode, addr, Self::asl);
            }
            Op::Lsr => {
                self.modify(mode, addr, Self::lsr);
            }
            Op::Rol => {
                self.modify(mode, addr, Self::rol);
            }
            Op::Ror => {
                self.modify(mode, addr, Self::ror);
            }
            Op::Inc => {
                let value = self.modify(mode, addr, |_, v| v.wrapping_add(1));
                self.status.set_zn(value);
            }
            Op::Dec => {
                let value = self.modify(mode, addr, |_, v| v.wrapping_sub(1));
                self.status.set_zn(value);
            }
            Op::Inx => {
                self.x = self.x.wrapping_add(1);
                self.status.set_zn(self.x);
            }
            Op::Iny => {
                self.y = self.y.wrapping_add(1);
                self.status.set_zn(self.y);
            }
            Op::Dex => {
                self.x = self.x.wrapping_sub(1);
                self.status.set_zn(self.x);
            }
            Op::Dey => {
                self.y = self.y.wrapping_sub(1);
                self.status.set_zn(self.y);
            }

            Op::Dcp => {
                let value = self.modify(mode, addr, |_, v| v.wrapping_sub(1));
                self.compare(self.a, value);
            }
            Op::Isb => {
                let value = self.modify(mode, addr, |_, v| v.wrapping_add(1));
                self.add_with_carry(!value);
            }
            Op::Slo => {
                let value = self.modify(mode, addr, Self::asl);
                self.a |= value;
                self.status.set_zn(self.a);
            }
            Op::Rla => {
                let value = self.modify(mode, addr, Self::rol);
                self.a &= value;
                self.status.set_zn(self.a);
            }
            Op::Sre => {
                let value = self.modify(mode, addr, Self::lsr);
                self.a ^= value;
                self.status.set_zn(self.a);
            }
            Op::Rra => {
                let value = self.modify(mode, addr, Self::ror);
                self.add_with_carry(value);
            }

            Op::Jmp => self.pc = addr,
            Op::Jsr => {
                self.push16(self.pc.wrapping_sub(1));
                self.pc = addr;
            }
            Op::Rts => self.pc = self.pop16().wrapping_add(1),
            Op::Rti => {
                self.status = Status::from_stack(self.pop());
                self.pc = self.pop16();
            }
            Op::Brk => {
                // Skip the padding byte.
                self.pc = self.pc.wrapping_add(1);
                self.push16(self.pc);
                self.push((self.status | Status::BREAK | Status::UNUSED).bits());
                self.status.insert(Status::INTERRUPT_DISABLE);
                self.pc = self.read_word(IRQ_VECTOR);
            }

            Op::Bcc => return self.branch(!self.status.carry(), addr, page_crossed),
            Op::Bcs => return self.branch(self.status.carry(), addr, page_crossed),
            Op::Beq => return self.branch(self.status.zero(), addr, page_crossed),
            Op::Bne => return self.branch(!self.status.zero(), addr, page_crossed),
            Op::Bmi => return self.branch(self.status.negative(), addr, page_crossed),
            Op::Bpl => return self.branch(!self.status.negative(), addr, page_crossed),
            Op::Bvs => return self.branch(self.status.overflow(), addr, page_crossed),
            Op::Bvc => return self.branch(!self.status.overflow(), addr, page_crossed),

            Op::Clc => self.status.remove(Status::CARRY),
            Op::Cld => self.status.remove(Status::DECIMAL),
            Op::Cli => self.status.remove(Status::INTERRUPT_DISABLE),
            Op::Clv => self.status.remove(Status::OVERFLOW),
            Op::Sec => self.status.insert(Status::CARRY),
            Op::Sed => self.status.insert(Status::DECIMAL),
            Op::Sei => self.status.insert(Status::INTERRUPT_DISABLE),

            Op::Pha => self.push(self.a),
            Op::Php => self.push((self.status | Status::BREAK | Status::UNUSED).bits()),
            Op::Pla => {
                self.a = self.pop();
                self.status.set_zn(self.a);
            }
            Op::Plp => self.status = Status::from_stack(self.pop()),

            Op::Nop => {}
        }
        0
    }

    /// +1 when taken, +2 when the target is on another page.
    fn branch(&mut self, condition: bool, target: u16, page_crossed: bool) -> usize {
        if !condition {
            return 0;
        }
        self.pc = target;
        if page_crossed { 2 } else { 1 }
    }

    /// Overflow when both inputs share a sign that the result does not.
    fn add_with_carry(&mut self, value: u8) {
        let sum = self.a as u16 + value as u16 + self.status.carry() as u16;
        let result = sum as u8;
        self.status.set(Status::CARRY, sum > 0xFF);
        self.status.set(
            Status::OVERFLOW,
            (!(self.a ^ value) & (self.a ^ result) & 0x80) != 0,
        );
        self.a = result;
        self.status.set_zn(result);
    }

    fn compare(&mut self, register: u8, value: u8) {
        self.status.set(Status::CARRY, register >= value);
        self.status.set_zn(register.wrapping_sub(value));
    }

    /// Read-modify-write on the accumulator or memory; returns the written value.
    fn modify(&mut self, mode: Mode, addr: u16, f: impl FnOnce(&mut Self, u8) -> u8) -> u8 {
        if mode == Mode::Accumulator {
            let a = self.a;
            let result = f(self, a);
            self.a = result;
            return result;
        }
        let value = self.bus.read(addr);
        let result = f(self, value);
        self.bus.write(addr, result);
        result
    }

    fn asl(&mut self, value: u8) -> u8 {
        let result = value << 1;
        self.status.set(Status::CARRY, value & 0x80 != 0);
        self.status.set_zn(result);
        result
    }

    fn lsr(&mut self, value: u8) -> u8 {
        let result = value >> 1;
        self.status.set(Status::CARRY, value & 1 != 0);
        self.status.set_zn(result);
        result
    }

    fn rol(&mut self, value: u8) -> u8 {
        let result = (value << 1) | self.status.carry() as u8;
        self.status.set(Status::CARRY, value & 0x80 != 0);
        self.status.set_zn(result);
        result
    }

    fn ror(&mut self, value: u8) -> u8 {
        let result = (value >> 1) | ((self.status.carry() as u8) << 7);
        self.status.set(Status::CARRY, value & 1 != 0);
        self.status.set_zn(result);
        result
    }

    pub(crate) fn push(&mut self, value: u8) {
        self.bus.write(0x0100 | self.sp as u16, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    pub(crate) fn pop(&mut self) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        self.bus.read(0x0100 | self.sp as u16)
    }

    /// High byte first so the low byte pops first.
    pub(crate) fn push16(&mut self, value: u16) {
        self.push((value >> 8) as u8);
        self.push(value as u8);
    }

    pub(crate) fn pop16(&mut self) -> u16 {
        let lo = self.pop() as u16;
        let hi = self.pop() as u16;
        (hi << 8) | lo
    }
}

fn crosses_page(a: u16, b: u16) -> bool {
    a & 0xFF00 != b & 0xFF00
}
