//! 6502 processor status register (P).
//!
//! Bit layout is the hardware one (bit 7 negative … bit 0 carry) so `bits()` is what
//! PHP pushes and what the trace line prints.

use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Status: u8 {
        const CARRY = 1 << 0;
        const ZERO = 1 << 1;
        const INTERRUPT_DISABLE = 1 << 2;
        /// Stored but ignored: the 2A03 has no decimal mode.
        const DECIMAL = 1 << 3;
        /// Only exists in the pushed copy (PHP/BRK set it, IRQ/NMI clear it).
        const BREAK = 1 << 4;
        /// Always 1 when read on 6502.
        const UNUSED = 1 << 5;
        const OVERFLOW = 1 << 6;
        const NEGATIVE = 1 << 7;
    }
}

impl Status {
    /// P after reset: interrupts disabled, unused bit set ($24).
    pub const POWER_ON: Status = Status::INTERRUPT_DISABLE.union(Status::UNUSED);

    /// Zero and negative from a result byte.
    pub fn set_zn(&mut self, value: u8) {
        self.set(Status::ZERO, value == 0);
        self.set(Status::NEGATIVE, value & 0x80 != 0);
    }

    pub fn carry(self) -> bool {
        self.contains(Status::CARRY)
    }

    pub fn zero(self) -> bool {
        self.contains(Status::ZERO)
    }

    pub fn negative(self) -> bool {
        self.contains(Status::NEGATIVE)
    }

    pub fn overflow(self) -> bool {
        self.contains(Status::OVERFLOW)
    }

    pub fn interrupts_disabled(self) -> bool {
        self.contains(Status::INTERRUPT_DISABLE)
    }

    /// Value restored by PLP/RTI: B is dropped, U forced on.
    pub fn from_stack(value: u8) -> Status {
        (Status::from_bits_retain(value) - Status::BREAK) | Status::UNUSED
    }
}
