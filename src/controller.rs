//! NES controller input handling.
//!
//! Implements the standard NES controller shift register protocol
//! ([Controller reading](https://www.nesdev.org/wiki/Controller_reading)):
//! write $01 to $4016 to latch current state; then read $4016/$4017 repeatedly
//! to get one bit per read (A, B, Select, Start, Up, Down, Left, Right).

use bitflags::bitflags;

bitflags! {
    /// Button bits in shift-out order.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Buttons: u8 {
        const A = 1 << 0;
        const B = 1 << 1;
        const SELECT = 1 << 2;
        const START = 1 << 3;
        const UP = 1 << 4;
        const DOWN = 1 << 5;
        const LEFT = 1 << 6;
        const RIGHT = 1 << 7;
    }
}

/// Upper bits of the data line float at the last bus value, which is $40 for these reads.
const OPEN_BUS: u8 = 0x40;

/// One standard controller plugged into port 1 ($4016) or port 2 ($4017).
#[derive(Default)]
pub struct Controller {
    /// Buttons currently held, as set by the front end.
    buttons: Buttons,
    /// Snapshot shifted out by reads.
    latched: u8,
    /// Next bit to shift out; 8 and beyond means exhausted.
    index: u8,
    strobe: bool,
}

impl Controller {
    /// Create a new controller with no buttons pressed.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_buttons(&mut self, buttons: Buttons) {
        self.buttons = buttons;
    }

    pub fn buttons(&self) -> Buttons {
        self.buttons
    }

    /// Read one button state. While strobe is high this is always A; after eight reads the
    /// official pad returns 1.
    pub fn read(&mut self) -> u8 {
        if self.strobe {
            self.latch();
        }
        let bit = if self.index < 8 {
            (self.latched >> self.index) & 1
        } else {
            1
        };
        if !self.strobe && self.index < 8 {
            self.index += 1;
        }
        bit | OPEN_BUS
    }

    /// Write to $4016. Bit 0 high latches the buttons and rewinds the shift register.
    pub fn write(&mut self, data: u8) {
        self.strobe = data & 1 != 0;
        if self.strobe {
            self.latch();
        }
    }

    fn latch(&mut self) {
        self.latched = self.buttons.bits();
        self.index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifts_out_buttons_in_order_then_ones() {
        let mut pad = Controller::new();
        pad.set_buttons(Buttons::A | Buttons::START | Buttons::RIGHT);
        pad.write(1);
        pad.write(0);

        let bits: Vec<u8> = (0..10).map(|_| pad.read() & 1).collect();
        assert_eq!(bits, [1, 0, 0, 1, 0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn strobe_high_keeps_returning_a() {
        let mut pad = Controller::new();
        pad.set_buttons(Buttons::A);
        pad.write(1);
        for _ in 0..4 {
            assert_eq!(pad.read(), 0x41);
        }
    }

    #[test]
    fn latch_ignores_later_presses() {
        let mut pad = Controller::new();
        pad.write(1);
        pad.write(0);
        pad.set_buttons(Buttons::A);
        assert_eq!(pad.read() & 1, 0);
    }

    #[test]
    fn reads_carry_open_bus_bits() {
        let mut pad = Controller::new();
        assert_eq!(pad.read() & 0xE0, 0x40);
    }
}
