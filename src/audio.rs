//! Boundary to the audio unit.
//!
//! The [APU](https://www.nesdev.org/wiki/APU) registers live on the CPU bus at $4000–$4013,
//! $4015 and $4017 (write). Synthesis is not part of the core: the bus forwards those
//! accesses to an [`AudioPort`] and the system clocks it once per CPU cycle.

/// Audio collaborator driven by the bus and the system stepper.
pub trait AudioPort {
    /// Write to $4000–$4013, $4015 or $4017.
    fn write_register(&mut self, addr: u16, value: u8);
    /// Read of $4015 (channel status).
    fn read_status(&mut self) -> u8;
    /// One CPU cycle elapsed.
    fn tick(&mut self);
}

/// Accepts every register write and produces nothing.
#[derive(Default)]
pub struct SilentAudio;

impl AudioPort for SilentAudio {
    fn write_register(&mut self, _addr: u16, _value: u8) {}

    fn read_status(&mut self) -> u8 {
        0
    }

    fn tick(&mut self) {}
}
