//! Whole-console stepper.
//!
//! Runs one CPU instruction at a time and keeps the other chips in lock-step with it:
//! three PPU dots and one audio tick per CPU cycle
//! ([cycle reference chart](https://www.nesdev.org/wiki/Cycle_reference_chart)). Interrupt
//! lines are sampled after the catch-up, so they are seen at the next instruction boundary.

use log::info;

use crate::{
    audio::{AudioPort, SilentAudio},
    bus::NesBus,
    cartridge::cartridge::Cartridge,
    controller::Buttons,
    cpu::cpu::{Cpu, Interrupt},
    error::Result,
};

/// PPU dots per CPU cycle on NTSC hardware.
pub const PPU_DOTS_PER_CPU_CYCLE: usize = 3;

pub struct System {
    pub cpu: Cpu<NesBus>,
}

impl System {
    /// Power on with `cart` inserted and run the reset sequence.
    pub fn new(cart: Cartridge) -> Self {
        Self::with_audio(cart, Box::new(SilentAudio))
    }

    pub fn with_audio(cart: Cartridge, audio: Box<dyn AudioPort>) -> Self {
        let mut system = Self {
            cpu: Cpu::new(NesBus::with_audio(cart, audio)),
        };
        system.reset();
        system
    }

    /// Console reset button: CPU reset sequence and cleared PPU registers. RAM survives.
    pub fn reset(&mut self) {
        self.cpu.bus.ppu.reset();
        self.cpu.reset();
        info!("reset vector ${:04X}", self.cpu.pc);
    }

    /// Execute one instruction (or interrupt entry) and catch the PPU and audio up with it.
    pub fn step(&mut self) -> Result<usize> {
        let cycles = self.cpu.step()?;

        let bus = &mut self.cpu.bus;
        for _ in 0..cycles * PPU_DOTS_PER_CPU_CYCLE {
            bus.ppu.tick(&mut bus.cart);
        }
        for _ in 0..cycles {
            bus.audio.tick();
        }

        let nmi = bus.ppu.take_nmi();
        let irq = bus.cart.irq_pending();
        if nmi {
            self.cpu.request(Interrupt::Nmi);
        }
        // Level triggered: re-raised every step while the mapper holds the line.
        if irq {
            self.cpu.request(Interrupt::Irq);
        }

        Ok(cycles)
    }

    /// Step until the PPU enters vertical blank.
    pub fn run_frame(&mut self) -> Result<()> {
        loop {
            self.step()?;
            if self.cpu.bus.ppu.take_frame_ready() {
                return Ok(());
            }
        }
    }

    /// The last rendered picture, `0x00RRGGBB` per pixel, row-major 256×240.
    pub fn frame_buffer(&self) -> &[u32] {
        &self.cpu.bus.ppu.framebuffer
    }

    /// Set the held buttons of controller `port` (0 or 1). Other ports are ignored.
    pub fn set_buttons(&mut self, port: usize, buttons: Buttons) {
        if let Some(controller) = self.cpu.bus.controllers.get_mut(port) {
            controller.set_buttons(buttons);
        }
    }

    pub fn total_cycles(&self) -> usize {
        self.cpu.cycles
    }

    /// Frames completed since power-on.
    pub fn frame(&self) -> u64 {
        self.cpu.bus.ppu.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bus::Bus,
        cartridge::cartridge::{HEADER_LEN, tests::ines_image},
        ppu::ppu::{SCREEN_HEIGHT, SCREEN_WIDTH},
    };

    const NMI_HANDLER: u16 = 0x9000;

    /// NROM-128 image: `program` at $8000, NMI handler `INX; RTI` at $9000.
    fn system_with(program: &[u8]) -> System {
        let mut image = ines_image(0, 1, 1, 0);
        let prg = |addr: u16| HEADER_LEN + (addr as usize & 0x3FFF);
        image[prg(0x8000)..prg(0x8000) + program.len()].copy_from_slice(program);
        image[prg(NMI_HANDLER)] = 0xE8;
        image[prg(NMI_HANDLER) + 1] = 0x40;
        image[prg(0xFFFA)] = 0x00;
        image[prg(0xFFFB)] = 0x90;
        image[prg(0xFFFC)] = 0x00;
        image[prg(0xFFFD)] = 0x80;
        System::new(Cartridge::from_bytes(&image).unwrap())
    }

    #[test]
    fn new_runs_reset_sequence() {
        let system = system_with(&[0xEA]);
        assert_eq!(system.cpu.pc, 0x8000);
        assert_eq!(system.cpu.sp, 0xFD);
        assert_eq!(system.total_cycles(), 7);
        assert_eq!(system.frame_buffer().len(), SCREEN_WIDTH * SCREEN_HEIGHT);
    }

    #[test]
    fn ppu_runs_three_dots_per_cpu_cycle() {
        let mut system = system_with(&[0xA9, 0x42, 0xAD, 0x00, 0x02]);
        assert_eq!(system.step().unwrap(), 2);
        assert_eq!(system.cpu.bus.ppu.cycle, 6);
        assert_eq!(system.step().unwrap(), 4);
        assert_eq!(system.cpu.bus.ppu.cycle, 18);
        assert_eq!(system.total_cycles(), 13);
    }

    #[test]
    fn run_frame_stops_at_vblank() {
        // JMP $8000
        let mut system = system_with(&[0x4C, 0x00, 0x80]);
        system.run_frame().unwrap();
        assert_eq!(system.cpu.bus.ppu.scanline, 241);
        assert_eq!(system.frame(), 0);

        system.run_frame().unwrap();
        assert_eq!(system.cpu.bus.ppu.scanline, 241);
        assert_eq!(system.frame(), 1);
    }

    #[test]
    fn vblank_nmi_reaches_handler() {
        // LDA #$80; STA $2000; JMP $8005
        let mut system = system_with(&[0xA9, 0x80, 0x8D, 0x00, 0x20, 0x4C, 0x05, 0x80]);
        system.run_frame().unwrap();
        assert_eq!(system.cpu.pending, Some(Interrupt::Nmi));

        assert_eq!(system.step().unwrap(), 7);
        assert_eq!(system.cpu.pc, NMI_HANDLER);
        system.step().unwrap();
        assert_eq!(system.cpu.x, 1);
        system.step().unwrap();
        assert!((0x8005..=0x8007).contains(&system.cpu.pc));
    }

    #[test]
    fn no_nmi_when_disabled() {
        let mut system = system_with(&[0x4C, 0x00, 0x80]);
        system.run_frame().unwrap();
        assert_eq!(system.cpu.pending, None);
    }

    #[test]
    fn reset_keeps_ram() {
        let mut system = system_with(&[0x4C, 0x00, 0x80]);
        system.cpu.bus.write(0x0300, 0x5A);
        system.step().unwrap();
        system.reset();
        assert_eq!(system.cpu.pc, 0x8000);
        assert_eq!(system.cpu.bus.read(0x0300), 0x5A);
        assert_eq!(system.cpu.bus.ppu.cycle, 0);
    }

    #[test]
    fn buttons_reach_controller_port() {
        let mut system = system_with(&[0xEA]);
        system.set_buttons(1, Buttons::A);
        system.set_buttons(5, Buttons::B);
        system.cpu.bus.write(0x4016, 1);
        system.cpu.bus.write(0x4016, 0);
        assert_eq!(system.cpu.bus.read(0x4016) & 1, 0);
        assert_eq!(system.cpu.bus.read(0x4017) & 1, 1);
    }
}
