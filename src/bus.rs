//! Memory bus and address decoding for the NES.
//!
//! Maps CPU addresses to RAM, PPU registers, cartridge, controllers and the audio port
//! ([CPU memory map](https://www.nesdev.org/wiki/CPU_memory_map)). OAM DMA is performed
//! here and reported to the CPU as stall cycles.

use log::debug;

use crate::{
    audio::{AudioPort, SilentAudio},
    cartridge::cartridge::Cartridge,
    controller::Controller,
    ppu::ppu::{OAM_LEN, Ppu},
};

pub const RAM_LEN: usize = 0x800;

/// CPU cycles an OAM DMA halts the CPU for, before the alignment cycle.
pub const OAM_DMA_CYCLES: usize = 513;

/// Trait for memory-mapped I/O and bus access used by the CPU.
pub trait Bus {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, data: u8);

    /// Cycles the CPU must additionally burn for work triggered by the last instruction
    /// (OAM DMA). `total_cycles` is the CPU cycle count the stall starts at.
    fn take_stall(&mut self, _total_cycles: usize) -> usize {
        0
    }
}

/// Main NES bus: RAM, PPU, cartridge, controllers and audio port.
pub struct NesBus {
    pub ram: [u8; RAM_LEN],
    pub cart: Cartridge,
    pub ppu: Ppu,
    pub controllers: [Controller; 2],
    pub audio: Box<dyn AudioPort>,
    /// Set by a write to $4014; the copy has happened, only the cycles are owed.
    dma_pending: bool,
    /// Last value seen on the data bus, returned by undriven addresses.
    open_bus: u8,
}

impl NesBus {
    /// Create a new bus with the given cartridge and a silent audio port.
    pub fn new(cart: Cartridge) -> Self {
        Self::with_audio(cart, Box::new(SilentAudio))
    }

    pub fn with_audio(cart: Cartridge, audio: Box<dyn AudioPort>) -> Self {
        Self {
            ram: [0; RAM_LEN],
            cart,
            ppu: Ppu::new(),
            controllers: [Controller::new(), Controller::new()],
            audio,
            dma_pending: false,
            open_bus: 0,
        }
    }

    /// Copy page `page` ($XX00–$XXFF) into OAM through the normal read path.
    fn oam_dma(&mut self, page: u8) {
        debug!("OAM DMA from ${:02X}00", page);
        let base = (page as u16) << 8;
        let mut buffer = [0u8; OAM_LEN];
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = self.read(base | i as u16);
        }
        self.ppu.oam_dma(&buffer);
        self.dma_pending = true;
    }
}

impl Bus for NesBus {
    fn read(&mut self, addr: u16) -> u8 {
        let data = match addr {
            // Internal RAM (mirrored 4x in 0x0000-0x1FFF)
            0x0000..=0x1FFF => self.ram[addr as usize % RAM_LEN],
            // PPU registers $2000-$3FFF (mirrored every 8 bytes)
            0x2000..=0x3FFF => self.ppu.read_register(addr & 7, &mut self.cart),
            0x4015 => self.audio.read_status(),
            0x4016 => self.controllers[0].read(),
            0x4017 => self.controllers[1].read(),
            // Write-only APU registers, $4014 and the disabled test registers.
            0x4000..=0x401F => self.open_bus,
            // Cartridge: expansion area, PRG RAM, PRG ROM
            0x4020..=0xFFFF => self.cart.prg_read(addr),
        };
        self.open_bus = data;
        data
    }

    fn write(&mut self, addr: u16, data: u8) {
        self.open_bus = data;
        match addr {
            // Internal RAM
            0x0000..=0x1FFF => self.ram[addr as usize % RAM_LEN] = data,
            // PPU registers $2000-$3FFF (mirrored every 8 bytes)
            0x2000..=0x3FFF => self.ppu.write_register(addr & 7, data, &mut self.cart),
            0x4014 => self.oam_dma(data),
            0x4016 => {
                // One strobe line feeds both ports.
                for controller in &mut self.controllers {
                    controller.write(data);
                }
            }
            0x4000..=0x4013 | 0x4015 | 0x4017 => self.audio.write_register(addr, data),
            // CPU test mode registers, disabled on retail units.
            0x4018..=0x401F => {}
            // Cartridge: PRG RAM and mapper registers
            0x4020..=0xFFFF => self.cart.prg_write(addr, data),
        }
    }

    /// 513 cycles, plus one alignment cycle when the DMA starts on an odd CPU cycle.
    fn take_stall(&mut self, total_cycles: usize) -> usize {
        if !std::mem::take(&mut self.dma_pending) {
            return 0;
        }
        OAM_DMA_CYCLES + total_cycles % 2
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::cartridge::cartridge::tests::ines_image;
    use crate::controller::Buttons;

    fn bus() -> NesBus {
        NesBus::new(Cartridge::from_bytes(&ines_image(0, 2, 1, 0)).unwrap())
    }

    proptest! {
        #[test]
        fn prop_ram_mirrors_every_2k(addr in 0u16..0x0800, mirror in 0u16..4, value: u8) {
            let mut bus = bus();
            bus.write(addr + mirror * 0x800, value);
            for m in 0..4 {
                prop_assert_eq!(bus.read(addr + m * 0x800), value);
            }
        }

        #[test]
        fn prop_ppu_registers_mirror_every_8_bytes(
            write_mirror in 0u16..0x400,
            read_mirror in 0u16..0x400,
            value: u8,
        ) {
            let mut bus = bus();
            bus.write(0x2000 + write_mirror * 8, value);
            prop_assert_eq!(bus.read(0x2000 + read_mirror * 8), value);
        }

        #[test]
        fn prop_oam_registers_through_any_mirror(
            mirror in 0u16..0x400,
            index: u8,
            value: u8,
        ) {
            let mut bus = bus();
            let base = 0x2000 + mirror * 8;
            bus.write(base + 3, index);
            bus.write(base + 4, value);
            bus.write(0x2003, index);
            prop_assert_eq!(bus.read(0x3FFC), value);
        }
    }

    #[test]
    fn cartridge_space_reaches_prg_rom() {
        let mut bus = bus();
        assert_eq!(bus.read(0x8000), 0);
        assert_eq!(bus.read(0xC000), 1);
    }

    #[test]
    fn prg_ram_is_reachable() {
        let mut bus = bus();
        bus.write(0x6000, 0x42);
        assert_eq!(bus.read(0x6000), 0x42);
    }

    #[test]
    fn test_registers_ignore_writes() {
        let mut bus = bus();
        bus.write(0x4018, 0x12);
        assert_eq!(bus.ram, [0; RAM_LEN]);
    }

    #[test]
    fn controller_ports_share_strobe() {
        let mut bus = bus();
        bus.controllers[0].set_buttons(Buttons::A);
        bus.controllers[1].set_buttons(Buttons::B);
        bus.write(0x4016, 1);
        bus.write(0x4016, 0);
        assert_eq!(bus.read(0x4016) & 1, 1);
        assert_eq!(bus.read(0x4017) & 1, 0);
        assert_eq!(bus.read(0x4017) & 1, 1);
    }

    #[test]
    fn oam_dma_copies_page_and_owes_stall() {
        let mut bus = bus();
        for i in 0..256 {
            bus.ram[0x200 + i] = i as u8;
        }
        bus.write(0x4014, 0x02);
        assert_eq!(bus.ppu.oam[0x80], 0x80);
        assert_eq!(bus.take_stall(100), 513);
        assert_eq!(bus.take_stall(100), 0);

        bus.write(0x4014, 0x02);
        assert_eq!(bus.take_stall(101), 514);
    }
}
