//! Mapper 7 (AxROM): one 32 KiB PRG bank at $8000 and single-screen mirroring, both from one register.

use crate::cartridge::mapper::{CartridgeData, Mirroring, PRG_BANK_32K, mapper::Mapper};

pub struct Mapper7 {
    data: CartridgeData,
    prg_offset: usize,
    mirroring: Mirroring,
}

impl Mapper7 {
    pub fn new(data: CartridgeData) -> Self {
        Self {
            data,
            prg_offset: 0,
            mirroring: Mirroring::OneScreenLower,
        }
    }
}

impl Mapper for Mapper7 {
    fn prg_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => self.data.read_prg_ram(addr),
            _ => self.data.read_prg(self.prg_offset, addr, PRG_BANK_32K),
        }
    }

    fn prg_write(&mut self, addr: u16, value: u8) {
        if addr < 0x8000 {
            self.data.write_prg_ram(addr, value);
            return;
        }
        // Bits 0–2: PRG bank; bit 4: nametable page.
        self.prg_offset = self.data.prg_offset((value & 0b111) as i32, PRG_BANK_32K);
        self.mirroring = if value & 0x10 != 0 {
            Mirroring::OneScreenUpper
        } else {
            Mirroring::OneScreenLower
        };
    }

    fn chr_read(&mut self, addr: u16) -> u8 {
        self.data.read_chr(0, addr, 0x2000)
    }

    fn chr_write(&mut self, addr: u16, value: u8) {
        self.data.write_chr(0, addr, 0x2000, value);
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }
}
