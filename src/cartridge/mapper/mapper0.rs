//! Mapper 0 (NROM): no bank switching, 16/32KB PRG, 8KB CHR.

use crate::cartridge::mapper::{CartridgeData, Mirroring, mapper::Mapper};

/// NROM mapper: fixed PRG and CHR, 16KB PRG mirrored into both halves.
pub struct Mapper0 {
    data: CartridgeData,
}

impl Mapper0 {
    pub fn new(data: CartridgeData) -> Self {
        Self { data }
    }
}

impl Mapper for Mapper0 {
    fn prg_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => self.data.read_prg_ram(addr),
            // PRG ROM: $8000-$FFFF, mirror if 16KB
            _ => {
                let window = self.data.prg_rom.len().max(1);
                self.data.read_prg(0, addr & 0x7FFF, window)
            }
        }
    }

    fn prg_write(&mut self, addr: u16, value: u8) {
        if let 0x6000..=0x7FFF = addr {
            self.data.write_prg_ram(addr, value);
        }
    }

    fn chr_read(&mut self, addr: u16) -> u8 {
        self.data.read_chr(0, addr, 0x2000)
    }

    fn chr_write(&mut self, addr: u16, value: u8) {
        self.data.write_chr(0, addr, 0x2000, value);
    }

    fn mirroring(&self) -> Mirroring {
        self.data.mirroring
    }
}
