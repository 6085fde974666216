//! Mapper 31 ([NSF-style](https://www.nesdev.org/wiki/INES_Mapper_031) board): eight 4 KiB PRG
//! windows at $8000–$FFFF. A write to $5000–$5FFF banks window `addr & 7`; $F000 powers up on the
//! last bank. CHR is one unbanked 8 KiB.

use log::{debug, warn};

use crate::cartridge::mapper::{CartridgeData, Mirroring, PRG_BANK_4K, mapper::Mapper};

pub struct Mapper31 {
    data: CartridgeData,
    prg_offsets: [usize; 8],
}

impl Mapper31 {
    pub fn new(data: CartridgeData) -> Self {
        let mut prg_offsets = [0; 8];
        prg_offsets[7] = data.prg_offset(-1, PRG_BANK_4K);
        Self { data, prg_offsets }
    }
}

impl Mapper for Mapper31 {
    fn prg_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => self.data.read_prg_ram(addr),
            0x8000..=0xFFFF => {
                let window = (addr as usize >> 12) & 7;
                self.data.read_prg(self.prg_offsets[window], addr, PRG_BANK_4K)
            }
            _ => 0,
        }
    }

    fn prg_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x5000..=0x5FFF => {
                let window = addr as usize & 7;
                self.prg_offsets[window] = self.data.prg_offset(value as i32, PRG_BANK_4K);
                debug!("mapper 31 bank {} at ${:04X}", value, 0x8000 + window * PRG_BANK_4K);
            }
            0x6000..=0x7FFF => self.data.write_prg_ram(addr, value),
            0x8000..=0xFFFF => debug!("ignored write ${:02X} to PRG ROM at ${:04X}", value, addr),
            _ => warn!("write ${:02X} to unmapped expansion address ${:04X}", value, addr),
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
