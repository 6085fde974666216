//! Mapper 2 (UxROM): any write to $8000–$FFFF picks the 16 KiB bank at $8000; $C000 is fixed to the last bank.

use log::debug;

use crate::cartridge::mapper::{CartridgeData, Mirroring, PRG_BANK_16K, mapper::Mapper};

pub struct Mapper2 {
    data: CartridgeData,
    prg_offsets: [usize; 2],
}

impl Mapper2 {
    pub fn new(data: CartridgeData) -> Self {
        let prg_offsets = [
            data.prg_offset(0, PRG_BANK_16K),
            data.prg_offset(-1, PRG_BANK_16K),
        ];
        Self { data, prg_offsets }
    }
}

impl Mapper for Mapper2 {
    fn prg_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF => self.data.read_prg_ram(addr),
            0x8000..=0xBFFF => self.data.read_prg(self.prg_offsets[0], addr, PRG_BANK_16K),
            _ => self.data.read_prg(self.prg_offsets[1], addr, PRG_BANK_16K),
        }
    }

    fn prg_write(&mut self, addr: u16, value: u8) {
        if addr < 0x8000 {
            self.data.write_prg_ram(addr, value);
            return;
        }
        self.prg_offsets[0] = self.data.prg_offset(value as i32, PRG_BANK_16K);
        debug!("UxROM bank {} at $8000", value);
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
