//! NES mappers for PRG/CHR memory mapping.
//!
//! Every supported board is one case of [`MapperKind`], chosen once from the iNES mapper
//! number when the cartridge is loaded. All of them reduce a register write to a table of
//! byte offsets into the cartridge's linear ROM/RAM arrays; [`bank_offset`] is the shared
//! arithmetic and [`CartridgeData`] the shared storage.

use log::warn;

use crate::cartridge::mapper::mapper::Mapper;
use crate::cartridge::mapper::mapper0::Mapper0;
use crate::cartridge::mapper::mapper1::Mapper1;
use crate::cartridge::mapper::mapper2::Mapper2;
use crate::cartridge::mapper::mapper4::Mapper4;
use crate::cartridge::mapper::mapper7::Mapper7;
use crate::cartridge::mapper::mapper31::Mapper31;
use crate::error::{EmuError, Result};

pub mod mapper;

pub mod mapper0;
pub mod mapper1;
pub mod mapper2;
pub mod mapper4;
pub mod mapper7;
pub mod mapper31;

/// Nametable mirroring mode for PPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mirroring {
    Horizontal,
    Vertical,
    OneScreenLower,
    OneScreenUpper,
}

pub const PRG_BANK_32K: usize = 0x8000;
pub const PRG_BANK_16K: usize = 0x4000;
pub const PRG_BANK_8K: usize = 0x2000;
pub const PRG_BANK_4K: usize = 0x1000;
pub const CHR_BANK_4K: usize = 0x1000;
pub const CHR_BANK_1K: usize = 0x0400;

/// Byte offset of bank `index` in a region holding `total_banks` banks of `bank_size` bytes.
///
/// Negative indices count from the end (`-1` is the last bank) and any index wraps modulo
/// the bank count, so a garbage bank register can never address outside the region.
pub fn bank_offset(index: i32, total_banks: usize, bank_size: usize) -> usize {
    let total = total_banks.max(1) as i64;
    let mut index = index as i64;
    if index < 0 {
        index += total;
    }
    index.rem_euclid(total) as usize * bank_size
}

/// Raw cartridge storage handed to a mapper at load time.
pub struct CartridgeData {
    pub prg_rom: Vec<u8>,
    /// CHR ROM, or 8 KiB of CHR RAM when the header declares no CHR ROM.
    pub chr: Vec<u8>,
    pub chr_is_ram: bool,
    pub prg_ram: Vec<u8>,
    /// Mirroring soldered on the board (iNES flags 6, bit 0).
    pub mirroring: Mirroring,
}

impl CartridgeData {
    pub fn prg_banks(&self, bank_size: usize) -> usize {
        (self.prg_rom.len() / bank_size).max(1)
    }

    pub fn chr_banks(&self, bank_size: usize) -> usize {
        (self.chr.len() / bank_size).max(1)
    }

    pub fn prg_offset(&self, index: i32, bank_size: usize) -> usize {
        bank_offset(index, self.prg_banks(bank_size), bank_size)
    }

    pub fn chr_offset(&self, index: i32, bank_size: usize) -> usize {
        bank_offset(index, self.chr_banks(bank_size), bank_size)
    }

    /// Read PRG ROM through a window of `window` bytes mapped at `offset`.
    pub fn read_prg(&self, offset: usize, addr: u16, window: usize) -> u8 {
        self.prg_rom
            .get(offset + addr as usize % window)
            .copied()
            .unwrap_or(0)
    }

    pub fn read_chr(&self, offset: usize, addr: u16, window: usize) -> u8 {
        self.chr
            .get(offset + addr as usize % window)
            .copied()
            .unwrap_or(0)
    }

    /// Write CHR RAM. Boards with CHR ROM ignore the write.
    pub fn write_chr(&mut self, offset: usize, addr: u16, window: usize, value: u8) {
        if !self.chr_is_ram {
            warn!("ignored write ${:02X} to CHR ROM at ${:04X}", value, addr);
            return;
        }
        if let Some(byte) = self.chr.get_mut(offset + addr as usize % window) {
            *byte = value;
        }
    }

    /// PRG RAM at $6000–$7FFF, wrapping modulo its size.
    pub fn read_prg_ram(&self, addr: u16) -> u8 {
        if self.prg_ram.is_empty() {
            return 0;
        }
        self.prg_ram[(addr as usize - 0x6000) % self.prg_ram.len()]
    }

    pub fn write_prg_ram(&mut self, addr: u16, value: u8) {
        if self.prg_ram.is_empty() {
            return;
        }
        let len = self.prg_ram.len();
        self.prg_ram[(addr as usize - 0x6000) % len] = value;
    }
}

/// The board on a cartridge, resolved once from the header's mapper number.
pub enum MapperKind {
    Nrom(Mapper0),
    Mmc1(Mapper1),
    Uxrom(Mapper2),
    Mmc3(Mapper4),
    Axrom(Mapper7),
    Nsf(Mapper31),
}

macro_rules! dispatch {
    ($kind:expr, $m:ident => $body:expr) => {
        match $kind {
            MapperKind::Nrom($m) => $body,
            MapperKind::Mmc1($m) => $body,
            MapperKind::Uxrom($m) => $body,
            MapperKind::Mmc3($m) => $body,
            MapperKind::Axrom($m) => $body,
            MapperKind::Nsf($m) => $body,
        }
    };
}

impl MapperKind {
    pub fn new(mapper_id: u8, data: CartridgeData) -> Result<Self> {
        let kind = match mapper_id {
            0 => MapperKind::Nrom(Mapper0::new(data)),
            1 => MapperKind::Mmc1(Mapper1::new(data)),
            2 => MapperKind::Uxrom(Mapper2::new(data)),
            4 => MapperKind::Mmc3(Mapper4::new(data)),
            7 => MapperKind::Axrom(Mapper7::new(data)),
            31 => MapperKind::Nsf(Mapper31::new(data)),
            _ => return Err(EmuError::UnsupportedMapper(mapper_id)),
        };
        Ok(kind)
    }

    pub fn id(&self) -> u8 {
        match self {
            MapperKind::Nrom(_) => 0,
            MapperKind::Mmc1(_) => 1,
            MapperKind::Uxrom(_) => 2,
            MapperKind::Mmc3(_) => 4,
            MapperKind::Axrom(_) => 7,
            MapperKind::Nsf(_) => 31,
        }
    }
}

impl Mapper for MapperKind {
    fn prg_read(&mut self, addr: u16) -> u8 {
        // $4020–$5FFF: expansion area, never driven for reads by any supported board.
        if addr < 0x6000 {
            warn!("read from unmapped expansion address ${:04X}", addr);
            return 0;
        }
        dispatch!(self, m => m.prg_read(addr))
    }

    fn prg_write(&mut self, addr: u16, value: u8) {
        // Mapper 31 keeps its bank registers at $5000–$5FFF.
        if addr < 0x6000 && !matches!(self, MapperKind::Nsf(_)) {
            warn!("write ${:02X} to unmapped expansion address ${:04X}", value, addr);
            return;
        }
        dispatch!(self, m => m.prg_write(addr, value))
    }

    fn chr_read(&mut self, addr: u16) -> u8 {
        dispatch!(self, m => m.chr_read(addr & 0x1FFF))
    }

    fn chr_write(&mut self, addr: u16, value: u8) {
        dispatch!(self, m => m.chr_write(addr & 0x1FFF, value))
    }

    fn mirroring(&self) -> Mirroring {
        dispatch!(self, m => m.mirroring())
    }

    fn on_ppu_cycle(&mut self, cycle: u16, scanline: u16, rendering_enabled: bool) {
        dispatch!(self, m => m.on_ppu_cycle(cycle, scanline, rendering_enabled))
    }

    fn irq_pending(&self) -> bool {
        dispatch!(self, m => m.irq_pending())
    }
}
