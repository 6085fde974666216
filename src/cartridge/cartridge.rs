//! NES cartridge loading from iNES format (.nes files).
//!
//! Implements the [iNES](https://www.nesdev.org/wiki/INES) format: 16-byte header (magic "NES\x1A",
//! PRG size in 16 KiB units, CHR size in 8 KiB units, flags 6–7 for mapper, etc.), an optional
//! 512-byte trainer, then PRG ROM, then CHR ROM. CHR may be ROM or RAM depending on the header.
//! [Mapper](https://www.nesdev.org/wiki/Mapper) implements CPU PRG ($4020–$FFFF) and PPU CHR
//! ($0000–$1FFF) address decoding and bank switching.

use std::fs;
use std::path::Path;

use log::info;

use crate::cartridge::mapper::mapper::Mapper;
use crate::cartridge::mapper::{CartridgeData, MapperKind, Mirroring};
use crate::error::{EmuError, Result};

pub const HEADER_LEN: usize = 16;
pub const TRAINER_LEN: usize = 512;
pub const PRG_ROM_BLOCK: usize = 16 * 1024;
pub const CHR_ROM_BLOCK: usize = 8 * 1024;
pub const PRG_RAM_BLOCK: usize = 8 * 1024;

const MAGIC: [u8; 4] = *b"NES\x1A";

/// Header-derived metadata. Immutable once the cartridge is loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    /// PRG ROM size in 16 KiB units.
    pub prg_rom_blocks: u8,
    /// CHR ROM size in 8 KiB units; 0 means the board carries 8 KiB of CHR RAM.
    pub chr_rom_blocks: u8,
    pub mapper_id: u8,
    pub mirroring: Mirroring,
    pub has_trainer: bool,
    /// PRG RAM size in 8 KiB units (a header value of 0 reads as 1).
    pub prg_ram_blocks: u8,
}

impl Header {
    /// Parse the 16-byte iNES header. Bytes 6–7 carry the mapper number
    /// (high nibble of 6 = low nibble of the id, high nibble of 7 = high nibble).
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(EmuError::Truncated {
                section: "header",
                expected: HEADER_LEN,
                actual: bytes.len(),
            });
        }
        let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
        if magic != MAGIC {
            return Err(EmuError::BadMagic(magic));
        }

        let flags6 = bytes[6];
        let flags7 = bytes[7];
        // Mirroring from iNES byte 6 bit 0: 0 = horizontal, 1 = vertical (board solder pads).
        let mirroring = if flags6 & 1 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };

        Ok(Self {
            prg_rom_blocks: bytes[4],
            chr_rom_blocks: bytes[5],
            mapper_id: (flags6 >> 4) | (flags7 & 0xF0),
            mirroring,
            has_trainer: flags6 & 0b100 != 0,
            prg_ram_blocks: bytes[8].max(1),
        })
    }

    pub fn prg_rom_len(&self) -> usize {
        self.prg_rom_blocks as usize * PRG_ROM_BLOCK
    }

    pub fn chr_rom_len(&self) -> usize {
        self.chr_rom_blocks as usize * CHR_ROM_BLOCK
    }

    pub fn prg_ram_len(&self) -> usize {
        self.prg_ram_blocks as usize * PRG_RAM_BLOCK
    }
}

/// Cartridge: header metadata plus the board that owns PRG/CHR storage and bank state.
pub struct Cartridge {
    pub header: Header,
    pub mapper: MapperKind,
    /// 512-byte trainer, kept for completeness; nothing maps it.
    pub trainer: Option<Vec<u8>>,
}

impl Cartridge {
    /// Load a cartridge from an iNES file on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| EmuError::io(path, e))?;
        Self::from_bytes(&data)
    }

    /// Build a cartridge from an in-memory iNES image.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let header = Header::parse(data)?;

        let mut cursor = HEADER_LEN;
        let mut take = |section: &'static str, len: usize| -> Result<Vec<u8>> {
            let end = cursor + len;
            let bytes = data.get(cursor..end).ok_or(EmuError::Truncated {
                section,
                expected: len,
                actual: data.len().saturating_sub(cursor),
            })?;
            cursor = end;
            Ok(bytes.to_vec())
        };

        let trainer = if header.has_trainer {
            Some(take("trainer", TRAINER_LEN)?)
        } else {
            None
        };
        let prg_rom = take("PRG ROM", header.prg_rom_len())?;
        let chr_is_ram = header.chr_rom_blocks == 0;
        let chr = if chr_is_ram {
            vec![0; CHR_ROM_BLOCK] // No CHR ROM → 8 KiB CHR RAM
        } else {
            take("CHR ROM", header.chr_rom_len())?
        };

        let (prg_kib, chr_kib) = (prg_rom.len() / 1024, chr.len() / 1024);
        let mapper = MapperKind::new(
            header.mapper_id,
            CartridgeData {
                prg_rom,
                chr,
                chr_is_ram,
                prg_ram: vec![0; header.prg_ram_len()],
                mirroring: header.mirroring,
            },
        )?;

        info!(
            "cartridge: mapper {}, PRG ROM {} KiB, CHR {} {} KiB, PRG RAM {} KiB, {:?} mirroring{}",
            mapper.id(),
            prg_kib,
            if chr_is_ram { "RAM" } else { "ROM" },
            chr_kib,
            header.prg_ram_len() / 1024,
            header.mirroring,
            if trainer.is_some() { ", trainer" } else { "" },
        );

        Ok(Self {
            header,
            mapper,
            trainer,
        })
    }

    /// CPU read in cartridge space ($4020–$FFFF).
    pub fn prg_read(&mut self, addr: u16) -> u8 {
        self.mapper.prg_read(addr)
    }

    /// CPU write in cartridge space: PRG RAM or mapper registers.
    pub fn prg_write(&mut self, addr: u16, data: u8) {
        self.mapper.prg_write(addr, data);
    }

    /// PPU pattern table read ($0000–$1FFF).
    pub fn chr_read(&mut self, addr: u16) -> u8 {
        self.mapper.chr_read(addr)
    }

    pub fn chr_write(&mut self, addr: u16, data: u8) {
        self.mapper.chr_write(addr, data);
    }

    pub fn mirroring(&self) -> Mirroring {
        self.mapper.mirroring()
    }

    pub fn on_ppu_cycle(&mut self, cycle: u16, scanline: u16, rendering_enabled: bool) {
        self.mapper.on_ppu_cycle(cycle, scanline, rendering_enabled);
    }

    /// Level of the board's IRQ line (MMC3 scanline counter).
    pub fn irq_pending(&self) -> bool {
        self.mapper.irq_pending()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build an iNES image in memory: `prg_blocks` × 16 KiB of PRG filled with the bank
    /// number, CHR likewise, and the given mapper number.
    pub(crate) fn ines_image(mapper: u8, prg_blocks: u8, chr_blocks: u8, flags6: u8) -> Vec<u8> {
        let mut image = vec![
            b'N',
            b'E',
            b'S',
            0x1A,
            prg_blocks,
            chr_blocks,
            (mapper << 4) | (flags6 & 0x0F),
            mapper & 0xF0,
            0,
            0,
            0,
            0,
            0,
            0,
            0,
            0,
        ];
        if flags6 & 0b100 != 0 {
            image.extend(std::iter::repeat_n(0xEE, TRAINER_LEN));
        }
        for bank in 0..prg_blocks {
            image.extend(std::iter::repeat_n(bank, PRG_ROM_BLOCK));
        }
        for bank in 0..chr_blocks {
            image.extend(std::iter::repeat_n(0x80 | bank, CHR_ROM_BLOCK));
        }
        image
    }

    #[test]
    fn parses_header_fields() {
        let mut image = ines_image(0x42, 2, 1, 0b0001);
        image[8] = 0;
        let header = Header::parse(&image).unwrap();
        assert_eq!(header.prg_rom_blocks, 2);
        assert_eq!(header.chr_rom_blocks, 1);
        assert_eq!(header.mapper_id, 0x42);
        assert_eq!(header.mirroring, Mirroring::Vertical);
        assert!(!header.has_trainer);
        assert_eq!(header.prg_ram_blocks, 1);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut image = ines_image(0, 1, 1, 0);
        image[3] = 0x00;
        match Cartridge::from_bytes(&image) {
            Err(EmuError::BadMagic(magic)) => assert_eq!(magic, [b'N', b'E', b'S', 0]),
            other => panic!("expected BadMagic, got {:?}", other.err()),
        }
    }

    #[test]
    fn rejects_truncated_prg() {
        let mut image = ines_image(0, 2, 0, 0);
        image.truncate(HEADER_LEN + PRG_ROM_BLOCK);
        assert!(matches!(
            Cartridge::from_bytes(&image),
            Err(EmuError::Truncated {
                section: "PRG ROM",
                ..
            })
        ));
    }

    #[test]
    fn rejects_unknown_mapper() {
        let image = ines_image(99, 1, 1, 0);
        assert!(matches!(
            Cartridge::from_bytes(&image),
            Err(EmuError::UnsupportedMapper(99))
        ));
    }

    #[test]
    fn skips_trainer_before_prg() {
        let image = ines_image(0, 1, 1, 0b0100);
        let mut cart = Cartridge::from_bytes(&image).unwrap();
        assert_eq!(cart.trainer.as_ref().map(Vec::len), Some(TRAINER_LEN));
        assert_eq!(cart.prg_read(0x8000), 0);
        assert_eq!(cart.chr_read(0x0000), 0x80);
    }

    #[test]
    fn zero_chr_blocks_gives_writable_chr_ram() {
        let image = ines_image(0, 1, 0, 0);
        let mut cart = Cartridge::from_bytes(&image).unwrap();
        cart.chr_write(0x1234, 0x5A);
        assert_eq!(cart.chr_read(0x1234), 0x5A);
    }

    #[test]
    fn chr_rom_ignores_writes() {
        let image = ines_image(0, 1, 1, 0);
        let mut cart = Cartridge::from_bytes(&image).unwrap();
        cart.chr_write(0x0010, 0x00);
        assert_eq!(cart.chr_read(0x0010), 0x80);
    }
}
