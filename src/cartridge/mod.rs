//! NES cartridge loading and mapper support.
//!
//! - **cartridge**: Loads iNES (.nes) images, holds the header and the mapper.
//! - **mapper**: NROM (0), MMC1 (1), UxROM (2), MMC3 (4), AxROM (7), NSF-style (31); PRG/CHR bank switching and nametable mirroring.

pub mod cartridge;
pub mod mapper;
