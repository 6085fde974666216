//! Mapper trait: PRG/CHR memory access and mirroring.

use crate::cartridge::mapper::Mirroring;

/// Capabilities every cartridge board provides. The CPU bus reaches PRG space
/// ($4020–$FFFF) through `prg_*`; the PPU reaches pattern tables ($0000–$1FFF) through `chr_*`.
pub trait Mapper {
    /// Read PRG ROM/RAM.
    fn prg_read(&mut self, addr: u16) -> u8;
    /// Write PRG RAM or mapper registers (PRG ROM is read-only).
    fn prg_write(&mut self, addr: u16, value: u8);
    /// Read a pattern table byte. Takes `&mut self` because some boards watch the PPU address lines.
    fn chr_read(&mut self, addr: u16) -> u8;
    /// Write CHR RAM (ignored on CHR ROM boards).
    fn chr_write(&mut self, addr: u16, value: u8);
    /// Current nametable mirroring for the PPU.
    fn mirroring(&self) -> Mirroring;
    /// Called once per PPU cycle for boards that count PPU time.
    fn on_ppu_cycle(&mut self, _cycle: u16, _scanline: u16, _rendering_enabled: bool) {}
    /// Level of the board's IRQ output.
    fn irq_pending(&self) -> bool {
        false
    }
}
