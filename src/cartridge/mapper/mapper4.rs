//! Mapper 4 (MMC3): bank switching, switchable mirroring, optional PRG RAM, scanline IRQ.
//!
//! [MMC3](https://www.nesdev.org/wiki/MMC3): Bank select at $8000–$9FFE (even), bank data at
//! $8001–$9FFF (odd). R0/R1 = 2 KiB CHR, R2–R5 = 1 KiB CHR, R6/R7 = 8 KiB PRG. Mirroring at
//! $A000–$BFFE (even), PRG RAM protect at $A001–$BFFF (odd). IRQ latch $C000, reload $C001,
//! disable $E000, enable $E001. The IRQ counter clocks on a rising edge of PPU A12 seen through
//! CHR accesses, once A12 has stayed low long enough to pass the board's M2 filter.

use log::debug;

use crate::cartridge::mapper::{CHR_BANK_1K, CartridgeData, Mirroring, PRG_BANK_8K, mapper::Mapper};

/// PPU cycles A12 must stay low before a rise clocks the counter.
const A12_LOW_FILTER: u16 = 10;

/// MMC3 state: bank registers, mirroring, PRG RAM protection, IRQ counter/latch/enable.
pub struct Mapper4 {
    data: CartridgeData,
    /// Bank select ($8000): bits 0–2 = register index, bit 6 = PRG mode, bit 7 = CHR A12 invert.
    bank_select: u8,
    /// R0–R5 CHR, R6–R7 PRG.
    regs: [u8; 8],
    mirroring: Mirroring,
    prg_ram_enabled: bool,
    prg_ram_write_protect: bool,
    irq_latch: u8,
    irq_counter: u8,
    irq_reload_pending: bool,
    irq_enabled: bool,
    irq_line: bool,
    /// Previous PPU A12 (from CHR address) to detect rising edge.
    last_chr_a12: bool,
    a12_low_cycles: u16,
    /// Offsets of the four 8 KiB PRG windows at $8000, $A000, $C000, $E000.
    prg_offsets: [usize; 4],
    /// Offsets of the eight 1 KiB CHR windows.
    chr_offsets: [usize; 8],
}

impl Mapper4 {
    pub fn new(data: CartridgeData) -> Self {
        let mirroring = data.mirroring;
        let mut mapper = Self {
            data,
            bank_select: 0,
            regs: [0, 2, 4, 5, 6, 7, 0, 1],
            mirroring,
            prg_ram_enabled: true,
            prg_ram_write_protect: false,
            irq_latch: 0,
            irq_counter: 0,
            irq_reload_pending: false,
            irq_enabled: false,
            irq_line: false,
            last_chr_a12: false,
            a12_low_cycles: A12_LOW_FILTER,
            prg_offsets: [0; 4],
            chr_offsets: [0; 8],
        };
        mapper.update_offsets();
        mapper
    }

    fn update_offsets(&mut self) {
        let prg = |bank: i32| self.data.prg_offset(bank, PRG_BANK_8K);
        let r6 = (self.regs[6] & 0x3F) as i32;
        let r7 = (self.regs[7] & 0x3F) as i32;
        self.prg_offsets = if self.bank_select & 0x40 == 0 {
            [prg(r6), prg(r7), prg(-2), prg(-1)]
        } else {
            [prg(-2), prg(r7), prg(r6), prg(-1)]
        };

        let chr = |bank: u8| self.data.chr_offset(bank as i32, CHR_BANK_1K);
        let two_k = [
            chr(self.regs[0] & 0xFE),
            chr(self.regs[0] | 1),
            chr(self.regs[1] & 0xFE),
            chr(self.regs[1] | 1),
        ];
        let one_k = [
            chr(self.regs[2]),
            chr(self.regs[3]),
            chr(self.regs[4]),
            chr(self.regs[5]),
        ];
        let (low, high) = if self.bank_select & 0x80 == 0 {
            (two_k, one_k)
        } else {
            (one_k, two_k)
        };
        self.chr_offsets[..4].copy_from_slice(&low);
        self.chr_offsets[4..].copy_from_slice(&high);
    }

    fn clock_irq(&mut self) {
        if self.irq_counter == 0 || self.irq_reload_pending {
            self.irq_counter = self.irq_latch;
            self.irq_reload_pending = false;
        } else {
            self.irq_counter -= 1;
        }
        if self.irq_counter == 0 && self.irq_enabled {
            self.irq_line = true;
        }
    }

    fn observe_a12(&mut self, addr: u16) {
        let a12 = addr & 0x1000 != 0;
        if a12 && !self.last_chr_a12 && self.a12_low_cycles >= A12_LOW_FILTER {
            self.clock_irq();
        }
        if a12 {
            self.a12_low_cycles = 0;
        }
        self.last_chr_a12 = a12;
    }
}

impl Mapper for Mapper4 {
    fn prg_read(&mut self, addr: u16) -> u8 {
        match addr {
            0x6000..=0x7FFF if self.prg_ram_enabled => self.data.read_prg_ram(addr),
            0x6000..=0x7FFF => 0,
            _ => {
                let window = (addr as usize - 0x8000) / PRG_BANK_8K;
                self.data.read_prg(self.prg_offsets[window], addr, PRG_BANK_8K)
            }
        }
    }

    fn prg_write(&mut self, addr: u16, value: u8) {
        let even = addr & 1 == 0;
        match addr {
            0x6000..=0x7FFF => {
                if self.prg_ram_enabled && !self.prg_ram_write_protect {
                    self.data.write_prg_ram(addr, value);
                }
            }
            0x8000..=0x9FFF if even => {
                self.bank_select = value;
                self.update_offsets();
            }
            0x8000..=0x9FFF => {
                self.regs[(self.bank_select & 7) as usize] = value;
                debug!("MMC3 R{} = ${:02X}", self.bank_select & 7, value);
                self.update_offsets();
            }
            0xA000..=0xBFFF if even => {
                self.mirroring = if value & 1 == 0 {
                    Mirroring::Vertical
                } else {
                    Mirroring::Horizontal
                };
            }
            0xA000..=0xBFFF => {
                self.prg_ram_enabled = value & 0x80 != 0;
                self.prg_ram_write_protect = value & 0x40 != 0;
            }
            0xC000..=0xDFFF if even => self.irq_latch = value,
            0xC000..=0xDFFF => {
                self.irq_counter = 0;
                self.irq_reload_pending = true;
            }
            0xE000..=0xFFFF if even => {
                self.irq_enabled = false;
                self.irq_line = false;
            }
            _ => self.irq_enabled = true,
        }
    }

    fn chr_read(&mut self, addr: u16) -> u8 {
        self.observe_a12(addr);
        let window = addr as usize / CHR_BANK_1K;
        self.data.read_chr(self.chr_offsets[window], addr, CHR_BANK_1K)
    }

    fn chr_write(&mut self, addr: u16, value: u8) {
        self.observe_a12(addr);
        let window = addr as usize / CHR_BANK_1K;
        self.data
            .write_chr(self.chr_offsets[window], addr, CHR_BANK_1K, value);
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn on_ppu_cycle(&mut self, _cycle: u16, _scanline: u16, _rendering_enabled: bool) {
        if !self.last_chr_a12 {
            self.a12_low_cycles = self.a12_low_cycles.saturating_add(1);
        }
    }

    fn irq_pending(&self) -> bool {
        self.irq_line
    }
}
