//! Mapper 1 (MMC1): bank switching via 5-bit shift register.
//!
//! [MMC1](https://www.nesdev.org/wiki/MMC1): writes to $8000–$9FFF (control), $A000–$BFFF (CHR0),
//! $C000–$DFFF (CHR1), $E000–$FFFF (PRG bank). Any write with bit 7 set resets the shift register.
//! Otherwise, bit 0 is shifted in (LSB first); the register is seeded with `0b10000` and when the
//! seed bit reaches bit 0 the fifth write latches the value into the register selected by address.
//! Control (bits 0–1) = mirroring; bits 2–3 = PRG mode; bit 4 = CHR mode.

use log::debug;

use crate::cartridge::mapper::{
    CHR_BANK_4K, CartridgeData, Mirroring, PRG_BANK_16K, mapper::Mapper,
};

const SHIFT_SEED: u8 = 0b1_0000;

/// MMC1 state: shift register, the four internal registers, and the derived bank offsets.
pub struct Mapper1 {
    data: CartridgeData,
    shift_reg: u8,
    control: u8,
    chr_bank_0: u8,
    chr_bank_1: u8,
    prg_bank: u8,
    mirroring: Mirroring,
    /// Offsets of the 16 KiB windows at $8000 and $C000.
    prg_offsets: [usize; 2],
    /// Offsets of the 4 KiB windows at PPU $0000 and $1000.
    chr_offsets: [usize; 2],
}

impl Mapper1 {
    /// Power-on control is $0C (PRG mode 3: $8000 switchable, $C000 fixed to the last bank).
    /// Mirroring follows the header until the game writes the control register.
    pub fn new(data: CartridgeData) -> Self {
        let mirroring = data.mirroring;
        let mut mapper = Self {
            data,
            shift_reg: SHIFT_SEED,
            control: 0x0C,
            chr_bank_0: 0,
            chr_bank_1: 0,
            prg_bank: 0,
            mirroring,
            prg_offsets: [0; 2],
            chr_offsets: [0; 2],
        };
        mapper.update_offsets();
        mapper
    }

    /// PRG bank mode from control bits 2–3: 0/1 = 32 KiB mode; 2 = $8000 fixed first, $C000 switchable; 3 = $8000 switchable, $C000 fixed last.
    fn prg_bank_mode(&self) -> u8 {
        (self.control >> 2) & 0b11
    }

    fn load_register(&mut self, addr: u16, value: u8) {
        match addr {
            0x8000..=0x9FFF => {
                self.control = value;
                self.mirroring = match value & 0b11 {
                    0 => Mirroring::OneScreenLower,
                    1 => Mirroring::OneScreenUpper,
                    2 => Mirroring::Vertical,
                    _ => Mirroring::Horizontal,
                };
                debug!(
                    "MMC1 control ${:02X}: PRG mode {}, CHR mode {}, {:?}",
                    value,
                    self.prg_bank_mode(),
                    (value >> 4) & 1,
                    self.mirroring
                );
            }
            0xA000..=0xBFFF => self.chr_bank_0 = value,
            0xC000..=0xDFFF => self.chr_bank_1 = value,
            _ => self.prg_bank = value & 0x0F,
        }
        self.update_offsets();
    }

    fn update_offsets(&mut self) {
        let prg = |bank: u8| self.data.prg_offset(bank as i32, PRG_BANK_16K);
        self.prg_offsets = match self.prg_bank_mode() {
            0 | 1 => [prg(self.prg_bank & 0b1110), prg(self.prg_bank | 1)],
            2 => [prg(0), prg(self.prg_bank)],
            _ => [
                prg(self.prg_bank),
                self.data.prg_offset(-1, PRG_BANK_16K),
            ],
        };

        let chr = |bank: u8| self.data.chr_offset(bank as i32, CHR_BANK_4K);
        self.chr_offsets = if self.control & 0x10 == 0 {
            // 8 KiB mode: CHR0 selects an even/odd pair, CHR1 is ignored.
            [chr(self.chr_bank_0 & 0b1_1110), chr(self.chr_bank_0 | 1)]
        } else {
            [chr(self.chr_bank_0), chr(self.chr_bank_1)]
        };
    }
}

impl Mapper for Mapper1 {
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

        // Bit 7 resets the shift register and forces PRG mode 3.
        if value & 0x80 != 0 {
            self.shift_reg = SHIFT_SEED;
            self.control |= 0x0C;
            self.update_offsets();
            return;
        }

        let done = self.shift_reg & 1 == 1;
        self.shift_reg = (self.shift_reg >> 1) | ((value & 1) << 4);

        if done {
            let latched = self.shift_reg;
            self.shift_reg = SHIFT_SEED;
            self.load_register(addr, latched);
        }
    }

    fn chr_read(&mut self, addr: u16) -> u8 {
        let window = (addr as usize / CHR_BANK_4K) & 1;
        self.data.read_chr(self.chr_offsets[window], addr, CHR_BANK_4K)
    }

    fn chr_write(&mut self, addr: u16, value: u8) {
        let window = (addr as usize / CHR_BANK_4K) & 1;
        self.data
            .write_chr(self.chr_offsets[window], addr, CHR_BANK_4K, value);
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }
}
