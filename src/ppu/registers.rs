//! [PPU registers](https://www.nesdev.org/wiki/PPU_registers) bit layouts and the
//! [scrolling](https://www.nesdev.org/wiki/PPU_scrolling) VRAM address (`v`/`t`).

use bitflags::bitflags;

bitflags! {
    /// PPUCTRL ($2000).
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Ctrl: u8 {
        const NAMETABLE_X = 1 << 0;
        const NAMETABLE_Y = 1 << 1;
        /// VRAM increment per $2007 access: 0 = +1 (across), 1 = +32 (down).
        const INCREMENT_32 = 1 << 2;
        /// Sprite pattern table for 8×8 sprites: 0 = $0000, 1 = $1000.
        const SPRITE_TABLE = 1 << 3;
        const BACKGROUND_TABLE = 1 << 4;
        const SPRITE_SIZE_16 = 1 << 5;
        const MASTER_SLAVE = 1 << 6;
        const NMI_ENABLE = 1 << 7;
    }
}

bitflags! {
    /// PPUMASK ($2001).
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Mask: u8 {
        const GRAYSCALE = 1 << 0;
        const SHOW_BACKGROUND_LEFT = 1 << 1;
        const SHOW_SPRITES_LEFT = 1 << 2;
        const SHOW_BACKGROUND = 1 << 3;
        const SHOW_SPRITES = 1 << 4;
        const EMPHASIZE_RED = 1 << 5;
        const EMPHASIZE_GREEN = 1 << 6;
        const EMPHASIZE_BLUE = 1 << 7;
    }
}

bitflags! {
    /// PPUSTATUS ($2002). The low five bits hold stale bus contents.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct PpuStatus: u8 {
        const SPRITE_OVERFLOW = 1 << 5;
        const SPRITE_ZERO_HIT = 1 << 6;
        const VBLANK = 1 << 7;
    }
}

impl PpuStatus {
    pub const OPEN_BUS_BITS: u8 = 0x1F;
}

/// 15-bit VRAM address in scroll layout: `yyy NN YYYYY XXXXX`
/// (fine Y, nametable select, coarse Y, coarse X).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VramAddr(pub u16);

impl VramAddr {
    const COARSE_X: u16 = 0x001F;
    const COARSE_Y: u16 = 0x03E0;
    const NAMETABLE_X: u16 = 0x0400;
    const NAMETABLE_Y: u16 = 0x0800;
    const FINE_Y: u16 = 0x7000;

    pub fn coarse_x(self) -> u16 {
        self.0 & Self::COARSE_X
    }

    pub fn coarse_y(self) -> u16 {
        (self.0 & Self::COARSE_Y) >> 5
    }

    pub fn fine_y(self) -> u16 {
        (self.0 & Self::FINE_Y) >> 12
    }

    /// Name-table byte address for the tile under `v`.
    pub fn tile_addr(self) -> u16 {
        0x2000 | (self.0 & 0x0FFF)
    }

    /// Attribute byte covering the 4×4-tile block under `v`.
    pub fn attribute_addr(self) -> u16 {
        0x23C0 | (self.0 & 0x0C00) | ((self.0 >> 4) & 0x38) | ((self.0 >> 2) & 0x07)
    }

    /// Shift selecting the 2-bit quadrant of the attribute byte.
    pub fn attribute_shift(self) -> u8 {
        (((self.0 >> 4) & 4) | (self.0 & 2)) as u8
    }

    /// Coarse X + 1, toggling the horizontal nametable past column 31.
    pub fn increment_x(&mut self) {
        if self.coarse_x() == 31 {
            self.0 &= !Self::COARSE_X;
            self.0 ^= Self::NAMETABLE_X;
        } else {
            self.0 += 1;
        }
    }

    /// Fine Y + 1, carrying into coarse Y. Row 29 wraps and toggles the vertical nametable;
    /// row 31 (attribute memory) wraps without toggling.
    pub fn increment_y(&mut self) {
        if self.fine_y() < 7 {
            self.0 += 0x1000;
            return;
        }
        self.0 &= !Self::FINE_Y;
        let coarse_y = match self.coarse_y() {
            29 => {
                self.0 ^= Self::NAMETABLE_Y;
                0
            }
            31 => 0,
            y => y + 1,
        };
        self.0 = (self.0 & !Self::COARSE_Y) | (coarse_y << 5);
    }

    /// Horizontal bits (coarse X, nametable X) from `t`.
    pub fn copy_x(&mut self, t: VramAddr) {
        let mask = Self::COARSE_X | Self::NAMETABLE_X;
        self.0 = (self.0 & !mask) | (t.0 & mask);
    }

    /// Vertical bits (fine Y, coarse Y, nametable Y) from `t`.
    pub fn copy_y(&mut self, t: VramAddr) {
        let mask = Self::FINE_Y | Self::COARSE_Y | Self::NAMETABLE_Y;
        self.0 = (self.0 & !mask) | (t.0 & mask);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_x_toggles_nametable_at_column_31() {
        let mut v = VramAddr(31);
        v.increment_x();
        assert_eq!(v.0, 0x0400);
        v.increment_x();
        assert_eq!(v.0, 0x0401);
    }

    #[test]
    fn increment_y_carries_into_coarse_y() {
        let mut v = VramAddr(0x7000 | (4 << 5));
        v.increment_y();
        assert_eq!(v.fine_y(), 0);
        assert_eq!(v.coarse_y(), 5);
    }

    #[test]
    fn increment_y_row_29_toggles_vertical_nametable() {
        let mut v = VramAddr(0x7000 | (29 << 5));
        v.increment_y();
        assert_eq!(v.coarse_y(), 0);
        assert_eq!(v.0 & 0x0800, 0x0800);
    }

    #[test]
    fn increment_y_row_31_wraps_without_toggle() {
        let mut v = VramAddr(0x7000 | (31 << 5));
        v.increment_y();
        assert_eq!(v.0, 0);
    }

    #[test]
    fn attribute_address_and_shift() {
        // Coarse X 5, coarse Y 9, nametable 1.
        let v = VramAddr(0x0400 | (9 << 5) | 5);
        assert_eq!(v.attribute_addr(), 0x27C0 + 2 * 8 + 1);
        assert_eq!(v.attribute_shift(), 0);
        let v = VramAddr((1 << 5) | 2);
        assert_eq!(v.attribute_shift(), 2);
        let v = VramAddr((3 << 5) | 3);
        assert_eq!(v.attribute_shift(), 6);
    }
}
