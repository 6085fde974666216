//! NES PPU (Picture Processing Unit) implementation.
//!
//! Dot-stepped: one [`Ppu::tick`] per PPU cycle, 341 cycles × 262 scanlines per frame
//! ([PPU rendering](https://www.nesdev.org/wiki/PPU_rendering)). Scanlines 0–239 are
//! visible, 240 is post-render, 241–260 vertical blank and 261 pre-render. Background tiles
//! are fetched every 8 cycles into 16-bit shift registers; sprites are evaluated once per
//! line at cycle 257 ([Sprite evaluation](https://www.nesdev.org/wiki/PPU_sprite_evaluation)).
//! Registers: $2000–$2007 (mirrored).

use crate::cartridge::{cartridge::Cartridge, mapper::Mirroring};
use crate::ppu::palette::{palette_index, rgb};
use crate::ppu::registers::{Ctrl, Mask, PpuStatus, VramAddr};

pub const SCREEN_WIDTH: usize = 256;
pub const SCREEN_HEIGHT: usize = 240;
pub const CYCLES_PER_SCANLINE: u16 = 341;
pub const SCANLINES_PER_FRAME: u16 = 262;

const VBLANK_SCANLINE: u16 = 241;
const PRE_RENDER_SCANLINE: u16 = 261;

/// OAM (Object Attribute Memory): 64 sprites × 4 bytes. Each entry: Y, tile, attr, X.
pub const OAM_LEN: usize = 256;
const MAX_SPRITES_PER_LINE: usize = 8;

/// Sprite attribute bits (OAM byte 2).
const ATTR_PALETTE: u8 = 0x03;
const ATTR_BEHIND_BACKGROUND: u8 = 0x20;
const ATTR_FLIP_H: u8 = 0x40;
const ATTR_FLIP_V: u8 = 0x80;

/// Tile fetched for unused shortlist slots.
const PLACEHOLDER_TILE: u8 = 0xFF;

/// One entry of the per-line sprite shortlist, pattern already flipped.
#[derive(Clone, Copy, Debug, Default)]
struct SpriteSlot {
    x: u8,
    pattern_lo: u8,
    pattern_hi: u8,
    attributes: u8,
    oam_index: u8,
}

/// PPU state: timing, VRAM, palettes, OAM, scroll registers, and framebuffer.
pub struct Ppu {
    pub cycle: u16,
    pub scanline: u16,
    pub frame: u64,

    pub ctrl: Ctrl,
    pub mask: Mask,
    pub status: PpuStatus,
    /// OAM address for $2003/$2004 (byte index 0..255).
    pub oam_addr: u8,
    /// OAM: 64 sprites × 4 bytes (Y, tile, attr, X). Written via $2003/$2004 or $4014 DMA.
    pub oam: [u8; OAM_LEN],

    /// Current VRAM address.
    v: VramAddr,
    /// Temporary VRAM address (top-left of the screen).
    t: VramAddr,
    fine_x: u8,
    /// Write toggle shared by $2005 and $2006.
    w: bool,
    /// $2007 read buffer.
    read_buffer: u8,
    /// Last byte written to any register.
    open_bus: u8,

    /// 2 KiB internal VRAM holding two physical nametables.
    nametables: [u8; 0x800],
    /// Palette RAM $3F00-$3F1F (32 bytes, with NES mirroring).
    palette: [u8; 32],

    // Background fetch latches and shifters.
    nametable_byte: u8,
    attribute_bits: u8,
    pattern_lo: u8,
    pattern_hi: u8,
    bg_pattern_lo: u16,
    bg_pattern_hi: u16,
    bg_attr_lo: u16,
    bg_attr_hi: u16,

    sprites: [SpriteSlot; MAX_SPRITES_PER_LINE],
    sprite_count: usize,

    nmi_pending: bool,
    /// Set when entering vblank; cleared by whoever presents the framebuffer.
    frame_ready: bool,
    /// 256×240 framebuffer (0xRRGGBB per pixel). Row-major, left-to-right, top-to-bottom.
    pub framebuffer: Vec<u32>,
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

impl Ppu {
    /// Power-on state: scanline 0, cycle 0, rendering off.
    pub fn new() -> Self {
        Self {
            cycle: 0,
            scanline: 0,
            frame: 0,
            ctrl: Ctrl::empty(),
            mask: Mask::empty(),
            status: PpuStatus::empty(),
            oam_addr: 0,
            oam: [0; OAM_LEN],
            v: VramAddr::default(),
            t: VramAddr::default(),
            fine_x: 0,
            w: false,
            read_buffer: 0,
            open_bus: 0,
            nametables: [0; 0x800],
            palette: [0; 32],
            nametable_byte: 0,
            attribute_bits: 0,
            pattern_lo: 0,
            pattern_hi: 0,
            bg_pattern_lo: 0,
            bg_pattern_hi: 0,
            bg_attr_lo: 0,
            bg_attr_hi: 0,
            sprites: [SpriteSlot::default(); MAX_SPRITES_PER_LINE],
            sprite_count: 0,
            nmi_pending: false,
            frame_ready: false,
            framebuffer: vec![0; SCREEN_WIDTH * SCREEN_HEIGHT],
        }
    }

    /// Clear registers and timing; VRAM, palette and OAM contents survive like on a console reset.
    pub fn reset(&mut self) {
        self.cycle = 0;
        self.scanline = 0;
        self.ctrl = Ctrl::empty();
        self.mask = Mask::empty();
        self.status = PpuStatus::empty();
        self.v = VramAddr::default();
        self.t = VramAddr::default();
        self.fine_x = 0;
        self.w = false;
        self.read_buffer = 0;
        self.sprite_count = 0;
        self.nmi_pending = false;
        self.frame_ready = false;
    }

    pub fn rendering_enabled(&self) -> bool {
        self.mask
            .intersects(Mask::SHOW_BACKGROUND | Mask::SHOW_SPRITES)
    }

    /// Consume the NMI request raised at the start of vblank.
    pub fn take_nmi(&mut self) -> bool {
        std::mem::take(&mut self.nmi_pending)
    }

    /// Consume the frame-complete latch.
    pub fn take_frame_ready(&mut self) -> bool {
        std::mem::take(&mut self.frame_ready)
    }

    /// Sprites on the shortlist for the line being drawn.
    pub fn sprite_count(&self) -> usize {
        self.sprite_count
    }

    /// Advance PPU by one cycle: do the work of the current dot, then move to the next one.
    pub fn tick(&mut self, cart: &mut Cartridge) {
        let rendering = self.rendering_enabled();
        let visible_line = self.scanline < SCREEN_HEIGHT as u16;
        let pre_render_line = self.scanline == PRE_RENDER_SCANLINE;
        let render_line = visible_line || pre_render_line;
        let visible_cycle = (1..=256).contains(&self.cycle);
        let prefetch_cycle = (321..=336).contains(&self.cycle);

        if visible_line && visible_cycle {
            if rendering {
                self.render_pixel();
            } else {
                self.render_backdrop();
            }
        }

        if rendering && render_line {
            if visible_cycle || prefetch_cycle {
                self.shift_background();
                match self.cycle % 8 {
                    1 => self.fetch_nametable_byte(cart),
                    3 => self.fetch_attribute_bits(cart),
                    5 => self.fetch_pattern_lo(cart),
                    7 => self.fetch_pattern_hi(cart),
                    0 => {
                        self.load_background_shifters();
                        self.v.increment_x();
                    }
                    _ => {}
                }
            }
            match self.cycle {
                256 => self.v.increment_y(),
                257 => {
                    self.v.copy_x(self.t);
                    if visible_line {
                        self.evaluate_sprites(cart);
                    } else {
                        // Nothing is drawn on line 0 from the pre-render line, but the fetches still happen.
                        self.sprite_count = 0;
                        self.fetch_placeholder_sprites(cart, 0);
                    }
                }
                280..=304 if pre_render_line => self.v.copy_y(self.t),
                _ => {}
            }
        }

        if self.scanline == VBLANK_SCANLINE && self.cycle == 1 {
            self.status.insert(PpuStatus::VBLANK);
            self.frame_ready = true;
            if self.ctrl.contains(Ctrl::NMI_ENABLE) {
                self.nmi_pending = true;
            }
        }
        if pre_render_line && self.cycle == 1 {
            self.status.remove(
                PpuStatus::VBLANK | PpuStatus::SPRITE_ZERO_HIT | PpuStatus::SPRITE_OVERFLOW,
            );
        }

        cart.on_ppu_cycle(self.cycle, self.scanline, rendering);

        self.cycle += 1;
        if self.cycle == CYCLES_PER_SCANLINE {
            self.cycle = 0;
            self.scanline += 1;
            if self.scanline == SCANLINES_PER_FRAME {
                self.scanline = 0;
                self.frame += 1;
            }
        }
    }

    fn shift_background(&mut self) {
        self.bg_pattern_lo <<= 1;
        self.bg_pattern_hi <<= 1;
        self.bg_attr_lo <<= 1;
        self.bg_attr_hi <<= 1;
    }

    fn fetch_nametable_byte(&mut self, cart: &mut Cartridge) {
        self.nametable_byte = self.vram_read(cart, self.v.tile_addr());
    }

    fn fetch_attribute_bits(&mut self, cart: &mut Cartridge) {
        let byte = self.vram_read(cart, self.v.attribute_addr());
        self.attribute_bits = (byte >> self.v.attribute_shift()) & 0x03;
    }

    fn background_pattern_addr(&self) -> u16 {
        let table = if self.ctrl.contains(Ctrl::BACKGROUND_TABLE) {
            0x1000
        } else {
            0
        };
        table + self.nametable_byte as u16 * 16 + self.v.fine_y()
    }

    fn fetch_pattern_lo(&mut self, cart: &mut Cartridge) {
        self.pattern_lo = cart.chr_read(self.background_pattern_addr());
    }

    fn fetch_pattern_hi(&mut self, cart: &mut Cartridge) {
        self.pattern_hi = cart.chr_read(self.background_pattern_addr() + 8);
    }

    fn load_background_shifters(&mut self) {
        self.bg_pattern_lo = (self.bg_pattern_lo & 0xFF00) | self.pattern_lo as u16;
        self.bg_pattern_hi = (self.bg_pattern_hi & 0xFF00) | self.pattern_hi as u16;
        let expand = |bit: u8| if bit != 0 { 0x00FF } else { 0x0000 };
        self.bg_attr_lo = (self.bg_attr_lo & 0xFF00) | expand(self.attribute_bits & 1);
        self.bg_attr_hi = (self.bg_attr_hi & 0xFF00) | expand(self.attribute_bits & 2);
    }

    /// 4-bit background colour index (palette << 2 | pixel); low bits 0 = transparent.
    fn background_pixel(&self) -> u8 {
        if !self.mask.contains(Mask::SHOW_BACKGROUND) {
            return 0;
        }
        let bit = 15 - self.fine_x as u16;
        let pixel = ((self.bg_pattern_hi >> bit) & 1) << 1 | ((self.bg_pattern_lo >> bit) & 1);
        let palette = ((self.bg_attr_hi >> bit) & 1) << 1 | ((self.bg_attr_lo >> bit) & 1);
        ((palette << 2) | pixel) as u8
    }

    /// First opaque sprite pixel at column `x`: shortlist slot and 4-bit colour index.
    fn sprite_pixel(&self, x: u16) -> Option<(usize, u8)> {
        if !self.mask.contains(Mask::SHOW_SPRITES) {
            return None;
        }
        self.sprites[..self.sprite_count]
            .iter()
            .enumerate()
            .find_map(|(slot, sprite)| {
                let offset = x.checked_sub(sprite.x as u16)?;
                if offset >= 8 {
                    return None;
                }
                let bit = 7 - offset;
                let pixel = ((sprite.pattern_hi >> bit) & 1) << 1 | ((sprite.pattern_lo >> bit) & 1);
                (pixel != 0).then_some((slot, ((sprite.attributes & ATTR_PALETTE) << 2) | pixel))
            })
    }

    fn render_pixel(&mut self) {
        let x = self.cycle - 1;
        let y = self.scanline as usize;
        let left_column = x < 8;

        let mut background = self.background_pixel();
        if left_column && !self.mask.contains(Mask::SHOW_BACKGROUND_LEFT) {
            background = 0;
        }
        let mut sprite = self.sprite_pixel(x);
        if left_column && !self.mask.contains(Mask::SHOW_SPRITES_LEFT) {
            sprite = None;
        }

        let background_opaque = background & 0x03 != 0;
        let color_index = match sprite {
            None if background_opaque => background,
            None => 0,
            Some((_, index)) if !background_opaque => 0x10 | index,
            Some((slot, index)) => {
                let entry = self.sprites[slot];
                if entry.oam_index == 0 && x < 255 {
                    self.status.insert(PpuStatus::SPRITE_ZERO_HIT);
                }
                if entry.attributes & ATTR_BEHIND_BACKGROUND != 0 {
                    background
                } else {
                    0x10 | index
                }
            }
        };

        let color = self.palette_color(color_index as u16);
        self.framebuffer[y * SCREEN_WIDTH + x as usize] = rgb(color);
    }

    fn render_backdrop(&mut self) {
        let x = (self.cycle - 1) as usize;
        let y = self.scanline as usize;
        self.framebuffer[y * SCREEN_WIDTH + x] = rgb(self.palette_color(0));
    }

    fn palette_color(&self, index: u16) -> u8 {
        let color = self.palette[palette_index(index)];
        if self.mask.contains(Mask::GRAYSCALE) {
            color & 0x30
        } else {
            color
        }
    }

    fn sprite_height(&self) -> u16 {
        if self.ctrl.contains(Ctrl::SPRITE_SIZE_16) {
            16
        } else {
            8
        }
    }

    /// Pattern address of one row of a sprite tile, honouring 8×16 mode and vertical flip.
    fn sprite_row_addr(&self, tile: u8, attributes: u8, row: u16) -> u16 {
        let height = self.sprite_height();
        let row = if attributes & ATTR_FLIP_V != 0 {
            height - 1 - row
        } else {
            row
        };
        if height == 16 {
            let table = (tile as u16 & 1) * 0x1000;
            let tile = (tile & 0xFE) as u16 + row / 8;
            table + tile * 16 + row % 8
        } else {
            let table = if self.ctrl.contains(Ctrl::SPRITE_TABLE) {
                0x1000
            } else {
                0
            };
            table + tile as u16 * 16 + row
        }
    }

    /// Build the shortlist for the next line. A ninth match sets the overflow flag and is dropped.
    fn evaluate_sprites(&mut self, cart: &mut Cartridge) {
        let height = self.sprite_height();
        let mut count = 0;
        for index in 0..OAM_LEN / 4 {
            let base = index * 4;
            let y = self.oam[base] as u16;
            let Some(row) = self.scanline.checked_sub(y) else {
                continue;
            };
            if row >= height {
                continue;
            }
            if count == MAX_SPRITES_PER_LINE {
                self.status.insert(PpuStatus::SPRITE_OVERFLOW);
                break;
            }
            let tile = self.oam[base + 1];
            let attributes = self.oam[base + 2];
            let addr = self.sprite_row_addr(tile, attributes, row);
            let mut pattern_lo = cart.chr_read(addr);
            let mut pattern_hi = cart.chr_read(addr + 8);
            if attributes & ATTR_FLIP_H != 0 {
                pattern_lo = pattern_lo.reverse_bits();
                pattern_hi = pattern_hi.reverse_bits();
            }
            self.sprites[count] = SpriteSlot {
                x: self.oam[base + 3],
                pattern_lo,
                pattern_hi,
                attributes,
                oam_index: index as u8,
            };
            count += 1;
        }
        self.sprite_count = count;
        self.fetch_placeholder_sprites(cart, count);
    }

    /// Empty shortlist slots still fetch tile $FF, which is what an A12-watching mapper counts.
    fn fetch_placeholder_sprites(&mut self, cart: &mut Cartridge, filled: usize) {
        let addr = self.sprite_row_addr(PLACEHOLDER_TILE, 0, 0);
        for _ in filled..MAX_SPRITES_PER_LINE {
            cart.chr_read(addr);
            cart.chr_read(addr + 8);
        }
    }

    /// PPU address space read: pattern tables through the mapper, nametables, palette.
    fn vram_read(&mut self, cart: &mut Cartridge, addr: u16) -> u8 {
        let addr = addr & 0x3FFF;
        match addr {
            0x0000..=0x1FFF => cart.chr_read(addr),
            0x2000..=0x3EFF => self.nametables[map_nametable_addr(addr, cart.mirroring())],
            _ => self.palette[palette_index(addr)],
        }
    }

    fn vram_write(&mut self, cart: &mut Cartridge, addr: u16, data: u8) {
        let addr = addr & 0x3FFF;
        match addr {
            0x0000..=0x1FFF => cart.chr_write(addr, data),
            0x2000..=0x3EFF => self.nametables[map_nametable_addr(addr, cart.mirroring())] = data,
            // Palette entries are 6 bits wide.
            _ => self.palette[palette_index(addr)] = data & 0x3F,
        }
    }

    /// CPU read of register `reg` (0–7, already reduced from $2000–$3FFF).
    pub fn read_register(&mut self, reg: u16, cart: &mut Cartridge) -> u8 {
        match reg & 7 {
            2 => self.read_status(),
            4 => self.read_oam_data(),
            7 => self.read_data(cart),
            _ => self.open_bus,
        }
    }

    /// CPU write of register `reg`. Every write lands on the shared bus and in the low status bits.
    pub fn write_register(&mut self, reg: u16, data: u8, cart: &mut Cartridge) {
        self.open_bus = data;
        self.status = PpuStatus::from_bits_retain(
            (self.status.bits() & !PpuStatus::OPEN_BUS_BITS) | (data & PpuStatus::OPEN_BUS_BITS),
        );
        match reg & 7 {
            0 => self.write_ctrl(data),
            1 => self.mask = Mask::from_bits_retain(data),
            2 => {}
            3 => self.oam_addr = data,
            4 => self.write_oam_data(data),
            5 => self.write_scroll(data),
            6 => self.write_addr(data),
            _ => self.write_data(cart, data),
        }
    }

    /// Read PPUSTATUS ($2002); clears vblank and the write toggle.
    fn read_status(&mut self) -> u8 {
        let status = self.status.bits();
        self.status.remove(PpuStatus::VBLANK);
        self.w = false;
        status
    }

    /// Read OAMDATA ($2004); returns OAM byte at current OAMADDR (read does not increment on real NES).
    fn read_oam_data(&self) -> u8 {
        self.oam[self.oam_addr as usize]
    }

    /// Write OAMDATA ($2004); writes OAM and increments OAMADDR.
    fn write_oam_data(&mut self, data: u8) {
        self.oam[self.oam_addr as usize] = data;
        self.oam_addr = self.oam_addr.wrapping_add(1);
    }

    /// OAM DMA ($4014): 256 bytes written through OAMDATA, starting at OAMADDR.
    pub fn oam_dma(&mut self, page: &[u8; OAM_LEN]) {
        for &byte in page {
            self.write_oam_data(byte);
        }
    }

    /// Write PPUCTRL ($2000). Bits 0–1 go to the nametable select of `t`.
    fn write_ctrl(&mut self, data: u8) {
        let nmi_was_enabled = self.ctrl.contains(Ctrl::NMI_ENABLE);
        self.ctrl = Ctrl::from_bits_retain(data);
        self.t.0 = (self.t.0 & !0x0C00) | (((data & 0x03) as u16) << 10);
        // Enabling NMI during vblank fires it immediately.
        if !nmi_was_enabled
            && self.ctrl.contains(Ctrl::NMI_ENABLE)
            && self.status.contains(PpuStatus::VBLANK)
        {
            self.nmi_pending = true;
        }
    }

    /// Write PPUSCROLL ($2005): first write = fine X and coarse X, second write = fine Y and coarse Y.
    fn write_scroll(&mut self, data: u8) {
        if !self.w {
            self.t.0 = (self.t.0 & !0x001F) | (data >> 3) as u16;
            self.fine_x = data & 0x07;
        } else {
            self.t.0 = (self.t.0 & !0x73E0)
                | (((data & 0x07) as u16) << 12)
                | (((data & 0xF8) as u16) << 2);
        }
        self.w = !self.w;
    }

    /// Write PPUADDR ($2006): high byte (6 bits) then low byte; the second write copies `t` to `v`.
    fn write_addr(&mut self, data: u8) {
        if !self.w {
            self.t.0 = (self.t.0 & 0x00FF) | (((data & 0x3F) as u16) << 8);
        } else {
            self.t.0 = (self.t.0 & 0xFF00) | data as u16;
            self.v = self.t;
        }
        self.w = !self.w;
    }

    fn increment_vram_addr(&mut self) {
        let step = if self.ctrl.contains(Ctrl::INCREMENT_32) {
            32
        } else {
            1
        };
        self.v.0 = self.v.0.wrapping_add(step) & 0x7FFF;
    }

    /// Read PPUDATA ($2007). Below the palette the value comes one read late through the buffer.
    fn read_data(&mut self, cart: &mut Cartridge) -> u8 {
        let addr = self.v.0 & 0x3FFF;
        let data = if addr < 0x3F00 {
            let buffered = self.read_buffer;
            self.read_buffer = self.vram_read(cart, addr);
            buffered
        } else {
            // Palette reads are immediate; the buffer picks up the nametable byte underneath.
            self.read_buffer = self.vram_read(cart, addr - 0x1000);
            self.vram_read(cart, addr)
        };
        self.increment_vram_addr();
        data
    }

    /// Write PPUDATA ($2007): writes VRAM at current address, then increments (by 1 or 32 per PPUCTRL).
    fn write_data(&mut self, cart: &mut Cartridge, data: u8) {
        let addr = self.v.0 & 0x3FFF;
        self.vram_write(cart, addr, data);
        self.increment_vram_addr();
    }
}

/// Map PPU nametable VRAM address ($2000–$3EFF) to internal 2 KiB index using mirroring.
pub fn map_nametable_addr(addr: u16, mirroring: Mirroring) -> usize {
    let addr = (addr & 0x0FFF) as usize;
    let table = addr / 0x400;
    let offset = addr & 0x3FF;

    let page = match mirroring {
        Mirroring::Vertical => table & 1,
        Mirroring::Horizontal => table >> 1,
        Mirroring::OneScreenLower => 0,
        Mirroring::OneScreenUpper => 1,
    };
    page * 0x400 + offset
}
