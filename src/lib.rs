//! nescore: the core chipset of the NES (Nintendo Entertainment System).
//!
//! Implements the hardware as documented on the
//! [NESdev Wiki](https://www.nesdev.org/wiki/NES_reference_guide): the Ricoh 2A03 CPU,
//! 2C02 PPU, cartridge mappers, and controller I/O. Audio synthesis is left to an external
//! [`audio::AudioPort`].
//!
//! ## Modules (NESdev references)
//!
//! - **audio** – register interface to the [APU](https://www.nesdev.org/wiki/APU); silent by default
//! - **bus** – [CPU memory map](https://www.nesdev.org/wiki/CPU_memory_map): RAM, PPU, I/O,
//!   cartridge; [OAM DMA](https://www.nesdev.org/wiki/PPU_registers#OAMDMA) stall
//! - **cartridge** – [iNES](https://www.nesdev.org/wiki/INES) loading; [Mapper](https://www.nesdev.org/wiki/Mapper)
//!   NROM (0), MMC1 (1), UxROM (2), MMC3 (4), AxROM (7), NSF-style (31)
//! - **controller** – [Controller reading](https://www.nesdev.org/wiki/Controller_reading): $4016 latch, shift-out
//! - **cpu** – [6502](https://www.nesdev.org/wiki/CPU) / 2A03: official + stable undocumented opcodes,
//!   [NMI](https://www.nesdev.org/wiki/NMI) and IRQ
//! - **debugger** – breakpoints and the step/continue prompt
//! - **movie** – FM2 input playback
//! - **ppu** – [PPU](https://www.nesdev.org/wiki/PPU), [PPU registers](https://www.nesdev.org/wiki/PPU_registers), OAM, nametables, 256×240
//! - **system** – steps the CPU and keeps the PPU at 3 dots per CPU cycle

pub mod audio;
pub mod bus;
pub mod cartridge;
pub mod controller;
pub mod cpu;
pub mod debugger;
pub mod error;
pub mod logger;
pub mod movie;
pub mod ppu;
pub mod system;

pub use error::{EmuError, Result};
pub use system::System;
