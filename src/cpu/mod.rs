//! 6502 CPU emulation for the NES.
//!
//! Table-driven interpreter: [`opcodes`] decodes each byte into an operation, addressing
//! mode and base cycle count; [`cpu::Cpu`] resolves the operand and executes it.
//! Includes the stable undocumented opcodes. Memory and I/O go through the [`Bus`](crate::bus::Bus) trait.

pub mod cpu;
pub mod flags;
pub mod opcodes;
