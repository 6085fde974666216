//! Fatal emulator errors.
//!
//! Everything here stops emulation. Hardware-tolerated conditions (mirroring, bank
//! wraparound, open bus reads) are not errors and never reach this type.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmuError>;

#[derive(Debug, Error)]
pub enum EmuError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("not an iNES image (magic bytes {0:02X?})")]
    BadMagic([u8; 4]),

    #[error("image truncated in {section}: expected {expected} bytes, found {actual}")]
    Truncated {
        section: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("unsupported mapper {0}")]
    UnsupportedMapper(u8),

    #[error("unknown opcode ${opcode:02X} at ${pc:04X}")]
    UnknownOpcode { opcode: u8, pc: u16 },

    #[error("breakpoint file line {line}: invalid address {text:?}")]
    InvalidBreakpoint { line: usize, text: String },

    #[error("movie line {line}: {reason}")]
    MalformedMovie { line: usize, reason: &'static str },

    #[error("debugger console: {0}")]
    Console(#[source] io::Error),
}

impl EmuError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        EmuError::Io {
            path: path.into(),
            source,
        }
    }
}
