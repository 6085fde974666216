//! Recorded input playback from FM2 movie files
//! ([FM2](https://fceux.com/web/help/fm2.html)).
//!
//! Only the input log is used: every line starting with `|` is one frame,
//! `|command|RLDUTSBA|RLDUTSBA|...`. Header lines are skipped.

use std::fs;
use std::path::Path;

use log::{debug, info};

use crate::{
    controller::Buttons,
    error::{EmuError, Result},
    system::System,
};

/// Bit 0 of the command field.
const SOFT_RESET: u8 = 1;

/// Frames of released input fed before the log starts, and again after a soft reset.
const LEAD_IN_FRAMES: usize = 1;
const RESET_SETTLE_FRAMES: usize = 40;

/// Button for each column of a controller field, left to right.
const COLUMNS: [Buttons; 8] = [
    Buttons::RIGHT,
    Buttons::LEFT,
    Buttons::DOWN,
    Buttons::UP,
    Buttons::START,
    Buttons::SELECT,
    Buttons::B,
    Buttons::A,
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MovieFrame {
    pub reset: bool,
    pub ports: [Buttons; 2],
}

pub struct Movie {
    frames: Vec<MovieFrame>,
    cursor: usize,
    /// Released frames still owed before the next logged frame.
    idle: usize,
}

impl Movie {
    pub fn parse(text: &str) -> Result<Self> {
        let frames = text
            .lines()
            .enumerate()
            .filter(|(_, line)| line.starts_with('|'))
            .map(|(index, line)| parse_frame(index + 1, line))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            frames,
            cursor: 0,
            idle: LEAD_IN_FRAMES,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| EmuError::io(path, e))?;
        let movie = Self::parse(&text)?;
        info!("movie {}: {} frames", path.display(), movie.len());
        Ok(movie)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.idle == 0 && self.cursor >= self.frames.len()
    }

    /// Input for the next emulated frame. `None` once the log has run out.
    pub fn next_frame(&mut self) -> Option<MovieFrame> {
        if self.idle > 0 {
            self.idle -= 1;
            return Some(MovieFrame::default());
        }
        let frame = *self.frames.get(self.cursor)?;
        self.cursor += 1;
        if frame.reset {
            self.idle = RESET_SETTLE_FRAMES;
        }
        Some(frame)
    }

    /// Feed the next frame into `system`: buttons for both ports, and a soft reset if the
    /// frame asks for one. Returns false when the log is exhausted; buttons are released then.
    pub fn apply(&mut self, system: &mut System) -> bool {
        let Some(frame) = self.next_frame() else {
            system.set_buttons(0, Buttons::empty());
            system.set_buttons(1, Buttons::empty());
            return false;
        };
        if frame.reset {
            debug!("movie frame {}: soft reset", self.cursor);
            system.reset();
        }
        for (port, buttons) in frame.ports.into_iter().enumerate() {
            system.set_buttons(port, buttons);
        }
        true
    }
}

fn parse_frame(line_no: usize, line: &str) -> Result<MovieFrame> {
    let malformed = |reason| EmuError::MalformedMovie {
        line: line_no,
        reason,
    };
    let mut fields = line.trim_end().split('|').skip(1);

    let command: u8 = fields
        .next()
        .and_then(|f| f.trim().parse().ok())
        .ok_or_else(|| malformed("command field is not a number"))?;

    let mut ports = [Buttons::empty(); 2];
    for port in &mut ports {
        let Some(field) = fields.next() else {
            break;
        };
        *port = parse_buttons(field).ok_or_else(|| malformed("controller field is not 8 columns"))?;
    }

    Ok(MovieFrame {
        reset: command & SOFT_RESET != 0,
        ports,
    })
}

/// An empty field means no controller in that port.
fn parse_buttons(field: &str) -> Option<Buttons> {
    if field.is_empty() {
        return Some(Buttons::empty());
    }
    let columns: Vec<char> = field.chars().collect();
    if columns.len() != COLUMNS.len() {
        return None;
    }
    Some(
        columns
            .iter()
            .zip(COLUMNS)
            .filter(|(c, _)| !matches!(**c, '.' | ' '))
            .fold(Buttons::empty(), |held, (_, button)| held | button),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::cartridge::{Cartridge, tests::ines_image};

    const LOG: &str = "version 3\nromFilename game\n|0|R.......|........||\n|0|.......A|.B......||\n";

    #[test]
    fn header_lines_are_skipped() {
        let movie = Movie::parse(LOG).unwrap();
        assert_eq!(movie.len(), 2);
    }

    #[test]
    fn columns_map_to_buttons() {
        assert_eq!(parse_buttons("RLDUTSBA"), Some(Buttons::all()));
        assert_eq!(parse_buttons("R......A"), Some(Buttons::RIGHT | Buttons::A));
        assert_eq!(parse_buttons("   U    "), Some(Buttons::UP));
        assert_eq!(parse_buttons(""), Some(Buttons::empty()));
        assert_eq!(parse_buttons("RL"), None);
    }

    #[test]
    fn command_bit_zero_requests_reset() {
        let frame = parse_frame(1, "|1|........|").unwrap();
        assert!(frame.reset);
        assert_eq!(frame.ports, [Buttons::empty(); 2]);
        assert!(!parse_frame(1, "|2|........|").unwrap().reset);
    }

    #[test]
    fn malformed_lines_are_errors() {
        assert!(matches!(
            Movie::parse("header\n|x|........|"),
            Err(EmuError::MalformedMovie { line: 2, .. })
        ));
        assert!(matches!(
            Movie::parse("|0|....|"),
            Err(EmuError::MalformedMovie { line: 1, .. })
        ));
    }

    #[test]
    fn playback_leads_in_with_released_frame() {
        let mut movie = Movie::parse(LOG).unwrap();
        assert_eq!(movie.next_frame(), Some(MovieFrame::default()));
        assert_eq!(movie.next_frame().unwrap().ports[0], Buttons::RIGHT);
        let frame = movie.next_frame().unwrap();
        assert_eq!(frame.ports, [Buttons::A, Buttons::B]);
        assert!(movie.is_finished());
        assert_eq!(movie.next_frame(), None);
    }

    #[test]
    fn soft_reset_settles_before_more_input() {
        let mut movie = Movie::parse("|1|........|\n|0|.......A|\n").unwrap();
        movie.next_frame();
        assert!(movie.next_frame().unwrap().reset);
        for _ in 0..RESET_SETTLE_FRAMES {
            assert_eq!(movie.next_frame(), Some(MovieFrame::default()));
        }
        assert_eq!(movie.next_frame().unwrap().ports[0], Buttons::A);
    }

    #[test]
    fn exhausted_movie_releases_buttons() {
        let mut system = System::new(Cartridge::from_bytes(&ines_image(0, 1, 1, 0)).unwrap());
        let mut movie = Movie::parse("|0|.......A|\n").unwrap();
        assert!(movie.apply(&mut system));
        assert!(movie.apply(&mut system));
        assert_eq!(system.cpu.bus.controllers[0].buttons(), Buttons::A);
        assert!(!movie.apply(&mut system));
        assert_eq!(system.cpu.bus.controllers[0].buttons(), Buttons::empty());
    }
}
