//! Breakpoints and the interactive step/continue prompt.
//!
//! Breakpoints are read from `<rom>.breakpoints`, one hex address per line. The prompt
//! reads commands from any [`BufRead`] and writes to any [`Write`], so the terminal is just
//! one possible front end.

use std::collections::BTreeSet;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use ansi_term::Colour::{Cyan, Yellow};
use log::info;

use crate::{
    bus::Bus,
    error::{EmuError, Result},
    system::System,
};

/// Sorted set of CPU addresses that stop execution.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Breakpoints(BTreeSet<u16>);

impl Breakpoints {
    /// Parse one address per line; `0x`/`$` prefixes are accepted and blank lines skipped.
    pub fn parse(text: &str) -> Result<Self> {
        let mut set = BTreeSet::new();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let addr = parse_hex(line).ok_or_else(|| EmuError::InvalidBreakpoint {
                line: index + 1,
                text: line.to_string(),
            })?;
            set.insert(addr);
        }
        Ok(Self(set))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| EmuError::io(path, e))?;
        let breakpoints = Self::parse(&text)?;
        info!(
            "loaded {} breakpoint(s) from {}",
            breakpoints.len(),
            path.display()
        );
        Ok(breakpoints)
    }

    /// `game.nes` -> `game.nes.breakpoints`.
    pub fn path_for(rom: &Path) -> PathBuf {
        let mut name = rom.as_os_str().to_owned();
        name.push(".breakpoints");
        PathBuf::from(name)
    }

    pub fn contains(&self, addr: u16) -> bool {
        self.0.contains(&addr)
    }

    pub fn insert(&mut self, addr: u16) {
        self.0.insert(addr);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.0.iter().copied()
    }
}

fn parse_hex(text: &str) -> Option<u16> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .or_else(|| text.strip_prefix('$'))
        .unwrap_or(text);
    u16::from_str_radix(digits, 16).ok()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Running,
    Stepping,
}

/// What the emulation loop should do after the debugger had its turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Resume,
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Command {
    Step,
    Continue,
    Mute,
    Read(u16),
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    let mut words = line.split_whitespace();
    let command = match words.next()? {
        "s" => Command::Step,
        "c" => Command::Continue,
        "m" => Command::Mute,
        "q" => Command::Quit,
        "r" => Command::Read(parse_hex(words.next()?)?),
        _ => return None,
    };
    Some(command)
}

const HELP: &str = "s: step, c: continue, m: mute breakpoints and continue, r <addr>: read byte, q: quit";

pub struct Debugger {
    pub breakpoints: Breakpoints,
    pub mode: Mode,
    muted: bool,
}

impl Debugger {
    pub fn new(breakpoints: Breakpoints, stepping: bool) -> Self {
        Self {
            breakpoints,
            mode: if stepping { Mode::Stepping } else { Mode::Running },
            muted: false,
        }
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    /// Whether execution must stop before the instruction at `pc`.
    pub fn should_break(&self, pc: u16) -> bool {
        self.mode == Mode::Stepping || (!self.muted && self.breakpoints.contains(pc))
    }

    /// Print the machine state and read commands until one resumes or quits.
    /// End of input counts as quit.
    pub fn prompt<R: BufRead, W: Write>(
        &mut self,
        system: &mut System,
        input: &mut R,
        output: &mut W,
    ) -> Result<Control> {
        write_state(system, output).map_err(EmuError::Console)?;
        let mut line = String::new();
        loop {
            write!(output, "{} ", Cyan.bold().paint("dbg>")).map_err(EmuError::Console)?;
            output.flush().map_err(EmuError::Console)?;

            line.clear();
            if input.read_line(&mut line).map_err(EmuError::Console)? == 0 {
                return Ok(Control::Quit);
            }

            match parse_command(&line) {
                Some(Command::Step) => {
                    self.mode = Mode::Stepping;
                    return Ok(Control::Resume);
                }
                Some(Command::Continue) => {
                    self.mode = Mode::Running;
                    return Ok(Control::Resume);
                }
                Some(Command::Mute) => {
                    self.mode = Mode::Running;
                    self.muted = true;
                    return Ok(Control::Resume);
                }
                Some(Command::Read(addr)) => {
                    let value = system.cpu.bus.read(addr);
                    writeln!(output, "${:04X} ({}): ${:02X}", addr, device_name(addr), value)
                        .map_err(EmuError::Console)?;
                }
                Some(Command::Quit) => return Ok(Control::Quit),
                None => writeln!(output, "{}", Yellow.paint(HELP)).map_err(EmuError::Console)?,
            }
        }
    }
}

fn device_name(addr: u16) -> &'static str {
    match addr {
        0x0000..=0x1FFF => "RAM",
        0x2000..=0x3FFF => "PPU",
        0x4000..=0x4017 => "APU & I/O",
        0x4018..=0x401F => "test registers",
        0x4020..=0xFFFF => "cartridge",
    }
}

fn write_state<W: Write>(system: &System, out: &mut W) -> std::io::Result<()> {
    let cpu = &system.cpu;
    let ppu = &cpu.bus.ppu;
    writeln!(
        out,
        "PC:{:04X} A:{:02X} X:{:02X} Y:{:02X} P:{:02X} SP:{:02X} CYC:{}",
        cpu.pc,
        cpu.a,
        cpu.x,
        cpu.y,
        cpu.status.bits(),
        cpu.sp,
        cpu.cycles
    )?;
    writeln!(
        out,
        "PPU:{:3},{:3} CTRL:{:08b} MASK:{:08b} STATUS:{:08b}",
        ppu.scanline,
        ppu.cycle,
        ppu.ctrl.bits(),
        ppu.mask.bits(),
        ppu.status.bits()
    )?;
    let stack: Vec<String> = (cpu.sp as u16 + 1..=0xFF)
        .map(|i| format!("{:02X}", cpu.bus.ram[0x100 + i as usize]))
        .collect();
    writeln!(out, "stack: {}", stack.join(" "))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::cartridge::cartridge::{Cartridge, tests::ines_image};

    fn system() -> System {
        System::new(Cartridge::from_bytes(&ines_image(0, 1, 1, 0)).unwrap())
    }

    fn run(debugger: &mut Debugger, commands: &str) -> (Control, String) {
        let mut system = system();
        let mut input = Cursor::new(commands.as_bytes().to_vec());
        let mut output = Vec::new();
        let control = debugger
            .prompt(&mut system, &mut input, &mut output)
            .unwrap();
        (control, String::from_utf8_lossy(&output).into_owned())
    }

    #[test]
    fn breakpoints_file_with_prefixes_and_blank_lines() {
        let breakpoints = Breakpoints::parse("8000\n$C004\n\n0x9000").unwrap();
        assert_eq!(
            breakpoints.iter().collect::<Vec<_>>(),
            vec![0x8000, 0x9000, 0xC004]
        );
    }

    #[test]
    fn malformed_breakpoint_reports_line() {
        let err = Breakpoints::parse("8000\nzzz\n").unwrap_err();
        match err {
            EmuError::InvalidBreakpoint { line, text } => {
                assert_eq!(line, 2);
                assert_eq!(text, "zzz");
            }
            other => panic!("unexpected error {other}"),
        }
        assert!(Breakpoints::parse("12345").is_err());
    }

    #[test]
    fn breakpoints_path_appends_suffix() {
        assert_eq!(
            Breakpoints::path_for(Path::new("roms/game.nes")),
            PathBuf::from("roms/game.nes.breakpoints")
        );
    }

    #[test]
    fn stops_at_breakpoints_until_muted() {
        let mut breakpoints = Breakpoints::default();
        breakpoints.insert(0x8000);
        let mut debugger = Debugger::new(breakpoints, false);
        assert!(debugger.should_break(0x8000));
        assert!(!debugger.should_break(0x8001));

        let (control, _) = run(&mut debugger, "m\n");
        assert_eq!(control, Control::Resume);
        assert!(debugger.muted());
        assert!(!debugger.should_break(0x8000));
    }

    #[test]
    fn step_and_continue_switch_mode() {
        let mut debugger = Debugger::new(Breakpoints::default(), false);
        run(&mut debugger, "s\n");
        assert_eq!(debugger.mode, Mode::Stepping);
        assert!(debugger.should_break(0x1234));

        run(&mut debugger, "c\n");
        assert_eq!(debugger.mode, Mode::Running);
        assert!(!debugger.should_break(0x1234));
    }

    #[test]
    fn read_command_prints_byte_and_keeps_prompting() {
        let mut debugger = Debugger::new(Breakpoints::default(), true);
        let (control, output) = run(&mut debugger, "r $C000\nq\n");
        assert_eq!(control, Control::Quit);
        assert!(output.contains("$C000 (cartridge): $00"));
    }

    #[test]
    fn unknown_command_prints_help() {
        let mut debugger = Debugger::new(Breakpoints::default(), true);
        let (_, output) = run(&mut debugger, "x\nc\n");
        assert!(output.contains("r <addr>: read byte"));
        assert!(output.contains("PC:"));
    }

    #[test]
    fn end_of_input_quits() {
        let mut debugger = Debugger::new(Breakpoints::default(), true);
        let (control, _) = run(&mut debugger, "");
        assert_eq!(control, Control::Quit);
    }
}
