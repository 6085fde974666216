//! NES emulator entry point.
//!
//! Loads a cartridge and runs it in a window, or headless for a fixed number of frames.
//! Usage: nescore [OPTIONS] <ROM>

use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{ArgAction, Parser};
use log::{error, info};
use minifb::{Key, Scale, ScaleMode, Window, WindowOptions};
use nescore::{
    cartridge::cartridge::Cartridge,
    controller::Buttons,
    debugger::{Breakpoints, Control, Debugger},
    logger,
    movie::Movie,
    ppu::ppu::{SCREEN_HEIGHT, SCREEN_WIDTH},
    system::System,
};

/// NES runs at ~60.0988 Hz (NTSC). Target one frame per 16.67 ms for ~60 fps.
const FRAME_DURATION: Duration = Duration::from_nanos(16_666_667);

/// Keyboard layout for controller 1.
const KEYMAP: [(Key, Buttons); 8] = [
    (Key::Z, Buttons::A),
    (Key::X, Buttons::B),
    (Key::RightShift, Buttons::SELECT),
    (Key::Enter, Buttons::START),
    (Key::Up, Buttons::UP),
    (Key::Down, Buttons::DOWN),
    (Key::Left, Buttons::LEFT),
    (Key::Right, Buttons::RIGHT),
];

/// Cycle-stepped NES emulator
#[derive(Parser, Debug)]
#[command(name = "nescore", version, about, long_about = None)]
struct Args {
    /// Path to the iNES ROM file
    rom: PathBuf,

    /// Prompt before every instruction
    #[arg(short, long)]
    debug: bool,

    /// Stop at the addresses listed in <ROM>.breakpoints
    #[arg(short, long)]
    breakpoints: bool,

    /// Play back recorded input from an FM2 movie
    #[arg(short, long, value_name = "FILE")]
    movie: Option<PathBuf>,

    /// Run this many frames without a window, then exit
    #[arg(long, value_name = "N")]
    frames: Option<u64>,

    /// More log output (-v info, -vv debug, -vvv instruction trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Everything that advances from one frame to the next.
struct Session {
    system: System,
    debugger: Option<Debugger>,
    movie: Option<Movie>,
}

impl Session {
    fn new(args: &Args) -> nescore::Result<Self> {
        let cart = Cartridge::load(&args.rom)?;
        let system = System::new(cart);

        let debugger = if args.debug || args.breakpoints {
            let breakpoints = if args.breakpoints {
                Breakpoints::load(Breakpoints::path_for(&args.rom))?
            } else {
                Breakpoints::default()
            };
            Some(Debugger::new(breakpoints, args.debug))
        } else {
            None
        };

        let movie = args.movie.as_ref().map(Movie::load).transpose()?;

        Ok(Self {
            system,
            debugger,
            movie,
        })
    }

    /// Movie input wins while it lasts; afterwards `keyboard` (if any) drives port 1.
    fn feed_input(&mut self, keyboard: Option<Buttons>) {
        if let Some(movie) = &mut self.movie {
            if movie.apply(&mut self.system) {
                return;
            }
            info!("movie finished at frame {}", self.system.frame());
            self.movie = None;
        }
        if let Some(buttons) = keyboard {
            self.system.set_buttons(0, buttons);
        }
    }

    fn run_frame(&mut self) -> nescore::Result<Control> {
        let Some(debugger) = &mut self.debugger else {
            self.system.run_frame()?;
            return Ok(Control::Resume);
        };
        loop {
            if debugger.should_break(self.system.cpu.pc) {
                let control =
                    debugger.prompt(&mut self.system, &mut io::stdin().lock(), &mut io::stdout())?;
                if control == Control::Quit {
                    return Ok(Control::Quit);
                }
            }
            self.system.step()?;
            if self.system.cpu.bus.ppu.take_frame_ready() {
                return Ok(Control::Resume);
            }
        }
    }
}

fn read_keys(window: &Window) -> Buttons {
    KEYMAP
        .iter()
        .filter(|(key, _)| window.is_key_down(*key))
        .fold(Buttons::empty(), |held, (_, button)| held | *button)
}

fn run_headless(session: &mut Session, frames: u64) -> nescore::Result<()> {
    for _ in 0..frames {
        session.feed_input(None);
        if session.run_frame()? == Control::Quit {
            break;
        }
    }
    info!(
        "ran {} frames, {} CPU cycles",
        session.system.frame(),
        session.system.total_cycles()
    );
    Ok(())
}

fn run_windowed(session: &mut Session) -> Result<(), Box<dyn Error>> {
    let mut window = Window::new(
        "nescore",
        SCREEN_WIDTH,
        SCREEN_HEIGHT,
        WindowOptions {
            resize: true,
            scale: Scale::X2,
            scale_mode: ScaleMode::AspectRatioStretch,
            ..WindowOptions::default()
        },
    )?;

    while window.is_open() && !window.is_key_down(Key::Escape) {
        let frame_start = Instant::now();

        session.feed_input(Some(read_keys(&window)));
        if session.run_frame()? == Control::Quit {
            break;
        }
        window.update_with_buffer(session.system.frame_buffer(), SCREEN_WIDTH, SCREEN_HEIGHT)?;

        // Pace to ~60 fps so we don't burn CPU (emulation is far faster than real NES)
        let elapsed = frame_start.elapsed();
        if elapsed < FRAME_DURATION {
            std::thread::sleep(FRAME_DURATION - elapsed);
        }
    }
    Ok(())
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    let mut session = Session::new(args)?;
    match args.frames {
        Some(frames) => run_headless(&mut session, frames)?,
        None => run_windowed(&mut session)?,
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    logger::init(logger::level_for_verbosity(args.verbose));

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
