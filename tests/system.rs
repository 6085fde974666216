//! Whole-console scenarios run from in-memory iNES images.

use std::cell::RefCell;
use std::rc::Rc;

use nescore::{
    EmuError, System,
    audio::AudioPort,
    bus::Bus,
    cartridge::cartridge::Cartridge,
    cpu::flags::Status,
};

const PRG_BANK: usize = 16 * 1024;
const CHR_BANK: usize = 8 * 1024;

/// iNES image with zeroed banks; `poke` places bytes at CPU addresses in the last 16K bank.
struct Rom {
    mapper: u8,
    prg: Vec<u8>,
    chr_banks: u8,
}

impl Rom {
    fn new(mapper: u8, prg_banks: usize, chr_banks: u8) -> Self {
        Self {
            mapper,
            prg: vec![0; prg_banks * PRG_BANK],
            chr_banks,
        }
    }

    fn poke(mut self, addr: u16, bytes: &[u8]) -> Self {
        let start = self.prg.len() - PRG_BANK + (addr as usize & (PRG_BANK - 1));
        self.prg[start..start + bytes.len()].copy_from_slice(bytes);
        self
    }

    fn vectors(self, nmi: u16, reset: u16, irq: u16) -> Self {
        let mut bytes = Vec::new();
        for vector in [nmi, reset, irq] {
            bytes.extend(vector.to_le_bytes());
        }
        self.poke(0xFFFA, &bytes)
    }

    fn image(&self) -> Vec<u8> {
        let mut image = vec![
            b'N',
            b'E',
            b'S',
            0x1A,
            (self.prg.len() / PRG_BANK) as u8,
            self.chr_banks,
            self.mapper << 4,
            self.mapper & 0xF0,
        ];
        image.resize(16, 0);
        image.extend(&self.prg);
        image.resize(image.len() + self.chr_banks as usize * CHR_BANK, 0);
        image
    }

    fn system(&self) -> System {
        System::new(Cartridge::from_bytes(&self.image()).unwrap())
    }
}

fn nrom(program: &[u8]) -> Rom {
    Rom::new(0, 1, 1)
        .poke(0x8000, program)
        // NMI handler: INX; RTI
        .poke(0x9000, &[0xE8, 0x40])
        .vectors(0x9000, 0x8000, 0x9000)
}

#[test]
fn load_immediate_costs_two_cycles() {
    let mut system = nrom(&[0xA9, 0x42]).system();
    assert_eq!(system.step().unwrap(), 2);
    assert_eq!(system.cpu.a, 0x42);
    assert!(!system.cpu.status.zero());
    assert!(!system.cpu.status.negative());
    assert_eq!(system.total_cycles(), 9);
}

#[test]
fn oam_dma_stalls_cpu_and_fills_oam() {
    // LDA #$02; STA $4014; STA $4014
    let mut system = nrom(&[0xA9, 0x02, 0x8D, 0x14, 0x40, 0x8D, 0x14, 0x40]).system();
    for i in 0..256u16 {
        system.cpu.bus.write(0x0200 + i, i as u8 ^ 0xA5);
    }

    assert_eq!(system.step().unwrap(), 2);
    // Cycle 13 after the store: odd, one alignment cycle.
    assert_eq!(system.step().unwrap(), 4 + 514);
    assert_eq!(system.cpu.bus.ppu.oam[0x10], 0x10 ^ 0xA5);
    assert_eq!(system.total_cycles(), 527);

    // Cycle 531: odd again.
    assert_eq!(system.step().unwrap(), 4 + 514);
}

#[test]
fn vblank_nmi_runs_once_per_frame() {
    // LDA #$80; STA $2000; JMP $8005
    let mut system = nrom(&[0xA9, 0x80, 0x8D, 0x00, 0x20, 0x4C, 0x05, 0x80]).system();
    for _ in 0..3 {
        system.run_frame().unwrap();
    }
    // The third NMI is raised at the end of the last frame and not yet serviced.
    assert_eq!(system.cpu.x, 2);
    assert_eq!(system.frame(), 2);
}

#[test]
fn frame_period_is_constant() {
    let mut system = nrom(&[0x4C, 0x00, 0x80]).system();
    system.run_frame().unwrap();
    let first = system.total_cycles();
    system.run_frame().unwrap();
    let second = system.total_cycles();
    system.run_frame().unwrap();
    let third = system.total_cycles();
    // 341 × 262 dots = 29780.67 CPU cycles, give or take one instruction.
    for period in [second - first, third - second] {
        assert!((29_777..=29_784).contains(&period), "period {period}");
    }
}

#[test]
fn undecodable_opcode_stops_emulation() {
    let mut system = nrom(&[0xEA, 0x02]).system();
    system.step().unwrap();
    match system.step() {
        Err(EmuError::UnknownOpcode { opcode, pc }) => {
            assert_eq!(opcode, 0x02);
            assert_eq!(pc, 0x8001);
        }
        other => panic!("expected unknown opcode, got {other:?}"),
    }
}

#[test]
fn reset_restarts_at_vector() {
    let mut system = nrom(&[0xA9, 0x01, 0x4C, 0x02, 0x80]).system();
    system.step().unwrap();
    system.step().unwrap();
    system.reset();
    assert_eq!(system.cpu.pc, 0x8000);
    assert_eq!(system.cpu.sp, 0xFD);
    assert_eq!(system.cpu.status, Status::POWER_ON);
}

#[derive(Default)]
struct Recorder {
    writes: Vec<(u16, u8)>,
    ticks: usize,
}

struct SharedRecorder(Rc<RefCell<Recorder>>);

impl AudioPort for SharedRecorder {
    fn write_register(&mut self, addr: u16, value: u8) {
        self.0.borrow_mut().writes.push((addr, value));
    }

    fn read_status(&mut self) -> u8 {
        0x41
    }

    fn tick(&mut self) {
        self.0.borrow_mut().ticks += 1;
    }
}

#[test]
fn audio_port_sees_registers_and_cycles() {
    // LDA #$3F; STA $4000; STA $4017; LDA $4015
    let rom = nrom(&[0xA9, 0x3F, 0x8D, 0x00, 0x40, 0x8D, 0x17, 0x40, 0xAD, 0x15, 0x40]);
    let recorder = Rc::new(RefCell::new(Recorder::default()));
    let cart = Cartridge::from_bytes(&rom.image()).unwrap();
    let mut system = System::with_audio(cart, Box::new(SharedRecorder(Rc::clone(&recorder))));
    for _ in 0..4 {
        system.step().unwrap();
    }

    assert_eq!(system.cpu.a, 0x41);
    let recorder = recorder.borrow();
    assert_eq!(recorder.writes, vec![(0x4000, 0x3F), (0x4017, 0x3F)]);
    assert_eq!(recorder.ticks, 2 + 4 + 4 + 4);
}

/// MMC3 board counting scanlines: background from $0000, sprites from $1000, IRQ every
/// 21 lines. The handler counts in X and re-arms the counter.
fn mmc3_scanline_counter(enable_irq: bool) -> System {
    let cli = if enable_irq { 0x58 } else { 0xEA };
    Rom::new(4, 2, 1)
        .poke(
            0xE000,
            &[
                0xA9, 0x14, // LDA #20
                0x8D, 0x00, 0xC0, // STA $C000 (latch)
                0x8D, 0x01, 0xC0, // STA $C001 (reload)
                0x8D, 0x01, 0xE0, // STA $E001 (enable)
                0xA9, 0x08, // LDA #$08
                0x8D, 0x00, 0x20, // STA $2000
                0xA9, 0x18, // LDA #$18
                0x8D, 0x01, 0x20, // STA $2001
                cli, 0x4C, 0x16, 0xE0, // JMP $E016
            ],
        )
        .poke(0xE100, &[0xE8, 0x8D, 0x00, 0xE0, 0x8D, 0x01, 0xE0, 0x40])
        .poke(0xE200, &[0x40])
        .vectors(0xE200, 0xE000, 0xE100)
        .system()
}

#[test]
fn mmc3_scanline_irq_reaches_cpu() {
    let mut system = mmc3_scanline_counter(true);
    system.run_frame().unwrap();
    system.run_frame().unwrap();
    // 241 filtered A12 rises per frame, one IRQ every 21: 11 in the first frame, 22 by the second.
    assert_eq!(system.cpu.x, 22);
}

#[test]
fn mmc3_irq_is_held_off_by_interrupt_disable() {
    let mut system = mmc3_scanline_counter(false);
    system.run_frame().unwrap();
    system.run_frame().unwrap();
    assert_eq!(system.cpu.x, 0);
    assert!(system.cpu.bus.cart.irq_pending());
}
