//! Machine-level tests driven through the host, using small hand-assembled
//! ROMs in place of the real Sinclair images.

use std::collections::HashSet;

use emu_core::{Observable, Value};
use emu_spectrum::{
    Event, Handle, Host, ROM_SIZE, RomSet, SpectrumConfig, SpectrumError, SpectrumKey,
    SpectrumModel,
};
use format_spectrum_tap::{TapBlock, TapFile};

/// A 16K ROM holding `program` at $0000.
fn rom_with(program: &[u8]) -> Vec<u8> {
    let mut rom = vec![0x00u8; ROM_SIZE];
    rom[..program.len()].copy_from_slice(program);
    rom
}

/// The same program as both 48K ROM and 128K ROM 0.
fn host_with(program: &[u8]) -> Host {
    let rom = rom_with(program);
    let roms = RomSet {
        rom_48k: Some(rom.clone()),
        rom_128k: Some([rom, vec![0; ROM_SIZE]].concat()),
    };
    Host::new(roms, SpectrumConfig::default())
}

fn frames(host: &mut Host, handle: Handle, n: usize) -> Vec<Event> {
    let mut events = Vec::new();
    for _ in 0..n {
        events.extend(host.advance_frame(handle, false).unwrap());
    }
    events
}

fn last_picture(events: &[Event]) -> &[u32] {
    events
        .iter()
        .rev()
        .find_map(|e| match e {
            Event::FrameReady(frame) => Some(frame.pixels.as_slice()),
            _ => None,
        })
        .unwrap()
}

fn audio(events: &[Event]) -> Vec<f32> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::AudioReady(buffer) => Some(buffer.samples.clone()),
            _ => None,
        })
        .flatten()
        .collect()
}

// ---------------------------------------------------------------------------
// Programs
// ---------------------------------------------------------------------------

/// Cycles the border through all eight colours, several times a frame.
const BORDER_STRIPES: &[u8] = &[
    0xF3, // $0000: DI
    0xAF, // $0001: XOR A
    0xD3, 0xFE, // $0002: OUT ($FE),A
    0x3C, // $0004: INC A
    0xE6, 0x07, // $0005: AND 7
    0x06, 0x60, // $0007: LD B,$60
    0x10, 0xFE, // $0009: DJNZ $0009
    0x18, 0xF5, // $000B: JR $0002
];

/// Square wave on the beeper.
const BEEPER_TONE: &[u8] = &[
    0xF3, // $0000: DI
    0x3E, 0x10, // $0001: LD A,$10
    0xD3, 0xFE, // $0003: OUT ($FE),A
    0xEE, 0x10, // $0005: XOR $10
    0x06, 0x40, // $0007: LD B,$40
    0x10, 0xFE, // $0009: DJNZ $0009
    0x18, 0xF6, // $000B: JR $0003
];

/// Copies the Shift-Z-X-C-V half-row to $8000 forever.
const KEYBOARD_SCAN: &[u8] = &[
    0xF3, // $0000: DI
    0x01, 0xFE, 0xFE, // $0001: LD BC,$FEFE
    0xED, 0x78, // $0004: IN A,(C)
    0x32, 0x00, 0x80, // $0006: LD ($8000),A
    0x18, 0xF6, // $0009: JR $0001
];

/// Pages bank 3 at $C000, writes $5A there and halts.
const PAGE_BANK_3: &[u8] = &[
    0xF3, // $0000: DI
    0x01, 0xFD, 0x7F, // $0001: LD BC,$7FFD
    0x3E, 0x03, // $0004: LD A,3
    0xED, 0x79, // $0006: OUT (C),A
    0x3E, 0x5A, // $0008: LD A,$5A
    0x32, 0x00, 0xC0, // $000A: LD ($C000),A
    0x76, // $000D: HALT
];

// ---------------------------------------------------------------------------
// Video and audio
// ---------------------------------------------------------------------------

#[test]
fn border_changes_show_mid_frame() {
    let mut host = host_with(BORDER_STRIPES);
    let h = host.power_on(SpectrumModel::Spectrum48K).unwrap();
    let events = frames(&mut host, h, 3);

    let picture = last_picture(&events);
    let colours: HashSet<u32> = (0..256).map(|y| picture[y * 320]).collect();
    assert!(
        colours.len() >= 3,
        "left border should show several colours, got {}",
        colours.len()
    );
}

#[test]
fn beeper_square_wave_reaches_audio() {
    let mut host = host_with(BEEPER_TONE);
    let h = host.power_on(SpectrumModel::Spectrum48K).unwrap();
    let samples = audio(&frames(&mut host, h, 10));

    assert_eq!(samples.len(), 10 * 416);
    let max = samples.iter().copied().fold(f32::MIN, f32::max);
    let min = samples.iter().copied().fold(f32::MAX, f32::min);
    assert!(max > 0.3, "peak {max}");
    assert!(min < 0.2, "trough {min}");
}

#[test]
fn silent_machine_is_silent() {
    let mut host = host_with(&[0xF3, 0x76]);
    let h = host.power_on(SpectrumModel::Spectrum48K).unwrap();
    let samples = audio(&frames(&mut host, h, 2));
    assert!(samples.iter().all(|&s| s.abs() < 1e-6));
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[test]
fn key_presses_reach_the_program() {
    let mut host = host_with(KEYBOARD_SCAN);
    let h = host.power_on(SpectrumModel::Spectrum48K).unwrap();
    frames(&mut host, h, 1);
    assert_eq!(host.peek(h, 0x8000).unwrap() & 0x1F, 0x1F);

    host.key_down(h, SpectrumKey::CapsShift.code()).unwrap();
    host.key_down(h, SpectrumKey::X.code()).unwrap();
    frames(&mut host, h, 1);
    assert_eq!(host.peek(h, 0x8000).unwrap() & 0x1F, 0x1A);

    host.key_up(h, SpectrumKey::X.code()).unwrap();
    frames(&mut host, h, 1);
    assert_eq!(host.peek(h, 0x8000).unwrap() & 0x1F, 0x1E);

    host.reset_input(h).unwrap();
    frames(&mut host, h, 1);
    assert_eq!(host.peek(h, 0x8000).unwrap() & 0x1F, 0x1F);
}

// ---------------------------------------------------------------------------
// 128K
// ---------------------------------------------------------------------------

#[test]
fn paging_survives_z80_export() {
    let mut host = host_with(PAGE_BANK_3);
    let h = host.power_on(SpectrumModel::Spectrum128K).unwrap();
    frames(&mut host, h, 1);
    assert_eq!(host.peek(h, 0xC000).unwrap(), 0x5A);
    assert_eq!(
        host.machine(h).unwrap().query("paging.7ffd"),
        Some(Value::U8(3))
    );

    let exported = host.snapshot_z80(h).unwrap();
    let other = host.power_on(SpectrumModel::Spectrum48K).unwrap();
    assert_eq!(
        host.load_snapshot(other, &exported).unwrap(),
        SpectrumModel::Spectrum128K
    );
    assert_eq!(host.peek(other, 0xC000).unwrap(), 0x5A);
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

#[test]
fn snapshot_resumes_with_identical_output() {
    let mut host = host_with(BEEPER_TONE);
    let a = host.power_on(SpectrumModel::Spectrum48K).unwrap();
    frames(&mut host, a, 3);
    let saved = host.snapshot(a).unwrap();

    let b = host.power_on(SpectrumModel::Spectrum48K).unwrap();
    host.load_snapshot(b, &saved).unwrap();
    assert_eq!(frames(&mut host, a, 2), frames(&mut host, b, 2));
}

#[test]
fn bad_snapshot_changes_nothing() {
    let mut host = host_with(BORDER_STRIPES);
    let h = host.power_on(SpectrumModel::Spectrum48K).unwrap();
    frames(&mut host, h, 1);
    let before = host.snapshot(h).unwrap();

    for junk in [&b"ZXSN"[..], &[0u8; 49_179][..], &[0xFF; 40][..]] {
        assert!(matches!(
            host.load_snapshot(h, junk),
            Err(SpectrumError::InvalidSnapshot(_))
        ));
    }
    assert_eq!(host.snapshot(h).unwrap(), before);
}

#[test]
fn peek_returns_what_was_poked() {
    let mut host = host_with(&[0xF3, 0x76]);
    let h = host.power_on(SpectrumModel::Spectrum48K).unwrap();
    for addr in 0x4000..=0xFFFFu16 {
        host.poke(h, addr, (addr ^ (addr >> 8)) as u8).unwrap();
    }
    for addr in 0x4000..=0xFFFFu16 {
        assert_eq!(host.peek(h, addr).unwrap(), (addr ^ (addr >> 8)) as u8);
    }
}

// ---------------------------------------------------------------------------
// Tape
// ---------------------------------------------------------------------------

fn header_block(name: &str, data_len: u16) -> TapBlock {
    let mut payload = vec![0u8]; // Program
    let mut padded = name.as_bytes().to_vec();
    padded.resize(10, b' ');
    payload.extend_from_slice(&padded);
    payload.extend_from_slice(&data_len.to_le_bytes());
    payload.extend_from_slice(&[0x0A, 0x00, 0x00, 0x00]);
    TapBlock::new(0x00, &payload)
}

#[test]
fn tape_blocks_are_named_and_guarded() {
    let mut host = host_with(&[0xF3, 0x76]);
    let h = host.power_on(SpectrumModel::Spectrum48K).unwrap();
    let tap = TapFile {
        blocks: vec![header_block("HELLO", 2), TapBlock::new(0xFF, &[1, 2])],
    }
    .to_bytes();

    assert_eq!(host.load_tape(h, &tap).unwrap(), 2);
    assert_eq!(host.tape_block_name(h, 0).unwrap(), "Program: HELLO");
    assert!(host.tape_block_selectable(h, 0).unwrap());
    assert!(!host.tape_block_selectable(h, 1).unwrap());

    assert!(matches!(
        host.tape_seek(h, 1),
        Err(SpectrumError::BlockNotSelectable(1))
    ));
    assert!(matches!(
        host.tape_seek(h, 5),
        Err(SpectrumError::IndexOutOfRange { index: 5, len: 2 })
    ));
    assert!(matches!(
        host.tape_block_name(h, 2),
        Err(SpectrumError::IndexOutOfRange { .. })
    ));
}

#[test]
fn corrupt_tape_keeps_previous_one() {
    let mut host = host_with(&[0xF3, 0x76]);
    let h = host.power_on(SpectrumModel::Spectrum48K).unwrap();
    let tap = TapFile {
        blocks: vec![TapBlock::new(0xFF, &[1, 2, 3])],
    }
    .to_bytes();
    host.load_tape(h, &tap).unwrap();

    let mut bad_tzx = b"ZXTape!\x1A\x01\x14".to_vec();
    bad_tzx.push(0xEE);
    assert!(matches!(
        host.load_tape(h, &bad_tzx),
        Err(SpectrumError::CorruptContainer(_))
    ));
    assert_eq!(host.tape_block_name(h, 0).unwrap(), "5 bytes");
}

#[test]
fn tzx_stop_block_halts_playback() {
    let mut host = host_with(&[0xF3, 0x76]);
    let h = host.power_on(SpectrumModel::Spectrum48K).unwrap();
    let mut tzx = b"ZXTape!\x1A\x01\x14".to_vec();
    tzx.extend_from_slice(&[0x12, 0xE8, 0x03, 0x0A, 0x00]); // 10 pulses of 1000 T
    tzx.extend_from_slice(&[0x20, 0x00, 0x00]); // stop the tape
    tzx.extend_from_slice(&[0x12, 0xE8, 0x03, 0x0A, 0x00]);

    assert_eq!(host.load_tape(h, &tzx).unwrap(), 3);
    assert_eq!(host.tape_block_name(h, 1).unwrap(), "Stop the tape");
    assert!(!host.tape_block_selectable(h, 1).unwrap());

    let events = frames(&mut host, h, 1);
    assert_eq!(events[0], Event::TapeBlockChanged(Some(0)));
    let machine = host.machine(h).unwrap();
    assert_eq!(machine.query("tape.playing"), Some(Value::Bool(false)));
    assert_eq!(machine.query("tape.block"), Some(Value::U64(0)));

    host.tape_seek(h, 2).unwrap();
    let events = frames(&mut host, h, 1);
    assert_eq!(events[0], Event::TapeBlockChanged(Some(2)));
    assert!(events.contains(&Event::TapeBlockChanged(None)));
}

#[test]
fn turbo_frame_skips_audio() {
    let mut host = host_with(BEEPER_TONE);
    let h = host.power_on(SpectrumModel::Spectrum48K).unwrap();
    let events = host.advance_frame(h, true).unwrap();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], Event::FrameReady(_)));
    assert_eq!(
        host.machine(h).unwrap().query("ula.frame"),
        Some(Value::U32(100))
    );
}
