//! Host arena: handles, slot reuse and per-machine isolation.

use emu_core::{Observable, Value};
use emu_spectrum::{Event, Host, ROM_SIZE, RomSet, SpectrumConfig, SpectrumError, SpectrumModel};

fn host() -> Host {
    // DI; HALT
    let mut rom = vec![0u8; ROM_SIZE];
    rom[..2].copy_from_slice(&[0xF3, 0x76]);
    let roms = RomSet {
        rom_48k: Some(rom.clone()),
        rom_128k: Some([rom.clone(), rom].concat()),
    };
    Host::new(roms, SpectrumConfig::default())
}

#[test]
fn every_operation_rejects_a_dead_handle() {
    let mut host = host();
    let h = host.power_on(SpectrumModel::Spectrum48K).unwrap();
    host.drop(h).unwrap();

    let dead = |r: Result<(), SpectrumError>| matches!(r, Err(SpectrumError::UnknownHandle));
    assert!(dead(host.advance_frame(h, false).map(drop)));
    assert!(dead(host.key_down(h, 0x08)));
    assert!(dead(host.key_up(h, 0x08)));
    assert!(dead(host.reset_input(h)));
    assert!(dead(host.load_tape(h, &[]).map(drop)));
    assert!(dead(host.tape_block_name(h, 0).map(drop)));
    assert!(dead(host.tape_block_selectable(h, 0).map(drop)));
    assert!(dead(host.tape_seek(h, 0)));
    assert!(dead(host.tape_stop(h)));
    assert!(dead(host.load_snapshot(h, &[]).map(drop)));
    assert!(dead(host.snapshot(h).map(drop)));
    assert!(dead(host.snapshot_z80(h).map(drop)));
    assert!(dead(host.peek(h, 0).map(drop)));
    assert!(dead(host.poke(h, 0x8000, 1)));
    assert!(dead(host.reset(h)));
}

#[test]
fn handles_survive_other_drops() {
    let mut host = host();
    let a = host.power_on(SpectrumModel::Spectrum48K).unwrap();
    let b = host.power_on(SpectrumModel::Spectrum128K).unwrap();
    host.poke(b, 0x9000, 0x77).unwrap();
    host.drop(a).unwrap();

    let c = host.power_on(SpectrumModel::Spectrum48K).unwrap();
    assert_eq!(host.peek(b, 0x9000).unwrap(), 0x77);
    assert_eq!(host.peek(c, 0x9000).unwrap(), 0x00);
    assert_eq!(
        host.machine(b).unwrap().model(),
        SpectrumModel::Spectrum128K
    );
}

#[test]
fn machines_run_independently() {
    let mut host = host();
    let a = host.power_on(SpectrumModel::Spectrum48K).unwrap();
    let b = host.power_on(SpectrumModel::Spectrum128K).unwrap();
    for _ in 0..3 {
        host.advance_frame(a, false).unwrap();
    }
    host.advance_frame(b, false).unwrap();

    assert_eq!(host.machine(a).unwrap().query("ula.frame"), Some(Value::U32(3)));
    assert_eq!(host.machine(b).unwrap().query("ula.frame"), Some(Value::U32(1)));

    let events = host.advance_frame(b, false).unwrap();
    let Some(Event::AudioReady(buffer)) = events.last() else {
        panic!("expected audio last, got {events:?}");
    };
    assert_eq!(buffer.sample_rate, 21112);
}

#[test]
fn snapshot_moves_between_machines() {
    let mut host = host();
    let a = host.power_on(SpectrumModel::Spectrum128K).unwrap();
    let b = host.power_on(SpectrumModel::Spectrum48K).unwrap();
    host.poke(a, 0xC123, 0x42).unwrap();
    let saved = host.snapshot(a).unwrap();

    assert_eq!(
        host.load_snapshot(b, &saved).unwrap(),
        SpectrumModel::Spectrum128K
    );
    assert_eq!(host.peek(b, 0xC123).unwrap(), 0x42);
    host.poke(b, 0xC123, 0x43).unwrap();
    assert_eq!(host.peek(a, 0xC123).unwrap(), 0x42);
}
