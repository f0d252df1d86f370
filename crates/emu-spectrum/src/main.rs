//! ZX Spectrum headless runner.
//!
//! Powers on a machine, loads media, runs a number of frames and saves a
//! screenshot, the audio and a snapshot.

use std::path::{Path, PathBuf};
use std::process;

use emu_spectrum::{
    Event, Frame, Host, RomSet, Spectrum, SpectrumConfig, SpectrumModel, capture,
};
use log::{LevelFilter, Log, Metadata, Record};

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5} {}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(level: LevelFilter) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

// ---------------------------------------------------------------------------
// CLI argument parsing
// ---------------------------------------------------------------------------

struct CliArgs {
    model: SpectrumModel,
    rom_48k: Option<PathBuf>,
    rom_128k: Option<PathBuf>,
    tape_path: Option<PathBuf>,
    snapshot_path: Option<PathBuf>,
    frames: u32,
    turbo: bool,
    fast_load: bool,
    plus2a_paging: bool,
    screenshot_path: Option<PathBuf>,
    audio_path: Option<PathBuf>,
    save_snapshot: Option<PathBuf>,
    save_z80: Option<PathBuf>,
    log_level: LevelFilter,
}

fn usage() {
    eprintln!("Usage: emu-spectrum [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --model <model>        Spectrum model: 48k, 128k [default: 48k]");
    eprintln!("  --rom48 <file>         48K ROM image (16K)");
    eprintln!("  --rom128 <file>        128K ROM image (ROM 0 then ROM 1, 32K)");
    eprintln!("  --tape <file>          Insert a TAP or TZX file (or a ZIP holding one)");
    eprintln!("  --snapshot <file>      Load a snapshot (native, SNA, Z80 or zipped)");
    eprintln!("  --frames <n>           Number of frames to run [default: 200]");
    eprintln!("  --turbo                Run turbo frames (no audio)");
    eprintln!("  --no-fast-load         Play tapes in real time through the ROM");
    eprintln!("  --plus2a-paging        Decode port $1FFD as the +2A paging latch");
    eprintln!("  --screenshot <file>    Save a PNG of the last frame");
    eprintln!("  --audio <file>         Save a WAV of all frames");
    eprintln!("  --save-snapshot <file> Save a native snapshot when done");
    eprintln!("  --save-z80 <file>      Save a .Z80 snapshot when done");
    eprintln!("  --log-level <level>    off, error, warn, info, debug, trace [default: $RUST_LOG or warn]");
}

fn parse_model(s: &str) -> SpectrumModel {
    match s.to_lowercase().as_str() {
        "48k" | "48" => SpectrumModel::Spectrum48K,
        "128k" | "128" => SpectrumModel::Spectrum128K,
        other => {
            eprintln!("Unknown model: {other}. Use 48k or 128k.");
            process::exit(1);
        }
    }
}

fn parse_level(s: &str) -> LevelFilter {
    s.parse().unwrap_or_else(|_| {
        eprintln!("Unknown log level: {s}");
        process::exit(1);
    })
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        model: SpectrumConfig::default().model,
        rom_48k: None,
        rom_128k: None,
        tape_path: None,
        snapshot_path: None,
        frames: 200,
        turbo: false,
        fast_load: true,
        plus2a_paging: false,
        screenshot_path: None,
        audio_path: None,
        save_snapshot: None,
        save_z80: None,
        log_level: std::env::var("RUST_LOG")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(LevelFilter::Warn),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--model" => {
                i += 1;
                if let Some(s) = args.get(i) {
                    cli.model = parse_model(s);
                }
            }
            "--rom48" => {
                i += 1;
                cli.rom_48k = args.get(i).map(PathBuf::from);
            }
            "--rom128" => {
                i += 1;
                cli.rom_128k = args.get(i).map(PathBuf::from);
            }
            "--tape" => {
                i += 1;
                cli.tape_path = args.get(i).map(PathBuf::from);
            }
            "--snapshot" => {
                i += 1;
                cli.snapshot_path = args.get(i).map(PathBuf::from);
            }
            "--frames" => {
                i += 1;
                if let Some(s) = args.get(i) {
                    cli.frames = s.parse().unwrap_or(200);
                }
            }
            "--turbo" => {
                cli.turbo = true;
            }
            "--no-fast-load" => {
                cli.fast_load = false;
            }
            "--plus2a-paging" => {
                cli.plus2a_paging = true;
            }
            "--screenshot" => {
                i += 1;
                cli.screenshot_path = args.get(i).map(PathBuf::from);
            }
            "--audio" => {
                i += 1;
                cli.audio_path = args.get(i).map(PathBuf::from);
            }
            "--save-snapshot" => {
                i += 1;
                cli.save_snapshot = args.get(i).map(PathBuf::from);
            }
            "--save-z80" => {
                i += 1;
                cli.save_z80 = args.get(i).map(PathBuf::from);
            }
            "--log-level" => {
                i += 1;
                if let Some(s) = args.get(i) {
                    cli.log_level = parse_level(s);
                }
            }
            "--help" | "-h" => {
                usage();
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path, what: &str) -> Vec<u8> {
    match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("Failed to read {what} file {}: {e}", path.display());
            process::exit(1);
        }
    }
}

fn write_file(path: &Path, what: &str, data: &[u8]) {
    if let Err(e) = std::fs::write(path, data) {
        eprintln!("Failed to write {what} file {}: {e}", path.display());
        process::exit(1);
    }
    eprintln!("{what} saved to {}", path.display());
}

fn fail(what: &str, err: impl std::fmt::Display) -> ! {
    eprintln!("{what}: {err}");
    process::exit(1);
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    let cli = parse_args();
    init_logging(cli.log_level);

    let roms = RomSet {
        rom_48k: cli.rom_48k.as_deref().map(|p| read_file(p, "48K ROM")),
        rom_128k: cli.rom_128k.as_deref().map(|p| read_file(p, "128K ROM")),
    };
    let config = SpectrumConfig {
        model: cli.model,
        fast_load: cli.fast_load,
        plus2a_paging: cli.plus2a_paging,
        ..SpectrumConfig::default()
    };
    let mut host = Host::new(roms, config);
    let handle = host
        .power_on(cli.model)
        .unwrap_or_else(|e| fail("Failed to power on", e));

    if let Some(path) = &cli.snapshot_path {
        let data = read_file(path, "snapshot");
        let model = host
            .load_snapshot(handle, &data)
            .unwrap_or_else(|e| fail("Failed to load snapshot", e));
        eprintln!("Loaded snapshot: {} (Spectrum {model})", path.display());
    }

    if let Some(path) = &cli.tape_path {
        let data = read_file(path, "tape");
        let count = host
            .load_tape(handle, &data)
            .unwrap_or_else(|e| fail("Failed to load tape", e));
        eprintln!("Inserted tape: {} ({count} blocks)", path.display());
        for index in 0..count {
            if let (Ok(name), Ok(true)) = (
                host.tape_block_name(handle, index),
                host.tape_block_selectable(handle, index),
            ) {
                eprintln!("  {index:3}: {name}");
            }
        }
    }

    let mut last_frame: Option<Frame> = None;
    let mut audio = Vec::new();
    let mut sample_rate = host.machine(handle).map_or(0, Spectrum::sample_rate);
    for _ in 0..cli.frames {
        let events = host
            .advance_frame(handle, cli.turbo)
            .unwrap_or_else(|e| fail("Frame failed", e));
        for event in events {
            match event {
                Event::FrameReady(frame) => last_frame = Some(frame),
                Event::AudioReady(buffer) => {
                    sample_rate = buffer.sample_rate;
                    audio.extend_from_slice(&buffer.samples);
                }
                Event::TapeBlockChanged(Some(index)) => log::info!("tape at block {index}"),
                Event::TapeBlockChanged(None) => log::info!("tape finished"),
            }
        }
    }

    if let (Some(path), Some(frame)) = (&cli.screenshot_path, &last_frame) {
        if let Err(e) = capture::save_screenshot(frame, path) {
            fail("Screenshot error", e);
        }
        eprintln!("Screenshot saved to {}", path.display());
    }

    if let Some(path) = &cli.audio_path {
        if let Err(e) = capture::save_audio(&audio, sample_rate, path) {
            fail("Audio error", e);
        }
        eprintln!("Audio saved to {}", path.display());
    }

    if let Some(path) = &cli.save_snapshot {
        let data = host
            .snapshot(handle)
            .unwrap_or_else(|e| fail("Snapshot failed", e));
        write_file(path, "Snapshot", &data);
    }

    if let Some(path) = &cli.save_z80 {
        let data = host
            .snapshot_z80(handle)
            .unwrap_or_else(|e| fail("Snapshot failed", e));
        write_file(path, "Z80 snapshot", &data);
    }
}
