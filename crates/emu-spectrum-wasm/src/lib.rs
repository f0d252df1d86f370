//! Browser build of the Spectrum emulator.
//!
//! JavaScript owns one [`SpectrumSession`] per machine on the page. It calls
//! [`SpectrumSession::draw_frame`] once per display refresh and then pulls
//! the picture, the audio and any tape position changes from the session.
//! Key codes are the packed codes described in `emu_spectrum::keyboard`.

use emu_core::{Observable, Value};
use emu_spectrum::{Event, Handle, Host, RomSet, SpectrumConfig, SpectrumModel};
use wasm_bindgen::prelude::*;

/// Route `log` output to the browser console.
#[wasm_bindgen(start)]
pub fn start() {
    wasm_logger::init(wasm_logger::Config::new(log::Level::Info));
}

#[wasm_bindgen]
pub struct SpectrumSession {
    host: Host,
    handle: Handle,
    frame: Vec<u8>,
    frame_width: u32,
    frame_height: u32,
    audio: Vec<f32>,
    sample_rate: u32,
    tape_events: Vec<i32>,
}

#[wasm_bindgen]
impl SpectrumSession {
    /// Power on a machine. `rom128` holds ROM 0 followed by ROM 1; only the
    /// ROM for the chosen model is required.
    #[wasm_bindgen(constructor)]
    pub fn new(
        is128k: bool,
        rom48: Option<Vec<u8>>,
        rom128: Option<Vec<u8>>,
    ) -> Result<SpectrumSession, JsError> {
        let model = if is128k {
            SpectrumModel::Spectrum128K
        } else {
            SpectrumModel::Spectrum48K
        };
        let roms = RomSet {
            rom_48k: rom48,
            rom_128k: rom128,
        };
        let config = SpectrumConfig {
            model,
            ..SpectrumConfig::default()
        };
        let mut host = Host::new(roms, config);
        let handle = host.power_on(model)?;
        let sample_rate = host.machine(handle)?.sample_rate();
        Ok(Self {
            host,
            handle,
            frame: Vec::new(),
            frame_width: 0,
            frame_height: 0,
            audio: Vec::new(),
            sample_rate,
            tape_events: Vec::new(),
        })
    }

    /// Run one frame, or a burst of frames when `turbo` is set.
    pub fn draw_frame(&mut self, turbo: bool) -> Result<(), JsError> {
        for event in self.host.advance_frame(self.handle, turbo)? {
            match event {
                Event::FrameReady(frame) => {
                    self.frame = frame.to_rgba();
                    self.frame_width = frame.width;
                    self.frame_height = frame.height;
                }
                Event::AudioReady(buffer) => {
                    self.sample_rate = buffer.sample_rate;
                    self.audio.extend_from_slice(&buffer.samples);
                }
                Event::TapeBlockChanged(block) => self.tape_events.push(tape_index(block)),
            }
        }
        Ok(())
    }

    /// The last picture as RGBA bytes, row by row.
    pub fn frame_rgba(&self) -> Vec<u8> {
        self.frame.clone()
    }

    pub fn frame_width(&self) -> u32 {
        self.frame_width
    }

    pub fn frame_height(&self) -> u32 {
        self.frame_height
    }

    /// Samples produced since the last call, in the 0.0-1.0 range.
    pub fn take_audio(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.audio)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Tape blocks reached since the last call; -1 marks the end of the tape.
    pub fn take_tape_events(&mut self) -> Vec<i32> {
        std::mem::take(&mut self.tape_events)
    }

    pub fn key_down(&mut self, code: u32) -> Result<(), JsError> {
        Ok(self.host.key_down(self.handle, code)?)
    }

    pub fn key_up(&mut self, code: u32) -> Result<(), JsError> {
        Ok(self.host.key_up(self.handle, code)?)
    }

    pub fn reset_input(&mut self) -> Result<(), JsError> {
        Ok(self.host.reset_input(self.handle)?)
    }

    /// Power-cycle the machine, keeping its model.
    pub fn reset(&mut self) -> Result<(), JsError> {
        self.audio.clear();
        self.tape_events.clear();
        Ok(self.host.reset(self.handle)?)
    }

    /// Insert a TAP or TZX image; returns its block count.
    pub fn load_tape(&mut self, data: &[u8]) -> Result<usize, JsError> {
        Ok(self.host.load_tape(self.handle, data)?)
    }

    pub fn tape_name(&self, index: usize) -> Result<String, JsError> {
        Ok(self.host.tape_block_name(self.handle, index)?)
    }

    pub fn tape_selectable(&self, index: usize) -> Result<bool, JsError> {
        Ok(self.host.tape_block_selectable(self.handle, index)?)
    }

    pub fn tape_seek(&mut self, index: usize) -> Result<(), JsError> {
        Ok(self.host.tape_seek(self.handle, index)?)
    }

    pub fn tape_stop(&mut self) -> Result<(), JsError> {
        Ok(self.host.tape_stop(self.handle)?)
    }

    /// Load a native, SNA or Z80 snapshot; returns the model now running
    /// ("48K" or "128K").
    pub fn load_snapshot(&mut self, data: &[u8]) -> Result<String, JsError> {
        let model = self.host.load_snapshot(self.handle, data)?;
        self.sample_rate = self.host.machine(self.handle)?.sample_rate();
        Ok(model.to_string())
    }

    pub fn snapshot(&self) -> Result<Vec<u8>, JsError> {
        Ok(self.host.snapshot(self.handle)?)
    }

    /// Export in the .Z80 format.
    pub fn snapshot_z80(&self) -> Result<Vec<u8>, JsError> {
        Ok(self.host.snapshot_z80(self.handle)?)
    }

    pub fn peek(&self, addr: u16) -> Result<u8, JsError> {
        Ok(self.host.peek(self.handle, addr)?)
    }

    pub fn poke(&mut self, addr: u16, value: u8) -> Result<(), JsError> {
        Ok(self.host.poke(self.handle, addr, value)?)
    }

    /// Debugger view of machine state, e.g. `cpu.pc` or `memory.0x5C00`.
    /// Unknown paths read as `undefined`.
    pub fn query(&self, path: &str) -> Option<String> {
        let value = self.host.machine(self.handle).ok()?.query(path)?;
        Some(match value {
            Value::Bool(b) => b.to_string(),
            Value::U8(v) => v.to_string(),
            Value::U16(v) => v.to_string(),
            Value::U32(v) => v.to_string(),
            Value::U64(v) => v.to_string(),
            Value::Str(s) => s,
        })
    }
}

fn tape_index(block: Option<usize>) -> i32 {
    block.map_or(-1, |i| i32::try_from(i).unwrap_or(i32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_spectrum::ROM_SIZE;

    fn ok<T>(result: Result<T, JsError>) -> T {
        match result {
            Ok(v) => v,
            Err(_) => panic!("session call failed"),
        }
    }

    fn session() -> SpectrumSession {
        // DI; HALT
        let mut rom = vec![0u8; ROM_SIZE];
        rom[0] = 0xF3;
        rom[1] = 0x76;
        ok(SpectrumSession::new(false, Some(rom), None))
    }

    #[test]
    fn frame_and_audio_are_pulled() {
        let mut s = session();
        ok(s.draw_frame(false));
        assert_eq!(s.frame_width(), 320);
        assert_eq!(s.frame_height(), 256);
        assert_eq!(s.frame_rgba().len(), 320 * 256 * 4);
        assert_eq!(s.sample_rate(), 20833);
        assert_eq!(s.take_audio().len(), 416);
        assert!(s.take_audio().is_empty());
    }

    #[test]
    fn tape_events_are_queued() {
        let mut s = session();
        // One standard block: length 4, flag $FF, two bytes, checksum.
        let tap = [0x04, 0x00, 0xFF, 0x01, 0x02, 0xFC];
        assert_eq!(ok(s.load_tape(&tap)), 1);
        ok(s.draw_frame(false));
        assert_eq!(s.take_tape_events(), vec![0]);
        assert!(s.take_tape_events().is_empty());
    }

    #[test]
    fn query_formats_values() {
        let s = session();
        assert_eq!(s.query("model").as_deref(), Some("48K"));
        assert_eq!(s.query("cpu.sp").as_deref(), Some("65535"));
        assert_eq!(s.query("bogus"), None);
    }

    #[test]
    fn end_of_tape_is_minus_one() {
        assert_eq!(tape_index(None), -1);
        assert_eq!(tape_index(Some(3)), 3);
    }
}
