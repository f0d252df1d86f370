//! Snapshots: the native format and .SNA / .Z80 interchange.
//!
//! # Native format
//!
//! | Offset | Size | Field                              |
//! |--------|------|------------------------------------|
//! | 0      | 4    | magic `ZXSN`                       |
//! | 4      | 2    | format version (LE)                |
//! | 6      | 1    | variant: 0 = 48K, 1 = 128K         |
//! | 7      | 4    | payload length (LE)                |
//! | 11     | 4    | CRC-32 of the payload (LE)         |
//! | 15     | n    | bincode-encoded [`MachineState`]   |
//!
//! Everything is checked before anything is built, so a bad snapshot
//! never touches a running machine. That includes the internal state of
//! every chip: a payload with a good checksum can still carry a ring
//! index or register number that would be out of range once running.

#![allow(clippy::cast_possible_truncation)]

use format_sna::{
    AyImage, SNA_48K_SIZE, SNA_128K_SIZE, SNA_128K_SIZE_DUP, SnapshotImage, SnapshotModel,
    SnapshotRegisters, parse_sna,
};
use format_z80::parse_z80;
use gi_ay_3_8910::Ay3_8910;
use serde::{Deserialize, Serialize};
use sinclair_ula::Ula;
use zilog_z80::{Registers, Z80State};

use crate::archive;
use crate::audio::Speaker;
use crate::config::SpectrumModel;
use crate::error::SnapshotError;
use crate::keyboard::InputState;
use crate::memory::{BANK_SIZE, Memory};

pub const MAGIC: &[u8; 4] = b"ZXSN";
pub const VERSION: u16 = 2;
const HEADER_LEN: usize = 15;

/// Everything needed to resume a machine, except ROM and tape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineState {
    pub model: SpectrumModel,
    pub cpu: Z80State,
    pub memory: Memory,
    pub ula: Ula,
    pub ay: Option<Ay3_8910>,
    pub input: InputState,
    pub speaker: Speaker,
    pub fe_latch: u8,
    /// T-states already run into the next frame.
    pub frame_t: u32,
    pub ay_phase: u32,
}

impl MachineState {
    /// Serialize into a native snapshot.
    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        let payload = bincode::serialize(self)?;
        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&VERSION.to_le_bytes());
        out.push(self.model.id());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Read a native snapshot. `data` must start with [`MAGIC`].
    pub fn decode(data: &[u8]) -> Result<Self, SnapshotError> {
        let header = data.get(..HEADER_LEN).ok_or(SnapshotError::Length {
            declared: HEADER_LEN,
            actual: data.len(),
        })?;
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(SnapshotError::Version(version));
        }
        let model = SpectrumModel::from_id(header[6]).ok_or(SnapshotError::Variant(header[6]))?;
        let declared = u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;
        let expected = u32::from_le_bytes([header[11], header[12], header[13], header[14]]);

        let payload = &data[HEADER_LEN..];
        if payload.len() != declared {
            return Err(SnapshotError::Length {
                declared,
                actual: payload.len(),
            });
        }
        let actual = crc32fast::hash(payload);
        if actual != expected {
            return Err(SnapshotError::Checksum { expected, actual });
        }

        let state: Self = bincode::deserialize(payload)?;
        if !state.fits(model) {
            return Err(SnapshotError::Inconsistent(model));
        }
        Ok(state)
    }

    fn fits(&self, model: SpectrumModel) -> bool {
        let timing = model.timing();
        self.model == model
            && self.memory.model() == model
            && self.memory.ram().len() == model.ram_banks() * BANK_SIZE
            && self.memory.is_valid()
            && *self.ula.timing() == timing
            && self.ula.is_valid()
            && self.ay.is_some() == model.is_128k()
            && self.ay.as_ref().is_none_or(Ay3_8910::is_valid)
            && self.speaker.is_valid()
            && self.cpu.regs.im <= 2
            && self.frame_t < timing.tstates_per_line
            && self.ay_phase < 2
    }
}

/// A snapshot in any supported format, validated and ready to apply.
#[derive(Debug, Clone)]
pub enum Snapshot {
    Native(Box<MachineState>),
    Image(SnapshotImage),
}

impl Snapshot {
    /// Detect the format and decode: native by its magic, SNA by its
    /// size, Z80 otherwise. A ZIP is unwrapped first.
    pub fn parse(data: &[u8]) -> Result<Self, SnapshotError> {
        if archive::is_zip(data) {
            let inner = archive::extract(data, archive::SNAPSHOT_EXTENSIONS)?;
            return Self::parse_image(&inner);
        }
        Self::parse_image(data)
    }

    fn parse_image(data: &[u8]) -> Result<Self, SnapshotError> {
        if data.starts_with(MAGIC) {
            return Ok(Self::Native(Box::new(MachineState::decode(data)?)));
        }
        let image = match data.len() {
            SNA_48K_SIZE | SNA_128K_SIZE | SNA_128K_SIZE_DUP => parse_sna(data)?,
            _ => parse_z80(data)?,
        };
        Ok(Self::Image(image))
    }

    #[must_use]
    pub fn model(&self) -> SpectrumModel {
        match self {
            Self::Native(state) => state.model,
            Self::Image(image) => model_of(image),
        }
    }
}

#[must_use]
pub fn model_of(image: &SnapshotImage) -> SpectrumModel {
    match image.model {
        SnapshotModel::Spectrum48K => SpectrumModel::Spectrum48K,
        SnapshotModel::Spectrum128K => SpectrumModel::Spectrum128K,
    }
}

#[must_use]
pub fn image_model(model: SpectrumModel) -> SnapshotModel {
    match model {
        SpectrumModel::Spectrum48K => SnapshotModel::Spectrum48K,
        SpectrumModel::Spectrum128K => SnapshotModel::Spectrum128K,
    }
}

#[must_use]
pub fn registers_from_image(r: &SnapshotRegisters) -> Registers {
    Registers {
        a: r.a,
        f: r.f,
        b: r.b,
        c: r.c,
        d: r.d,
        e: r.e,
        h: r.h,
        l: r.l,
        a_alt: r.a_alt,
        f_alt: r.f_alt,
        b_alt: r.b_alt,
        c_alt: r.c_alt,
        d_alt: r.d_alt,
        e_alt: r.e_alt,
        h_alt: r.h_alt,
        l_alt: r.l_alt,
        ix: r.ix,
        iy: r.iy,
        sp: r.sp,
        pc: r.pc,
        i: r.i,
        r: r.r,
        wz: 0,
        iff1: r.iff1,
        iff2: r.iff2,
        im: r.im,
        halted: false,
    }
}

/// Interchange formats have no halt flag: a halted CPU is stored with PC
/// back on its HALT so it halts again when resumed.
#[must_use]
pub fn registers_to_image(r: &Registers) -> SnapshotRegisters {
    let pc = if r.halted { r.pc.wrapping_sub(1) } else { r.pc };
    SnapshotRegisters {
        a: r.a,
        f: r.f,
        b: r.b,
        c: r.c,
        d: r.d,
        e: r.e,
        h: r.h,
        l: r.l,
        a_alt: r.a_alt,
        f_alt: r.f_alt,
        b_alt: r.b_alt,
        c_alt: r.c_alt,
        d_alt: r.d_alt,
        e_alt: r.e_alt,
        h_alt: r.h_alt,
        l_alt: r.l_alt,
        ix: r.ix,
        iy: r.iy,
        sp: r.sp,
        pc,
        i: r.i,
        r: r.r,
        iff1: r.iff1,
        iff2: r.iff2,
        im: r.im,
    }
}

/// The AY as stored in an image.
#[must_use]
pub fn ay_image(ay: &Ay3_8910) -> AyImage {
    AyImage {
        selected: ay.selected_register(),
        registers: ay.registers(),
    }
}
