//! Machine-level errors.

use format_sna::SnaError;
use format_spectrum_tap::TapError;
use format_tzx::TzxError;
use format_z80::Z80SnapshotError;

use crate::config::SpectrumModel;

/// Why a ZIP-wrapped tape or snapshot could not be unpacked.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[cfg(feature = "zip")]
    #[error("ZIP: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("reading entry: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive holds no {0} entry")]
    NoMedia(String),
    #[error("entry {name} is too large ({size} bytes)")]
    TooLarge { name: String, size: u64 },
    #[error("ZIP support is not built in")]
    Unsupported,
}

/// Why a tape image could not be read.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("TAP: {0}")]
    Tap(#[from] TapError),
    #[error("TZX: {0}")]
    Tzx(#[from] TzxError),
    #[error("{0}")]
    Archive(#[from] ArchiveError),
    #[error("tape holds no playable blocks")]
    Empty,
}

/// Why a snapshot could not be read.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("SNA: {0}")]
    Sna(#[from] SnaError),
    #[error("Z80: {0}")]
    Z80(#[from] Z80SnapshotError),
    #[error("{0}")]
    Archive(#[from] ArchiveError),
    #[error("unsupported native snapshot version {0}")]
    Version(u16),
    #[error("unknown machine variant {0}")]
    Variant(u8),
    #[error("payload length {declared} does not match the {actual} bytes present")]
    Length { declared: usize, actual: usize },
    #[error("checksum mismatch: header {expected:08X}, payload {actual:08X}")]
    Checksum { expected: u32, actual: u32 },
    #[error("payload: {0}")]
    Payload(#[from] bincode::Error),
    #[error("payload does not fit a {0}")]
    Inconsistent(SpectrumModel),
}

#[derive(Debug, thiserror::Error)]
pub enum SpectrumError {
    #[error("corrupt tape: {0}")]
    CorruptContainer(#[from] ContainerError),
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(#[from] SnapshotError),
    #[error("block {index} out of range (tape has {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("block {0} cannot be selected")]
    BlockNotSelectable(usize),
    #[error("unknown or dropped machine handle")]
    UnknownHandle,
    #[error("{model} ROM: expected {expected} bytes, got {actual}")]
    InvalidRom {
        model: SpectrumModel,
        expected: usize,
        actual: usize,
    },
}
