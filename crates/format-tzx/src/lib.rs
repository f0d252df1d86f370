//! TZX tape image parser.
//!
//! TZX describes a tape as T-state accurate pulse programs rather than raw
//! bytes, which lets it carry turbo loaders and protection schemes that a
//! TAP file cannot. A file is a 10-byte header (`"ZXTape!"`, `$1A`, major,
//! minor) followed by blocks, each introduced by an ID byte.
//!
//! Reference: <https://worldofspectrum.net/TZXformat.html>

mod reader;

use reader::Reader;

/// TZX header magic: `"ZXTape!"` + `$1A`.
pub const MAGIC: &[u8; 8] = b"ZXTape!\x1A";

/// Errors while reading a TZX image.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TzxError {
    #[error("file too short for a TZX header")]
    TooShort,
    #[error("missing ZXTape! signature")]
    BadMagic,
    #[error("truncated {what} at offset {offset}: need {needed} bytes, {remaining} remain")]
    Truncated {
        what: &'static str,
        offset: usize,
        needed: usize,
        remaining: usize,
    },
    #[error("unknown block ${id:02X} at offset {offset} has no length")]
    UnknownBlock { id: u8, offset: usize },
}

/// A parsed TZX file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TzxFile {
    pub major: u8,
    pub minor: u8,
    pub blocks: Vec<TzxBlock>,
}

/// One TZX block. Blocks the player has no use for are kept as `Skipped`
/// so indices in diagnostics still line up with the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TzxBlock {
    /// $10: ROM-timed data.
    StandardSpeed { pause_ms: u16, data: Vec<u8> },
    /// $11: data with custom pilot, sync and bit timings.
    TurboSpeed {
        pilot_pulse: u16,
        sync1: u16,
        sync2: u16,
        zero_pulse: u16,
        one_pulse: u16,
        pilot_count: u16,
        used_bits: u8,
        pause_ms: u16,
        data: Vec<u8>,
    },
    /// $12: `count` pulses of one length.
    PureTone { pulse_len: u16, count: u16 },
    /// $13: arbitrary pulse lengths.
    PulseSequence { pulses: Vec<u16> },
    /// $14: data bits with no pilot or sync.
    PureData {
        zero_pulse: u16,
        one_pulse: u16,
        used_bits: u8,
        pause_ms: u16,
        data: Vec<u8>,
    },
    /// $20: silence; zero means "stop the tape".
    Pause { duration_ms: u16 },
    /// $21
    GroupStart { name: String },
    /// $22
    GroupEnd,
    /// $24
    LoopStart { repetitions: u16 },
    /// $25
    LoopEnd,
    /// $2A: stop the tape when running in 48K mode.
    StopIf48K,
    /// $2B
    SetSignalLevel { level: bool },
    /// $30
    TextDescription { text: String },
    /// $32: (id, text) pairs; id 0 is the title.
    ArchiveInfo { entries: Vec<(u8, String)> },
    /// A recognised block with nothing to play, skipped by length.
    Skipped { id: u8 },
}

impl TzxFile {
    /// Parse a TZX image.
    pub fn parse(data: &[u8]) -> Result<Self, TzxError> {
        if data.len() < 10 {
            return Err(TzxError::TooShort);
        }
        if &data[0..8] != MAGIC {
            return Err(TzxError::BadMagic);
        }

        let mut r = Reader::new(data, 10);
        let mut blocks = Vec::new();
        while !r.is_empty() {
            let offset = r.pos();
            let id = r.u8("block id")?;
            let block = parse_block(id, offset, &mut r)?;
            log::debug!("TZX: block ${id:02X} at {offset}");
            blocks.push(block);
        }

        Ok(Self {
            major: data[8],
            minor: data[9],
            blocks,
        })
    }

    /// The archive title (archive info entry 0), if any.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.blocks.iter().find_map(|b| match b {
            TzxBlock::ArchiveInfo { entries } => entries
                .iter()
                .find(|(id, _)| *id == 0)
                .map(|(_, text)| text.as_str()),
            _ => None,
        })
    }
}

fn parse_block(id: u8, offset: usize, r: &mut Reader<'_>) -> Result<TzxBlock, TzxError> {
    let block = match id {
        0x10 => {
            let pause_ms = r.u16("standard speed header")?;
            let len = usize::from(r.u16("standard speed header")?);
            TzxBlock::StandardSpeed {
                pause_ms,
                data: r.bytes(len, "standard speed data")?.to_vec(),
            }
        }
        0x11 => {
            const WHAT: &str = "turbo speed header";
            let pilot_pulse = r.u16(WHAT)?;
            let sync1 = r.u16(WHAT)?;
            let sync2 = r.u16(WHAT)?;
            let zero_pulse = r.u16(WHAT)?;
            let one_pulse = r.u16(WHAT)?;
            let pilot_count = r.u16(WHAT)?;
            let used_bits = r.u8(WHAT)?;
            let pause_ms = r.u16(WHAT)?;
            let len = r.u24(WHAT)? as usize;
            TzxBlock::TurboSpeed {
                pilot_pulse,
                sync1,
                sync2,
                zero_pulse,
                one_pulse,
                pilot_count,
                used_bits,
                pause_ms,
                data: r.bytes(len, "turbo speed data")?.to_vec(),
            }
        }
        0x12 => TzxBlock::PureTone {
            pulse_len: r.u16("pure tone")?,
            count: r.u16("pure tone")?,
        },
        0x13 => {
            let count = r.u8("pulse sequence")?;
            let pulses = (0..count)
                .map(|_| r.u16("pulse sequence"))
                .collect::<Result<_, _>>()?;
            TzxBlock::PulseSequence { pulses }
        }
        0x14 => {
            const WHAT: &str = "pure data header";
            let zero_pulse = r.u16(WHAT)?;
            let one_pulse = r.u16(WHAT)?;
            let used_bits = r.u8(WHAT)?;
            let pause_ms = r.u16(WHAT)?;
            let len = r.u24(WHAT)? as usize;
            TzxBlock::PureData {
                zero_pulse,
                one_pulse,
                used_bits,
                pause_ms,
                data: r.bytes(len, "pure data")?.to_vec(),
            }
        }
        0x20 => TzxBlock::Pause {
            duration_ms: r.u16("pause")?,
        },
        0x21 => TzxBlock::GroupStart {
            name: r.text("group name")?,
        },
        0x22 => TzxBlock::GroupEnd,
        0x24 => TzxBlock::LoopStart {
            repetitions: r.u16("loop start")?,
        },
        0x25 => TzxBlock::LoopEnd,
        0x2A => {
            let len = r.u32("stop if 48K")? as usize;
            r.skip(len, "stop if 48K")?;
            TzxBlock::StopIf48K
        }
        0x2B => {
            let len = r.u32("signal level")? as usize;
            let body = r.bytes(len, "signal level")?;
            TzxBlock::SetSignalLevel {
                level: body.first().is_some_and(|&b| b != 0),
            }
        }
        0x30 => TzxBlock::TextDescription {
            text: r.text("text description")?,
        },
        0x32 => {
            let len = usize::from(r.u16("archive info")?);
            let body = r.bytes(len, "archive info")?;
            TzxBlock::ArchiveInfo {
                entries: archive_entries(body),
            }
        }
        _ => {
            skip_block(id, offset, r)?;
            log::warn!("TZX: skipping unsupported block ${id:02X} at offset {offset}");
            TzxBlock::Skipped { id }
        }
    };
    Ok(block)
}

/// Entries past the end of a short archive-info body are dropped.
fn archive_entries(body: &[u8]) -> Vec<(u8, String)> {
    let Some((&count, mut rest)) = body.split_first() else {
        return Vec::new();
    };
    let mut entries = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let [id, len, tail @ ..] = rest else { break };
        let len = usize::from(*len).min(tail.len());
        entries.push((*id, String::from_utf8_lossy(&tail[..len]).into_owned()));
        rest = &tail[len..];
    }
    entries
}

/// Step over a block the player ignores, using its documented length layout.
fn skip_block(id: u8, offset: usize, r: &mut Reader<'_>) -> Result<(), TzxError> {
    const WHAT: &str = "skipped block";
    match id {
        // Direct recording: 5 bytes of timing, then a u24 length.
        0x15 => {
            r.skip(5, WHAT)?;
            let len = r.u24(WHAT)? as usize;
            r.skip(len, WHAT)
        }
        // C64 ROM/turbo data, CSW recording, generalized data.
        0x16..=0x19 => {
            let len = r.u32(WHAT)? as usize;
            r.skip(len, WHAT)
        }
        // Jump to block.
        0x23 => r.skip(2, WHAT),
        // Call sequence.
        0x26 => {
            let count = usize::from(r.u16(WHAT)?);
            r.skip(count * 2, WHAT)
        }
        // Return from sequence.
        0x27 => Ok(()),
        // Select block.
        0x28 => {
            let len = usize::from(r.u16(WHAT)?);
            r.skip(len, WHAT)
        }
        // Message block: display time, then text.
        0x31 => {
            r.skip(1, WHAT)?;
            r.text(WHAT).map(|_| ())
        }
        // Hardware type.
        0x33 => {
            let count = usize::from(r.u8(WHAT)?);
            r.skip(count * 3, WHAT)
        }
        // Emulation info.
        0x34 => r.skip(8, WHAT),
        // Custom info: 16-byte id, u32 length.
        0x35 => {
            r.skip(16, WHAT)?;
            let len = r.u32(WHAT)? as usize;
            r.skip(len, WHAT)
        }
        // Snapshot: type byte, u24 length.
        0x40 => {
            r.skip(1, WHAT)?;
            let len = r.u24(WHAT)? as usize;
            r.skip(len, WHAT)
        }
        // Glue block from concatenated files.
        0x5A => r.skip(9, WHAT),
        // Extension rule: unknown blocks start with a u32 length.
        _ => match r.peek_u32() {
            Some(len) => {
                r.skip(4, WHAT)?;
                r.skip(len as usize, WHAT)
            }
            None => Err(TzxError::UnknownBlock { id, offset }),
        },
    }
}
