//! ZX Spectrum TAP tape images.
//!
//! A TAP file is a run of blocks, each preceded by a little-endian `u16`
//! length. A block as saved by the ROM is a flag byte (`$00` header, `$FF`
//! data), the payload and an XOR checksum over flag and payload. Blocks are
//! kept byte-for-byte: a tape loader sees exactly what was recorded, bad
//! checksums included.

mod header;

pub use header::{HeaderKind, TapHeader};

/// Errors while reading a TAP image.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TapError {
    #[error("truncated length word at offset {offset}")]
    TruncatedLength { offset: usize },
    #[error("block at offset {offset} needs {needed} bytes, only {available} remain")]
    TruncatedBlock {
        offset: usize,
        needed: usize,
        available: usize,
    },
}

/// One recorded block: flag, payload and checksum as they appear on tape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapBlock {
    bytes: Vec<u8>,
}

impl TapBlock {
    /// Wrap raw block bytes (flag + payload + checksum).
    #[must_use]
    pub fn from_raw(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Build a block the way the ROM SAVE routine would, checksum included.
    #[must_use]
    pub fn new(flag: u8, payload: &[u8]) -> Self {
        let checksum = payload.iter().fold(flag, |acc, &b| acc ^ b);
        let mut bytes = Vec::with_capacity(payload.len() + 2);
        bytes.push(flag);
        bytes.extend_from_slice(payload);
        bytes.push(checksum);
        Self { bytes }
    }

    /// Everything recorded for this block.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn flag(&self) -> Option<u8> {
        self.bytes.first().copied()
    }

    /// The bytes between flag and checksum.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        if self.bytes.len() < 2 {
            &[]
        } else {
            &self.bytes[1..self.bytes.len() - 1]
        }
    }

    /// XOR of every recorded byte is zero for an intact block.
    #[must_use]
    pub fn checksum_ok(&self) -> bool {
        !self.bytes.is_empty() && self.bytes.iter().fold(0, |acc, &b| acc ^ b) == 0
    }

    /// Decode the block as a ROM header, if it is one.
    #[must_use]
    pub fn header(&self) -> Option<TapHeader> {
        TapHeader::parse(&self.bytes)
    }
}

/// A parsed TAP image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TapFile {
    pub blocks: Vec<TapBlock>,
}

impl TapFile {
    /// Parse a TAP image. Zero-length blocks carry nothing and are dropped.
    pub fn parse(data: &[u8]) -> Result<Self, TapError> {
        let mut blocks = Vec::new();
        let mut offset = 0;

        while offset < data.len() {
            if offset + 2 > data.len() {
                return Err(TapError::TruncatedLength { offset });
            }
            let len = usize::from(u16::from_le_bytes([data[offset], data[offset + 1]]));
            let start = offset + 2;
            if start + len > data.len() {
                return Err(TapError::TruncatedBlock {
                    offset,
                    needed: len,
                    available: data.len() - start,
                });
            }

            if len == 0 {
                log::debug!("TAP: skipping empty block at offset {offset}");
            } else {
                let block = TapBlock::from_raw(data[start..start + len].to_vec());
                if !block.checksum_ok() {
                    log::warn!("TAP: block at offset {offset} has a bad checksum");
                }
                blocks.push(block);
            }
            offset = start + len;
        }

        Ok(Self { blocks })
    }

    /// Serialise back to TAP bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for block in &self.blocks {
            out.extend_from_slice(&(block.bytes.len() as u16).to_le_bytes());
            out.extend_from_slice(&block.bytes);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_file() {
        let tap = TapFile::parse(&[]).expect("empty image is valid");
        assert!(tap.blocks.is_empty());
    }

    #[test]
    fn new_block_has_valid_checksum() {
        let block = TapBlock::new(0xFF, &[1, 2, 3]);
        assert_eq!(block.bytes(), &[0xFF, 1, 2, 3, 0xFF ^ 1 ^ 2 ^ 3]);
        assert!(block.checksum_ok());
        assert_eq!(block.flag(), Some(0xFF));
        assert_eq!(block.payload(), &[1, 2, 3]);
    }

    #[test]
    fn bad_checksum_is_kept() {
        let data = [3, 0, 0xFF, 0x01, 0x00];
        let tap = TapFile::parse(&data).expect("bad checksum still parses");
        assert_eq!(tap.blocks.len(), 1);
        assert!(!tap.blocks[0].checksum_ok());
    }

    #[test]
    fn truncated_length_word() {
        assert_eq!(
            TapFile::parse(&[0x05]),
            Err(TapError::TruncatedLength { offset: 0 })
        );
    }

    #[test]
    fn truncated_block() {
        let err = TapFile::parse(&[0x05, 0x00, 0xFF, 0x01]).unwrap_err();
        assert_eq!(
            err,
            TapError::TruncatedBlock {
                offset: 0,
                needed: 5,
                available: 2
            }
        );
    }

    #[test]
    fn empty_blocks_are_dropped() {
        let mut data = vec![0, 0];
        data.extend(TapFile { blocks: vec![TapBlock::new(0xFF, &[7])] }.to_bytes());
        let tap = TapFile::parse(&data).expect("valid");
        assert_eq!(tap.blocks.len(), 1);
    }

    #[test]
    fn to_bytes_round_trips() {
        let tap = TapFile {
            blocks: vec![TapBlock::new(0x00, &[0; 17]), TapBlock::new(0xFF, &[1, 2])],
        };
        assert_eq!(TapFile::parse(&tap.to_bytes()).expect("valid"), tap);
    }
}
