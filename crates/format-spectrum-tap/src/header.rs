//! The 17-byte header block the ROM writes before every file.

/// File type byte of a ROM header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    Program,
    NumberArray,
    CharacterArray,
    Bytes,
    Other(u8),
}

impl HeaderKind {
    fn from_byte(b: u8) -> Self {
        match b {
            0 => Self::Program,
            1 => Self::NumberArray,
            2 => Self::CharacterArray,
            3 => Self::Bytes,
            n => Self::Other(n),
        }
    }

    /// Human-readable label, as shown in tape block lists.
    #[must_use]
    pub fn label(self) -> String {
        match self {
            Self::Program => "Program".into(),
            Self::NumberArray => "Number array".into(),
            Self::CharacterArray => "Character array".into(),
            Self::Bytes => "Bytes".into(),
            Self::Other(n) => format!("Type {n}"),
        }
    }
}

/// A decoded ROM header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapHeader {
    pub kind: HeaderKind,
    /// Ten-character file name, trailing padding removed.
    pub name: String,
    /// Length of the data block that follows.
    pub data_len: u16,
    /// Autostart line (programs) or load address (bytes).
    pub param1: u16,
    /// Program length without variables (programs).
    pub param2: u16,
}

impl TapHeader {
    /// Decode raw block bytes (flag + 17 bytes + checksum).
    ///
    /// Only a 19-byte block with flag `$00` is a header.
    #[must_use]
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 19 || bytes[0] != 0x00 {
            return None;
        }
        let word = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        // Names are Spectrum ASCII; anything outside printable range shows as-is.
        let name: String = bytes[2..12].iter().map(|&c| char::from(c)).collect();
        Some(Self {
            kind: HeaderKind::from_byte(bytes[1]),
            name: name.trim_end().to_string(),
            data_len: word(12),
            param1: word(14),
            param2: word(16),
        })
    }

    /// `"Program: name"` style label.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}: {}", self.kind.label(), self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TapBlock;

    fn header_block(kind: u8, name: &[u8; 10], len: u16, p1: u16) -> TapBlock {
        let mut payload = vec![kind];
        payload.extend_from_slice(name);
        payload.extend_from_slice(&len.to_le_bytes());
        payload.extend_from_slice(&p1.to_le_bytes());
        payload.extend_from_slice(&0u16.to_le_bytes());
        TapBlock::new(0x00, &payload)
    }

    #[test]
    fn decodes_program_header() {
        let block = header_block(0, b"manic     ", 1234, 10);
        let header = block.header().expect("is a header");
        assert_eq!(header.kind, HeaderKind::Program);
        assert_eq!(header.name, "manic");
        assert_eq!(header.data_len, 1234);
        assert_eq!(header.param1, 10);
        assert_eq!(header.label(), "Program: manic");
    }

    #[test]
    fn unknown_type_label() {
        let block = header_block(9, b"odd       ", 1, 0);
        assert_eq!(block.header().map(|h| h.label()), Some("Type 9: odd".into()));
    }

    #[test]
    fn data_block_is_not_a_header() {
        assert!(TapBlock::new(0xFF, &[0; 17]).header().is_none());
        assert!(TapBlock::new(0x00, &[0; 5]).header().is_none());
    }
}
