//! `.Z80` snapshots.
//!
//! **Version 1**: 30-byte header and 48K of RAM, optionally compressed and
//! terminated by `00 ED ED 00`. 48K only. Recognised by a non-zero PC.
//!
//! **Versions 2 and 3**: PC is zero in the base header and an extended
//! header follows (23 bytes for v2, 54 or 55 for v3) carrying PC, the
//! hardware mode, port `$7FFD` and the AY registers. The 55-byte form adds
//! the last `$1FFD` write at offset 86. RAM follows as 16K pages, each
//! prefixed by its compressed length (`$FFFF` = stored raw) and page number.
//!
//! [`write_z80`] produces version 3, using the 55-byte header only when a
//! `$1FFD` value needs storing.

mod rle;

use format_sna::{AyImage, BANK_SIZE, SnapshotImage, SnapshotModel, SnapshotRegisters};

const BASE_HEADER: usize = 30;
const V2_EXTENSION: u16 = 23;
const V3_EXTENSION: u16 = 54;
const V3_EXTENSION_LONG: u16 = 55;
/// Offset of the `$1FFD` byte in a 55-byte v3 header.
const PORT_1FFD: usize = 86;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Z80SnapshotError {
    #[error("file too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("unrecognised extended header length {0}")]
    ExtendedHeader(u16),
    #[error("unsupported hardware mode {mode} (version {version})")]
    Hardware { mode: u8, version: u8 },
    #[error("page {0} is not valid for this machine")]
    Page(u8),
    #[error("page {page} truncated: needs {needed} bytes, {available} remain")]
    TruncatedPage {
        page: u8,
        needed: usize,
        available: usize,
    },
    #[error("compressed data expands to {actual} bytes, expected {expected}")]
    Decompression { expected: usize, actual: usize },
    #[error("invalid interrupt mode {0}")]
    InterruptMode(u8),
}

fn word(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

/// Decode a `.Z80` file.
pub fn parse_z80(data: &[u8]) -> Result<SnapshotImage, Z80SnapshotError> {
    if data.len() < BASE_HEADER {
        return Err(Z80SnapshotError::TooShort {
            needed: BASE_HEADER,
            actual: data.len(),
        });
    }
    if word(data, 6) != 0 {
        parse_v1(data)
    } else {
        parse_extended(data)
    }
}

/// Registers and border from the 30-byte base header.
fn base_header(data: &[u8]) -> Result<(SnapshotRegisters, u8), Z80SnapshotError> {
    // Byte 12 = 255 must be read as 1 for compatibility.
    let flags1 = if data[12] == 0xFF { 1 } else { data[12] };
    let im = data[29] & 0x03;
    if im > 2 {
        return Err(Z80SnapshotError::InterruptMode(im));
    }
    let regs = SnapshotRegisters {
        a: data[0],
        f: data[1],
        c: data[2],
        b: data[3],
        l: data[4],
        h: data[5],
        pc: word(data, 6),
        sp: word(data, 8),
        i: data[10],
        r: (data[11] & 0x7F) | ((flags1 & 0x01) << 7),
        e: data[13],
        d: data[14],
        c_alt: data[15],
        b_alt: data[16],
        e_alt: data[17],
        d_alt: data[18],
        l_alt: data[19],
        h_alt: data[20],
        a_alt: data[21],
        f_alt: data[22],
        iy: word(data, 23),
        ix: word(data, 25),
        iff1: data[27] != 0,
        iff2: data[28] != 0,
        im,
    };
    Ok((regs, flags1))
}

fn parse_v1(data: &[u8]) -> Result<SnapshotImage, Z80SnapshotError> {
    let (regs, flags1) = base_header(data)?;
    let body = &data[BASE_HEADER..];
    let ram_size = 3 * BANK_SIZE;

    let ram = if flags1 & 0x20 != 0 {
        let body = body.strip_suffix([0x00u8, 0xED, 0xED, 0x00].as_slice()).unwrap_or(body);
        rle::decompress(body, ram_size)?
    } else {
        if body.len() < ram_size {
            return Err(Z80SnapshotError::TooShort {
                needed: BASE_HEADER + ram_size,
                actual: data.len(),
            });
        }
        body[..ram_size].to_vec()
    };

    let mut image = SnapshotImage::new(SnapshotModel::Spectrum48K);
    image.regs = regs;
    image.border = (flags1 >> 1) & 0x07;
    image.ram = ram;
    Ok(image)
}

fn parse_extended(data: &[u8]) -> Result<SnapshotImage, Z80SnapshotError> {
    let (mut regs, flags1) = base_header(data)?;
    if data.len() < BASE_HEADER + 2 {
        return Err(Z80SnapshotError::TooShort {
            needed: BASE_HEADER + 2,
            actual: data.len(),
        });
    }
    let ext_len = word(data, 30);
    let version = match ext_len {
        V2_EXTENSION => 2,
        V3_EXTENSION | V3_EXTENSION_LONG => 3,
        n => return Err(Z80SnapshotError::ExtendedHeader(n)),
    };
    let pages_start = BASE_HEADER + 2 + usize::from(ext_len);
    if data.len() < pages_start {
        return Err(Z80SnapshotError::TooShort {
            needed: pages_start,
            actual: data.len(),
        });
    }

    regs.pc = word(data, 32);
    let mode = data[34];
    let model = match (version, mode) {
        (2, 0 | 1) | (3, 0 | 1 | 3) => SnapshotModel::Spectrum48K,
        (2, 3 | 4) | (3, 4 | 5 | 6 | 12) => SnapshotModel::Spectrum128K,
        _ => return Err(Z80SnapshotError::Hardware { mode, version }),
    };

    let mut image = SnapshotImage::new(model);
    image.regs = regs;
    image.border = (flags1 >> 1) & 0x07;
    if model == SnapshotModel::Spectrum128K {
        image.port_7ffd = data[35];
        if ext_len == V3_EXTENSION_LONG {
            image.port_1ffd = data[PORT_1FFD];
        }
    }
    if model == SnapshotModel::Spectrum128K || data[37] & 0x04 != 0 {
        let mut registers = [0; 16];
        registers.copy_from_slice(&data[39..55]);
        image.ay = Some(AyImage {
            selected: data[38] & 0x0F,
            registers,
        });
    }

    let mut pos = pages_start;
    while pos < data.len() {
        if data.len() - pos < 3 {
            return Err(Z80SnapshotError::TooShort {
                needed: pos + 3,
                actual: data.len(),
            });
        }
        let len = word(data, pos);
        let page = data[pos + 2];
        pos += 3;

        let stored = if len == 0xFFFF { BANK_SIZE } else { usize::from(len) };
        if data.len() - pos < stored {
            return Err(Z80SnapshotError::TruncatedPage {
                page,
                needed: stored,
                available: data.len() - pos,
            });
        }
        let raw = &data[pos..pos + stored];
        pos += stored;

        let bank = page_to_bank(model, page).ok_or(Z80SnapshotError::Page(page))?;
        log::debug!("Z80: page {page} -> bank {bank}, {stored} bytes");
        if len == 0xFFFF {
            image.bank_mut(bank).copy_from_slice(raw);
        } else {
            let expanded = rle::decompress(raw, BANK_SIZE)?;
            image.bank_mut(bank).copy_from_slice(&expanded);
        }
    }

    Ok(image)
}

fn page_to_bank(model: SnapshotModel, page: u8) -> Option<usize> {
    match model {
        SnapshotModel::Spectrum48K => match page {
            8 => Some(0),
            4 => Some(1),
            5 => Some(2),
            _ => None,
        },
        SnapshotModel::Spectrum128K => (3..=10).contains(&page).then(|| usize::from(page - 3)),
    }
}

/// Encode an image as a version 3 `.Z80` file with compressed pages.
#[must_use]
pub fn write_z80(image: &SnapshotImage) -> Vec<u8> {
    let regs = &image.regs;
    let is_128k = image.model == SnapshotModel::Spectrum128K;
    let extension = if is_128k && image.port_1ffd != 0 {
        V3_EXTENSION_LONG
    } else {
        V3_EXTENSION
    };
    let mut out = vec![0u8; BASE_HEADER + 2 + usize::from(extension)];

    out[0] = regs.a;
    out[1] = regs.f;
    out[2] = regs.c;
    out[3] = regs.b;
    out[4] = regs.l;
    out[5] = regs.h;
    // PC = 0 marks an extended header.
    out[8..10].copy_from_slice(&regs.sp.to_le_bytes());
    out[10] = regs.i;
    out[11] = regs.r & 0x7F;
    out[12] = (regs.r >> 7) | ((image.border & 0x07) << 1);
    out[13] = regs.e;
    out[14] = regs.d;
    out[15] = regs.c_alt;
    out[16] = regs.b_alt;
    out[17] = regs.e_alt;
    out[18] = regs.d_alt;
    out[19] = regs.l_alt;
    out[20] = regs.h_alt;
    out[21] = regs.a_alt;
    out[22] = regs.f_alt;
    out[23..25].copy_from_slice(&regs.iy.to_le_bytes());
    out[25..27].copy_from_slice(&regs.ix.to_le_bytes());
    out[27] = u8::from(regs.iff1);
    out[28] = u8::from(regs.iff2);
    out[29] = regs.im & 0x03;

    out[30..32].copy_from_slice(&extension.to_le_bytes());
    out[32..34].copy_from_slice(&regs.pc.to_le_bytes());
    out[34] = match image.model {
        SnapshotModel::Spectrum48K => 0,
        SnapshotModel::Spectrum128K => 4,
    };
    if is_128k {
        out[35] = image.port_7ffd;
    }
    if extension == V3_EXTENSION_LONG {
        out[PORT_1FFD] = image.port_1ffd;
    }
    if let Some(ay) = &image.ay {
        if image.model == SnapshotModel::Spectrum48K {
            out[37] |= 0x04;
        }
        out[38] = ay.selected;
        out[39..55].copy_from_slice(&ay.registers);
    }

    let pages: &[(u8, usize)] = match image.model {
        SnapshotModel::Spectrum48K => &[(8, 0), (4, 1), (5, 2)],
        SnapshotModel::Spectrum128K => &[
            (3, 0),
            (4, 1),
            (5, 2),
            (6, 3),
            (7, 4),
            (8, 5),
            (9, 6),
            (10, 7),
        ],
    };
    for &(page, bank) in pages {
        let packed = rle::compress(image.bank(bank));
        if packed.len() < BANK_SIZE {
            out.extend_from_slice(&(packed.len() as u16).to_le_bytes());
            out.push(page);
            out.extend_from_slice(&packed);
        } else {
            out.extend_from_slice(&0xFFFFu16.to_le_bytes());
            out.push(page);
            out.extend_from_slice(image.bank(bank));
        }
    }
    out
}
