//! SNA snapshots.
//!
//! **48K** (49,179 bytes): 27-byte register header and the 48K of RAM from
//! `$4000`. PC is not stored; it sits on the stack and is popped on load.
//!
//! **128K** (131,103 or 147,487 bytes): header, then banks 5, 2 and the
//! paged bank, a 4-byte extension (PC, port `$7FFD`, TR-DOS flag), then the
//! remaining banks in ascending order. When the paged bank is 2 or 5 it is
//! stored twice and six banks follow instead of five.

use crate::image::{BANK_SIZE, SnapshotImage, SnapshotModel, SnapshotRegisters};

pub const SNA_48K_SIZE: usize = 49_179;
pub const SNA_128K_SIZE: usize = 131_103;
/// 128K snapshot whose paged bank is 2 or 5.
pub const SNA_128K_SIZE_DUP: usize = 147_487;

const HEADER_SIZE: usize = 27;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnaError {
    #[error("SNA file must be {SNA_48K_SIZE}, {SNA_128K_SIZE} or {SNA_128K_SIZE_DUP} bytes, got {0}")]
    WrongSize(usize),
    #[error("stack pointer ${0:04X} does not point into RAM")]
    StackOutsideRam(u16),
    #[error("invalid interrupt mode {0}")]
    InterruptMode(u8),
    #[error("128K SNA paging bank {bank} needs {expected} bytes, got {actual}")]
    BankLayout {
        bank: u8,
        expected: usize,
        actual: usize,
    },
}

/// Decode an SNA file.
pub fn parse_sna(data: &[u8]) -> Result<SnapshotImage, SnaError> {
    match data.len() {
        SNA_48K_SIZE => parse_48k(data),
        SNA_128K_SIZE | SNA_128K_SIZE_DUP => parse_128k(data),
        n => Err(SnaError::WrongSize(n)),
    }
}

fn word(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn header(data: &[u8]) -> Result<(SnapshotRegisters, u8), SnaError> {
    let im = data[25];
    if im > 2 {
        return Err(SnaError::InterruptMode(im));
    }
    let iff = data[19] & 0x04 != 0;
    let regs = SnapshotRegisters {
        i: data[0],
        l_alt: data[1],
        h_alt: data[2],
        e_alt: data[3],
        d_alt: data[4],
        c_alt: data[5],
        b_alt: data[6],
        f_alt: data[7],
        a_alt: data[8],
        l: data[9],
        h: data[10],
        e: data[11],
        d: data[12],
        c: data[13],
        b: data[14],
        iy: word(data, 15),
        ix: word(data, 17),
        iff1: iff,
        iff2: iff,
        r: data[20],
        f: data[21],
        a: data[22],
        sp: word(data, 23),
        im,
        pc: 0,
    };
    Ok((regs, data[26] & 0x07))
}

fn parse_48k(data: &[u8]) -> Result<SnapshotImage, SnaError> {
    let (mut regs, border) = header(data)?;
    let mut image = SnapshotImage::new(SnapshotModel::Spectrum48K);
    image.ram.copy_from_slice(&data[HEADER_SIZE..]);

    let sp = regs.sp;
    let (Some(lo), Some(hi)) = (image.read(sp), image.read(sp.wrapping_add(1))) else {
        return Err(SnaError::StackOutsideRam(sp));
    };
    regs.pc = u16::from_le_bytes([lo, hi]);
    regs.sp = sp.wrapping_add(2);

    image.regs = regs;
    image.border = border;
    Ok(image)
}

fn parse_128k(data: &[u8]) -> Result<SnapshotImage, SnaError> {
    let (mut regs, border) = header(data)?;
    let ext = HEADER_SIZE + 3 * BANK_SIZE;
    regs.pc = word(data, ext);
    let port_7ffd = data[ext + 2];
    let paged = port_7ffd & 0x07;

    let rest: Vec<usize> = (0..8)
        .filter(|&b| b != 5 && b != 2 && b != usize::from(paged))
        .collect();
    let expected = ext + 4 + rest.len() * BANK_SIZE;
    if data.len() != expected {
        return Err(SnaError::BankLayout {
            bank: paged,
            expected,
            actual: data.len(),
        });
    }

    let mut image = SnapshotImage::new(SnapshotModel::Spectrum128K);
    let chunk = |n: usize| &data[HEADER_SIZE + n * BANK_SIZE..HEADER_SIZE + (n + 1) * BANK_SIZE];
    image.bank_mut(5).copy_from_slice(chunk(0));
    image.bank_mut(2).copy_from_slice(chunk(1));
    image.bank_mut(usize::from(paged)).copy_from_slice(chunk(2));

    let mut pos = ext + 4;
    for bank in rest {
        image.bank_mut(bank).copy_from_slice(&data[pos..pos + BANK_SIZE]);
        pos += BANK_SIZE;
    }

    image.regs = regs;
    image.border = border;
    image.port_7ffd = port_7ffd;
    Ok(image)
}
