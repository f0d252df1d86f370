//! The `.Z80` run-length scheme.
//!
//! `ED ED nn bb` stands for `nn` copies of `bb`. Runs of five or more, and
//! any run of `ED`s of two or more, are encoded. A lone `ED` is written
//! literally and the byte after it is never the start of a run.

use crate::Z80SnapshotError;

/// Expand `src` into exactly `expected` bytes.
pub(crate) fn decompress(src: &[u8], expected: usize) -> Result<Vec<u8>, Z80SnapshotError> {
    let mut out = Vec::with_capacity(expected);
    let mut i = 0;
    while i < src.len() {
        if src[i] == 0xED && src.get(i + 1) == Some(&0xED) {
            let (Some(&count), Some(&value)) = (src.get(i + 2), src.get(i + 3)) else {
                return Err(Z80SnapshotError::Decompression { expected, actual: out.len() });
            };
            out.extend(std::iter::repeat_n(value, usize::from(count)));
            i += 4;
        } else {
            out.push(src[i]);
            i += 1;
        }
        if out.len() > expected {
            break;
        }
    }
    if out.len() == expected {
        Ok(out)
    } else {
        Err(Z80SnapshotError::Decompression { expected, actual: out.len() })
    }
}

pub(crate) fn compress(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    let mut i = 0;
    while i < src.len() {
        let value = src[i];
        let run = src[i..]
            .iter()
            .take(255)
            .take_while(|&&b| b == value)
            .count();

        if run >= 5 || (value == 0xED && run >= 2) {
            out.extend_from_slice(&[0xED, 0xED, run as u8, value]);
            i += run;
        } else if value == 0xED {
            // ED then one literal, so a following run cannot fuse with it.
            out.push(0xED);
            i += 1;
            if let Some(&next) = src.get(i) {
                out.push(next);
                i += 1;
            }
        } else {
            out.push(value);
            i += 1;
        }
    }
    out
}
