//! ZIP-wrapped media.
//!
//! Tapes and snapshots are usually distributed zipped. A loader hands its
//! bytes here when they start with a local file header; the first entry
//! whose name ends in one of the wanted extensions is unpacked and parsed
//! as if it had been loaded directly. Archives inside archives are not
//! followed.

use crate::error::ArchiveError;

/// Local file header signature.
pub const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// Largest entry unpacked: well above any tape or 128K snapshot.
#[cfg_attr(not(feature = "zip"), allow(dead_code))]
const MAX_ENTRY: u64 = 8 * 1024 * 1024;

pub const TAPE_EXTENSIONS: &[&str] = &[".tap", ".tzx"];
pub const SNAPSHOT_EXTENSIONS: &[&str] = &[".z80", ".sna"];

#[must_use]
pub fn is_zip(data: &[u8]) -> bool {
    data.starts_with(ZIP_MAGIC)
}

/// Unpack the first entry named with one of `extensions` (lower case,
/// with the dot).
#[cfg(feature = "zip")]
pub fn extract(data: &[u8], extensions: &[&str]) -> Result<Vec<u8>, ArchiveError> {
    use std::io::{Cursor, Read};

    let mut archive = zip::ZipArchive::new(Cursor::new(data))?;
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        let name = entry.name().to_owned();
        let lower = name.to_ascii_lowercase();
        if entry.is_dir() || !extensions.iter().any(|ext| lower.ends_with(ext)) {
            continue;
        }
        if entry.size() > MAX_ENTRY {
            return Err(ArchiveError::TooLarge {
                name,
                size: entry.size(),
            });
        }

        // The declared size can't be trusted; stop one byte past the cap.
        let mut out = Vec::new();
        entry.take(MAX_ENTRY + 1).read_to_end(&mut out)?;
        if out.len() as u64 > MAX_ENTRY {
            return Err(ArchiveError::TooLarge {
                name,
                size: out.len() as u64,
            });
        }
        log::info!("unzipped {name} ({} bytes)", out.len());
        return Ok(out);
    }
    Err(ArchiveError::NoMedia(extensions.join(", ")))
}

#[cfg(not(feature = "zip"))]
pub fn extract(_data: &[u8], _extensions: &[&str]) -> Result<Vec<u8>, ArchiveError> {
    Err(ArchiveError::Unsupported)
}
