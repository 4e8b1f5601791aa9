//! Minimal ISO9660 reader: maps every file in an image to its byte extent.
//!
//! Only what patching needs is read: the primary volume descriptor and the
//! directory records below its root. Joliet and Rock Ridge extensions are
//! ignored; names are the plain ISO9660 names without version suffix.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

pub const SECTOR_SIZE: usize = 2048;

const FIRST_DESCRIPTOR_SECTOR: usize = 16;
const STANDARD_ID: &[u8] = b"CD001";
const ROOT_RECORD_OFFSET: usize = 156;
const MIN_RECORD_LEN: usize = 34;
const MAX_DEPTH: usize = 32;

const DESCRIPTOR_PRIMARY: u8 = 1;
const DESCRIPTOR_TERMINATOR: u8 = 255;
const FLAG_DIRECTORY: u8 = 0x02;

#[derive(Debug, Error)]
pub enum IsoError {
    #[error("image ends before volume descriptor sector {sector}")]
    Truncated { sector: usize },

    #[error("sector {sector} is not an ISO9660 volume descriptor")]
    BadSignature { sector: usize },

    #[error("image has no primary volume descriptor")]
    NoPrimaryDescriptor,

    #[error("malformed directory record at byte {offset}")]
    BadRecord { offset: usize },

    #[error("extent of '{path}' ({start}+{length}) lies outside the image")]
    OutOfBounds {
        path: String,
        start: usize,
        length: usize,
    },

    #[error("directories nested too deeply under '{path}'")]
    TooDeep { path: String },
}

/// Absolute byte range of a file's data inside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Extent {
    pub start: usize,
    pub length: usize,
}

impl Extent {
    pub fn end(&self) -> usize {
        self.start + self.length
    }
}

struct DirRecord {
    extent: Extent,
    is_dir: bool,
    name: Vec<u8>,
}

fn read_u32_le(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// Parse the record starting at `buf[pos]`. `base` is the absolute offset of
/// `buf` in the image, used for error messages.
fn parse_record(buf: &[u8], pos: usize, base: usize) -> Result<DirRecord, IsoError> {
    let bad = || IsoError::BadRecord { offset: base + pos };

    let len = *buf.get(pos).ok_or_else(bad)? as usize;
    if len < MIN_RECORD_LEN || pos + len > buf.len() {
        return Err(bad());
    }
    let rec = &buf[pos..pos + len];

    let name_len = rec[32] as usize;
    if 33 + name_len > len {
        return Err(bad());
    }

    Ok(DirRecord {
        extent: Extent {
            start: read_u32_le(rec, 2) as usize * SECTOR_SIZE,
            length: read_u32_le(rec, 10) as usize,
        },
        is_dir: rec[25] & FLAG_DIRECTORY != 0,
        name: rec[33..33 + name_len].to_vec(),
    })
}

fn display_name(raw: &[u8]) -> String {
    let name = String::from_utf8_lossy(raw);
    let name = name.split(';').next().unwrap_or_default();
    name.trim_end_matches('.').to_string()
}

fn checked_slice<'a>(image: &'a [u8], extent: Extent, path: &str) -> Result<&'a [u8], IsoError> {
    extent
        .start
        .checked_add(extent.length)
        .and_then(|end| image.get(extent.start..end))
        .ok_or_else(|| IsoError::OutOfBounds {
            path: path.to_string(),
            start: extent.start,
            length: extent.length,
        })
}

fn primary_root(image: &[u8]) -> Result<DirRecord, IsoError> {
    let mut sector = FIRST_DESCRIPTOR_SECTOR;
    loop {
        let start = sector * SECTOR_SIZE;
        let desc = image
            .get(start..start + SECTOR_SIZE)
            .ok_or(IsoError::Truncated { sector })?;

        if &desc[1..6] != STANDARD_ID {
            return Err(IsoError::BadSignature { sector });
        }

        match desc[0] {
            DESCRIPTOR_PRIMARY => return parse_record(desc, ROOT_RECORD_OFFSET, start),
            DESCRIPTOR_TERMINATOR => return Err(IsoError::NoPrimaryDescriptor),
            _ => sector += 1,
        }
    }
}

fn walk_dir(
    image: &[u8],
    dir: Extent,
    path: &str,
    depth: usize,
    files: &mut BTreeMap<String, Extent>,
) -> Result<(), IsoError> {
    if depth > MAX_DEPTH {
        return Err(IsoError::TooDeep { path: path.to_string() });
    }

    let data = checked_slice(image, dir, path)?;
    let mut pos = 0usize;
    while pos < data.len() {
        // Records never straddle sectors; a zero length byte pads to the next one.
        if data[pos] == 0 {
            pos = (pos / SECTOR_SIZE + 1) * SECTOR_SIZE;
            continue;
        }

        let record = parse_record(data, pos, dir.start)?;
        pos += data[pos] as usize;

        // Self and parent entries.
        if record.name == [0] || record.name == [1] {
            continue;
        }

        let name = display_name(&record.name);
        let child = if path.is_empty() {
            name
        } else {
            format!("{path}/{name}")
        };

        if record.is_dir {
            walk_dir(image, record.extent, &child, depth + 1, files)?;
        } else {
            checked_slice(image, record.extent, &child)?;
            files.insert(child, record.extent);
        }
    }

    Ok(())
}

/// Map every file in the image, keyed by `/`-separated path from the root
/// (for example `DATA/GCMNF.PRG`).
pub fn list_files(image: &[u8]) -> Result<BTreeMap<String, Extent>, IsoError> {
    let root = primary_root(image)?;
    let mut files = BTreeMap::new();
    walk_dir(image, root.extent, "", 0, &mut files)?;
    Ok(files)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn record(name: &[u8], lba: u32, size: u32, dir: bool) -> Vec<u8> {
        let mut len = 33 + name.len();
        if len % 2 == 1 {
            len += 1;
        }
        let mut rec = vec![0u8; len];
        rec[0] = len as u8;
        rec[2..6].copy_from_slice(&lba.to_le_bytes());
        rec[6..10].copy_from_slice(&lba.to_be_bytes());
        rec[10..14].copy_from_slice(&size.to_le_bytes());
        rec[14..18].copy_from_slice(&size.to_be_bytes());
        rec[25] = if dir { FLAG_DIRECTORY } else { 0 };
        rec[28] = 1;
        rec[31] = 1;
        rec[32] = name.len() as u8;
        rec[33..33 + name.len()].copy_from_slice(name);
        rec
    }

    fn put(image: &mut [u8], at: usize, bytes: &[u8]) {
        image[at..at + bytes.len()].copy_from_slice(bytes);
    }

    /// Build a small image:
    ///
    /// - sector 18-19: root directory (the `DATA` entry sits in sector 19)
    /// - sector 20: `DATA/` with `TEST.PRG;1` and `OTHER.BIN;1`
    /// - sector 21: `TEST.PRG` contents, sector 22: `OTHER.BIN` contents
    pub(crate) fn build_image(test_prg: &[u8], other_bin: &[u8]) -> Vec<u8> {
        let mut image = vec![0u8; 23 * SECTOR_SIZE];

        let pvd = 16 * SECTOR_SIZE;
        image[pvd] = DESCRIPTOR_PRIMARY;
        put(&mut image, pvd + 1, STANDARD_ID);
        image[pvd + 6] = 1;
        put(
            &mut image,
            pvd + ROOT_RECORD_OFFSET,
            &record(&[0], 18, 2 * SECTOR_SIZE as u32, true),
        );

        let term = 17 * SECTOR_SIZE;
        image[term] = DESCRIPTOR_TERMINATOR;
        put(&mut image, term + 1, STANDARD_ID);

        let root = 18 * SECTOR_SIZE;
        let dot = record(&[0], 18, 2 * SECTOR_SIZE as u32, true);
        let dotdot = record(&[1], 18, 2 * SECTOR_SIZE as u32, true);
        put(&mut image, root, &dot);
        put(&mut image, root + dot.len(), &dotdot);
        put(
            &mut image,
            19 * SECTOR_SIZE,
            &record(b"DATA", 20, SECTOR_SIZE as u32, true),
        );

        let data_dir = 20 * SECTOR_SIZE;
        let mut pos = data_dir;
        for rec in [
            record(&[0], 20, SECTOR_SIZE as u32, true),
            record(&[1], 18, 2 * SECTOR_SIZE as u32, true),
            record(b"TEST.PRG;1", 21, test_prg.len() as u32, false),
            record(b"OTHER.BIN;1", 22, other_bin.len() as u32, false),
        ] {
            put(&mut image, pos, &rec);
            pos += rec.len();
        }

        put(&mut image, 21 * SECTOR_SIZE, test_prg);
        put(&mut image, 22 * SECTOR_SIZE, other_bin);
        image
    }

    #[test]
    fn lists_nested_files_with_extents() {
        let image = build_image(b"hello\0", b"xyz");
        let files = list_files(&image).unwrap();

        let names: Vec<_> = files.keys().cloned().collect();
        assert_eq!(names, vec!["DATA/OTHER.BIN", "DATA/TEST.PRG"]);

        let test = files["DATA/TEST.PRG"];
        assert_eq!(test, Extent { start: 21 * SECTOR_SIZE, length: 6 });
        assert_eq!(&image[test.start..test.end()], b"hello\0");
    }

    #[test]
    fn rejects_images_without_descriptors() {
        let err = list_files(&[0u8; 4096]).unwrap_err();
        assert!(matches!(err, IsoError::Truncated { sector: 16 }));

        let err = list_files(&vec![0u8; 18 * SECTOR_SIZE]).unwrap_err();
        assert!(matches!(err, IsoError::BadSignature { sector: 16 }));
    }

    #[test]
    fn rejects_extents_past_end_of_image() {
        let mut image = build_image(b"hello\0", b"xyz");
        image.truncate(22 * SECTOR_SIZE);
        let err = list_files(&image).unwrap_err();
        assert!(matches!(err, IsoError::OutOfBounds { ref path, .. } if path == "DATA/OTHER.BIN"));
    }

    #[test]
    fn strips_version_and_trailing_dot() {
        assert_eq!(display_name(b"README.;1"), "README");
        assert_eq!(display_name(b"GCMNF.PRG;1"), "GCMNF.PRG");
        assert_eq!(display_name(b"DATA"), "DATA");
    }
}
