//! Decoding of extra-field sub-records.
//!
//! The extra field is a sequence of `(tag: u16, size: u16, payload)` blocks.
//! Known tags are decoded into named fields; anything else is reported as an
//! `UnknownHeader` carrying its raw payload.

use byteorder::{LittleEndian, ReadBytesExt};
use chrono::DateTime;
use std::io::{Cursor, Read};

use super::structures::{ExtraField, UNKNOWN_DATA_KEY, UNKNOWN_HEADER};

const ZIP64_TAG: u16 = 0x0001;
const NTFS_TAG: u16 = 0x000a;
const EXTENDED_TIMESTAMP_TAG: u16 = 0x5455;
const UNICODE_PATH_TAG: u16 = 0x7075;
const INFOZIP_UNIX_TAG: u16 = 0x7875;

/// Seconds between 1601-01-01 (FILETIME epoch) and 1970-01-01.
const FILETIME_UNIX_DELTA: i64 = 11_644_473_600;

/// Header values saturated to their maximum, whose real value lives in the
/// ZIP64 extra field.
#[derive(Debug, Clone, Copy, Default)]
pub struct Zip64Needs {
    pub uncompressed_size: bool,
    pub compressed_size: bool,
    pub lfh_offset: bool,
    pub disk_number_start: bool,
}

/// 64-bit values recovered from a ZIP64 extended information field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Zip64Values {
    pub uncompressed_size: Option<u64>,
    pub compressed_size: Option<u64>,
    pub lfh_offset: Option<u64>,
    pub disk_number_start: Option<u32>,
}

/// Decode every sub-record of an extra field.
pub fn decode_extra_fields(data: &[u8], needs: Zip64Needs) -> (Vec<ExtraField>, Zip64Values) {
    let mut fields = Vec::new();
    let mut zip64 = Zip64Values::default();
    let mut pos = 0usize;

    while pos + 4 <= data.len() {
        let tag = u16::from_le_bytes([data[pos], data[pos + 1]]);
        let size = u16::from_le_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let start = pos + 4;
        let end = (start + size).min(data.len());
        let payload = &data[start..end];

        let decoded = if end - start < size {
            None
        } else {
            match tag {
                ZIP64_TAG => decode_zip64(payload, needs).map(|(field, values)| {
                    zip64 = values;
                    field
                }),
                NTFS_TAG => decode_ntfs(payload),
                EXTENDED_TIMESTAMP_TAG => decode_extended_timestamp(payload),
                UNICODE_PATH_TAG => decode_unicode_path(payload),
                INFOZIP_UNIX_TAG => decode_infozip_unix(payload),
                _ => None,
            }
        };

        fields.push(decoded.unwrap_or_else(|| unknown_header(tag, size, payload)));
        pos = start + size;
    }

    (fields, zip64)
}

fn unknown_header(tag: u16, size: usize, payload: &[u8]) -> ExtraField {
    ExtraField::new(UNKNOWN_HEADER)
        .with("HeaderID", format!("0x{:04x}", tag))
        .with("DataSize", size.to_string())
        .with(UNKNOWN_DATA_KEY, hex::encode(payload))
}

fn decode_zip64(payload: &[u8], needs: Zip64Needs) -> Option<(ExtraField, Zip64Values)> {
    let mut cursor = Cursor::new(payload);
    let mut values = Zip64Values::default();
    let mut field = ExtraField::new("Zip64ExtendedInformation");

    // Values appear only for header fields that were saturated, in this order.
    if needs.uncompressed_size {
        let value = cursor.read_u64::<LittleEndian>().ok()?;
        values.uncompressed_size = Some(value);
        field = field.with("UncompressedSize", value.to_string());
    }
    if needs.compressed_size {
        let value = cursor.read_u64::<LittleEndian>().ok()?;
        values.compressed_size = Some(value);
        field = field.with("CompressedSize", value.to_string());
    }
    if needs.lfh_offset {
        let value = cursor.read_u64::<LittleEndian>().ok()?;
        values.lfh_offset = Some(value);
        field = field.with("RelativeHeaderOffset", value.to_string());
    }
    if needs.disk_number_start {
        let value = cursor.read_u32::<LittleEndian>().ok()?;
        values.disk_number_start = Some(value);
        field = field.with("DiskStartNumber", value.to_string());
    }

    Some((field, values))
}

fn decode_ntfs(payload: &[u8]) -> Option<ExtraField> {
    let mut cursor = Cursor::new(payload);
    let _reserved = cursor.read_u32::<LittleEndian>().ok()?;
    let mut field = ExtraField::new("NTFS");

    while let (Ok(tag), Ok(size)) = (
        cursor.read_u16::<LittleEndian>(),
        cursor.read_u16::<LittleEndian>(),
    ) {
        if tag == 0x0001 && size == 24 {
            for key in ["Mtime", "Atime", "Ctime"] {
                let ticks = cursor.read_u64::<LittleEndian>().ok()?;
                field = field.with(key, format_filetime(ticks));
            }
        } else {
            let mut skipped = vec![0u8; size as usize];
            cursor.read_exact(&mut skipped).ok()?;
        }
    }

    Some(field)
}

fn decode_extended_timestamp(payload: &[u8]) -> Option<ExtraField> {
    let mut cursor = Cursor::new(payload);
    let flags = cursor.read_u8().ok()?;
    let mut field = ExtraField::new("ExtendedTimestamp").with("Flags", flags.to_string());

    // The central directory copy usually carries only the modification time,
    // even when the flags announce more.
    for (bit, key) in [(0x01, "ModifyTime"), (0x02, "AccessTime"), (0x04, "CreateTime")] {
        if flags & bit == 0 {
            continue;
        }
        match cursor.read_i32::<LittleEndian>() {
            Ok(seconds) => field = field.with(key, format_unix(seconds as i64)),
            Err(_) => break,
        }
    }

    Some(field)
}

fn decode_unicode_path(payload: &[u8]) -> Option<ExtraField> {
    let mut cursor = Cursor::new(payload);
    let version = cursor.read_u8().ok()?;
    let crc = cursor.read_u32::<LittleEndian>().ok()?;
    let name = String::from_utf8_lossy(&payload[5..]).to_string();

    Some(
        ExtraField::new("InfoZipUnicodePath")
            .with("Version", version.to_string())
            .with("NameCRC32", format!("{:08x}", crc))
            .with("UnicodeName", name),
    )
}

fn decode_infozip_unix(payload: &[u8]) -> Option<ExtraField> {
    let mut cursor = Cursor::new(payload);
    let version = cursor.read_u8().ok()?;
    let uid = read_sized_id(&mut cursor)?;
    let gid = read_sized_id(&mut cursor)?;

    Some(
        ExtraField::new("InfoZipUnix")
            .with("Version", version.to_string())
            .with("UID", uid.to_string())
            .with("GID", gid.to_string()),
    )
}

/// A little-endian id prefixed by its byte width.
fn read_sized_id(cursor: &mut Cursor<&[u8]>) -> Option<u64> {
    let size = cursor.read_u8().ok()? as usize;
    if size > 8 {
        return None;
    }
    let mut buf = [0u8; 8];
    cursor.read_exact(&mut buf[..size]).ok()?;
    Some(u64::from_le_bytes(buf))
}

fn format_unix(seconds: i64) -> String {
    DateTime::from_timestamp(seconds, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| seconds.to_string())
}

fn format_filetime(ticks: u64) -> String {
    let seconds = (ticks / 10_000_000) as i64 - FILETIME_UNIX_DELTA;
    let nanos = (ticks % 10_000_000) as u32 * 100;
    DateTime::from_timestamp(seconds, nanos)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ticks.to_string())
}
