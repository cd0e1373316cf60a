//! Central directory walker producing per-entry metadata.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If ZIP64, read the ZIP64 EOCD for large file support
//! 3. Walk the Central Directory with the byte source cursor, one
//!    [`MetadataRecord`] per file header
//!
//! All reads go through [`ByteSource`], so the parser works on borrowed
//! windows of the mapping and never copies archive data.

use anyhow::{Result, bail};

use crate::io::ByteSource;

use super::MetadataParser;
use super::extra::{Zip64Needs, decode_extra_fields};
use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Default [`MetadataParser`] reading the central directory of an archive.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipParser;

impl ZipParser {
    pub fn new() -> Self {
        Self
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Returns the record and its offset in the source. Archives with a
    /// trailing comment are handled by searching backwards for the signature.
    pub fn find_eocd(&self, source: &dyn ByteSource) -> Result<(EndOfCentralDirectory, u64)> {
        let size = source.len();

        // Common case first: no comment, EOCD is the last 22 bytes.
        if size >= EndOfCentralDirectory::SIZE as u64 {
            let offset = size - EndOfCentralDirectory::SIZE as u64;
            let buf = source.read_at(offset, EndOfCentralDirectory::SIZE);
            // Sources whose reads are clamped short of `len()` may return less.
            if buf.starts_with(EndOfCentralDirectory::SIGNATURE)
                && buf.get(20..22) == Some(&[0, 0][..])
            {
                return Ok((EndOfCentralDirectory::from_bytes(buf)?, offset));
            }
        }

        let search_size = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(size);
        let search_start = size - search_size;
        let buf = source.read_at(search_start, search_size as usize);

        let Some(last) = buf.len().checked_sub(EndOfCentralDirectory::SIZE) else {
            bail!("End of Central Directory not found");
        };
        for i in (0..=last).rev() {
            if &buf[i..i + 4] == EndOfCentralDirectory::SIGNATURE {
                // The comment length must account for exactly the remaining bytes.
                let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;
                if comment_len == last - i {
                    let eocd = EndOfCentralDirectory::from_bytes(
                        &buf[i..i + EndOfCentralDirectory::SIZE],
                    )?;
                    return Ok((eocd, search_start + i as u64));
                }
            }
        }

        bail!("End of Central Directory not found")
    }

    /// Read the ZIP64 End of Central Directory record via its locator, which
    /// sits immediately before the regular EOCD.
    pub fn read_zip64_eocd(&self, source: &dyn ByteSource, eocd_offset: u64) -> Result<Zip64EOCD> {
        let Some(locator_offset) = eocd_offset.checked_sub(Zip64EOCDLocator::SIZE as u64) else {
            bail!("ZIP64 locator out of range");
        };
        let locator =
            Zip64EOCDLocator::from_bytes(source.read_at(locator_offset, Zip64EOCDLocator::SIZE))?;

        Zip64EOCD::from_bytes(source.read_at(locator.eocd64_offset, Zip64EOCD::MIN_SIZE))
    }

    /// Offset of the first central directory header and the entry count.
    pub fn locate_central_directory(&self, source: &dyn ByteSource) -> Result<(u64, u64)> {
        let (eocd, eocd_offset) = self.find_eocd(source)?;

        if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(source, eocd_offset)?;
            Ok((eocd64.cd_offset, eocd64.total_entries))
        } else {
            Ok((eocd.cd_offset as u64, eocd.total_entries as u64))
        }
    }

    /// Parse the central directory file header at the cursor and advance
    /// the cursor past it.
    fn parse_entry(&self, source: &mut dyn ByteSource) -> Result<MetadataRecord> {
        let start = source.tell();
        let header = CentralDirectoryHeader::from_bytes(source.read_at(start, CDFH_MIN_SIZE))?;

        let name_start = start + CDFH_MIN_SIZE as u64;
        let extra_start = name_start + header.file_name_length as u64;
        let comment_start = extra_start + header.extra_field_length as u64;

        let file_name = read_exact(&*source, name_start, header.file_name_length)?;
        // Use lossy conversion to handle non-UTF8 filenames gracefully
        let file_name = String::from_utf8_lossy(file_name).to_string();
        let comment = read_exact(&*source, comment_start, header.file_comment_length)?;
        let comment = String::from_utf8_lossy(comment).to_string();

        let needs = Zip64Needs {
            uncompressed_size: header.uncompressed_size == 0xFFFFFFFF,
            compressed_size: header.compressed_size == 0xFFFFFFFF,
            lfh_offset: header.lfh_offset == 0xFFFFFFFF,
            disk_number_start: header.disk_number_start == 0xFFFF,
        };
        let extra = read_exact(&*source, extra_start, header.extra_field_length)?;
        let (extra_fields, zip64) = decode_extra_fields(extra, needs);

        let mut record = MetadataRecord {
            fields: Vec::with_capacity(16),
            extra_fields,
        };
        record.push("ZipVersionMadeBy", format_version(header.version_made_by));
        record.push(
            "ZipHostSystem",
            host_system_name((header.version_made_by >> 8) as u8),
        );
        record.push("ZipVersionNeeded", format_version(header.version_needed));
        record.push("ZipGeneralPurposeFlag", format!("0x{:04x}", header.flags));
        record.push(
            "ZipGeneralPurposeFlags",
            general_purpose_flag_names(header.flags),
        );
        record.push("ZipCompression", header.compression_method.name());
        record.push("ZipLastModified", header.last_modified());
        record.push("ZipCRC32", format!("{:08x}", header.crc32));
        record.push(
            "ZipCompressedSize",
            zip64
                .compressed_size
                .unwrap_or(header.compressed_size as u64)
                .to_string(),
        );
        record.push(
            "ZipUncompressedSize",
            zip64
                .uncompressed_size
                .unwrap_or(header.uncompressed_size as u64)
                .to_string(),
        );
        record.push(
            "ZipDiskNumberStart",
            zip64
                .disk_number_start
                .unwrap_or(header.disk_number_start as u32)
                .to_string(),
        );
        record.push(
            "ZipInternalAttributes",
            format!("0x{:04x}", header.internal_attrs),
        );
        record.push(
            "ZipExternalAttributes",
            format!("0x{:08x}", header.external_attrs),
        );
        record.push(
            "ZipRelativeOffset",
            zip64
                .lfh_offset
                .unwrap_or(header.lfh_offset as u64)
                .to_string(),
        );
        record.push(FILE_NAME_KEY, file_name);
        record.push("ZipFileComment", comment);

        source.seek(name_start + header.variable_length());
        Ok(record)
    }
}

impl MetadataParser for ZipParser {
    fn parse(&self, source: &mut dyn ByteSource) -> Result<Vec<MetadataRecord>> {
        let (cd_offset, total_entries) = match self.locate_central_directory(&*source) {
            Ok(location) => location,
            Err(err) => {
                tracing::debug!(error = %err, "no central directory");
                return Ok(Vec::new());
            }
        };

        source.seek(cd_offset);
        let mut records = Vec::with_capacity(total_entries.min(1024) as usize);

        for index in 0..total_entries {
            match self.parse_entry(source) {
                Ok(record) => records.push(record),
                Err(err) => {
                    tracing::debug!(index, error = %err, "stopping at malformed entry");
                    break;
                }
            }
        }

        tracing::debug!(entries = records.len(), declared = total_entries, "parsed central directory");
        Ok(records)
    }
}

/// Read exactly `len` bytes at `start`.
fn read_exact(source: &dyn ByteSource, start: u64, len: u16) -> Result<&[u8]> {
    if len == 0 {
        return Ok(&[]);
    }
    let bytes = source.read_at(start, len as usize);
    if bytes.len() != len as usize {
        bail!("truncated field at offset {}", start);
    }
    Ok(bytes)
}

/// "Version made by / needed" low byte as `major.minor`.
fn format_version(version: u16) -> String {
    let spec = version & 0xFF;
    format!("{}.{}", spec / 10, spec % 10)
}
