use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use anyhow::{Result, bail};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Shrunk,
    Reduced(u8),
    Imploded,
    Deflate,
    Deflate64,
    Bzip2,
    Lzma,
    Zstd,
    Xz,
    Ppmd,
    Aes,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            1 => CompressionMethod::Shrunk,
            2..=5 => CompressionMethod::Reduced(value as u8 - 1),
            6 => CompressionMethod::Imploded,
            8 => CompressionMethod::Deflate,
            9 => CompressionMethod::Deflate64,
            12 => CompressionMethod::Bzip2,
            14 => CompressionMethod::Lzma,
            93 => CompressionMethod::Zstd,
            95 => CompressionMethod::Xz,
            98 => CompressionMethod::Ppmd,
            99 => CompressionMethod::Aes,
            _ => CompressionMethod::Unknown(value),
        }
    }

    /// Display name used in metadata output.
    pub fn name(&self) -> String {
        match self {
            CompressionMethod::Stored => "Stored".to_string(),
            CompressionMethod::Shrunk => "Shrunk".to_string(),
            CompressionMethod::Reduced(factor) => format!("Reduced{}", factor),
            CompressionMethod::Imploded => "Imploded".to_string(),
            CompressionMethod::Deflate => "Deflated".to_string(),
            CompressionMethod::Deflate64 => "Deflate64".to_string(),
            CompressionMethod::Bzip2 => "BZIP2".to_string(),
            CompressionMethod::Lzma => "LZMA".to_string(),
            CompressionMethod::Zstd => "Zstandard".to_string(),
            CompressionMethod::Xz => "XZ".to_string(),
            CompressionMethod::Ppmd => "PPMd".to_string(),
            CompressionMethod::Aes => "AES".to_string(),
            CompressionMethod::Unknown(v) => format!("Unknown({})", v),
        }
    }
}

/// Host system encoded in the upper byte of "version made by".
pub fn host_system_name(host: u8) -> &'static str {
    match host {
        0 => "MS-DOS",
        1 => "Amiga",
        2 => "OpenVMS",
        3 => "UNIX",
        4 => "VM/CMS",
        5 => "Atari ST",
        6 => "OS/2 HPFS",
        7 => "Macintosh",
        8 => "Z-System",
        9 => "CP/M",
        10 => "Windows NTFS",
        11 => "MVS",
        12 => "VSE",
        13 => "Acorn Risc",
        14 => "VFAT",
        15 => "Alternate MVS",
        16 => "BeOS",
        17 => "Tandem",
        18 => "OS/400",
        19 => "OS X",
        _ => "Unknown",
    }
}

/// Names of the general purpose bit flags that are set.
pub fn general_purpose_flag_names(flags: u16) -> Vec<String> {
    const NAMES: [(u16, &str); 9] = [
        (0x0001, "Encrypted"),
        (0x0002, "CompressionOption1"),
        (0x0004, "CompressionOption2"),
        (0x0008, "DataDescriptor"),
        (0x0010, "EnhancedDeflation"),
        (0x0020, "CompressedPatchedData"),
        (0x0040, "StrongEncryption"),
        (0x0800, "LanguageEncoding"),
        (0x2000, "MaskHeaderValues"),
    ];
    NAMES
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|(_, name)| name.to_string())
        .collect()
}

/// End of Central Directory (EOCD) - 22 bytes minimum
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            bail!("Invalid End of Central Directory");
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub struct Zip64EOCDLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            bail!("Invalid ZIP64 locator");
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_with_eocd64: cursor.read_u32::<LittleEndian>()?,
            eocd64_offset: cursor.read_u64::<LittleEndian>()?,
            total_disks: cursor.read_u32::<LittleEndian>()?,
        })
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
pub struct Zip64EOCD {
    pub eocd64_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub disk_with_cd: u32,
    pub disk_entries: u64,
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE || &data[0..4] != Self::SIGNATURE {
            bail!("Invalid ZIP64 End of Central Directory");
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            eocd64_size: cursor.read_u64::<LittleEndian>()?,
            version_made_by: cursor.read_u16::<LittleEndian>()?,
            version_needed: cursor.read_u16::<LittleEndian>()?,
            disk_number: cursor.read_u32::<LittleEndian>()?,
            disk_with_cd: cursor.read_u32::<LittleEndian>()?,
            disk_entries: cursor.read_u64::<LittleEndian>()?,
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) signature
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";

/// Fixed part of a central directory file header.
#[derive(Debug, Clone)]
pub struct CentralDirectoryHeader {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: CompressionMethod,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_length: u16,
    pub extra_field_length: u16,
    pub file_comment_length: u16,
    pub disk_number_start: u16,
    pub internal_attrs: u16,
    pub external_attrs: u32,
    pub lfh_offset: u32,
}

impl CentralDirectoryHeader {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < CDFH_MIN_SIZE || &data[0..4] != CDFH_SIGNATURE {
            bail!("Invalid Central Directory File Header");
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            version_made_by: cursor.read_u16::<LittleEndian>()?,
            version_needed: cursor.read_u16::<LittleEndian>()?,
            flags: cursor.read_u16::<LittleEndian>()?,
            compression_method: CompressionMethod::from_u16(cursor.read_u16::<LittleEndian>()?),
            last_mod_time: cursor.read_u16::<LittleEndian>()?,
            last_mod_date: cursor.read_u16::<LittleEndian>()?,
            crc32: cursor.read_u32::<LittleEndian>()?,
            compressed_size: cursor.read_u32::<LittleEndian>()?,
            uncompressed_size: cursor.read_u32::<LittleEndian>()?,
            file_name_length: cursor.read_u16::<LittleEndian>()?,
            extra_field_length: cursor.read_u16::<LittleEndian>()?,
            file_comment_length: cursor.read_u16::<LittleEndian>()?,
            disk_number_start: cursor.read_u16::<LittleEndian>()?,
            internal_attrs: cursor.read_u16::<LittleEndian>()?,
            external_attrs: cursor.read_u32::<LittleEndian>()?,
            lfh_offset: cursor.read_u32::<LittleEndian>()?,
        })
    }

    /// Length of the variable part following the fixed header.
    pub fn variable_length(&self) -> u64 {
        self.file_name_length as u64 + self.extra_field_length as u64 + self.file_comment_length as u64
    }

    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }

    /// DOS timestamp rendered as `YYYY-MM-DD HH:MM:SS`, without validation.
    pub fn last_modified(&self) -> String {
        let (year, month, day) = self.mod_date();
        let (hour, minute, second) = self.mod_time();
        format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            year, month, day, hour, minute, second
        )
    }
}

/// A metadata value: a single display string or a list expanded element-wise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::List(value)
    }
}

/// Key under which the extra-field sub-record name is stored.
pub const EXTRA_NAME_KEY: &str = "Name";
/// Name of sub-records whose tag is not decoded.
pub const UNKNOWN_HEADER: &str = "UnknownHeader";
/// Key holding the raw payload of an unknown sub-record.
pub const UNKNOWN_DATA_KEY: &str = "Data";

/// One decoded extra-field sub-record. The first field is always `Name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraField {
    pub fields: Vec<(String, FieldValue)>,
}

impl ExtraField {
    pub fn new(name: &str) -> Self {
        Self {
            fields: vec![(EXTRA_NAME_KEY.to_string(), FieldValue::from(name))],
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.push((key.to_string(), value.into()));
        self
    }

    pub fn name(&self) -> &str {
        self.fields
            .iter()
            .find_map(|(key, value)| match value {
                FieldValue::Text(text) if key == EXTRA_NAME_KEY => Some(text.as_str()),
                _ => None,
            })
            .unwrap_or(UNKNOWN_HEADER)
    }
}

/// Key carrying the entry name of a record.
pub const FILE_NAME_KEY: &str = "ZipFileName";
/// Key under which extra-field sub-records are reported.
pub const EXTRA_FIELD_KEY: &str = "ZipExtraField";

/// Metadata for one archive entry, as produced by a [`MetadataParser`](super::MetadataParser).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRecord {
    pub fields: Vec<(String, FieldValue)>,
    pub extra_fields: Vec<ExtraField>,
}

impl MetadataRecord {
    pub fn push(&mut self, key: &str, value: impl Into<FieldValue>) {
        self.fields.push((key.to_string(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn file_name(&self) -> Option<&str> {
        match self.get(FILE_NAME_KEY)? {
            FieldValue::Text(name) => Some(name.as_str()),
            FieldValue::List(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_method_decodes_known_codes() {
        assert_eq!(CompressionMethod::from_u16(8), CompressionMethod::Deflate);
        assert_eq!(CompressionMethod::from_u16(3), CompressionMethod::Reduced(2));
        assert_eq!(CompressionMethod::from_u16(3).name(), "Reduced2");
        assert_eq!(CompressionMethod::from_u16(7).name(), "Unknown(7)");
    }

    #[test]
    fn flag_names_follow_set_bits() {
        assert!(general_purpose_flag_names(0).is_empty());
        assert_eq!(
            general_purpose_flag_names(0x0809),
            ["Encrypted", "DataDescriptor", "LanguageEncoding"]
        );
    }

    #[test]
    fn dos_timestamp_is_rendered() {
        let mut raw = vec![0u8; CDFH_MIN_SIZE];
        raw[..4].copy_from_slice(CDFH_SIGNATURE);
        // 2015-06-30 12:34:56
        let date: u16 = ((2015 - 1980) << 9) | (6 << 5) | 30;
        let time: u16 = (12 << 11) | (34 << 5) | 28;
        raw[12..14].copy_from_slice(&time.to_le_bytes());
        raw[14..16].copy_from_slice(&date.to_le_bytes());

        let header = CentralDirectoryHeader::from_bytes(&raw).unwrap();
        assert_eq!(header.last_modified(), "2015-06-30 12:34:56");
    }

    #[test]
    fn truncated_header_is_rejected() {
        assert!(CentralDirectoryHeader::from_bytes(b"PK\x01\x02short").is_err());
        assert!(EndOfCentralDirectory::from_bytes(b"PK\x05\x06").is_err());
    }

    #[test]
    fn record_lookup_by_key() {
        let mut record = MetadataRecord::default();
        record.push(FILE_NAME_KEY, "a.txt");
        assert_eq!(record.file_name(), Some("a.txt"));
        assert_eq!(ExtraField::new("NTFS").name(), "NTFS");
    }
}
