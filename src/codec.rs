/// Filename codec (C5): pure encode/decode of `{path, id, offset, size}`
/// into the externally-visible filename, plus trunk-header pack/unpack.
/// Nothing here touches the filesystem.
use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::{Result, TrunkError};
use crate::types::TrunkFileRef;

pub const EXT_NAME_SIZE: usize = 6;
pub const HEADER_SIZE: usize = 1 + 4 + 4 + 4 + 4 + EXT_NAME_SIZE;
pub const TRUNK_FLAG: u32 = 1 << 31;
pub const FILE_TYPE_REGULAR: u8 = 1;

const META_BYTES: usize = 20; // timestamp, mtime, packed_size, reserved, crc32
const REF_BYTES: usize = 12; // id, offset, size
const META_B64_LEN: usize = 28; // base64 of 20 bytes, with padding
const REF_B64_LEN: usize = 16; // base64 of 12 bytes

/// The fixed-length record embedded in every encoded filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMeta {
    pub timestamp: u32,
    pub mtime: u32,
    pub packed_size: u32,
    pub reserved: u32,
    pub crc32: u32,
}

impl FileMeta {
    pub fn is_trunk(&self) -> bool {
        self.packed_size & TRUNK_FLAG != 0
    }

    pub fn size(&self) -> u32 {
        self.packed_size & !TRUNK_FLAG
    }

    fn to_bytes(self) -> [u8; META_BYTES] {
        let mut buf = [0u8; META_BYTES];
        buf[0..4].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[4..8].copy_from_slice(&self.mtime.to_le_bytes());
        buf[8..12].copy_from_slice(&self.packed_size.to_le_bytes());
        buf[12..16].copy_from_slice(&self.reserved.to_le_bytes());
        buf[16..20].copy_from_slice(&self.crc32.to_le_bytes());
        buf
    }

    fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() != META_BYTES {
            return None;
        }
        Some(Self {
            timestamp: u32::from_le_bytes(buf[0..4].try_into().ok()?),
            mtime: u32::from_le_bytes(buf[4..8].try_into().ok()?),
            packed_size: u32::from_le_bytes(buf[8..12].try_into().ok()?),
            reserved: u32::from_le_bytes(buf[12..16].try_into().ok()?),
            crc32: u32::from_le_bytes(buf[16..20].try_into().ok()?),
        })
    }
}

fn ref_to_bytes(r: TrunkFileRef) -> [u8; REF_BYTES] {
    let mut buf = [0u8; REF_BYTES];
    buf[0..4].copy_from_slice(&r.id.to_be_bytes());
    buf[4..8].copy_from_slice(&r.offset.to_be_bytes());
    buf[8..12].copy_from_slice(&r.size.to_be_bytes());
    buf
}

fn ref_from_bytes(buf: &[u8]) -> Option<TrunkFileRef> {
    if buf.len() != REF_BYTES {
        return None;
    }
    Some(TrunkFileRef {
        id: u32::from_be_bytes(buf[0..4].try_into().ok()?),
        offset: u32::from_be_bytes(buf[4..8].try_into().ok()?),
        size: u32::from_be_bytes(buf[8..12].try_into().ok()?),
    })
}

/// CRC32 of a file's payload bytes, as stored in `FileMeta::crc32` and
/// `TrunkHeader::crc32`.
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Derives the two-level sub-directory pair a trunk id's file lives under.
pub fn sub_path_for_id(id: u32) -> (u8, u8) {
    let h = id.wrapping_mul(2654435761);
    ((h >> 24) as u8, (h >> 16) as u8)
}

/// The trunk file's own on-disk name: base64 of its big-endian id.
pub fn trunk_filename(id: u32) -> String {
    STANDARD.encode(id.to_be_bytes())
}

#[derive(Debug)]
pub enum DecodedName {
    Standalone { meta: FileMeta },
    Trunk { meta: FileMeta, file: TrunkFileRef },
}

/// Encodes the externally-visible name of a file packed into a trunk.
pub fn encode_trunk_name(mut meta: FileMeta, file: TrunkFileRef, ext: &str) -> String {
    meta.packed_size |= TRUNK_FLAG;
    format!("{}{}{}", STANDARD.encode(meta.to_bytes()), STANDARD.encode(ref_to_bytes(file)), ext)
}

/// Encodes the externally-visible name of a standalone file.
pub fn encode_standalone_name(mut meta: FileMeta, ext: &str) -> String {
    meta.packed_size &= !TRUNK_FLAG;
    format!("{}{}", STANDARD.encode(meta.to_bytes()), ext)
}

/// Decodes the base64 meta (and, if the trunk flag is set, ref) payload
/// out of a true filename. Returns `BadName` when the string is too short
/// for the fields it claims to carry, per the stat resolver's fallthrough.
pub fn decode_name(true_filename: &str) -> Result<DecodedName> {
    if true_filename.len() < META_B64_LEN {
        return Err(TrunkError::BadName);
    }
    let meta_bytes = STANDARD
        .decode(&true_filename[..META_B64_LEN])
        .map_err(|e| TrunkError::Invalid(e.to_string()))?;
    let meta = FileMeta::from_bytes(&meta_bytes).ok_or(TrunkError::BadName)?;

    if !meta.is_trunk() {
        return Ok(DecodedName::Standalone { meta });
    }

    let rest = &true_filename[META_B64_LEN..];
    if rest.len() < REF_B64_LEN {
        return Err(TrunkError::BadName);
    }
    let ref_bytes = STANDARD
        .decode(&rest[..REF_B64_LEN])
        .map_err(|e| TrunkError::Invalid(e.to_string()))?;
    let file = ref_from_bytes(&ref_bytes).ok_or(TrunkError::BadName)?;
    Ok(DecodedName::Trunk { meta, file })
}

/// The header written at the start of every logical file inside a trunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrunkHeader {
    pub file_type: u8,
    pub alloc_size: u32,
    pub file_size: u32,
    pub crc32: u32,
    pub mtime: u32,
    pub ext_name: [u8; EXT_NAME_SIZE],
}

impl TrunkHeader {
    pub fn pack(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = self.file_type;
        buf[1..5].copy_from_slice(&self.alloc_size.to_be_bytes());
        buf[5..9].copy_from_slice(&self.file_size.to_be_bytes());
        buf[9..13].copy_from_slice(&self.crc32.to_be_bytes());
        buf[13..17].copy_from_slice(&self.mtime.to_be_bytes());
        buf[17..17 + EXT_NAME_SIZE].copy_from_slice(&self.ext_name);
        buf
    }

    pub fn unpack(buf: &[u8]) -> Result<Self> {
        if buf.len() != HEADER_SIZE {
            return Err(TrunkError::Invalid(format!(
                "trunk header must be {} bytes, got {}", HEADER_SIZE, buf.len()
            )));
        }
        let mut ext_name = [0u8; EXT_NAME_SIZE];
        ext_name.copy_from_slice(&buf[17..17 + EXT_NAME_SIZE]);
        Ok(Self {
            file_type: buf[0],
            alloc_size: u32::from_be_bytes(buf[1..5].try_into().unwrap()),
            file_size: u32::from_be_bytes(buf[5..9].try_into().unwrap()),
            crc32: u32::from_be_bytes(buf[9..13].try_into().unwrap()),
            mtime: u32::from_be_bytes(buf[13..17].try_into().unwrap()),
            ext_name,
        })
    }

    /// Cross-check used by the stat resolver: ignores byte 0 (`file_type`),
    /// which is only set after the allocator has reserved the space.
    pub fn matches_ignoring_file_type(&self, other: &TrunkHeader) -> bool {
        self.alloc_size == other.alloc_size
            && self.file_size == other.file_size
            && self.crc32 == other.crc32
            && self.mtime == other.mtime
            && self.ext_name == other.ext_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_meta() -> FileMeta {
        FileMeta { timestamp: 1_700_000_000, mtime: 1_700_000_001, packed_size: 8192, reserved: 0, crc32: 0xdead_beef }
    }

    #[test]
    fn header_round_trips() {
        let header = TrunkHeader {
            file_type: FILE_TYPE_REGULAR,
            alloc_size: 8192,
            file_size: 4096,
            crc32: 0x1234_5678,
            mtime: 1_700_000_000,
            ext_name: *b"jpg\0\0\0",
        };
        let packed = header.pack();
        assert_eq!(TrunkHeader::unpack(&packed).unwrap(), header);
    }

    #[test]
    fn unpack_rejects_wrong_length() {
        assert!(TrunkHeader::unpack(&[0u8; 4]).is_err());
    }

    #[test]
    fn header_cross_check_ignores_file_type_byte() {
        let mut a = TrunkHeader { file_type: 0, alloc_size: 1, file_size: 1, crc32: 1, mtime: 1, ext_name: [0; 6] };
        let mut b = a;
        a.file_type = 0;
        b.file_type = FILE_TYPE_REGULAR;
        assert!(a.matches_ignoring_file_type(&b));
        b.file_size = 2;
        assert!(!a.matches_ignoring_file_type(&b));
    }

    #[test]
    fn trunk_filename_round_trips_via_standalone_decode() {
        let file = TrunkFileRef { id: 42, offset: 4096, size: 8192 };
        let name = encode_trunk_name(sample_meta(), file, ".jpg");
        match decode_name(&name).unwrap() {
            DecodedName::Trunk { meta, file: decoded } => {
                assert_eq!(decoded, file);
                assert_eq!(meta.size(), 8192);
                assert!(meta.is_trunk());
            }
            DecodedName::Standalone { .. } => panic!("expected trunk name"),
        }
    }

    #[test]
    fn standalone_name_decodes_without_trunk_flag() {
        let name = encode_standalone_name(sample_meta(), ".jpg");
        match decode_name(&name).unwrap() {
            DecodedName::Standalone { meta } => assert!(!meta.is_trunk()),
            DecodedName::Trunk { .. } => panic!("expected standalone name"),
        }
    }

    #[test]
    fn decode_rejects_names_too_short_for_meta() {
        let err = decode_name("short").unwrap_err();
        assert!(matches!(err, TrunkError::BadName));
    }

    #[test]
    fn decode_rejects_trunk_name_too_short_for_ref() {
        // flip the trunk flag on but truncate before the ref segment
        let name = encode_trunk_name(sample_meta(), TrunkFileRef::default(), "");
        let truncated = &name[..META_B64_LEN + 4];
        let err = decode_name(truncated).unwrap_err();
        assert!(matches!(err, TrunkError::BadName));
    }

    #[test]
    fn crc32_is_deterministic_and_sensitive_to_content() {
        assert_eq!(crc32(b"abc"), crc32(b"abc"));
        assert_ne!(crc32(b"abc"), crc32(b"abd"));
    }

    #[test]
    fn sub_path_for_id_is_deterministic() {
        assert_eq!(sub_path_for_id(42), sub_path_for_id(42));
        assert_ne!(sub_path_for_id(1), sub_path_for_id(2));
    }
}
