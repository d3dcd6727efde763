use oxgit_types::ObjectKind;

use crate::error::{PackError, PackResult};

/// Type field of a pack entry header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PackEntryType {
    /// Complete object stored whole.
    Full(ObjectKind),
    /// Delta against an earlier entry in the same pack, by negative offset.
    OfsDelta,
    /// Delta against an object named by id.
    RefDelta,
}

impl PackEntryType {
    pub const OFS_DELTA: u8 = 6;
    pub const REF_DELTA: u8 = 7;

    /// The 3-bit type code.
    pub fn type_code(&self) -> u8 {
        match self {
            Self::Full(kind) => kind.pack_type(),
            Self::OfsDelta => Self::OFS_DELTA,
            Self::RefDelta => Self::REF_DELTA,
        }
    }

    pub fn from_type_code(code: u8) -> Option<Self> {
        match code {
            Self::OFS_DELTA => Some(Self::OfsDelta),
            Self::REF_DELTA => Some(Self::RefDelta),
            other => ObjectKind::from_pack_type(other).map(Self::Full),
        }
    }
}

/// Encode an entry header: type in bits 4..6 of the first byte, size as a
/// little-endian base-128 number starting with the low 4 bits.
pub(crate) fn encode_entry_header(buf: &mut Vec<u8>, ty: PackEntryType, size: u64) {
    let mut byte = (ty.type_code() << 4) | (size & 0x0f) as u8;
    let mut rest = size >> 4;
    while rest > 0 {
        buf.push(byte | 0x80);
        byte = (rest & 0x7f) as u8;
        rest >>= 7;
    }
    buf.push(byte);
}

/// Decode an entry header. Returns (type, inflated size, bytes consumed).
pub(crate) fn decode_entry_header(data: &[u8], offset: u64) -> PackResult<(PackEntryType, u64, usize)> {
    let corrupt = |reason: &str| PackError::CorruptEntry {
        offset,
        reason: reason.into(),
    };
    let first = *data.first().ok_or_else(|| corrupt("offset beyond pack data"))?;
    let code = (first >> 4) & 0x07;
    let ty = PackEntryType::from_type_code(code)
        .ok_or_else(|| corrupt(&format!("unknown type code {code}")))?;

    let mut size = u64::from(first & 0x0f);
    let mut shift = 4;
    let mut pos = 1;
    let mut byte = first;
    while byte & 0x80 != 0 {
        byte = *data.get(pos).ok_or_else(|| corrupt("truncated entry header"))?;
        if shift > 57 {
            return Err(corrupt("entry size overflow"));
        }
        size |= u64::from(byte & 0x7f) << shift;
        shift += 7;
        pos += 1;
    }
    Ok((ty, size, pos))
}

/// Encode the distance back to an OFS_DELTA base. Each continuation adds
/// one before shifting so that no two encodings share a value.
pub(crate) fn encode_ofs_distance(buf: &mut Vec<u8>, mut distance: u64) {
    let mut tmp = vec![(distance & 0x7f) as u8];
    distance >>= 7;
    while distance > 0 {
        distance -= 1;
        tmp.push(0x80 | (distance & 0x7f) as u8);
        distance >>= 7;
    }
    tmp.reverse();
    buf.extend_from_slice(&tmp);
}

/// Decode an OFS_DELTA distance. Returns (distance, bytes consumed).
pub(crate) fn decode_ofs_distance(data: &[u8], offset: u64) -> PackResult<(u64, usize)> {
    let corrupt = |reason: &str| PackError::CorruptEntry {
        offset,
        reason: reason.into(),
    };
    let mut byte = *data.first().ok_or_else(|| corrupt("truncated delta offset"))?;
    let mut distance = u64::from(byte & 0x7f);
    let mut pos = 1;
    while byte & 0x80 != 0 {
        byte = *data.get(pos).ok_or_else(|| corrupt("truncated delta offset"))?;
        if distance > (u64::MAX >> 8) {
            return Err(corrupt("delta offset overflow"));
        }
        distance = ((distance + 1) << 7) | u64::from(byte & 0x7f);
        pos += 1;
    }
    Ok((distance, pos))
}

/// Encode a u64 as a little-endian base-128 varint (delta size fields).
pub(crate) fn encode_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value > 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Decode a little-endian base-128 varint. Returns (value, bytes consumed).
pub(crate) fn decode_varint(data: &[u8]) -> PackResult<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0;
    for (i, &byte) in data.iter().enumerate() {
        value |= u64::from(byte & 0x7F) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        if shift >= 64 {
            return Err(PackError::InvalidDelta("varint overflow".into()));
        }
    }
    Err(PackError::InvalidDelta("truncated varint".into()))
}
