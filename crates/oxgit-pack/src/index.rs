use oxgit_hash::Sha1Stream;
use oxgit_types::{Oid, OidPrefix, OID_RAW_LEN};

use crate::error::{PackError, PackResult};

const IDX_MAGIC: [u8; 4] = [0xff, b't', b'O', b'c'];
const IDX_VERSION: u32 = 2;
const LARGE_OFFSET_FLAG: u32 = 0x8000_0000;

/// Pack index (git index format v2) for random access into a pack.
///
/// Layout:
/// - magic `\377tOc`, version 2
/// - fan-out table: 256 big-endian counts of ids with first byte <= i
/// - sorted object ids
/// - CRC32 of each packed entry (parallel)
/// - 31-bit offsets; the high bit selects a slot in the 64-bit table
/// - 64-bit offsets for packs over 2 GiB
/// - pack checksum, then SHA-1 of the index itself
#[derive(Clone, Debug)]
pub struct PackIndex {
    pub fan_out: [u32; 256],
    pub object_ids: Vec<Oid>,
    pub crc32s: Vec<u32>,
    pub offsets: Vec<u64>,
    pub pack_checksum: [u8; OID_RAW_LEN],
}

impl PackIndex {
    /// Build an index from (id, crc32, offset) entries and a pack checksum.
    pub fn build(mut entries: Vec<(Oid, u32, u64)>, pack_checksum: [u8; OID_RAW_LEN]) -> Self {
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut fan_out = [0u32; 256];
        for (id, _, _) in &entries {
            fan_out[usize::from(id.as_bytes()[0])] += 1;
        }
        for i in 1..256 {
            fan_out[i] += fan_out[i - 1];
        }

        let mut object_ids = Vec::with_capacity(entries.len());
        let mut crc32s = Vec::with_capacity(entries.len());
        let mut offsets = Vec::with_capacity(entries.len());
        for (id, crc, offset) in entries {
            object_ids.push(id);
            crc32s.push(crc);
            offsets.push(offset);
        }

        Self {
            fan_out,
            object_ids,
            crc32s,
            offsets,
            pack_checksum,
        }
    }

    fn bucket(&self, first_byte: u8) -> (usize, usize) {
        let i = usize::from(first_byte);
        let start = if i == 0 { 0 } else { self.fan_out[i - 1] as usize };
        (start, self.fan_out[i] as usize)
    }

    /// Position of `id` in the sorted id table.
    pub fn position(&self, id: &Oid) -> Option<usize> {
        let (start, end) = self.bucket(id.as_bytes()[0]);
        self.object_ids[start..end]
            .binary_search(id)
            .ok()
            .map(|pos| start + pos)
    }

    /// Look up an object's (offset, crc32) by id.
    pub fn lookup(&self, id: &Oid) -> Option<(u64, u32)> {
        self.position(id).map(|i| (self.offsets[i], self.crc32s[i]))
    }

    /// All ids that start with `prefix`.
    pub fn find_by_prefix(&self, prefix: &OidPrefix) -> Vec<Oid> {
        let (start, end) = self.bucket(prefix.first_byte());
        let bucket = &self.object_ids[start..end];
        let min = prefix.min_oid();
        let from = bucket.partition_point(|id| *id < min);
        bucket[from..]
            .iter()
            .take_while(|id| prefix.matches(id))
            .copied()
            .collect()
    }

    pub fn object_count(&self) -> usize {
        self.object_ids.len()
    }

    pub fn contains(&self, id: &Oid) -> bool {
        self.position(id).is_some()
    }

    /// Serialize to the v2 on-disk format, including the trailing checksum.
    pub fn to_bytes(&self) -> PackResult<Vec<u8>> {
        let count = self.object_ids.len();
        if count > u32::MAX as usize {
            return Err(PackError::TooManyObjects(count));
        }
        let mut buf = Vec::with_capacity(8 + 1024 + count * 28 + 40);
        buf.extend_from_slice(&IDX_MAGIC);
        buf.extend_from_slice(&IDX_VERSION.to_be_bytes());
        for &count in &self.fan_out {
            buf.extend_from_slice(&count.to_be_bytes());
        }
        for id in &self.object_ids {
            buf.extend_from_slice(id.as_bytes());
        }
        for &crc in &self.crc32s {
            buf.extend_from_slice(&crc.to_be_bytes());
        }

        let mut large = Vec::new();
        for &offset in &self.offsets {
            let slot = if offset < u64::from(LARGE_OFFSET_FLAG) {
                offset as u32
            } else {
                large.push(offset);
                LARGE_OFFSET_FLAG | (large.len() - 1) as u32
            };
            buf.extend_from_slice(&slot.to_be_bytes());
        }
        for offset in large {
            buf.extend_from_slice(&offset.to_be_bytes());
        }

        buf.extend_from_slice(&self.pack_checksum);
        let checksum = Sha1Stream::digest(&buf);
        buf.extend_from_slice(&checksum);
        Ok(buf)
    }

    /// Parse and verify a v2 index.
    pub fn from_bytes(data: &[u8]) -> PackResult<Self> {
        if data.len() < 8 {
            return Err(PackError::IndexCorrupted("too short".into()));
        }
        if data[0..4] != IDX_MAGIC {
            return Err(PackError::InvalidMagic {
                expected: "\\377tOc".into(),
                actual: String::from_utf8_lossy(&data[0..4]).into(),
            });
        }
        let version = read_u32(data, 4);
        if version != IDX_VERSION {
            return Err(PackError::UnsupportedVersion(version));
        }

        let mut pos = 8;
        if data.len() < pos + 256 * 4 {
            return Err(PackError::IndexCorrupted("fan-out truncated".into()));
        }
        let mut fan_out = [0u32; 256];
        for entry in fan_out.iter_mut() {
            *entry = read_u32(data, pos);
            pos += 4;
        }
        if fan_out.windows(2).any(|w| w[0] > w[1]) {
            return Err(PackError::IndexCorrupted("fan-out is not monotonic".into()));
        }

        let count = fan_out[255] as usize;
        let needed = pos + count * (OID_RAW_LEN + 4 + 4) + 2 * OID_RAW_LEN;
        if data.len() < needed {
            return Err(PackError::IndexCorrupted("tables truncated".into()));
        }

        let (body, trailer) = data.split_at(data.len() - OID_RAW_LEN);
        if Sha1Stream::digest(body)[..] != trailer[..] {
            return Err(PackError::ChecksumMismatch("index"));
        }

        let mut object_ids = Vec::with_capacity(count);
        for _ in 0..count {
            object_ids.push(
                Oid::from_slice(&data[pos..pos + OID_RAW_LEN])
                    .map_err(|e| PackError::IndexCorrupted(e.to_string()))?,
            );
            pos += OID_RAW_LEN;
        }
        if object_ids.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PackError::IndexCorrupted("ids are not sorted".into()));
        }

        let mut crc32s = Vec::with_capacity(count);
        for _ in 0..count {
            crc32s.push(read_u32(data, pos));
            pos += 4;
        }

        let mut small = Vec::with_capacity(count);
        for _ in 0..count {
            small.push(read_u32(data, pos));
            pos += 4;
        }
        let large_start = pos;
        let large_end = data.len() - 2 * OID_RAW_LEN;
        let mut offsets = Vec::with_capacity(count);
        for slot in small {
            if slot & LARGE_OFFSET_FLAG == 0 {
                offsets.push(u64::from(slot));
                continue;
            }
            let at = large_start + (slot & !LARGE_OFFSET_FLAG) as usize * 8;
            if at + 8 > large_end {
                return Err(PackError::IndexCorrupted("large offset out of range".into()));
            }
            offsets.push(read_u64(data, at));
        }

        let mut pack_checksum = [0u8; OID_RAW_LEN];
        pack_checksum.copy_from_slice(&data[large_end..large_end + OID_RAW_LEN]);

        Ok(Self {
            fan_out,
            object_ids,
            crc32s,
            offsets,
            pack_checksum,
        })
    }
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&data[at..at + 4]);
    u32::from_be_bytes(b)
}

fn read_u64(data: &[u8], at: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&data[at..at + 8]);
    u64::from_be_bytes(b)
}
