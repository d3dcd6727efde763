use std::fs::File;
use std::io::Read;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use flate2::bufread::ZlibDecoder;
use memmap2::Mmap;
use oxgit_hash::Sha1Stream;
use oxgit_store::RawObject;
use oxgit_types::{ObjectKind, Oid, OidPrefix, OID_RAW_LEN};
use tracing::{debug, warn};

use crate::delta::apply_delta;
use crate::entry::{decode_entry_header, decode_ofs_distance, PackEntryType};
use crate::error::{PackError, PackResult};
use crate::index::PackIndex;

pub(crate) const PACK_MAGIC: &[u8; 4] = b"PACK";
pub(crate) const PACK_HEADER_LEN: usize = 12;

/// Longest delta chain followed before the pack is declared corrupt.
pub const MAX_DELTA_CHAIN: usize = 4095;

enum PackData {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for PackData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Mapped(m) => &m[..],
            Self::Owned(v) => v.as_slice(),
        }
    }
}

/// Reads objects from a pack file using its index for random access.
pub struct PackReader {
    path: Option<PathBuf>,
    data: PackData,
    index: PackIndex,
    /// (entry offset, index position), sorted by offset.
    by_offset: Vec<(u64, usize)>,
}

/// One decoded entry header.
struct RawEntry {
    ty: PackEntryType,
    size: u64,
    /// Start of the zlib stream.
    body: usize,
    /// Exclusive end of the entry (start of the next one).
    end: usize,
    /// Offset of the delta base, if any.
    base: Option<u64>,
}

impl PackReader {
    /// Wrap pack bytes and their parsed index.
    pub fn from_bytes(pack_data: Vec<u8>, index: PackIndex) -> PackResult<Self> {
        Self::new(None, PackData::Owned(pack_data), index)
    }

    /// Memory-map `pack-*.pack` and load the `.idx` next to it.
    pub fn open(pack_path: &Path) -> PackResult<Self> {
        let index_data = std::fs::read(pack_path.with_extension("idx"))?;
        let index = PackIndex::from_bytes(&index_data)?;
        let file = File::open(pack_path)?;
        // SAFETY: pack files are immutable once renamed into place; git and
        // oxgit only ever create new packs and delete whole files.
        let map = unsafe { Mmap::map(&file)? };
        let reader = Self::new(Some(pack_path.to_path_buf()), PackData::Mapped(map), index)?;
        debug!(path = %pack_path.display(), objects = reader.object_count(), "opened pack");
        Ok(reader)
    }

    fn new(path: Option<PathBuf>, data: PackData, index: PackIndex) -> PackResult<Self> {
        if data.len() < PACK_HEADER_LEN + OID_RAW_LEN {
            return Err(PackError::CorruptEntry {
                offset: 0,
                reason: "pack data too short".into(),
            });
        }
        if &data[0..4] != PACK_MAGIC {
            return Err(PackError::InvalidMagic {
                expected: "PACK".into(),
                actual: String::from_utf8_lossy(&data[0..4]).into(),
            });
        }
        let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        if version != 2 && version != 3 {
            return Err(PackError::UnsupportedVersion(version));
        }
        let count = u32::from_be_bytes([data[8], data[9], data[10], data[11]]) as usize;
        if count != index.object_count() {
            return Err(PackError::IndexCorrupted(format!(
                "pack has {count} objects, index has {}",
                index.object_count()
            )));
        }
        let trailer = &data[data.len() - OID_RAW_LEN..];
        if trailer != index.pack_checksum {
            return Err(PackError::ChecksumMismatch("pack/index pairing"));
        }

        let mut by_offset: Vec<(u64, usize)> = index
            .offsets
            .iter()
            .enumerate()
            .map(|(i, &off)| (off, i))
            .collect();
        by_offset.sort_unstable();

        Ok(Self {
            path,
            data,
            index,
            by_offset,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn contains(&self, id: &Oid) -> bool {
        self.index.contains(id)
    }

    pub fn object_count(&self) -> usize {
        self.index.object_count()
    }

    pub fn index(&self) -> &PackIndex {
        &self.index
    }

    /// All object ids in the pack, sorted.
    pub fn object_ids(&self) -> &[Oid] {
        &self.index.object_ids
    }

    pub fn find_by_prefix(&self, prefix: &OidPrefix) -> Vec<Oid> {
        self.index.find_by_prefix(prefix)
    }

    /// Recompute the SHA-1 over the whole pack and compare with its trailer.
    pub fn verify_checksum(&self) -> PackResult<()> {
        let split = self.data.len() - OID_RAW_LEN;
        if Sha1Stream::digest(&self.data[..split])[..] != self.data[split..] {
            return Err(PackError::ChecksumMismatch("pack"));
        }
        Ok(())
    }

    /// Read an object by id, resolving any delta chain.
    pub fn read_object(&self, id: &Oid) -> PackResult<Option<RawObject>> {
        let Some((offset, _)) = self.index.lookup(id) else {
            return Ok(None);
        };
        let (kind, data) = self.read_at(offset)?;
        let raw = RawObject::new(kind, data);
        let computed = raw.compute_id();
        if computed != *id {
            warn!(id = %id, computed = %computed, "packed object hash mismatch");
            return Err(PackError::HashMismatch { id: *id, computed });
        }
        Ok(Some(raw))
    }

    /// Read the fully resolved object whose entry starts at `offset`.
    pub fn read_at(&self, offset: u64) -> PackResult<(ObjectKind, Vec<u8>)> {
        let mut deltas = Vec::new();
        let mut current = offset;
        let (kind, mut data) = loop {
            let entry = self.entry(current)?;
            match entry.ty {
                PackEntryType::Full(kind) => break (kind, self.inflate(current, &entry)?),
                PackEntryType::OfsDelta | PackEntryType::RefDelta => {
                    if deltas.len() >= MAX_DELTA_CHAIN {
                        return Err(PackError::DeltaTooDeep {
                            offset,
                            limit: MAX_DELTA_CHAIN,
                        });
                    }
                    deltas.push(self.inflate(current, &entry)?);
                    current = entry.base.ok_or_else(|| PackError::CorruptEntry {
                        offset: current,
                        reason: "delta without base".into(),
                    })?;
                }
            }
        };
        for delta in deltas.iter().rev() {
            data = apply_delta(&data, delta)?;
        }
        Ok((kind, data))
    }

    fn entry_end(&self, offset: u64) -> PackResult<(usize, u32)> {
        let pos = self
            .by_offset
            .binary_search_by(|(off, _)| off.cmp(&offset))
            .map_err(|_| PackError::CorruptEntry {
                offset,
                reason: "offset is not an entry boundary".into(),
            })?;
        let end = match self.by_offset.get(pos + 1) {
            Some((next, _)) => *next as usize,
            None => self.data.len() - OID_RAW_LEN,
        };
        Ok((end, self.index.crc32s[self.by_offset[pos].1]))
    }

    fn entry(&self, offset: u64) -> PackResult<RawEntry> {
        let start = offset as usize;
        if start < PACK_HEADER_LEN || start >= self.data.len() - OID_RAW_LEN {
            return Err(PackError::CorruptEntry {
                offset,
                reason: "offset outside pack body".into(),
            });
        }
        let (end, crc) = self.entry_end(offset)?;
        if end <= start || end > self.data.len() - OID_RAW_LEN {
            return Err(PackError::CorruptEntry {
                offset,
                reason: "entry extends outside pack body".into(),
            });
        }
        let bytes = &self.data[start..end];
        if crc32fast::hash(bytes) != crc {
            return Err(PackError::CrcMismatch { offset });
        }

        let (ty, size, mut used) = decode_entry_header(bytes, offset)?;
        let base = match ty {
            PackEntryType::Full(_) => None,
            PackEntryType::OfsDelta => {
                let (distance, n) = decode_ofs_distance(&bytes[used..], offset)?;
                used += n;
                if distance == 0 || distance > offset {
                    return Err(PackError::CorruptEntry {
                        offset,
                        reason: "delta base offset out of range".into(),
                    });
                }
                Some(offset - distance)
            }
            PackEntryType::RefDelta => {
                let raw = bytes
                    .get(used..used + OID_RAW_LEN)
                    .ok_or_else(|| PackError::CorruptEntry {
                        offset,
                        reason: "truncated base id".into(),
                    })?;
                used += OID_RAW_LEN;
                let base_id = Oid::from_slice(raw).map_err(|e| PackError::CorruptEntry {
                    offset,
                    reason: e.to_string(),
                })?;
                let (base_offset, _) = self
                    .index
                    .lookup(&base_id)
                    .ok_or(PackError::DeltaBaseNotFound(base_id))?;
                Some(base_offset)
            }
        };

        Ok(RawEntry {
            ty,
            size,
            body: start + used,
            end,
            base,
        })
    }

    fn inflate(&self, offset: u64, entry: &RawEntry) -> PackResult<Vec<u8>> {
        let mut out = Vec::with_capacity(entry.size as usize);
        ZlibDecoder::new(&self.data[entry.body..entry.end])
            .read_to_end(&mut out)
            .map_err(|e| PackError::DecompressionFailed {
                offset,
                reason: e.to_string(),
            })?;
        if out.len() as u64 != entry.size {
            return Err(PackError::CorruptEntry {
                offset,
                reason: format!("inflated {} bytes, header says {}", out.len(), entry.size),
            });
        }
        Ok(out)
    }
}

impl std::fmt::Debug for PackReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackReader")
            .field("path", &self.path)
            .field("objects", &self.object_count())
            .finish()
    }
}
