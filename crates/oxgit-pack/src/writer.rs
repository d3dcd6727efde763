use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use oxgit_hash::Sha1Stream;
use oxgit_store::RawObject;
use oxgit_types::{Oid, OID_RAW_LEN};
use tracing::debug;

use crate::entry::{encode_entry_header, PackEntryType};
use crate::error::{PackError, PackResult};
use crate::index::PackIndex;
use crate::reader::{PACK_HEADER_LEN, PACK_MAGIC};

/// Result of writing a pack to disk.
#[derive(Clone, Debug)]
pub struct PackFile {
    pub pack_path: PathBuf,
    pub index_path: PathBuf,
    pub object_count: usize,
    pub checksum: [u8; OID_RAW_LEN],
}

/// Builds a version 2 pack and its index from whole objects.
///
/// Entries are stored undeltified in insertion order. Adding the same
/// object twice keeps the first copy.
pub struct PackWriter {
    dir: PathBuf,
    compression: Compression,
    seen: HashSet<Oid>,
    entries: Vec<(Oid, RawObject)>,
}

impl PackWriter {
    /// Create a writer that will place `pack-<checksum>.{pack,idx}` in `dir`.
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            compression: Compression::default(),
            seen: HashSet::new(),
            entries: Vec::new(),
        }
    }

    pub fn with_compression(mut self, level: u32) -> Self {
        self.compression = Compression::new(level.min(9));
        self
    }

    /// Queue an object and return its id.
    pub fn add_object(&mut self, object: &RawObject) -> Oid {
        let id = object.compute_id();
        if self.seen.insert(id) {
            self.entries.push((id, object.clone()));
        }
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the pack and index, each through a temp file renamed into
    /// place. The pack is renamed before its index.
    pub fn finish(self) -> PackResult<PackFile> {
        std::fs::create_dir_all(&self.dir)?;
        let dir = self.dir.clone();
        let (pack_data, index) = self.finish_to_bytes()?;

        let name = format!("pack-{}", Oid::from_raw(index.pack_checksum).to_hex());
        let pack_path = dir.join(format!("{name}.pack"));
        let index_path = dir.join(format!("{name}.idx"));

        persist(&dir, &pack_path, &pack_data)?;
        persist(&dir, &index_path, &index.to_bytes()?)?;
        debug!(path = %pack_path.display(), objects = index.object_count(), "wrote pack");

        Ok(PackFile {
            pack_path,
            index_path,
            object_count: index.object_count(),
            checksum: index.pack_checksum,
        })
    }

    /// Build pack bytes and index in memory (no disk I/O).
    pub fn finish_to_bytes(self) -> PackResult<(Vec<u8>, PackIndex)> {
        let count = self.entries.len();
        let count32 = u32::try_from(count).map_err(|_| PackError::TooManyObjects(count))?;

        let mut pack_data = Vec::with_capacity(PACK_HEADER_LEN + OID_RAW_LEN);
        pack_data.extend_from_slice(PACK_MAGIC);
        pack_data.extend_from_slice(&2u32.to_be_bytes());
        pack_data.extend_from_slice(&count32.to_be_bytes());

        let mut index_entries = Vec::with_capacity(count);
        for (id, object) in &self.entries {
            let offset = pack_data.len();
            encode_entry_header(
                &mut pack_data,
                PackEntryType::Full(object.kind),
                object.size(),
            );
            let mut encoder = ZlibEncoder::new(Vec::new(), self.compression);
            encoder.write_all(&object.data)?;
            pack_data.extend_from_slice(&encoder.finish()?);

            let crc = crc32fast::hash(&pack_data[offset..]);
            index_entries.push((*id, crc, offset as u64));
        }

        let checksum = Sha1Stream::digest(&pack_data);
        pack_data.extend_from_slice(&checksum);

        let index = PackIndex::build(index_entries, checksum);
        Ok((pack_data, index))
    }
}

fn persist(dir: &Path, path: &Path, bytes: &[u8]) -> PackResult<()> {
    let mut tmp = tempfile::Builder::new().prefix("tmp_pack_").tempfile_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| PackError::Io(e.error))?;
    Ok(())
}
