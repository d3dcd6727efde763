//! Git pack files for oxgit.
//!
//! Reads and writes the version 2 pack format and its version 2 index, so
//! repositories packed by `git gc` can be read and packs written here can be
//! read by git.
//!
//! # Architecture
//!
//! - **Pack file** (`.pack`): `PACK` header, zlib-deflated entries, SHA-1 trailer
//! - **Pack index** (`.idx`): fan-out table + sorted ids, CRC32s and offsets
//! - **PackReader**: memory-mapped random access with OFS/REF delta resolution
//! - **PackWriter**: builds packs from whole objects
//! - **PackStore**: the `ObjectStore` backend over `objects/pack/`

pub mod delta;
pub mod entry;
pub mod error;
pub mod index;
pub mod reader;
pub mod store;
pub mod writer;

pub use delta::{apply_delta, encode_delta, DeltaOp};
pub use entry::PackEntryType;
pub use error::{PackError, PackResult};
pub use index::PackIndex;
pub use reader::{PackReader, MAX_DELTA_CHAIN};
pub use store::PackStore;
pub use writer::{PackFile, PackWriter};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{encode_entry_header, encode_ofs_distance};
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use oxgit_hash::Sha1Stream;
    use oxgit_store::{Blob, ObjectStore, RawObject};
    use oxgit_types::{ObjectKind, Oid, OidPrefix};
    use std::io::Write;
    use std::path::Path;

    fn blob(content: &[u8]) -> RawObject {
        Blob::new(content.to_vec()).to_raw()
    }

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    enum Spec<'a> {
        Full(&'a RawObject),
        Ofs { base: usize, delta: Vec<u8>, result: Oid },
        Ref { base: Oid, delta: Vec<u8>, result: Oid },
    }

    /// Assemble a pack by hand, including delta entries.
    fn build_pack(specs: &[Spec<'_>]) -> (Vec<u8>, PackIndex) {
        let mut pack = b"PACK".to_vec();
        pack.extend_from_slice(&2u32.to_be_bytes());
        pack.extend_from_slice(&(specs.len() as u32).to_be_bytes());
        let mut offsets = Vec::new();
        let mut entries = Vec::new();
        for spec in specs {
            let offset = pack.len();
            offsets.push(offset);
            let id = match spec {
                Spec::Full(raw) => {
                    encode_entry_header(&mut pack, PackEntryType::Full(raw.kind), raw.size());
                    pack.extend_from_slice(&deflate(&raw.data));
                    raw.compute_id()
                }
                Spec::Ofs { base, delta, result } => {
                    encode_entry_header(&mut pack, PackEntryType::OfsDelta, delta.len() as u64);
                    encode_ofs_distance(&mut pack, (offset - offsets[*base]) as u64);
                    pack.extend_from_slice(&deflate(delta));
                    *result
                }
                Spec::Ref { base, delta, result } => {
                    encode_entry_header(&mut pack, PackEntryType::RefDelta, delta.len() as u64);
                    pack.extend_from_slice(base.as_bytes());
                    pack.extend_from_slice(&deflate(delta));
                    *result
                }
            };
            entries.push((id, crc32fast::hash(&pack[offset..]), offset as u64));
        }
        let checksum = Sha1Stream::digest(&pack);
        pack.extend_from_slice(&checksum);
        (pack, PackIndex::build(entries, checksum))
    }

    fn write_pack(dir: &Path, objects: &[RawObject]) -> PackFile {
        let mut writer = PackWriter::new(dir);
        for obj in objects {
            writer.add_object(obj);
        }
        writer.finish().unwrap()
    }

    // -----------------------------------------------------------------------
    // Writer / reader roundtrip
    // -----------------------------------------------------------------------

    #[test]
    fn roundtrip_in_memory() {
        let objects: Vec<RawObject> = (0..10)
            .map(|i| blob(format!("object-{i}").as_bytes()))
            .collect();
        let mut writer = PackWriter::new(Path::new("unused"));
        let ids: Vec<Oid> = objects.iter().map(|o| writer.add_object(o)).collect();
        writer.add_object(&objects[0]);
        assert_eq!(writer.len(), 10);

        let (bytes, idx) = writer.finish_to_bytes().unwrap();
        let reader = PackReader::from_bytes(bytes, idx).unwrap();
        reader.verify_checksum().unwrap();
        assert_eq!(reader.object_count(), 10);
        for (i, id) in ids.iter().enumerate() {
            let obj = reader.read_object(id).unwrap().unwrap();
            assert_eq!(obj.kind, ObjectKind::Blob);
            assert_eq!(obj.data, format!("object-{i}").into_bytes());
        }
        assert!(reader.read_object(&Oid::zero()).unwrap().is_none());
    }

    #[test]
    fn empty_pack() {
        let writer = PackWriter::new(Path::new("unused"));
        assert!(writer.is_empty());
        let (bytes, idx) = writer.finish_to_bytes().unwrap();
        assert_eq!(bytes.len(), 32);
        let reader = PackReader::from_bytes(bytes, idx).unwrap();
        assert_eq!(reader.object_count(), 0);
    }

    #[test]
    fn disk_roundtrip_uses_checksum_name() {
        let dir = tempfile::tempdir().unwrap();
        let raw = blob(b"disk roundtrip");
        let pack = write_pack(dir.path(), &[raw.clone()]);
        let name = pack.pack_path.file_name().unwrap().to_str().unwrap();
        assert_eq!(name, format!("pack-{}.pack", Oid::from_raw(pack.checksum).to_hex()));
        assert!(pack.index_path.is_file());

        let reader = PackReader::open(&pack.pack_path).unwrap();
        assert_eq!(reader.read_object(&raw.compute_id()).unwrap(), Some(raw));
    }

    #[test]
    fn large_object_compresses() {
        let raw = blob(&vec![0xABu8; 100_000]);
        let mut writer = PackWriter::new(Path::new("unused"));
        let id = writer.add_object(&raw);
        let (bytes, idx) = writer.finish_to_bytes().unwrap();
        assert!(bytes.len() < 100_000);
        let reader = PackReader::from_bytes(bytes, idx).unwrap();
        assert_eq!(reader.read_object(&id).unwrap().unwrap().data.len(), 100_000);
    }

    // -----------------------------------------------------------------------
    // Deltas
    // -----------------------------------------------------------------------

    #[test]
    fn ofs_delta_chain_resolves() {
        let base = blob(b"hello world, this is the base object");
        let v1 = blob(b"hello world, this is version one");
        let v2 = blob(b"hello world, this is version one, extended");

        let d1 = encode_delta(
            base.size(),
            v1.size(),
            &[DeltaOp::Copy { offset: 0, size: 21 }, DeltaOp::Insert(b"version one")],
        );
        let d2 = encode_delta(
            v1.size(),
            v2.size(),
            &[DeltaOp::Copy { offset: 0, size: 32 }, DeltaOp::Insert(b", extended")],
        );
        let (bytes, idx) = build_pack(&[
            Spec::Full(&base),
            Spec::Ofs { base: 0, delta: d1, result: v1.compute_id() },
            Spec::Ofs { base: 1, delta: d2, result: v2.compute_id() },
        ]);
        let reader = PackReader::from_bytes(bytes, idx).unwrap();
        assert_eq!(reader.read_object(&v1.compute_id()).unwrap(), Some(v1));
        assert_eq!(reader.read_object(&v2.compute_id()).unwrap(), Some(v2));
    }

    #[test]
    fn ref_delta_resolves_within_pack() {
        let base = blob(b"abcdefghij");
        let target = blob(b"abcdeXYZ");
        let delta = encode_delta(
            base.size(),
            target.size(),
            &[DeltaOp::Copy { offset: 0, size: 5 }, DeltaOp::Insert(b"XYZ")],
        );
        let (bytes, idx) = build_pack(&[
            Spec::Full(&base),
            Spec::Ref { base: base.compute_id(), delta, result: target.compute_id() },
        ]);
        let reader = PackReader::from_bytes(bytes, idx).unwrap();
        assert_eq!(reader.read_object(&target.compute_id()).unwrap(), Some(target));
    }

    #[test]
    fn ref_delta_missing_base() {
        let target = blob(b"xyz");
        let missing = blob(b"never packed").compute_id();
        let delta = encode_delta(12, 3, &[DeltaOp::Insert(b"xyz")]);
        let (bytes, idx) = build_pack(&[Spec::Ref {
            base: missing,
            delta,
            result: target.compute_id(),
        }]);
        let reader = PackReader::from_bytes(bytes, idx).unwrap();
        assert!(matches!(
            reader.read_object(&target.compute_id()),
            Err(PackError::DeltaBaseNotFound(id)) if id == missing
        ));
    }

    #[test]
    fn wrong_result_is_hash_mismatch() {
        let base = blob(b"base");
        let claimed = blob(b"claimed").compute_id();
        let delta = encode_delta(4, 5, &[DeltaOp::Insert(b"other")]);
        let (bytes, idx) = build_pack(&[
            Spec::Full(&base),
            Spec::Ofs { base: 0, delta, result: claimed },
        ]);
        let reader = PackReader::from_bytes(bytes, idx).unwrap();
        assert!(matches!(
            reader.read_object(&claimed),
            Err(PackError::HashMismatch { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Corruption
    // -----------------------------------------------------------------------

    #[test]
    fn flipped_byte_fails_crc() {
        let raw = blob(b"some content that will be corrupted");
        let mut writer = PackWriter::new(Path::new("unused"));
        let id = writer.add_object(&raw);
        let (mut bytes, idx) = writer.finish_to_bytes().unwrap();
        bytes[14] ^= 0x01;
        let reader = PackReader::from_bytes(bytes, idx).unwrap();
        assert!(matches!(
            reader.read_object(&id),
            Err(PackError::CrcMismatch { offset: 12 })
        ));
        assert!(reader.verify_checksum().is_err());
    }

    #[test]
    fn bad_header_rejected() {
        let (mut bytes, idx) = PackWriter::new(Path::new("unused")).finish_to_bytes().unwrap();
        bytes[0..4].copy_from_slice(b"KCAP");
        assert!(matches!(
            PackReader::from_bytes(bytes.clone(), idx.clone()),
            Err(PackError::InvalidMagic { .. })
        ));
        bytes[0..4].copy_from_slice(b"PACK");
        bytes[4..8].copy_from_slice(&9u32.to_be_bytes());
        assert!(matches!(
            PackReader::from_bytes(bytes, idx.clone()),
            Err(PackError::UnsupportedVersion(9))
        ));
        assert!(PackReader::from_bytes(vec![1, 2, 3], idx).is_err());
    }

    #[test]
    fn mismatched_index_rejected() {
        let (bytes, _) = {
            let mut w = PackWriter::new(Path::new("unused"));
            w.add_object(&blob(b"a"));
            w.finish_to_bytes().unwrap()
        };
        let (_, other_idx) = {
            let mut w = PackWriter::new(Path::new("unused"));
            w.add_object(&blob(b"b"));
            w.finish_to_bytes().unwrap()
        };
        assert!(matches!(
            PackReader::from_bytes(bytes, other_idx),
            Err(PackError::ChecksumMismatch(_))
        ));
    }

    // -----------------------------------------------------------------------
    // PackStore
    // -----------------------------------------------------------------------

    #[test]
    fn store_reads_across_packs_and_refreshes() {
        let dir = tempfile::tempdir().unwrap();
        let a = blob(b"in first pack");
        let b = blob(b"in second pack");
        write_pack(dir.path(), &[a.clone()]);

        let store = PackStore::open(dir.path()).unwrap();
        assert_eq!(store.pack_count(), 1);
        assert!(store.exists(&a.compute_id()).unwrap());
        assert!(!store.exists(&b.compute_id()).unwrap());

        write_pack(dir.path(), &[b.clone()]);
        store.refresh().unwrap();
        assert_eq!(store.pack_count(), 2);
        assert_eq!(store.total_objects().unwrap(), 2);
        assert_eq!(store.read(&b.compute_id()).unwrap(), Some(b));

        let obj = store.lookup(&a.compute_id(), Some(ObjectKind::Blob)).unwrap();
        assert_eq!(obj.id(), a.compute_id());
    }

    #[test]
    fn store_is_read_only_and_tolerates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = PackStore::open(dir.path().join("does-not-exist")).unwrap();
        assert_eq!(store.pack_count(), 0);
        assert!(!store.is_writable());
        assert!(store.write(&blob(b"x")).is_err());
    }

    #[test]
    fn store_prefix_search() {
        let dir = tempfile::tempdir().unwrap();
        let hello = blob(b"hello");
        write_pack(dir.path(), &[hello.clone(), blob(b"other")]);
        let store = PackStore::open(dir.path()).unwrap();
        let prefix = OidPrefix::parse("b6fc4c").unwrap();
        assert_eq!(store.resolve_prefix(&prefix).unwrap(), hello.compute_id());
    }
}
