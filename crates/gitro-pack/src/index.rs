//! Pack index reading and lookup, formats v1 and v2.
//!
//! Both formats map sorted fingerprints to pack offsets through a 256-entry
//! fanout table. Layouts:
//!
//! ```text
//! v1:  Fanout:  256 × 4-byte big-endian cumulative counts
//!      Records: N × (4-byte offset | 20-byte fingerprint), sorted
//!      Trailer: 20-byte pack checksum | 20-byte index checksum
//!
//! v2:  Header:  \xff tOc (4 bytes) | version (4 bytes = 2)
//!      Fanout:  256 × 4-byte big-endian cumulative counts
//!      OIDs:    N × 20-byte sorted fingerprints
//!      CRC32:   N × 4-byte CRC32 values (unused here)
//!      Offsets: N × 4-byte offsets (high bit set → 64-bit table, rejected)
//!      Trailer: 20-byte pack checksum | 20-byte index checksum
//! ```

use std::fs::File;
use std::path::{Path, PathBuf};

use gitro_hash::ObjectId;
use memmap2::Mmap;

use crate::lock::SharedLock;
use crate::{PackError, IDX_V2_SIGNATURE, IDX_V2_VERSION};

const FANOUT_SIZE: usize = 256 * 4;
const OID_LEN: usize = 20;
const V1_RECORD_LEN: usize = 4 + OID_LEN;

/// Index format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexVersion {
    V1,
    V2,
}

/// An open, memory-mapped pack index.
#[derive(Debug)]
pub struct PackIndex {
    file: File,
    data: Mmap,
    version: IndexVersion,
    num_objects: u32,
    /// Byte offset where the fanout table starts (0 for v1, 8 for v2).
    fanout_offset: usize,
    /// Byte offset where sorted fingerprints start (v2 only).
    oid_offset: usize,
    /// Byte offset where the 32-bit offset table starts (v2 only).
    offset32_offset: usize,
    idx_path: PathBuf,
}

impl PackIndex {
    /// Open a pack index file, sniffing the format version.
    pub fn open(idx_path: impl AsRef<Path>) -> Result<Self, PackError> {
        let idx_path = idx_path.as_ref().to_path_buf();
        let file = File::open(&idx_path)?;
        let data = unsafe { Mmap::map(&file)? };

        if data.len() < FANOUT_SIZE {
            return Err(PackError::InvalidIndex("file too small".into()));
        }

        let (version, fanout_offset) = if data[0..4] == IDX_V2_SIGNATURE {
            let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
            if version != IDX_V2_VERSION {
                return Err(PackError::UnsupportedIndex(version));
            }
            (IndexVersion::V2, 8)
        } else {
            (IndexVersion::V1, 0)
        };

        if data.len() < fanout_offset + FANOUT_SIZE {
            return Err(PackError::InvalidIndex("file too small".into()));
        }

        let mut index = Self {
            file,
            data,
            version,
            num_objects: 0,
            fanout_offset,
            oid_offset: 0,
            offset32_offset: 0,
            idx_path,
        };

        // Fanout entries must be non-decreasing; the last one is the count.
        let mut prev = 0u32;
        for k in 0..256 {
            let entry = index.fanout_entry(k);
            if entry < prev {
                return Err(PackError::InvalidIndex(format!(
                    "fanout not monotonic at byte {k}"
                )));
            }
            prev = entry;
        }
        index.num_objects = prev;

        let n = index.num_objects as usize;
        let min_size = match version {
            IndexVersion::V1 => FANOUT_SIZE + n * V1_RECORD_LEN,
            IndexVersion::V2 => {
                index.oid_offset = fanout_offset + FANOUT_SIZE;
                index.offset32_offset = index.oid_offset + n * OID_LEN + n * 4;
                index.offset32_offset + n * 4 + 2 * OID_LEN
            }
        };
        if index.data.len() < min_size {
            return Err(PackError::InvalidIndex(format!(
                "file too small: {} < {min_size}",
                index.data.len()
            )));
        }

        Ok(index)
    }

    /// Look up a fingerprint, returning its byte offset in the pack.
    ///
    /// Returns `Ok(None)` when the fingerprint is not in this index. A v2
    /// offset word with the high bit set is rejected.
    pub fn lookup(&self, oid: &ObjectId) -> Result<Option<u64>, PackError> {
        let _lock = SharedLock::acquire(&self.file)?;

        let (lo, hi) = self.fanout_range(oid.first_byte());
        if lo >= hi {
            return Ok(None);
        }

        let target = oid.as_bytes();
        let mut low = lo;
        let mut high = hi;
        while low < high {
            let mid = low + (high - low) / 2;
            match self.oid_bytes_at(mid).cmp(target) {
                std::cmp::Ordering::Less => low = mid + 1,
                std::cmp::Ordering::Greater => high = mid,
                std::cmp::Ordering::Equal => return self.offset_at(mid).map(Some),
            }
        }
        Ok(None)
    }

    /// Total number of objects in this index.
    pub fn num_objects(&self) -> u32 {
        self.num_objects
    }

    /// Index format version.
    pub fn version(&self) -> IndexVersion {
        self.version
    }

    /// Path to the `.idx` file.
    pub fn path(&self) -> &Path {
        &self.idx_path
    }

    /// Fanout window for a first byte: `(start, end)` indices into the
    /// sorted fingerprint list.
    fn fanout_range(&self, first_byte: u8) -> (usize, usize) {
        let end = self.fanout_entry(first_byte as usize) as usize;
        let start = if first_byte == 0 {
            0
        } else {
            self.fanout_entry(first_byte as usize - 1) as usize
        };
        (start, end)
    }

    fn fanout_entry(&self, index: usize) -> u32 {
        let pos = self.fanout_offset + index * 4;
        u32::from_be_bytes([
            self.data[pos],
            self.data[pos + 1],
            self.data[pos + 2],
            self.data[pos + 3],
        ])
    }

    /// Raw fingerprint bytes at sorted position `index`.
    fn oid_bytes_at(&self, index: usize) -> &[u8] {
        let start = match self.version {
            IndexVersion::V1 => FANOUT_SIZE + index * V1_RECORD_LEN + 4,
            IndexVersion::V2 => self.oid_offset + index * OID_LEN,
        };
        &self.data[start..start + OID_LEN]
    }

    /// Pack offset at sorted position `index`.
    fn offset_at(&self, index: usize) -> Result<u64, PackError> {
        let pos = match self.version {
            IndexVersion::V1 => FANOUT_SIZE + index * V1_RECORD_LEN,
            IndexVersion::V2 => self.offset32_offset + index * 4,
        };
        let raw = u32::from_be_bytes([
            self.data[pos],
            self.data[pos + 1],
            self.data[pos + 2],
            self.data[pos + 3],
        ]);
        if self.version == IndexVersion::V2 && raw & 0x8000_0000 != 0 {
            return Err(PackError::UnsupportedLargePack { raw });
        }
        Ok(raw as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IDX_V2_SIGNATURE;

    fn make_oid(first_byte: u8, suffix: u8) -> ObjectId {
        let mut bytes = [0u8; 20];
        bytes[0] = first_byte;
        bytes[19] = suffix;
        ObjectId::from_bytes(&bytes).unwrap()
    }

    fn fanout_for(entries: &[(ObjectId, u64)]) -> [u32; 256] {
        let mut fanout = [0u32; 256];
        for (oid, _) in entries {
            fanout[oid.first_byte() as usize] += 1;
        }
        for i in 1..256 {
            fanout[i] += fanout[i - 1];
        }
        fanout
    }

    /// Build a synthetic v2 index in memory.
    fn build_v2_index(entries: &[(ObjectId, u64)]) -> Vec<u8> {
        let mut sorted: Vec<_> = entries.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));

        let mut buf = Vec::new();
        buf.extend_from_slice(&IDX_V2_SIGNATURE);
        buf.extend_from_slice(&IDX_V2_VERSION.to_be_bytes());
        for count in fanout_for(&sorted) {
            buf.extend_from_slice(&count.to_be_bytes());
        }
        for (oid, _) in &sorted {
            buf.extend_from_slice(oid.as_bytes());
        }
        for _ in &sorted {
            buf.extend_from_slice(&0u32.to_be_bytes()); // CRC32, unused
        }
        for (_, offset) in &sorted {
            buf.extend_from_slice(&(*offset as u32).to_be_bytes());
        }
        buf.extend_from_slice(&[0u8; 40]); // trailer checksums, unchecked
        buf
    }

    /// Build a synthetic v1 index in memory.
    fn build_v1_index(entries: &[(ObjectId, u64)]) -> Vec<u8> {
        let mut sorted: Vec<_> = entries.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));

        let mut buf = Vec::new();
        for count in fanout_for(&sorted) {
            buf.extend_from_slice(&count.to_be_bytes());
        }
        for (oid, offset) in &sorted {
            buf.extend_from_slice(&(*offset as u32).to_be_bytes());
            buf.extend_from_slice(oid.as_bytes());
        }
        buf.extend_from_slice(&[0u8; 40]);
        buf
    }

    fn write_index(data: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.idx");
        std::fs::write(&path, data).unwrap();
        (dir, path)
    }

    #[test]
    fn v2_open_and_lookup() {
        let oid = make_oid(0xab, 0x01);
        let (_dir, path) = write_index(&build_v2_index(&[(oid, 12)]));

        let idx = PackIndex::open(&path).unwrap();
        assert_eq!(idx.version(), IndexVersion::V2);
        assert_eq!(idx.num_objects(), 1);
        assert_eq!(idx.lookup(&oid).unwrap(), Some(12));
        assert_eq!(idx.lookup(&make_oid(0xab, 0x02)).unwrap(), None);
    }

    #[test]
    fn v1_open_and_lookup() {
        let oid = make_oid(0xab, 0x01);
        let (_dir, path) = write_index(&build_v1_index(&[(oid, 12)]));

        let idx = PackIndex::open(&path).unwrap();
        assert_eq!(idx.version(), IndexVersion::V1);
        assert_eq!(idx.num_objects(), 1);
        assert_eq!(idx.lookup(&oid).unwrap(), Some(12));
        assert_eq!(idx.lookup(&make_oid(0x00, 0x00)).unwrap(), None);
    }

    #[test]
    fn v1_and_v2_lookups_agree() {
        let entries = vec![
            (make_oid(0x00, 0x01), 100),
            (make_oid(0x00, 0x02), 200),
            (make_oid(0x0a, 0x01), 300),
            (make_oid(0xab, 0x07), 400),
            (make_oid(0xff, 0x01), 500),
        ];
        let (_d1, p1) = write_index(&build_v1_index(&entries));
        let (_d2, p2) = write_index(&build_v2_index(&entries));
        let v1 = PackIndex::open(&p1).unwrap();
        let v2 = PackIndex::open(&p2).unwrap();

        for (oid, offset) in &entries {
            assert_eq!(v1.lookup(oid).unwrap(), Some(*offset));
            assert_eq!(v1.lookup(oid).unwrap(), v2.lookup(oid).unwrap());
        }
        let missing = make_oid(0x42, 0x42);
        assert_eq!(v1.lookup(&missing).unwrap(), None);
        assert_eq!(v2.lookup(&missing).unwrap(), None);
    }

    #[test]
    fn v2_bad_version_is_rejected() {
        let mut data = build_v2_index(&[]);
        data[4..8].copy_from_slice(&3u32.to_be_bytes());
        let (_dir, path) = write_index(&data);
        assert!(matches!(
            PackIndex::open(&path).unwrap_err(),
            PackError::UnsupportedIndex(3)
        ));
    }

    #[test]
    fn v2_high_bit_offset_is_rejected() {
        let oid = make_oid(0x42, 0x01);
        let mut data = build_v2_index(&[(oid, 0)]);
        // Patch the single offset word to set the high bit.
        let off32_pos = 8 + 1024 + 20 + 4;
        data[off32_pos..off32_pos + 4].copy_from_slice(&0x8000_0000u32.to_be_bytes());
        let (_dir, path) = write_index(&data);

        let idx = PackIndex::open(&path).unwrap();
        assert!(matches!(
            idx.lookup(&oid).unwrap_err(),
            PackError::UnsupportedLargePack { raw: 0x8000_0000 }
        ));
    }

    #[test]
    fn non_monotonic_fanout_is_rejected() {
        let mut data = build_v2_index(&[(make_oid(0x10, 0x01), 12)]);
        // Bucket 0x20 claims fewer objects than bucket 0x10.
        let pos = 8 + 0x20 * 4;
        data[pos..pos + 4].copy_from_slice(&0u32.to_be_bytes());
        let (_dir, path) = write_index(&data);
        assert!(matches!(
            PackIndex::open(&path).unwrap_err(),
            PackError::InvalidIndex(_)
        ));
    }

    #[test]
    fn empty_index() {
        let (_dir, path) = write_index(&build_v2_index(&[]));
        let idx = PackIndex::open(&path).unwrap();
        assert_eq!(idx.num_objects(), 0);
        assert_eq!(idx.lookup(&make_oid(0, 0)).unwrap(), None);
    }

    #[test]
    fn truncated_file_is_rejected() {
        let data = build_v2_index(&[(make_oid(0x42, 0x01), 12)]);
        let (_dir, path) = write_index(&data[..data.len() - 48]);
        assert!(matches!(
            PackIndex::open(&path).unwrap_err(),
            PackError::InvalidIndex(_)
        ));
    }

    #[test]
    fn lookup_many_within_one_bucket() {
        let entries: Vec<_> = (0u8..32)
            .map(|i| (make_oid(0x55, i), 1000 + i as u64))
            .collect();
        let (_dir, path) = write_index(&build_v2_index(&entries));
        let idx = PackIndex::open(&path).unwrap();
        for (oid, offset) in &entries {
            assert_eq!(idx.lookup(oid).unwrap(), Some(*offset));
        }
        assert_eq!(idx.lookup(&make_oid(0x55, 0xee)).unwrap(), None);
    }
}
