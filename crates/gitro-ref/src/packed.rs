use std::fs;
use std::path::Path;

use bstr::ByteSlice;
use gitro_hash::ObjectId;

use crate::RefError;

/// Parsed `packed-refs` file, entries kept in file order.
///
/// Format:
/// ```text
/// # pack-refs with: peeled fully-peeled sorted
/// <hex-oid> <refname>
/// ^<hex-oid>   (peeled target of the annotated tag above)
/// ```
///
/// Comment lines and `^` peeled continuation lines are skipped; the tag
/// decoders reach peeled targets on their own.
#[derive(Debug, Clone, Default)]
pub struct PackedRefs {
    refs: Vec<(String, ObjectId)>,
}

impl PackedRefs {
    /// Parse packed-refs content.
    pub fn parse(data: &[u8]) -> Result<Self, RefError> {
        let mut refs = Vec::new();

        for line in data.lines() {
            if line.is_empty() || line.starts_with(b"#") || line.starts_with(b"^") {
                continue;
            }

            let space_pos = line
                .find_byte(b' ')
                .ok_or_else(|| RefError::Parse("invalid packed-refs line".into()))?;

            let hex = std::str::from_utf8(&line[..space_pos])
                .map_err(|_| RefError::Parse("invalid UTF-8 in packed-refs fingerprint".into()))?;
            let oid = ObjectId::from_hex(hex)?;

            let name = std::str::from_utf8(&line[space_pos + 1..])
                .map_err(|_| RefError::Parse("invalid UTF-8 in packed-refs name".into()))?
                .trim();

            refs.push((name.to_string(), oid));
        }

        Ok(Self { refs })
    }

    /// Load packed-refs from a repository root. Absent file → empty set.
    pub fn load(git_dir: &Path) -> Result<Self, RefError> {
        let path = git_dir.join("packed-refs");
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(RefError::IoPath { path, source: e }),
        };
        Self::parse(&data)
    }

    /// All entries in file order.
    pub fn refs(&self) -> &[(String, ObjectId)] {
        &self.refs
    }

    /// Find an entry by exact name.
    pub fn find(&self, name: &str) -> Option<ObjectId> {
        self.refs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, oid)| *oid)
    }
}
