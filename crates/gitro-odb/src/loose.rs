use std::fs;
use std::io::Read;
use std::path::Path;

use flate2::bufread::ZlibDecoder;
use gitro_hash::ObjectId;
use gitro_object::header;

use crate::{OdbError, RawObject};

/// Read a loose object: `objects/<hex[0..2]>/<hex[2..]>`, zlib-compressed
/// `"<type> <size>\0<payload>"`.
///
/// Returns `Ok(None)` when no such file exists. The declared size must
/// equal the payload length exactly.
pub(crate) fn read_loose(
    objects_dir: &Path,
    oid: &ObjectId,
) -> Result<Option<RawObject>, OdbError> {
    let path = objects_dir.join(oid.loose_path());
    let compressed = match fs::read(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(OdbError::Io(e)),
    };

    let mut decoder = ZlibDecoder::new(&compressed[..]);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| OdbError::Corrupt {
            oid: *oid,
            reason: format!("zlib: {e}"),
        })?;

    let (kind, size, header_len) =
        header::parse_header(&decompressed).map_err(|e| OdbError::Corrupt {
            oid: *oid,
            reason: e.to_string(),
        })?;

    let payload = &decompressed[header_len..];
    if payload.len() != size {
        return Err(OdbError::Corrupt {
            oid: *oid,
            reason: format!(
                "header says {size} bytes, payload is {}",
                payload.len()
            ),
        });
    }

    Ok(Some(RawObject {
        kind,
        data: payload.to_vec(),
    }))
}

/// Does a loose object file exist for this fingerprint?
pub(crate) fn contains_loose(objects_dir: &Path, oid: &ObjectId) -> bool {
    objects_dir.join(oid.loose_path()).is_file()
}
