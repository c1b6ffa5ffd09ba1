use bstr::{BStr, BString};
use gitro_hash::ObjectId;

use crate::commit::{first_line, parse_oid_value, rest_after_first_line};
use crate::{ObjectError, ObjectType, Signature};

/// An annotated tag object.
///
/// The `object` header may repeat; tags carrying several targets are valid
/// and all targets are retained in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Fingerprints of the tagged objects (at least one).
    pub targets: Vec<ObjectId>,
    /// Type of the tagged object(s).
    pub target_type: ObjectType,
    /// Tag name.
    pub name: BString,
    /// Tagger identity (absent in some historical tags).
    pub tagger: Option<Signature>,
    /// Tag message.
    pub message: BString,
}

impl Tag {
    /// Decode tag content (no framing header).
    pub fn parse(content: &[u8]) -> Result<Self, ObjectError> {
        let mut targets: Vec<ObjectId> = Vec::new();
        let mut target_type: Option<ObjectType> = None;
        let mut name: Option<BString> = None;
        let mut tagger: Option<Signature> = None;

        let data = content;
        let mut pos = 0;

        loop {
            if pos >= data.len() {
                break;
            }

            if data[pos] == b'\n' {
                pos += 1;
                break;
            }

            let line_end = data[pos..]
                .iter()
                .position(|&b| b == b'\n')
                .map(|p| p + pos)
                .unwrap_or(data.len());
            let line = &data[pos..line_end];

            if let Some(space_pos) = line.iter().position(|&b| b == b' ') {
                let key = &line[..space_pos];
                let value = &line[space_pos + 1..];

                match key {
                    b"object" => targets.push(parse_oid_value(value, "object")?),
                    b"type" => target_type = Some(ObjectType::from_bytes(value)?),
                    b"tag" => name = Some(BString::from(value)),
                    b"tagger" => tagger = Some(Signature::parse(value)?),
                    _ => {
                        // Unknown headers are tolerated.
                    }
                }
            }

            pos = line_end + 1;
        }

        if targets.is_empty() {
            return Err(ObjectError::MissingTagField { field: "object" });
        }
        let target_type = target_type.ok_or(ObjectError::MissingTagField { field: "type" })?;
        let name = name.ok_or(ObjectError::MissingTagField { field: "tag" })?;
        let message = BString::from(&data[pos.min(data.len())..]);

        Ok(Self {
            targets,
            target_type,
            name,
            tagger,
            message,
        })
    }

    /// The primary (first) target.
    pub fn target(&self) -> &ObjectId {
        &self.targets[0]
    }

    /// First line of the message.
    pub fn summary(&self) -> &BStr {
        first_line(self.message.as_ref())
    }

    /// Everything after the first line of the message.
    pub fn detail(&self) -> &BStr {
        rest_after_first_line(self.message.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tag() -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"object da39a3ee5e6b4b0d3255bfef95601890afd80709\n");
        out.extend_from_slice(b"type commit\n");
        out.extend_from_slice(b"tag v1.0\n");
        out.extend_from_slice(b"tagger John Doe <john@example.com> 1234567890 +0000\n");
        out.extend_from_slice(b"\n");
        out.extend_from_slice(b"Release v1.0\n\nNotes follow.\n");
        out
    }

    #[test]
    fn parse_tag() {
        let tag = Tag::parse(&sample_tag()).unwrap();
        assert_eq!(
            tag.target().to_hex(),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
        assert_eq!(tag.target_type, ObjectType::Commit);
        assert_eq!(tag.name, "v1.0");
        assert!(tag.tagger.is_some());
        assert_eq!(tag.summary(), "Release v1.0".as_bytes());
        assert_eq!(tag.detail(), "\nNotes follow.\n".as_bytes());
    }

    #[test]
    fn parse_tag_without_tagger() {
        let mut data = Vec::new();
        data.extend_from_slice(b"object da39a3ee5e6b4b0d3255bfef95601890afd80709\n");
        data.extend_from_slice(b"type commit\n");
        data.extend_from_slice(b"tag old-tag\n");
        data.extend_from_slice(b"\nOld tag\n");

        let tag = Tag::parse(&data).unwrap();
        assert!(tag.tagger.is_none());
        assert_eq!(tag.name, "old-tag");
    }

    #[test]
    fn parse_multi_target_tag() {
        let mut data = Vec::new();
        data.extend_from_slice(b"object aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\n");
        data.extend_from_slice(b"object bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb\n");
        data.extend_from_slice(b"type commit\n");
        data.extend_from_slice(b"tag multi\n");
        data.extend_from_slice(b"\n");

        let tag = Tag::parse(&data).unwrap();
        assert_eq!(tag.targets.len(), 2);
        assert_eq!(
            tag.target().to_hex(),
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
        );
        assert_eq!(
            tag.targets[1].to_hex(),
            "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"
        );
    }

    #[test]
    fn tag_pointing_to_tree() {
        let mut data = Vec::new();
        data.extend_from_slice(b"object da39a3ee5e6b4b0d3255bfef95601890afd80709\n");
        data.extend_from_slice(b"type tree\n");
        data.extend_from_slice(b"tag tree-tag\n");
        data.extend_from_slice(b"\n");

        let tag = Tag::parse(&data).unwrap();
        assert_eq!(tag.target_type, ObjectType::Tree);
    }

    #[test]
    fn missing_object_errors() {
        let data = b"type commit\ntag v1.0\n\nmessage\n";
        assert!(matches!(
            Tag::parse(data).unwrap_err(),
            ObjectError::MissingTagField { field: "object" }
        ));
    }

    #[test]
    fn unknown_headers_are_skipped() {
        let mut data = Vec::new();
        data.extend_from_slice(b"object da39a3ee5e6b4b0d3255bfef95601890afd80709\n");
        data.extend_from_slice(b"type commit\n");
        data.extend_from_slice(b"tag v2\n");
        data.extend_from_slice(b"mystery something\n");
        data.extend_from_slice(b"\nbody\n");

        let tag = Tag::parse(&data).unwrap();
        assert_eq!(tag.name, "v2");
        assert_eq!(tag.message, "body\n".as_bytes());
    }
}
