use bstr::{BStr, BString, ByteSlice};
use gitro_hash::ObjectId;

use crate::{ObjectError, Signature};

/// A commit object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Fingerprint of the root tree.
    pub tree: ObjectId,
    /// Parent commits (empty for a root commit).
    pub parents: Vec<ObjectId>,
    /// Author identity and timestamp.
    pub author: Signature,
    /// Committer identity and timestamp.
    pub committer: Signature,
    /// Headers other than the four above, kept verbatim (gpgsig, mergetag,
    /// encoding, …). Continuation lines are joined with '\n'.
    pub extra_headers: Vec<(BString, BString)>,
    /// Commit message (everything after the blank separator line).
    pub message: BString,
}

impl Commit {
    /// Decode commit content (no framing header).
    pub fn parse(content: &[u8]) -> Result<Self, ObjectError> {
        let mut tree: Option<ObjectId> = None;
        let mut parents = Vec::new();
        let mut author: Option<Signature> = None;
        let mut committer: Option<Signature> = None;
        let mut extra_headers: Vec<(BString, BString)> = Vec::new();

        let data = content;
        let mut pos = 0;

        loop {
            if pos >= data.len() {
                break;
            }

            // Blank line separates headers from the message.
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

            let space_pos = line.iter().position(|&b| b == b' ').ok_or_else(|| {
                ObjectError::InvalidHeader(format!(
                    "malformed commit header line: {:?}",
                    line.as_bstr()
                ))
            })?;
            let key = &line[..space_pos];
            let value = &line[space_pos + 1..];

            match key {
                b"tree" => {
                    tree = Some(parse_oid_value(value, "tree")?);
                    pos = line_end + 1;
                }
                b"parent" => {
                    parents.push(parse_oid_value(value, "parent")?);
                    pos = line_end + 1;
                }
                b"author" => {
                    author = Some(Signature::parse(value)?);
                    pos = line_end + 1;
                }
                b"committer" => {
                    committer = Some(Signature::parse(value)?);
                    pos = line_end + 1;
                }
                _ => {
                    // Multi-line headers continue with a leading space.
                    let mut val = Vec::from(value);
                    let mut next = line_end + 1;
                    while next < data.len() && data[next] == b' ' {
                        val.push(b'\n');
                        let cont_end = data[next..]
                            .iter()
                            .position(|&b| b == b'\n')
                            .map(|p| p + next)
                            .unwrap_or(data.len());
                        val.extend_from_slice(&data[next + 1..cont_end]);
                        next = cont_end + 1;
                    }
                    extra_headers.push((BString::from(key), BString::from(val)));
                    pos = next;
                }
            }
        }

        let tree = tree.ok_or(ObjectError::MissingCommitField { field: "tree" })?;
        let author = author.ok_or(ObjectError::MissingCommitField { field: "author" })?;
        let committer =
            committer.ok_or(ObjectError::MissingCommitField { field: "committer" })?;
        let message = BString::from(&data[pos.min(data.len())..]);

        Ok(Self {
            tree,
            parents,
            author,
            committer,
            extra_headers,
            message,
        })
    }

    /// First parent (None for a root commit).
    pub fn first_parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    /// More than one parent?
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// No parents?
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
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

pub(crate) fn parse_oid_value(value: &[u8], field: &str) -> Result<ObjectId, ObjectError> {
    let hex = std::str::from_utf8(value)
        .map_err(|_| ObjectError::InvalidHeader(format!("non-UTF-8 {field} fingerprint")))?;
    Ok(ObjectId::from_hex(hex.trim())?)
}

pub(crate) fn first_line(msg: &[u8]) -> &BStr {
    match msg.find_byte(b'\n') {
        Some(pos) => BStr::new(&msg[..pos]),
        None => BStr::new(msg),
    }
}

pub(crate) fn rest_after_first_line(msg: &[u8]) -> &BStr {
    match msg.find_byte(b'\n') {
        Some(pos) => BStr::new(&msg[pos + 1..]),
        None => BStr::new(&msg[msg.len()..]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_commit() -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"tree da39a3ee5e6b4b0d3255bfef95601890afd80709\n");
        out.extend_from_slice(b"parent 0000000000000000000000000000000000000001\n");
        out.extend_from_slice(b"author John Doe <john@example.com> 1234567890 +0000\n");
        out.extend_from_slice(b"committer Jane Doe <jane@example.com> 1234567890 -0500\n");
        out.extend_from_slice(b"\n");
        out.extend_from_slice(b"Initial commit\n");
        out
    }

    #[test]
    fn parse_commit() {
        let commit = Commit::parse(&sample_commit()).unwrap();
        assert_eq!(
            commit.tree.to_hex(),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
        assert_eq!(commit.parents.len(), 1);
        assert_eq!(commit.author.name, "John Doe");
        assert_eq!(commit.committer.email, "jane@example.com");
        assert_eq!(commit.committer.when.offset_minutes, -300);
        assert_eq!(commit.message, "Initial commit\n".as_bytes());
    }

    #[test]
    fn parse_root_commit() {
        let mut data = Vec::new();
        data.extend_from_slice(b"tree da39a3ee5e6b4b0d3255bfef95601890afd80709\n");
        data.extend_from_slice(b"author A <a@b.com> 1000000000 +0000\n");
        data.extend_from_slice(b"committer A <a@b.com> 1000000000 +0000\n");
        data.extend_from_slice(b"\nroot\n");

        let commit = Commit::parse(&data).unwrap();
        assert!(commit.is_root());
        assert!(!commit.is_merge());
        assert_eq!(commit.first_parent(), None);
    }

    #[test]
    fn parse_merge_commit() {
        let mut data = Vec::new();
        data.extend_from_slice(b"tree da39a3ee5e6b4b0d3255bfef95601890afd80709\n");
        data.extend_from_slice(b"parent 0000000000000000000000000000000000000001\n");
        data.extend_from_slice(b"parent 0000000000000000000000000000000000000002\n");
        data.extend_from_slice(b"author A <a@b.com> 1000000000 +0000\n");
        data.extend_from_slice(b"committer A <a@b.com> 1000000000 +0000\n");
        data.extend_from_slice(b"\nMerge\n");

        let commit = Commit::parse(&data).unwrap();
        assert!(commit.is_merge());
        assert_eq!(commit.parents.len(), 2);
    }

    #[test]
    fn summary_and_detail() {
        let mut data = Vec::new();
        data.extend_from_slice(b"tree da39a3ee5e6b4b0d3255bfef95601890afd80709\n");
        data.extend_from_slice(b"author A <a@b.com> 1000000000 +0000\n");
        data.extend_from_slice(b"committer A <a@b.com> 1000000000 +0000\n");
        data.extend_from_slice(b"\nSummary line\n\nBody paragraph.\n");

        let commit = Commit::parse(&data).unwrap();
        assert_eq!(commit.summary(), "Summary line".as_bytes());
        assert_eq!(commit.detail(), "\nBody paragraph.\n".as_bytes());
    }

    #[test]
    fn summary_without_newline() {
        let mut data = Vec::new();
        data.extend_from_slice(b"tree da39a3ee5e6b4b0d3255bfef95601890afd80709\n");
        data.extend_from_slice(b"author A <a@b.com> 1000000000 +0000\n");
        data.extend_from_slice(b"committer A <a@b.com> 1000000000 +0000\n");
        data.extend_from_slice(b"\none-liner");

        let commit = Commit::parse(&data).unwrap();
        assert_eq!(commit.summary(), "one-liner".as_bytes());
        assert_eq!(commit.detail(), "".as_bytes());
    }

    #[test]
    fn gpgsig_continuation_lines_are_joined() {
        let mut data = Vec::new();
        data.extend_from_slice(b"tree da39a3ee5e6b4b0d3255bfef95601890afd80709\n");
        data.extend_from_slice(b"author A <a@b.com> 1000000000 +0000\n");
        data.extend_from_slice(b"committer A <a@b.com> 1000000000 +0000\n");
        data.extend_from_slice(b"gpgsig -----BEGIN PGP SIGNATURE-----\n line2\n -----END PGP SIGNATURE-----\n");
        data.extend_from_slice(b"\nmsg\n");

        let commit = Commit::parse(&data).unwrap();
        assert_eq!(commit.extra_headers.len(), 1);
        assert_eq!(commit.extra_headers[0].0, "gpgsig");
        assert_eq!(
            commit.extra_headers[0].1,
            "-----BEGIN PGP SIGNATURE-----\nline2\n-----END PGP SIGNATURE-----".as_bytes()
        );
        assert_eq!(commit.message, "msg\n".as_bytes());
    }

    #[test]
    fn missing_tree_errors() {
        let data =
            b"author A <a@b.com> 1000000000 +0000\ncommitter A <a@b.com> 1000000000 +0000\n\nmsg\n";
        assert!(matches!(
            Commit::parse(data).unwrap_err(),
            ObjectError::MissingCommitField { field: "tree" }
        ));
    }

    #[test]
    fn commit_without_message() {
        let mut data = Vec::new();
        data.extend_from_slice(b"tree da39a3ee5e6b4b0d3255bfef95601890afd80709\n");
        data.extend_from_slice(b"author A <a@b.com> 1000000000 +0000\n");
        data.extend_from_slice(b"committer A <a@b.com> 1000000000 +0000\n");

        let commit = Commit::parse(&data).unwrap();
        assert!(commit.message.is_empty());
    }
}
