use bstr::{BString, ByteSlice};

use crate::ObjectError;

/// A timestamp as stored in commit and tag headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GitTime {
    /// Seconds since the Unix epoch.
    pub seconds: i64,
    /// Timezone offset in minutes from UTC (e.g. -300 for -0500).
    pub offset_minutes: i32,
}

/// An identity line: `"<name> <email> <unix-seconds> <±HHMM>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: BString,
    pub email: BString,
    pub when: GitTime,
}

impl Signature {
    /// Parse a signature value (the part after `"author "` etc.).
    pub fn parse(input: &[u8]) -> Result<Self, ObjectError> {
        // Split off the date by the last '>' so names may contain '<'.
        let gt_pos = input
            .iter()
            .rposition(|&b| b == b'>')
            .ok_or_else(|| ObjectError::InvalidSignature("missing '>'".into()))?;
        let lt_pos = input[..gt_pos]
            .iter()
            .rposition(|&b| b == b'<')
            .ok_or_else(|| ObjectError::InvalidSignature("missing '<'".into()))?;

        let name = input[..lt_pos].trim();
        let email = &input[lt_pos + 1..gt_pos];

        let date = input[gt_pos + 1..].trim();
        let date = std::str::from_utf8(date)
            .map_err(|_| ObjectError::InvalidSignature("non-UTF-8 timestamp".into()))?;
        let when = parse_time(date)?;

        Ok(Self {
            name: BString::from(name),
            email: BString::from(email),
            when,
        })
    }
}

/// Parse `"<unix-seconds> <±HHMM>"` (the offset may be absent in old data).
fn parse_time(input: &str) -> Result<GitTime, ObjectError> {
    let mut parts = input.splitn(2, ' ');

    let seconds_str = parts.next().unwrap_or("");
    let seconds: i64 = seconds_str
        .parse()
        .map_err(|_| ObjectError::InvalidSignature(format!("invalid timestamp: '{seconds_str}'")))?;

    let offset_minutes = match parts.next() {
        Some(tz) => {
            let tz = tz.trim();
            let raw: i32 = tz
                .parse()
                .map_err(|_| ObjectError::InvalidSignature(format!("invalid timezone: '{tz}'")))?;
            // ±HHMM read as a decimal: -0500 parses to -500.
            let sign = if raw < 0 { -1 } else { 1 };
            let abs = raw.abs();
            sign * (abs / 100 * 60 + abs % 100)
        }
        None => 0,
    };

    Ok(GitTime {
        seconds,
        offset_minutes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_basic() {
        let sig = Signature::parse(b"John Doe <john@example.com> 1234567890 +0000").unwrap();
        assert_eq!(sig.name, "John Doe");
        assert_eq!(sig.email, "john@example.com");
        assert_eq!(sig.when.seconds, 1234567890);
        assert_eq!(sig.when.offset_minutes, 0);
    }

    #[test]
    fn parse_negative_offset() {
        let sig = Signature::parse(b"A <a@b.com> 1234567890 -0500").unwrap();
        assert_eq!(sig.when.offset_minutes, -300);
    }

    #[test]
    fn parse_positive_half_hour_offset() {
        let sig = Signature::parse(b"A <a@b.com> 1234567890 +0530").unwrap();
        assert_eq!(sig.when.offset_minutes, 330);
    }

    #[test]
    fn parse_missing_offset_defaults_to_utc() {
        let sig = Signature::parse(b"A <a@b.com> 1234567890").unwrap();
        assert_eq!(sig.when.offset_minutes, 0);
    }

    #[test]
    fn name_may_be_empty() {
        let sig = Signature::parse(b" <a@b.com> 0 +0000").unwrap();
        assert_eq!(sig.name, "");
        assert_eq!(sig.email, "a@b.com");
    }

    #[test]
    fn missing_angle_brackets() {
        assert!(Signature::parse(b"no brackets here 0 +0000").is_err());
    }

    #[test]
    fn garbage_timestamp() {
        assert!(Signature::parse(b"A <a@b.com> soon +0000").is_err());
    }
}
