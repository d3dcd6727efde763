use std::fmt;

use chrono::{FixedOffset, Local, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A point in time as stored in commit and tag headers: seconds since the
/// UNIX epoch plus the author's UTC offset in minutes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Time {
    pub seconds: i64,
    pub offset_minutes: i32,
}

impl Time {
    pub fn new(seconds: i64, offset_minutes: i32) -> Self {
        Self {
            seconds,
            offset_minutes,
        }
    }

    /// Current wall-clock time in the local timezone.
    pub fn now() -> Self {
        let now = Local::now();
        Self {
            seconds: now.timestamp(),
            offset_minutes: now.offset().local_minus_utc() / 60,
        }
    }

    /// Render as an RFC 3339 timestamp in the recorded offset.
    pub fn to_rfc3339(&self) -> Option<String> {
        let offset = FixedOffset::east_opt(self.offset_minutes * 60)?;
        let dt = offset.timestamp_opt(self.seconds, 0).single()?;
        Some(dt.to_rfc3339())
    }

    fn write_offset(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.offset_minutes < 0 { '-' } else { '+' };
        let abs = self.offset_minutes.abs();
        write!(f, "{sign}{:02}{:02}", abs / 60, abs % 60)
    }

    fn parse_offset(raw: &str) -> Option<i32> {
        let (sign, digits) = match raw.as_bytes().first()? {
            b'+' => (1, &raw[1..]),
            b'-' => (-1, &raw[1..]),
            _ => return None,
        };
        if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let hours: i32 = digits[..2].parse().ok()?;
        let minutes: i32 = digits[2..].parse().ok()?;
        Some(sign * (hours * 60 + minutes))
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.seconds)?;
        self.write_offset(f)
    }
}

/// Identity line used for authors, committers, and taggers:
/// `Name <email> <seconds> <+hhmm>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub when: Time,
}

impl Signature {
    /// Create a signature with an explicit timestamp.
    pub fn new(name: impl Into<String>, email: impl Into<String>, when: Time) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            when,
        }
    }

    /// Create a signature stamped with the current local time.
    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self::new(name, email, Time::now())
    }

    /// Parse a header value such as
    /// `A U Thor <author@example.com> 1112911993 -0700`.
    pub fn parse(raw: &[u8]) -> Result<Self, TypeError> {
        let text = std::str::from_utf8(raw)
            .map_err(|_| TypeError::MalformedSignature("not valid UTF-8".into()))?;
        let malformed = || TypeError::MalformedSignature(text.to_string());

        let open = text.find('<').ok_or_else(malformed)?;
        let close = open + text[open..].find('>').ok_or_else(malformed)?;
        let name = text[..open].trim_end().to_string();
        let email = text[open + 1..close].to_string();

        let mut rest = text[close + 1..].split_whitespace();
        let seconds: i64 = rest
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(malformed)?;
        let offset_minutes = rest
            .next()
            .and_then(Time::parse_offset)
            .ok_or_else(malformed)?;

        Ok(Self {
            name,
            email,
            when: Time::new(seconds, offset_minutes),
        })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}> {}", self.name, self.email, self.when)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_git_header_format() {
        let sig = Signature::new("A U Thor", "author@example.com", Time::new(1112911993, -420));
        assert_eq!(sig.to_string(), "A U Thor <author@example.com> 1112911993 -0700");
    }

    #[test]
    fn parse_header_value() {
        let sig = Signature::parse(b"Jane Doe <jane@example.org> 1700000000 +0530").unwrap();
        assert_eq!(sig.name, "Jane Doe");
        assert_eq!(sig.email, "jane@example.org");
        assert_eq!(sig.when, Time::new(1700000000, 330));
    }

    #[test]
    fn parse_then_display_is_stable() {
        let raw = "C O Mitter <committer@example.com> 1112911993 +0000";
        assert_eq!(Signature::parse(raw.as_bytes()).unwrap().to_string(), raw);
    }

    #[test]
    fn parse_rejects_missing_timestamp() {
        assert!(Signature::parse(b"No Time <x@y>").is_err());
        assert!(Signature::parse(b"No Email 1700000000 +0000").is_err());
        assert!(Signature::parse(b"Bad Tz <x@y> 1 0100").is_err());
    }

    #[test]
    fn rfc3339_uses_recorded_offset() {
        let t = Time::new(0, 60);
        assert_eq!(t.to_rfc3339().unwrap(), "1970-01-01T01:00:00+01:00");
    }

    #[test]
    fn now_has_plausible_offset() {
        let t = Time::now();
        assert!(t.offset_minutes.abs() <= 14 * 60);
        assert!(t.seconds > 0);
    }
}
