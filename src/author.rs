//! Identity and timestamp codec
//!
//! Git records an identity as `Name <email> 1368039878 -0700`: a unix
//! timestamp plus the author's numeric UTC offset. Archive documents carry the
//! same instant as ISO-8601 text in that offset (`2013-05-08T12:04:38-07:00`),
//! so the offset survives the round trip and is never replaced by local time.

use crate::error::{PatchtrailError, Result};
use chrono::{DateTime, FixedOffset, SecondsFormat};
use std::fmt;

/// Identity plus the moment it acted, in its own UTC offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    /// Display name, trailing whitespace removed
    pub name: String,
    /// Email address as written between the angle brackets
    pub email: String,
    /// Timestamp carrying an explicit offset
    pub date: DateTime<FixedOffset>,
}

impl Author {
    /// Build an author from its parts
    pub fn new(name: impl Into<String>, email: impl Into<String>, date: DateTime<FixedOffset>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            date,
        }
    }

    /// Parse a native identity line: `Name <email> <unix-seconds> <+HHMM>`
    pub fn parse_line(line: &str) -> Result<Self> {
        let malformed = || PatchtrailError::malformed_author(format!("cannot parse identity {:?}", line));

        let (rest, offset) = line.rsplit_once(' ').ok_or_else(malformed)?;
        let (user, timestamp) = rest.rsplit_once(' ').ok_or_else(malformed)?;
        let (name, email) = parse_user(user)?;
        let offset = parse_offset(offset)?;
        let seconds: i64 = timestamp.parse().map_err(|_| {
            PatchtrailError::malformed_author(format!("cannot parse timestamp {:?}", timestamp))
        })?;
        let utc = DateTime::from_timestamp(seconds, 0).ok_or_else(|| {
            PatchtrailError::malformed_author(format!("timestamp out of range: {}", seconds))
        })?;

        Ok(Self::new(name, email, utc.with_timezone(&offset)))
    }

    /// Parse the archive form: separate name, email and ISO-8601 date
    pub fn from_iso(name: impl Into<String>, email: impl Into<String>, date: &str) -> Result<Self> {
        let date = DateTime::parse_from_rfc3339(date).map_err(|e| {
            PatchtrailError::malformed_author(format!("cannot parse date {:?}: {}", date, e))
        })?;
        Ok(Self::new(name, email, date))
    }

    /// ISO-8601 timestamp with an explicit numeric offset
    pub fn iso_date(&self) -> String {
        self.date.to_rfc3339_opts(SecondsFormat::AutoSi, false)
    }

    /// Seconds since the unix epoch
    pub fn unix_seconds(&self) -> i64 {
        self.date.timestamp()
    }

    /// UTC offset in minutes east of Greenwich
    pub fn offset_minutes(&self) -> i32 {
        self.date.offset().local_minus_utc() / 60
    }

    /// Render back into the native identity line
    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minutes = self.offset_minutes();
        let sign = if minutes < 0 { '-' } else { '+' };
        let minutes = minutes.abs();
        write!(
            f,
            "{} <{}> {} {}{:02}{:02}",
            self.name,
            self.email,
            self.unix_seconds(),
            sign,
            minutes / 60,
            minutes % 60
        )
    }
}

/// Split `Name <email>` into its parts
fn parse_user(user: &str) -> Result<(String, String)> {
    let malformed = || PatchtrailError::malformed_author(format!("cannot parse user {:?}", user));

    let inner = user.strip_suffix('>').ok_or_else(malformed)?;
    let (name, email) = inner.split_once('<').ok_or_else(malformed)?;
    if email.contains('>') || email.contains('<') {
        return Err(malformed());
    }

    Ok((name.trim_end().to_string(), email.to_string()))
}

/// Parse a `+HHMM` / `-HHMM` offset
fn parse_offset(text: &str) -> Result<FixedOffset> {
    let malformed = || PatchtrailError::malformed_author(format!("cannot parse offset {:?}", text));

    let bytes = text.as_bytes();
    if bytes.len() != 5 || !bytes[1..].iter().all(u8::is_ascii_digit) {
        return Err(malformed());
    }
    let hours: i32 = text[1..3].parse().map_err(|_| malformed())?;
    let minutes: i32 = text[3..5].parse().map_err(|_| malformed())?;
    let seconds = (hours * 60 + minutes) * 60;

    let offset = match bytes[0] {
        b'+' => FixedOffset::east_opt(seconds),
        b'-' => FixedOffset::west_opt(seconds),
        _ => None,
    };
    offset.ok_or_else(malformed)
}
