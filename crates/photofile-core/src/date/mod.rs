pub mod exif;
pub mod exiftool;

use std::fmt;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

pub use self::exif::ExifReader;
pub use self::exiftool::ExifTool;

/// Day-precision capture date taken from a metadata timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CaptureDate(NaiveDate);

impl CaptureDate {
    /// Parse the first 10 characters of a raw timestamp such as `2021:03:04 10:22:00`.
    /// Anything after the day is discarded. Placeholder values like
    /// `0000:00:00 00:00:00` do not form a date and yield `None`.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let head: String = raw.trim().trim_matches('"').chars().take(10).collect();
        let normalized = head.replace(':', "-");
        NaiveDate::parse_from_str(&normalized, "%Y-%m-%d").ok().map(Self)
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// Four-digit year directory name.
    pub fn year(&self) -> String {
        format!("{:04}", self.0.year())
    }

    /// `YYYY-MM-DD` bucket directory name.
    pub fn bucket_key(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for CaptureDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.bucket_key())
    }
}

/// Anything that can tell the capture date of a file on disk.
///
/// Failures are never surfaced: a file whose metadata cannot be read simply
/// has no date.
pub trait DateSource: Sync {
    fn capture_date(&self, path: &Path) -> Option<CaptureDate>;
}

impl<T: DateSource + ?Sized> DateSource for &T {
    fn capture_date(&self, path: &Path) -> Option<CaptureDate> {
        (**self).capture_date(path)
    }
}

/// Metadata reader selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// In-process EXIF parsing
    #[default]
    Exif,
    /// External `exiftool` processes
    Exiftool,
}

impl Backend {
    pub fn open(self) -> Box<dyn DateSource> {
        match self {
            Backend::Exif => Box::new(ExifReader),
            Backend::Exiftool => Box::new(ExifTool::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colon_and_dash_separators_agree() {
        let a = CaptureDate::from_raw("2021:03:04 10:22:00").unwrap();
        let b = CaptureDate::from_raw("2021-03-04T10:22:00+09:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.year(), "2021");
        assert_eq!(a.bucket_key(), "2021-03-04");
    }

    #[test]
    fn test_time_of_day_is_ignored() {
        let morning = CaptureDate::from_raw("2022:07:19 08:15:30").unwrap();
        let night = CaptureDate::from_raw("2022:07:19 23:59:59").unwrap();
        assert_eq!(morning, night);
    }

    #[test]
    fn test_unusable_timestamps() {
        assert_eq!(CaptureDate::from_raw(""), None);
        assert_eq!(CaptureDate::from_raw("0000:00:00 00:00:00"), None);
        assert_eq!(CaptureDate::from_raw("2022:13:01"), None);
        assert_eq!(CaptureDate::from_raw("garbage"), None);
    }

    #[test]
    fn test_quoted_display_value() {
        let d = CaptureDate::from_raw("\"2020-02-29 12:00:00\"").unwrap();
        assert_eq!(d.bucket_key(), "2020-02-29");
    }
}
