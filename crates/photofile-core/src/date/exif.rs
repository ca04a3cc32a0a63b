use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use exif::{In, Reader, Tag};

use super::{CaptureDate, DateSource};

/// In-process EXIF reader. Works for JPEG, HEIC, TIFF-based raws and PNG;
/// QuickTime containers carry no EXIF and come back without a date.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifReader;

impl DateSource for ExifReader {
    fn capture_date(&self, path: &Path) -> Option<CaptureDate> {
        let raw = match read_create_date(path) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "no EXIF data");
                return None;
            }
        };
        let date = CaptureDate::from_raw(&raw);
        if date.is_none() {
            tracing::debug!(path = %path.display(), raw = %raw, "unusable EXIF timestamp");
        }
        date
    }
}

/// Raw timestamp string of the first populated creation tag.
/// `DateTimeDigitized` is what exiftool reports as `CreateDate`.
fn read_create_date(path: &Path) -> Result<Option<String>, exif::Error> {
    let file = File::open(path)?;
    let reader = Reader::new().read_from_container(&mut BufReader::new(file))?;

    let tags = [Tag::DateTimeDigitized, Tag::DateTimeOriginal, Tag::DateTime];

    for tag in &tags {
        if let Some(field) = reader.get_field(*tag, In::PRIMARY) {
            let val = field.display_value().to_string();
            if !val.trim().is_empty() {
                return Ok(Some(val));
            }
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use exif::experimental::Writer;
    use exif::{Field, Value};
    use std::io::{Cursor, Write};
    use tempfile::tempdir;

    fn ascii(tag: Tag, text: &str) -> Field {
        Field {
            tag,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![text.as_bytes().to_vec()]),
        }
    }

    /// Smallest JPEG the reader accepts: SOI, an Exif APP1 segment, EOI.
    fn jpeg_with(fields: &[Field]) -> Vec<u8> {
        let mut writer = Writer::new();
        for field in fields {
            writer.push_field(field);
        }
        let mut tiff = Cursor::new(Vec::new());
        writer.write(&mut tiff, false).unwrap();
        let tiff = tiff.into_inner();

        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
        jpeg.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
        jpeg.extend_from_slice(b"Exif\0\0");
        jpeg.extend_from_slice(&tiff);
        jpeg.extend_from_slice(&[0xFF, 0xD9]);
        jpeg
    }

    #[test]
    fn test_digitized_date_wins() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("IMG_01.JPG");
        let fields = [
            ascii(Tag::DateTime, "2019:01:01 00:00:00"),
            ascii(Tag::DateTimeDigitized, "2021:03:04 10:22:00"),
        ];
        std::fs::write(&path, jpeg_with(&fields)).unwrap();
        assert_eq!(ExifReader.capture_date(&path), CaptureDate::from_ymd(2021, 3, 4));
    }

    #[test]
    fn test_falls_back_to_modify_date() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scan.jpg");
        std::fs::write(&path, jpeg_with(&[ascii(Tag::DateTime, "2019:12:31 23:59:59")])).unwrap();
        assert_eq!(ExifReader.capture_date(&path), CaptureDate::from_ymd(2019, 12, 31));
    }

    #[test]
    fn test_placeholder_date_is_undated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("IMG_02.JPG");
        let fields = [ascii(Tag::DateTimeDigitized, "0000:00:00 00:00:00")];
        std::fs::write(&path, jpeg_with(&fields)).unwrap();
        assert_eq!(ExifReader.capture_date(&path), None);
    }

    #[test]
    fn test_missing_file_has_no_date() {
        assert_eq!(ExifReader.capture_date(Path::new("/nonexistent/photo.jpg")), None);
    }

    #[test]
    fn test_non_image_bytes_have_no_date() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fake.jpg");
        File::create(&path).unwrap().write_all(b"not a jpeg at all").unwrap();
        assert_eq!(ExifReader.capture_date(&path), None);
    }
}
