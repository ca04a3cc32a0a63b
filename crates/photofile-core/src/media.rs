use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Extensions the organizer treats as media, matched case-insensitively at the end of the name.
pub const MEDIA_EXTENSIONS: &[&str] = &[
    "heic", "jpg", "jpeg", "arw", "dng", "m4v", "nef", "mov", "mp4", "tiff", "png",
];

static MEDIA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\.(?:{})$", MEDIA_EXTENSIONS.join("|"))).unwrap()
});

/// Check whether a file name carries one of the recognized media extensions.
pub fn is_media_file(name: &str) -> bool {
    MEDIA_RE.is_match(name)
}

#[derive(Debug, Clone)]
pub struct MediaFile {
    /// Absolute path in the source tree
    pub path: PathBuf,
    /// Just the filename
    pub filename: String,
}

impl MediaFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, filename }
    }

    pub fn is_media(&self) -> bool {
        is_media_file(&self.filename)
    }
}
