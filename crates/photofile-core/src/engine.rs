//! Destination bucket derivation and duplicate classification.
//!
//! Nothing here touches the destination beyond the read-only [`DestQuery`]
//! checks; copies and directory creation are carried out by a
//! [`crate::writer::ActionSink`].

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::date::{CaptureDate, DateSource};
use crate::media::MediaFile;

/// Folder under the destination root for files without a capture date.
pub const NO_DATE_DIR: &str = "No-Capture-Date";

/// Outcome for one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Dated, nothing of that name in its bucket yet
    Added,
    /// Same name already in the bucket and its own capture date matches
    DuplicateContent,
    /// Same name already in the bucket but its capture date differs or is missing
    DuplicateNameOnly,
    /// Undated, nothing of that name in the no-date folder
    NoDateAdded,
    /// Undated, same name already in the no-date folder
    NoDateDuplicate,
    /// Not a recognized media type
    Ignored,
}

impl Disposition {
    /// Tag written in front of each action-log line.
    pub fn tag(self) -> &'static str {
        match self {
            Disposition::Added => "ADDED",
            Disposition::DuplicateContent => "DUP FILE+DATE",
            Disposition::DuplicateNameOnly => "DUP FILENAME",
            Disposition::NoDateAdded => "NO-DATE ADD",
            Disposition::NoDateDuplicate => "NO-DATE DUP",
            Disposition::Ignored => "IGNORED",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// The decision for one file: what it is, where it belongs and whether it has
/// to be copied there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub disposition: Disposition,
    /// Full destination file path; `None` for ignored files
    pub destination: Option<PathBuf>,
    pub needs_copy: bool,
    pub capture_date: Option<CaptureDate>,
}

impl Classification {
    pub fn ignored() -> Self {
        Self {
            disposition: Disposition::Ignored,
            destination: None,
            needs_copy: false,
            capture_date: None,
        }
    }

    /// Folder the file would be copied into.
    pub fn destination_dir(&self) -> Option<&Path> {
        self.destination.as_deref().and_then(Path::parent)
    }
}

/// Read-only view of the destination tree.
pub trait DestQuery {
    fn exists(&self, path: &Path) -> bool;
    fn capture_date(&self, path: &Path) -> Option<CaptureDate>;
}

/// `<dest>/<YYYY>` for a dated file.
pub fn year_dir(dest_root: &Path, date: &CaptureDate) -> PathBuf {
    dest_root.join(date.year())
}

/// `<dest>/<YYYY>/<YYYY-MM-DD>` for a dated file.
pub fn bucket_dir(dest_root: &Path, date: &CaptureDate) -> PathBuf {
    year_dir(dest_root, date).join(date.bucket_key())
}

pub fn no_date_dir(dest_root: &Path) -> PathBuf {
    dest_root.join(NO_DATE_DIR)
}

/// Decide where a media file goes and whether it is a duplicate.
///
/// A same-named file in the target bucket is never replaced. For dated files
/// the existing copy's own capture date tells a true duplicate from a name
/// clash; undated files only have the name to go by.
pub fn classify<Q: DestQuery + ?Sized>(
    file: &MediaFile,
    capture_date: Option<CaptureDate>,
    dest_root: &Path,
    dest: &Q,
) -> Classification {
    match capture_date {
        Some(date) => {
            let target = bucket_dir(dest_root, &date).join(&file.filename);
            let disposition = if !dest.exists(&target) {
                Disposition::Added
            } else if dest.capture_date(&target) == Some(date) {
                Disposition::DuplicateContent
            } else {
                Disposition::DuplicateNameOnly
            };
            Classification {
                needs_copy: disposition == Disposition::Added,
                disposition,
                destination: Some(target),
                capture_date: Some(date),
            }
        }
        None => {
            let target = no_date_dir(dest_root).join(&file.filename);
            let disposition = if dest.exists(&target) {
                Disposition::NoDateDuplicate
            } else {
                Disposition::NoDateAdded
            };
            Classification {
                needs_copy: disposition == Disposition::NoDateAdded,
                disposition,
                destination: Some(target),
                capture_date: None,
            }
        }
    }
}

/// The destination as seen on disk plus everything already claimed in this run.
///
/// Claims matter when copies are deferred to a generated script: the file is
/// not on disk yet, but a second source with the same name and date must
/// still be reported as a duplicate.
pub struct FsDestination<'a> {
    dates: &'a dyn DateSource,
    claimed: HashMap<PathBuf, Option<CaptureDate>>,
}

impl<'a> FsDestination<'a> {
    pub fn new(dates: &'a dyn DateSource) -> Self {
        Self {
            dates,
            claimed: HashMap::new(),
        }
    }

    /// Record that `path` now belongs to a file with the given date.
    pub fn claim(&mut self, path: PathBuf, date: Option<CaptureDate>) {
        self.claimed.insert(path, date);
    }

    /// Forget a claim whose copy never happened.
    pub fn release(&mut self, path: &Path) {
        self.claimed.remove(path);
    }
}

impl DestQuery for FsDestination<'_> {
    fn exists(&self, path: &Path) -> bool {
        self.claimed.contains_key(path) || path.exists()
    }

    fn capture_date(&self, path: &Path) -> Option<CaptureDate> {
        match self.claimed.get(path) {
            Some(date) => *date,
            None => self.dates.capture_date(path),
        }
    }
}

/// Classifies files one at a time against a single destination.
///
/// Every decision for the destination goes through this value, so the
/// exists-then-claim step is never interleaved with another file's.
pub struct Engine<'a> {
    dest_root: PathBuf,
    dates: &'a dyn DateSource,
    dest: FsDestination<'a>,
}

impl<'a> Engine<'a> {
    pub fn new(dest_root: impl Into<PathBuf>, dates: &'a dyn DateSource) -> Self {
        Self {
            dest_root: dest_root.into(),
            dates,
            dest: FsDestination::new(dates),
        }
    }

    /// Classify one source file. Metadata is only read for recognized media.
    pub fn process(&mut self, file: &MediaFile) -> Classification {
        if !file.is_media() {
            return Classification::ignored();
        }
        let date = self.dates.capture_date(&file.path);
        let classification = classify(file, date, &self.dest_root, &self.dest);
        if classification.needs_copy {
            if let Some(target) = &classification.destination {
                self.dest.claim(target.clone(), date);
            }
        }
        classification
    }

    /// The planned copy to `target` failed, so the name is free again.
    pub fn copy_failed(&mut self, target: &Path) {
        self.dest.release(target);
    }
}
