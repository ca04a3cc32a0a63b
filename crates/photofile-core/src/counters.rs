use serde::{Deserialize, Serialize};

use crate::engine::Disposition;

/// Per-run tallies. Every processed entry bumps `all_entries` and exactly one
/// leaf counter; recognized media also bump `media_files`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub all_entries: u64,
    pub media_files: u64,
    pub ignored: u64,
    pub added: u64,
    pub duplicate_content: u64,
    pub duplicate_name_only: u64,
    pub no_date_added: u64,
    pub no_date_duplicate: u64,
    /// Planned copies that failed; these files are still counted above.
    #[serde(default)]
    pub copy_failures: u64,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, disposition: Disposition) {
        self.all_entries += 1;
        let leaf = match disposition {
            Disposition::Ignored => &mut self.ignored,
            Disposition::Added => &mut self.added,
            Disposition::DuplicateContent => &mut self.duplicate_content,
            Disposition::DuplicateNameOnly => &mut self.duplicate_name_only,
            Disposition::NoDateAdded => &mut self.no_date_added,
            Disposition::NoDateDuplicate => &mut self.no_date_duplicate,
        };
        *leaf += 1;
        if disposition != Disposition::Ignored {
            self.media_files += 1;
        }
    }

    pub fn copy_failed(&mut self) {
        self.copy_failures += 1;
    }

    /// Dated duplicates, by content and by name.
    pub fn duplicates(&self) -> u64 {
        self.duplicate_content + self.duplicate_name_only
    }

    /// Files without a capture date, added or not.
    pub fn no_date(&self) -> u64 {
        self.no_date_added + self.no_date_duplicate
    }

    pub fn has_duplicates(&self) -> bool {
        self.duplicates() > 0
    }

    /// Summary block shared by the action log and the console.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("All Files={}", self.all_entries),
            format!("Image-Files={}", self.media_files),
            format!("- Added={}", self.added),
            format!(
                "- Duplicates={} : Same-Date={} Same-File-Name={}",
                self.duplicates(),
                self.duplicate_content,
                self.duplicate_name_only
            ),
            format!(
                "- No-Capture-Date={} : Added={} Same-File-Name={}",
                self.no_date(),
                self.no_date_added,
                self.no_date_duplicate
            ),
            format!("Ignored={}", self.ignored),
        ];
        if self.copy_failures > 0 {
            lines.push(format!("Copy-Failures={}", self.copy_failures));
        }
        lines
    }
}
