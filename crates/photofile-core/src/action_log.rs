use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::engine::{Classification, Disposition};
use crate::error::{Error, Result};

const RULE: &str = "**********";

/// Append-only record of what happened to every file in a run.
pub struct ActionLog {
    path: PathBuf,
    out: BufWriter<File>,
    echo: bool,
}

impl ActionLog {
    /// Open `<dir>/<program>_<YYYYmmdd-HHMMSS>.log` and write the header.
    pub fn create(
        dir: &Path,
        program: &str,
        started_at: DateTime<Local>,
        echo: bool,
    ) -> Result<Self> {
        let path = dir.join(log_file_name(program, started_at));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| Error::ActionLog {
                path: path.clone(),
                source,
            })?;
        let mut log = Self {
            path,
            out: BufWriter::new(file),
            echo,
        };
        let header = format!("{} logfile ({})", program, log.path.display());
        log.write(&header)?;
        log.write(RULE)?;
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// One numbered line for a processed file, with an optional `[remark]`
    /// when the planned copy did not happen.
    pub fn record(
        &mut self,
        seq: u64,
        src: &Path,
        classification: &Classification,
        remark: Option<&str>,
    ) -> Result<()> {
        let mut line = format_action(seq, src, classification);
        if let Some(remark) = remark {
            line.push_str(&format!("  [{}]", remark));
        }
        if self.echo {
            println!("{}", line);
        }
        self.write(&line)
    }

    /// Free-form line (summary, timings).
    pub fn note(&mut self, line: &str) -> Result<()> {
        self.write(line)
    }

    pub fn rule(&mut self) -> Result<()> {
        self.write(RULE)
    }

    pub fn finish(&mut self) -> Result<()> {
        self.out.flush().map_err(|source| Error::ActionLog {
            path: self.path.clone(),
            source,
        })
    }

    fn write(&mut self, line: &str) -> Result<()> {
        writeln!(self.out, "{}", line).map_err(|source| Error::ActionLog {
            path: self.path.clone(),
            source,
        })
    }
}

pub fn log_file_name(program: &str, started_at: DateTime<Local>) -> String {
    format!("{}_{}.log", program, started_at.format("%Y%m%d-%H%M%S"))
}

/// `<seq>. <TAG>: <src> +> <dest>` for copies, `==` for duplicates.
pub fn format_action(seq: u64, src: &Path, classification: &Classification) -> String {
    let tag = classification.disposition.tag();
    let arrow = match classification.disposition {
        Disposition::Added | Disposition::NoDateAdded => "+>",
        Disposition::DuplicateContent
        | Disposition::DuplicateNameOnly
        | Disposition::NoDateDuplicate => "==",
        Disposition::Ignored => "",
    };
    match &classification.destination {
        Some(dest) if !arrow.is_empty() => format!(
            "{}. {:<13}: {} {} {}",
            seq,
            tag,
            src.display(),
            arrow,
            dest.display()
        ),
        _ => format!("{}. {:<13}: {}", seq, tag, src.display()),
    }
}
