use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Carries out the directory and copy actions the engine decides on.
pub trait ActionSink {
    /// Make sure `dir` exists. Creating an existing directory is not an error.
    fn ensure_dir(&mut self, dir: &Path) -> Result<()>;

    /// Copy `src` into `dest_dir` under its own name without replacing anything
    /// already there. Returns `false` when the target turned out to exist.
    fn copy(&mut self, src: &Path, dest_dir: &Path) -> Result<bool>;

    /// Flush whatever is buffered once the run is over.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Performs the actions directly on the filesystem.
#[derive(Debug, Default)]
pub struct CopyExecutor {
    created_dirs: HashSet<PathBuf>,
}

impl CopyExecutor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ActionSink for CopyExecutor {
    fn ensure_dir(&mut self, dir: &Path) -> Result<()> {
        // Create directory only once per unique path
        if self.created_dirs.contains(dir) {
            return Ok(());
        }
        if !dir.is_dir() {
            fs::create_dir_all(dir).map_err(|source| Error::DestinationUnwritable {
                path: dir.to_path_buf(),
                source,
            })?;
            tracing::info!(dir = %dir.display(), "created folder");
        }
        self.created_dirs.insert(dir.to_path_buf());
        Ok(())
    }

    fn copy(&mut self, src: &Path, dest_dir: &Path) -> Result<bool> {
        let dest = match src.file_name() {
            Some(name) => dest_dir.join(name),
            None => dest_dir.to_path_buf(),
        };
        let copy_err = |source: io::Error| Error::Copy {
            src: src.to_path_buf(),
            dest: dest.clone(),
            source,
        };

        let meta = fs::metadata(src).map_err(copy_err)?;
        let mut input = File::open(src).map_err(copy_err)?;

        // create_new refuses to open a file that already exists, so a file
        // that appeared after classification is left alone.
        let out = match OpenOptions::new().write(true).create_new(true).open(&dest) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                tracing::warn!(
                    dest = %dest.display(),
                    "target appeared before copy, not overwriting"
                );
                return Ok(false);
            }
            Err(e) => return Err(copy_err(e)),
        };

        let mut out = BufWriter::new(out);
        let written = io::copy(&mut input, &mut out).and_then(|_| out.flush());
        if let Err(e) = written {
            drop(out);
            let _ = fs::remove_file(&dest);
            return Err(copy_err(e));
        }
        drop(out);

        let atime = filetime::FileTime::from_last_access_time(&meta);
        let mtime = filetime::FileTime::from_last_modification_time(&meta);
        if let Err(e) = filetime::set_file_times(&dest, atime, mtime) {
            tracing::warn!(dest = %dest.display(), error = %e, "could not preserve file times");
        }
        if let Err(e) = fs::set_permissions(&dest, meta.permissions()) {
            tracing::warn!(dest = %dest.display(), error = %e, "could not preserve permissions");
        }

        Ok(true)
    }
}

/// Writes the actions as shell commands to run later, elsewhere.
pub struct ScriptWriter {
    path: PathBuf,
    out: BufWriter<File>,
    emitted_dirs: HashSet<PathBuf>,
}

impl ScriptWriter {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path).map_err(|source| Error::Script {
            path: path.clone(),
            source,
        })?;
        let mut writer = Self {
            path,
            out: BufWriter::new(file),
            emitted_dirs: HashSet::new(),
        };
        writer.line("#!/bin/sh")?;
        Ok(writer)
    }

    fn line(&mut self, command: &str) -> Result<()> {
        writeln!(self.out, "{}", command).map_err(|source| Error::Script {
            path: self.path.clone(),
            source,
        })
    }
}

impl ActionSink for ScriptWriter {
    fn ensure_dir(&mut self, dir: &Path) -> Result<()> {
        if dir.is_dir() || !self.emitted_dirs.insert(dir.to_path_buf()) {
            return Ok(());
        }
        self.line(&format!("mkdir -pv {}", shell_quote(dir)))
    }

    fn copy(&mut self, src: &Path, dest_dir: &Path) -> Result<bool> {
        let dest_dir = format!("{}/", dest_dir.display());
        self.line(&format!(
            "cp -pnv {} {}",
            shell_quote(src),
            shell_quote(Path::new(&dest_dir))
        ))?;
        Ok(true)
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush().map_err(|source| Error::Script {
            path: self.path.clone(),
            source,
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o755)).map_err(
                |source| Error::Script {
                    path: self.path.clone(),
                    source,
                },
            )?;
        }
        Ok(())
    }
}

/// Single-quote a path for `sh`.
fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', r"'\''"))
}
