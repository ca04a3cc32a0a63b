use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::{CaptureDate, DateSource};

const READY_MARKER: &str = "{ready";

/// Pool of long-lived `exiftool -stay_open` processes.
///
/// A process is spawned on first demand and handed back to the pool after each
/// query, so startup cost is paid once per worker instead of once per file.
/// Dropping the pool shuts every process down.
pub struct ExifTool {
    program: String,
    idle: Mutex<Vec<Process>>,
    unavailable: AtomicBool,
}

impl Default for ExifTool {
    fn default() -> Self {
        Self::new()
    }
}

impl ExifTool {
    pub fn new() -> Self {
        Self::with_program("exiftool")
    }

    /// Use a specific exiftool executable.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            idle: Mutex::new(Vec::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Raw `CreateDate` value as exiftool prints it.
    pub fn create_date(&self, path: &Path) -> io::Result<Option<String>> {
        let mut process = self.checkout()?;
        match process.query_create_date(path) {
            Ok(value) => {
                self.checkin(process);
                Ok(value)
            }
            // A process that answered out of protocol is not reused.
            Err(e) => {
                process.kill();
                Err(e)
            }
        }
    }

    fn checkout(&self) -> io::Result<Process> {
        if let Some(process) = self.idle.lock().unwrap_or_else(|p| p.into_inner()).pop() {
            return Ok(process);
        }
        Process::spawn(&self.program)
    }

    fn checkin(&self, process: Process) {
        self.idle
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(process);
    }
}

impl DateSource for ExifTool {
    fn capture_date(&self, path: &Path) -> Option<CaptureDate> {
        if self.unavailable.load(Ordering::Relaxed) {
            return None;
        }
        match self.create_date(path) {
            Ok(raw) => raw.as_deref().and_then(CaptureDate::from_raw),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if !self.unavailable.swap(true, Ordering::Relaxed) {
                    tracing::warn!(
                        program = %self.program,
                        "exiftool not found, every file will be treated as undated"
                    );
                }
                None
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "exiftool query failed");
                None
            }
        }
    }
}

struct Process {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl Process {
    fn spawn(program: &str) -> io::Result<Self> {
        let mut child = Command::new(program)
            .args(["-stay_open", "True", "-@", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "exiftool stdin closed"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "exiftool stdout closed"))?;
        tracing::debug!(pid = child.id(), "started exiftool");
        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    fn query_create_date(&mut self, path: &Path) -> io::Result<Option<String>> {
        let arg = path.to_string_lossy();
        // The argument file is line based.
        if arg.contains('\n') {
            return Ok(None);
        }
        write!(self.stdin, "-CreateDate\n-s3\n{}\n-execute\n", arg)?;
        self.stdin.flush()?;

        let mut value = None;
        let mut line = String::new();
        loop {
            line.clear();
            if self.stdout.read_line(&mut line)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "exiftool exited mid-query",
                ));
            }
            let text = line.trim_end();
            if text.starts_with(READY_MARKER) {
                return Ok(value);
            }
            if value.is_none() && !text.is_empty() {
                value = Some(text.to_string());
            }
        }
    }

    fn kill(mut self) {
        let _ = self.child.kill();
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        let _ = self.stdin.write_all(b"-stay_open\nFalse\n");
        let _ = self.stdin.flush();
        if self.child.wait().is_err() {
            let _ = self.child.kill();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_missing_program_is_not_fatal() {
        let tool = ExifTool::with_program("photofile-test-no-such-exiftool");
        assert_eq!(tool.capture_date(Path::new("/tmp/a.jpg")), None);
        assert!(tool.unavailable.load(Ordering::Relaxed));
        // Later files short-circuit without trying to spawn again.
        assert_eq!(tool.capture_date(Path::new("/tmp/b.jpg")), None);
    }

    /// Stand-in for `exiftool -stay_open True -@ -`: answers every `-execute`
    /// with a fixed CreateDate, prints nothing for names containing `nodate`
    /// and exits mid-query for names containing `crash`. Each start and
    /// orderly stop is appended to `events`.
    #[cfg(unix)]
    struct FakeExifTool {
        dir: TempDir,
    }

    #[cfg(unix)]
    impl FakeExifTool {
        fn new() -> Self {
            use std::os::unix::fs::PermissionsExt;

            let dir = tempfile::tempdir().unwrap();
            let events = dir.path().join("events");
            let script = format!(
                r#"#!/bin/sh
echo start >> '{events}'
while IFS= read -r line; do
  case "$line" in
    -execute)
      case "$file" in
        *crash*) exit 1 ;;
        *nodate*) ;;
        *) echo '2021:03:04 10:22:00' ;;
      esac
      echo '{{ready}}' ;;
    False) echo stop >> '{events}'; exit 0 ;;
    -*|True) ;;
    *) file="$line" ;;
  esac
done
"#,
                events = events.display()
            );
            let program = dir.path().join("exiftool");
            fs::write(&program, script).unwrap();
            fs::set_permissions(&program, fs::Permissions::from_mode(0o755)).unwrap();
            Self { dir }
        }

        fn tool(&self) -> ExifTool {
            ExifTool::with_program(self.program().to_string_lossy())
        }

        fn program(&self) -> PathBuf {
            self.dir.path().join("exiftool")
        }

        fn events(&self) -> Vec<String> {
            fs::read_to_string(self.dir.path().join("events"))
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_one_process_serves_many_files() {
        let fake = FakeExifTool::new();
        let tool = fake.tool();

        let expected = CaptureDate::from_ymd(2021, 3, 4);
        assert_eq!(tool.capture_date(Path::new("/card/IMG_01.JPG")), expected);
        assert_eq!(tool.capture_date(Path::new("/card/IMG_02.JPG")), expected);
        assert_eq!(tool.capture_date(Path::new("/card/clip.MOV")), expected);

        assert_eq!(fake.events(), vec!["start"]);
        assert_eq!(tool.idle.lock().unwrap().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_raw_value_and_empty_answer() {
        let fake = FakeExifTool::new();
        let tool = fake.tool();

        assert_eq!(
            tool.create_date(Path::new("/card/IMG_01.JPG")).unwrap().as_deref(),
            Some("2021:03:04 10:22:00")
        );
        assert_eq!(tool.create_date(Path::new("/card/nodate.jpg")).unwrap(), None);
        assert_eq!(tool.capture_date(Path::new("/card/nodate.jpg")), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_broken_process_is_replaced() {
        let fake = FakeExifTool::new();
        let tool = fake.tool();

        assert_eq!(tool.capture_date(Path::new("/card/crash.jpg")), None);
        assert!(tool.idle.lock().unwrap().is_empty());
        assert!(!tool.unavailable.load(Ordering::Relaxed));

        assert_eq!(
            tool.capture_date(Path::new("/card/IMG_01.JPG")),
            CaptureDate::from_ymd(2021, 3, 4)
        );
        assert_eq!(fake.events(), vec!["start", "start"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_drop_stops_idle_processes() {
        let fake = FakeExifTool::new();
        let tool = fake.tool();
        tool.capture_date(Path::new("/card/IMG_01.JPG"));
        drop(tool);
        assert_eq!(fake.events(), vec!["start", "stop"]);
    }
}
