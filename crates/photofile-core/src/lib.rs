pub mod action_log;
pub mod cancel;
pub mod counters;
pub mod date;
pub mod engine;
pub mod error;
pub mod media;
pub mod walk;
pub mod writer;

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::Local;
use serde::{Deserialize, Serialize};

pub use cancel::CancellationToken;
pub use counters::RunCounters;
pub use date::{Backend, CaptureDate, DateSource};
pub use engine::{Classification, Disposition, Engine};
pub use error::{Error, Result};

use action_log::ActionLog;
use media::MediaFile;
use writer::{ActionSink, CopyExecutor, ScriptWriter};

fn default_program() -> String {
    "photofile".to_string()
}

/// How the decided copies are carried out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Copy files into the destination now
    #[default]
    Copy,
    /// Write a shell script with the equivalent `mkdir`/`cp` commands
    Script,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOptions {
    pub source: PathBuf,
    pub destination: PathBuf,
    #[serde(default)]
    pub mode: OutputMode,
    #[serde(default)]
    pub backend: Backend,
    /// Echo every action-log line to stdout
    #[serde(default)]
    pub show_log: bool,
    /// Where the log (and script) go; defaults to the destination in copy
    /// mode and the current directory in script mode
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Prefix for the log and script file names
    #[serde(default = "default_program")]
    pub program: String,
}

impl ProcessOptions {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            mode: OutputMode::default(),
            backend: Backend::default(),
            show_log: false,
            log_dir: None,
            program: default_program(),
        }
    }

    fn log_dir(&self) -> PathBuf {
        match (&self.log_dir, self.mode) {
            (Some(dir), _) => dir.clone(),
            (None, OutputMode::Copy) => self.destination.clone(),
            (None, OutputMode::Script) => PathBuf::from("."),
        }
    }
}

/// Control options for process execution.
#[derive(Debug, Clone, Default)]
pub struct ProcessControl {
    /// Checked before each file; a cancelled run stops cleanly between files.
    pub cancel_token: Option<CancellationToken>,
}

impl ProcessControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_token
            .as_ref()
            .map_or(false, CancellationToken::is_cancelled)
    }
}

/// Outcome of a run, complete or cancelled.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub counters: RunCounters,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub log_path: PathBuf,
    pub script_path: Option<PathBuf>,
    pub elapsed: Duration,
    pub cancelled: bool,
}

/// Type alias for progress callback: entries seen so far and the current file name.
pub type ProgressCallback = dyn Fn(u64, &str) + Send + Sync;

/// Throttled progress reporter, emits at most every 200ms.
pub struct ThrottledProgress<'a> {
    inner: &'a ProgressCallback,
    last_emit: Mutex<Instant>,
}

impl<'a> ThrottledProgress<'a> {
    pub fn new(inner: &'a ProgressCallback) -> Self {
        Self {
            inner,
            last_emit: Mutex::new(Instant::now() - Duration::from_secs(1)),
        }
    }

    pub fn report(&self, current: u64, message: &str) {
        let mut last = self.last_emit.lock().unwrap_or_else(|p| p.into_inner());
        if last.elapsed().as_millis() < 200 {
            return;
        }
        *last = Instant::now();
        (self.inner)(current, message);
    }

    /// Always emits; used for the final count.
    pub fn finish(&self, current: u64, message: &str) {
        (self.inner)(current, message);
    }
}

/// Organize `options.source` into `options.destination` using the configured
/// metadata backend.
pub fn process(
    options: &ProcessOptions,
    progress_callback: &ProgressCallback,
) -> Result<RunReport> {
    process_with_control(options, &ProcessControl::default(), progress_callback)
}

pub fn process_with_control(
    options: &ProcessOptions,
    control: &ProcessControl,
    progress_callback: &ProgressCallback,
) -> Result<RunReport> {
    // The backend (and any exiftool processes it starts) lives exactly as long as the run.
    let dates = options.backend.open();
    process_with_source(options, control, dates.as_ref(), progress_callback)
}

/// Run with an explicit metadata source.
pub fn process_with_source(
    options: &ProcessOptions,
    control: &ProcessControl,
    dates: &dyn DateSource,
    progress_callback: &ProgressCallback,
) -> Result<RunReport> {
    let start = Instant::now();
    let started_at = Local::now();
    let tp = ThrottledProgress::new(progress_callback);

    if !options.source.is_dir() {
        return Err(Error::SourceNotFound {
            path: options.source.clone(),
        });
    }

    let dest_root = options.destination.as_path();
    let no_date_dir = engine::no_date_dir(dest_root);
    let log_dir = options.log_dir();

    let mut script_path = None;
    let mut sink: Box<dyn ActionSink> = match options.mode {
        OutputMode::Copy => Box::new(CopyExecutor::new()),
        OutputMode::Script => {
            let path = log_dir.join(format!(
                "{}_{}_cp.sh",
                options.program,
                started_at.format("%Y%m%d-%H%M%S")
            ));
            let writer = ScriptWriter::create(&path)?;
            script_path = Some(path);
            Box::new(writer)
        }
    };

    // Destination root and the no-date folder exist before any file is looked at.
    sink.ensure_dir(dest_root)?;
    sink.ensure_dir(&no_date_dir)?;

    let mut log = ActionLog::create(&log_dir, &options.program, started_at, options.show_log)?;
    tracing::info!(
        source = %options.source.display(),
        destination = %dest_root.display(),
        log = %log.path().display(),
        "starting run"
    );

    let mut engine = Engine::new(dest_root, dates);
    let mut counters = RunCounters::new();
    let mut cancelled = false;

    for path in walk::walk_files(&options.source) {
        if control.is_cancelled() {
            tracing::info!(processed = counters.all_entries, "run cancelled");
            cancelled = true;
            break;
        }

        let file = MediaFile::new(path);
        let classification = engine.process(&file);

        let remark = carry_out(
            sink.as_mut(),
            &mut engine,
            &mut counters,
            &file,
            &classification,
        )?;

        counters.observe(classification.disposition);
        log.record(
            counters.all_entries,
            &file.path,
            &classification,
            remark.as_deref(),
        )?;
        tp.report(counters.all_entries, &file.filename);
    }
    tp.finish(counters.all_entries, "");

    sink.finish()?;

    let elapsed = start.elapsed();
    write_summary(
        &mut log,
        options,
        script_path.as_deref(),
        &counters,
        elapsed,
        cancelled,
    )?;
    log.finish()?;

    Ok(RunReport {
        counters,
        source: options.source.clone(),
        destination: options.destination.clone(),
        log_path: log.path().to_path_buf(),
        script_path,
        elapsed,
        cancelled,
    })
}

/// Execute the planned copy, if any. Returns the remark for the log line when
/// the copy did not happen. Only a destination that cannot be written stops
/// the run.
fn carry_out(
    sink: &mut dyn ActionSink,
    engine: &mut Engine<'_>,
    counters: &mut RunCounters,
    file: &MediaFile,
    classification: &Classification,
) -> Result<Option<String>> {
    let dir = match classification.destination_dir() {
        Some(dir) if classification.needs_copy => dir,
        _ => return Ok(None),
    };
    sink.ensure_dir(dir)?;
    match sink.copy(&file.path, dir) {
        Ok(true) => Ok(None),
        Ok(false) => Ok(Some("not copied, target already exists".to_string())),
        Err(Error::Copy { source, .. }) => {
            tracing::warn!(src = %file.path.display(), error = %source, "copy failed, continuing");
            if let Some(target) = &classification.destination {
                engine.copy_failed(target);
            }
            counters.copy_failed();
            Ok(Some(format!("copy failed: {}", source)))
        }
        Err(e) => Err(e),
    }
}

fn write_summary(
    log: &mut ActionLog,
    options: &ProcessOptions,
    script_path: Option<&Path>,
    counters: &RunCounters,
    elapsed: Duration,
    cancelled: bool,
) -> Result<()> {
    log.rule()?;
    log.note(&format!("Source:      {}", options.source.display()))?;
    log.note(&format!("Destination: {}", options.destination.display()))?;
    let log_line = format!("Logfile:     {}", log.path().display());
    log.note(&log_line)?;
    if let Some(script) = script_path {
        log.note(&format!("cp script:   {}", script.display()))?;
    }
    log.note("")?;
    for line in counters.summary_lines() {
        log.note(&line)?;
    }
    log.note("")?;
    log.note(&format!("Elapsed Time: {}", format_elapsed(elapsed)))?;
    log.note(if cancelled {
        "*** Cancelled ***"
    } else {
        "*** Done! ***"
    })
}

/// `H:MM:SS.mmm`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "{}:{:02}:{:02}.{:03}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        elapsed.subsec_millis()
    )
}
