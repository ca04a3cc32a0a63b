use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use photofile_core::{
    format_elapsed, Backend, CancellationToken, OutputMode, ProcessControl, ProcessOptions,
    RunReport,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "photofile",
    version,
    about = "Organize image files by capture date",
    long_about = "Organize image files by capture date.\n\n\
        Every image file under SOURCE and its sub-folders is copied to \
        DESTINATION/YYYY/YYYY-MM-DD according to its capture date. Files that \
        already exist there are reported as duplicates and never overwritten. \
        Files without a capture date go to DESTINATION/No-Capture-Date. \
        The action taken for each file is recorded in a logfile."
)]
struct Cli {
    /// Source folder of images
    source: PathBuf,

    /// Destination folder of images
    destination: PathBuf,

    /// Display the action taken on each image file
    #[arg(short, long)]
    log: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,

    /// Write a shell script with the copy commands instead of copying
    #[arg(long)]
    script: bool,

    /// Capture-date reader
    #[arg(long, value_enum, default_value_t = BackendArg::Exif)]
    backend: BackendArg,

    /// Folder for the logfile (and script); defaults to DESTINATION, or the
    /// current folder with --script
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    /// Built-in EXIF reader (photos only)
    Exif,
    /// External exiftool program (photos and videos)
    Exiftool,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Exif => Backend::Exif,
            BackendArg::Exiftool => Backend::Exiftool,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let options = ProcessOptions {
        source: cli.source,
        destination: cli.destination,
        mode: if cli.script {
            OutputMode::Script
        } else {
            OutputMode::Copy
        },
        backend: cli.backend.into(),
        show_log: cli.log,
        log_dir: cli.log_dir,
        program: "photofile".to_string(),
    };

    if !cli.yes && !confirm(&options)? {
        println!("'Q'uit accepted, ... goodbye .....");
        return Ok(());
    }

    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted, finishing the current file ...");
        handler_token.cancel();
    })?;
    let control = ProcessControl::new().with_cancel_token(token);

    let pb = if cli.log || cli.json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    pb.set_style(ProgressStyle::default_spinner().template("{spinner} {pos} files  {msg}")?);

    println!("\nphotofile ..... processing .....");
    let progress_pb = pb.clone();
    let report = photofile_core::process_with_control(&options, &control, &move |current, name| {
        progress_pb.set_position(current);
        progress_pb.set_message(name.to_string());
        progress_pb.tick();
    })?;
    pb.finish_and_clear();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Answer {
    Continue,
    Quit,
    Again,
}

fn parse_answer(input: &str) -> Answer {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => Answer::Continue,
        "q" | "quit" => Answer::Quit,
        _ => Answer::Again,
    }
}

/// Ask before touching anything. `Y` continues, `Q` quits, anything else asks again.
/// Without a terminal to ask on, the run is refused instead.
fn confirm(options: &ProcessOptions) -> anyhow::Result<bool> {
    let term = Term::stdout();
    if !term.is_term() || !std::io::stdin().is_terminal() {
        anyhow::bail!("no terminal to confirm on, pass --yes to run unattended");
    }
    loop {
        term.write_line(&format!(
            "\nSource [{}]   Destination [{}]",
            options.source.display(),
            options.destination.display()
        ))?;
        if options.mode == OutputMode::Script {
            term.write_line("(copy commands will be written to a script, nothing is copied)")?;
        }
        term.write_str(">> ok to continue (Y/N/Q)? ")?;
        match parse_answer(&term.read_line()?) {
            Answer::Continue => return Ok(true),
            Answer::Quit => return Ok(false),
            Answer::Again => continue,
        }
    }
}

fn print_report(report: &RunReport) {
    println!();
    println!("Source:      {}", report.source.display());
    println!("Destination: {}", report.destination.display());
    println!("Logfile:     {}", report.log_path.display());
    if let Some(script) = &report.script_path {
        println!("cp script:   {}", script.display());
    }
    println!();
    for line in report.counters.summary_lines() {
        println!("{}", line);
    }

    if report.counters.has_duplicates() {
        println!(
            "\n{}\n    please >>> grep 'DUP' {} <<< for duplicated files",
            style("*** Warning - DUPLICATES FOUND!").yellow().bold(),
            report.log_path.display()
        );
    }

    println!("\nElapsed Time: {}", format_elapsed(report.elapsed));
    if report.cancelled {
        println!(
            "{}",
            style("*** Cancelled, run again to pick up the remaining files ***").red()
        );
    } else {
        println!("***** Done! *****\n");
    }
}
