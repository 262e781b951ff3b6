use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use transplant::job::{parse_paste, scan_directory};
use transplant::worker::crossbeam_channel;
use transplant::{
    default_config_path, load_settings, BatchSummary, JobOutcome, JobQueue, JobRunner, RunEvent,
    RunnerError, Settings, Tracker,
};

/// Copies torrents between RED and OPS.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Torrent ids, torrent URLs or .torrent files
    inputs: Vec<String>,

    /// Settings file (defaults to the platform config directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Tracker that bare torrent ids belong to
    #[arg(short, long, value_name = "RED|OPS")]
    source: Option<Tracker>,

    /// Add every .torrent file in DIR (or the configured scan directory)
    #[arg(long, value_name = "DIR", num_args = 0..=1)]
    scan: Option<Option<PathBuf>>,

    /// Build a new torrent from local content instead of rewriting the source one
    #[arg(long)]
    new_torrent: bool,

    /// Upload into this existing group on the destination
    #[arg(long, value_name = "ID")]
    group: Option<u64>,

    /// Emit run events as JSON lines
    #[arg(long)]
    json: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

const EXIT_FAILED: u8 = 1;
const EXIT_CONFIG: u8 = 2;

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_tracing(args.verbose, args.json) {
        eprintln!("Failed to set up logging: {}", e);
        return ExitCode::from(EXIT_FAILED);
    }

    let settings = match settings_from(&args) {
        Ok(settings) => Arc::new(settings),
        Err(message) => {
            error!("{}", message);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let queue = build_queue(&args, &settings);
    if queue.is_empty() {
        warn!("Nothing to do: no valid inputs");
        return ExitCode::SUCCESS;
    }

    let runner = JobRunner::new();
    let stop = runner.stop_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        if !stop.is_stop_requested() {
            eprintln!("Stopping after the current job...");
        }
        stop.stop();
    }) {
        warn!("Ctrl-C handler not installed: {}", e);
    }

    let (tx, rx) = crossbeam_channel::unbounded();
    let handle = match runner.spawn(queue.clone(), Arc::clone(&settings), tx) {
        Ok(handle) => handle,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_FAILED);
        }
    };

    // The sender lives in the worker thread, so this ends with the batch.
    for event in rx.iter() {
        render(&event, args.json);
    }

    match handle.join() {
        Ok(Ok(summary)) => ExitCode::from(exit_code(&summary)),
        Ok(Err(e)) => {
            error!("{}", e);
            match e {
                RunnerError::Config(_) | RunnerError::ApiSetup(_) | RunnerError::RehostSetup(_) => {
                    ExitCode::from(EXIT_CONFIG)
                }
                _ => ExitCode::from(EXIT_FAILED),
            }
        }
        Err(_) => {
            error!("Batch thread panicked");
            ExitCode::from(EXIT_FAILED)
        }
    }
}

fn init_tracing(verbose: u8, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    // Logs go to stderr so stdout carries only results.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.with_target(false).finish())?;
    }

    tracing_log::LogTracer::init()?;
    Ok(())
}

fn settings_from(args: &Args) -> Result<Settings, String> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path().ok_or("No config directory on this platform, pass --config")?,
    };
    info!("Loading settings from {}", path.display());
    load_settings(&path).map_err(|e| e.to_string())
}

fn build_queue(args: &Args, settings: &Settings) -> JobQueue {
    let queue = JobQueue::new();
    let source = args.source.unwrap_or(settings.default_source);

    let mut jobs = parse_paste(&args.inputs.join("\n"), source);
    match &args.scan {
        Some(Some(dir)) => jobs.extend(scan_directory(dir)),
        Some(None) => match &settings.scan_dir {
            Some(dir) => jobs.extend(scan_directory(dir)),
            None => warn!("--scan given but no scan directory is configured"),
        },
        None => {}
    }

    if args.group.is_some() && jobs.len() > 1 {
        warn!("--group applies to all {} jobs", jobs.len());
    }
    for mut job in jobs {
        job.new_torrent = args.new_torrent;
        job.dest_group = args.group;
        let label = job.label();
        if !queue.append(job) {
            info!("Skipping duplicate: {}", label);
        }
    }
    queue
}

fn render(event: &RunEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Could not encode event: {}", e),
        }
        return;
    }

    match event {
        RunEvent::BatchStarted { jobs, .. } => println!("Transplanting {} job(s)", jobs),
        RunEvent::JobStarted { name, .. } => println!("-> {}", name),
        RunEvent::JobFinished { name, outcome, .. } => match outcome {
            JobOutcome::Uploaded { url } => println!("   uploaded: {}", url),
            JobOutcome::AlreadyExists { url } => println!("   already on destination: {}", url),
            JobOutcome::Failed { message } => println!("   failed: {}", message),
            JobOutcome::SkippedRemoved => println!("   skipped {} (removed)", name),
        },
        RunEvent::BatchFinished { summary, .. } => {
            println!(
                "Done: {} uploaded, {} already present, {} failed, {} skipped",
                summary.uploaded, summary.already_exists, summary.failed, summary.skipped
            );
            if summary.stopped {
                println!("Stopped early, {} job(s) not attempted", summary.not_attempted);
            }
        }
    }
}

fn exit_code(summary: &BatchSummary) -> u8 {
    if summary.has_failures() {
        EXIT_FAILED
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_flag_forms() {
        let args = Args::try_parse_from(["transplant", "--scan"]).unwrap();
        assert_eq!(args.scan, Some(None));

        let args = Args::try_parse_from(["transplant", "--scan", "/tmp/in", "123"]).unwrap();
        assert_eq!(args.scan, Some(Some(PathBuf::from("/tmp/in"))));
        assert_eq!(args.inputs, vec!["123".to_string()]);

        let args = Args::try_parse_from(["transplant", "1", "2"]).unwrap();
        assert_eq!(args.scan, None);
    }

    #[test]
    fn test_source_and_verbosity() {
        let args = Args::try_parse_from(["transplant", "-s", "ops", "-vv", "5"]).unwrap();
        assert_eq!(args.source, Some(Tracker::Ops));
        assert_eq!(args.verbose, 2);
        assert!(Args::try_parse_from(["transplant", "-s", "btn"]).is_err());
    }

    #[test]
    fn test_build_queue_drops_duplicates_and_applies_flags() {
        let args =
            Args::try_parse_from(["transplant", "--new-torrent", "--group", "9", "10", "10", "11"])
                .unwrap();
        let queue = build_queue(&args, &Settings::default());
        let jobs = queue.snapshot();
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.new_torrent && j.dest_group == Some(9)));
        assert!(jobs.iter().all(|j| j.src_tracker == Tracker::Red));
    }

    #[test]
    fn test_exit_code_follows_failures() {
        let ok = BatchSummary {
            total: 2,
            uploaded: 1,
            already_exists: 1,
            ..BatchSummary::default()
        };
        assert_eq!(exit_code(&ok), 0);
        let failed = BatchSummary {
            failed: 1,
            ..ok
        };
        assert_eq!(exit_code(&failed), EXIT_FAILED);
    }
}
