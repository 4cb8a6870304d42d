//! `hpb-seg` - command-line caller for the segmentation pipeline.
//!
//! Stands in for the HTTP layer: supplies an input stream, receives
//! the result archive path back, and prints it. Exit codes: 0 on
//! success, 2 for input errors, 1 for pipeline failures.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use hpb_core::models::{Task008Options, TotalSegOptions};
use hpb_core::{PipelineError, PipelineResult, SegmentationService, Settings};

#[derive(Parser)]
#[command(name = "hpb-seg", version, about = "HPB segmentation pipeline runner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Liver-only segmentation of a single volume.
    Liver {
        volume: PathBuf,
        #[arg(long)]
        fast: bool,
    },
    /// Hepatic vessel/tumour segmentation (nnU-Net Task008).
    Task008 {
        volume: PathBuf,
        #[arg(long, default_value = "0")]
        folds: String,
    },
    /// Multi-label whole-body segmentation.
    Multilabel {
        volume: PathBuf,
        #[arg(long)]
        fast: bool,
    },
    /// Combined liver + vessel/tumour pipeline with packaged metadata.
    Both {
        volume: PathBuf,
        #[arg(long, default_value = "0")]
        folds: String,
        #[arg(long)]
        fast: bool,
    },
    /// Process a zip/tar bundle of case directories.
    Batch {
        bundle: PathBuf,
        #[arg(long, default_value = "0")]
        folds: String,
        #[arg(long)]
        fast: bool,
    },
    /// Report presence and version of the external model tools.
    Tools,
}

fn main() -> ExitCode {
    hpb_core::logging::init_tracing("info");
    let cli = Cli::parse();

    let settings = Settings::from_env();
    if let Err(e) = settings.ensure_roots() {
        eprintln!("error: failed to create workspace roots: {e}");
        return ExitCode::FAILURE;
    }
    let service = SegmentationService::new(settings);

    if let Command::Tools = cli.command {
        let report = hpb_core::introspect::tool_versions(hpb_core::introspect::DEFAULT_TOOLS);
        match serde_json::to_string_pretty(&report) {
            Ok(json) => {
                println!("{json}");
                return ExitCode::SUCCESS;
            }
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    match run(&service, cli.command) {
        Ok(archive) => {
            println!("{}", archive.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            if e.is_input_error() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(service: &SegmentationService, command: Command) -> PipelineResult<PathBuf> {
    match command {
        Command::Liver { volume, fast } => {
            service.segment_liver(open(&volume)?, &TotalSegOptions { fast })
        }
        Command::Task008 { volume, folds } => {
            service.segment_task008(open(&volume)?, &Task008Options { folds })
        }
        Command::Multilabel { volume, fast } => {
            service.segment_multilabel(open(&volume)?, &TotalSegOptions { fast })
        }
        Command::Both {
            volume,
            folds,
            fast,
        } => service.segment_both(
            open(&volume)?,
            &Task008Options { folds },
            &TotalSegOptions { fast },
        ),
        Command::Batch {
            bundle,
            folds,
            fast,
        } => service.run_batch(
            open(&bundle)?,
            &Task008Options { folds },
            &TotalSegOptions { fast },
        ),
        Command::Tools => unreachable!("handled in main"),
    }
}

fn open(path: &Path) -> PipelineResult<File> {
    File::open(path)
        .map_err(|e| PipelineError::invalid_input(format!("cannot open {}: {e}", path.display())))
}
