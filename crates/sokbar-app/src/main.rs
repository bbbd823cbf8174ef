// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// sökbar — turn scanned images into searchable PDFs.
//
// Entry point. Parses the command line, initialises logging, and dispatches to
// the command handlers.

mod commands;
mod services;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use sokbar_core::types::ProperNameMode;

#[derive(Parser)]
#[command(
    name = "sokbar",
    version,
    about = "Turn scanned images into searchable PDFs with an invisible OCR text layer"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// OCR images and write one searchable PDF per image
    Convert(ConvertArgs),
    /// Classify each line of a text file and print the key details found
    KeyDetails {
        /// Text file, one candidate per line
        text_file: PathBuf,

        /// Which tail the proper-name rule checks
        #[arg(long, value_enum, default_value = "raw")]
        mode: NameMode,
    },
    /// Concatenate PDFs in the given order
    Merge {
        /// PDFs to combine
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Combined output file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },
}

#[derive(clap::Args)]
pub struct ConvertArgs {
    /// Image files or directories (scanned recursively for PNG/JPEG)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output directory for PDFs and dump files
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// JSON pipeline configuration
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// TrueType font for the text layer
    #[arg(long, value_name = "FILE")]
    pub font: Option<PathBuf>,

    /// Directory holding text-detection.rten and text-recognition.rten
    #[arg(long, value_name = "DIR")]
    pub model_dir: Option<PathBuf>,

    /// Do not overwrite inputs with their orientation-corrected version
    #[arg(long)]
    pub keep_original: bool,

    /// Also save a copy of each image with detected regions outlined
    #[arg(long)]
    pub overlay: bool,

    /// Which tail the proper-name rule checks
    #[arg(long, value_enum)]
    pub mode: Option<NameMode>,

    /// Combine all produced PDFs into this file
    #[arg(long, value_name = "FILE")]
    pub merge: Option<PathBuf>,

    /// Write the batch report as JSON
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Directory for a timestamped session log
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum NameMode {
    /// Tail of the raw text must be lowercase
    Raw,
    /// Tail of the sanitised text must be lowercase
    Sanitized,
}

impl From<NameMode> for ProperNameMode {
    fn from(mode: NameMode) -> Self {
        match mode {
            NameMode::Raw => ProperNameMode::RawTail,
            NameMode::Sanitized => ProperNameMode::SanitizedTail,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let log_dir = match &cli.command {
        Commands::Convert(args) => args.log_dir.as_deref(),
        _ => None,
    };
    match services::logging::init(log_dir) {
        Ok(Some(path)) => tracing::info!(path = %path.display(), "Session log opened"),
        Ok(None) => {}
        Err(e) => {
            eprintln!("Error: cannot open session log: {e}");
            std::process::exit(1);
        }
    }

    let result = match cli.command {
        Commands::Convert(args) => commands::convert::run(args),
        Commands::KeyDetails { text_file, mode } => commands::key_details::run(&text_file, mode.into()),
        Commands::Merge { inputs, output } => commands::merge::run(&inputs, &output),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "Command failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
