// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `sokbar convert` — resolve settings, discover inputs, and drive a batch while
// printing progress to stderr.

use std::sync::Arc;

use sokbar_core::PipelineConfig;
use sokbar_core::error::{Result, SokbarError};
use tracing::warn;

use crate::ConvertArgs;
use crate::services::batch::{BatchEvent, BatchRequest, CancelFlag, spawn_batch};
use crate::services::detector::shared_detector;
use crate::services::inputs;

pub fn run(args: ConvertArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    let inputs = inputs::discover(&args.inputs)?;
    eprintln!("Converting {} image(s) into {}", inputs.len(), config.output_dir.display());

    let detector = Arc::new(shared_detector(config.model_dir.clone()));
    let request = BatchRequest {
        inputs,
        config,
        merge_into: args.merge.clone(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let cancel = CancelFlag::new();

    let report = runtime.block_on(async {
        let (handle, mut events) = spawn_batch(request, detector, cancel.clone());
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => print_progress(&event),
                    None => break,
                },
                _ = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                    warn!("Interrupt received; stopping after the current image");
                    cancel.cancel();
                }
            }
        }
        handle.await.map_err(|err| SokbarError::Io(std::io::Error::other(err)))?
    })?;

    if let Some(path) = &args.report {
        report.write_json(path)?;
        eprintln!("Report written to {}", path.display());
    }

    if report.is_clean() {
        eprintln!("Done: {} converted", report.converted.len());
        return Ok(());
    }
    eprintln!(
        "Done: {} converted, {} failed{}",
        report.converted.len(),
        report.failed.len(),
        if report.cancelled { " (cancelled)" } else { "" }
    );
    for failed in &report.failed {
        eprintln!("  failed: {}: {}", failed.source.display(), failed.error);
    }
    for file in &report.converted {
        if let Some(err) = &file.dump_error {
            eprintln!("  not dumped: {}: {}", file.source.display(), err);
        }
    }
    if let Some(err) = &report.merge_error {
        eprintln!("  merge failed: {err}");
    }
    Ok(())
}

/// Config file (or defaults) with command-line flags applied on top.
fn resolve_config(args: &ConvertArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = &args.output {
        config.output_dir = dir.clone();
    }
    if let Some(font) = &args.font {
        config.font_path = Some(font.clone());
    }
    if let Some(dir) = &args.model_dir {
        config.model_dir = Some(dir.clone());
    }
    if args.keep_original {
        config.persist_orientation = false;
    }
    if args.overlay {
        config.write_overlay = true;
    }
    if let Some(mode) = args.mode {
        config.proper_name_mode = mode.into();
    }
    config.validate()?;
    Ok(config)
}

fn print_progress(event: &BatchEvent) {
    match event {
        BatchEvent::Started { total, .. } => eprintln!("Started batch of {total}"),
        BatchEvent::Completed {
            index,
            total,
            source,
            pdf_path,
            key_details,
        } => eprintln!(
            "[{}/{}] {} -> {} ({} key details)",
            index + 1,
            total,
            source.display(),
            pdf_path.display(),
            key_details
        ),
        BatchEvent::Failed {
            index,
            total,
            source,
            error,
        } => eprintln!("[{}/{}] {} failed: {}", index + 1, total, source.display(), error),
        BatchEvent::Cancelled { processed } => eprintln!("Cancelled after {processed} image(s)"),
        BatchEvent::Merged { path, pages } => {
            eprintln!("Merged {} page(s) into {}", pages, path.display())
        }
    }
}
