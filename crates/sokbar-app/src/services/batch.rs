// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch orchestrator — runs the page pipeline over an ordered list of images.
//
// Files are processed one at a time on a blocking worker. A file that fails,
// or panics, is logged, recorded in the report and skipped; only a failure to
// build the detector stops the batch. Progress is reported over an unbounded
// channel so the worker never waits on its consumer.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Local};
use serde::Serialize;
use sokbar_core::PipelineConfig;
use sokbar_core::error::{Result, SokbarError};
use sokbar_core::types::KeyDetail;
use sokbar_document::{
    FontChoice, KeyDetailClassifier, OrientationPolicy, PageOutcome, PagePipeline, PdfMerger,
    SearchablePdfWriter, SharedDetector, TextLayout, load_label_font,
};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::dumps::DumpFiles;

/// What to convert and where.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Images in processing order.
    pub inputs: Vec<PathBuf>,
    pub config: PipelineConfig,
    /// Combine every produced PDF into this file at the end.
    pub merge_into: Option<PathBuf>,
}

/// Cooperative stop signal, checked between files.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress notifications, one per file plus bookends.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BatchEvent {
    Started {
        run_id: Uuid,
        total: usize,
    },
    Completed {
        index: usize,
        total: usize,
        source: PathBuf,
        pdf_path: PathBuf,
        key_details: usize,
    },
    Failed {
        index: usize,
        total: usize,
        source: PathBuf,
        error: String,
    },
    Cancelled {
        processed: usize,
    },
    Merged {
        path: PathBuf,
        pages: usize,
    },
}

/// Per-file result of a successful conversion.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub source: PathBuf,
    pub pdf_path: PathBuf,
    pub overlay_path: Option<PathBuf>,
    pub detections: usize,
    pub key_details: Vec<KeyDetail>,
    pub orientation_persisted: bool,
    /// Set when the PDF was written but the text dumps could not be appended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dump_error: Option<String>,
}

impl From<&PageOutcome> for FileReport {
    fn from(outcome: &PageOutcome) -> Self {
        Self {
            source: outcome.source.clone(),
            pdf_path: outcome.pdf_path.clone(),
            overlay_path: outcome.overlay_path.clone(),
            detections: outcome.page.detections.len(),
            key_details: outcome.key_details.clone(),
            orientation_persisted: outcome.orientation_persisted,
            dump_error: None,
        }
    }
}

/// A file the batch gave up on.
#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub source: PathBuf,
    pub error: String,
}

/// Summary of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub converted: Vec<FileReport>,
    pub failed: Vec<FailedFile>,
    pub cancelled: bool,
    pub merged: Option<PathBuf>,
    /// Why a requested merge produced nothing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_error: Option<String>,
}

impl BatchReport {
    /// Every file converted and dumped, any requested merge written, and the
    /// run not cancelled.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
            && !self.cancelled
            && self.merge_error.is_none()
            && self.converted.iter().all(|file| file.dump_error.is_none())
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// The compositor configured from `config`.
///
/// A parsed font is not `Send`, so each worker thread builds its own writer.
pub fn build_writer(config: &PipelineConfig) -> SearchablePdfWriter {
    let font = FontChoice::load(config.font_path.as_deref());
    SearchablePdfWriter::new(
        font,
        TextLayout::new(config.min_font_size, config.font_size_factor),
    )
}

/// Run the whole batch on the current thread.
///
/// Returns `Err` only for process-fatal errors (detector construction) and for
/// failures before the first file: an unusable output directory or dump files
/// that cannot be created. Later dump and merge failures are recorded in the
/// report instead.
#[instrument(skip_all, fields(files = request.inputs.len()))]
pub fn run_batch(
    request: &BatchRequest,
    detector: &SharedDetector,
    writer: &SearchablePdfWriter,
    cancel: &CancelFlag,
    events: Option<&UnboundedSender<BatchEvent>>,
) -> Result<BatchReport> {
    if request.inputs.is_empty() {
        return Err(SokbarError::NoInputs);
    }

    let config = &request.config;
    config.validate()?;
    std::fs::create_dir_all(&config.output_dir)?;

    let run_id = Uuid::new_v4();
    let started_at = Local::now();
    let total = request.inputs.len();
    info!(%run_id, total, output_dir = %config.output_dir.display(), "Batch started");
    emit(events, BatchEvent::Started { run_id, total });

    let mut dumps = DumpFiles::create(&config.text_dump_path(), &config.key_details_dump_path())?;
    let overlay_font = if config.write_overlay {
        load_label_font(config.font_path.as_deref())
    } else {
        None
    };
    let pipeline = PagePipeline::new(detector, writer)
        .with_classifier(KeyDetailClassifier::new(config.proper_name_mode))
        .with_orientation_policy(OrientationPolicy::from_persist_flag(config.persist_orientation))
        .with_overlay(config.write_overlay)
        .with_overlay_font(overlay_font);

    let mut converted = Vec::new();
    let mut failed = Vec::new();
    let mut cancelled = false;

    for (index, input) in request.inputs.iter().enumerate() {
        if cancel.is_cancelled() {
            warn!(processed = index, total, "Batch cancelled");
            emit(events, BatchEvent::Cancelled { processed: index });
            cancelled = true;
            break;
        }

        info!(index = index + 1, total, file = %input.display(), "Processing");
        let processed = catch_unwind(AssertUnwindSafe(|| {
            pipeline.process(input, &config.output_dir)
        }));
        let result = match processed {
            Ok(result) => result,
            Err(payload) => {
                let message = format!("panicked while processing: {}", panic_message(&*payload));
                failed.push(record_failure(events, index, total, input, message));
                continue;
            }
        };

        match result {
            Ok(outcome) => {
                let mut file = FileReport::from(&outcome);
                if let Err(err) = dumps.append(&outcome) {
                    let message = error_chain(&err);
                    error!(file = %input.display(), error = %message, "Failed to append text dumps");
                    file.dump_error = Some(message);
                }
                emit(
                    events,
                    BatchEvent::Completed {
                        index,
                        total,
                        source: input.clone(),
                        pdf_path: outcome.pdf_path.clone(),
                        key_details: outcome.key_details.len(),
                    },
                );
                converted.push(file);
            }
            Err(err) if err.is_fatal() => {
                error!(error = %error_chain(&err), "Detector unavailable; aborting batch");
                return Err(err);
            }
            Err(err) => {
                failed.push(record_failure(events, index, total, input, error_chain(&err)));
            }
        }
    }

    let mut merge_error = None;
    let merged = match &request.merge_into {
        Some(target) if !converted.is_empty() => {
            let pdfs: Vec<PathBuf> = converted.iter().map(|f| f.pdf_path.clone()).collect();
            match PdfMerger::new().merge_files(&pdfs, target) {
                Ok(pages) => {
                    emit(
                        events,
                        BatchEvent::Merged {
                            path: target.clone(),
                            pages,
                        },
                    );
                    Some(target.clone())
                }
                Err(err) => {
                    let message = error_chain(&err);
                    warn!(path = %target.display(), error = %message, "Merge failed; per-image PDFs kept");
                    merge_error = Some(message);
                    None
                }
            }
        }
        Some(target) => {
            warn!(path = %target.display(), "Nothing converted; skipping merge");
            None
        }
        None => None,
    };

    info!(
        text = %dumps.text_path().display(),
        key_details = %dumps.key_details_path().display(),
        "Dump files written"
    );

    let report = BatchReport {
        run_id,
        started_at,
        finished_at: Local::now(),
        converted,
        failed,
        cancelled,
        merged,
        merge_error,
    };
    info!(
        %run_id,
        converted = report.converted.len(),
        failed = report.failed.len(),
        cancelled,
        "Batch finished"
    );
    Ok(report)
}

/// Run the batch on tokio's blocking pool and stream its progress.
///
/// The writer is built on the worker from `request.config`. The receiver
/// yields every [`BatchEvent`]; it closes when the worker ends.
pub fn spawn_batch(
    request: BatchRequest,
    detector: Arc<SharedDetector>,
    cancel: CancelFlag,
) -> (JoinHandle<Result<BatchReport>>, UnboundedReceiver<BatchEvent>) {
    let (tx, rx) = unbounded_channel();
    let handle = tokio::task::spawn_blocking(move || {
        let writer = build_writer(&request.config);
        run_batch(&request, &detector, &writer, &cancel, Some(&tx))
    });
    (handle, rx)
}

fn emit(events: Option<&UnboundedSender<BatchEvent>>, event: BatchEvent) {
    if let Some(tx) = events
        && tx.send(event).is_err()
    {
        debug!("Progress receiver dropped");
    }
}

/// Log and announce a file the batch gives up on.
fn record_failure(
    events: Option<&UnboundedSender<BatchEvent>>,
    index: usize,
    total: usize,
    input: &Path,
    message: String,
) -> FailedFile {
    error!(file = %input.display(), error = %message, "Failed to process image");
    emit(
        events,
        BatchEvent::Failed {
            index,
            total,
            source: input.to_path_buf(),
            error: message.clone(),
        },
    );
    FailedFile {
        source: input.to_path_buf(),
        error: message,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// `err` followed by each of its sources, colon-separated.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.ends_with(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use sokbar_core::types::{Detection, Quad};
    use sokbar_document::TextDetector;

    /// Reads a fixed line from every image except those `fail_width` wide.
    struct ScriptedDetector {
        fail_width: u32,
    }

    impl TextDetector for ScriptedDetector {
        fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>> {
            if image.width() == self.fail_width {
                return Err(SokbarError::OcrError("recognition failed".into()));
            }
            Ok(vec![
                Detection::new(Quad::from_rect(2.0, 2.0, 30.0, 12.0), "Stockholm", 0.9),
                Detection::new(Quad::from_rect(2.0, 20.0, 30.0, 30.0), "tack", 0.9),
            ])
        }

        fn backend_name(&self) -> &str {
            "scripted"
        }
    }

    /// Panics on images `panic_width` wide, otherwise reads one line.
    struct PanickingDetector {
        panic_width: u32,
    }

    impl TextDetector for PanickingDetector {
        fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>> {
            if image.width() == self.panic_width {
                panic!("model tensor shape mismatch");
            }
            Ok(vec![Detection::new(Quad::from_rect(2.0, 2.0, 30.0, 12.0), "Lund", 0.9)])
        }

        fn backend_name(&self) -> &str {
            "panicking"
        }
    }

    fn image_at(dir: &Path, name: &str, width: u32) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(width, 40, Rgb([255, 255, 255])).save(&path).unwrap();
        path
    }

    fn request(dir: &Path, inputs: Vec<PathBuf>) -> BatchRequest {
        let config = PipelineConfig {
            output_dir: dir.join("out"),
            font_path: None,
            ..PipelineConfig::default()
        };
        BatchRequest {
            inputs,
            config,
            merge_into: None,
        }
    }

    fn writer() -> SearchablePdfWriter {
        SearchablePdfWriter::new(FontChoice::fallback(), TextLayout::default())
    }

    #[test]
    fn failing_middle_file_does_not_stop_batch() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = vec![
            image_at(dir.path(), "1.png", 50),
            image_at(dir.path(), "2.png", 77),
            image_at(dir.path(), "3.png", 60),
        ];
        let request = request(dir.path(), inputs);
        let detector = SharedDetector::ready(ScriptedDetector { fail_width: 77 });

        let report = run_batch(&request, &detector, &writer(), &CancelFlag::new(), None).unwrap();

        let out = dir.path().join("out");
        assert!(out.join("1.pdf").exists());
        assert!(!out.join("2.pdf").exists());
        assert!(out.join("3.pdf").exists());
        assert_eq!(report.converted.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].error.contains("recognition failed"));
        assert!(!report.is_clean());

        let text = std::fs::read_to_string(out.join("text.txt")).unwrap();
        assert_eq!(text, "Stockholm\ntack\nStockholm\ntack\n");
        let names = std::fs::read_to_string(out.join("names.txt")).unwrap();
        assert_eq!(names, "Stockholm\nStockholm\n");
    }

    #[test]
    fn panicking_detector_fails_only_that_file() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = vec![
            image_at(dir.path(), "1.png", 50),
            image_at(dir.path(), "2.png", 77),
            image_at(dir.path(), "3.png", 60),
        ];
        let request = request(dir.path(), inputs);
        let detector = SharedDetector::ready(PanickingDetector { panic_width: 77 });

        let report = run_batch(&request, &detector, &writer(), &CancelFlag::new(), None).unwrap();

        let out = dir.path().join("out");
        assert!(out.join("1.pdf").exists());
        assert!(!out.join("2.pdf").exists());
        assert!(out.join("3.pdf").exists());
        assert_eq!(report.converted.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].source, dir.path().join("2.png"));
        assert!(report.failed[0].error.contains("model tensor shape mismatch"));
        let text = std::fs::read_to_string(out.join("text.txt")).unwrap();
        assert_eq!(text, "Lund\nLund\n");
    }

    #[test]
    fn failed_merge_keeps_the_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut request = request(
            dir.path(),
            vec![image_at(dir.path(), "a.png", 20), image_at(dir.path(), "b.png", 30)],
        );
        request.merge_into = Some(dir.path().join("saknas/alla.pdf"));
        let detector = SharedDetector::ready(ScriptedDetector { fail_width: 0 });

        let report = run_batch(&request, &detector, &writer(), &CancelFlag::new(), None).unwrap();

        assert_eq!(report.converted.len(), 2);
        assert!(report.merged.is_none());
        assert!(report.merge_error.is_some());
        assert!(!report.is_clean());
        assert!(dir.path().join("out/a.pdf").exists());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn dump_failure_is_recorded_against_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut request = request(
            dir.path(),
            vec![image_at(dir.path(), "a.png", 20), image_at(dir.path(), "b.png", 30)],
        );
        // Every write to /dev/full fails with ENOSPC.
        request.config.text_dump_file = "/dev/full".into();
        let detector = SharedDetector::ready(ScriptedDetector { fail_width: 0 });

        let report = run_batch(&request, &detector, &writer(), &CancelFlag::new(), None).unwrap();

        assert_eq!(report.converted.len(), 2);
        assert!(report.converted.iter().all(|file| file.dump_error.is_some()));
        assert!(report.failed.is_empty());
        assert!(!report.is_clean());
        assert!(dir.path().join("out/b.pdf").exists());
    }

    #[test]
    fn detector_init_failure_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let request = request(
            dir.path(),
            vec![image_at(dir.path(), "a.png", 20), image_at(dir.path(), "b.png", 20)],
        );
        let detector = SharedDetector::lazy(|| Err(SokbarError::DetectorInit("no models".into())));

        let err = run_batch(&request, &detector, &writer(), &CancelFlag::new(), None).unwrap_err();
        assert!(err.is_fatal());
        assert!(!dir.path().join("out/a.pdf").exists());
    }

    #[test]
    fn cancelled_before_start_processes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let request = request(dir.path(), vec![image_at(dir.path(), "a.png", 20)]);
        let detector = SharedDetector::ready(ScriptedDetector { fail_width: 0 });
        let cancel = CancelFlag::new();
        cancel.cancel();

        let report = run_batch(&request, &detector, &writer(), &cancel, None).unwrap();
        assert!(report.cancelled);
        assert!(report.converted.is_empty());
    }

    #[test]
    fn empty_request_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let detector = SharedDetector::ready(ScriptedDetector { fail_width: 0 });
        let result = run_batch(
            &request(dir.path(), Vec::new()),
            &detector,
            &writer(),
            &CancelFlag::new(),
            None,
        );
        assert!(matches!(result, Err(SokbarError::NoInputs)));
    }

    #[test]
    fn merge_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut request = request(
            dir.path(),
            vec![image_at(dir.path(), "a.png", 20), image_at(dir.path(), "b.png", 30)],
        );
        let combined = dir.path().join("alla.pdf");
        request.merge_into = Some(combined.clone());
        let detector = SharedDetector::ready(ScriptedDetector { fail_width: 0 });

        let report = run_batch(&request, &detector, &writer(), &CancelFlag::new(), None).unwrap();
        assert_eq!(report.merged.as_deref(), Some(combined.as_path()));
        assert!(combined.exists());

        let json_path = dir.path().join("report.json");
        report.write_json(&json_path).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(json["converted"].as_array().unwrap().len(), 2);
        assert_eq!(json["converted"][0]["key_details"][0]["kind"], "ProperName");
    }

    #[tokio::test]
    async fn spawned_batch_streams_events() {
        let dir = tempfile::tempdir().unwrap();
        let request = request(
            dir.path(),
            vec![image_at(dir.path(), "a.png", 20), image_at(dir.path(), "b.png", 77)],
        );
        let detector = Arc::new(SharedDetector::ready(ScriptedDetector { fail_width: 77 }));

        let (handle, mut events) =
            spawn_batch(request, detector, CancelFlag::new());

        let mut seen = Vec::new();
        while let Some(event) = events.recv().await {
            seen.push(event);
        }
        let report = handle.await.unwrap().unwrap();

        assert!(matches!(seen.first(), Some(BatchEvent::Started { total: 2, .. })));
        assert!(matches!(seen[1], BatchEvent::Completed { index: 0, .. }));
        assert!(matches!(seen[2], BatchEvent::Failed { index: 1, .. }));
        assert_eq!(seen.len(), 3);
        assert_eq!(report.converted.len(), 1);
    }

    #[test]
    fn error_chain_includes_io_source() {
        let err = SokbarError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(error_chain(&err).contains("gone"));
    }
}
