// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text detector seam.
//
// The OCR model is a black box: it takes upright RGB pixels and returns
// detections in whatever order it likes. Building one is expensive (model
// loading), so the pipeline shares a single detector per process through
// `SharedDetector`, which builds it on first use and serialises calls to it.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use image::RgbImage;
use sokbar_core::error::{Result, SokbarError};
use sokbar_core::types::Detection;
use tracing::{debug, info, warn};

/// Anything that can find and transcribe text regions in an image.
pub trait TextDetector: Send {
    /// Detect text in `image`. The returned order is unspecified.
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>>;

    /// Short name for logs.
    fn backend_name(&self) -> &str;
}

type DetectorFactory = Box<dyn Fn() -> Result<Box<dyn TextDetector>> + Send + Sync>;

/// The process-wide detector handle.
///
/// Construction is deferred until the first [`detect`](Self::detect) call.
/// Every call takes an exclusive lock for its whole duration, so the wrapped
/// detector never sees concurrent use even when several workers share the
/// handle. If the factory fails the error is returned as
/// [`SokbarError::DetectorInit`] and nothing is cached. A detector that
/// panicked mid-call stays in place and is used again.
pub struct SharedDetector {
    factory: DetectorFactory,
    slot: Mutex<Option<Box<dyn TextDetector>>>,
}

impl SharedDetector {
    /// Defer construction to `factory`, run at most once successfully.
    pub fn lazy<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn TextDetector>> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            slot: Mutex::new(None),
        }
    }

    /// Wrap an already constructed detector.
    pub fn ready(detector: impl TextDetector + 'static) -> Self {
        Self {
            factory: Box::new(|| {
                Err(SokbarError::DetectorInit(
                    "detector was supplied pre-built and cannot be rebuilt".into(),
                ))
            }),
            slot: Mutex::new(Some(Box::new(detector))),
        }
    }

    /// Whether the detector has been built yet.
    pub fn is_initialized(&self) -> bool {
        self.lock().is_some()
    }

    /// Build the detector now instead of on the first image.
    pub fn initialize(&self) -> Result<()> {
        let mut slot = self.lock();
        self.ensure_built(&mut slot)?;
        Ok(())
    }

    /// Run detection with exclusive access to the detector.
    pub fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>> {
        let mut slot = self.lock();
        let detector = self.ensure_built(&mut slot)?;
        let detections = detector.detect(image)?;
        debug!(
            backend = detector.backend_name(),
            count = detections.len(),
            "Detection complete"
        );
        Ok(detections)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn TextDetector>>> {
        self.slot.lock().unwrap_or_else(|poisoned| {
            warn!("Detector lock poisoned by an earlier panic; continuing");
            poisoned.into_inner()
        })
    }

    fn ensure_built<'a>(
        &self,
        slot: &'a mut Option<Box<dyn TextDetector>>,
    ) -> Result<&'a dyn TextDetector> {
        if slot.is_none() {
            let detector = (self.factory)().map_err(|err| match err {
                SokbarError::DetectorInit(msg) => SokbarError::DetectorInit(msg),
                other => SokbarError::DetectorInit(other.to_string()),
            })?;
            info!(backend = detector.backend_name(), "Text detector initialised");
            *slot = Some(detector);
        }
        match slot.as_deref() {
            Some(detector) => Ok(detector),
            None => Err(SokbarError::DetectorInit("detector slot empty after build".into())),
        }
    }
}

impl fmt::Debug for SharedDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedDetector")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
