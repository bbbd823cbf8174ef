// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer — glues the CLI to the sokbar backend crates.
//
// Each service owns one concern of a conversion run: finding inputs, building
// the detector, writing the dump files, logging, and driving the batch.

pub mod batch;
pub mod detector;
pub mod dumps;
pub mod inputs;
pub mod logging;
